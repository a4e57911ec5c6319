//! External tool invocation shared by collectors and the socket table.
//!
//! Every tool runs with a hard timeout; a hung tool is killed and reported as
//! [`CollectError::Timeout`] instead of stalling the audit.

use crate::collectors::CollectError;
use std::io::Read;
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Poll interval while waiting for a child process
pub const WAIT_POLL_INTERVAL_MS: u64 = 50;

/// Captured output of a finished tool
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Spawn `program args...`, wait up to `timeout`, capture stdout/stderr.
///
/// Non-zero exit codes are returned in [`ToolOutput`]; callers decide whether
/// that is a failure. Spawn errors map to `ToolNotFound` / `ElevationRequired`.
pub fn run_tool(program: &str, args: &[&str], timeout: Duration) -> Result<ToolOutput, CollectError> {
    tracing::debug!(program, ?args, timeout_secs = timeout.as_secs(), "Running collector tool");

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CollectError::ToolNotFound {
                tool: program.to_string(),
            },
            std::io::ErrorKind::PermissionDenied => CollectError::ElevationRequired {
                tool: program.to_string(),
                detail: e.to_string(),
            },
            _ => CollectError::Io(e),
        })?;

    // Drain pipes while the child runs so large output cannot block it.
    let stdout_handle = child.stdout.take().map(|mut out| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = out.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).to_string()
        })
    });
    let stderr_handle = child.stderr.take().map(|mut err| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = err.read_to_end(&mut buf);
            String::from_utf8_lossy(&buf).to_string()
        })
    });

    let start = Instant::now();
    let poll = Duration::from_millis(WAIT_POLL_INTERVAL_MS);
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                let stdout = stdout_handle
                    .map(|h| h.join().unwrap_or_default())
                    .unwrap_or_default();
                let stderr = stderr_handle
                    .map(|h| h.join().unwrap_or_default())
                    .unwrap_or_default();
                return Ok(ToolOutput {
                    stdout,
                    stderr,
                    exit_code: status.code().unwrap_or(-1),
                });
            }
            Ok(None) => {}
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                let _ = stdout_handle.map(|h| h.join());
                let _ = stderr_handle.map(|h| h.join());
                return Err(CollectError::Io(e));
            }
        }

        if start.elapsed() > timeout {
            let _ = child.kill();
            let _ = child.wait();
            let _ = stdout_handle.map(|h| h.join());
            let _ = stderr_handle.map(|h| h.join());
            tracing::warn!(program, timeout_secs = timeout.as_secs(), "Collector tool timed out");
            return Err(CollectError::Timeout {
                tool: program.to_string(),
                secs: timeout.as_secs(),
            });
        }

        thread::sleep(poll);
    }
}

/// Run a tool and turn a non-zero exit into an error, classifying elevation failures.
pub fn run_tool_checked(
    program: &str,
    args: &[&str],
    timeout: Duration,
) -> Result<ToolOutput, CollectError> {
    let output = run_tool(program, args, timeout)?;
    if output.success() {
        return Ok(output);
    }
    let stderr = output.stderr.trim().to_string();
    if looks_like_elevation_error(&stderr) || looks_like_elevation_error(&output.stdout) {
        return Err(CollectError::ElevationRequired {
            tool: program.to_string(),
            detail: stderr,
        });
    }
    Err(CollectError::ToolFailed {
        tool: program.to_string(),
        code: output.exit_code,
        stderr,
    })
}

/// Heuristic for "needs admin/root" messages from PowerShell, ufw and iptables.
pub fn looks_like_elevation_error(text: &str) -> bool {
    let lower = text.to_lowercase();
    [
        "requires elevation",
        "access is denied",
        "permission denied",
        "you must be root",
        "you need to be root",
        "administrator",
    ]
    .iter()
    .any(|needle| lower.contains(needle))
}

/// Quote a value as a PowerShell single-quoted string literal.
pub fn powershell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_elevation_heuristic() {
        assert!(looks_like_elevation_error(
            "iptables v1.8.7 (nf_tables): Could not fetch rule set generation id: Permission denied (you must be root)"
        ));
        assert!(looks_like_elevation_error("ERROR: You need to be root to run this script"));
        assert!(looks_like_elevation_error("Get-MpPreference : Access is denied."));
        assert!(!looks_like_elevation_error("Status: inactive"));
    }

    #[test]
    fn test_powershell_quote_escapes_single_quotes() {
        assert_eq!(powershell_quote(r"C:\Tools"), r"'C:\Tools'");
        assert_eq!(powershell_quote("O'Brien"), "'O''Brien'");
    }

    #[test]
    fn test_missing_tool_is_reported() {
        let err = run_tool(
            "secaudit-definitely-missing-tool",
            &[],
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert!(matches!(err, CollectError::ToolNotFound { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_tool_captures_output() {
        let out = run_tool("sh", &["-c", "echo hello; echo oops >&2; exit 3"], Duration::from_secs(5)).unwrap();
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
        assert_eq!(out.exit_code, 3);
        assert!(!out.success());
    }

    #[cfg(unix)]
    #[test]
    fn test_run_tool_times_out() {
        let err = run_tool("sh", &["-c", "sleep 5"], Duration::from_millis(200)).unwrap_err();
        assert!(matches!(err, CollectError::Timeout { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_run_tool_checked_classifies_failures() {
        let err = run_tool_checked("sh", &["-c", "echo 'Permission denied' >&2; exit 1"], Duration::from_secs(5))
            .unwrap_err();
        assert!(matches!(err, CollectError::ElevationRequired { .. }));

        let err = run_tool_checked("sh", &["-c", "echo boom >&2; exit 2"], Duration::from_secs(5)).unwrap_err();
        match err {
            CollectError::ToolFailed { code, stderr, .. } => {
                assert_eq!(code, 2);
                assert_eq!(stderr, "boom");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
