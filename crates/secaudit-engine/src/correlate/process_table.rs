//! Live process snapshot

use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind};

/// One running process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    /// Executable path, when the OS exposes it
    pub exe: Option<String>,
    pub cmdline: String,
}

impl ProcessInfo {
    pub fn new(pid: u32, name: &str) -> Self {
        Self {
            pid,
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn with_exe(mut self, exe: &str) -> Self {
        self.exe = Some(exe.to_string());
        self
    }

    pub fn with_cmdline(mut self, cmdline: &str) -> Self {
        self.cmdline = cmdline.to_string();
        self
    }
}

pub trait ProcessTable: Send + Sync {
    fn processes(&self) -> Vec<ProcessInfo>;
}

/// Process table backed by `sysinfo`
#[derive(Debug, Default, Clone, Copy)]
pub struct SysinfoProcessTable;

impl ProcessTable for SysinfoProcessTable {
    fn processes(&self) -> Vec<ProcessInfo> {
        let mut system = System::new();
        // The default refresh leaves `cmd` empty; substring matching needs it.
        system.refresh_processes_specifics(
            ProcessesToUpdate::All,
            true,
            ProcessRefreshKind::nothing()
                .with_cmd(UpdateKind::OnlyIfNotSet)
                .with_exe(UpdateKind::OnlyIfNotSet),
        );

        let processes: Vec<ProcessInfo> = system
            .processes()
            .iter()
            .map(|(pid, process)| ProcessInfo {
                pid: pid.as_u32(),
                name: process.name().to_string_lossy().to_string(),
                exe: process.exe().map(|p| p.display().to_string()),
                cmdline: process
                    .cmd()
                    .iter()
                    .map(|s| s.to_string_lossy().to_string())
                    .collect::<Vec<_>>()
                    .join(" "),
            })
            .collect();
        tracing::debug!(count = processes.len(), "Captured process snapshot");
        processes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_contains_current_process() {
        let me = std::process::id();
        let processes = SysinfoProcessTable.processes();
        let current = processes.iter().find(|p| p.pid == me).unwrap();
        assert!(!current.name.is_empty());
        assert!(!current.cmdline.is_empty());
    }
}
