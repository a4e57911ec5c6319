//! Windows Defender exclusions via `Get-MpPreference`.

use super::{json_string_list, CollectError, Collection, ExceptionCollector};
use crate::common::{powershell_quote, run_tool_checked};
use crate::model::{ExceptionKind, ExceptionRecord, Product};
use std::path::Path;
use std::time::Duration;

const POWERSHELL: &str = "powershell";

const QUERY: &str = "Get-MpPreference | Select-Object ExclusionPath, ExclusionProcess, ExclusionExtension | ConvertTo-Json -Depth 3";

pub struct DefenderCollector {
    timeout: Duration,
}

impl DefenderCollector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn powershell(&self, script: &str) -> Result<String, CollectError> {
        let output = run_tool_checked(
            POWERSHELL,
            &["-NoProfile", "-NonInteractive", "-Command", script],
            self.timeout,
        )?;
        Ok(output.stdout)
    }
}

impl ExceptionCollector for DefenderCollector {
    fn product(&self) -> Product {
        Product::Defender
    }

    fn is_available(&self) -> bool {
        cfg!(windows) && which::which(POWERSHELL).is_ok()
    }

    fn collect(&self) -> Result<Collection, CollectError> {
        let stdout = self.powershell(QUERY)?;
        let records = parse_mp_preference(&stdout, |p| Path::new(p).is_file())?;
        tracing::debug!(count = records.len(), "Collected Defender exclusions");
        Ok(Collection::from_records(records))
    }

    fn remove(&self, record: &ExceptionRecord) -> Result<String, CollectError> {
        let flag = match record.kind() {
            ExceptionKind::Path | ExceptionKind::Folder => "-ExclusionPath",
            ExceptionKind::Process => "-ExclusionProcess",
            ExceptionKind::Extension => "-ExclusionExtension",
            ExceptionKind::FirewallRule => {
                return Err(CollectError::RemovalUnsupported(Product::Defender))
            }
        };
        let script = format!(
            "Remove-MpPreference {} {}",
            flag,
            powershell_quote(record.target())
        );
        self.powershell(&script)?;
        Ok(format!("Removed exclusion: {}", record.target()))
    }
}

/// Parse `Get-MpPreference` JSON. Each exclusion field may be null, a string, or an array.
/// `is_file` decides whether a path exclusion is a file (`path`) or a directory (`folder`).
pub fn parse_mp_preference<F>(json: &str, is_file: F) -> Result<Vec<ExceptionRecord>, CollectError>
where
    F: Fn(&str) -> bool,
{
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let prefs: serde_json::Value =
        serde_json::from_str(json).map_err(|e| CollectError::Parse {
            what: "Defender preferences".to_string(),
            detail: e.to_string(),
        })?;

    let mut records = Vec::new();
    for path in json_string_list(prefs.get("ExclusionPath")) {
        let kind = if is_file(&path) {
            ExceptionKind::Path
        } else {
            ExceptionKind::Folder
        };
        records.push(ExceptionRecord::new(Product::Defender, kind, path)?);
    }
    for process in json_string_list(prefs.get("ExclusionProcess")) {
        records.push(ExceptionRecord::new(
            Product::Defender,
            ExceptionKind::Process,
            process,
        )?);
    }
    for ext in json_string_list(prefs.get("ExclusionExtension")) {
        records.push(ExceptionRecord::new(
            Product::Defender,
            ExceptionKind::Extension,
            ext,
        )?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mp_preference_mixed_shapes() {
        let json = r#"{
            "ExclusionPath": ["C:\\Python312\\python.exe", "D:\\Projects\\"],
            "ExclusionProcess": "node.exe",
            "ExclusionExtension": [".log", ".tmp"]
        }"#;
        let records = parse_mp_preference(json, |p| p.ends_with(".exe")).unwrap();
        assert_eq!(records.len(), 5);
        assert_eq!(records[0].kind(), ExceptionKind::Path);
        assert_eq!(records[1].kind(), ExceptionKind::Folder);
        assert_eq!(records[2].kind(), ExceptionKind::Process);
        assert_eq!(records[2].target(), "node.exe");
        assert_eq!(records[3].kind(), ExceptionKind::Extension);
        assert!(records.iter().all(|r| r.product() == Product::Defender));
    }

    #[test]
    fn test_parse_mp_preference_nulls_and_empty() {
        let json = r#"{"ExclusionPath": null, "ExclusionProcess": null, "ExclusionExtension": null}"#;
        assert!(parse_mp_preference(json, |_| false).unwrap().is_empty());
        assert!(parse_mp_preference("  ", |_| false).unwrap().is_empty());
    }

    #[test]
    fn test_parse_mp_preference_invalid_json() {
        let err = parse_mp_preference("not json", |_| false).unwrap_err();
        assert!(matches!(err, CollectError::Parse { .. }));
    }

    #[test]
    fn test_remove_rejects_firewall_rules() {
        let collector = DefenderCollector::new(Duration::from_secs(1));
        let rec = ExceptionRecord::new(Product::Defender, ExceptionKind::FirewallRule, "rule").unwrap();
        assert!(matches!(
            collector.remove(&rec),
            Err(CollectError::RemovalUnsupported(Product::Defender))
        ));
    }
}
