//! Windows Firewall allow/deny rules via `Get-NetFirewallRule`.
//!
//! Built-in system rule groups are skipped; the record target is a descriptor
//! carrying the display name plus direction, protocol and local ports so the
//! reconciler can match catalog ports against it.

use super::{CollectError, Collection, ExceptionCollector};
use crate::common::run_tool_checked;
use crate::model::{ExceptionKind, ExceptionRecord, Product};
use std::time::Duration;

const POWERSHELL: &str = "powershell";

const QUERY: &str = "Get-NetFirewallRule -Enabled True | ForEach-Object { \
$pf = $_ | Get-NetFirewallPortFilter; \
[PSCustomObject]@{ DisplayName = $_.DisplayName; Direction = [string]$_.Direction; \
Action = [string]$_.Action; Profile = [string]$_.Profile; \
Protocol = [string]$pf.Protocol; LocalPort = ($pf.LocalPort -join ',') } } | ConvertTo-Json -Depth 3";

/// Display-name fragments identifying built-in rules
const SYSTEM_RULE_MARKERS: &[&str] = &["core networking", "windows", "microsoft", "netlogon"];

pub struct WindowsFirewallCollector {
    timeout: Duration,
}

impl WindowsFirewallCollector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ExceptionCollector for WindowsFirewallCollector {
    fn product(&self) -> Product {
        Product::WindowsFirewall
    }

    fn is_available(&self) -> bool {
        cfg!(windows) && which::which(POWERSHELL).is_ok()
    }

    fn collect(&self) -> Result<Collection, CollectError> {
        let output = run_tool_checked(
            POWERSHELL,
            &["-NoProfile", "-NonInteractive", "-Command", QUERY],
            self.timeout,
        )?;
        let mut collection = Collection::from_records(parse_firewall_rules(&output.stdout)?);
        if output.stdout.trim().is_empty() {
            collection
                .warnings
                .push("No firewall rules found or access denied".to_string());
        }
        Ok(collection)
    }
}

/// Parse the rule JSON (a single object or an array of objects).
pub fn parse_firewall_rules(json: &str) -> Result<Vec<ExceptionRecord>, CollectError> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| CollectError::Parse {
            what: "firewall rules".to_string(),
            detail: e.to_string(),
        })?;
    let rules = match value {
        serde_json::Value::Array(items) => items,
        obj @ serde_json::Value::Object(_) => vec![obj],
        _ => Vec::new(),
    };

    let mut records = Vec::new();
    for rule in &rules {
        let name = rule
            .get("DisplayName")
            .and_then(|v| v.as_str())
            .unwrap_or("Unknown")
            .trim();
        if is_system_rule(name) {
            continue;
        }
        let direction = normalize_direction(rule.get("Direction"));
        let protocol = field_str(rule, "Protocol");
        let local_port = field_str(rule, "LocalPort");

        let mut record = ExceptionRecord::new(
            Product::WindowsFirewall,
            ExceptionKind::FirewallRule,
            describe_rule(name, &direction, protocol.as_deref(), local_port.as_deref()),
        )?
        .with_metadata("display_name", name)
        .with_metadata("direction", direction);
        for key in ["Action", "Profile"] {
            if let Some(v) = field_str(rule, key) {
                record = record.with_metadata(&key.to_lowercase(), v);
            }
        }
        if let Some(p) = protocol {
            record = record.with_metadata("protocol", p);
        }
        if let Some(p) = local_port {
            record = record.with_metadata("local_port", p);
        }
        records.push(record);
    }
    Ok(records)
}

fn is_system_rule(name: &str) -> bool {
    let lower = name.to_lowercase();
    SYSTEM_RULE_MARKERS.iter().any(|m| lower.contains(m))
}

/// `Direction` arrives as "Inbound"/"Outbound" or as the enum value (1 = inbound).
fn normalize_direction(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::Number(n)) if n.as_i64() == Some(1) => "inbound".to_string(),
        Some(serde_json::Value::Number(_)) => "outbound".to_string(),
        Some(serde_json::Value::String(s)) if s.eq_ignore_ascii_case("inbound") || s == "1" => {
            "inbound".to_string()
        }
        Some(serde_json::Value::String(_)) => "outbound".to_string(),
        _ => "unknown".to_string(),
    }
}

fn field_str(rule: &serde_json::Value, key: &str) -> Option<String> {
    rule.get(key)
        .and_then(|v| match v {
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
        .filter(|s| !s.is_empty() && !s.eq_ignore_ascii_case("any"))
}

fn describe_rule(name: &str, direction: &str, protocol: Option<&str>, ports: Option<&str>) -> String {
    let mut parts = vec![direction.to_string()];
    if let Some(p) = protocol {
        parts.push(p.to_uppercase());
    }
    if let Some(p) = ports {
        parts.push(format!("port {}", p));
    }
    format!("{} [{}]", name, parts.join(" "))
}
