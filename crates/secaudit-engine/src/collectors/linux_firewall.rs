//! Linux firewall rules from `ufw` and `iptables`.
//!
//! Both tools are tried; a missing tool or a permission failure is a warning,
//! not an error, as long as the other one produced output.

use super::{CollectError, Collection, ExceptionCollector};
use crate::common::run_tool_checked;
use crate::model::{ExceptionKind, ExceptionRecord, Product};
use std::time::Duration;

pub struct LinuxFirewallCollector {
    timeout: Duration,
}

impl LinuxFirewallCollector {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl ExceptionCollector for LinuxFirewallCollector {
    fn product(&self) -> Product {
        Product::LinuxFirewall
    }

    fn is_available(&self) -> bool {
        cfg!(target_os = "linux")
    }

    fn collect(&self) -> Result<Collection, CollectError> {
        let mut collection = Collection::default();
        let mut any_succeeded = false;
        let mut hard_error: Option<CollectError> = None;

        let sources: [(&str, &[&str], fn(&str) -> Vec<String>); 2] = [
            ("ufw", &["status", "verbose"], parse_ufw_status),
            ("iptables", &["-L", "-n", "--line-numbers"], parse_iptables_list),
        ];

        for (tool, args, parse) in sources {
            match run_tool_checked(tool, args, self.timeout) {
                Ok(output) => {
                    any_succeeded = true;
                    for line in parse(&output.stdout) {
                        let record =
                            ExceptionRecord::new(Product::LinuxFirewall, ExceptionKind::FirewallRule, line)?
                                .with_metadata("tool", tool);
                        collection.records.push(record);
                    }
                }
                Err(CollectError::ToolNotFound { .. }) => {
                    collection.warnings.push(format!("{} not found", tool));
                }
                Err(e) if e.is_elevation() => {
                    collection.requires_elevation = true;
                    collection
                        .warnings
                        .push(format!("Root privileges required for {}", tool));
                }
                Err(e) => {
                    tracing::warn!(tool, error = %e, "Firewall tool failed");
                    collection.warnings.push(e.to_string());
                    hard_error = Some(e);
                }
            }
        }

        match hard_error {
            Some(e) if !any_succeeded => Err(e),
            _ => Ok(collection),
        }
    }
}

/// Rule lines from `ufw status verbose`: every line mentioning ALLOW or DENY.
pub fn parse_ufw_status(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| line.contains("ALLOW") || line.contains("DENY"))
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

/// Rule lines from `iptables -L -n --line-numbers`, skipping chain and column headers.
pub fn parse_iptables_list(output: &str) -> Vec<String> {
    output
        .lines()
        .filter(|line| !line.starts_with("Chain") && !line.starts_with("num"))
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const UFW: &str = "Status: active
Logging: on (low)
Default: deny (incoming), allow (outgoing), disabled (routed)
New profiles: skip

To                         Action      From
--                         ------      ----
22/tcp                     ALLOW IN    Anywhere
8000:8001/tcp              ALLOW IN    192.168.1.0/24
23                         DENY IN     Anywhere
";

    const IPTABLES: &str = "Chain INPUT (policy ACCEPT)
num  target     prot opt source               destination
1    ACCEPT     tcp  --  0.0.0.0/0            0.0.0.0/0            tcp dpt:8000
2    DROP       all  --  10.0.0.0/8           0.0.0.0/0

Chain FORWARD (policy DROP)
num  target     prot opt source               destination
";

    #[test]
    fn test_parse_ufw_status() {
        let rules = parse_ufw_status(UFW);
        assert_eq!(rules.len(), 3);
        assert!(rules[0].starts_with("22/tcp"));
        assert!(rules[1].starts_with("8000:8001/tcp"));
    }

    #[test]
    fn test_parse_ufw_inactive() {
        assert!(parse_ufw_status("Status: inactive\n").is_empty());
    }

    #[test]
    fn test_parse_iptables_list_skips_headers() {
        let rules = parse_iptables_list(IPTABLES);
        assert_eq!(rules.len(), 2);
        assert!(rules[0].ends_with("tcp dpt:8000"));
        assert!(rules[1].starts_with("2    DROP"));
    }
}
