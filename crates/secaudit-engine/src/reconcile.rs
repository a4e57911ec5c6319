//! Coverage reconciliation: which catalog entries are already excepted?
//!
//! Each entry is tried against the pooled records with three rules in order:
//! path prefix, firewall port, process basename. The first hit covers the
//! entry. Output follows catalog order, and records are examined in a
//! canonical order, so the result does not depend on how records were
//! collected.

use crate::catalog::{WhitelistCatalog, WhitelistEntry};
use crate::model::{ExceptionKind, ExceptionRecord};
use crate::staleness::{target_exists, FsProbe, PathProbe};
use regex::Regex;
use serde::Serialize;
use std::ops::RangeInclusive;
use std::sync::{Arc, OnceLock};

const SEPARATORS: [char; 2] = ['/', '\\'];
const EXECUTABLE_SUFFIXES: &[&str] = &[".exe", ".com", ".bat", ".cmd"];
const BLOCKING_ACTIONS: &[&str] = &["deny", "reject", "drop", "block"];

/// How path components are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseSensitivity {
    Sensitive,
    Insensitive,
}

impl CaseSensitivity {
    /// Insensitive on Windows and macOS, sensitive elsewhere
    pub fn for_host() -> Self {
        if cfg!(any(windows, target_os = "macos")) {
            CaseSensitivity::Insensitive
        } else {
            CaseSensitivity::Sensitive
        }
    }

    fn fold(&self, s: &str) -> String {
        match self {
            CaseSensitivity::Sensitive => s.to_string(),
            CaseSensitivity::Insensitive => s.to_lowercase(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchRule {
    Path,
    Port,
    Process,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoveredEntry {
    pub entry: WhitelistEntry,
    pub matched_by: ExceptionRecord,
    pub rule: MatchRule,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingEntry {
    pub entry: WhitelistEntry,
    /// Category is runtime or server
    pub build_blocking: bool,
    /// Some candidate path exists on this host. `None` when the entry has no paths.
    pub installed: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RecommendationSet {
    pub missing: Vec<MissingEntry>,
    pub covered: Vec<CoveredEntry>,
}

impl RecommendationSet {
    pub fn is_covered(&self, id: &str) -> bool {
        self.covered.iter().any(|c| c.entry.id == id)
    }

    pub fn build_blocking(&self) -> impl Iterator<Item = &MissingEntry> {
        self.missing.iter().filter(|m| m.build_blocking)
    }

    /// Drop missing entries whose candidate paths are all absent from this host.
    /// Entries without paths are kept.
    pub fn installed_only(mut self) -> Self {
        self.missing.retain(|m| m.installed != Some(false));
        self
    }
}

pub struct CoverageReconciler {
    catalog: Arc<WhitelistCatalog>,
    case: CaseSensitivity,
    probe: Arc<dyn PathProbe>,
}

impl CoverageReconciler {
    pub fn new(catalog: Arc<WhitelistCatalog>) -> Self {
        Self {
            catalog,
            case: CaseSensitivity::for_host(),
            probe: Arc::new(FsProbe),
        }
    }

    pub fn with_case(mut self, case: CaseSensitivity) -> Self {
        self.case = case;
        self
    }

    /// Filesystem used to decide whether a missing entry is installed
    pub fn with_probe(mut self, probe: Arc<dyn PathProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn reconcile(&self, records: &[ExceptionRecord]) -> RecommendationSet {
        let mut sorted: Vec<&ExceptionRecord> = records.iter().collect();
        sorted.sort_by(|a, b| {
            a.sort_key()
                .cmp(&b.sort_key())
                .then_with(|| metadata_key(a).cmp(&metadata_key(b)))
        });

        let mut path_records = Vec::new();
        let mut port_records = Vec::new();
        let mut process_records = Vec::new();
        for record in sorted {
            match record.kind() {
                ExceptionKind::Path | ExceptionKind::Folder => {
                    let components = path_components(record.target(), self.case);
                    if !components.is_empty() {
                        path_records.push((record, components));
                    }
                }
                ExceptionKind::FirewallRule if !permits_traffic(record) => {}
                ExceptionKind::FirewallRule => {
                    let ports = referenced_ports(record.target());
                    if !ports.is_empty() {
                        port_records.push((record, ports));
                    }
                }
                ExceptionKind::Process => {
                    process_records.push((record, executable_stem(basename(record.target()))));
                }
                ExceptionKind::Extension => {}
            }
        }

        let mut result = RecommendationSet::default();
        for entry in self.catalog.entries() {
            let path_hit = entry.paths.iter().find_map(|candidate| {
                let candidate = path_components(candidate, self.case);
                path_records
                    .iter()
                    .find(|(_, prefix)| is_component_prefix(prefix, &candidate))
                    .map(|(rec, _)| (*rec, MatchRule::Path))
            });
            let port_hit = || {
                entry.ports.iter().find_map(|port| {
                    port_records
                        .iter()
                        .find(|(_, ranges)| ranges.iter().any(|r| r.contains(port)))
                        .map(|(rec, _)| (*rec, MatchRule::Port))
                })
            };
            let process_hit = || {
                let wanted = primary_executable(entry).map(executable_stem)?;
                process_records
                    .iter()
                    .find(|(_, stem)| *stem == wanted)
                    .map(|(rec, _)| (*rec, MatchRule::Process))
            };

            match path_hit.or_else(port_hit).or_else(process_hit) {
                Some((record, rule)) => result.covered.push(CoveredEntry {
                    entry: entry.clone(),
                    matched_by: record.clone(),
                    rule,
                }),
                None => result.missing.push(MissingEntry {
                    entry: entry.clone(),
                    build_blocking: entry.category.is_build_blocking(),
                    installed: self.installed(entry),
                }),
            }
        }

        tracing::debug!(
            covered = result.covered.len(),
            missing = result.missing.len(),
            "Reconciled catalog coverage"
        );
        result
    }
}

impl CoverageReconciler {
    fn installed(&self, entry: &WhitelistEntry) -> Option<bool> {
        if entry.paths.is_empty() {
            return None;
        }
        Some(entry.paths.iter().any(|p| target_exists(self.probe.as_ref(), p)))
    }
}

fn metadata_key(record: &ExceptionRecord) -> String {
    serde_json::to_string(record.raw_metadata()).unwrap_or_default()
}

/// Lexical path components. A leading separator is kept as an empty root component;
/// repeated and trailing separators are dropped.
pub fn path_components(path: &str, case: CaseSensitivity) -> Vec<String> {
    let path = path.trim();
    let mut components = Vec::new();
    if path.starts_with(SEPARATORS) {
        components.push(String::new());
    }
    components.extend(
        path.split(SEPARATORS)
            .filter(|c| !c.is_empty())
            .map(|c| case.fold(c)),
    );
    components
}

fn is_component_prefix(prefix: &[String], candidate: &[String]) -> bool {
    !prefix.is_empty() && candidate.starts_with(prefix)
}

/// Last path component, accepting both separators
pub fn basename(path: &str) -> &str {
    path.trim_end_matches(SEPARATORS)
        .rsplit(SEPARATORS)
        .next()
        .unwrap_or(path)
}

/// Lowercased executable name without `.exe`/`.com`/`.bat`/`.cmd`
pub fn executable_stem(name: &str) -> String {
    let lower = name.trim().to_lowercase();
    EXECUTABLE_SUFFIXES
        .iter()
        .find_map(|suffix| lower.strip_suffix(suffix))
        .map(str::to_string)
        .unwrap_or(lower)
}

/// Explicit process name, else the basename of the first non-folder candidate path
pub fn primary_executable(entry: &WhitelistEntry) -> Option<&str> {
    if let Some(process) = entry.process.as_deref().filter(|p| !p.trim().is_empty()) {
        return Some(process);
    }
    entry
        .paths
        .iter()
        .map(|p| p.trim())
        .find(|p| !p.is_empty() && !p.ends_with(SEPARATORS))
        .map(basename)
}

fn port_patterns() -> &'static [Regex] {
    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            // iptables: dpt:8000, dpts:8000:8010, multiport dports 80,443
            r"(?i)\bdpts?:(\d+(?::\d+)?)",
            r"(?i)\bdports?\s+([\d,:\-]+)",
            // ufw: 22/tcp, 8000:8001/tcp, 80,443/tcp
            r"(?i)(\d+(?:[:\-]\d+)?(?:,\d+(?:[:\-]\d+)?)*)/(?:tcp|udp)",
            // ufw rule without protocol: "23  DENY IN  Anywhere". The From column
            // keeps iptables "<num> REJECT all --" lines out.
            r"(?i)^\s*(\d+(?:[:\-]\d+)?(?:,\d+(?:[:\-]\d+)?)*)\s+(?:\(v6\)\s+)?(?:ALLOW|DENY|REJECT|LIMIT)(?:\s+(?:IN|OUT|FWD))?\s+(?:Anywhere|[0-9a-f:.]+(?:/\d+)?)(?:\s|$)",
            // descriptors: "port 8000", "ports=8000-8010", "LocalPort: 80,443"
            r"(?i)\b(?:local)?ports?\s*[=:]?\s*(\d[\d,:\-]*)",
        ]
        .iter()
        .filter_map(|pattern| match Regex::new(pattern) {
            Ok(re) => Some(re),
            Err(e) => {
                tracing::warn!("Failed to compile port pattern '{}': {}", pattern, e);
                None
            }
        })
        .collect()
    })
}

/// Whether a firewall rule lets traffic through. Deny, reject, drop and block
/// rules are not exceptions. The Windows `action` field wins over the descriptor.
pub fn permits_traffic(record: &ExceptionRecord) -> bool {
    let is_blocking = |token: &str| BLOCKING_ACTIONS.contains(&token.trim().to_lowercase().as_str());
    match record.raw_metadata().get("action") {
        Some(serde_json::Value::String(action)) => !is_blocking(action),
        // NET_FW_ACTION: 4 = Block
        Some(serde_json::Value::Number(n)) => n.as_u64() != Some(4),
        _ => !record.target().split_whitespace().any(is_blocking),
    }
}

/// Port ranges a firewall-rule descriptor refers to.
pub fn referenced_ports(descriptor: &str) -> Vec<RangeInclusive<u16>> {
    let mut ranges = Vec::new();
    for re in port_patterns() {
        for caps in re.captures_iter(descriptor) {
            if let Some(list) = caps.get(1) {
                ranges.extend(parse_port_list(list.as_str()));
            }
        }
    }
    ranges
}

fn parse_port_list(list: &str) -> Vec<RangeInclusive<u16>> {
    list.split(',')
        .filter_map(|item| {
            let item = item.trim();
            if item.is_empty() {
                return None;
            }
            match item.split_once([':', '-']) {
                Some((start, end)) => {
                    let start: u16 = start.trim().parse().ok()?;
                    let end: u16 = end.trim().parse().ok()?;
                    (start <= end).then_some(start..=end)
                }
                None => item.parse::<u16>().ok().map(|p| p..=p),
            }
        })
        .collect()
}
