//! Markdown / JSON / plain-text rendering of engine results.

use crate::correlate::{CorrelationCheck, Diagnosis};
use crate::model::{AuditResult, Product};
use crate::orchestrator::{CleanupAction, CleanupOutcome};
use crate::reconcile::{MissingEntry, RecommendationSet};
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};

const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

fn generated_at() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn platform() -> String {
    format!("{} {}", std::env::consts::OS, std::env::consts::ARCH)
}

struct Totals {
    total: usize,
    active: usize,
    stale: usize,
}

fn totals(results: &BTreeMap<Product, AuditResult>) -> Totals {
    results.values().fold(
        Totals {
            total: 0,
            active: 0,
            stale: 0,
        },
        |t, r| Totals {
            total: t.total + r.total_count(),
            active: t.active + r.active_count(),
            stale: t.stale + r.stale_count(),
        },
    )
}

/// Where a missing entry should be excepted: first candidate path, else its ports.
fn missing_location(missing: &MissingEntry) -> String {
    let entry = &missing.entry;
    if let Some(path) = entry.paths.first() {
        return format!("`{}`", path);
    }
    if !entry.ports.is_empty() {
        return format!("ports {}", join_ports(&entry.ports));
    }
    entry
        .process
        .as_deref()
        .map(|p| format!("process `{}`", p))
        .unwrap_or_default()
}

fn join_ports(ports: &[u16]) -> String {
    ports
        .iter()
        .map(|p| p.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Full audit report in Markdown.
pub fn format_audit_report(
    results: &BTreeMap<Product, AuditResult>,
    recommendations: Option<&RecommendationSet>,
) -> String {
    let t = totals(results);
    let mut lines = vec![
        "# Security Exception Audit Report".to_string(),
        String::new(),
        format!("**Generated:** {}", generated_at()),
        format!("**Platform:** {}", platform()),
        format!("**Tool:** secaudit v{}", TOOL_VERSION),
        String::new(),
        "---".to_string(),
        String::new(),
        "## Summary".to_string(),
        String::new(),
        "| Metric | Count |".to_string(),
        "|--------|-------|".to_string(),
        format!("| Total Exceptions | {} |", t.total),
        format!("| Active (Target Exists) | {} |", t.active),
        format!("| Stale (Target Missing) | {} |", t.stale),
        format!("| Products Audited | {} |", results.len()),
        String::new(),
    ];

    for (product, result) in results {
        lines.push(format!("## {}", product.display_name()));
        lines.push(String::new());

        if !result.errors().is_empty() {
            lines.push("### Errors".to_string());
            lines.extend(result.errors().iter().map(|e| format!("- [X] {}", e)));
            lines.push(String::new());
        }
        if !result.warnings().is_empty() {
            lines.push("### Warnings".to_string());
            lines.extend(result.warnings().iter().map(|w| format!("- [!] {}", w)));
            lines.push(String::new());
        }
        if result.requires_elevation() {
            lines.push("> **Note:** Admin privileges required for full audit".to_string());
            lines.push(String::new());
        }

        if result.exceptions().is_empty() {
            lines.push("*No exceptions found*".to_string());
        } else {
            lines.push("### Exceptions".to_string());
            lines.push(String::new());
            lines.push("| Status | Type | Target |".to_string());
            lines.push("|--------|------|--------|".to_string());
            for exc in result.exceptions() {
                lines.push(format!(
                    "| {} | {} | `{}` |",
                    exc.status_label(),
                    exc.record.kind(),
                    exc.record.target().replace('|', "\\|")
                ));
            }
        }
        lines.push(String::new());
    }

    if let Some(recs) = recommendations {
        lines.push("---".to_string());
        lines.push(String::new());
        lines.push("## Recommendations".to_string());
        lines.push(String::new());
        if !recs.missing.is_empty() {
            lines.push("### Missing Exceptions (Should Add)".to_string());
            lines.push(String::new());
            lines.push("| Name | Location | Category | Reason |".to_string());
            lines.push("|------|----------|----------|--------|".to_string());
            for m in &recs.missing {
                let blocking = if m.build_blocking { " (blocking)" } else { "" };
                let absent = if m.installed == Some(false) { " (not installed)" } else { "" };
                lines.push(format!(
                    "| {}{} | {} | {}{} | {} |",
                    m.entry.name,
                    absent,
                    missing_location(m),
                    m.entry.category,
                    blocking,
                    m.entry.reason
                ));
            }
            lines.push(String::new());
        }
        if !recs.covered.is_empty() {
            lines.push("### Already Covered".to_string());
            lines.push(String::new());
            for c in &recs.covered {
                lines.push(format!(
                    "- [OK] {}: `{}` ({})",
                    c.entry.name,
                    c.matched_by.target(),
                    c.matched_by.product()
                ));
            }
            lines.push(String::new());
        }
    }

    let stale: Vec<_> = results.values().flat_map(|r| r.stale()).collect();
    if !stale.is_empty() {
        lines.push("---".to_string());
        lines.push(String::new());
        lines.push("## Cleanup Recommendations".to_string());
        lines.push(String::new());
        lines.push("The following exceptions point to targets that no longer exist:".to_string());
        lines.push(String::new());
        for exc in stale {
            lines.push(format!("- `{}` ({})", exc.record.target(), exc.record.product()));
        }
        lines.push(String::new());
        lines.push("Run `secaudit cleanup` to preview removal.".to_string());
        lines.push(String::new());
    }

    lines.push("---".to_string());
    lines.push(String::new());
    lines.push("*Report generated by secaudit*".to_string());
    lines.join("\n")
}

/// Full audit report as pretty JSON.
pub fn format_audit_report_json(
    results: &BTreeMap<Product, AuditResult>,
    recommendations: Option<&RecommendationSet>,
) -> String {
    let t = totals(results);
    let mut report = serde_json::json!({
        "metadata": {
            "generated_at": Utc::now().to_rfc3339(),
            "platform": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "tool_version": TOOL_VERSION,
        },
        "summary": {
            "total_exceptions": t.total,
            "active_exceptions": t.active,
            "stale_exceptions": t.stale,
            "products_audited": results.keys().map(|p| p.as_str()).collect::<Vec<_>>(),
        },
        "products": results,
    });
    if let Some(recs) = recommendations {
        report["recommendations"] = serde_json::to_value(recs).unwrap_or_default();
    }
    serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
}

/// Recommendations in Markdown.
pub fn format_recommendations(recs: &RecommendationSet) -> String {
    let mut lines = vec![
        "# Security Whitelist Recommendations".to_string(),
        String::new(),
        format!("**Generated:** {}", generated_at()),
        format!("**Platform:** {}", platform()),
        String::new(),
    ];

    if recs.missing.is_empty() {
        lines.push("## [OK] All catalog entries are already covered!".to_string());
        lines.push(String::new());
    } else {
        lines.push("## Missing Exceptions (Action Required)".to_string());
        lines.push(String::new());
        lines.push("These tools should be added to your security exceptions:".to_string());
        lines.push(String::new());
        for m in &recs.missing {
            let entry = &m.entry;
            lines.push(format!("### {}", entry.name));
            if !entry.paths.is_empty() {
                let paths: Vec<String> = entry.paths.iter().map(|p| format!("`{}`", p)).collect();
                lines.push(format!("- **Paths:** {}", paths.join(", ")));
            }
            if !entry.ports.is_empty() {
                lines.push(format!("- **Ports:** {}", join_ports(&entry.ports)));
            }
            lines.push(format!("- **Reason:** {}", entry.reason));
            lines.push(format!("- **Category:** {}", entry.category));
            if m.build_blocking {
                lines.push("- **Build-blocking:** yes".to_string());
            }
            if let Some(installed) = m.installed {
                let label = if installed { "yes" } else { "no (not found on this host)" };
                lines.push(format!("- **Installed:** {}", label));
            }
            lines.push(String::new());
        }
    }

    if !recs.covered.is_empty() {
        lines.push("## Already Covered".to_string());
        lines.push(String::new());
        for c in &recs.covered {
            lines.push(format!(
                "- [OK] {}: `{}` ({}, {:?} rule)",
                c.entry.name,
                c.matched_by.target(),
                c.matched_by.product(),
                c.rule
            ));
        }
        lines.push(String::new());
    }
    lines.join("\n")
}

pub fn format_recommendations_json(recs: &RecommendationSet) -> String {
    let report = serde_json::json!({
        "generated_at": Utc::now().to_rfc3339(),
        "platform": std::env::consts::OS,
        "missing": recs.missing,
        "covered": recs.covered,
    });
    serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
}

/// Plain-text check result with the diagnosis when both halves were checked.
pub fn format_check(check: &CorrelationCheck) -> String {
    let mut lines = vec![
        format!("Check Results ({})", generated_at()),
        "=".repeat(50),
    ];
    if let Some(process) = &check.process {
        let status = if process.is_running {
            "[OK] Running"
        } else {
            "[X] Not Running"
        };
        lines.push(format!("Process '{}': {}", process.name, status));
    }
    if let Some(port) = &check.port {
        let status = if port.is_in_use {
            "[OK] In Use"
        } else {
            "[X] Not In Use"
        };
        lines.push(format!("Port {}: {}", port.number, status));
    }
    if check.process.is_none() && check.port.is_none() {
        lines.push("Nothing to check: pass --process and/or --port".to_string());
    }
    for warning in &check.warnings {
        lines.push(format!("[!] {}", warning));
    }
    if let Some(diagnosis) = Diagnosis::from_check(check) {
        lines.push(String::new());
        lines.push(format!("Diagnosis: {}", diagnosis));
    }
    lines.join("\n")
}

pub fn format_check_json(check: &CorrelationCheck) -> String {
    let mut value = serde_json::to_value(check).unwrap_or_default();
    value["timestamp"] = serde_json::Value::String(Utc::now().to_rfc3339());
    if let Some(diagnosis) = Diagnosis::from_check(check) {
        value["diagnosis"] = serde_json::to_value(diagnosis).unwrap_or_default();
    }
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string())
}

/// Cleanup plan or outcome listing.
pub fn format_cleanup(actions: &[CleanupAction], applied: bool) -> String {
    if actions.is_empty() {
        return "[OK] No stale exceptions found!".to_string();
    }
    let mut lines = vec![format!("Found {} stale exception(s):", actions.len()), String::new()];
    for action in actions {
        let record = &action.record;
        let line = match &action.outcome {
            CleanupOutcome::Planned => {
                format!("  - [{}] {}: {}", record.product(), record.kind(), record.target())
            }
            CleanupOutcome::Removed(msg) => format!("  [OK] {}", msg),
            CleanupOutcome::Failed(err) => format!("  [X] {}: {}", record.target(), err),
            CleanupOutcome::ManualRemovalRequired => {
                format!("  [SKIP] {} - manual removal required: {}", record.product(), record.target())
            }
        };
        lines.push(line);
    }
    lines.push(String::new());
    if !applied {
        lines.push("[DRY-RUN] No changes made. Use --apply to remove stale exceptions.".to_string());
        lines.push("Note: automatic removal is only supported for Windows Defender.".to_string());
    }
    lines.join("\n")
}

/// Available and unavailable products.
pub fn format_products(available: &BTreeSet<Product>, known: &BTreeSet<Product>) -> String {
    let mut lines = vec!["Available Security Products:".to_string(), "=".repeat(40)];
    if available.is_empty() {
        lines.push("  (none)".to_string());
    }
    lines.extend(
        available
            .iter()
            .map(|p| format!("  [OK] {} ({})", p, p.display_name())),
    );
    let unavailable: Vec<&Product> = known.difference(available).collect();
    if !unavailable.is_empty() {
        lines.push(String::new());
        lines.push("Not Available:".to_string());
        lines.extend(
            unavailable
                .iter()
                .map(|p| format!("  [--] {} ({})", p, p.display_name())),
        );
    }
    lines.join("\n")
}
