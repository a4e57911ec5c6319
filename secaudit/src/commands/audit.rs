//! `secaudit audit`

use super::write_output;
use anyhow::{bail, Result};
use secaudit_engine::report::{format_audit_report, format_audit_report_json};
use secaudit_engine::{Auditor, Product};
use std::path::Path;

pub fn cmd_audit(
    auditor: &Auditor,
    products: &[Product],
    recommend: Option<bool>,
    format: &str,
    output: Option<&Path>,
) -> Result<()> {
    let requested: Vec<Product> = if products.is_empty() {
        auditor.get_available_products().into_iter().collect()
    } else {
        products.to_vec()
    };
    if requested.is_empty() {
        bail!("No security products available to audit on this system");
    }

    let names: Vec<&str> = requested.iter().map(|p| p.as_str()).collect();
    eprintln!("[*] Auditing: {}", names.join(", "));

    let results = auditor.audit(Some(&requested));
    // `recommend` is `Some(installed_only)` when recommendations were asked for.
    let recommendations = recommend.map(|installed_only| {
        // Without a product filter every available product was just audited.
        let recs = if products.is_empty() {
            auditor.recommendations_for(&results)
        } else {
            auditor.generate_recommendations()
        };
        if installed_only {
            recs.installed_only()
        } else {
            recs
        }
    });

    let report = match format {
        "json" => format_audit_report_json(&results, recommendations.as_ref()),
        _ => format_audit_report(&results, recommendations.as_ref()),
    };
    write_output(&report, output, "Report")?;

    let stale: usize = results.values().map(|r| r.stale_count()).sum();
    if stale > 0 {
        eprintln!();
        eprintln!(
            "[!] Found {} stale exception(s) - run 'secaudit cleanup' to review",
            stale
        );
    }
    Ok(())
}
