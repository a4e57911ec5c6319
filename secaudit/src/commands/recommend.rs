//! `secaudit recommend`

use super::write_output;
use anyhow::Result;
use secaudit_engine::report::{format_recommendations, format_recommendations_json};
use secaudit_engine::Auditor;
use std::path::Path;

pub fn cmd_recommend(auditor: &Auditor, installed_only: bool, format: &str, output: Option<&Path>) -> Result<()> {
    eprintln!("[*] Generating whitelist recommendations...");
    let mut recs = auditor.generate_recommendations();
    if installed_only {
        recs = recs.installed_only();
    }

    let rendered = match format {
        "json" => format_recommendations_json(&recs),
        _ => format_recommendations(&recs),
    };
    write_output(&rendered, output, "Recommendations")?;

    eprintln!();
    if recs.missing.is_empty() {
        eprintln!("[OK] All catalog entries are covered!");
    } else {
        eprintln!(
            "[!] {} catalog entr{} need security exceptions ({} build-blocking)",
            recs.missing.len(),
            if recs.missing.len() == 1 { "y" } else { "ies" },
            recs.build_blocking().count()
        );
    }
    Ok(())
}
