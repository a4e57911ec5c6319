//! `secaudit cleanup`: dry run by default, `--apply` removes.

use anyhow::Result;
use secaudit_engine::report::format_cleanup;
use secaudit_engine::{Auditor, CleanupOutcome};

pub fn cmd_cleanup(auditor: &Auditor, apply: bool) -> Result<()> {
    eprintln!("[*] Scanning for stale exceptions...");
    if apply {
        eprintln!("[!] Removing stale exceptions...");
    }
    let actions = auditor.cleanup(apply);
    println!("{}", format_cleanup(&actions, apply));

    let failed = actions
        .iter()
        .filter(|a| matches!(a.outcome, CleanupOutcome::Failed(_)))
        .count();
    if failed > 0 {
        tracing::warn!(failed, "Some stale exceptions could not be removed");
    }
    Ok(())
}
