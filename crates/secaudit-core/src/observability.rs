//! Observability: tracing init and the JSONL audit trail.
//!
//! Uses config::ObservabilityConfig for SECAUDIT_QUIET, LOG_LEVEL, LOG_JSON, AUDIT_LOG.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

static AUDIT_PATH: Mutex<Option<String>> = Mutex::new(None);

/// Tracing initialization mode.
#[derive(Clone, Copy)]
pub enum TracingMode {
    /// Use SECAUDIT_LOG_LEVEL / SECAUDIT_QUIET from env
    Default,
    /// `--verbose`: force debug for secaudit targets
    Verbose,
}

/// Initialize tracing. Call at process startup.
/// Logs go to stderr; stdout is reserved for reports.
pub fn init_tracing(mode: TracingMode) {
    let cfg = crate::config::ObservabilityConfig::from_env();
    let level = match mode {
        TracingMode::Verbose => "secaudit=debug".to_string(),
        TracingMode::Default if cfg.quiet => "secaudit=warn".to_string(),
        TracingMode::Default => cfg.log_level.clone(),
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let _ = if cfg.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

fn get_audit_path() -> Option<String> {
    {
        let guard = AUDIT_PATH.lock().ok()?;
        if let Some(ref p) = *guard {
            return Some(p.clone());
        }
    }
    let path = crate::config::ObservabilityConfig::from_env()
        .audit_log
        .clone()?;
    if let Some(parent) = Path::new(&path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    {
        let mut guard = AUDIT_PATH.lock().ok()?;
        *guard = Some(path.clone());
    }
    Some(path)
}

fn append_jsonl(path: &str, record: &serde_json::Value) {
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Audit trail: one audit pass finished
pub fn audit_completed(products: &[&str], total: usize, stale: usize, errors: usize) {
    tracing::info!(
        products = %products.join(","),
        total,
        stale,
        errors,
        "Audit completed"
    );
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": timestamp(),
            "event": "audit_completed",
            "products": products,
            "total_exceptions": total,
            "stale_exceptions": stale,
            "errors": errors,
        });
        append_jsonl(&path, &record);
    }
}

/// Audit trail: a stale exception was planned, removed, skipped or failed
pub fn audit_cleanup_action(product: &str, target: &str, outcome: &str, detail: Option<&str>) {
    tracing::info!(
        product = %product,
        target = %target,
        outcome = %outcome,
        "Cleanup action"
    );
    if let Some(path) = get_audit_path() {
        let record = json!({
            "ts": timestamp(),
            "event": "cleanup_action",
            "product": product,
            "target": target,
            "outcome": outcome,
            "detail": detail,
        });
        append_jsonl(&path, &record);
    }
}
