//! Environment variable key constants.
//!
//! Primary keys use the `SECAUDIT_*` prefix.

/// Logging and audit trail
pub mod observability {
    pub const SECAUDIT_QUIET: &str = "SECAUDIT_QUIET";
    pub const SECAUDIT_LOG_LEVEL: &str = "SECAUDIT_LOG_LEVEL";
    pub const SECAUDIT_LOG_JSON: &str = "SECAUDIT_LOG_JSON";
    /// JSONL file receiving `audit_completed` / `cleanup_action` records.
    pub const SECAUDIT_AUDIT_LOG: &str = "SECAUDIT_AUDIT_LOG";
}

/// Audit engine behaviour
pub mod audit {
    /// Path to a YAML whitelist catalog override.
    pub const SECAUDIT_CATALOG: &str = "SECAUDIT_CATALOG";
    /// Timeout applied to every external collector tool (seconds).
    pub const SECAUDIT_COLLECTOR_TIMEOUT_SECS: &str = "SECAUDIT_COLLECTOR_TIMEOUT_SECS";
    /// Run per-product collectors concurrently (default on).
    pub const SECAUDIT_PARALLEL: &str = "SECAUDIT_PARALLEL";
}

/// Catalog file names probed in the working directory when `SECAUDIT_CATALOG` is unset.
pub const CATALOG_FILE_NAMES: &[&str] = &[
    ".secaudit-catalog.yaml",
    ".secaudit-catalog.yml",
    "secaudit-catalog.yaml",
];
