//! Config structs grouped by concern, loaded from the environment.

use super::env_keys::{audit as audit_keys, observability as obv_keys, CATALOG_FILE_NAMES};
use super::loader::{env_bool, env_optional, env_or, load_dotenv};
use std::path::{Path, PathBuf};

/// Default timeout for external collector tools.
pub const DEFAULT_COLLECTOR_TIMEOUT_SECS: u64 = 30;

/// Observability: quiet, log_level, log_json, audit_log
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub log_level: String,
    pub log_json: bool,
    pub audit_log: Option<String>,
}

impl ObservabilityConfig {
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            load_dotenv();
            Self {
                quiet: env_bool(obv_keys::SECAUDIT_QUIET, false),
                log_level: env_or(obv_keys::SECAUDIT_LOG_LEVEL, || {
                    "secaudit=info".to_string()
                }),
                log_json: env_bool(obv_keys::SECAUDIT_LOG_JSON, false),
                audit_log: env_optional(obv_keys::SECAUDIT_AUDIT_LOG),
            }
        })
    }
}

/// Audit engine configuration
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Whitelist catalog override file, if any
    pub catalog_path: Option<PathBuf>,
    pub collector_timeout_secs: u64,
    /// Run collectors concurrently across products
    pub parallel: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            catalog_path: None,
            collector_timeout_secs: DEFAULT_COLLECTOR_TIMEOUT_SECS,
            parallel: true,
        }
    }
}

impl AuditConfig {
    /// Load from env. Catalog lookup order: `SECAUDIT_CATALOG`, then the
    /// well-known file names in the working directory, then `~/.secaudit/catalog.yaml`.
    pub fn from_env() -> Self {
        load_dotenv();
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        let catalog_path = env_optional(audit_keys::SECAUDIT_CATALOG)
            .map(PathBuf::from)
            .or_else(|| discover_catalog(&cwd, dirs::home_dir().as_deref()));
        let collector_timeout_secs = env_optional(audit_keys::SECAUDIT_COLLECTOR_TIMEOUT_SECS)
            .and_then(|s| s.parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .unwrap_or(DEFAULT_COLLECTOR_TIMEOUT_SECS);
        Self {
            catalog_path,
            collector_timeout_secs,
            parallel: env_bool(audit_keys::SECAUDIT_PARALLEL, true),
        }
    }

    /// Apply CLI overrides on top of env values.
    pub fn with_cli_overrides(
        mut self,
        catalog: Option<PathBuf>,
        timeout_secs: Option<u64>,
        sequential: bool,
    ) -> Self {
        if let Some(path) = catalog {
            self.catalog_path = Some(path);
        }
        if let Some(secs) = timeout_secs.filter(|s| *s > 0) {
            self.collector_timeout_secs = secs;
        }
        if sequential {
            self.parallel = false;
        }
        self
    }
}

/// Find a catalog override file in `dir`, else under `home/.secaudit/`.
pub fn discover_catalog(dir: &Path, home: Option<&Path>) -> Option<PathBuf> {
    CATALOG_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
        .or_else(|| {
            home.map(|h| h.join(".secaudit").join("catalog.yaml"))
                .filter(|p| p.is_file())
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discover_catalog_prefers_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(home.path().join(".secaudit")).unwrap();
        std::fs::write(home.path().join(".secaudit/catalog.yaml"), "entries: []").unwrap();

        let found = discover_catalog(dir.path(), Some(home.path())).unwrap();
        assert!(found.starts_with(home.path()));

        std::fs::write(dir.path().join(".secaudit-catalog.yaml"), "entries: []").unwrap();
        let found = discover_catalog(dir.path(), Some(home.path())).unwrap();
        assert_eq!(found, dir.path().join(".secaudit-catalog.yaml"));
    }

    #[test]
    fn test_discover_catalog_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_catalog(dir.path(), None).is_none());
    }

    #[test]
    fn test_cli_overrides() {
        let cfg = AuditConfig::default().with_cli_overrides(
            Some(PathBuf::from("custom.yaml")),
            Some(5),
            true,
        );
        assert_eq!(cfg.catalog_path, Some(PathBuf::from("custom.yaml")));
        assert_eq!(cfg.collector_timeout_secs, 5);
        assert!(!cfg.parallel);

        let cfg = AuditConfig::default().with_cli_overrides(None, Some(0), false);
        assert_eq!(cfg.collector_timeout_secs, DEFAULT_COLLECTOR_TIMEOUT_SECS);
        assert!(cfg.parallel);
    }
}
