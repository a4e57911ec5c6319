//! Whitelist catalog: known development-tool signatures
//!
//! The catalog is built once at startup (built-in entries, optionally adjusted
//! by a YAML file) and shared read-only. Validation happens at build time: an
//! entry that can never be matched is a configuration bug and fails the load.

mod default_entries;

pub use default_entries::get_default_entries;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Malformed catalog entry '{id}': {reason}")]
    Malformed { id: String, reason: String },

    #[error("Duplicate catalog entry id '{0}'")]
    DuplicateId(String),
}

/// Entry category. `runtime` and `server` entries are build-blocking when missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Runtime,
    Server,
    Project,
    Tools,
    Ide,
    Network,
    Custom,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Runtime => "runtime",
            Category::Server => "server",
            Category::Project => "project",
            Category::Tools => "tools",
            Category::Ide => "ide",
            Category::Network => "network",
            Category::Custom => "custom",
        }
    }

    pub fn is_build_blocking(&self) -> bool {
        matches!(self, Category::Runtime | Category::Server)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_category() -> Category {
    Category::Custom
}

/// One catalog row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WhitelistEntry {
    /// Stable key, used to disable or override entries from config
    pub id: String,
    pub name: String,
    #[serde(default = "default_category")]
    pub category: Category,
    /// Candidate paths in preference order; a trailing separator marks a folder
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default)]
    pub ports: Vec<u16>,
    /// Primary executable name, when it differs from the first candidate path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
    #[serde(default)]
    pub reason: String,
}

impl WhitelistEntry {
    pub fn new(id: &str, name: &str, category: Category, reason: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            category,
            paths: Vec::new(),
            ports: Vec::new(),
            process: None,
            reason: reason.to_string(),
        }
    }

    pub fn with_paths(mut self, paths: &[&str]) -> Self {
        self.paths = paths.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_ports(mut self, ports: &[u16]) -> Self {
        self.ports = ports.to_vec();
        self
    }

    pub fn with_process(mut self, process: &str) -> Self {
        self.process = Some(process.to_string());
        self
    }

    fn validate(&self) -> Result<(), CatalogError> {
        let malformed = |reason: &str| CatalogError::Malformed {
            id: self.id.clone(),
            reason: reason.to_string(),
        };
        if self.id.trim().is_empty() {
            return Err(malformed("empty id"));
        }
        if self.name.trim().is_empty() {
            return Err(malformed("empty name"));
        }
        let has_path = self.paths.iter().any(|p| !p.trim().is_empty());
        let has_process = self.process.as_deref().is_some_and(|p| !p.trim().is_empty());
        if !has_path && self.ports.is_empty() && !has_process {
            return Err(malformed("no candidate paths, ports, or process name"));
        }
        Ok(())
    }
}

/// Validated, immutable catalog
#[derive(Debug, Clone)]
pub struct WhitelistCatalog {
    entries: Vec<WhitelistEntry>,
}

impl WhitelistCatalog {
    /// Validate and wrap entries. Declaration order is preserved.
    pub fn new(entries: Vec<WhitelistEntry>) -> Result<Self, CatalogError> {
        let mut ids = HashSet::new();
        for entry in &entries {
            entry.validate()?;
            if !ids.insert(entry.id.as_str()) {
                return Err(CatalogError::DuplicateId(entry.id.clone()));
            }
        }
        Ok(Self { entries })
    }

    /// The compiled-in catalog
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::new(get_default_entries())
    }

    /// Built-in entries adjusted by a config: disabled ids removed, config
    /// entries replace built-ins with the same id or are appended.
    pub fn from_config(config: &CatalogConfig) -> Result<Self, CatalogError> {
        let mut entries: Vec<WhitelistEntry> = if config.use_builtin {
            get_default_entries()
        } else {
            Vec::new()
        };
        entries.retain(|e| !config.disabled.contains(&e.id));

        for custom in &config.entries {
            match entries.iter_mut().find(|e| e.id == custom.id) {
                Some(existing) => *existing = custom.clone(),
                None => entries.push(custom.clone()),
            }
        }
        Self::new(entries)
    }

    /// Load from a YAML file, or the built-in catalog when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let config = CatalogConfig::load_from_file(path)?;
                let catalog = Self::from_config(&config)
                    .with_context(|| format!("Invalid catalog: {}", path.display()))?;
                tracing::info!(path = %path.display(), entries = catalog.len(), "Loaded whitelist catalog");
                Ok(catalog)
            }
            None => Ok(Self::builtin()?),
        }
    }

    pub fn entries(&self) -> &[WhitelistEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&WhitelistEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Catalog configuration file
///
/// ```yaml
/// # .secaudit-catalog.yaml
/// use_builtin: true
/// disabled:
///   - cursor
/// entries:
///   - id: backend
///     name: Team Backend
///     category: project
///     paths: ["D:\\Projects\\backend\\"]
///     ports: [8000, 8001]
///     reason: Backend API under development
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_use_builtin")]
    pub use_builtin: bool,
    #[serde(default)]
    pub disabled: Vec<String>,
    #[serde(default)]
    pub entries: Vec<WhitelistEntry>,
}

fn default_use_builtin() -> bool {
    true
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            use_builtin: true,
            disabled: Vec::new(),
            entries: Vec::new(),
        }
    }
}

impl CatalogConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog config: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse catalog config: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog_is_valid() {
        let catalog = WhitelistCatalog::builtin().unwrap();
        assert!(!catalog.is_empty());
        assert!(catalog.get("python").is_some());
        assert_eq!(catalog.get("uvicorn").unwrap().ports, vec![8000, 8001, 8080]);
    }

    #[test]
    fn test_entry_without_candidates_fails_fast() {
        let entry = WhitelistEntry::new("empty", "Empty", Category::Tools, "nothing");
        let err = WhitelistCatalog::new(vec![entry]).unwrap_err();
        assert!(matches!(err, CatalogError::Malformed { ref id, .. } if id == "empty"));
    }

    #[test]
    fn test_process_only_and_port_only_entries_are_valid() {
        let entries = vec![
            WhitelistEntry::new("proc", "Proc", Category::Tools, "").with_process("tool"),
            WhitelistEntry::new("port", "Port", Category::Network, "").with_ports(&[9000]),
        ];
        assert_eq!(WhitelistCatalog::new(entries).unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_ids_rejected() {
        let entry = WhitelistEntry::new("x", "X", Category::Tools, "").with_paths(&["/x"]);
        let err = WhitelistCatalog::new(vec![entry.clone(), entry]).unwrap_err();
        assert_eq!(err, CatalogError::DuplicateId("x".to_string()));
    }

    #[test]
    fn test_category_build_blocking() {
        assert!(Category::Runtime.is_build_blocking());
        assert!(Category::Server.is_build_blocking());
        assert!(!Category::Ide.is_build_blocking());
    }

    #[test]
    fn test_config_overrides_disables_and_appends() {
        let yaml = r#"
disabled: [cursor]
entries:
  - id: python
    name: Team Python
    category: runtime
    paths: ["/opt/py/bin/python"]
    reason: pinned interpreter
  - id: backend
    name: Backend
    category: project
    ports: [8000]
"#;
        let config: CatalogConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(config.use_builtin);
        let catalog = WhitelistCatalog::from_config(&config).unwrap();
        assert!(catalog.get("cursor").is_none());
        assert_eq!(catalog.get("python").unwrap().name, "Team Python");
        assert_eq!(catalog.entries()[0].id, "python");
        assert_eq!(catalog.entries().last().unwrap().id, "backend");
    }

    #[test]
    fn test_load_from_file_without_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".secaudit-catalog.yaml");
        std::fs::write(
            &path,
            "use_builtin: false\nentries:\n  - id: only\n    name: Only\n    process: only-tool\n",
        )
        .unwrap();
        let catalog = WhitelistCatalog::load(Some(&path)).unwrap();
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.entries()[0].category, Category::Custom);
    }

    #[test]
    fn test_load_rejects_malformed_file_entry() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.yaml");
        std::fs::write(&path, "entries:\n  - id: broken\n    name: Broken\n").unwrap();
        assert!(WhitelistCatalog::load(Some(&path)).is_err());
    }
}
