//! Bitdefender exclusions, best effort.
//!
//! Bitdefender exposes no query interface, so this collector walks its
//! configuration directories and extracts drive-letter paths from config files.
//! Results may be incomplete; the collection always carries a warning saying so.

use super::{CollectError, Collection, ExceptionCollector};
use crate::model::{ExceptionKind, ExceptionRecord, Product};
use regex::Regex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use walkdir::WalkDir;

const LIMITED_API_WARNING: &str = "Bitdefender has limited API access. Results may be incomplete. \
Check the Bitdefender console for the full exclusion list.";

const NOTHING_FOUND_WARNING: &str =
    "Could not find parseable exclusion data. Manual export from the Bitdefender console recommended.";

pub struct BitdefenderCollector {
    config_dirs: Vec<PathBuf>,
    install_dirs: Vec<PathBuf>,
}

impl Default for BitdefenderCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl BitdefenderCollector {
    /// Default Windows install and config locations
    pub fn new() -> Self {
        let program_data = secaudit_core::config::env_or("ProgramData", || {
            "C:\\ProgramData".to_string()
        });
        let mut config_dirs = vec![PathBuf::from(program_data).join("Bitdefender")];
        if let Some(home) = dirs::home_dir() {
            config_dirs.push(home.join("AppData").join("Roaming").join("Bitdefender"));
        }
        Self {
            config_dirs,
            install_dirs: vec![
                PathBuf::from("C:\\Program Files\\Bitdefender"),
                PathBuf::from("C:\\Program Files (x86)\\Bitdefender"),
            ],
        }
    }

    pub fn with_locations(config_dirs: Vec<PathBuf>, install_dirs: Vec<PathBuf>) -> Self {
        Self {
            config_dirs,
            install_dirs,
        }
    }
}

impl ExceptionCollector for BitdefenderCollector {
    fn product(&self) -> Product {
        Product::Bitdefender
    }

    fn is_available(&self) -> bool {
        cfg!(windows)
            && self
                .install_dirs
                .iter()
                .chain(self.config_dirs.iter())
                .any(|p| p.exists())
    }

    fn collect(&self) -> Result<Collection, CollectError> {
        Ok(scan_config_dirs(&self.config_dirs))
    }
}

/// Walk the given directories and collect excepted paths found in config files.
pub fn scan_config_dirs(dirs: &[PathBuf]) -> Collection {
    let mut collection = Collection::default();
    collection.warnings.push(LIMITED_API_WARNING.to_string());
    let mut seen: HashSet<String> = HashSet::new();

    for dir in dirs.iter().filter(|d| d.exists()) {
        for entry in WalkDir::new(dir).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    if e
                        .io_error()
                        .is_some_and(|io| io.kind() == std::io::ErrorKind::PermissionDenied)
                    {
                        collection.requires_elevation = true;
                    }
                    continue;
                }
            };
            if !entry.file_type().is_file() || !is_config_file(entry.path()) {
                continue;
            }
            let content = match std::fs::read(entry.path()) {
                Ok(bytes) => String::from_utf8_lossy(&bytes).to_string(),
                Err(e) => {
                    if e.kind() == std::io::ErrorKind::PermissionDenied {
                        collection.requires_elevation = true;
                    }
                    tracing::debug!(path = %entry.path().display(), error = %e, "Skipping unreadable config file");
                    continue;
                }
            };
            for path in extract_config_paths(&content) {
                if !seen.insert(path.clone()) {
                    continue;
                }
                let kind = if path.ends_with('\\') {
                    ExceptionKind::Folder
                } else {
                    ExceptionKind::Path
                };
                match ExceptionRecord::new(Product::Bitdefender, kind, path) {
                    Ok(rec) => collection.records.push(
                        rec.with_metadata("source_file", entry.path().display().to_string()),
                    ),
                    Err(e) => tracing::debug!(error = %e, "Dropping empty path"),
                }
            }
        }
    }

    if collection.requires_elevation {
        collection
            .warnings
            .push("Some Bitdefender config files could not be read without admin privileges".to_string());
    }
    if collection.records.is_empty() {
        collection.warnings.push(NOTHING_FOUND_WARNING.to_string());
    }
    collection
}

/// Config files worth inspecting: `*.xml`, `*.json`, `*.ini`, `settings*`, `exclusions*`
fn is_config_file(path: &Path) -> bool {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    matches!(ext.as_str(), "xml" | "json" | "ini")
        || name.starts_with("settings")
        || name.starts_with("exclusions")
}

fn drive_path_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| match Regex::new(r#"[A-Za-z]:\\[^"'<>|?*\r\n]+"#) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!("Failed to compile drive path pattern: {}", e);
            None
        }
    })
    .as_ref()
}

/// Extract drive-letter paths from config text, skipping Bitdefender's own paths.
/// Escaped separators (`\\` in JSON) are collapsed to a single `\`.
pub fn extract_config_paths(content: &str) -> Vec<String> {
    let Some(re) = drive_path_regex() else {
        return Vec::new();
    };
    re.find_iter(content)
        .map(|m| collapse_backslashes(m.as_str().trim_end_matches([' ', '\t', ',', ';'])))
        .filter(|p| !p.to_lowercase().contains("bitdefender"))
        .collect()
}

fn collapse_backslashes(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    for c in path.chars() {
        if c == '\\' && out.ends_with('\\') {
            continue;
        }
        out.push(c);
    }
    out
}
