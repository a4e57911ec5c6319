//! Canonical exception model
//!
//! Every collector normalizes its product-specific output into these types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while building model values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ModelError {
    #[error("Exception target must not be empty ({product}:{kind})")]
    EmptyTarget { product: Product, kind: ExceptionKind },

    #[error("Unknown product '{0}' (expected one of: defender, bitdefender, windows_firewall, linux_firewall)")]
    UnknownProduct(String),
}

/// Security products the engine knows how to audit.
///
/// Ordering is the declaration order and drives report ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Product {
    Defender,
    Bitdefender,
    WindowsFirewall,
    LinuxFirewall,
}

impl Product {
    pub const ALL: [Product; 4] = [
        Product::Defender,
        Product::Bitdefender,
        Product::WindowsFirewall,
        Product::LinuxFirewall,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Product::Defender => "defender",
            Product::Bitdefender => "bitdefender",
            Product::WindowsFirewall => "windows_firewall",
            Product::LinuxFirewall => "linux_firewall",
        }
    }

    /// Human-readable name for report headings
    pub fn display_name(&self) -> &'static str {
        match self {
            Product::Defender => "Windows Defender",
            Product::Bitdefender => "Bitdefender",
            Product::WindowsFirewall => "Windows Firewall",
            Product::LinuxFirewall => "Linux Firewall",
        }
    }
}

impl fmt::Display for Product {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Product {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        Product::ALL
            .into_iter()
            .find(|p| p.as_str() == normalized)
            .ok_or_else(|| ModelError::UnknownProduct(s.to_string()))
    }
}

/// What an exception targets. Drives staleness and coverage semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceptionKind {
    Path,
    Folder,
    Process,
    Extension,
    FirewallRule,
}

impl ExceptionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExceptionKind::Path => "path",
            ExceptionKind::Folder => "folder",
            ExceptionKind::Process => "process",
            ExceptionKind::Extension => "extension",
            ExceptionKind::FirewallRule => "firewall_rule",
        }
    }

    /// Kinds whose target is a filesystem location
    pub fn is_filesystem(&self) -> bool {
        matches!(self, ExceptionKind::Path | ExceptionKind::Folder)
    }
}

impl fmt::Display for ExceptionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One security-exception entry as reported by a product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExceptionRecord {
    product: Product,
    kind: ExceptionKind,
    target: String,
    /// Product-specific fields (direction, protocol, source file, ...). Not interpreted by the engine.
    raw_metadata: BTreeMap<String, serde_json::Value>,
}

impl ExceptionRecord {
    /// Build a record. The target is trimmed and must be non-empty.
    pub fn new(
        product: Product,
        kind: ExceptionKind,
        target: impl Into<String>,
    ) -> Result<Self, ModelError> {
        let target = target.into().trim().to_string();
        if target.is_empty() {
            return Err(ModelError::EmptyTarget { product, kind });
        }
        Ok(Self {
            product,
            kind,
            target,
            raw_metadata: BTreeMap::new(),
        })
    }

    /// Attach a metadata field
    pub fn with_metadata(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.raw_metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn product(&self) -> Product {
        self.product
    }

    pub fn kind(&self) -> ExceptionKind {
        self.kind
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn raw_metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.raw_metadata
    }

    /// Canonical ordering key, independent of collection order
    pub(crate) fn sort_key(&self) -> (ExceptionKind, &str, Product) {
        (self.kind, self.target.as_str(), self.product)
    }
}

impl fmt::Display for ExceptionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} -> {}", self.product, self.kind, self.target)
    }
}

/// A collected record plus the validator's verdict.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditedException {
    #[serde(flatten)]
    pub record: ExceptionRecord,
    pub is_stale: bool,
}

impl AuditedException {
    pub fn status_label(&self) -> &'static str {
        if self.is_stale {
            "[STALE]"
        } else {
            "[OK]"
        }
    }
}

/// Per-product audit outcome. Counts are maintained by [`AuditResult::push`]
/// so `total_count == active_count + stale_count` always holds.
#[derive(Debug, Clone, Serialize)]
pub struct AuditResult {
    product: Product,
    audited_at: DateTime<Utc>,
    total_count: usize,
    active_count: usize,
    stale_count: usize,
    requires_elevation: bool,
    exceptions: Vec<AuditedException>,
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl AuditResult {
    pub fn new(product: Product) -> Self {
        Self {
            product,
            audited_at: Utc::now(),
            total_count: 0,
            active_count: 0,
            stale_count: 0,
            requires_elevation: false,
            exceptions: Vec::new(),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Append a validated record, keeping the counters in sync
    pub fn push(&mut self, record: ExceptionRecord, is_stale: bool) {
        self.total_count += 1;
        if is_stale {
            self.stale_count += 1;
        } else {
            self.active_count += 1;
        }
        self.exceptions.push(AuditedException { record, is_stale });
    }

    pub fn push_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn push_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn set_requires_elevation(&mut self, value: bool) {
        self.requires_elevation = value;
    }

    pub fn product(&self) -> Product {
        self.product
    }

    pub fn audited_at(&self) -> DateTime<Utc> {
        self.audited_at
    }

    pub fn total_count(&self) -> usize {
        self.total_count
    }

    pub fn active_count(&self) -> usize {
        self.active_count
    }

    pub fn stale_count(&self) -> usize {
        self.stale_count
    }

    pub fn requires_elevation(&self) -> bool {
        self.requires_elevation
    }

    pub fn exceptions(&self) -> &[AuditedException] {
        &self.exceptions
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn stale(&self) -> impl Iterator<Item = &AuditedException> {
        self.exceptions.iter().filter(|e| e.is_stale)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_rejects_empty_target() {
        let err = ExceptionRecord::new(Product::Defender, ExceptionKind::Path, "   ").unwrap_err();
        assert_eq!(
            err,
            ModelError::EmptyTarget {
                product: Product::Defender,
                kind: ExceptionKind::Path
            }
        );
    }

    #[test]
    fn test_record_trims_and_keeps_metadata() {
        let rec = ExceptionRecord::new(Product::LinuxFirewall, ExceptionKind::FirewallRule, " 22/tcp ALLOW IN ")
            .unwrap()
            .with_metadata("tool", "ufw");
        assert_eq!(rec.target(), "22/tcp ALLOW IN");
        assert_eq!(rec.raw_metadata()["tool"], "ufw");
        assert_eq!(rec.to_string(), "linux_firewall:firewall_rule -> 22/tcp ALLOW IN");
    }

    #[test]
    fn test_product_parse() {
        assert_eq!("defender".parse::<Product>().unwrap(), Product::Defender);
        assert_eq!("Windows-Firewall".parse::<Product>().unwrap(), Product::WindowsFirewall);
        assert!(matches!(
            "norton".parse::<Product>(),
            Err(ModelError::UnknownProduct(_))
        ));
    }

    #[test]
    fn test_audit_result_counts() {
        let mut result = AuditResult::new(Product::Defender);
        let rec = |t: &str| ExceptionRecord::new(Product::Defender, ExceptionKind::Path, t).unwrap();
        result.push(rec("C:\\a"), false);
        result.push(rec("C:\\b"), true);
        result.push(rec("C:\\c"), false);

        assert_eq!(result.total_count(), 3);
        assert_eq!(result.active_count(), 2);
        assert_eq!(result.stale_count(), 1);
        assert_eq!(result.stale().count(), 1);
        assert_eq!(result.exceptions()[1].status_label(), "[STALE]");
    }

    #[test]
    fn test_audit_result_serializes_flat_records() {
        let mut result = AuditResult::new(Product::Bitdefender);
        result.push(
            ExceptionRecord::new(Product::Bitdefender, ExceptionKind::Folder, "D:\\tools").unwrap(),
            false,
        );
        result.push_error("Test error");

        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["product"], "bitdefender");
        assert_eq!(value["total_count"], 1);
        assert_eq!(value["exceptions"][0]["kind"], "folder");
        assert_eq!(value["exceptions"][0]["is_stale"], false);
        assert_eq!(value["errors"][0], "Test error");
    }
}
