//! Per-product exception collectors.
//!
//! The engine depends only on [`ExceptionCollector`]: "produce the exception
//! records for this product, or fail". One implementation per product; the
//! [`crate::registry::ProductRegistry`] selects them by [`Product`] tag.

pub mod bitdefender;
pub mod defender;
pub mod linux_firewall;
pub mod windows_firewall;

use crate::model::{ExceptionRecord, ModelError, Product};
use thiserror::Error;

pub use bitdefender::BitdefenderCollector;
pub use defender::DefenderCollector;
pub use linux_firewall::LinuxFirewallCollector;
pub use windows_firewall::WindowsFirewallCollector;

/// Collection failures. Always absorbed per product by the orchestrator.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("{tool} not found")]
    ToolNotFound { tool: String },

    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error("{tool} requires elevated privileges: {detail}")]
    ElevationRequired { tool: String, detail: String },

    #[error("{tool} exited with code {code}: {stderr}")]
    ToolFailed {
        tool: String,
        code: i32,
        stderr: String,
    },

    #[error("Failed to parse {what}: {detail}")]
    Parse { what: String, detail: String },

    #[error("{0} is not available on this host")]
    Unavailable(Product),

    #[error("Automatic removal is not supported for {0}; remove it manually")]
    RemovalUnsupported(Product),

    #[error("Collector panicked: {0}")]
    Panicked(String),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CollectError {
    pub fn is_elevation(&self) -> bool {
        matches!(self, CollectError::ElevationRequired { .. })
    }
}

/// Normalized output of one collector run
#[derive(Debug, Default)]
pub struct Collection {
    pub records: Vec<ExceptionRecord>,
    /// Informational notes (partial data, missing optional tools, ...)
    pub warnings: Vec<String>,
    pub requires_elevation: bool,
}

impl Collection {
    pub fn from_records(records: Vec<ExceptionRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }
}

/// Capability implemented once per security product.
pub trait ExceptionCollector: Send + Sync {
    fn product(&self) -> Product;

    /// Cheap capability probe: never collects, never fails.
    fn is_available(&self) -> bool;

    /// Read the product's current exceptions. Implementations bound every
    /// external call with a timeout.
    fn collect(&self) -> Result<Collection, CollectError>;

    /// Remove one exception from the live configuration. Only called on an
    /// explicit non-dry-run cleanup. Returns a human-readable confirmation.
    fn remove(&self, _record: &ExceptionRecord) -> Result<String, CollectError> {
        Err(CollectError::RemovalUnsupported(self.product()))
    }
}

/// Accept a JSON value that PowerShell emits as either a scalar or an array.
/// Blank strings are dropped.
pub(crate) fn json_string_list(value: Option<&serde_json::Value>) -> Vec<String> {
    let items: Vec<String> = match value {
        Some(serde_json::Value::String(s)) => vec![s.clone()],
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };
    items.into_iter().filter(|s| !s.trim().is_empty()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_json_string_list_shapes() {
        assert_eq!(json_string_list(Some(&json!("a"))), vec!["a"]);
        assert_eq!(json_string_list(Some(&json!(["a", 1, "", "b"]))), vec!["a", "b"]);
        assert!(json_string_list(Some(&json!(null))).is_empty());
        assert!(json_string_list(None).is_empty());
    }

    struct NoRemoval;

    impl ExceptionCollector for NoRemoval {
        fn product(&self) -> Product {
            Product::Bitdefender
        }
        fn is_available(&self) -> bool {
            true
        }
        fn collect(&self) -> Result<Collection, CollectError> {
            Ok(Collection::default())
        }
    }

    #[test]
    fn test_default_remove_is_unsupported() {
        let rec = ExceptionRecord::new(Product::Bitdefender, crate::model::ExceptionKind::Path, "C:\\x").unwrap();
        let err = NoRemoval.remove(&rec).unwrap_err();
        assert!(matches!(err, CollectError::RemovalUnsupported(Product::Bitdefender)));
    }
}
