//! Security exception reconciliation and diagnostics.
//!
//! Collects exception lists from security products, flags stale entries,
//! checks a whitelist catalog for coverage, and correlates process/port state.

pub mod catalog;
pub mod collectors;
pub mod common;
pub mod correlate;
pub mod model;
pub mod orchestrator;
pub mod reconcile;
pub mod registry;
pub mod report;
pub mod staleness;

pub use catalog::{CatalogConfig, CatalogError, Category, WhitelistCatalog, WhitelistEntry};
pub use collectors::{CollectError, Collection, ExceptionCollector};
pub use correlate::{CorrelationCheck, Correlator, Diagnosis};
pub use model::{AuditResult, AuditedException, ExceptionKind, ExceptionRecord, ModelError, Product};
pub use orchestrator::{Auditor, CleanupAction, CleanupOutcome};
pub use reconcile::{CaseSensitivity, CoverageReconciler, RecommendationSet};
pub use registry::ProductRegistry;
pub use staleness::{PathProbe, StalenessValidator};
