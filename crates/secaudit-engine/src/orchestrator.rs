//! Audit orchestrator
//!
//! One pass: detect products, collect (in parallel by default), validate every
//! record, and assemble per-product results. Problems are absorbed into the
//! affected product's result; the caller always gets a partial result.

use crate::catalog::WhitelistCatalog;
use crate::collectors::{CollectError, Collection};
use crate::correlate::{CorrelationCheck, Correlator};
use crate::model::{AuditResult, AuditedException, ExceptionRecord, Product};
use crate::reconcile::{CaseSensitivity, CoverageReconciler, RecommendationSet};
use crate::registry::ProductRegistry;
use crate::staleness::{FsProbe, PathProbe, StalenessValidator};
use rayon::prelude::*;
use secaudit_core::config::AuditConfig;
use secaudit_core::observability;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

/// What happened (or would happen) to one stale exception
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "detail", rename_all = "snake_case")]
pub enum CleanupOutcome {
    /// Dry run: would be removed
    Planned,
    Removed(String),
    Failed(String),
    /// The product offers no automatic removal
    ManualRemovalRequired,
}

impl CleanupOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            CleanupOutcome::Planned => "planned",
            CleanupOutcome::Removed(_) => "removed",
            CleanupOutcome::Failed(_) => "failed",
            CleanupOutcome::ManualRemovalRequired => "manual_removal_required",
        }
    }

    fn detail(&self) -> Option<&str> {
        match self {
            CleanupOutcome::Removed(d) | CleanupOutcome::Failed(d) => Some(d),
            CleanupOutcome::Planned | CleanupOutcome::ManualRemovalRequired => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CleanupAction {
    pub record: ExceptionRecord,
    #[serde(flatten)]
    pub outcome: CleanupOutcome,
}

pub struct Auditor {
    registry: ProductRegistry,
    catalog: Arc<WhitelistCatalog>,
    probe: Arc<dyn PathProbe>,
    validator: StalenessValidator<Arc<dyn PathProbe>>,
    correlator: Correlator,
    case: CaseSensitivity,
    parallel: bool,
}

impl Auditor {
    /// Auditor over the live host: every known collector, the real filesystem,
    /// process table and socket table.
    pub fn new(config: &AuditConfig, catalog: Arc<WhitelistCatalog>) -> Self {
        let timeout = Duration::from_secs(config.collector_timeout_secs);
        Self::with_registry(ProductRegistry::new(timeout), catalog)
            .with_correlator(Correlator::new(timeout))
            .parallel(config.parallel)
    }

    pub fn with_registry(registry: ProductRegistry, catalog: Arc<WhitelistCatalog>) -> Self {
        let probe: Arc<dyn PathProbe> = Arc::new(FsProbe);
        Self {
            registry,
            catalog,
            validator: StalenessValidator::with_probe(Arc::clone(&probe)),
            probe,
            correlator: Correlator::new(Duration::from_secs(
                secaudit_core::config::DEFAULT_COLLECTOR_TIMEOUT_SECS,
            )),
            case: CaseSensitivity::for_host(),
            parallel: true,
        }
    }

    pub fn with_correlator(mut self, correlator: Correlator) -> Self {
        self.correlator = correlator;
        self
    }

    pub fn with_probe(mut self, probe: Box<dyn PathProbe>) -> Self {
        self.probe = Arc::from(probe);
        self.validator = StalenessValidator::with_probe(Arc::clone(&self.probe));
        self
    }

    pub fn with_case(mut self, case: CaseSensitivity) -> Self {
        self.case = case;
        self
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn catalog(&self) -> &WhitelistCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &ProductRegistry {
        &self.registry
    }

    pub fn get_available_products(&self) -> BTreeSet<Product> {
        self.registry.available_products()
    }

    /// Audit the requested products, or every available one when `None`.
    /// Requested but unavailable products get a result holding only an error.
    pub fn audit(&self, requested: Option<&[Product]>) -> BTreeMap<Product, AuditResult> {
        let available = self.registry.available_products();
        let wanted: BTreeSet<Product> = match requested {
            Some(products) => products.iter().copied().collect(),
            None => available.clone(),
        };

        let mut results = BTreeMap::new();
        for product in wanted.difference(&available) {
            let mut result = AuditResult::new(*product);
            let note = if self.registry.collector_for(*product).is_some() {
                format!("{} is not available on this host", product.display_name())
            } else {
                format!("No collector registered for {}", product.display_name())
            };
            tracing::info!(product = %product, "{}", note);
            result.push_error(note);
            results.insert(*product, result);
        }

        let targets: Vec<Product> = wanted.intersection(&available).copied().collect();
        let audited: Vec<(Product, AuditResult)> = if self.parallel {
            targets
                .par_iter()
                .map(|p| (*p, self.audit_product(*p)))
                .collect()
        } else {
            targets.iter().map(|p| (*p, self.audit_product(*p))).collect()
        };
        results.extend(audited);

        let names: Vec<&str> = results.keys().map(|p| p.as_str()).collect();
        let (total, stale, errors) = results.values().fold((0, 0, 0), |acc, r| {
            (acc.0 + r.total_count(), acc.1 + r.stale_count(), acc.2 + r.errors().len())
        });
        observability::audit_completed(&names, total, stale, errors);
        results
    }

    fn audit_product(&self, product: Product) -> AuditResult {
        let mut result = AuditResult::new(product);
        let Some(collector) = self.registry.collector_for(product) else {
            result.push_error(CollectError::Unavailable(product).to_string());
            return result;
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| collector.collect()))
            .unwrap_or_else(|payload| Err(CollectError::Panicked(panic_message(payload.as_ref()))));

        match outcome {
            Ok(Collection {
                records,
                warnings,
                requires_elevation,
            }) => {
                result.set_requires_elevation(requires_elevation);
                for warning in warnings {
                    result.push_warning(warning);
                }
                for record in records {
                    let verdict = self.validator.assess(&record);
                    if let Some(warning) = verdict.warning {
                        result.push_error(warning);
                    }
                    result.push(record, verdict.is_stale);
                }
                tracing::debug!(
                    product = %product,
                    total = result.total_count(),
                    stale = result.stale_count(),
                    "Product audited"
                );
            }
            Err(e) => {
                tracing::warn!(product = %product, error = %e, "Collection failed");
                if e.is_elevation() {
                    result.set_requires_elevation(true);
                }
                result.push_error(e.to_string());
            }
        }
        result
    }

    /// Audit every available product and reconcile the pooled records against the catalog.
    pub fn generate_recommendations(&self) -> RecommendationSet {
        self.recommendations_for(&self.audit(None))
    }

    /// Reconcile already-collected results against the catalog.
    pub fn recommendations_for(&self, results: &BTreeMap<Product, AuditResult>) -> RecommendationSet {
        let pool: Vec<ExceptionRecord> = results
            .values()
            .flat_map(|r| r.exceptions().iter().map(|e| e.record.clone()))
            .collect();
        CoverageReconciler::new(Arc::clone(&self.catalog))
            .with_case(self.case)
            .with_probe(Arc::clone(&self.probe))
            .reconcile(&pool)
    }

    /// Every stale exception across available products
    pub fn find_stale_exceptions(&self) -> Vec<AuditedException> {
        self.audit(None)
            .values()
            .flat_map(|r| r.stale().cloned())
            .collect()
    }

    pub fn check_process_and_port(&self, process: Option<&str>, port: Option<u16>) -> CorrelationCheck {
        self.correlator.check(process, port)
    }

    /// Plan (dry run) or apply removal of every stale exception.
    pub fn cleanup(&self, apply: bool) -> Vec<CleanupAction> {
        self.find_stale_exceptions()
            .into_iter()
            .map(|stale| {
                let record = stale.record;
                let outcome = if apply {
                    self.remove(&record)
                } else {
                    CleanupOutcome::Planned
                };
                if apply {
                    observability::audit_cleanup_action(
                        record.product().as_str(),
                        record.target(),
                        outcome.label(),
                        outcome.detail(),
                    );
                }
                CleanupAction { record, outcome }
            })
            .collect()
    }

    fn remove(&self, record: &ExceptionRecord) -> CleanupOutcome {
        let Some(collector) = self.registry.collector_for(record.product()) else {
            return CleanupOutcome::ManualRemovalRequired;
        };
        match collector.remove(record) {
            Ok(message) => CleanupOutcome::Removed(message),
            Err(CollectError::RemovalUnsupported(_)) => CleanupOutcome::ManualRemovalRequired,
            Err(e) => {
                tracing::warn!(record = %record, error = %e, "Removal failed");
                CleanupOutcome::Failed(e.to_string())
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Category, WhitelistEntry};
    use crate::collectors::ExceptionCollector;
    use crate::model::ExceptionKind;
    use std::sync::Mutex;

    struct Fake {
        product: Product,
        available: bool,
        records: Vec<(ExceptionKind, String)>,
        removed: Mutex<Vec<String>>,
        removable: bool,
    }

    impl Fake {
        fn new(product: Product, records: &[(ExceptionKind, &str)]) -> Self {
            Self {
                product,
                available: true,
                records: records.iter().map(|(k, t)| (*k, t.to_string())).collect(),
                removed: Mutex::new(Vec::new()),
                removable: false,
            }
        }
    }

    impl ExceptionCollector for Fake {
        fn product(&self) -> Product {
            self.product
        }
        fn is_available(&self) -> bool {
            self.available
        }
        fn collect(&self) -> Result<Collection, CollectError> {
            let records = self
                .records
                .iter()
                .map(|(k, t)| ExceptionRecord::new(self.product, *k, t.as_str()))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Collection::from_records(records))
        }
        fn remove(&self, record: &ExceptionRecord) -> Result<String, CollectError> {
            if !self.removable {
                return Err(CollectError::RemovalUnsupported(self.product));
            }
            if let Ok(mut removed) = self.removed.lock() {
                removed.push(record.target().to_string());
            }
            Ok(format!("Removed exclusion: {}", record.target()))
        }
    }

    struct Failing;

    impl ExceptionCollector for Failing {
        fn product(&self) -> Product {
            Product::WindowsFirewall
        }
        fn is_available(&self) -> bool {
            true
        }
        fn collect(&self) -> Result<Collection, CollectError> {
            Err(CollectError::ElevationRequired {
                tool: "powershell".to_string(),
                detail: "Access is denied".to_string(),
            })
        }
    }

    struct Panicking;

    impl ExceptionCollector for Panicking {
        fn product(&self) -> Product {
            Product::LinuxFirewall
        }
        fn is_available(&self) -> bool {
            true
        }
        fn collect(&self) -> Result<Collection, CollectError> {
            panic!("collector exploded")
        }
    }

    fn catalog() -> Arc<WhitelistCatalog> {
        Arc::new(
            WhitelistCatalog::new(vec![WhitelistEntry::new(
                "python",
                "Python Runtime",
                Category::Runtime,
                "runtime",
            )
            .with_paths(&["/opt/py/bin/python"])])
            .unwrap(),
        )
    }

    fn auditor(collectors: Vec<Box<dyn ExceptionCollector>>) -> Auditor {
        Auditor::with_registry(ProductRegistry::with_collectors(collectors), catalog())
            .with_case(CaseSensitivity::Sensitive)
    }

    #[test]
    fn test_failures_are_isolated_per_product() {
        let dir = tempfile::tempdir().unwrap();
        let existing = dir.path().to_string_lossy().to_string();
        for parallel in [true, false] {
            let a = auditor(vec![
                Box::new(Fake::new(Product::Defender, &[(ExceptionKind::Folder, existing.as_str())])),
                Box::new(Failing),
                Box::new(Panicking),
            ])
            .parallel(parallel);
            let results = a.audit(None);
            assert_eq!(results.len(), 3);
            assert_eq!(results[&Product::Defender].total_count(), 1);
            assert!(results[&Product::Defender].errors().is_empty());
            let fw = &results[&Product::WindowsFirewall];
            assert!(fw.requires_elevation());
            assert_eq!(fw.errors().len(), 1);
            assert!(results[&Product::LinuxFirewall].errors()[0].contains("collector exploded"));
        }
    }

    #[test]
    fn test_requested_but_unavailable_gets_note() {
        let mut unavailable = Fake::new(Product::Bitdefender, &[]);
        unavailable.available = false;
        let a = auditor(vec![Box::new(Fake::new(Product::Defender, &[])), Box::new(unavailable)]);
        let results = a.audit(Some(&[Product::Bitdefender, Product::LinuxFirewall]));
        assert_eq!(results.len(), 2);
        assert!(results[&Product::Bitdefender].errors()[0].contains("not available"));
        assert!(results[&Product::LinuxFirewall].errors()[0].contains("No collector"));
        assert!(!results.contains_key(&Product::Defender));
    }

    #[test]
    fn test_empty_registry_audits_nothing() {
        let a = auditor(Vec::new());
        assert!(a.get_available_products().is_empty());
        assert!(a.audit(None).is_empty());
    }

    #[test]
    fn test_permission_denied_is_recorded_as_error_not_stale() {
        struct Denied;
        impl PathProbe for Denied {
            fn probe(&self, _path: &std::path::Path) -> std::io::Result<()> {
                Err(std::io::Error::from(std::io::ErrorKind::PermissionDenied))
            }
        }
        let a = auditor(vec![Box::new(Fake::new(
            Product::Defender,
            &[(ExceptionKind::Path, "/root/secret")],
        ))])
        .with_probe(Box::new(Denied));
        let result = &a.audit(None)[&Product::Defender];
        assert_eq!(result.stale_count(), 0);
        assert_eq!(result.active_count(), 1);
        assert_eq!(result.errors().len(), 1);
    }

    #[test]
    fn test_cleanup_dry_run_and_apply() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("old").join("app").to_string_lossy().to_string();
        let mut defender = Fake::new(Product::Defender, &[(ExceptionKind::Path, gone.as_str())]);
        defender.removable = true;
        let a = auditor(vec![
            Box::new(defender),
            Box::new(Fake::new(Product::Bitdefender, &[(ExceptionKind::Path, gone.as_str())])),
        ]);

        let planned = a.cleanup(false);
        assert_eq!(planned.len(), 2);
        assert!(planned.iter().all(|c| c.outcome == CleanupOutcome::Planned));

        let applied = a.cleanup(true);
        assert!(matches!(applied[0].outcome, CleanupOutcome::Removed(_)));
        assert_eq!(applied[1].outcome, CleanupOutcome::ManualRemovalRequired);
    }

    #[test]
    fn test_recommendations_use_injected_probe_for_installed() {
        struct Nothing;
        impl PathProbe for Nothing {
            fn probe(&self, _path: &std::path::Path) -> std::io::Result<()> {
                Err(std::io::Error::from(std::io::ErrorKind::NotFound))
            }
        }
        let a = auditor(vec![Box::new(Fake::new(Product::Defender, &[]))]).with_probe(Box::new(Nothing));
        let set = a.generate_recommendations();
        assert_eq!(set.missing[0].installed, Some(false));
        assert!(set.installed_only().missing.is_empty());
    }

    #[test]
    fn test_recommendations_pool_all_products() {
        let a = auditor(vec![
            Box::new(Fake::new(Product::Defender, &[(ExceptionKind::Folder, "/opt/py/")])),
            Box::new(Fake::new(Product::Bitdefender, &[(ExceptionKind::Folder, "/opt/py/")])),
        ]);
        let set = a.generate_recommendations();
        assert_eq!(set.covered.len(), 1);
        assert!(set.missing.is_empty());
    }
}
