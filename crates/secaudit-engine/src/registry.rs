//! Product registry: which collectors exist and which are usable on this host.

use crate::collectors::{
    BitdefenderCollector, DefenderCollector, ExceptionCollector, LinuxFirewallCollector,
    WindowsFirewallCollector,
};
use crate::model::Product;
use std::collections::BTreeSet;
use std::time::Duration;

pub struct ProductRegistry {
    collectors: Vec<Box<dyn ExceptionCollector>>,
}

impl ProductRegistry {
    /// Registry with one collector per known product, each bounded by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self::with_collectors(vec![
            Box::new(DefenderCollector::new(timeout)),
            Box::new(BitdefenderCollector::new()),
            Box::new(WindowsFirewallCollector::new(timeout)),
            Box::new(LinuxFirewallCollector::new(timeout)),
        ])
    }

    /// Registry over an explicit collector list. Later duplicates of a product are ignored.
    pub fn with_collectors(collectors: Vec<Box<dyn ExceptionCollector>>) -> Self {
        let mut seen = BTreeSet::new();
        let collectors = collectors
            .into_iter()
            .filter(|c| seen.insert(c.product()))
            .collect();
        Self { collectors }
    }

    /// Products whose capability probe succeeds. Never fails; may be empty.
    pub fn available_products(&self) -> BTreeSet<Product> {
        self.collectors
            .iter()
            .filter(|c| c.is_available())
            .map(|c| c.product())
            .collect()
    }

    /// Every product with a registered collector, available or not
    pub fn known_products(&self) -> BTreeSet<Product> {
        self.collectors.iter().map(|c| c.product()).collect()
    }

    pub fn collector_for(&self, product: Product) -> Option<&dyn ExceptionCollector> {
        self.collectors
            .iter()
            .find(|c| c.product() == product)
            .map(|c| c.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::{CollectError, Collection};

    struct Probe(Product, bool);

    impl ExceptionCollector for Probe {
        fn product(&self) -> Product {
            self.0
        }
        fn is_available(&self) -> bool {
            self.1
        }
        fn collect(&self) -> Result<Collection, CollectError> {
            Ok(Collection::default())
        }
    }

    #[test]
    fn test_available_is_subset_of_known() {
        let registry = ProductRegistry::with_collectors(vec![
            Box::new(Probe(Product::Defender, false)),
            Box::new(Probe(Product::LinuxFirewall, true)),
        ]);
        assert_eq!(
            registry.available_products().into_iter().collect::<Vec<_>>(),
            vec![Product::LinuxFirewall]
        );
        assert_eq!(registry.known_products().len(), 2);
        assert!(registry.collector_for(Product::Bitdefender).is_none());
    }

    #[test]
    fn test_empty_registry_reports_nothing() {
        let registry = ProductRegistry::with_collectors(Vec::new());
        assert!(registry.available_products().is_empty());
    }

    #[test]
    fn test_duplicate_products_keep_first() {
        let registry = ProductRegistry::with_collectors(vec![
            Box::new(Probe(Product::Defender, false)),
            Box::new(Probe(Product::Defender, true)),
        ]);
        assert!(registry.available_products().is_empty());
    }

    #[test]
    fn test_default_registry_knows_every_product() {
        let registry = ProductRegistry::new(Duration::from_secs(1));
        assert_eq!(registry.known_products().len(), Product::ALL.len());
    }
}
