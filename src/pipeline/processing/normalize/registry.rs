use std::collections::HashMap;

use super::normalizers::{
    CuratedNormalizer, FederalRegisterNormalizer, FemaNormalizer, MetricsNormalizer, SourceNormalizer,
};
use super::{NormalizeContext, RawRecord};
use crate::config::FeedKind;
use crate::domain::Declaration;
use crate::error::{CompilerError, Result};

/// Registry mapping each raw record variant to its normalizer
pub struct NormalizationRegistry {
    normalizers: HashMap<FeedKind, Box<dyn SourceNormalizer>>,
}

impl NormalizationRegistry {
    /// Create a registry with the built-in adapters, each wrapped for metrics
    pub fn new() -> Self {
        let mut registry = Self {
            normalizers: HashMap::new(),
        };
        registry.register(Box::new(MetricsNormalizer::new(FemaNormalizer::new())));
        registry.register(Box::new(MetricsNormalizer::new(FederalRegisterNormalizer::new())));
        registry.register(Box::new(MetricsNormalizer::new(CuratedNormalizer::new())));
        registry
    }

    /// Register (or replace) the normalizer for its feed kind
    pub fn register(&mut self, normalizer: Box<dyn SourceNormalizer>) {
        self.normalizers.insert(normalizer.kind(), normalizer);
    }

    pub fn get_normalizer(&self, kind: FeedKind) -> Option<&dyn SourceNormalizer> {
        self.normalizers.get(&kind).map(|n| n.as_ref())
    }

    /// Normalize a record with the adapter for its variant
    pub fn normalize(&self, record: &RawRecord, ctx: &NormalizeContext<'_>) -> Result<Declaration> {
        match self.get_normalizer(record.kind()) {
            Some(normalizer) => normalizer.normalize(record, ctx),
            None => Err(CompilerError::Config(format!(
                "No normalizer registered for feed kind {:?}",
                record.kind()
            ))),
        }
    }

    pub fn registered_kinds(&self) -> Vec<FeedKind> {
        self.normalizers.keys().copied().collect()
    }
}

impl Default for NormalizationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
