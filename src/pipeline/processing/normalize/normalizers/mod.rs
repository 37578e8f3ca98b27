// Base trait and utilities for source-specific normalizers
pub mod base;

// One adapter per raw record variant
pub mod curated;
pub mod federal_register;
pub mod fema;

pub use base::{MetricsNormalizer, NormalizerUtils, SourceNormalizer};
pub use curated::CuratedNormalizer;
pub use federal_register::FederalRegisterNormalizer;
pub use fema::FemaNormalizer;
