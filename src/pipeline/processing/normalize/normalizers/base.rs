use chrono::NaiveDate;

use super::super::{NormalizeContext, RawRecord};
use crate::config::FeedKind;
use crate::constants::is_valid_jurisdiction;
use crate::domain::Declaration;
use crate::error::{CompilerError, Result};
use crate::observability::metrics;

/// Base trait for source-specific normalizers
pub trait SourceNormalizer: Send + Sync {
    /// Turn one raw payload into a canonical declaration, or say why not
    fn normalize(&self, record: &RawRecord, ctx: &NormalizeContext<'_>) -> Result<Declaration>;

    /// The raw shape this normalizer understands
    fn kind(&self) -> FeedKind;

    /// Get a human-readable name for this normalizer
    fn name(&self) -> &str;
}

/// A wrapper that adds metrics to any normalizer implementation
pub struct MetricsNormalizer<N: SourceNormalizer> {
    inner: N,
}

impl<N: SourceNormalizer> MetricsNormalizer<N> {
    pub fn new(inner: N) -> Self {
        Self { inner }
    }
}

impl<N: SourceNormalizer> SourceNormalizer for MetricsNormalizer<N> {
    fn normalize(&self, record: &RawRecord, ctx: &NormalizeContext<'_>) -> Result<Declaration> {
        match self.inner.normalize(record, ctx) {
            Ok(declaration) => {
                metrics::normalize::record_normalized(self.inner.name());
                Ok(declaration)
            }
            Err(e) => {
                metrics::normalize::record_rejected(self.inner.name());
                Err(e)
            }
        }
    }

    fn kind(&self) -> FeedKind {
        self.inner.kind()
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Field helpers shared by the source adapters
pub struct NormalizerUtils;

impl NormalizerUtils {
    /// Non-blank string field or a missing-field error
    pub fn require_str<'a>(field: &str, value: Option<&'a String>) -> Result<&'a str> {
        value
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| CompilerError::MissingField(field.to_string()))
    }

    /// Upper-cased, known two-letter jurisdiction code
    pub fn jurisdiction(value: Option<&String>) -> Result<String> {
        let code = Self::require_str("state", value)?.to_uppercase();
        if !is_valid_jurisdiction(&code) {
            return Err(CompilerError::InvalidRecord(format!(
                "unknown jurisdiction '{}'",
                code
            )));
        }
        Ok(code)
    }

    pub fn check_incident_order(start: NaiveDate, end: Option<NaiveDate>) -> Result<()> {
        match end {
            Some(end) if start > end => Err(CompilerError::InvalidRecord(format!(
                "incidentStart {} is after incidentEnd {}",
                start, end
            ))),
            _ => Ok(()),
        }
    }

    pub fn wrong_variant(expected: &str, record: &RawRecord) -> CompilerError {
        CompilerError::InvalidRecord(format!(
            "{} normalizer cannot handle {:?} payload {}",
            expected,
            record.kind(),
            record.locator()
        ))
    }
}
