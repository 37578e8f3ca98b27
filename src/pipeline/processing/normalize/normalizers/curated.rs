use std::collections::BTreeSet;

use super::base::{NormalizerUtils, SourceNormalizer};
use crate::config::FeedKind;
use crate::domain::{ConfidenceLevel, Declaration, Source};
use crate::error::{CompilerError, Result};
use crate::pipeline::processing::normalize::dates::{optional_date, parse_date, require_date};
use crate::pipeline::processing::normalize::{NormalizeContext, RawRecord};

/// Normalizer for hand-maintained entries. Curation is just another feed:
/// the entry names its own source and arrives with `curated` confidence.
pub struct CuratedNormalizer;

impl CuratedNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CuratedNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceNormalizer for CuratedNormalizer {
    fn normalize(&self, record: &RawRecord, ctx: &NormalizeContext<'_>) -> Result<Declaration> {
        let RawRecord::Curated(entry) = record else {
            return Err(NormalizerUtils::wrong_variant("curated", record));
        };

        let id = NormalizerUtils::require_str("id", entry.id.as_ref())?.to_string();
        let source_tag = NormalizerUtils::require_str("source", entry.source.as_ref())?;
        let source = Source::parse(source_tag).ok_or_else(|| {
            CompilerError::InvalidRecord(format!("{}: unknown source '{}'", id, source_tag))
        })?;
        let jurisdiction = NormalizerUtils::jurisdiction(entry.state.as_ref())?;

        let declaration_date = require_date("declarationDate", entry.declaration_date.as_deref())?;
        let incident_start = require_date("incidentStart", entry.incident_start.as_deref())?;
        let incident_end = optional_date("incidentEnd", entry.incident_end.as_deref())?;
        NormalizerUtils::check_incident_order(incident_start, incident_end)?;

        let renewal_dates = entry
            .renewal_dates
            .iter()
            .flatten()
            .map(|raw| parse_date("renewalDates", raw))
            .collect::<Result<BTreeSet<_>>>()?;

        let counties = entry.counties.as_deref().unwrap_or_default();
        let affected_areas = ctx
            .areas
            .normalize_all(counties.iter().map(String::as_str), entry.statewide.unwrap_or(false))?;

        let official_url = NormalizerUtils::require_str("officialUrl", entry.official_url.as_ref())?.to_string();
        let title = NormalizerUtils::require_str("title", entry.title.as_ref())?.to_string();
        let incident_category = entry
            .incident_type
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("Disaster")
            .to_string();
        let last_verified = optional_date("lastVerified", entry.last_verified.as_deref())?;

        Ok(Declaration {
            id,
            source,
            jurisdiction,
            title,
            incident_category,
            declaration_date,
            incident_start,
            incident_end,
            renewal_dates,
            affected_areas,
            official_url,
            confidence_level: ConfidenceLevel::Curated,
            last_updated: entry.last_updated.unwrap_or(ctx.run_timestamp),
            last_verified,
            event_key: entry.event_key.clone(),
        })
    }

    fn kind(&self) -> FeedKind {
        FeedKind::Curated
    }

    fn name(&self) -> &str {
        "curated"
    }
}
