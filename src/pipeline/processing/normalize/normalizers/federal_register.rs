use std::collections::BTreeSet;

use super::base::{NormalizerUtils, SourceNormalizer};
use crate::config::FeedKind;
use crate::domain::{ConfidenceLevel, Declaration, Source};
use crate::error::{CompilerError, Result};
use crate::pipeline::processing::normalize::dates::{optional_date, require_date};
use crate::pipeline::processing::normalize::{NormalizeContext, RawRecord};

/// Normalizer for SBA disaster notices published in the Federal Register.
///
/// A notice covering contiguous counties in a second state arrives as a second
/// notice with the same document number; the state suffix keeps their ids apart.
pub struct FederalRegisterNormalizer;

impl FederalRegisterNormalizer {
    pub fn new() -> Self {
        Self
    }
}

impl Default for FederalRegisterNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceNormalizer for FederalRegisterNormalizer {
    fn normalize(&self, record: &RawRecord, ctx: &NormalizeContext<'_>) -> Result<Declaration> {
        let RawRecord::FederalRegister(notice) = record else {
            return Err(NormalizerUtils::wrong_variant("federal_register", record));
        };

        let document_number = NormalizerUtils::require_str("documentNumber", notice.document_number.as_ref())?;
        let jurisdiction = NormalizerUtils::jurisdiction(notice.state.as_ref())?;
        let declaration_date = require_date("publicationDate", notice.publication_date.as_deref())?;
        let incident_start = require_date("incidentStart", notice.incident_start.as_deref())?;
        let incident_end = optional_date("incidentEnd", notice.incident_end.as_deref())?;
        NormalizerUtils::check_incident_order(incident_start, incident_end)?;

        let counties = notice
            .counties
            .as_ref()
            .ok_or_else(|| CompilerError::MissingField("counties".to_string()))?;
        let affected_areas = ctx.areas.normalize_all(counties.iter().map(String::as_str), false)?;

        let official_url = NormalizerUtils::require_str("htmlUrl", notice.html_url.as_ref())?.to_string();
        let title = notice
            .title
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("SBA Disaster Declaration {}", document_number));
        let incident_category = notice
            .incident_type
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("Disaster")
            .to_string();

        Ok(Declaration {
            id: format!("{}-{}-{}", Source::Sba.as_str(), document_number, jurisdiction),
            source: Source::Sba,
            jurisdiction,
            title,
            incident_category,
            declaration_date,
            incident_start,
            incident_end,
            renewal_dates: BTreeSet::new(),
            affected_areas,
            official_url,
            confidence_level: ConfidenceLevel::Scraped,
            last_updated: ctx.run_timestamp,
            last_verified: None,
            event_key: None,
        })
    }

    fn kind(&self) -> FeedKind {
        FeedKind::FederalRegister
    }

    fn name(&self) -> &str {
        "federal_register"
    }
}
