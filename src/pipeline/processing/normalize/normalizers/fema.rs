use std::collections::BTreeSet;

use super::base::{NormalizerUtils, SourceNormalizer};
use crate::config::FeedKind;
use crate::constants::EXCLUDED_FEMA_DECLARATION_TYPES;
use crate::domain::{ConfidenceLevel, Declaration, Source};
use crate::error::{CompilerError, Result};
use crate::pipeline::processing::normalize::dates::{optional_date, require_date};
use crate::pipeline::processing::normalize::{NormalizeContext, RawRecord};

/// Normalizer for OpenFEMA declaration-summary rows.
///
/// Each row covers one designated area; rows of the same declaration share the
/// `femaDeclarationString`, which becomes both the id suffix and the event key
/// so the merge step can union their areas.
pub struct FemaNormalizer;

impl FemaNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Record-specific page, keyed by the numeric disaster number.
    pub fn official_url(disaster_number: u64) -> String {
        format!("https://www.fema.gov/disaster/{}", disaster_number)
    }
}

impl Default for FemaNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceNormalizer for FemaNormalizer {
    fn normalize(&self, record: &RawRecord, ctx: &NormalizeContext<'_>) -> Result<Declaration> {
        let RawRecord::Fema(row) = record else {
            return Err(NormalizerUtils::wrong_variant("fema", record));
        };

        let key = NormalizerUtils::require_str("femaDeclarationString", row.fema_declaration_string.as_ref())?;

        if let Some(kind) = row.declaration_type.as_deref() {
            if EXCLUDED_FEMA_DECLARATION_TYPES.contains(&kind.trim()) {
                return Err(CompilerError::InvalidRecord(format!(
                    "{}: declaration type {} is not a disaster declaration",
                    key, kind
                )));
            }
        }

        let jurisdiction = NormalizerUtils::jurisdiction(row.state.as_ref())?;
        let declaration_date = require_date("declarationDate", row.declaration_date.as_deref())?;
        let incident_start = require_date("incidentBeginDate", row.incident_begin_date.as_deref())?;
        let incident_end = optional_date("incidentEndDate", row.incident_end_date.as_deref())?;
        NormalizerUtils::check_incident_order(incident_start, incident_end)?;

        let area = NormalizerUtils::require_str("designatedArea", row.designated_area.as_ref())?;
        let affected_areas = ctx.areas.normalize_all([area], false)?;

        let disaster_number = row
            .disaster_number
            .ok_or_else(|| CompilerError::MissingField("disasterNumber".to_string()))?;

        let incident_category = row
            .incident_type
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("Disaster")
            .to_string();
        let title = row
            .declaration_title
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("FEMA {} {}", key, incident_category));

        Ok(Declaration {
            id: format!("{}-{}", Source::Fema.as_str(), key),
            source: Source::Fema,
            jurisdiction,
            title,
            incident_category,
            declaration_date,
            incident_start,
            incident_end,
            renewal_dates: BTreeSet::new(),
            affected_areas,
            official_url: Self::official_url(disaster_number),
            confidence_level: ConfidenceLevel::Verified,
            last_updated: row.last_refresh.unwrap_or(ctx.run_timestamp),
            last_verified: None,
            event_key: Some(key.to_string()),
        })
    }

    fn kind(&self) -> FeedKind {
        FeedKind::Fema
    }

    fn name(&self) -> &str {
        "fema"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::normalize::{AreaNormalizer, FemaSummaryRow};
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::json;

    fn row(value: serde_json::Value) -> RawRecord {
        RawRecord::Fema(serde_json::from_value::<FemaSummaryRow>(value).unwrap())
    }

    fn ctx(areas: &AreaNormalizer) -> NormalizeContext<'_> {
        NormalizeContext {
            areas,
            run_timestamp: Utc.with_ymd_and_hms(2026, 2, 11, 0, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_normalize_fema_row() {
        let areas = AreaNormalizer::default();
        let raw = row(json!({
            "femaDeclarationString": "DR-4834-TX",
            "disasterNumber": 4834,
            "declarationType": "DR",
            "declarationDate": "2025-07-06T00:00:00.000Z",
            "incidentBeginDate": "2025-07-02T00:00:00.000Z",
            "incidentEndDate": "2025-07-18T00:00:00.000Z",
            "state": "TX",
            "declarationTitle": "SEVERE STORMS, STRAIGHT-LINE WINDS, AND FLOODING",
            "incidentType": "Flood",
            "designatedArea": "Kerr (County)"
        }));

        let decl = FemaNormalizer::new().normalize(&raw, &ctx(&areas)).unwrap();
        assert_eq!(decl.id, "FEMA-DR-4834-TX");
        assert_eq!(decl.event_key.as_deref(), Some("DR-4834-TX"));
        assert_eq!(decl.official_url, "https://www.fema.gov/disaster/4834");
        assert_eq!(decl.declaration_date, NaiveDate::from_ymd_opt(2025, 7, 6).unwrap());
        assert_eq!(decl.incident_end, NaiveDate::from_ymd_opt(2025, 7, 18));
        let names: Vec<String> = decl.affected_areas.into();
        assert_eq!(names, vec!["Kerr"]);
    }

    #[test]
    fn test_fire_management_rows_are_rejected() {
        let areas = AreaNormalizer::default();
        let raw = row(json!({
            "femaDeclarationString": "FM-5555-CA",
            "disasterNumber": 5555,
            "declarationType": "FM",
            "declarationDate": "2025-07-06",
            "incidentBeginDate": "2025-07-02",
            "state": "CA",
            "designatedArea": "Los Angeles (County)"
        }));
        assert!(FemaNormalizer::new().normalize(&raw, &ctx(&areas)).is_err());
    }

    #[test]
    fn test_missing_disaster_number_is_rejected() {
        let areas = AreaNormalizer::default();
        let raw = row(json!({
            "femaDeclarationString": "DR-4834-TX",
            "declarationDate": "2025-07-06",
            "incidentBeginDate": "2025-07-02",
            "state": "TX",
            "designatedArea": "Kerr (County)"
        }));
        let err = FemaNormalizer::new().normalize(&raw, &ctx(&areas)).unwrap_err();
        assert!(matches!(err, CompilerError::MissingField(ref f) if f == "disasterNumber"));
    }

    #[test]
    fn test_reversed_incident_dates_are_rejected() {
        let areas = AreaNormalizer::default();
        let raw = row(json!({
            "femaDeclarationString": "DR-4834-TX",
            "disasterNumber": 4834,
            "declarationDate": "2025-07-06",
            "incidentBeginDate": "2025-07-20",
            "incidentEndDate": "2025-07-02",
            "state": "TX",
            "designatedArea": "Kerr (County)"
        }));
        assert!(FemaNormalizer::new().normalize(&raw, &ctx(&areas)).is_err());
    }
}
