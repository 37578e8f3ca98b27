//! Advisory cross-reference between federal activity and state declarations.
//!
//! Federal declarations almost always follow a governor's declaration, so a
//! state with federal records but no STATE record most likely has a missing
//! curated entry. Gaps are reported, never filled in.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

use crate::config::CoverageConfig;
use crate::domain::{DisasterRecord, Source};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverageGap {
    pub jurisdiction: String,
    pub trigger_source: Source,
    pub federal_record_ids: Vec<String>,
    pub missing_authority: Source,
    pub reason: String,
}

pub struct CoverageGapAnalyzer<'a> {
    config: &'a CoverageConfig,
}

impl<'a> CoverageGapAnalyzer<'a> {
    pub fn new(config: &'a CoverageConfig) -> Self {
        Self { config }
    }

    /// Gaps sorted by jurisdiction. Each jurisdiction is flagged at most once,
    /// by the first trigger source (in configured order) that finds it uncovered.
    pub fn analyze(&self, records: &[DisasterRecord]) -> Vec<CoverageGap> {
        let covered: BTreeSet<&str> = records
            .iter()
            .filter(|r| r.source() == Source::State)
            .map(|r| r.jurisdiction())
            .collect();

        let mut gaps: BTreeMap<String, CoverageGap> = BTreeMap::new();
        for trigger in &self.config.trigger_sources {
            let mut by_state: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
            for record in records.iter().filter(|r| {
                r.source() == *trigger && r.declaration.confidence_level >= self.config.min_confidence
            }) {
                by_state.entry(record.jurisdiction()).or_default().push(record.id());
            }

            for (state, mut ids) in by_state {
                if covered.contains(state) || gaps.contains_key(state) {
                    continue;
                }
                ids.sort_unstable();
                let reason = format!(
                    "{} has {} {} declaration(s) but no STATE declaration on record",
                    state,
                    ids.len(),
                    trigger
                );
                warn!(jurisdiction = state, trigger = %trigger, "Coverage gap: {}", reason);
                gaps.insert(
                    state.to_string(),
                    CoverageGap {
                        jurisdiction: state.to_string(),
                        trigger_source: *trigger,
                        federal_record_ids: ids.into_iter().map(str::to_string).collect(),
                        missing_authority: Source::State,
                        reason,
                    },
                );
            }
        }

        if !gaps.is_empty() {
            info!("{} coverage gap(s) detected; governor declarations may be missing", gaps.len());
        }
        gaps.into_values().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AffectedAreas, ConfidenceLevel, Declaration, Status, Window};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn rec(id: &str, source: Source, state: &str, confidence: ConfidenceLevel) -> DisasterRecord {
        let day = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        DisasterRecord {
            declaration: Declaration {
                id: id.to_string(),
                source,
                jurisdiction: state.to_string(),
                title: "t".to_string(),
                incident_category: "Flood".to_string(),
                declaration_date: day,
                incident_start: day,
                incident_end: None,
                renewal_dates: Default::default(),
                affected_areas: AffectedAreas::Entire,
                official_url: "https://example.gov/x".to_string(),
                confidence_level: confidence,
                last_updated: Utc.with_ymd_and_hms(2026, 2, 11, 0, 0, 0).unwrap(),
                last_verified: None,
                event_key: None,
            },
            window: Window {
                status: Status::Ongoing,
                window_start: day,
                window_end: NaiveDate::from_ymd_opt(2027, 3, 31).unwrap(),
                days_remaining: None,
            },
        }
    }

    #[test]
    fn test_fema_state_without_governor_declaration_is_a_gap() {
        let records = vec![
            rec("FEMA-DR-4834-TX", Source::Fema, "TX", ConfidenceLevel::Verified),
            rec("FEMA-DR-4890-NC", Source::Fema, "NC", ConfidenceLevel::Verified),
            rec("STATE-2026-001-NC", Source::State, "NC", ConfidenceLevel::Curated),
        ];
        let config = CoverageConfig::default();
        let gaps = CoverageGapAnalyzer::new(&config).analyze(&records);

        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].jurisdiction, "TX");
        assert_eq!(gaps[0].trigger_source, Source::Fema);
        assert_eq!(gaps[0].missing_authority, Source::State);
        assert_eq!(gaps[0].federal_record_ids, vec!["FEMA-DR-4834-TX"]);
    }

    #[test]
    fn test_fmcsa_gap_only_when_fema_did_not_flag_the_state() {
        let records = vec![
            rec("FEMA-DR-4834-TX", Source::Fema, "TX", ConfidenceLevel::Verified),
            rec("FMCSA-2026-002-TX", Source::Fmcsa, "TX", ConfidenceLevel::Curated),
            rec("FMCSA-2026-003-OK", Source::Fmcsa, "OK", ConfidenceLevel::Curated),
        ];
        let config = CoverageConfig::default();
        let gaps = CoverageGapAnalyzer::new(&config).analyze(&records);

        let summary: Vec<(&str, Source)> = gaps
            .iter()
            .map(|g| (g.jurisdiction.as_str(), g.trigger_source))
            .collect();
        assert_eq!(summary, vec![("OK", Source::Fmcsa), ("TX", Source::Fema)]);
    }

    #[test]
    fn test_min_confidence_filters_triggers() {
        let records = vec![rec("FMCSA-2026-003-OK", Source::Fmcsa, "OK", ConfidenceLevel::Curated)];
        let config = CoverageConfig {
            min_confidence: ConfidenceLevel::Verified,
            ..CoverageConfig::default()
        };
        assert!(CoverageGapAnalyzer::new(&config).analyze(&records).is_empty());
    }
}
