//! Fragment consolidation and cross-feed identity merge.
//!
//! Two rules, kept apart on purpose:
//! - fragments of one event from one authority (same source + event key) are
//!   unioned into a single record;
//! - records from different feeds merge only on exact `id` equality, with live
//!   feeds beating cached ones. Different ids are never collapsed, even when
//!   two authorities declared the same real-world event.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::config::Freshness;
use crate::domain::{Declaration, Source};
use crate::observability::metrics;

/// All normalized declarations one feed produced this run.
#[derive(Debug, Clone)]
pub struct FeedBatch {
    pub feed: String,
    pub freshness: Freshness,
    pub records: Vec<Declaration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeDiagnosticKind {
    /// Fragments of one event disagree on a field that should be identical.
    FragmentMismatch,
    /// A cached record lost to the live record with the same id.
    CachedSuperseded,
    /// Same id twice within one freshness tier; first occurrence kept.
    DuplicateId,
    /// Live record removed by the suppression list.
    Suppressed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeDiagnostic {
    pub kind: MergeDiagnosticKind,
    pub id: String,
    pub detail: String,
}

#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    pub records: Vec<Declaration>,
    pub diagnostics: Vec<MergeDiagnostic>,
    /// Feed that supplied each kept record, by id.
    pub origins: HashMap<String, String>,
}

/// Names of the scalar fields on which two fragments of one event disagree.
fn mismatched_fields(a: &Declaration, b: &Declaration) -> Vec<&'static str> {
    let mut fields = Vec::new();
    if a.id != b.id {
        fields.push("id");
    }
    if a.jurisdiction != b.jurisdiction {
        fields.push("jurisdiction");
    }
    if a.title != b.title {
        fields.push("title");
    }
    if a.incident_category != b.incident_category {
        fields.push("incidentCategory");
    }
    if a.declaration_date != b.declaration_date {
        fields.push("declarationDate");
    }
    if a.incident_start != b.incident_start {
        fields.push("incidentStart");
    }
    if a.incident_end != b.incident_end {
        fields.push("incidentEnd");
    }
    if a.renewal_dates != b.renewal_dates {
        fields.push("renewalDates");
    }
    if a.official_url != b.official_url {
        fields.push("officialUrl");
    }
    fields
}

/// Union per-area fragments sharing `(source, event key)` into one record.
/// Scalars come from the first fragment in input order; disagreements are
/// reported, not resolved. Records without an event key pass through untouched.
pub fn consolidate_fragments(records: Vec<Declaration>) -> (Vec<Declaration>, Vec<MergeDiagnostic>) {
    let mut consolidated: Vec<Declaration> = Vec::with_capacity(records.len());
    let mut index: HashMap<(Source, String), usize> = HashMap::new();
    let mut diagnostics = Vec::new();
    let mut absorbed = 0usize;

    for record in records {
        let Some(key) = record.event_key.clone() else {
            consolidated.push(record);
            continue;
        };

        match index.get(&(record.source, key.clone())) {
            Some(&pos) => {
                let target = &mut consolidated[pos];
                let fields = mismatched_fields(target, &record);
                if !fields.is_empty() {
                    warn!(
                        event_key = %key,
                        fields = ?fields,
                        "Fragments of one event disagree; keeping first fragment's values"
                    );
                    diagnostics.push(MergeDiagnostic {
                        kind: MergeDiagnosticKind::FragmentMismatch,
                        id: target.id.clone(),
                        detail: format!("event key {} differs in {}", key, fields.join(", ")),
                    });
                }
                target.affected_areas.union_with(&record.affected_areas);
                absorbed += 1;
            }
            None => {
                index.insert((record.source, key), consolidated.len());
                consolidated.push(record);
            }
        }
    }

    if absorbed > 0 {
        debug!("Consolidated {} fragments into {} records", absorbed, consolidated.len());
        metrics::merge::fragments_consolidated(absorbed);
    }
    (consolidated, diagnostics)
}

/// Merge every feed's records into one set keyed by id. Suppressed ids are
/// dropped from live feeds only; a cached record with that id stands in.
pub fn merge_feeds(mut batches: Vec<FeedBatch>, suppressed: &HashSet<String>) -> MergeOutcome {
    // Live feeds first; stable sort keeps configured order within a tier
    batches.sort_by_key(|b| b.freshness);

    let mut outcome = MergeOutcome::default();
    let mut seen: HashMap<String, (Freshness, String)> = HashMap::new();
    let mut discarded = 0usize;

    for batch in batches {
        let (records, diagnostics) = consolidate_fragments(batch.records);
        outcome.diagnostics.extend(diagnostics);

        for record in records {
            if batch.freshness == Freshness::Live && suppressed.contains(&record.id) {
                info!(id = %record.id, feed = %batch.feed, "Dropping suppressed id");
                outcome.diagnostics.push(MergeDiagnostic {
                    kind: MergeDiagnosticKind::Suppressed,
                    id: record.id.clone(),
                    detail: format!("suppressed by configuration (feed {})", batch.feed),
                });
                continue;
            }

            match seen.get(&record.id) {
                Some((winner_freshness, winner_feed)) => {
                    discarded += 1;
                    let kind = if *winner_freshness == Freshness::Live && batch.freshness == Freshness::Cached {
                        MergeDiagnosticKind::CachedSuperseded
                    } else {
                        MergeDiagnosticKind::DuplicateId
                    };
                    debug!(id = %record.id, kept = %winner_feed, dropped = %batch.feed, ?kind, "Discarding duplicate id");
                    outcome.diagnostics.push(MergeDiagnostic {
                        kind,
                        id: record.id.clone(),
                        detail: format!("kept version from {}, discarded {}", winner_feed, batch.feed),
                    });
                }
                None => {
                    seen.insert(record.id.clone(), (batch.freshness, batch.feed.clone()));
                    outcome.origins.insert(record.id.clone(), batch.feed.clone());
                    outcome.records.push(record);
                }
            }
        }
    }

    if discarded > 0 {
        metrics::merge::duplicates_discarded(discarded);
    }
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{AffectedAreas, ConfidenceLevel};
    use chrono::{NaiveDate, TimeZone, Utc};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn areas(names: &[&str]) -> AffectedAreas {
        AffectedAreas::Areas(names.iter().map(|s| s.to_string()).collect())
    }

    fn record(id: &str, source: Source, key: Option<&str>, area: &[&str]) -> Declaration {
        Declaration {
            id: id.to_string(),
            source,
            jurisdiction: "TX".to_string(),
            title: "Severe Storms".to_string(),
            incident_category: "Flood".to_string(),
            declaration_date: d(2025, 7, 6),
            incident_start: d(2025, 7, 2),
            incident_end: Some(d(2025, 7, 18)),
            renewal_dates: Default::default(),
            affected_areas: areas(area),
            official_url: "https://www.fema.gov/disaster/4834".to_string(),
            confidence_level: ConfidenceLevel::Verified,
            last_updated: Utc.with_ymd_and_hms(2026, 2, 11, 0, 0, 0).unwrap(),
            last_verified: None,
            event_key: key.map(str::to_string),
        }
    }

    #[test]
    fn test_fragments_union_areas_and_keep_scalars() {
        let a = record("FEMA-DR-4834-TX", Source::Fema, Some("DR-4834-TX"), &["Kerr"]);
        let b = record("FEMA-DR-4834-TX", Source::Fema, Some("DR-4834-TX"), &["Travis", "Burnet"]);

        let (merged, diagnostics) = consolidate_fragments(vec![a.clone(), b]);
        assert_eq!(merged.len(), 1);
        assert!(diagnostics.is_empty());
        assert_eq!(merged[0].affected_areas, areas(&["Burnet", "Kerr", "Travis"]));

        let mut expected = a;
        expected.affected_areas = areas(&["Burnet", "Kerr", "Travis"]);
        assert_eq!(merged[0], expected);
    }

    #[test]
    fn test_fragment_disagreement_is_reported() {
        let a = record("FEMA-DR-4834-TX", Source::Fema, Some("DR-4834-TX"), &["Kerr"]);
        let mut b = record("FEMA-DR-4834-TX", Source::Fema, Some("DR-4834-TX"), &["Travis"]);
        b.incident_end = Some(d(2025, 7, 30));

        let (merged, diagnostics) = consolidate_fragments(vec![a, b]);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].incident_end, Some(d(2025, 7, 18)));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].kind, MergeDiagnosticKind::FragmentMismatch);
        assert!(diagnostics[0].detail.contains("incidentEnd"));
    }

    #[test]
    fn test_different_authorities_are_never_merged() {
        let fema = record("FEMA-DR-4834-TX", Source::Fema, Some("DR-4834-TX"), &["Kerr"]);
        let mut state = record("STATE-2025-007-TX", Source::State, None, &["Kerr"]);
        state.confidence_level = ConfidenceLevel::Curated;
        let sba = record("SBA-2025-13001-TX", Source::Sba, None, &["Kerr"]);

        let outcome = merge_feeds(
            vec![
                FeedBatch { feed: "fema".into(), freshness: Freshness::Live, records: vec![fema] },
                FeedBatch { feed: "federal_register".into(), freshness: Freshness::Live, records: vec![sba] },
                FeedBatch { feed: "curated".into(), freshness: Freshness::Cached, records: vec![state] },
            ],
            &HashSet::new(),
        );
        assert_eq!(outcome.records.len(), 3);
        assert!(outcome.diagnostics.is_empty());
    }

    #[test]
    fn test_live_version_wins_over_cached() {
        let mut cached = record("SBA-2025-16217-AK", Source::Sba, None, &["Old County"]);
        cached.confidence_level = ConfidenceLevel::Curated;
        let live = record("SBA-2025-16217-AK", Source::Sba, None, &["Kenai Peninsula"]);

        // Cached feed listed first in configuration; freshness still decides
        let outcome = merge_feeds(
            vec![
                FeedBatch { feed: "curated".into(), freshness: Freshness::Cached, records: vec![cached] },
                FeedBatch { feed: "federal_register".into(), freshness: Freshness::Live, records: vec![live] },
            ],
            &HashSet::new(),
        );
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].affected_areas, areas(&["Kenai Peninsula"]));
        assert_eq!(outcome.diagnostics[0].kind, MergeDiagnosticKind::CachedSuperseded);
    }

    #[test]
    fn test_suppressed_ids_are_dropped() {
        let bad = record("SBA-2025-12380-CA", Source::Sba, None, &["Los Angeles"]);
        let suppressed: HashSet<String> = ["SBA-2025-12380-CA".to_string()].into_iter().collect();
        let outcome = merge_feeds(
            vec![FeedBatch { feed: "federal_register".into(), freshness: Freshness::Live, records: vec![bad] }],
            &suppressed,
        );
        assert!(outcome.records.is_empty());
        assert_eq!(outcome.diagnostics[0].kind, MergeDiagnosticKind::Suppressed);
    }

    #[test]
    fn test_suppressed_live_record_yields_to_curated_correction() {
        let bad_live = record("SBA-2025-16217-AK", Source::Sba, None, &["Wrong Borough"]);
        let mut correction = record("SBA-2025-16217-AK", Source::Sba, None, &["Kenai Peninsula"]);
        correction.confidence_level = ConfidenceLevel::Curated;
        let suppressed: HashSet<String> = ["SBA-2025-16217-AK".to_string()].into_iter().collect();

        let outcome = merge_feeds(
            vec![
                FeedBatch { feed: "federal_register".into(), freshness: Freshness::Live, records: vec![bad_live] },
                FeedBatch { feed: "curated".into(), freshness: Freshness::Cached, records: vec![correction] },
            ],
            &suppressed,
        );
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].affected_areas, areas(&["Kenai Peninsula"]));
        assert_eq!(outcome.records[0].confidence_level, ConfidenceLevel::Curated);
        assert_eq!(outcome.origins.get("SBA-2025-16217-AK").map(String::as_str), Some("curated"));
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].kind, MergeDiagnosticKind::Suppressed);
    }
}
