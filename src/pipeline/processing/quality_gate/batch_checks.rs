use std::collections::{BTreeMap, BTreeSet, HashSet};

use super::{codes, AuditContext, CheckResult};
use crate::config::AuditConfig;
use crate::domain::{DisasterRecord, Source};
use crate::pipeline::artifact::{self, PublishedArtifact};

/// Ids must be unique across the whole batch.
pub fn duplicate_ids(records: &[DisasterRecord]) -> CheckResult {
    let mut seen = HashSet::with_capacity(records.len());
    let mut duplicates = BTreeSet::new();
    for record in records {
        if !seen.insert(record.id()) {
            duplicates.insert(record.id());
        }
    }

    if duplicates.is_empty() {
        CheckResult::pass(codes::BATCH_DUPLICATE_IDS, None)
    } else {
        let ids: Vec<&str> = duplicates.into_iter().collect();
        CheckResult::fail(
            codes::BATCH_DUPLICATE_IDS,
            None,
            format!("duplicate ids: {}", ids.join(", ")),
        )
    }
}

/// Per-source count regression against the previous artifact.
///
/// The baseline is the prior count minus prior records whose window has since
/// closed, so a source shrinking through normal expiry never trips the gate.
pub fn source_counts(kept: &[DisasterRecord], ctx: &AuditContext<'_>) -> Vec<CheckResult> {
    let Some(prior) = ctx.prior else {
        return Vec::new();
    };

    let mut baselines: BTreeMap<Source, usize> = BTreeMap::new();
    for record in &prior.disasters {
        let entry = baselines.entry(record.source()).or_insert(0);
        if record.window.window_end >= ctx.today {
            *entry += 1;
        }
    }
    let current = artifact::source_counts(kept);

    baselines
        .into_iter()
        .map(|(source, baseline)| {
            let count = current.get(&source).copied().unwrap_or(0);
            let required = ctx.config.count_drop_ratio * baseline as f64;
            let collapsed = baseline > 0 && (count == 0 || (count as f64) < required);

            if !collapsed {
                return CheckResult::pass(codes::BATCH_SOURCE_COUNT, None);
            }
            let message = format!(
                "{} count fell to {} from a baseline of {} (minimum {:.0})",
                source, count, baseline, required.ceil()
            );
            if ctx.config.allowed_count_drops.contains(&source) {
                CheckResult::warn(codes::BATCH_SOURCE_COUNT, None, format!("{} (allowed)", message))
            } else {
                CheckResult::fail(codes::BATCH_SOURCE_COUNT, None, message)
            }
        })
        .collect()
}

/// Excluded share of the batch. A high share usually means an upstream shape
/// change rather than many individually bad records.
pub fn failure_ratio(excluded: usize, checked: usize, config: &AuditConfig) -> CheckResult {
    if checked == 0 {
        return CheckResult::pass(codes::BATCH_FAILURE_RATIO, None);
    }
    let ratio = excluded as f64 / checked as f64;
    if ratio > config.max_failure_ratio {
        CheckResult::fail(
            codes::BATCH_FAILURE_RATIO,
            None,
            format!(
                "{} of {} records excluded ({:.0}% > {:.0}%)",
                excluded,
                checked,
                ratio * 100.0,
                config.max_failure_ratio * 100.0
            ),
        )
    } else {
        CheckResult::pass(codes::BATCH_FAILURE_RATIO, None)
    }
}

/// The prior artifact's stored hash should match its records. A mismatch means
/// someone edited the published file by hand; the run continues.
pub fn prior_integrity(prior: Option<&PublishedArtifact>) -> Option<CheckResult> {
    let prior = prior?;
    Some(match prior.verify_content_hash() {
        Ok(true) => CheckResult::pass(codes::BATCH_PRIOR_INTEGRITY, None),
        Ok(false) => CheckResult::warn(
            codes::BATCH_PRIOR_INTEGRITY,
            None,
            "prior artifact content does not match its contentHash",
        ),
        Err(e) => CheckResult::warn(
            codes::BATCH_PRIOR_INTEGRITY,
            None,
            format!("could not hash prior artifact: {}", e),
        ),
    })
}

/// Compare the hash of the staged file as re-read from disk with the hash the
/// artifact declares.
pub fn staged_content_hash(declared: &str, reread: &str) -> CheckResult {
    if declared == reread {
        CheckResult::pass(codes::BATCH_STAGED_CONTENT_HASH, None)
    } else {
        CheckResult::fail(
            codes::BATCH_STAGED_CONTENT_HASH,
            None,
            format!("staged artifact hashes to {} but declares {}", reread, declared),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{d, fema_record};
    use super::super::{CheckOutcome, UrlPolicy};
    use super::*;
    use crate::pipeline::artifact::AuditSummary;
    use std::collections::HashMap;

    fn prior_with(records: Vec<DisasterRecord>) -> PublishedArtifact {
        PublishedArtifact::build(records, d(2026, 1, 1), AuditSummary::default(), Vec::new()).unwrap()
    }

    #[test]
    fn test_expired_prior_records_lower_the_baseline() {
        let today = d(2026, 2, 11);
        // Ten prior records; eight closed at the end of January
        let mut prior_records: Vec<_> = (0..8)
            .map(|i| fema_record(4700 + i, "TX", d(2025, 11, 5), d(2025, 12, 1)))
            .collect();
        prior_records.push(fema_record(4834, "TX", d(2026, 1, 10), today));
        prior_records.push(fema_record(4835, "TX", d(2026, 1, 10), today));
        let prior = prior_with(prior_records);

        let kept = vec![
            fema_record(4834, "TX", d(2026, 1, 10), today),
            fema_record(4835, "TX", d(2026, 1, 10), today),
        ];
        let config = AuditConfig::default();
        let urls = UrlPolicy::default();
        let probes = HashMap::new();
        let ctx = AuditContext { today, config: &config, urls: &urls, prior: Some(&prior), probes: &probes };

        let results = source_counts(&kept, &ctx);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].outcome, CheckOutcome::Pass);
    }

    #[test]
    fn test_allowed_drop_downgrades_to_warning() {
        let today = d(2026, 2, 11);
        let prior = prior_with((0..10).map(|i| fema_record(4800 + i, "TX", d(2026, 1, 10), today)).collect());
        let config = AuditConfig {
            allowed_count_drops: vec![Source::Fema],
            ..AuditConfig::default()
        };
        let urls = UrlPolicy::default();
        let probes = HashMap::new();
        let ctx = AuditContext { today, config: &config, urls: &urls, prior: Some(&prior), probes: &probes };

        let results = source_counts(&[], &ctx);
        assert_eq!(results[0].outcome, CheckOutcome::Warn);
        assert!(results[0].message.contains("fell to 0"));
    }

    #[test]
    fn test_failure_ratio_boundary() {
        let config = AuditConfig::default();
        assert_eq!(failure_ratio(1, 4, &config).outcome, CheckOutcome::Pass);
        assert_eq!(failure_ratio(2, 4, &config).outcome, CheckOutcome::Fail);
        assert_eq!(failure_ratio(0, 0, &config).outcome, CheckOutcome::Pass);
    }

    #[test]
    fn test_hand_edited_prior_only_warns() {
        let today = d(2026, 2, 11);
        let mut prior = prior_with(vec![fema_record(4834, "TX", d(2026, 1, 10), today)]);
        assert_eq!(prior_integrity(Some(&prior)).unwrap().outcome, CheckOutcome::Pass);
        prior.disasters[0].declaration.title = "edited".to_string();
        assert_eq!(prior_integrity(Some(&prior)).unwrap().outcome, CheckOutcome::Warn);
        assert!(prior_integrity(None).is_none());
    }
}
