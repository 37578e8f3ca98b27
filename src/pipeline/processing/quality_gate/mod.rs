//! Audit engine: the quality gate every batch passes before publication.
//!
//! Per-record checks decide whether a single record is kept; a FAIL excludes
//! that record only. Batch checks decide whether the artifact is published at
//! all. WARN never blocks anything and is surfaced in the artifact metadata.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{info, warn};

use crate::config::AuditConfig;
use crate::domain::DisasterRecord;
use crate::observability::metrics;
use crate::pipeline::artifact::{AuditSummary, PublishedArtifact};

pub mod batch_checks;
pub mod record_checks;
pub mod url_checks;

pub use url_checks::{LivenessPolicy, ProbeOutcome, ProbeReport, UrlPolicy};

/// Stable check codes. These appear in reports and metrics labels.
pub mod codes {
    pub const REQUIRED_FIELDS: &str = "record.required_fields";
    pub const ID_FORMAT: &str = "record.id_format";
    pub const JURISDICTION: &str = "record.jurisdiction";
    pub const AREAS_NON_EMPTY: &str = "record.areas_non_empty";
    pub const INCIDENT_ORDER: &str = "record.incident_order";
    pub const DECLARATION_NOT_FUTURE: &str = "record.declaration_not_future";
    pub const WINDOW_START: &str = "record.window_start";
    pub const WINDOW_END: &str = "record.window_end";
    pub const WINDOW_NOT_EXPIRED: &str = "record.window_not_expired";
    pub const STATUS_CONSISTENT: &str = "record.status_consistent";
    pub const INCIDENT_LOOKBACK: &str = "record.incident_lookback";
    pub const LAST_VERIFIED: &str = "record.last_verified";
    pub const URL_WELL_FORMED: &str = "url.well_formed";
    pub const URL_RECORD_SPECIFIC: &str = "url.record_specific";
    pub const URL_PATTERN: &str = "url.pattern";
    pub const URL_LIVENESS: &str = "url.liveness";
    pub const URL_RELEVANCE: &str = "url.relevance";

    pub const BATCH_DUPLICATE_IDS: &str = "batch.duplicate_ids";
    pub const BATCH_SOURCE_COUNT: &str = "batch.source_count";
    pub const BATCH_FAILURE_RATIO: &str = "batch.failure_ratio";
    pub const BATCH_PRIOR_INTEGRITY: &str = "batch.prior_integrity";
    pub const BATCH_STAGED_CONTENT_HASH: &str = "batch.staged_content_hash";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckOutcome {
    Pass,
    Warn,
    Fail,
}

impl CheckOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckOutcome::Pass => "PASS",
            CheckOutcome::Warn => "WARN",
            CheckOutcome::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub code: String,
    pub outcome: CheckOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    pub message: String,
}

impl CheckResult {
    pub fn pass(code: &str, record_id: Option<&str>) -> Self {
        Self::new(code, CheckOutcome::Pass, record_id, String::new())
    }

    pub fn warn(code: &str, record_id: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(code, CheckOutcome::Warn, record_id, message.into())
    }

    pub fn fail(code: &str, record_id: Option<&str>, message: impl Into<String>) -> Self {
        Self::new(code, CheckOutcome::Fail, record_id, message.into())
    }

    fn new(code: &str, outcome: CheckOutcome, record_id: Option<&str>, message: String) -> Self {
        Self {
            code: code.to_string(),
            outcome,
            record_id: record_id.map(str::to_string),
            message,
        }
    }
}

/// A WARN finding as it appears in artifact metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditWarning {
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_id: Option<String>,
    pub message: String,
}

/// A record dropped by per-record checks, with every failing code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludedRecord {
    pub id: String,
    pub reasons: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckTally {
    pub pass: usize,
    pub warn: usize,
    pub fail: usize,
}

/// Everything the checks need besides the records themselves.
pub struct AuditContext<'a> {
    pub today: NaiveDate,
    pub config: &'a AuditConfig,
    pub urls: &'a UrlPolicy,
    /// Last published artifact, if one exists and could be read.
    pub prior: Option<&'a PublishedArtifact>,
    /// Probe results keyed by record id. Empty when liveness probing is off.
    pub probes: &'a HashMap<String, ProbeReport>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub run_date: NaiveDate,
    pub passed: bool,
    pub checked: usize,
    pub retained: usize,
    pub excluded: Vec<ExcludedRecord>,
    /// Non-PASS per-record findings.
    pub findings: Vec<CheckResult>,
    /// Every batch check result, PASS included.
    pub gates: Vec<CheckResult>,
    pub check_counts: BTreeMap<String, CheckTally>,
    /// Records that survived per-record checks, in input order.
    #[serde(skip)]
    pub records: Vec<DisasterRecord>,
}

impl AuditReport {
    /// Batch checks that failed.
    pub fn gate_failures(&self) -> Vec<&CheckResult> {
        self.gates.iter().filter(|g| g.outcome == CheckOutcome::Fail).collect()
    }

    /// Record a batch check evaluated outside the engine (e.g. after staging).
    pub fn record_gate(&mut self, result: CheckResult) {
        tally(&mut self.check_counts, &result);
        if result.outcome == CheckOutcome::Fail {
            self.passed = false;
        }
        self.gates.push(result);
    }

    pub fn warnings(&self) -> Vec<AuditWarning> {
        self.findings
            .iter()
            .chain(self.gates.iter())
            .filter(|r| r.outcome == CheckOutcome::Warn)
            .map(|r| AuditWarning {
                code: r.code.clone(),
                record_id: r.record_id.clone(),
                message: r.message.clone(),
            })
            .collect()
    }

    pub fn summary(&self) -> AuditSummary {
        AuditSummary {
            passed: self.passed,
            warnings: self.warnings(),
            excluded: self.excluded.clone(),
        }
    }
}

fn tally(counts: &mut BTreeMap<String, CheckTally>, result: &CheckResult) {
    let entry = counts.entry(result.code.clone()).or_default();
    match result.outcome {
        CheckOutcome::Pass => entry.pass += 1,
        CheckOutcome::Warn => entry.warn += 1,
        CheckOutcome::Fail => entry.fail += 1,
    }
    metrics::audit::check_recorded(&result.code, result.outcome.as_str());
}

/// Deterministic audit over a batch of windowed records.
pub struct AuditEngine;

impl AuditEngine {
    pub fn audit(records: Vec<DisasterRecord>, ctx: &AuditContext<'_>) -> AuditReport {
        let checked = records.len();
        let mut check_counts = BTreeMap::new();
        let mut findings = Vec::new();
        let mut excluded = Vec::new();
        let mut kept = Vec::with_capacity(records.len());

        // Duplicate detection looks at the whole batch, excluded records included
        let duplicate_gate = batch_checks::duplicate_ids(&records);

        for record in records {
            let results = record_checks::check_record(&record, ctx);
            let mut reasons = Vec::new();
            for result in results {
                tally(&mut check_counts, &result);
                match result.outcome {
                    CheckOutcome::Pass => {}
                    CheckOutcome::Warn => findings.push(result),
                    CheckOutcome::Fail => {
                        reasons.push(format!("{}: {}", result.code, result.message));
                        findings.push(result);
                    }
                }
            }

            if reasons.is_empty() {
                kept.push(record);
            } else {
                warn!(id = %record.id(), reasons = ?reasons, "Record excluded by audit");
                excluded.push(ExcludedRecord {
                    id: record.id().to_string(),
                    reasons,
                });
            }
        }

        let mut gates = vec![duplicate_gate];
        gates.extend(batch_checks::source_counts(&kept, ctx));
        gates.push(batch_checks::failure_ratio(excluded.len(), checked, ctx.config));
        if let Some(integrity) = batch_checks::prior_integrity(ctx.prior) {
            gates.push(integrity);
        }
        for gate in &gates {
            tally(&mut check_counts, gate);
        }

        let passed = gates.iter().all(|g| g.outcome != CheckOutcome::Fail);
        info!(
            checked,
            retained = kept.len(),
            excluded = excluded.len(),
            passed,
            "Audit complete"
        );

        AuditReport {
            run_date: ctx.today,
            passed,
            checked,
            retained: kept.len(),
            excluded,
            findings,
            gates,
            check_counts,
            records: kept,
        }
    }
}
