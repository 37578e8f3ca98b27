use anyhow::Result;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

use crate::app::link_check_use_case::LinkCheckUseCase;
use crate::app::normalize_use_case::NormalizeUseCase;
use crate::app::ports::{ArtifactStorePort, CollectorPort, UrlProbePort};
use crate::app::quality_gate_use_case::{GateInputs, QualityGateUseCase};
use crate::config::Config;
use crate::constants::{AUDIT_REPORT_FILE, COVERAGE_GAPS_FILE};
use crate::domain::{Declaration, DisasterRecord, Status};
use crate::observability::metrics;
use crate::pipeline::artifact::run_timestamp;
use crate::pipeline::processing::coverage::CoverageGap;
use crate::pipeline::processing::merge::{merge_feeds, MergeDiagnostic};
use crate::pipeline::processing::normalize::{AreaNormalizer, NormalizationRegistry, Rejection};
use crate::pipeline::processing::quality_gate::{AuditReport, UrlPolicy};
use crate::pipeline::processing::window::compute_window;

/// Everything a run reports besides the artifact itself; written to
/// `audit_report.json` whether or not the artifact was published.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport<'a> {
    pub run_date: NaiveDate,
    pub published: bool,
    pub unavailable_feeds: &'a [String],
    pub rejections: &'a [Rejection],
    pub merge_diagnostics: &'a [MergeDiagnostic],
    pub expired_dropped: &'a [String],
    pub audit: &'a AuditReport,
}

/// Result of a complete pipeline run
#[derive(Debug)]
pub struct PipelineResult {
    pub run_date: NaiveDate,
    pub published: bool,
    pub record_count: usize,
    pub rejected: usize,
    pub expired_dropped: usize,
    pub excluded: usize,
    pub warnings: usize,
    pub coverage_gaps: Vec<CoverageGap>,
    pub gate_failures: Vec<String>,
    pub unavailable_feeds: Vec<String>,
}

/// Attach windows and drop records whose window has closed. A record whose
/// window cannot be computed is rejected under the feed that supplied it.
fn apply_windows(
    records: Vec<Declaration>,
    origins: &HashMap<String, String>,
    today: NaiveDate,
    rejections: &mut Vec<Rejection>,
) -> (Vec<DisasterRecord>, Vec<String>) {
    let mut windowed = Vec::with_capacity(records.len());
    let mut expired = Vec::new();

    for declaration in records {
        match compute_window(&declaration, today) {
            Ok(window) if window.status == Status::Expired => {
                debug!(id = %declaration.id, window_end = %window.window_end, "Dropping expired record");
                expired.push(declaration.id);
            }
            Ok(window) => windowed.push(DisasterRecord { declaration, window }),
            Err(e) => {
                let feed = origins
                    .get(&declaration.id)
                    .cloned()
                    .unwrap_or_else(|| declaration.source.to_string());
                warn!(id = %declaration.id, feed = %feed, error = %e, "Window could not be computed");
                rejections.push(Rejection {
                    feed,
                    locator: declaration.id,
                    reason: format!("window: {}", e),
                });
            }
        }
    }

    if !expired.is_empty() {
        metrics::merge::expired_dropped(expired.len());
    }
    (windowed, expired)
}

pub struct Pipeline {
    config: Config,
    collector: Arc<dyn CollectorPort>,
    store: Arc<dyn ArtifactStorePort>,
    prober: Option<Arc<dyn UrlProbePort>>,
    urls: UrlPolicy,
}

impl Pipeline {
    pub fn new(
        config: Config,
        collector: Arc<dyn CollectorPort>,
        store: Arc<dyn ArtifactStorePort>,
        prober: Option<Arc<dyn UrlProbePort>>,
    ) -> Result<Self> {
        let urls = UrlPolicy::from_config(&config.url_checks)?;
        Ok(Self {
            config,
            collector,
            store,
            prober,
            urls,
        })
    }

    #[instrument(skip(self), fields(today = %today))]
    pub async fn run(&self, today: NaiveDate) -> Result<PipelineResult> {
        let started = Instant::now();
        info!("Starting compile run");

        let normalizer = NormalizeUseCase::new(
            NormalizationRegistry::new(),
            AreaNormalizer::new(&self.config.aliases),
        );
        let normalized = normalizer
            .run(self.collector.as_ref(), &self.config.feeds, run_timestamp(today))
            .await;
        let mut rejections = normalized.rejections;

        let suppressed: HashSet<String> = self.config.suppressed_ids.iter().cloned().collect();
        let merged = merge_feeds(normalized.batches, &suppressed);
        info!(records = merged.records.len(), diagnostics = merged.diagnostics.len(), "Feeds merged");

        let (records, expired) = apply_windows(merged.records, &merged.origins, today, &mut rejections);
        info!(active = records.len(), expired = expired.len(), "Windows computed");

        let probes = match (&self.prober, self.config.url_checks.enabled) {
            (Some(prober), true) => {
                LinkCheckUseCase::new(
                    Arc::clone(prober),
                    self.config.url_checks.max_concurrency,
                    Duration::from_secs(self.config.url_checks.timeout_secs),
                )
                .check_all(&records, &self.urls)
                .await
            }
            _ => HashMap::new(),
        };

        let gate = QualityGateUseCase::new(Arc::clone(&self.store));
        let outcome = gate
            .assess_and_publish(
                records,
                GateInputs {
                    today,
                    audit: &self.config.audit,
                    coverage: &self.config.coverage,
                    urls: &self.urls,
                    probes: &probes,
                },
            )
            .await?;

        let report = RunReport {
            run_date: today,
            published: outcome.published,
            unavailable_feeds: &normalized.unavailable,
            rejections: &rejections,
            merge_diagnostics: &merged.diagnostics,
            expired_dropped: &expired,
            audit: &outcome.report,
        };
        let mut report_bytes = serde_json::to_vec_pretty(&report)?;
        report_bytes.push(b'\n');
        self.store.write_report(AUDIT_REPORT_FILE, &report_bytes).await?;

        let mut gap_bytes = serde_json::to_vec_pretty(&outcome.coverage_gaps)?;
        gap_bytes.push(b'\n');
        self.store.write_report(COVERAGE_GAPS_FILE, &gap_bytes).await?;

        let result = PipelineResult {
            run_date: today,
            published: outcome.published,
            record_count: outcome.artifact.metadata.record_count,
            rejected: rejections.len(),
            expired_dropped: expired.len(),
            excluded: outcome.report.excluded.len(),
            warnings: outcome.report.warnings().len(),
            gate_failures: outcome
                .report
                .gate_failures()
                .iter()
                .map(|g| format!("{}: {}", g.code, g.message))
                .collect(),
            coverage_gaps: outcome.coverage_gaps,
            unavailable_feeds: normalized.unavailable,
        };

        info!(
            published = result.published,
            records = result.record_count,
            duration_secs = started.elapsed().as_secs_f64(),
            "Compile run finished"
        );
        Ok(result)
    }
}
