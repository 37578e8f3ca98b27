use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::app::ports::ArtifactStorePort;
use crate::config::{AuditConfig, CoverageConfig};
use crate::domain::DisasterRecord;
use crate::observability::metrics;
use crate::pipeline::artifact::{content_hash, PublishedArtifact};
use crate::pipeline::processing::coverage::{CoverageGap, CoverageGapAnalyzer};
use crate::pipeline::processing::quality_gate::batch_checks::staged_content_hash;
use crate::pipeline::processing::quality_gate::{
    codes, AuditContext, AuditEngine, AuditReport, CheckResult, ProbeReport, UrlPolicy,
};

/// Run-specific inputs to the gate.
pub struct GateInputs<'a> {
    pub today: NaiveDate,
    pub audit: &'a AuditConfig,
    pub coverage: &'a CoverageConfig,
    pub urls: &'a UrlPolicy,
    pub probes: &'a HashMap<String, ProbeReport>,
}

#[derive(Debug)]
pub struct GateOutcome {
    pub published: bool,
    pub report: AuditReport,
    pub coverage_gaps: Vec<CoverageGap>,
    /// The candidate artifact, whether or not it was published.
    pub artifact: PublishedArtifact,
}

/// Use case for auditing a windowed batch and publishing it only when every
/// gating check passes.
pub struct QualityGateUseCase {
    store: Arc<dyn ArtifactStorePort>,
}

impl QualityGateUseCase {
    pub fn new(store: Arc<dyn ArtifactStorePort>) -> Self {
        Self { store }
    }

    /// The currently published artifact. An unreadable one is reported as a
    /// warning and treated as absent.
    pub async fn load_prior(&self) -> (Option<PublishedArtifact>, Option<CheckResult>) {
        let bytes = match self.store.load_published().await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return (None, None),
            Err(e) => {
                warn!(error = %e, "Could not read the published artifact");
                return (
                    None,
                    Some(CheckResult::warn(
                        codes::BATCH_PRIOR_INTEGRITY,
                        None,
                        format!("prior artifact unreadable: {}", e),
                    )),
                );
            }
        };
        match PublishedArtifact::from_slice(&bytes) {
            Ok(prior) => (Some(prior), None),
            Err(e) => {
                warn!(error = %e, "Published artifact does not parse");
                (
                    None,
                    Some(CheckResult::warn(
                        codes::BATCH_PRIOR_INTEGRITY,
                        None,
                        format!("prior artifact does not parse: {}", e),
                    )),
                )
            }
        }
    }

    /// Audit, analyze coverage, then stage, verify and commit. The published
    /// artifact is replaced only if every gate passed; otherwise it is left as is.
    pub async fn assess_and_publish(&self, records: Vec<DisasterRecord>, inputs: GateInputs<'_>) -> Result<GateOutcome> {
        let (prior, prior_warning) = self.load_prior().await;

        let ctx = AuditContext {
            today: inputs.today,
            config: inputs.audit,
            urls: inputs.urls,
            prior: prior.as_ref(),
            probes: inputs.probes,
        };
        let mut report = AuditEngine::audit(records, &ctx);
        if let Some(warning) = prior_warning {
            report.record_gate(warning);
        }

        let coverage_gaps = CoverageGapAnalyzer::new(inputs.coverage).analyze(&report.records);
        let artifact = PublishedArtifact::build(
            report.records.clone(),
            inputs.today,
            report.summary(),
            coverage_gaps.clone(),
        )?;

        let published = if report.passed {
            self.stage_and_commit(&artifact, &mut report).await?
        } else {
            // Clear any candidate a crashed run may have left behind
            self.store.discard().await?;
            false
        };

        if published {
            info!(records = artifact.metadata.record_count, hash = %artifact.metadata.content_hash, "Artifact published");
            metrics::publish::published(artifact.metadata.record_count);
        } else {
            for failure in report.gate_failures() {
                error!(code = %failure.code, "Gate failed: {}", failure.message);
            }
            warn!("Publication withheld; previous artifact left in place");
            metrics::publish::withheld();
        }

        Ok(GateOutcome {
            published,
            report,
            coverage_gaps,
            artifact,
        })
    }

    async fn stage_and_commit(&self, artifact: &PublishedArtifact, report: &mut AuditReport) -> Result<bool> {
        let bytes = artifact.to_json_bytes()?;
        self.store.stage(&bytes).await.context("staging artifact")?;

        let reread = self.store.read_staged().await.context("re-reading staged artifact")?;
        let reread_hash = match PublishedArtifact::from_slice(&reread) {
            Ok(staged) => content_hash(&staged.disasters)?,
            Err(e) => format!("<unparsable: {}>", e),
        };
        report.record_gate(staged_content_hash(&artifact.metadata.content_hash, &reread_hash));

        if report.passed {
            self.store.commit().await.context("committing artifact")?;
            Ok(true)
        } else {
            self.store.discard().await?;
            Ok(false)
        }
    }
}
