//! The published artifact: records plus the metadata that lets a consumer (or
//! the next run) check what it is holding.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::constants::GENERATED_BY;
use crate::domain::{DisasterRecord, Source};
use crate::error::Result;
use crate::pipeline::processing::coverage::CoverageGap;
use crate::pipeline::processing::quality_gate::{AuditWarning, ExcludedRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishedArtifact {
    pub metadata: ArtifactMetadata,
    pub disasters: Vec<DisasterRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    pub generated_at: DateTime<Utc>,
    pub run_date: NaiveDate,
    pub record_count: usize,
    pub generated_by: String,
    pub content_hash: String,
    pub source_counts: BTreeMap<Source, usize>,
    pub audit: AuditSummary,
    #[serde(default)]
    pub coverage_gaps: Vec<CoverageGap>,
}

/// The part of the audit report that travels with the artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub passed: bool,
    #[serde(default)]
    pub warnings: Vec<AuditWarning>,
    #[serde(default)]
    pub excluded: Vec<ExcludedRecord>,
}

/// Timestamp stamped on everything produced for `run_date`: midnight UTC, so
/// two runs over identical inputs on the same day produce identical bytes.
pub fn run_timestamp(run_date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&run_date.and_time(NaiveTime::MIN))
}

/// Publication order: jurisdiction, then declaration date, then id.
pub fn sort_records(records: &mut [DisasterRecord]) {
    records.sort_by(|a, b| {
        a.jurisdiction()
            .cmp(b.jurisdiction())
            .then(a.declaration.declaration_date.cmp(&b.declaration.declaration_date))
            .then(a.id().cmp(b.id()))
    });
}

/// SHA-256 hex digest over the compact JSON serialization of the records.
pub fn content_hash(records: &[DisasterRecord]) -> Result<String> {
    let bytes = serde_json::to_vec(records)?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    Ok(hex::encode(hasher.finalize()))
}

pub fn source_counts(records: &[DisasterRecord]) -> BTreeMap<Source, usize> {
    let mut counts = BTreeMap::new();
    for record in records {
        *counts.entry(record.source()).or_insert(0) += 1;
    }
    counts
}

impl PublishedArtifact {
    pub fn build(
        mut records: Vec<DisasterRecord>,
        run_date: NaiveDate,
        audit: AuditSummary,
        coverage_gaps: Vec<CoverageGap>,
    ) -> Result<Self> {
        sort_records(&mut records);
        let metadata = ArtifactMetadata {
            generated_at: run_timestamp(run_date),
            run_date,
            record_count: records.len(),
            generated_by: GENERATED_BY.to_string(),
            content_hash: content_hash(&records)?,
            source_counts: source_counts(&records),
            audit,
            coverage_gaps,
        };
        Ok(Self { metadata, disasters: records })
    }

    /// Pretty-printed JSON with a trailing newline.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = serde_json::to_vec_pretty(self)?;
        bytes.push(b'\n');
        Ok(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Whether the stored content hash matches the records actually present.
    pub fn verify_content_hash(&self) -> Result<bool> {
        Ok(content_hash(&self.disasters)? == self.metadata.content_hash)
    }
}
