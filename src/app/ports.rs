use async_trait::async_trait;

use crate::config::FeedConfig;
use crate::pipeline::processing::quality_gate::ProbeReport;

/// Source of raw payloads, one call per configured feed.
#[async_trait]
pub trait CollectorPort: Send + Sync {
    /// Raw JSON objects for the feed. An error means the feed is unavailable
    /// this run; the caller treats it as zero records.
    async fn collect(&self, feed: &FeedConfig) -> anyhow::Result<Vec<serde_json::Value>>;
}

/// URL-liveness collaborator.
#[async_trait]
pub trait UrlProbePort: Send + Sync {
    /// Fetch `url` once and classify the result. When `relevance_token` is
    /// given, also report whether the body mentions it.
    async fn probe(&self, url: &str, relevance_token: Option<&str>) -> ProbeReport;
}

/// Storage for the published artifact and the per-run reports.
#[async_trait]
pub trait ArtifactStorePort: Send + Sync {
    /// Bytes of the currently published artifact, if any.
    async fn load_published(&self) -> anyhow::Result<Option<Vec<u8>>>;
    /// Write the candidate artifact next to the published one.
    async fn stage(&self, bytes: &[u8]) -> anyhow::Result<()>;
    async fn read_staged(&self) -> anyhow::Result<Vec<u8>>;
    /// Atomically replace the published artifact with the staged one.
    async fn commit(&self) -> anyhow::Result<()>;
    /// Drop the staged artifact, leaving the published one untouched.
    async fn discard(&self) -> anyhow::Result<()>;
    /// Write a side report (audit, coverage) under `name`.
    async fn write_report(&self, name: &str, bytes: &[u8]) -> anyhow::Result<()>;
}
