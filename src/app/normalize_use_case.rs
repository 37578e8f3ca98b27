use chrono::{DateTime, Utc};
use tracing::{info, warn, Instrument};

use crate::app::ports::CollectorPort;
use crate::config::FeedConfig;
use crate::observability::metrics;
use crate::pipeline::processing::merge::FeedBatch;
use crate::pipeline::processing::normalize::{
    AreaNormalizer, NormalizationRegistry, NormalizeContext, RawRecord, Rejection,
};

/// Result of collecting and normalizing every configured feed.
#[derive(Debug, Default)]
pub struct NormalizeOutput {
    pub batches: Vec<FeedBatch>,
    pub rejections: Vec<Rejection>,
    /// Feeds that could not be collected this run.
    pub unavailable: Vec<String>,
}

/// Use case for turning raw feed payloads into canonical declarations
pub struct NormalizeUseCase {
    registry: NormalizationRegistry,
    areas: AreaNormalizer,
}

impl NormalizeUseCase {
    pub fn new(registry: NormalizationRegistry, areas: AreaNormalizer) -> Self {
        Self { registry, areas }
    }

    /// Normalize one raw payload list. Bad records are rejected individually;
    /// they never stop the feed.
    pub fn normalize_feed(
        &self,
        feed: &FeedConfig,
        values: Vec<serde_json::Value>,
        run_timestamp: DateTime<Utc>,
    ) -> (FeedBatch, Vec<Rejection>) {
        let ctx = NormalizeContext {
            areas: &self.areas,
            run_timestamp,
        };
        let mut records = Vec::with_capacity(values.len());
        let mut rejections = Vec::new();

        for (index, value) in values.into_iter().enumerate() {
            let raw = match RawRecord::from_value(feed.kind, value) {
                Ok(raw) => raw,
                Err(e) => {
                    warn!(feed = %feed.name, index, error = %e, "Payload does not match feed shape");
                    metrics::normalize::record_rejected(&feed.name);
                    rejections.push(Rejection {
                        feed: feed.name.clone(),
                        locator: format!("#{}", index),
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match self.registry.normalize(&raw, &ctx) {
                Ok(declaration) => records.push(declaration),
                Err(e) => {
                    let locator = raw.locator();
                    warn!(feed = %feed.name, record = %locator, error = %e, "Rejected raw record");
                    rejections.push(Rejection {
                        feed: feed.name.clone(),
                        locator,
                        reason: e.to_string(),
                    });
                }
            }
        }

        info!(
            feed = %feed.name,
            normalized = records.len(),
            rejected = rejections.len(),
            "Feed normalized"
        );
        (
            FeedBatch {
                feed: feed.name.clone(),
                freshness: feed.freshness,
                records,
            },
            rejections,
        )
    }

    /// Collect and normalize every feed. An unavailable feed contributes zero
    /// records; the count gate decides whether that is acceptable.
    pub async fn run(
        &self,
        collector: &dyn CollectorPort,
        feeds: &[FeedConfig],
        run_timestamp: DateTime<Utc>,
    ) -> NormalizeOutput {
        let mut output = NormalizeOutput::default();

        for feed in feeds {
            let span = tracing::info_span!("feed", name = %feed.name);
            let values = match collector.collect(feed).instrument(span).await {
                Ok(values) => values,
                Err(e) => {
                    warn!(feed = %feed.name, error = %e, "Feed unavailable; continuing with zero records");
                    metrics::normalize::feed_unavailable(&feed.name);
                    output.unavailable.push(feed.name.clone());
                    output.batches.push(FeedBatch {
                        feed: feed.name.clone(),
                        freshness: feed.freshness,
                        records: Vec::new(),
                    });
                    continue;
                }
            };

            let (batch, rejections) = self.normalize_feed(feed, values, run_timestamp);
            output.batches.push(batch);
            output.rejections.extend(rejections);
        }

        output
    }
}
