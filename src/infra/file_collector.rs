use anyhow::{bail, Context};
use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use tracing::info;

use crate::app::ports::CollectorPort;
use crate::config::FeedConfig;

/// Reads each feed from `<input_dir>/<feed name>.json`. The file holds either
/// a JSON array of raw records or an object with a `records` array.
pub struct FileCollector {
    input_dir: PathBuf,
}

impl FileCollector {
    pub fn new(input_dir: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
        }
    }

    pub fn feed_path(&self, feed: &FeedConfig) -> PathBuf {
        self.input_dir.join(format!("{}.json", feed.name))
    }
}

#[async_trait]
impl CollectorPort for FileCollector {
    async fn collect(&self, feed: &FeedConfig) -> anyhow::Result<Vec<Value>> {
        let path = self.feed_path(feed);
        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading feed file {}", path.display()))?;
        let value: Value = serde_json::from_slice(&bytes)
            .with_context(|| format!("parsing feed file {}", path.display()))?;

        let records = match value {
            Value::Array(records) => records,
            Value::Object(mut map) => match map.remove("records") {
                Some(Value::Array(records)) => records,
                _ => bail!("{}: expected an array or an object with a \"records\" array", path.display()),
            },
            _ => bail!("{}: expected an array or an object with a \"records\" array", path.display()),
        };

        info!(feed = %feed.name, count = records.len(), "Collected raw records");
        Ok(records)
    }
}
