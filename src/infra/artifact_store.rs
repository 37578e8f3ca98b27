use anyhow::Context;
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::app::ports::ArtifactStorePort;
use crate::constants::ARTIFACT_FILE;

/// Filesystem store. The candidate is written to `<artifact>.tmp` and renamed
/// over the published file, so readers only ever see a complete artifact.
pub struct FsArtifactStore {
    output_dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.output_dir.join(ARTIFACT_FILE)
    }

    pub fn staged_path(&self) -> PathBuf {
        self.output_dir.join(format!("{}.tmp", ARTIFACT_FILE))
    }
}

async fn write_synced(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    let mut file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("creating {}", path.display()))?;
    file.write_all(bytes).await?;
    file.sync_all().await?;
    Ok(())
}

#[async_trait]
impl ArtifactStorePort for FsArtifactStore {
    async fn load_published(&self) -> anyhow::Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.artifact_path()).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading {}", self.artifact_path().display())),
        }
    }

    async fn stage(&self, bytes: &[u8]) -> anyhow::Result<()> {
        let path = self.staged_path();
        write_synced(&path, bytes).await?;
        debug!("Staged artifact at {}", path.display());
        Ok(())
    }

    async fn read_staged(&self) -> anyhow::Result<Vec<u8>> {
        let path = self.staged_path();
        tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading {}", path.display()))
    }

    async fn commit(&self) -> anyhow::Result<()> {
        tokio::fs::rename(self.staged_path(), self.artifact_path())
            .await
            .context("renaming staged artifact into place")?;
        info!("Published {}", self.artifact_path().display());
        Ok(())
    }

    async fn discard(&self) -> anyhow::Result<()> {
        match tokio::fs::remove_file(self.staged_path()).await {
            Ok(()) => {
                debug!("Removed staged artifact");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_report(&self, name: &str, bytes: &[u8]) -> anyhow::Result<()> {
        let path = self.output_dir.join(name);
        let tmp = self.output_dir.join(format!("{}.tmp", name));
        write_synced(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        info!("Wrote {}", path.display());
        Ok(())
    }
}
