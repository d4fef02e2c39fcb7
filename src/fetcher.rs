//! Byte-exact download of a single artifact to local storage.

use crate::Result;
use futures::stream::TryStreamExt;
use ohno::{IntoAppError, app_err};
use std::path::Path;
use tokio::io::AsyncWriteExt;

const LOG_TARGET: &str = "   fetcher";

/// Streams remote binary resources into a local artifact tree.
///
/// Downloads are idempotent per local path: an artifact that already exists
/// on disk (from this run or a prior one) is never re-fetched.
#[derive(Debug, Clone)]
pub struct ArtifactFetcher {
    client: reqwest::Client,
}

impl ArtifactFetcher {
    /// Create a new fetcher with its own HTTP client.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("sigsurvey")
            .build()
            .into_app_err("creating HTTP client")?;

        Ok(Self { client })
    }

    /// Download `url` to `local_path`, creating missing parent directories.
    ///
    /// No-op when `local_path` already exists. Any failure is fatal to this
    /// artifact's classification only, never to the run.
    pub async fn fetch(&self, url: &str, local_path: &Path) -> Result<()> {
        if local_path.exists() {
            log::debug!(target: LOG_TARGET, "'{}' already downloaded", local_path.display());
            return Ok(());
        }

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .into_app_err_with(|| format!("creating directory '{}'", parent.display()))?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .into_app_err_with(|| format!("fetching '{url}'"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(app_err!("unexpected response {status} downloading '{url}'"));
        }

        let mut file = tokio::fs::File::create(local_path)
            .await
            .into_app_err_with(|| format!("creating '{}'", local_path.display()))?;

        let mut stream = response.bytes_stream();
        let mut total_bytes = 0;

        while let Some(chunk) = stream
            .try_next()
            .await
            .into_app_err_with(|| format!("reading response chunk of '{url}'"))?
        {
            total_bytes += chunk.len();
            file.write_all(&chunk)
                .await
                .into_app_err_with(|| format!("writing to '{}'", local_path.display()))?;
        }

        file.flush()
            .await
            .into_app_err_with(|| format!("flushing '{}'", local_path.display()))?;

        log::debug!(target: LOG_TARGET, "downloaded {total_bytes} bytes from '{url}' to '{}'", local_path.display());
        Ok(())
    }
}
