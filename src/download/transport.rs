//! Download transport: fetch a URL into a temp file next to its destination.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::{NamedTempFile, TempPath};
use thiserror::Error;
use tokio::io::AsyncWriteExt;

// ---------------------------------------------------------------------------
// DownloadError
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("HTTP {status} fetching {url}")]
    Http { status: u16, url: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error while downloading: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// DownloadTransport trait
// ---------------------------------------------------------------------------

/// Progress callback: `(bytes_written, expected_total)`. May borrow from the
/// caller.
pub type ProgressFn<'a> = dyn Fn(u64, Option<u64>) + Send + Sync + 'a;

/// Streams a remote file to disk.
///
/// The body is written to a temporary file inside `dir` (same filesystem as
/// the final destination, so publishing is a rename). If the returned future
/// is dropped before completion the temp file is deleted.
#[async_trait]
pub trait DownloadTransport: Send + Sync {
    async fn fetch(
        &self,
        url: &str,
        dir: &Path,
        progress: &ProgressFn<'_>,
    ) -> Result<TempPath, DownloadError>;
}

const _: fn() = || {
    fn _assert_object_safe(_: Box<dyn DownloadTransport>) {}
};

// ---------------------------------------------------------------------------
// HttpTransport
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, DownloadError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DownloadTransport for HttpTransport {
    async fn fetch(
        &self,
        url: &str,
        dir: &Path,
        progress: &ProgressFn<'_>,
    ) -> Result<TempPath, DownloadError> {
        log::info!("download: fetching {url}");

        let mut response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DownloadError::Http {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let expected = response.content_length();
        tokio::fs::create_dir_all(dir).await?;
        // The TempPath deletes the file if this future is dropped early.
        let (file, temp_path) = NamedTempFile::new_in(dir)?.into_parts();
        let mut file = tokio::fs::File::from_std(file);
        let mut written: u64 = 0;

        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
            progress(written, expected);
        }
        file.flush().await?;

        log::info!("download: received {written} bytes from {url}");
        Ok(temp_path)
    }
}

// ---------------------------------------------------------------------------
// Test double
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::mock::ScriptedTransport;
    use super::*;
    use std::sync::Mutex;
    use tempfile::tempdir;

    #[tokio::test]
    async fn scripted_transport_reports_each_chunk() {
        let dir = tempdir().unwrap();
        let transport = ScriptedTransport::ok(b"0123456789");
        let seen = Mutex::new(Vec::new());

        let temp = transport
            .fetch("https://example.test/ggml-tiny.bin", dir.path(), &|w, t| {
                seen.lock().unwrap().push((w, t))
            })
            .await
            .unwrap();

        assert_eq!(std::fs::read(&temp).unwrap(), b"0123456789");
        assert_eq!(
            *seen.lock().unwrap(),
            vec![(4, Some(10)), (8, Some(10)), (10, Some(10))]
        );
    }

    #[tokio::test]
    async fn http_status_is_reported() {
        let dir = tempdir().unwrap();
        let err = ScriptedTransport::failing(404)
            .fetch("https://example.test/missing.bin", dir.path(), &|_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, DownloadError::Http { status: 404, .. }));
        assert_eq!(err.to_string(), "HTTP 404 fetching https://example.test/missing.bin");
    }
}
