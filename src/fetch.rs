//! Streaming binary downloads.
//!
//! PDFs can run to tens of megabytes, so response bodies are streamed
//! chunk-by-chunk into the file sink instead of being buffered in memory.
//! A download only counts as complete once the sink flush succeeds.

use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::ConvertError;
use crate::utils::{pdf_filename_from_url, HttpClient};

/// A successfully written artifact
#[derive(Debug, Clone)]
pub struct Downloaded {
    /// Full path of the written file
    pub path: PathBuf,

    /// Filename component
    pub file_name: String,

    /// Bytes written
    pub bytes: u64,
}

/// Streams remote binaries (typically PDFs) to date-stamped files
#[derive(Debug, Clone)]
pub struct BinaryFetcher {
    client: Arc<HttpClient>,
}

impl BinaryFetcher {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    /// Download `url` into `dir`, deriving the filename from the URL's last
    /// path segment (with `.pdf` appended and a date stamp inserted).
    pub async fn download(&self, url: &str, dir: &Path) -> Result<Downloaded, ConvertError> {
        let file_name = pdf_filename_from_url(url);
        self.download_as(url, dir, &file_name).await
    }

    /// Download `url` into `dir` under an explicit filename.
    pub async fn download_as(
        &self,
        url: &str,
        dir: &Path,
        file_name: &str,
    ) -> Result<Downloaded, ConvertError> {
        fs::create_dir_all(dir).await?;

        debug!(url, file_name, "starting binary download");

        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(ConvertError::Fetch(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }

        let path = dir.join(file_name);
        let mut file = fs::File::create(&path).await?;

        let mut stream = response.bytes_stream();
        let mut bytes: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            bytes += chunk.len() as u64;
        }
        file.flush().await?;

        info!(url, bytes, path = %path.display(), "download complete");

        Ok(Downloaded {
            path,
            file_name: file_name.to_string(),
            bytes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_download_streams_to_file() {
        let mut server = mockito::Server::new_async().await;
        let body = b"%PDF-1.4 fake pdf body".to_vec();
        let _mock = server
            .mock("GET", "/papers/test.pdf")
            .with_status(200)
            .with_header("content-type", "application/pdf")
            .with_body(body.clone())
            .create_async()
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = BinaryFetcher::new(Arc::new(HttpClient::new()));
        let url = format!("{}/papers/test.pdf", server.url());

        let downloaded = fetcher
            .download(&url, dir.path())
            .await
            .expect("download should succeed");

        assert_eq!(downloaded.bytes, body.len() as u64);
        assert!(downloaded.file_name.starts_with("test_"));
        assert!(downloaded.file_name.ends_with(".pdf"));
        let written = std::fs::read(&downloaded.path).expect("file exists");
        assert_eq!(written, body);
    }

    #[tokio::test]
    async fn test_download_http_error_is_fetch_failure() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/missing.pdf")
            .with_status(404)
            .create_async()
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = BinaryFetcher::new(Arc::new(HttpClient::new()));
        let url = format!("{}/missing.pdf", server.url());

        let err = fetcher.download(&url, dir.path()).await.unwrap_err();
        assert!(matches!(err, ConvertError::Fetch(_)));
    }

    #[tokio::test]
    async fn test_explicit_filename_respected() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/x.pdf")
            .with_status(200)
            .with_body("%PDF")
            .create_async()
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let fetcher = BinaryFetcher::new(Arc::new(HttpClient::new()));
        let url = format!("{}/x.pdf", server.url());

        let downloaded = fetcher
            .download_as(&url, dir.path(), "Attention_1706.03762.pdf")
            .await
            .expect("download should succeed");

        assert_eq!(downloaded.file_name, "Attention_1706.03762.pdf");
        assert!(downloaded.path.ends_with("Attention_1706.03762.pdf"));
    }
}
