//! Conversion orchestration.
//!
//! [`Converter`] is the top-level dispatcher: classify the URL, route it to
//! the matching resolver or fallback chain, and normalize every branch into
//! one [`ConversionResult`]. Faults never escape [`Converter::convert`]; a
//! caller working through many URLs can always continue to the next one.
//!
//! The converter is a stateless service value: immutable settings plus
//! shared clients, no per-request mutable fields. One instance can serve
//! any number of calls, sequentially or otherwise.

mod batch;

pub use batch::{BatchSequencer, BatchSummary};

use std::sync::Arc;
use tracing::{debug, warn};

use crate::arxiv::{ArxivResolver, ListingExtractor, PreprintIdentity};
use crate::classify::{classify, Category};
use crate::config::Settings;
use crate::error::ConvertError;
use crate::extract::{ContentExtractor, ExtractFormat};
use crate::fetch::BinaryFetcher;
use crate::models::{ConversionResult, ListingEntry};
use crate::render::RenderChain;
use crate::utils::HttpClient;

/// Top-level URL-to-artifact converter
pub struct Converter {
    settings: Settings,
    fetcher: BinaryFetcher,
    resolver: ArxivResolver,
    listing: ListingExtractor,
    extractor: ContentExtractor,
    chain: RenderChain,
}

impl Converter {
    /// Build a converter with a fresh HTTP client.
    pub fn new(settings: Settings) -> Self {
        Self::with_client(settings, Arc::new(HttpClient::new()))
    }

    /// Build a converter over an existing shared client.
    pub fn with_client(settings: Settings, client: Arc<HttpClient>) -> Self {
        let chain = RenderChain::new(
            Arc::clone(&client),
            settings.render.capabilities(),
            settings.output_dir.clone(),
            settings.render.page_timeout(),
            settings.render.render_api_token.clone(),
        );

        Self {
            fetcher: BinaryFetcher::new(Arc::clone(&client)),
            resolver: ArxivResolver::new(Arc::clone(&client)),
            listing: ListingExtractor::new(Arc::clone(&client)),
            extractor: ContentExtractor::new(client),
            chain,
            settings,
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Convert one URL. Never returns an error and never panics: every
    /// fault becomes a `success = false` result.
    pub async fn convert(&self, url: &str) -> ConversionResult {
        match self.dispatch(url).await {
            Ok(result) => result,
            Err(e) => {
                warn!(url, error = %e, "conversion failed");
                ConversionResult::failure(url, e.to_string())
            }
        }
    }

    async fn dispatch(&self, url: &str) -> Result<ConversionResult, ConvertError> {
        let category = classify(url);
        debug!(url, ?category, "classified URL");

        match category {
            Category::PreprintListing => Ok(match self.listing.extract(url).await {
                Ok(entries) => ConversionResult::listing(url, entries),
                // Soft failure: the batch continues and the caller gets an
                // actionable hint instead of a bare error
                Err(e) => ConversionResult::failure(
                    url,
                    format!("failed to extract paper listing: {}", e),
                )
                .with_suggestion(
                    "Check that the listing URL is correct, or paste individual paper links",
                ),
            }),

            Category::PreprintPage => {
                let resolved = self.resolver.resolve(url, &self.settings.output_dir).await?;
                Ok(ConversionResult::preprint_pdf(
                    url,
                    resolved.identity.id,
                    resolved.title,
                    resolved.downloaded.path,
                    resolved.downloaded.file_name,
                    resolved.downloaded.bytes,
                ))
            }

            Category::PdfDirect => {
                let downloaded = self.fetcher.download(url, &self.settings.output_dir).await?;
                let title = downloaded
                    .file_name
                    .trim_end_matches(".pdf")
                    .to_string();
                Ok(ConversionResult::direct_pdf(
                    url,
                    title,
                    downloaded.path,
                    downloaded.file_name,
                    downloaded.bytes,
                ))
            }

            Category::GenericWebpage => Ok(self.chain.render(url).await),
        }
    }

    /// Convert a page with an explicitly requested extraction format
    /// (`markdown` or `text`), bypassing the fallback chain.
    pub async fn extract_as(&self, url: &str, format: &str) -> ConversionResult {
        match self.try_extract_as(url, format).await {
            Ok(result) => result,
            Err(e) => {
                warn!(url, error = %e, "extraction failed");
                ConversionResult::failure(url, e.to_string())
            }
        }
    }

    async fn try_extract_as(
        &self,
        url: &str,
        format: &str,
    ) -> Result<ConversionResult, ConvertError> {
        let format: ExtractFormat = format.parse()?;
        let document = self.extractor.extract(url, format).await?;

        tokio::fs::create_dir_all(&self.settings.output_dir).await?;
        let path = self.settings.output_dir.join(&document.file_name);
        tokio::fs::write(&path, document.content.as_bytes()).await?;

        let title = document
            .metadata
            .title
            .clone()
            .unwrap_or_else(|| "webpage".to_string());

        Ok(
            ConversionResult::document(url, title, document.content, document.file_name)
                .with_file(path),
        )
    }
}

/// When a batch consists of several arXiv paper URLs, offer a selection
/// preview instead of downloading everything immediately.
///
/// Entries are derived offline from the identifiers (no network, titles are
/// `arXiv:{id}`). Returns `None` below the threshold, leaving the batch to
/// process normally.
pub fn preview_paper_selection(urls: &[String], threshold: usize) -> Option<Vec<ListingEntry>> {
    if threshold == 0 {
        return None;
    }

    let entries: Vec<ListingEntry> = urls
        .iter()
        .filter(|url| url.contains("arxiv.org/abs/"))
        .filter_map(|url| {
            PreprintIdentity::from_url(url).ok().map(|identity| ListingEntry {
                url: url.clone(),
                pdf_url: identity.canonical_pdf_url,
                title: format!("arXiv:{}", identity.id),
                id: identity.id,
            })
        })
        .collect();

    (entries.len() >= threshold).then_some(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConversionKind;

    fn offline_settings(dir: &std::path::Path) -> Settings {
        let mut settings = Settings::default();
        settings.output_dir = dir.to_path_buf();
        settings.pacing_ms = 0;
        settings.render.headless_enabled = false;
        settings.render.render_api_token = None;
        settings
    }

    #[test]
    fn test_preview_below_threshold_is_none() {
        let urls = vec![
            "https://arxiv.org/abs/1706.03762".to_string(),
            "https://example.com".to_string(),
        ];
        assert!(preview_paper_selection(&urls, 3).is_none());
    }

    #[test]
    fn test_preview_at_threshold() {
        let urls = vec![
            "https://arxiv.org/abs/1706.03762".to_string(),
            "https://arxiv.org/abs/1810.04805".to_string(),
            "https://example.com".to_string(),
            "https://arxiv.org/abs/2005.14165".to_string(),
        ];
        let entries = preview_paper_selection(&urls, 3).expect("three paper URLs");
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[0].id, "1706.03762");
        assert_eq!(entries[0].title, "arXiv:1706.03762");
        assert_eq!(
            entries[1].pdf_url,
            "https://arxiv.org/pdf/1810.04805.pdf"
        );
        // Non-arXiv URLs are ignored, order is preserved
        assert_eq!(entries[2].id, "2005.14165");
    }

    #[test]
    fn test_preview_threshold_configurable() {
        let urls = vec![
            "https://arxiv.org/abs/1706.03762".to_string(),
            "https://arxiv.org/abs/1810.04805".to_string(),
        ];
        assert!(preview_paper_selection(&urls, 3).is_none());
        assert!(preview_paper_selection(&urls, 2).is_some());
        assert!(preview_paper_selection(&urls, 0).is_none());
    }

    #[tokio::test]
    async fn test_convert_never_errors_on_malformed_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let converter = Converter::new(offline_settings(dir.path()));

        let result = converter.convert("definitely not a url").await;
        assert!(!result.success);
        assert_eq!(result.kind, ConversionKind::Error);
        assert!(!result.error.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_direct_pdf_route() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/papers/brook.pdf")
            .with_status(200)
            .with_body("%PDF-1.4 body")
            .create_async()
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let converter = Converter::new(offline_settings(dir.path()));
        let url = format!("{}/papers/brook.pdf", server.url());

        let result = converter.convert(&url).await;
        assert!(result.success);
        assert_eq!(result.kind, ConversionKind::DirectPdf);
        assert!(result.file_name.unwrap_or_default().starts_with("brook_"));
    }

    #[tokio::test]
    async fn test_extract_as_rejects_unknown_format() {
        let dir = tempfile::tempdir().expect("tempdir");
        let converter = Converter::new(offline_settings(dir.path()));

        let result = converter.extract_as("https://example.com", "docx").await;
        assert!(!result.success);
        assert!(result
            .error
            .unwrap_or_default()
            .contains("unsupported format"));
    }
}
