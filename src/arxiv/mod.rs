//! arXiv preprint resolution.
//!
//! Turns an abstract/PDF page URL into its canonical PDF and a
//! human-friendly filename. Title lookup goes through the arXiv export API
//! (Atom) and is strictly best-effort: any failure falls back to the paper
//! identifier so a metadata hiccup never fails the whole resolution.

mod listing;

pub use listing::{parse_listing, ListingExtractor, ListingMode};

use feed_rs::parser;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ConvertError;
use crate::fetch::{BinaryFetcher, Downloaded};
use crate::utils::{api_retry_config, sanitize_title, with_retry, HttpClient};

/// Base URL for the arXiv export API
pub const ARXIV_API_URL: &str = "http://export.arxiv.org/api/query";
/// Base URL for arXiv pages and PDFs
pub const ARXIV_BASE_URL: &str = "https://arxiv.org";

/// Identifier patterns, tried in order. Covers new-style (`2301.12345`)
/// and old-style (`cs/0112017`) identifiers in abs, pdf, and html URLs.
static ID_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"arxiv\.org/abs/(\d{4}\.\d{4,5})",
        r"arxiv\.org/abs/([a-z-]+(?:\.[a-z]{2})?/\d{7})",
        r"arxiv\.org/pdf/(\d{4}\.\d{4,5})",
        r"arxiv\.org/pdf/([a-z-]+(?:\.[a-z]{2})?/\d{7})",
        r"arxiv\.org/html/(\d{4}\.\d{4,5})",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid identifier pattern"))
    .collect()
});

/// A paper identity derived deterministically from a URL.
///
/// Never persisted; recomputed per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreprintIdentity {
    /// The arXiv identifier
    pub id: String,

    /// The canonical PDF URL for that identifier
    pub canonical_pdf_url: String,
}

impl PreprintIdentity {
    /// Derive the identity from a paper-page URL.
    pub fn from_url(url: &str) -> Result<Self, ConvertError> {
        let lower = url.to_ascii_lowercase();
        for pattern in ID_PATTERNS.iter() {
            if let Some(caps) = pattern.captures(&lower) {
                let id = caps[1].to_string();
                return Ok(Self {
                    canonical_pdf_url: format!("{}/pdf/{}.pdf", ARXIV_BASE_URL, id),
                    id,
                });
            }
        }
        Err(ConvertError::IdentifierNotFound(url.to_string()))
    }
}

/// A resolved, downloaded preprint
#[derive(Debug, Clone)]
pub struct ResolvedPaper {
    pub identity: PreprintIdentity,
    pub title: String,
    pub downloaded: Downloaded,
}

/// Resolves preprint pages into downloaded PDFs
#[derive(Debug, Clone)]
pub struct ArxivResolver {
    client: Arc<HttpClient>,
    fetcher: BinaryFetcher,
    api_url: String,
    base_url: String,
}

impl ArxivResolver {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self {
            fetcher: BinaryFetcher::new(Arc::clone(&client)),
            client,
            api_url: ARXIV_API_URL.to_string(),
            base_url: ARXIV_BASE_URL.to_string(),
        }
    }

    /// Override the API and download endpoints (for testing)
    pub fn with_endpoints(
        client: Arc<HttpClient>,
        api_url: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            fetcher: BinaryFetcher::new(Arc::clone(&client)),
            client,
            api_url: api_url.into(),
            base_url: base_url.into(),
        }
    }

    /// Fetch the paper title from the export API.
    pub async fn fetch_title(&self, id: &str) -> Result<String, ConvertError> {
        let url = format!("{}?id_list={}", self.api_url, urlencoding::encode(id));

        // Clone values needed for retry closure
        let client = Arc::clone(&self.client);
        let url_for_retry = url.clone();

        let feed = with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url_for_retry.clone();
            async move {
                let response = client
                    .get(&url)
                    .header("Accept", "application/atom+xml")
                    .send()
                    .await
                    .map_err(|e| ConvertError::Fetch(format!("arXiv API: {}", e)))?;

                if !response.status().is_success() {
                    return Err(ConvertError::Fetch(format!(
                        "arXiv API returned status: {}",
                        response.status()
                    )));
                }

                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| ConvertError::Fetch(format!("arXiv API body: {}", e)))?;

                parser::parse(bytes.as_ref())
                    .map_err(|e| ConvertError::Parse(format!("Atom feed: {}", e)))
            }
        })
        .await?;

        feed.entries
            .first()
            .and_then(|entry| entry.title.as_ref())
            .map(|title| normalize_title(&title.content))
            .filter(|title| !title.is_empty())
            .ok_or_else(|| ConvertError::Parse(format!("no title in feed for {}", id)))
    }

    /// Fetch the title, falling back to the identifier itself on any failure.
    pub async fn title_or_id(&self, id: &str) -> String {
        match self.fetch_title(id).await {
            Ok(title) => title,
            Err(e) => {
                warn!(id, error = %e, "title lookup failed, using identifier");
                id.to_string()
            }
        }
    }

    /// Resolve a paper-page URL and download its canonical PDF into `dir`.
    pub async fn resolve(&self, url: &str, dir: &Path) -> Result<ResolvedPaper, ConvertError> {
        let identity = PreprintIdentity::from_url(url)?;
        debug!(id = %identity.id, "resolved paper identifier");

        let title = self.title_or_id(&identity.id).await;

        // Old-style identifiers contain a slash; flatten it for the filename
        let file_name = format!(
            "{}_{}.pdf",
            sanitize_title(&title),
            identity.id.replace('/', "_")
        );
        let pdf_url = format!("{}/pdf/{}.pdf", self.base_url, identity.id);

        let downloaded = self.fetcher.download_as(&pdf_url, dir, &file_name).await?;

        Ok(ResolvedPaper {
            identity,
            title,
            downloaded,
        })
    }
}

fn normalize_title(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_abs_url() {
        let identity = PreprintIdentity::from_url("https://arxiv.org/abs/1706.03762")
            .expect("should parse");
        assert_eq!(identity.id, "1706.03762");
        assert_eq!(
            identity.canonical_pdf_url,
            "https://arxiv.org/pdf/1706.03762.pdf"
        );
    }

    #[test]
    fn test_abs_and_pdf_forms_agree() {
        // Both URL forms of the same paper must derive the identical
        // canonical PDF URL
        let from_abs = PreprintIdentity::from_url("https://arxiv.org/abs/2301.12345").unwrap();
        let from_pdf =
            PreprintIdentity::from_url("https://arxiv.org/pdf/2301.12345.pdf").unwrap();
        assert_eq!(from_abs, from_pdf);
    }

    #[test]
    fn test_old_style_identifier() {
        let identity =
            PreprintIdentity::from_url("https://arxiv.org/abs/cs/0112017").expect("should parse");
        assert_eq!(identity.id, "cs/0112017");
        assert_eq!(
            identity.canonical_pdf_url,
            "https://arxiv.org/pdf/cs/0112017.pdf"
        );

        let identity = PreprintIdentity::from_url("https://arxiv.org/abs/math.gt/0104020")
            .expect("should parse");
        assert_eq!(identity.id, "math.gt/0104020");
    }

    #[test]
    fn test_identifier_not_found() {
        let err = PreprintIdentity::from_url("https://example.com/abs/1234").unwrap_err();
        assert!(matches!(err, ConvertError::IdentifierNotFound(_)));
    }

    #[test]
    fn test_normalize_title() {
        assert_eq!(
            normalize_title("Attention Is\n  All You   Need"),
            "Attention Is All You Need"
        );
    }

    #[test]
    fn test_feed_fixture_parses() {
        let atom = r#"<?xml version="1.0" encoding="UTF-8"?>
        <feed xmlns="http://www.w3.org/2005/Atom">
            <title>ArXiv Query: search_query=&amp;id_list=1706.03762</title>
            <entry>
                <id>http://arxiv.org/abs/1706.03762v7</id>
                <title>Attention Is All You Need</title>
                <summary>The dominant sequence transduction models...</summary>
                <author><name>Ashish Vaswani</name></author>
            </entry>
        </feed>"#;

        let feed = parser::parse(atom.as_bytes()).expect("valid Atom feed");
        let title = feed.entries[0].title.as_ref().expect("title present");
        assert_eq!(normalize_title(&title.content), "Attention Is All You Need");
    }

    #[tokio::test]
    async fn test_resolve_against_mock_endpoints() {
        let mut server = mockito::Server::new_async().await;
        let atom = r#"<?xml version="1.0" encoding="UTF-8"?>
        <feed xmlns="http://www.w3.org/2005/Atom">
            <entry>
                <id>http://arxiv.org/abs/1706.03762v7</id>
                <title>Attention Is All You Need</title>
            </entry>
        </feed>"#;
        let _api = server
            .mock("GET", "/api/query?id_list=1706.03762")
            .with_status(200)
            .with_header("content-type", "application/atom+xml")
            .with_body(atom)
            .create_async()
            .await;
        let _pdf = server
            .mock("GET", "/pdf/1706.03762.pdf")
            .with_status(200)
            .with_body("%PDF-1.4")
            .create_async()
            .await;

        let dir = tempfile::tempdir().expect("tempdir");
        let resolver = ArxivResolver::with_endpoints(
            Arc::new(HttpClient::new()),
            format!("{}/api/query", server.url()),
            server.url(),
        );

        let resolved = resolver
            .resolve("https://arxiv.org/abs/1706.03762", dir.path())
            .await
            .expect("resolve should succeed");

        assert_eq!(resolved.title, "Attention Is All You Need");
        assert!(resolved.downloaded.file_name.ends_with("_1706.03762.pdf"));
        assert!(resolved.downloaded.file_name.starts_with("Attention_Is_All"));
    }

    #[tokio::test]
    async fn test_title_falls_back_to_id_on_api_failure() {
        let mut server = mockito::Server::new_async().await;
        let _api = server
            .mock("GET", mockito::Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let resolver = ArxivResolver::with_endpoints(
            Arc::new(HttpClient::new()),
            format!("{}/api/query", server.url()),
            server.url(),
        );

        let title = resolver.title_or_id("2301.99999").await;
        assert_eq!(title, "2301.99999");
    }
}
