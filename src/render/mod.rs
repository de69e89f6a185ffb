//! Render fallback chain for generic webpages.
//!
//! Conversion quality degrades gracefully with environment capability:
//! headless-browser PDF render, then a remote render API (when a credential
//! is configured), then content extraction to Markdown, then static
//! guidance. Each tier reports a typed outcome instead of throwing across
//! tiers; a single loop walks the list and stops at the first produced
//! result.

mod headless;
mod remote;

pub use headless::HeadlessTier;
pub use remote::RemoteRenderTier;

use async_trait::async_trait;
use bitflags::bitflags;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::ConvertError;
use crate::extract::{ContentExtractor, ExtractFormat};
use crate::models::{ConversionResult, Guidance, PdfLink};
use crate::utils::HttpClient;

static TITLE_TAG: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("valid selector"));
static PDF_ANCHORS: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"a[href*=".pdf"], a[href*="pdf"]"#).expect("valid selector")
});

/// How long the guidance tier waits for a page before giving up
const GUIDANCE_TIMEOUT: Duration = Duration::from_secs(10);

bitflags! {
    /// Capabilities of the current execution environment.
    ///
    /// Injected into the chain rather than read from the environment inline,
    /// so the tier selection is testable without a real runtime environment.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct RenderCapabilities: u8 {
        /// A headless browser can be launched here
        const HEADLESS = 1 << 0;
        /// A remote render API credential is configured
        const REMOTE_API = 1 << 1;
        /// Markdown extraction is an acceptable substitute for PDF
        const EXTRACTION = 1 << 2;
    }
}

/// Outcome of a single tier attempt
#[derive(Debug)]
pub enum RenderOutcome {
    /// The tier produced a final result; the chain stops here
    Produced(ConversionResult),
    /// The tier could not handle the page; the chain moves on
    Declined(String),
}

/// One fallback strategy within the chain
#[async_trait]
pub trait RenderTier: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Whether this tier can run under the given capabilities
    fn available(&self, capabilities: RenderCapabilities) -> bool;

    /// Try to convert the page. Internal failures must surface as
    /// [`RenderOutcome::Declined`], never as a panic or error.
    async fn attempt(&self, url: &str) -> RenderOutcome;
}

/// The ordered fallback chain
pub struct RenderChain {
    tiers: Vec<Box<dyn RenderTier>>,
    capabilities: RenderCapabilities,
}

impl RenderChain {
    /// Build the default chain: headless render, remote render API,
    /// Markdown extraction, static guidance.
    pub fn new(
        client: Arc<HttpClient>,
        capabilities: RenderCapabilities,
        output_dir: PathBuf,
        page_timeout: Duration,
        render_token: Option<String>,
    ) -> Self {
        let tiers: Vec<Box<dyn RenderTier>> = vec![
            Box::new(HeadlessTier::new(output_dir.clone(), page_timeout)),
            Box::new(RemoteRenderTier::new(
                Arc::clone(&client),
                render_token,
                output_dir.clone(),
            )),
            Box::new(ExtractionTier::new(
                ContentExtractor::new(Arc::clone(&client)),
                output_dir,
            )),
            Box::new(GuidanceTier::new(client)),
        ];

        Self {
            tiers,
            capabilities,
        }
    }

    /// Build a chain from explicit tiers (for testing)
    pub fn with_tiers(tiers: Vec<Box<dyn RenderTier>>, capabilities: RenderCapabilities) -> Self {
        Self {
            tiers,
            capabilities,
        }
    }

    /// Walk the tiers in order and return the first produced result.
    ///
    /// Each tier is tried at most once. A tier that is unavailable under the
    /// current capabilities is skipped without being attempted.
    pub async fn render(&self, url: &str) -> ConversionResult {
        for tier in &self.tiers {
            if !tier.available(self.capabilities) {
                debug!(tier = tier.name(), "tier unavailable, skipping");
                continue;
            }

            debug!(tier = tier.name(), url, "attempting render tier");
            match tier.attempt(url).await {
                RenderOutcome::Produced(result) => {
                    info!(
                        tier = tier.name(),
                        success = result.success,
                        kind = %result.kind,
                        "render chain settled"
                    );
                    return result;
                }
                RenderOutcome::Declined(reason) => {
                    warn!(tier = tier.name(), %reason, "tier declined");
                }
            }
        }

        ConversionResult::failure(url, "all conversion strategies failed")
            .with_suggestion("Open the page in a browser and use Print > Save as PDF")
    }
}

/// Markdown extraction as a deliberate substitute for PDF
pub struct ExtractionTier {
    extractor: ContentExtractor,
    output_dir: PathBuf,
}

impl ExtractionTier {
    pub fn new(extractor: ContentExtractor, output_dir: PathBuf) -> Self {
        Self {
            extractor,
            output_dir,
        }
    }

    async fn convert(&self, url: &str) -> Result<ConversionResult, ConvertError> {
        let document = self.extractor.extract(url, ExtractFormat::Markdown).await?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let path = self.output_dir.join(&document.file_name);
        tokio::fs::write(&path, document.content.as_bytes()).await?;

        let title = document
            .metadata
            .title
            .clone()
            .unwrap_or_else(|| "webpage".to_string());

        Ok(
            ConversionResult::document(url, title, document.content, document.file_name)
                .with_file(path)
                .with_note(
                    "Converted to Markdown instead of PDF; the structure is preserved \
                     and the file can be converted further with any Markdown tool",
                ),
        )
    }
}

#[async_trait]
impl RenderTier for ExtractionTier {
    fn name(&self) -> &'static str {
        "content-extraction"
    }

    fn available(&self, capabilities: RenderCapabilities) -> bool {
        capabilities.contains(RenderCapabilities::EXTRACTION)
    }

    async fn attempt(&self, url: &str) -> RenderOutcome {
        match self.convert(url).await {
            Ok(result) => RenderOutcome::Produced(result),
            Err(e) => RenderOutcome::Declined(e.to_string()),
        }
    }
}

/// Terminal tier: analyze the page and return manual alternatives.
///
/// Always produces a result. Only reports failure when the page itself is
/// unreachable.
pub struct GuidanceTier {
    client: Arc<HttpClient>,
}

impl GuidanceTier {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    async fn analyze(&self, url: &str) -> Result<ConversionResult, ConvertError> {
        let response = self
            .client
            .get(url)
            .timeout(GUIDANCE_TIMEOUT)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ConvertError::Fetch(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }
        let html = response.text().await?;

        let (title, pdf_links) = analyze_page(url, &html);

        let mut alternatives = vec![
            "Use your browser's Print > Save as PDF".to_string(),
            "Use an online HTML-to-PDF conversion service".to_string(),
            "Use a browser extension such as Save as PDF".to_string(),
        ];
        if !pdf_links.is_empty() {
            alternatives.push(format!(
                "Download one of the {} PDF links discovered on the page",
                pdf_links.len()
            ));
        }

        Ok(ConversionResult::guidance(
            url,
            title,
            Guidance {
                discovered_pdf_links: pdf_links,
                alternatives,
            },
        )
        .with_note("The page could not be converted directly; manual alternatives listed"))
    }
}

#[async_trait]
impl RenderTier for GuidanceTier {
    fn name(&self) -> &'static str {
        "guidance"
    }

    fn available(&self, _capabilities: RenderCapabilities) -> bool {
        true
    }

    async fn attempt(&self, url: &str) -> RenderOutcome {
        match self.analyze(url).await {
            Ok(result) => RenderOutcome::Produced(result),
            Err(e) => RenderOutcome::Produced(
                ConversionResult::failure(url, format!("could not reach page: {}", e))
                    .with_suggestion("Check the URL or open it directly in a browser"),
            ),
        }
    }
}

/// Pull the title and any PDF-looking anchors out of a page.
fn analyze_page(base_url: &str, html: &str) -> (String, Vec<PdfLink>) {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE_TAG)
        .next()
        .map(|el| {
            el.text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| "Untitled".to_string());

    let base = Url::parse(base_url).ok();
    let mut pdf_links = Vec::new();
    for anchor in document.select(&PDF_ANCHORS) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        let resolved = match &base {
            Some(base) => base.join(href).map(String::from).unwrap_or_default(),
            None => href.to_string(),
        };
        if resolved.is_empty() {
            continue;
        }
        let text = anchor
            .text()
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        pdf_links.push(PdfLink {
            url: resolved,
            text: if text.is_empty() {
                "PDF file".to_string()
            } else {
                text
            },
        });
    }

    (title, pdf_links)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ConversionKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Tier stub that records whether it was attempted
    struct ProbeTier {
        name: &'static str,
        needs: RenderCapabilities,
        attempts: Arc<AtomicUsize>,
        outcome: fn(&str) -> RenderOutcome,
    }

    #[async_trait]
    impl RenderTier for ProbeTier {
        fn name(&self) -> &'static str {
            self.name
        }

        fn available(&self, capabilities: RenderCapabilities) -> bool {
            capabilities.contains(self.needs)
        }

        async fn attempt(&self, url: &str) -> RenderOutcome {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            (self.outcome)(url)
        }
    }

    fn probe(
        name: &'static str,
        needs: RenderCapabilities,
        outcome: fn(&str) -> RenderOutcome,
    ) -> (Box<dyn RenderTier>, Arc<AtomicUsize>) {
        let attempts = Arc::new(AtomicUsize::new(0));
        let tier = ProbeTier {
            name,
            needs,
            attempts: Arc::clone(&attempts),
            outcome,
        };
        (Box::new(tier), attempts)
    }

    #[tokio::test]
    async fn test_disabled_tier_never_attempted() {
        let (headless, headless_attempts) = probe("headless", RenderCapabilities::HEADLESS, |_| {
            RenderOutcome::Declined("should not run".to_string())
        });
        let (fallback, fallback_attempts) = probe("fallback", RenderCapabilities::empty(), |url| {
            RenderOutcome::Produced(ConversionResult::guidance(
                url,
                "T",
                Guidance::default(),
            ))
        });

        let chain =
            RenderChain::with_tiers(vec![headless, fallback], RenderCapabilities::EXTRACTION);
        let result = chain.render("https://example.com").await;

        assert_eq!(headless_attempts.load(Ordering::SeqCst), 0);
        assert_eq!(fallback_attempts.load(Ordering::SeqCst), 1);
        assert!(result.success);
        assert_eq!(result.kind, ConversionKind::WebpageGuidance);
    }

    #[tokio::test]
    async fn test_declined_tier_falls_through() {
        let (first, first_attempts) = probe("first", RenderCapabilities::empty(), |_| {
            RenderOutcome::Declined("nope".to_string())
        });
        let (second, second_attempts) = probe("second", RenderCapabilities::empty(), |url| {
            RenderOutcome::Produced(ConversionResult::guidance(
                url,
                "T",
                Guidance::default(),
            ))
        });

        let chain = RenderChain::with_tiers(vec![first, second], RenderCapabilities::empty());
        let result = chain.render("https://example.com").await;

        assert_eq!(first_attempts.load(Ordering::SeqCst), 1);
        assert_eq!(second_attempts.load(Ordering::SeqCst), 1);
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_exhausted_chain_is_failure() {
        let (only, _) = probe("only", RenderCapabilities::empty(), |_| {
            RenderOutcome::Declined("nope".to_string())
        });

        let chain = RenderChain::with_tiers(vec![only], RenderCapabilities::empty());
        let result = chain.render("https://example.com").await;

        assert!(!result.success);
        assert_eq!(result.kind, ConversionKind::Error);
        assert!(result.suggestion.is_some());
    }

    #[test]
    fn test_analyze_page_discovers_pdf_links() {
        let html = r#"<html><head><title>Paper  Index</title></head><body>
            <a href="/files/paper.pdf">Download paper</a>
            <a href="https://other.example.com/doc.pdf"></a>
            <a href="/about">About</a>
        </body></html>"#;

        let (title, links) = analyze_page("https://example.com/papers", html);
        assert_eq!(title, "Paper Index");
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].url, "https://example.com/files/paper.pdf");
        assert_eq!(links[0].text, "Download paper");
        assert_eq!(links[1].text, "PDF file");
    }

    #[tokio::test]
    async fn test_guidance_tier_success() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/page")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body(
                r#"<html><head><title>Reachable</title></head>
                <body><a href="/a.pdf">PDF</a></body></html>"#,
            )
            .create_async()
            .await;

        let tier = GuidanceTier::new(Arc::new(HttpClient::new()));
        let url = format!("{}/page", server.url());
        let RenderOutcome::Produced(result) = tier.attempt(&url).await else {
            panic!("guidance tier always produces");
        };

        assert!(result.success);
        assert_eq!(result.kind, ConversionKind::WebpageGuidance);
        let guidance = result.guidance.expect("guidance populated");
        assert_eq!(guidance.discovered_pdf_links.len(), 1);
        assert!(guidance.alternatives.len() >= 3);
    }

    #[tokio::test]
    async fn test_guidance_tier_unreachable_page_is_failure() {
        // Nothing listens on this port
        let tier = GuidanceTier::new(Arc::new(HttpClient::new()));
        let RenderOutcome::Produced(result) =
            tier.attempt("http://127.0.0.1:1/unreachable").await
        else {
            panic!("guidance tier always produces");
        };

        assert!(!result.success);
        assert!(result.error.unwrap_or_default().contains("could not reach"));
    }
}
