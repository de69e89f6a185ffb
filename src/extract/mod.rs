//! Content extraction engine.
//!
//! Fetches an HTML page, isolates its main content subtree via a prioritized
//! selector list, strips boilerplate, and renders the result as Markdown
//! (with metadata front-matter) or plain text.
//!
//! Character encoding follows the response's `Content-Type` charset
//! parameter with a UTF-8 default; decoding degrades lossily rather than
//! failing. All DOM work happens between awaits because the parsed tree is
//! not `Send`.

mod markdown;
mod metadata;

pub use markdown::{element_to_markdown, element_to_text};
pub use metadata::{extract_metadata, PageMetadata};

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ConvertError;
use crate::utils::{date_stamp, sanitize_title, HttpClient};

/// Content-root candidates, most specific first. The WeChat selectors come
/// first because that platform nests the article under generic wrappers
/// that would otherwise win.
const CONTENT_SELECTORS: &[&str] = &[
    "#js_content",
    ".rich_media_content",
    "#img-content",
    "article",
    "[role=\"main\"]",
    ".main-content",
    ".content",
    ".post-content",
    ".entry-content",
    ".article-content",
    ".page-content",
    "main",
    "#content",
    "#main",
    "body",
];

/// Boilerplate stripped from every page
const UNWANTED_SELECTORS: &[&str] = &[
    "script",
    "style",
    "nav",
    "header",
    "footer",
    ".navigation",
    ".nav",
    ".menu",
    ".sidebar",
    ".ads",
    ".advertisement",
    ".social-share",
    ".comments",
    ".comment",
    ".related-posts",
    ".popup",
    ".modal",
    ".cookie-notice",
    "[class*=\"ad-\"]",
    "[id*=\"ad-\"]",
];

/// Extra chrome on WeChat article pages
const WECHAT_SELECTORS: &[&str] = &[
    ".rich_media_tool",
    ".rich_media_meta",
    ".rich_media_extra",
    ".rich_media_area_extra",
    ".profile_container",
    ".qr_code_pc",
    ".reward_qrcode",
    ".mp_profile_iframe_wrp",
    "#js_pc_qr_code",
    ".weui-loadmore",
    ".js_jump_icon",
    ".js_share_container",
    "[data-brushtype=\"tools\"]",
];

/// An empty wrapper must not win content-root selection
const MIN_CONTENT_LEN: usize = 100;

/// Elements kept even when childless
const KEEP_WHEN_EMPTY: &[&str] = &["img", "br", "hr", "input", "html", "head", "body", "meta", "link"];

static CONTENT_SELECTOR_LIST: Lazy<Vec<Selector>> = Lazy::new(|| parse_selectors(CONTENT_SELECTORS));
static UNWANTED_SELECTOR_LIST: Lazy<Vec<Selector>> =
    Lazy::new(|| parse_selectors(UNWANTED_SELECTORS));
static WECHAT_SELECTOR_LIST: Lazy<Vec<Selector>> = Lazy::new(|| parse_selectors(WECHAT_SELECTORS));
static BODY_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("body").expect("valid selector"));

fn parse_selectors(list: &[&str]) -> Vec<Selector> {
    list.iter()
        .map(|s| Selector::parse(s).expect("valid selector"))
        .collect()
}

/// Requested output shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractFormat {
    Markdown,
    Text,
}

impl ExtractFormat {
    /// File extension for artifacts of this format
    pub fn extension(&self) -> &'static str {
        match self {
            ExtractFormat::Markdown => "md",
            ExtractFormat::Text => "txt",
        }
    }
}

impl FromStr for ExtractFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(ExtractFormat::Markdown),
            "text" | "txt" => Ok(ExtractFormat::Text),
            other => Err(ConvertError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// A produced document plus the metadata that shaped it
#[derive(Debug, Clone)]
pub struct ExtractedDocument {
    pub content: String,
    pub file_name: String,
    pub metadata: PageMetadata,
    pub content_bytes: u64,
}

/// Fetches pages and extracts their readable content
#[derive(Debug, Clone)]
pub struct ContentExtractor {
    client: Arc<HttpClient>,
}

impl ContentExtractor {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    /// Fetch `url` and produce a document in the requested format.
    pub async fn extract(
        &self,
        url: &str,
        format: ExtractFormat,
    ) -> Result<ExtractedDocument, ConvertError> {
        let html = self.fetch_page(url).await?;
        let document = build_document(url, &html, format)?;
        info!(
            url,
            bytes = document.content_bytes,
            file = %document.file_name,
            "content extraction complete"
        );
        Ok(document)
    }

    async fn fetch_page(&self, url: &str) -> Result<String, ConvertError> {
        let mut request = self
            .client
            .get(url)
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .header("Accept-Language", "en-US,en;q=0.9,zh-CN;q=0.8");

        // WeChat refuses requests that do not look like in-app navigation
        if is_wechat_article(url) {
            request = request
                .header("Referer", "https://mp.weixin.qq.com/")
                .header("Sec-Fetch-Dest", "document")
                .header("Sec-Fetch-Mode", "navigate")
                .header("Sec-Fetch-Site", "same-origin");
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(ConvertError::Fetch(format!(
                "{} returned status {}",
                url,
                response.status()
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_string();
        debug!(url, %content_type, "decoding page body");

        // Charset parameter from the header wins; UTF-8 otherwise
        Ok(response.text_with_charset("utf-8").await?)
    }
}

/// Detect articles on the WeChat public-account platform, which carries far
/// heavier page chrome than typical sites.
pub fn is_wechat_article(url: &str) -> bool {
    url.contains("mp.weixin.qq.com")
}

fn build_document(
    url: &str,
    html: &str,
    format: ExtractFormat,
) -> Result<ExtractedDocument, ConvertError> {
    let wechat = is_wechat_article(url);

    let mut document = Html::parse_document(html);
    let metadata = extract_metadata(&document);

    strip_boilerplate(&mut document, wechat);
    remove_empty_elements(&mut document);

    let root = select_content_root(&document);
    let body = match format {
        ExtractFormat::Markdown => element_to_markdown(root),
        ExtractFormat::Text => element_to_text(root),
    };

    if body.trim().is_empty() {
        return Err(ConvertError::Parse(format!(
            "no readable content found at {}",
            url
        )));
    }

    let content = match format {
        ExtractFormat::Markdown => assemble_markdown(url, &metadata, &body),
        ExtractFormat::Text => body,
    };

    let title = metadata.title.clone().unwrap_or_else(|| "webpage".to_string());
    let file_name = format!(
        "{}_{}.{}",
        sanitize_title(&title),
        date_stamp(),
        format.extension()
    );

    Ok(ExtractedDocument {
        content_bytes: content.len() as u64,
        content,
        file_name,
        metadata,
    })
}

/// Pick the first content-root candidate with enough text to be the real
/// article, falling back to the document body.
fn select_content_root(document: &Html) -> ElementRef<'_> {
    for selector in CONTENT_SELECTOR_LIST.iter() {
        if let Some(el) = document.select(selector).next() {
            let text_len = el.text().collect::<String>().trim().len();
            if text_len > MIN_CONTENT_LEN {
                return el;
            }
        }
    }

    document
        .select(&BODY_SELECTOR)
        .next()
        .unwrap_or_else(|| document.root_element())
}

fn strip_boilerplate(document: &mut Html, wechat: bool) {
    let mut doomed = Vec::new();
    for selector in UNWANTED_SELECTOR_LIST.iter() {
        doomed.extend(document.select(selector).map(|el| el.id()));
    }
    if wechat {
        for selector in WECHAT_SELECTOR_LIST.iter() {
            doomed.extend(document.select(selector).map(|el| el.id()));
        }
    }

    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// Drop childless elements left behind by boilerplate removal.
fn remove_empty_elements(document: &mut Html) {
    let doomed: Vec<_> = document
        .root_element()
        .descendants()
        .filter_map(|node| {
            let el = ElementRef::wrap(node)?;
            if KEEP_WHEN_EMPTY.contains(&el.value().name()) {
                return None;
            }
            node.children().next().is_none().then(|| node.id())
        })
        .collect();

    for id in doomed {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }
}

fn assemble_markdown(url: &str, metadata: &PageMetadata, body: &str) -> String {
    let mut out = String::new();

    if let Some(title) = &metadata.title {
        out.push_str(&format!("# {}\n\n", title));
    }

    if metadata.author.is_some() || metadata.publish_date.is_some() {
        out.push_str("---\n");
        if let Some(author) = &metadata.author {
            out.push_str(&format!("author: {}\n", author));
        }
        if let Some(date) = &metadata.publish_date {
            out.push_str(&format!("published: {}\n", date));
        }
        out.push_str(&format!("source: {}\n", url));
        out.push_str("---\n\n");
    }

    if let Some(description) = &metadata.description {
        out.push_str(&format!("> {}\n\n", description));
    }

    out.push_str(body);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const ARTICLE_FIXTURE: &str = r#"<html>
      <head>
        <title>Engine Round Trip</title>
        <meta name="description" content="Fixture page.">
        <meta name="author" content="Fixture Author">
      </head>
      <body>
        <nav>Home About Contact</nav>
        <article>
          <p>This paragraph carries enough characters to clear the minimum
          content length threshold used during content root selection.</p>
          <table>
            <tr><th>k</th><th>v</th></tr>
            <tr><td>a</td><td>1</td></tr>
          </table>
        </article>
        <footer>Copyright notice</footer>
        <script>alert("tracking")</script>
      </body>
    </html>"#;

    #[test]
    fn test_markdown_round_trip() {
        let doc = build_document("https://example.com/post", ARTICLE_FIXTURE, ExtractFormat::Markdown)
            .expect("extraction succeeds");

        assert!(doc.content.starts_with("# Engine Round Trip\n"));
        assert!(doc.content.contains("> Fixture page."));
        assert!(doc.content.contains("author: Fixture Author"));
        assert!(doc.content.contains("source: https://example.com/post"));

        // The table survives with its row count intact
        let rows = doc.content.lines().filter(|l| l.starts_with('|')).count();
        assert_eq!(rows, 2);

        // Boilerplate is gone
        assert!(!doc.content.contains("Home About Contact"));
        assert!(!doc.content.contains("Copyright notice"));
        assert!(!doc.content.contains("tracking"));

        assert!(doc.file_name.starts_with("Engine_Round_Trip_"));
        assert!(doc.file_name.ends_with(".md"));
        assert_eq!(doc.content_bytes, doc.content.len() as u64);
    }

    #[test]
    fn test_text_mode_normalizes_whitespace() {
        let doc = build_document("https://example.com/post", ARTICLE_FIXTURE, ExtractFormat::Text)
            .expect("extraction succeeds");

        assert!(doc.content.contains("This paragraph carries enough characters"));
        assert!(!doc.content.contains('\n'));
        assert!(doc.file_name.ends_with(".txt"));
    }

    #[test]
    fn test_min_length_guard_skips_empty_wrappers() {
        // The article is too short to be the content root; selection falls
        // through to the body, which has the real text
        let html = format!(
            "<html><head><title>T</title></head><body><article>tiny</article><div>{}</div></body></html>",
            "Long body text. ".repeat(20)
        );
        let doc = build_document("https://example.com", &html, ExtractFormat::Markdown)
            .expect("extraction succeeds");
        assert!(doc.content.contains("Long body text."));
    }

    #[test]
    fn test_empty_page_is_parse_error() {
        let err = build_document(
            "https://example.com",
            "<html><body><script>only()</script></body></html>",
            ExtractFormat::Markdown,
        )
        .unwrap_err();
        assert!(matches!(err, ConvertError::Parse(_)));
    }

    #[test]
    fn test_wechat_extra_chrome_removed() {
        let html = r#"<html><head><title>W</title></head><body>
            <div id="js_content">
              <div class="rich_media_meta">meta chrome</div>
              <p>Actual WeChat article body with plenty of characters to pass
              the minimum content threshold for root selection here.</p>
            </div>
        </body></html>"#;

        let doc = build_document(
            "https://mp.weixin.qq.com/s/abc123",
            html,
            ExtractFormat::Markdown,
        )
        .expect("extraction succeeds");
        assert!(!doc.content.contains("meta chrome"));
        assert!(doc.content.contains("Actual WeChat article body"));
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("markdown".parse::<ExtractFormat>().unwrap(), ExtractFormat::Markdown);
        assert_eq!("MD".parse::<ExtractFormat>().unwrap(), ExtractFormat::Markdown);
        assert_eq!("txt".parse::<ExtractFormat>().unwrap(), ExtractFormat::Text);
        assert!(matches!(
            "docx".parse::<ExtractFormat>(),
            Err(ConvertError::UnsupportedFormat(_))
        ));
    }

    #[tokio::test]
    async fn test_extract_over_http() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/post")
            .with_status(200)
            .with_header("content-type", "text/html; charset=utf-8")
            .with_body(ARTICLE_FIXTURE)
            .create_async()
            .await;

        let extractor = ContentExtractor::new(Arc::new(HttpClient::new()));
        let url = format!("{}/post", server.url());
        let doc = extractor
            .extract(&url, ExtractFormat::Markdown)
            .await
            .expect("extract succeeds");
        assert!(doc.content.starts_with("# Engine Round Trip"));
    }
}
