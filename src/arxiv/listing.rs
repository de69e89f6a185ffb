//! arXiv listing and search-result extraction.
//!
//! Listing pages come in two structurally different layouts: search results
//! use per-result `li.arxiv-result` containers, while browse/recent pages
//! use paired `dt`/`dd` sequences. Both modes extract the identifier, the
//! canonical paper and PDF URLs, and a title with label prefixes stripped.
//! Nothing is downloaded here; callers decide what to do with the entries.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

use crate::arxiv::ARXIV_BASE_URL;
use crate::error::ConvertError;
use crate::models::ListingEntry;
use crate::utils::{api_retry_config, with_retry, HttpClient};

static ABS_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/abs/(\d{4}\.\d{4,5})").expect("valid identifier pattern"));

static SEARCH_RESULT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("li.arxiv-result").expect("valid selector"));
static SEARCH_ID_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"p.list-title a[href*="/abs/"]"#).expect("valid selector"));
static SEARCH_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p.title").expect("valid selector"));

static BROWSE_DT: Lazy<Selector> = Lazy::new(|| Selector::parse("dt").expect("valid selector"));
static BROWSE_ID_LINK: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[href*="/abs/"]"#).expect("valid selector"));
static BROWSE_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".list-title").expect("valid selector"));

/// Which page layout to parse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingMode {
    /// Search results (`li.arxiv-result` containers)
    Search,
    /// Browse/recent listings (`dt`/`dd` pairs)
    Browse,
}

impl ListingMode {
    /// Pick the parsing mode from the URL shape.
    pub fn for_url(url: &str) -> Self {
        if url.contains("/search") {
            ListingMode::Search
        } else {
            ListingMode::Browse
        }
    }
}

/// Extracts paper entries from arXiv listing pages
#[derive(Debug, Clone)]
pub struct ListingExtractor {
    client: Arc<HttpClient>,
}

impl ListingExtractor {
    pub fn new(client: Arc<HttpClient>) -> Self {
        Self { client }
    }

    /// Fetch a listing page and extract its entries, deduplicated by paper
    /// URL in document order.
    pub async fn extract(&self, url: &str) -> Result<Vec<ListingEntry>, ConvertError> {
        let mode = ListingMode::for_url(url);
        debug!(url, ?mode, "extracting listing page");

        // Clone values needed for retry closure
        let client = Arc::clone(&self.client);
        let url_for_retry = url.to_string();

        let html = with_retry(api_retry_config(), || {
            let client = Arc::clone(&client);
            let url = url_for_retry.clone();
            async move {
                let response = client
                    .get(&url)
                    .header("Accept", "text/html")
                    .send()
                    .await
                    .map_err(|e| ConvertError::Fetch(format!("listing page: {}", e)))?;

                if !response.status().is_success() {
                    return Err(ConvertError::Fetch(format!(
                        "listing page returned status: {}",
                        response.status()
                    )));
                }

                response
                    .text()
                    .await
                    .map_err(|e| ConvertError::Fetch(format!("listing body: {}", e)))
            }
        })
        .await?;

        let entries = parse_listing(&html, mode);
        info!(url, count = entries.len(), "listing extraction complete");
        Ok(entries)
    }
}

/// Parse listing HTML into deduplicated entries, preserving document order.
pub fn parse_listing(html: &str, mode: ListingMode) -> Vec<ListingEntry> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut entries = Vec::new();

    match mode {
        ListingMode::Search => {
            for result in document.select(&SEARCH_RESULT) {
                let Some(id) = first_paper_id(&result, &SEARCH_ID_LINK) else {
                    continue;
                };
                let title = result
                    .select(&SEARCH_TITLE)
                    .next()
                    .map(|el| element_text(&el))
                    .filter(|t| t.len() >= 3)
                    .unwrap_or_else(|| fallback_title(&id));
                push_unique(&mut entries, &mut seen, id, title);
            }
        }
        ListingMode::Browse => {
            for dt in document.select(&BROWSE_DT) {
                let Some(id) = first_paper_id(&dt, &BROWSE_ID_LINK) else {
                    continue;
                };
                // The title lives in the paired dd element that follows
                let title = next_dd(&dt)
                    .and_then(|dd| dd.select(&BROWSE_TITLE).next())
                    .map(|el| strip_label(&element_text(&el)))
                    .filter(|t| t.len() >= 3)
                    .unwrap_or_else(|| fallback_title(&id));
                push_unique(&mut entries, &mut seen, id, title);
            }
        }
    }

    entries
}

fn first_paper_id(container: &ElementRef, link_selector: &Selector) -> Option<String> {
    let link = container.select(link_selector).next()?;
    let href = link.value().attr("href")?;
    ABS_ID.captures(href).map(|caps| caps[1].to_string())
}

fn next_dd<'a>(dt: &ElementRef<'a>) -> Option<ElementRef<'a>> {
    dt.next_siblings()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "dd")
}

fn element_text(el: &ElementRef) -> String {
    el.text().collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip the "Title:" label that browse listings prefix onto titles.
fn strip_label(text: &str) -> String {
    text.strip_prefix("Title:")
        .map(str::trim)
        .unwrap_or(text)
        .to_string()
}

fn fallback_title(id: &str) -> String {
    format!("Paper {}", id)
}

fn push_unique(
    entries: &mut Vec<ListingEntry>,
    seen: &mut HashSet<String>,
    id: String,
    title: String,
) {
    let url = format!("{}/abs/{}", ARXIV_BASE_URL, id);
    if seen.insert(url.clone()) {
        entries.push(ListingEntry {
            pdf_url: format!("{}/pdf/{}.pdf", ARXIV_BASE_URL, id),
            url,
            id,
            title,
        });
    }
}
