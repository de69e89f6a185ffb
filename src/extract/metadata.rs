//! Page metadata extraction.
//!
//! Each field is resolved through a prioritized list of meta tags with
//! visible-element fallbacks, mirroring how real pages actually declare
//! their metadata (og: tags, article: tags, plain meta names).

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};

static TITLE_TAG: Lazy<Selector> = Lazy::new(|| Selector::parse("title").expect("valid selector"));
static FIRST_H1: Lazy<Selector> = Lazy::new(|| Selector::parse("h1").expect("valid selector"));
static OG_TITLE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:title"]"#).expect("valid selector"));

static META_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="description"]"#).expect("valid selector"));
static OG_DESCRIPTION: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="og:description"]"#).expect("valid selector"));

static META_AUTHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="author"]"#).expect("valid selector"));
static ARTICLE_AUTHOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[property="article:author"]"#).expect("valid selector"));
static AUTHOR_ELEMENT: Lazy<Selector> =
    Lazy::new(|| Selector::parse(".author").expect("valid selector"));

static PUBLISHED_TIME: Lazy<Selector> = Lazy::new(|| {
    Selector::parse(r#"meta[property="article:published_time"]"#).expect("valid selector")
});
static META_DATE: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="date"]"#).expect("valid selector"));
static TIME_ELEMENT: Lazy<Selector> =
    Lazy::new(|| Selector::parse("time").expect("valid selector"));

static META_KEYWORDS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"meta[name="keywords"]"#).expect("valid selector"));

/// Metadata gathered from a page's head and prominent elements
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub publish_date: Option<String>,
    pub keywords: Vec<String>,
}

/// Extract metadata from a parsed document.
pub fn extract_metadata(document: &Html) -> PageMetadata {
    let title = element_text(document, &TITLE_TAG)
        .or_else(|| element_text(document, &FIRST_H1))
        .or_else(|| meta_content(document, &OG_TITLE));

    let description = meta_content(document, &META_DESCRIPTION)
        .or_else(|| meta_content(document, &OG_DESCRIPTION));

    let author = meta_content(document, &META_AUTHOR)
        .or_else(|| meta_content(document, &ARTICLE_AUTHOR))
        .or_else(|| element_text(document, &AUTHOR_ELEMENT));

    let publish_date = meta_content(document, &PUBLISHED_TIME)
        .or_else(|| meta_content(document, &META_DATE))
        .or_else(|| attr_value(document, &TIME_ELEMENT, "datetime"));

    let keywords = meta_content(document, &META_KEYWORDS)
        .map(|list| {
            list.split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect()
        })
        .unwrap_or_default();

    PageMetadata {
        title,
        description,
        author,
        publish_date,
        keywords,
    }
}

fn element_text(document: &Html, selector: &Selector) -> Option<String> {
    document.select(selector).next().and_then(|el| {
        let text = collapse(&el.text().collect::<String>());
        (!text.is_empty()).then_some(text)
    })
}

fn meta_content(document: &Html, selector: &Selector) -> Option<String> {
    attr_value(document, selector, "content")
}

fn attr_value(document: &Html, selector: &Selector, attr: &str) -> Option<String> {
    document
        .select(selector)
        .next()
        .and_then(|el: ElementRef| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
