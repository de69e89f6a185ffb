//! Filename derivation, sanitization, and content-type helpers.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;

/// Characters that are illegal in filenames on at least one platform
const ILLEGAL_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Maximum length of the sanitized-title portion of a filename
const MAX_TITLE_LEN: usize = 100;

static ARXIV_ID_IN_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4}\.\d{4,5})").expect("valid identifier pattern"));

/// Sanitize a title for use in a filename.
///
/// Strips illegal characters, collapses whitespace runs into single
/// underscores, and truncates to 100 characters.
pub fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !ILLEGAL_CHARS.contains(c))
        .collect();

    cleaned
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .take(MAX_TITLE_LEN)
        .collect()
}

/// Today's date as an ISO `YYYY-MM-DD` stamp.
pub fn date_stamp() -> String {
    Utc::now().format("%Y-%m-%d").to_string()
}

/// Derive a date-stamped PDF filename from a resource URL.
///
/// Takes the last path segment, appends `.pdf` when missing, and inserts a
/// date stamp before the extension so repeated downloads never overwrite.
pub fn pdf_filename_from_url(url: &str) -> String {
    let segment = url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|segments| segments.filter(|s| !s.is_empty()).last().map(String::from))
        })
        .unwrap_or_else(|| "download".to_string());

    let stem = segment.strip_suffix(".pdf").unwrap_or(&segment);
    format!("{}_{}.pdf", sanitize_title(stem), date_stamp())
}

/// Derive a download-oriented filename for proxied PDF resources.
///
/// When the URL embeds an arXiv-style identifier the filename becomes
/// `arxiv_{id}.pdf`; otherwise the last path segment is used as-is.
pub fn proxy_filename(url: &str) -> String {
    let segment = url.rsplit('/').next().unwrap_or(url);
    match ARXIV_ID_IN_NAME.captures(segment) {
        Some(caps) => format!("arxiv_{}.pdf", &caps[1]),
        None => segment.to_string(),
    }
}

/// Infer a response content type from a produced filename's extension.
pub fn content_type_for(filename: &str) -> &'static str {
    if filename.ends_with(".md") {
        "text/markdown"
    } else if filename.ends_with(".html") {
        "text/html"
    } else {
        "text/plain"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_illegal_chars() {
        let title = r#"Attention <Is> All: "You" Need/?*|\"#;
        let sanitized = sanitize_title(title);
        for c in ILLEGAL_CHARS {
            assert!(!sanitized.contains(*c), "should strip {:?}", c);
        }
        assert_eq!(sanitized, "Attention_Is_All_You_Need");
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(sanitize_title("a   b\t\nc"), "a_b_c");
    }

    #[test]
    fn test_sanitize_truncates_to_100() {
        let long = "x".repeat(300);
        assert_eq!(sanitize_title(&long).chars().count(), 100);
    }

    #[test]
    fn test_date_stamp_shape() {
        let stamp = date_stamp();
        assert_eq!(stamp.len(), 10);
        assert_eq!(stamp.chars().filter(|c| *c == '-').count(), 2);
    }

    #[test]
    fn test_pdf_filename_from_url() {
        let name = pdf_filename_from_url("https://graphics.stanford.edu/papers/brook/brook.pdf");
        assert!(name.starts_with("brook_"));
        assert!(name.ends_with(".pdf"));

        // Extension appended when missing
        let name = pdf_filename_from_url("https://example.com/reports/annual");
        assert!(name.starts_with("annual_"));
        assert!(name.ends_with(".pdf"));

        // Unparseable URL falls back to a generic stem
        let name = pdf_filename_from_url("not a url");
        assert!(name.starts_with("download_"));
    }

    #[test]
    fn test_proxy_filename() {
        assert_eq!(
            proxy_filename("https://arxiv.org/pdf/1706.03762.pdf"),
            "arxiv_1706.03762.pdf"
        );
        assert_eq!(
            proxy_filename("https://example.com/files/report.pdf"),
            "report.pdf"
        );
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for("notes.md"), "text/markdown");
        assert_eq!(content_type_for("page.html"), "text/html");
        assert_eq!(content_type_for("notes.txt"), "text/plain");
        assert_eq!(content_type_for("unknown.bin"), "text/plain");
    }
}
