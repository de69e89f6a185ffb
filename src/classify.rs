//! URL classification.
//!
//! Pure, deterministic mapping from a URL string to the pipeline branch that
//! should handle it. The listing check runs before the paper-page check so a
//! listing URL is never mistaken for a single paper.

use serde::{Deserialize, Serialize};

/// The pipeline branch a URL belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// A raw PDF resource that can be streamed straight to disk
    PdfDirect,
    /// A single-paper abstract/PDF page on a preprint host
    PreprintPage,
    /// A page enumerating many preprint entries (browse or search results)
    PreprintListing,
    /// Anything else
    GenericWebpage,
}

/// Hosts where a bare "pdf" hint in the URL is enough to treat the resource
/// as a direct PDF even without a `.pdf` extension
const PDF_HOSTING_HINTS: &[&str] = &["openai.com"];

/// Classify a URL. No I/O; the same input always yields the same category.
pub fn classify(url: &str) -> Category {
    let lower = url.to_ascii_lowercase();

    if is_preprint_listing(&lower) {
        return Category::PreprintListing;
    }
    if is_preprint_page(&lower) {
        return Category::PreprintPage;
    }
    if is_pdf_direct(&lower) {
        return Category::PdfDirect;
    }

    Category::GenericWebpage
}

fn is_preprint_listing(lower: &str) -> bool {
    lower.contains("arxiv.org/list/")
        || lower.contains("arxiv.org/search")
        || (lower.contains("arxiv.org") && (lower.contains("/recent") || lower.contains("/new")))
}

fn is_preprint_page(lower: &str) -> bool {
    lower.contains("arxiv.org")
        && (lower.contains("/abs/") || lower.contains("/pdf/") || lower.contains("/html/"))
}

fn is_pdf_direct(lower: &str) -> bool {
    lower.contains(".pdf")
        || (lower.contains("pdf") && PDF_HOSTING_HINTS.iter().any(|host| lower.contains(host)))
}
