//! The normalized conversion result produced by every pipeline branch.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// What a conversion produced (or failed to produce).
///
/// `kind` is always present, even on failure (`Error`). Serialized names
/// match the wire protocol consumed by batch clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversionKind {
    /// A PDF fetched (or rendered) straight to disk
    DirectPdf,
    /// A preprint resolved to its canonical PDF
    PreprintPdf,
    /// A listing page resolved to its entries, nothing downloaded
    PreprintListing,
    /// Page content converted to a Markdown document
    Markdown,
    /// Structured manual-conversion guidance for a webpage
    WebpageGuidance,
    /// The conversion failed
    Error,
}

impl std::fmt::Display for ConversionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ConversionKind::DirectPdf => "direct_pdf",
            ConversionKind::PreprintPdf => "preprint_pdf",
            ConversionKind::PreprintListing => "preprint_listing",
            ConversionKind::Markdown => "markdown",
            ConversionKind::WebpageGuidance => "webpage_guidance",
            ConversionKind::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// One paper discovered on a listing page.
///
/// Deduplicated by `url` within a single extraction; ordering is document
/// order (first seen wins).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListingEntry {
    /// Canonical abstract-page URL
    pub url: String,

    /// Canonical PDF URL derived from the identifier
    pub pdf_url: String,

    /// Paper identifier
    pub id: String,

    /// Display title (identifier-based fallback when the page had none)
    pub title: String,
}

/// A PDF link discovered while analyzing a page for guidance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfLink {
    /// Absolute URL of the linked resource
    pub url: String,

    /// Anchor text, or a generic label when empty
    pub text: String,
}

/// Manual-conversion guidance attached to webpage results.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guidance {
    /// Direct PDF links found on the page
    pub discovered_pdf_links: Vec<PdfLink>,

    /// Ordered manual alternatives the caller can suggest to a user
    pub alternatives: Vec<String>,
}

/// The single normalized shape every conversion branch produces.
///
/// Invariant: either `success == true` with the payload fields for `kind`
/// populated, or `success == false` with `error` populated and
/// `kind == Error`. Use the constructors below; they enforce this.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversionResult {
    /// Whether the conversion produced something usable
    pub success: bool,

    /// Discriminates the payload
    pub kind: ConversionKind,

    /// The original input URL
    pub url: String,

    /// Display title, when one could be determined
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Paper identifier, for preprint results
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paper_id: Option<String>,

    /// Path of the written artifact, when one exists
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<PathBuf>,

    /// Filename of the written artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,

    /// Inline document content (Markdown or plain text results)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    /// Size in bytes of any inline content or written artifact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_bytes: Option<u64>,

    /// Listing results, in document order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ListingEntry>>,

    /// Manual-conversion guidance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub guidance: Option<Guidance>,

    /// Annotation when a tier substituted a different output format
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Human-readable failure description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Actionable hint accompanying a failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl ConversionResult {
    fn base(kind: ConversionKind, url: impl Into<String>, success: bool) -> Self {
        Self {
            success,
            kind,
            url: url.into(),
            title: None,
            paper_id: None,
            file_path: None,
            file_name: None,
            content: None,
            content_bytes: None,
            items: None,
            guidance: None,
            note: None,
            error: None,
            suggestion: None,
        }
    }

    /// A PDF streamed straight to disk
    pub fn direct_pdf(
        url: impl Into<String>,
        title: impl Into<String>,
        file_path: PathBuf,
        file_name: impl Into<String>,
        bytes: u64,
    ) -> Self {
        let mut r = Self::base(ConversionKind::DirectPdf, url, true);
        r.title = Some(title.into());
        r.file_path = Some(file_path);
        r.file_name = Some(file_name.into());
        r.content_bytes = Some(bytes);
        r
    }

    /// A preprint resolved and downloaded via its canonical PDF URL
    pub fn preprint_pdf(
        url: impl Into<String>,
        paper_id: impl Into<String>,
        title: impl Into<String>,
        file_path: PathBuf,
        file_name: impl Into<String>,
        bytes: u64,
    ) -> Self {
        let mut r = Self::base(ConversionKind::PreprintPdf, url, true);
        r.paper_id = Some(paper_id.into());
        r.title = Some(title.into());
        r.file_path = Some(file_path);
        r.file_name = Some(file_name.into());
        r.content_bytes = Some(bytes);
        r
    }

    /// A listing page resolved to its entries
    pub fn listing(url: impl Into<String>, items: Vec<ListingEntry>) -> Self {
        let mut r = Self::base(ConversionKind::PreprintListing, url, true);
        r.title = Some(format!("arXiv listing ({} papers)", items.len()));
        r.items = Some(items);
        r
    }

    /// Page content converted to a document (Markdown or plain text)
    pub fn document(
        url: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        file_name: impl Into<String>,
    ) -> Self {
        let content = content.into();
        let mut r = Self::base(ConversionKind::Markdown, url, true);
        r.title = Some(title.into());
        r.content_bytes = Some(content.len() as u64);
        r.content = Some(content);
        r.file_name = Some(file_name.into());
        r
    }

    /// Structured guidance for a page that could not be converted directly
    pub fn guidance(url: impl Into<String>, title: impl Into<String>, guidance: Guidance) -> Self {
        let mut r = Self::base(ConversionKind::WebpageGuidance, url, true);
        r.title = Some(title.into());
        r.guidance = Some(guidance);
        r
    }

    /// A failed conversion; `kind` is always `Error`
    pub fn failure(url: impl Into<String>, error: impl Into<String>) -> Self {
        let mut r = Self::base(ConversionKind::Error, url, false);
        r.error = Some(error.into());
        r
    }

    /// Attach an actionable suggestion (typically on failures)
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Attach a substitution note (e.g. Markdown produced instead of PDF)
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }

    /// Record where the artifact was written
    pub fn with_file(mut self, path: PathBuf) -> Self {
        self.file_path = Some(path);
        self
    }
}
