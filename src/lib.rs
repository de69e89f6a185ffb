//! # docpull
//!
//! Convert document-bearing URLs into locally retrievable artifacts: arXiv
//! abstract pages become canonical PDFs, direct PDF links are streamed to
//! disk, listing/search pages are resolved to their entries, and generic
//! webpages degrade gracefully from headless PDF rendering down to Markdown
//! extraction and manual-conversion guidance.
//!
//! ## Architecture
//!
//! - [`classify`]: pure URL classification into pipeline branches
//! - [`arxiv`]: preprint identity parsing, title lookup, listing extraction
//! - [`fetch`]: streaming binary downloads
//! - [`extract`]: HTML content extraction to Markdown or plain text
//! - [`render`]: the capability-gated render fallback chain
//! - [`pipeline`]: the conversion orchestrator and batch sequencer
//! - [`models`]: the normalized result shape and batch events
//! - [`config`]: settings management
//! - [`utils`]: HTTP client, retry, filename helpers

pub mod arxiv;
pub mod classify;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod pipeline;
pub mod render;
pub mod utils;

// Re-export commonly used types
pub use classify::{classify, Category};
pub use config::Settings;
pub use error::ConvertError;
pub use models::{BatchEvent, ConversionKind, ConversionResult, ListingEntry};
pub use pipeline::{preview_paper_selection, BatchSequencer, BatchSummary, Converter};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
