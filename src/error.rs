//! Error types for the conversion pipeline.

/// Errors that can occur while converting a URL into a local artifact.
///
/// Every variant carries a human-readable message; the orchestrator flattens
/// these into the `error` field of a failed [`ConversionResult`].
///
/// [`ConversionResult`]: crate::models::ConversionResult
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    /// The URL does not match any known paper-identifier pattern
    #[error("no recognizable paper identifier in URL: {0}")]
    IdentifierNotFound(String),

    /// Network or HTTP-level failure reaching a remote resource
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Content could not be parsed as expected (feed, HTML, selection)
    #[error("parse failed: {0}")]
    Parse(String),

    /// A local artifact could not be persisted
    #[error("write failed: {0}")]
    Write(String),

    /// The caller requested an extraction format the engine does not implement
    #[error("unsupported format: {0} (supported: markdown, text)")]
    UnsupportedFormat(String),
}

impl From<reqwest::Error> for ConvertError {
    fn from(err: reqwest::Error) -> Self {
        ConvertError::Fetch(err.to_string())
    }
}

impl From<std::io::Error> for ConvertError {
    fn from(err: std::io::Error) -> Self {
        ConvertError::Write(err.to_string())
    }
}
