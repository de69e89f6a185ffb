//! Utility modules supporting the conversion pipeline.
//!
//! - [`HttpClient`]: shared HTTP client with a browser user agent and
//!   timeouts sized for large transfers
//! - [`with_retry`] / [`RetryConfig`]: exponential-backoff retry for
//!   transient network failures
//! - [`sanitize_title`], [`pdf_filename_from_url`], [`date_stamp`]:
//!   filename derivation for written artifacts
//! - [`content_type_for`], [`proxy_filename`]: boundary helpers for the
//!   download endpoints of an embedding server

mod filename;
mod http;
mod retry;

pub use filename::{
    content_type_for, date_stamp, pdf_filename_from_url, proxy_filename, sanitize_title,
};
pub use http::{HttpClient, BROWSER_USER_AGENT};
pub use retry::{api_retry_config, with_retry, RetryConfig, TransientError};
