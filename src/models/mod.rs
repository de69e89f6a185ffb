//! Core data models for conversion results and batch events.

mod events;
mod result;

pub use events::{BatchEvent, EVENT_MARKER};
pub use result::{ConversionKind, ConversionResult, Guidance, ListingEntry, PdfLink};
