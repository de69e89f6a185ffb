//! Sequential batch processing with streamed progress events.
//!
//! Items run strictly one at a time, in input order. Before each item a
//! progress event is emitted; after each item, a result event; after the
//! last item, a single complete event with the full result sequence. A
//! fixed pacing pause separates items (but does not follow the last one) to
//! stay polite toward third-party hosts.
//!
//! There is no mid-batch cancellation: a caller that stops consuming the
//! event stream simply abandons the remaining items.

use async_stream::stream;
use futures_util::pin_mut;
use futures_util::Stream;
use futures_util::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::info;

use crate::models::{BatchEvent, ConversionResult};
use crate::pipeline::Converter;

/// Aggregate outcome of a buffered batch run
#[derive(Debug, Clone)]
pub struct BatchSummary {
    /// One result per input URL, in input order
    pub results: Vec<ConversionResult>,

    /// How many of them succeeded
    pub success_count: usize,
}

/// Drives a list of URLs through the converter, one at a time
pub struct BatchSequencer {
    converter: Arc<Converter>,
    pacing: Duration,
}

impl BatchSequencer {
    /// Create a sequencer using the converter's configured pacing.
    pub fn new(converter: Arc<Converter>) -> Self {
        let pacing = converter.settings().pacing();
        Self { converter, pacing }
    }

    /// Override the inter-item pacing.
    pub fn with_pacing(mut self, pacing: Duration) -> Self {
        self.pacing = pacing;
        self
    }

    /// Stream progress, result, and complete events for the given URLs.
    ///
    /// The sequencer exclusively owns emission order; events arrive strictly
    /// as progress(1), result(1), progress(2), result(2), ..., complete.
    pub fn stream_events<'a>(
        &'a self,
        urls: &'a [String],
    ) -> impl Stream<Item = BatchEvent> + 'a {
        stream! {
            let total = urls.len();
            let mut results: Vec<ConversionResult> = Vec::with_capacity(total);

            for (index, url) in urls.iter().enumerate() {
                yield BatchEvent::progress(index, total, url.clone());

                let result = self.converter.convert(url).await;
                results.push(result.clone());

                yield BatchEvent::result(index, total, result);

                // Pace between items, not after the last one
                if index + 1 < total && !self.pacing.is_zero() {
                    sleep(self.pacing).await;
                }
            }

            let success_count = results.iter().filter(|r| r.success).count();
            info!(total, success_count, "batch complete");
            yield BatchEvent::Complete {
                total,
                success_count,
                results,
            };
        }
    }

    /// Process every URL and return the buffered results.
    ///
    /// Always yields exactly one result per input URL, in input order,
    /// however many items fail.
    pub async fn process_all(&self, urls: &[String]) -> BatchSummary {
        let events = self.stream_events(urls);
        pin_mut!(events);

        let mut summary = BatchSummary {
            results: Vec::new(),
            success_count: 0,
        };

        while let Some(event) = events.next().await {
            if let BatchEvent::Complete {
                results,
                success_count,
                ..
            } = event
            {
                summary.results = results;
                summary.success_count = success_count;
            }
        }

        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;

    fn offline_converter(dir: &std::path::Path) -> Arc<Converter> {
        let mut settings = Settings::default();
        settings.output_dir = dir.to_path_buf();
        settings.pacing_ms = 0;
        settings.render.headless_enabled = false;
        settings.render.render_api_token = None;
        Arc::new(Converter::new(settings))
    }

    #[tokio::test]
    async fn test_one_result_per_input_in_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sequencer = BatchSequencer::new(offline_converter(dir.path()));

        // All three fail fast (nothing listens on port 1); the batch still
        // yields one result per input, in order
        let urls = vec![
            "http://127.0.0.1:1/a".to_string(),
            "http://127.0.0.1:1/b".to_string(),
            "http://127.0.0.1:1/c".to_string(),
        ];

        let summary = sequencer.process_all(&urls).await;
        assert_eq!(summary.results.len(), 3);
        assert_eq!(summary.success_count, 0);
        assert_eq!(summary.results[0].url, urls[0]);
        assert_eq!(summary.results[1].url, urls[1]);
        assert_eq!(summary.results[2].url, urls[2]);
    }

    #[tokio::test]
    async fn test_event_sequence() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sequencer = BatchSequencer::new(offline_converter(dir.path()));

        let urls = vec![
            "http://127.0.0.1:1/a".to_string(),
            "http://127.0.0.1:1/b".to_string(),
        ];

        let events = sequencer.stream_events(&urls);
        pin_mut!(events);
        let mut collected = Vec::new();
        while let Some(event) = events.next().await {
            collected.push(event);
        }

        // progress, result, progress, result, complete
        assert_eq!(collected.len(), 5);
        assert!(matches!(collected[0], BatchEvent::Progress { current: 1, .. }));
        assert!(matches!(collected[1], BatchEvent::Result { index: 0, .. }));
        assert!(matches!(collected[2], BatchEvent::Progress { current: 2, .. }));
        assert!(matches!(collected[3], BatchEvent::Result { index: 1, .. }));
        assert!(matches!(
            collected[4],
            BatchEvent::Complete { total: 2, .. }
        ));
    }

    #[tokio::test]
    async fn test_empty_batch_completes_immediately() {
        let dir = tempfile::tempdir().expect("tempdir");
        let sequencer = BatchSequencer::new(offline_converter(dir.path()));

        let summary = sequencer.process_all(&[]).await;
        assert!(summary.results.is_empty());
        assert_eq!(summary.success_count, 0);
    }
}
