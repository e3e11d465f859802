//! Progress-callback trait for per-page and per-chunk pipeline events.
//!
//! Inject an `Arc<dyn ExtractionProgressCallback>` via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! real-time events as the pipeline reads pages and sends row chunks to the
//! model.
//!
//! # Why callbacks instead of channels?
//!
//! The callback approach is the least-invasive integration point: callers
//! can forward events to a broadcast channel, a WebSocket, a database row,
//! or a terminal progress bar without the library knowing anything about
//! how the host application communicates. The trait is `Send + Sync` so it
//! works when row chunks are processed concurrently.

/// Called by the pipeline as it processes pages and row chunks.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. When concurrency > 1, chunk events may arrive from
/// different tasks; implementations must synchronise shared state.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once after the PDF is opened, before any page is read.
    fn on_extraction_start(&self, total_pages: usize) {
        let _ = total_pages;
    }

    /// Called after each page yields text (or fails both paths).
    ///
    /// `via_ocr` is true when the native text was empty and the OCR
    /// fallback produced the page text. `failed` is true when neither path
    /// recovered anything.
    fn on_page_extracted(&self, page_index: usize, via_ocr: bool, failed: bool) {
        let _ = (page_index, via_ocr, failed);
    }

    /// Called just before a row chunk is sent to the model.
    fn on_chunk_start(&self, chunk_index: usize, total_chunks: usize) {
        let _ = (chunk_index, total_chunks);
    }

    /// Called when a row chunk's records have been parsed.
    fn on_chunk_complete(&self, chunk_index: usize, total_chunks: usize, records: usize) {
        let _ = (chunk_index, total_chunks, records);
    }

    /// Called when a row chunk yields nothing after all retries.
    fn on_chunk_error(&self, chunk_index: usize, total_chunks: usize, error: &str) {
        let _ = (chunk_index, total_chunks, error);
    }

    /// Called once after post-processing, with the final transaction count.
    fn on_extraction_complete(&self, transactions: usize) {
        let _ = transactions;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct TrackingCallback {
        pages: AtomicUsize,
        ocr_pages: AtomicUsize,
        chunks: AtomicUsize,
        errors: AtomicUsize,
        final_count: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_page_extracted(&self, _page: usize, via_ocr: bool, _failed: bool) {
            self.pages.fetch_add(1, Ordering::SeqCst);
            if via_ocr {
                self.ocr_pages.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn on_chunk_complete(&self, _i: usize, _total: usize, _records: usize) {
            self.chunks.fetch_add(1, Ordering::SeqCst);
        }

        fn on_chunk_error(&self, _i: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_extraction_complete(&self, transactions: usize) {
            self.final_count.store(transactions, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_extraction_start(8);
        cb.on_page_extracted(0, false, false);
        cb.on_chunk_start(0, 2);
        cb.on_chunk_complete(0, 2, 12);
        cb.on_chunk_error(1, 2, "model failed");
        cb.on_extraction_complete(12);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let cb = TrackingCallback {
            pages: AtomicUsize::new(0),
            ocr_pages: AtomicUsize::new(0),
            chunks: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
            final_count: AtomicUsize::new(0),
        };

        cb.on_extraction_start(3);
        cb.on_page_extracted(0, false, false);
        cb.on_page_extracted(1, true, false);
        cb.on_page_extracted(2, true, true);
        cb.on_chunk_complete(0, 2, 30);
        cb.on_chunk_error(1, 2, "retries exhausted");
        cb.on_extraction_complete(30);

        assert_eq!(cb.pages.load(Ordering::SeqCst), 3);
        assert_eq!(cb.ocr_pages.load(Ordering::SeqCst), 2);
        assert_eq!(cb.chunks.load(Ordering::SeqCst), 1);
        assert_eq!(cb.errors.load(Ordering::SeqCst), 1);
        assert_eq!(cb.final_count.load(Ordering::SeqCst), 30);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: Arc<dyn ExtractionProgressCallback> = Arc::new(NoopProgressCallback);
        cb.on_extraction_start(10);
        cb.on_chunk_start(0, 10);
    }
}
