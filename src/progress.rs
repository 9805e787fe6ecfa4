//! Progress-callback trait for per-chunk translation events.
//!
//! Inject an [`Arc<dyn TranslationProgressCallback>`] via
//! [`crate::config::TranslationConfigBuilder::progress_callback`] to receive
//! events as the executor works through the chunk list.
//!
//! A book run takes hours, so the events carry enough to drive an ETA: the
//! chunk count is known before the first call, and a resumed run reports
//! where it picked up so progress bars start at the right position.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf_translate::{TranslationConfig, TranslationProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl TranslationProgressCallback for CountingCallback {
//!     fn on_chunk_complete(&self, index: usize, total: usize, output_len: usize) {
//!         self.completed.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("Chunk {}/{} done ({} bytes)", index + 1, total, output_len);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = TranslationConfig::builder()
//!     .progress_callback(counter as Arc<dyn TranslationProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;

/// Called by the executor as it processes each chunk.
///
/// Chunks are translated strictly one at a time, so events for one run never
/// overlap. Implementations must still be `Send + Sync` because the executor
/// runs on the Tokio runtime. All methods default to no-ops.
pub trait TranslationProgressCallback: Send + Sync {
    /// Called once before the first pending chunk.
    ///
    /// # Arguments
    /// * `total_chunks` — chunks in the whole run
    /// * `resume_from`  — index of the first chunk that will be sent to the
    ///   backend (0 for a fresh run)
    fn on_run_start(&self, total_chunks: usize, resume_from: usize) {
        let _ = (total_chunks, resume_from);
    }

    /// Called just before a chunk is sent to the backend.
    ///
    /// `index` is 0-based; `words` is the chunk's word count.
    fn on_chunk_start(&self, index: usize, total_chunks: usize, words: usize) {
        let _ = (index, total_chunks, words);
    }

    /// Called when a chunk is about to be attempted again.
    ///
    /// `reason` is a short human-readable cause ("hallucination: excessive
    /// length", "transient backend failure: timeout", ...).
    fn on_chunk_retry(&self, index: usize, reason: &str) {
        let _ = (index, reason);
    }

    /// Called after a chunk's result has been checkpointed.
    fn on_chunk_complete(&self, index: usize, total_chunks: usize, output_len: usize) {
        let _ = (index, total_chunks, output_len);
    }

    /// Called once after the last chunk has been checkpointed.
    ///
    /// `translated` counts chunks sent to the backend in this run; chunks
    /// restored from the checkpoint are not included.
    fn on_run_complete(&self, total_chunks: usize, translated: usize) {
        let _ = (total_chunks, translated);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl TranslationProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::TranslationConfig`].
pub type ProgressCallback = Arc<dyn TranslationProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        resume_from: AtomicUsize,
        starts: AtomicUsize,
        completes: AtomicUsize,
        retries: Mutex<Vec<String>>,
    }

    impl TranslationProgressCallback for TrackingCallback {
        fn on_run_start(&self, _total: usize, resume_from: usize) {
            self.resume_from.store(resume_from, Ordering::SeqCst);
        }

        fn on_chunk_start(&self, _index: usize, _total: usize, _words: usize) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }

        fn on_chunk_retry(&self, _index: usize, reason: &str) {
            self.retries.lock().unwrap().push(reason.to_string());
        }

        fn on_chunk_complete(&self, _index: usize, _total: usize, _len: usize) {
            self.completes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_run_start(5, 0);
        cb.on_chunk_start(0, 5, 420);
        cb.on_chunk_retry(0, "timeout");
        cb.on_chunk_complete(0, 5, 42);
        cb.on_run_complete(5, 5);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_run_start(4, 2);
        tracker.on_chunk_start(2, 4, 100);
        tracker.on_chunk_retry(2, "hallucination: excessive length");
        tracker.on_chunk_complete(2, 4, 900);
        tracker.on_chunk_start(3, 4, 80);
        tracker.on_chunk_complete(3, 4, 700);

        assert_eq!(tracker.resume_from.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.starts.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.completes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.retries.lock().unwrap().len(), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_run_start(10, 0);
        cb.on_chunk_complete(0, 10, 512);
    }
}
