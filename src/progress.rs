//! Progress-callback trait for per-image and per-section pipeline events.
//!
//! Inject an [`Arc<dyn PipelineProgress>`] via
//! [`crate::config::PipelineConfigBuilder::progress_callback`] to receive
//! events as the pipeline walks the images and sections. The callbacks are
//! observers only: nothing they do changes control flow.
//!
//! # Example
//!
//! ```rust
//! use scan2table::{PipelineConfig, PipelineProgress};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct CountingCallback {
//!     completed: AtomicUsize,
//! }
//!
//! impl PipelineProgress for CountingCallback {
//!     fn on_section_complete(&self, index: usize, total: usize) {
//!         let done = self.completed.fetch_add(1, Ordering::SeqCst) + 1;
//!         eprintln!("Section {}/{} done ({} so far)", index, total, done);
//!     }
//! }
//!
//! let counter = Arc::new(CountingCallback { completed: AtomicUsize::new(0) });
//!
//! let config = PipelineConfig::builder()
//!     .progress_callback(counter as Arc<dyn PipelineProgress>)
//!     .build()
//!     .unwrap();
//! ```

use std::sync::Arc;
use std::time::Duration;

/// Called by the pipeline as it processes each image and section.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. The pipeline is sequential, so calls never overlap,
/// but implementations must still be `Send + Sync` to live in the config.
pub trait PipelineProgress: Send + Sync {
    /// Called once before OCR starts.
    fn on_ocr_start(&self, total_images: usize) {
        let _ = total_images;
    }

    /// Called after one image has been transcribed.
    ///
    /// # Arguments
    /// * `index`: 1-indexed position in encounter order
    /// * `chars`: length of the normalised transcription
    fn on_image_complete(&self, index: usize, total: usize, file_name: &str, chars: usize) {
        let _ = (index, total, file_name, chars);
    }

    /// Called once the corpus has been split, before the first remote call.
    fn on_extraction_start(&self, total_sections: usize) {
        let _ = total_sections;
    }

    /// Called just before a section is sent for extraction (1-indexed).
    fn on_section_start(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called before each backoff wait.
    ///
    /// # Arguments
    /// * `attempt`: the attempt that just failed (1-indexed)
    /// * `retries`: attempt budget
    /// * `delay`: how long the pipeline will now sleep
    /// * `reason`: human-readable fault description
    fn on_retry(&self, attempt: u32, retries: u32, delay: Duration, reason: &str) {
        let _ = (attempt, retries, delay, reason);
    }

    /// Called when a section's response has been parsed.
    fn on_section_complete(&self, index: usize, total: usize) {
        let _ = (index, total);
    }

    /// Called once every section has been extracted.
    fn on_extraction_complete(&self, total_sections: usize) {
        let _ = total_sections;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl PipelineProgress for NoopProgressCallback {}

/// Convenience alias matching the type stored in the configs.
pub type ProgressCallback = Arc<dyn PipelineProgress>;
