//! Progress-callback trait for per-category synthesis events.
//!
//! Inject an [`Arc<dyn SynthesisProgressCallback>`] via
//! [`crate::config::SynthesisConfigBuilder::progress_callback`] to receive
//! events as the pipeline rewrites each category.
//!
//! # Example
//!
//! ```rust
//! use relnote_synth::{Category, SynthesisConfig, SynthesisProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct FallbackCounter {
//!     fallbacks: AtomicUsize,
//! }
//!
//! impl SynthesisProgressCallback for FallbackCounter {
//!     fn on_category_complete(&self, category: Category, lines: usize, fell_back: bool) {
//!         if fell_back {
//!             self.fallbacks.fetch_add(1, Ordering::SeqCst);
//!         }
//!         eprintln!("{category}: {lines} lines");
//!     }
//! }
//!
//! let counter = Arc::new(FallbackCounter { fallbacks: AtomicUsize::new(0) });
//!
//! let config = SynthesisConfig::builder()
//!     .progress_callback(counter as Arc<dyn SynthesisProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::model::Category;
use std::sync::Arc;

/// Called by the synthesis pipeline as it processes each category.
///
/// With `concurrency > 1` the per-category methods may be called from
/// several tasks at once; implementations must synchronise their own state.
pub trait SynthesisProgressCallback: Send + Sync {
    /// Called once after classification, before any generation.
    fn on_synthesis_start(&self, total_categories: usize) {
        let _ = total_categories;
    }

    /// Called just before the first attempt for a category.
    fn on_category_start(&self, category: Category) {
        let _ = category;
    }

    /// Called when a category has its final text.
    ///
    /// # Arguments
    /// * `lines`     — normalised output lines for the category
    /// * `fell_back` — true when every attempt failed and fallback text was used
    fn on_category_complete(&self, category: Category, lines: usize, fell_back: bool) {
        let _ = (category, lines, fell_back);
    }

    /// Called once after every category has been generated.
    fn on_synthesis_complete(&self, total_categories: usize, fallbacks: usize) {
        let _ = (total_categories, fallbacks);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl SynthesisProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::SynthesisConfig`].
pub type ProgressCallback = Arc<dyn SynthesisProgressCallback>;
