//! # relnote-synth
//!
//! Turn a free-form change description into a categorized, LLM-polished
//! release-notes document.
//!
//! ## Why this crate?
//!
//! Change descriptions are written in a hurry: one line per change, mixed
//! languages, half of them tagged, none of them consistent. This crate sorts
//! each line into a fixed change-type taxonomy, asks a language model to
//! rewrite every category into clean release-note prose, and assembles a
//! structured document ready for an office serializer. The external model is
//! treated as unreliable: every call is bounded by a timeout and a retry
//! budget, and a category whose calls all fail still appears in the document
//! with deterministic fallback text.
//!
//! ## Pipeline Overview
//!
//! ```text
//! description
//!  │
//!  ├─ 1. Classify   [tag] markers, then keyword table → one category per line
//!  ├─ 2. Generate   one retried, timed-out call per category (fallback on failure)
//!  ├─ 3. Normalize  strip echoed tags and bullets, re-tag each line
//!  ├─ 4. Images     logo and figures → bounded PNG (failure → no image)
//!  └─ 5. Assemble   sections in display order + metadata table → DocumentModel
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use relnote_synth::{synthesize, SynthesisConfig, SynthesisRequest};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = SynthesisConfig::from_env()?;
//!     let request = SynthesisRequest::new(
//!         "Release 2.4",
//!         "[feature] Exportação em CSV\ncorrigido crash ao salvar\n[security] tokens rotacionados",
//!     )
//!     .with_author("Equipe Core")
//!     .with_logo("assets/logo.png");
//!
//!     let output = synthesize(&request, &config).await?;
//!     println!("{}", relnote_synth::preview::to_markdown(&output.document));
//!     eprintln!("{} categories, {} fell back",
//!         output.stats.categories,
//!         output.stats.fallbacks);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `relnote` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! relnote-synth = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod preview;
pub mod progress;
pub mod prompts;
pub mod provider;
pub mod stream;
pub mod synthesize;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{FitBounds, SynthesisConfig, SynthesisConfigBuilder};
pub use error::{ErrorReport, GenerationError, ImageFitError, SynthError};
pub use model::{
    Bullet, Category, CategoryResult, DocumentModel, Entry, Figure, FittedImage,
    GenerationOutcome, GenerationRequest, ImageKind, SynthesisOutput, SynthesisStats, TaggedLine,
};
pub use pipeline::assemble::{assemble, DocumentMetadata};
pub use pipeline::classify::{classify, Classifier, ClassifierRules};
pub use pipeline::generate::{ResilientGenerator, RetryPolicy};
pub use pipeline::image_fit::fit_image;
pub use pipeline::input::ImageSource;
pub use progress::{NoopProgressCallback, ProgressCallback, SynthesisProgressCallback};
pub use prompts::{PromptSet, PromptTemplate};
pub use provider::{GenerationParams, ImageAttachment, LlmTextGenerator, TextGenerator};
pub use stream::{synthesize_stream, CategoryStream};
pub use synthesize::{
    synthesize, synthesize_sync, synthesize_to_file, write_output, SynthesisRequest,
};
