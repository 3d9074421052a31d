//! Error types for the relnote-synth library.
//!
//! Three error types reflect three failure modes with different owners:
//!
//! * [`SynthError`] — **Fatal**: the synthesis cannot proceed at all
//!   (missing prompt template, invalid configuration, no provider). Returned
//!   as `Err(SynthError)` from the top-level `synthesize*` functions.
//!
//! * [`GenerationError`] — **Transient**: one attempt against the external
//!   text-generation service failed or timed out. Absorbed by the retry loop
//!   in [`crate::pipeline::generate`] and turned into fallback text; callers
//!   never see it.
//!
//! * [`ImageFitError`] — **Degraded**: a logo or figure could not be decoded,
//!   was out of bounds, or could not be fetched. The pipeline logs it and
//!   renders the document without that image.

use crate::model::Category;
use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the relnote-synth library.
#[derive(Debug, Error)]
pub enum SynthError {
    // ── Deployment errors ─────────────────────────────────────────────────
    /// No prompt template is registered for a category present in the input.
    #[error("Missing prompt template for category '{category}': {message}")]
    ConfigError { category: Category, message: String },

    /// Builder or environment validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output document file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SynthError {
    /// Short machine-readable name of the error variant.
    pub fn kind(&self) -> &'static str {
        match self {
            SynthError::ConfigError { .. } => "ConfigError",
            SynthError::InvalidConfig(_) => "InvalidConfig",
            SynthError::ProviderNotConfigured { .. } => "ProviderNotConfigured",
            SynthError::OutputWriteFailed { .. } => "OutputWriteFailed",
            SynthError::Internal(_) => "Internal",
        }
    }

    /// True for every variant caused by deployment configuration.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            SynthError::ConfigError { .. }
                | SynthError::InvalidConfig(_)
                | SynthError::ProviderNotConfigured { .. }
        )
    }

    /// Structured `{ kind, message }` object handed to the HTTP layer.
    ///
    /// All configuration failures share the `"ConfigError"` kind; the
    /// message keeps the detail. Use [`SynthError::kind`] for the variant.
    pub fn to_report(&self) -> ErrorReport {
        let kind = if self.is_config() {
            "ConfigError"
        } else {
            self.kind()
        };
        ErrorReport {
            kind: kind.to_string(),
            message: self.to_string(),
        }
    }
}

/// Serialisable error object for the excluded HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorReport {
    pub kind: String,
    pub message: String,
}

/// A single failed attempt against the text-generation service.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// The attempt lost the race against the per-call timeout.
    #[error("generation timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// The provider returned an error (HTTP failure, rate limit, auth, ...).
    #[error("provider error: {0}")]
    Provider(String),

    /// The provider answered but the text was blank after trimming.
    #[error("provider returned an empty response")]
    EmptyResponse,
}

/// Why an image could not be turned into a [`crate::model::FittedImage`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageFitError {
    #[error("unsupported image format: {detail}")]
    UnsupportedFormat { detail: String },

    #[error("image is too small: {width}x{height} (minimum {min}x{min})")]
    ImageTooSmall { width: u32, height: u32, min: u32 },

    #[error("image is too large: {width}x{height} (maximum {max}x{max})")]
    ImageTooLarge { width: u32, height: u32, max: u32 },

    #[error("image could not be decoded: {0}")]
    DecodeError(String),

    #[error("image could not be re-encoded: {0}")]
    EncodeError(String),

    #[error("malformed data URI: {0}")]
    InvalidDataUri(String),

    /// Remote or local source could not be read.
    #[error("image source '{source_ref}' is unavailable: {reason}")]
    SourceUnavailable { source_ref: String, reason: String },
}
