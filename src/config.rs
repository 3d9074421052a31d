//! Configuration types for release-note synthesis.
//!
//! All synthesis behaviour is controlled through [`SynthesisConfig`], built
//! via its [`SynthesisConfigBuilder`] or overlaid from the process
//! environment with [`SynthesisConfig::from_env`]. Keeping every knob in one
//! struct makes it trivial to share configs across tasks and to log the
//! exact settings a document was produced with.

use crate::error::SynthError;
use crate::progress::ProgressCallback;
use crate::prompts::PromptSet;
use crate::provider::TextGenerator;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Bounding box and source limits for one kind of embedded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FitBounds {
    /// Width the image is scaled to before the height check.
    pub target_width: u32,
    pub max_width: u32,
    pub max_height: u32,
    /// Smallest accepted source edge, in pixels.
    pub min_source_dimension: u32,
    /// Largest accepted source edge, in pixels.
    pub max_source_dimension: u32,
}

impl FitBounds {
    /// Header logo defaults: 120 px nominal width inside a 120×100 box.
    pub const LOGO: FitBounds = FitBounds {
        target_width: 120,
        max_width: 120,
        max_height: 100,
        min_source_dimension: 10,
        max_source_dimension: 2000,
    };

    /// Figure defaults: 480 px nominal width inside a 480×360 box.
    pub const FIGURE: FitBounds = FitBounds {
        target_width: 480,
        max_width: 480,
        max_height: 360,
        min_source_dimension: 10,
        max_source_dimension: 2000,
    };

    pub fn with_box(mut self, max_width: u32, max_height: u32) -> Self {
        self.max_width = max_width.max(1);
        self.max_height = max_height.max(1);
        self.target_width = self.target_width.min(self.max_width);
        self
    }
}

/// Configuration for a synthesis call.
///
/// # Example
/// ```rust
/// use relnote_synth::SynthesisConfig;
///
/// let config = SynthesisConfig::builder()
///     .max_retries(5)
///     .retry_delay_ms(500)
///     .model("gpt-4.1-nano")
///     .build()
///     .unwrap();
/// assert_eq!(config.max_retries, 5);
/// ```
#[derive(Clone)]
pub struct SynthesisConfig {
    /// Total attempts per category against the provider. Default: 3.
    pub max_retries: u32,

    /// Fixed delay between failed attempts, in milliseconds. Default: 2000.
    ///
    /// Constant, not exponential: at most `max_retries - 1` waits happen.
    pub retry_delay_ms: u64,

    /// Per-attempt timeout for category rewriting, in milliseconds. Default: 30000.
    pub generation_timeout_ms: u64,

    /// Per-attempt timeout for figure captions, in milliseconds. Default: 10000.
    pub caption_timeout_ms: u64,

    /// Descriptions longer than this many characters are cut and end in
    /// `...`. Default: 5000.
    pub max_description_length: usize,

    /// Figures beyond this count are ignored. Default: 5.
    pub max_images: usize,

    /// Categories generated at once. Default: 1 (sequential).
    pub concurrency: usize,

    /// Sampling temperature for the LLM completion. Default: 0.3.
    pub temperature: f32,

    /// Maximum tokens the LLM may generate per category. Default: 1024.
    pub max_tokens: usize,

    /// Version string shown in the metadata table. Default: "1.0.0".
    pub document_version: String,

    /// Header logo bounds. Default: [`FitBounds::LOGO`].
    pub logo_bounds: FitBounds,

    /// Figure bounds. Default: [`FitBounds::FIGURE`].
    pub figure_bounds: FitBounds,

    /// Timeout for downloading remote logo/figure sources. Default: 30.
    pub download_timeout_secs: u64,

    /// Prompt templates per category.
    pub prompts: PromptSet,

    /// LLM model identifier. If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    pub provider_name: Option<String>,

    /// Pre-constructed generator. Takes precedence over `provider_name`.
    pub generator: Option<Arc<dyn TextGenerator>>,

    /// Receives per-category progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 2000,
            generation_timeout_ms: 30_000,
            caption_timeout_ms: 10_000,
            max_description_length: 5000,
            max_images: 5,
            concurrency: 1,
            temperature: 0.3,
            max_tokens: 1024,
            document_version: "1.0.0".to_string(),
            logo_bounds: FitBounds::LOGO,
            figure_bounds: FitBounds::FIGURE,
            download_timeout_secs: 30,
            prompts: PromptSet::default(),
            model: None,
            provider_name: None,
            generator: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for SynthesisConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesisConfig")
            .field("max_retries", &self.max_retries)
            .field("retry_delay_ms", &self.retry_delay_ms)
            .field("generation_timeout_ms", &self.generation_timeout_ms)
            .field("caption_timeout_ms", &self.caption_timeout_ms)
            .field("max_description_length", &self.max_description_length)
            .field("max_images", &self.max_images)
            .field("concurrency", &self.concurrency)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("document_version", &self.document_version)
            .field("logo_bounds", &self.logo_bounds)
            .field("figure_bounds", &self.figure_bounds)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("generator", &self.generator.as_ref().map(|_| "<dyn TextGenerator>"))
            .finish()
    }
}

impl SynthesisConfig {
    /// Create a new builder for `SynthesisConfig`.
    pub fn builder() -> SynthesisConfigBuilder {
        SynthesisConfigBuilder {
            config: Self::default(),
        }
    }

    /// Defaults overlaid with the environment surface.
    ///
    /// Reads `MAX_RETRIES`, `RETRY_DELAY`, `GENERATION_TIMEOUT`,
    /// `CAPTION_TIMEOUT`, `MAX_DESCRIPTION_LENGTH`, `MAX_IMAGES` and
    /// `DOCUMENT_VERSION`. Unset or empty variables keep their default.
    pub fn from_env() -> Result<SynthesisConfig, SynthError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// [`SynthesisConfig::from_env`] with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<SynthesisConfig, SynthError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Self::builder();
        if let Some(v) = parse_var::<u32, _>(&lookup, "MAX_RETRIES")? {
            builder = builder.max_retries(v);
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "RETRY_DELAY")? {
            builder = builder.retry_delay_ms(v);
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "GENERATION_TIMEOUT")? {
            builder = builder.generation_timeout_ms(v);
        }
        if let Some(v) = parse_var::<u64, _>(&lookup, "CAPTION_TIMEOUT")? {
            builder = builder.caption_timeout_ms(v);
        }
        if let Some(v) = parse_var::<usize, _>(&lookup, "MAX_DESCRIPTION_LENGTH")? {
            builder = builder.max_description_length(v);
        }
        if let Some(v) = parse_var::<usize, _>(&lookup, "MAX_IMAGES")? {
            builder = builder.max_images(v);
        }
        if let Some(v) = lookup("DOCUMENT_VERSION").filter(|v| !v.trim().is_empty()) {
            builder = builder.document_version(v.trim());
        }
        builder.build()
    }

    /// Rebuild a builder from this config to tweak individual fields.
    pub fn to_builder(&self) -> SynthesisConfigBuilder {
        SynthesisConfigBuilder {
            config: self.clone(),
        }
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>, SynthError>
where
    T: FromStr,
    T::Err: fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| SynthError::InvalidConfig(format!("{key}='{raw}': {e}"))),
        _ => Ok(None),
    }
}

/// Builder for [`SynthesisConfig`].
pub struct SynthesisConfigBuilder {
    config: SynthesisConfig,
}

impl fmt::Debug for SynthesisConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SynthesisConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl SynthesisConfigBuilder {
    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_delay_ms(mut self, ms: u64) -> Self {
        self.config.retry_delay_ms = ms;
        self
    }

    pub fn generation_timeout_ms(mut self, ms: u64) -> Self {
        self.config.generation_timeout_ms = ms;
        self
    }

    pub fn caption_timeout_ms(mut self, ms: u64) -> Self {
        self.config.caption_timeout_ms = ms;
        self
    }

    pub fn max_description_length(mut self, n: usize) -> Self {
        self.config.max_description_length = n;
        self
    }

    pub fn max_images(mut self, n: usize) -> Self {
        self.config.max_images = n;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn document_version(mut self, version: impl Into<String>) -> Self {
        self.config.document_version = version.into();
        self
    }

    pub fn logo_bounds(mut self, bounds: FitBounds) -> Self {
        self.config.logo_bounds = bounds;
        self
    }

    pub fn figure_bounds(mut self, bounds: FitBounds) -> Self {
        self.config.figure_bounds = bounds;
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs;
        self
    }

    pub fn prompts(mut self, prompts: PromptSet) -> Self {
        self.config.prompts = prompts;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.config.generator = Some(generator);
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<SynthesisConfig, SynthError> {
        let c = &self.config;
        if c.max_retries == 0 {
            return Err(SynthError::InvalidConfig(
                "MAX_RETRIES must be ≥ 1 (it counts total attempts)".into(),
            ));
        }
        if c.generation_timeout_ms == 0 || c.caption_timeout_ms == 0 {
            return Err(SynthError::InvalidConfig(
                "Generation timeouts must be > 0 ms".into(),
            ));
        }
        if c.max_description_length < 3 {
            return Err(SynthError::InvalidConfig(format!(
                "MAX_DESCRIPTION_LENGTH must be ≥ 3, got {}",
                c.max_description_length
            )));
        }
        for (name, b) in [("logo", c.logo_bounds), ("figure", c.figure_bounds)] {
            if b.target_width == 0 || b.max_width == 0 || b.max_height == 0 {
                return Err(SynthError::InvalidConfig(format!(
                    "{name} bounds must be non-zero, got {b:?}"
                )));
            }
            if b.min_source_dimension > b.max_source_dimension {
                return Err(SynthError::InvalidConfig(format!(
                    "{name} source limits are inverted: {} > {}",
                    b.min_source_dimension, b.max_source_dimension
                )));
            }
        }
        Ok(self.config)
    }
}
