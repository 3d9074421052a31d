//! Eager (full-document) synthesis entry points.
//!
//! [`synthesize`] waits for every category and figure, then returns the
//! assembled [`DocumentModel`] together with the merged content stream and
//! per-category results. Use [`crate::stream::synthesize_stream`] instead to
//! receive categories as they complete.
//!
//! The only fatal errors are configuration problems detected before any
//! network call: a category without a prompt template, or no provider. Every
//! provider or image failure degrades the document instead of aborting it.

use crate::config::{FitBounds, SynthesisConfig};
use crate::error::{ImageFitError, SynthError};
use crate::model::{
    Category, CategoryResult, DocumentModel, Entry, Figure, FittedImage, GenerationRequest,
    SynthesisOutput, SynthesisStats,
};
use crate::pipeline::assemble::{assemble, DocumentMetadata};
use crate::pipeline::classify::classify;
use crate::pipeline::generate::ResilientGenerator;
use crate::pipeline::image_fit::fit_image;
use crate::pipeline::input::{load_bytes, ImageSource};
use crate::pipeline::normalize::{postprocess_outcome, to_content_stream};
use crate::progress::ProgressCallback;
use crate::provider::resolve_generator;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// One release to synthesize.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SynthesisRequest {
    pub title: String,
    /// Free-form change description, one change per line.
    pub description: String,
    pub author: Option<String>,
    /// Release date; today (local time) when `None`.
    pub date: Option<NaiveDate>,
    pub logo: Option<ImageSource>,
    /// Figures in display order. Only the first `max_images` are used.
    pub images: Vec<ImageSource>,
}

impl SynthesisRequest {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Build from an optional description; `None` is treated as empty.
    pub fn from_optional(title: impl Into<String>, description: Option<String>) -> Self {
        Self::new(title, description.unwrap_or_default())
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn with_logo(mut self, logo: impl Into<ImageSource>) -> Self {
        self.logo = Some(logo.into());
        self
    }

    pub fn with_image(mut self, image: impl Into<ImageSource>) -> Self {
        self.images.push(image.into());
        self
    }
}

/// Synthesize a release-notes document.
///
/// # Errors
/// Returns `Err(SynthError)` only for fatal errors:
/// - a category present in the input has no prompt template (`ConfigError`),
///   reported before the provider is contacted
/// - no provider could be resolved
///
/// # Example
/// ```rust,no_run
/// use relnote_synth::{synthesize, SynthesisConfig, SynthesisRequest};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let request = SynthesisRequest::new(
///     "Release 2.4",
///     "[feature] Exportação em CSV\ncorrigido crash ao salvar",
/// );
/// let output = synthesize(&request, &SynthesisConfig::default()).await?;
/// for section in &output.document.sections {
///     println!("{}: {} bullets", section.heading, section.bullets.len());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn synthesize(
    request: &SynthesisRequest,
    config: &SynthesisConfig,
) -> Result<SynthesisOutput, SynthError> {
    let total_start = Instant::now();
    info!("Starting synthesis: {}", request.title);

    // ── Step 1: Classify and plan ────────────────────────────────────────
    let plan = plan(request, config)?;

    // ── Step 2: Get generator (only when something needs it) ─────────────
    let generator = if plan.requests.is_empty() && request.images.is_empty() {
        None
    } else {
        Some(Arc::new(ResilientGenerator::new(
            resolve_generator(config)?,
            config,
        )))
    };

    // ── Step 3: Generate each category ───────────────────────────────────
    let generation_start = Instant::now();
    let total_categories = plan.requests.len();
    if let Some(ref cb) = config.progress_callback {
        cb.on_synthesis_start(total_categories);
    }
    let categories = match generator {
        Some(ref generator) if total_categories > 0 => {
            generate_all(generator, plan.requests, config).await?
        }
        _ => Vec::new(),
    };
    let generation_duration_ms = generation_start.elapsed().as_millis() as u64;
    let fallbacks = categories.iter().filter(|c| c.outcome.is_fallback()).count();
    if let Some(ref cb) = config.progress_callback {
        cb.on_synthesis_complete(total_categories, fallbacks);
    }

    // ── Step 4: Merge into one content stream ────────────────────────────
    let lines: Vec<_> = categories.iter().flat_map(|c| c.lines.iter().cloned()).collect();
    let content_stream = to_content_stream(&lines);

    // ── Step 5: Logo ─────────────────────────────────────────────────────
    let logo = match request.logo {
        Some(ref source) => load_and_fit(source, config.logo_bounds, config)
            .await
            .map_err(|e| warn!("Logo {} dropped: {}", source.describe(), e))
            .ok(),
        None => None,
    };

    // ── Step 6: Figures ──────────────────────────────────────────────────
    let figures = match generator {
        Some(ref generator) => build_figures(generator, request, config).await,
        None => Vec::new(),
    };

    // ── Step 7: Assemble ─────────────────────────────────────────────────
    let metadata = DocumentMetadata {
        title: request.title.clone(),
        author: request.author.clone(),
        date: request
            .date
            .unwrap_or_else(|| chrono::Local::now().date_naive()),
        version: config.document_version.clone(),
    };
    let figure_count = figures.len();
    let document: DocumentModel = assemble(&lines, &metadata, logo, figures);

    let stats = SynthesisStats {
        classified_lines: plan.classified_lines,
        categories: total_categories,
        fallbacks,
        unrendered_lines: lines.iter().filter(|l| !l.category.is_rendered()).count(),
        figures: figure_count,
        truncated_description: plan.truncated,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        generation_duration_ms,
    };

    info!(
        "Synthesis complete: {} categories ({} fallback), {} sections, {}ms total",
        stats.categories,
        stats.fallbacks,
        document.sections.len(),
        stats.total_duration_ms
    );

    Ok(SynthesisOutput {
        document,
        content_stream,
        categories,
        stats,
    })
}

/// Synthesize and write the output as pretty-printed JSON.
///
/// Uses atomic write (temp file in the target directory + rename) so a
/// reader never sees a partial file.
pub async fn synthesize_to_file(
    request: &SynthesisRequest,
    output_path: impl AsRef<Path>,
    config: &SynthesisConfig,
) -> Result<SynthesisStats, SynthError> {
    let output = synthesize(request, config).await?;
    write_output(&output, output_path).await?;
    Ok(output.stats)
}

/// Write `output` as pretty-printed JSON, atomically.
pub async fn write_output(
    output: &SynthesisOutput,
    output_path: impl AsRef<Path>,
) -> Result<(), SynthError> {
    let json = serde_json::to_vec_pretty(output)
        .map_err(|e| SynthError::Internal(format!("JSON serialisation failed: {e}")))?;
    write_atomic(output_path.as_ref(), &json).await
}

/// Synchronous wrapper around [`synthesize`].
///
/// Creates a temporary tokio runtime internally.
pub fn synthesize_sync(
    request: &SynthesisRequest,
    config: &SynthesisConfig,
) -> Result<SynthesisOutput, SynthError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| SynthError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(synthesize(request, config))
}

/// Cut `description` to at most `max_chars` characters, ending in `...`.
///
/// Returns the (possibly) shortened text and whether it was cut.
pub fn truncate_description(description: &str, max_chars: usize) -> (String, bool) {
    if description.chars().count() <= max_chars {
        return (description.to_string(), false);
    }
    let keep = max_chars.saturating_sub(3);
    let mut cut: String = description.chars().take(keep).collect();
    cut.push_str("...");
    (cut, true)
}

/// Group entries by category in first-appearance order.
///
/// Contents of one category are joined with newlines.
pub fn group_entries(entries: &[Entry]) -> Vec<(Category, String)> {
    let mut groups: Vec<(Category, Vec<&str>)> = Vec::new();
    for entry in entries {
        match groups.iter_mut().find(|(c, _)| *c == entry.category) {
            Some((_, contents)) => contents.push(&entry.content),
            None => groups.push((entry.category, vec![&entry.content])),
        }
    }
    groups
        .into_iter()
        .map(|(category, contents)| (category, contents.join("\n")))
        .collect()
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Classification result ready for generation.
pub(crate) struct Plan {
    pub requests: Vec<GenerationRequest>,
    pub classified_lines: usize,
    pub truncated: bool,
}

/// Truncate, classify, group, and check that every category has a template.
pub(crate) fn plan(request: &SynthesisRequest, config: &SynthesisConfig) -> Result<Plan, SynthError> {
    let (description, truncated) =
        truncate_description(&request.description, config.max_description_length);
    if truncated {
        warn!(
            "Description truncated to {} characters",
            config.max_description_length
        );
    }

    let entries = classify(&description);
    let requests: Vec<GenerationRequest> = group_entries(&entries)
        .into_iter()
        .map(|(category, content)| GenerationRequest {
            category,
            content,
            title: request.title.clone(),
        })
        .collect();

    if let Some(missing) = requests
        .iter()
        .find(|r| config.prompts.get(r.category).is_none())
    {
        return Err(SynthError::ConfigError {
            category: missing.category,
            message: "no prompt template registered for this category".to_string(),
        });
    }

    debug!(
        "Classified {} lines into {} categories",
        entries.len(),
        requests.len()
    );

    Ok(Plan {
        requests,
        classified_lines: entries.len(),
        truncated,
    })
}

/// Generate, normalise and report one category.
pub(crate) async fn generate_category(
    generator: &ResilientGenerator,
    request: GenerationRequest,
    callback: Option<ProgressCallback>,
) -> Result<CategoryResult, SynthError> {
    if let Some(ref cb) = callback {
        cb.on_category_start(request.category);
    }
    let report = generator.generate_with_report(&request).await?;
    let lines = postprocess_outcome(request.category, report.outcome.text());
    if let Some(ref cb) = callback {
        cb.on_category_complete(request.category, lines.len(), report.outcome.is_fallback());
    }
    Ok(CategoryResult {
        category: request.category,
        outcome: report.outcome,
        attempts: report.attempts,
        duration_ms: report.duration_ms,
        lines,
    })
}

/// Generate every category with bounded concurrency, then sort into merge order.
async fn generate_all(
    generator: &Arc<ResilientGenerator>,
    requests: Vec<GenerationRequest>,
    config: &SynthesisConfig,
) -> Result<Vec<CategoryResult>, SynthError> {
    let results: Vec<Result<CategoryResult, SynthError>> =
        stream::iter(requests.into_iter().map(|request| {
            let generator = Arc::clone(generator);
            let callback = config.progress_callback.clone();
            async move { generate_category(&generator, request, callback).await }
        }))
        .buffer_unordered(config.concurrency.max(1))
        .collect()
        .await;

    let mut categories = results.into_iter().collect::<Result<Vec<_>, _>>()?;
    categories.sort_by_key(|c| c.category.rank());
    Ok(categories)
}

/// Fit and caption up to `max_images` figures, in input order.
async fn build_figures(
    generator: &ResilientGenerator,
    request: &SynthesisRequest,
    config: &SynthesisConfig,
) -> Vec<Figure> {
    if request.images.len() > config.max_images {
        warn!(
            "{} images supplied, only the first {} are used",
            request.images.len(),
            config.max_images
        );
    }

    let mut figures = Vec::new();
    for source in request.images.iter().take(config.max_images) {
        let image = match load_and_fit(source, config.figure_bounds, config).await {
            Ok(image) => image,
            Err(e) => {
                warn!("Figure {} dropped: {}", source.describe(), e);
                continue;
            }
        };
        let number = figures.len() + 1;
        let report = generator.caption(&request.title, number, &image).await;
        figures.push(Figure {
            caption: report.outcome.text().to_string(),
            image,
        });
    }
    figures
}

/// Load an image source and fit it on the blocking pool.
async fn load_and_fit(
    source: &ImageSource,
    bounds: FitBounds,
    config: &SynthesisConfig,
) -> Result<FittedImage, ImageFitError> {
    let bytes = load_bytes(source, config.download_timeout_secs).await?;
    tokio::task::spawn_blocking(move || fit_image(&bytes, &bounds))
        .await
        .map_err(|e| ImageFitError::DecodeError(format!("image task failed: {e}")))?
}

async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), SynthError> {
    let path = path.to_path_buf();
    let contents = contents.to_vec();
    tokio::task::spawn_blocking(move || {
        let write_failed = |source: std::io::Error| SynthError::OutputWriteFailed {
            path: path.clone(),
            source,
        };
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => std::path::PathBuf::from("."),
        };
        std::fs::create_dir_all(&parent).map_err(write_failed)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_failed)?;
        tmp.write_all(&contents).map_err(write_failed)?;
        tmp.persist(&path).map_err(|e| write_failed(e.error))?;
        Ok(())
    })
    .await
    .map_err(|e| SynthError::Internal(format!("write task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompts::PromptSet;

    #[test]
    fn short_description_is_untouched() {
        assert_eq!(truncate_description("abc", 5), ("abc".to_string(), false));
        assert_eq!(truncate_description("abcde", 5), ("abcde".to_string(), false));
    }

    #[test]
    fn long_description_ends_with_ellipsis() {
        let (cut, truncated) = truncate_description("ãéíõúçabc", 6);
        assert!(truncated);
        assert_eq!(cut, "ãéí...");
        assert_eq!(cut.chars().count(), 6);
    }

    #[test]
    fn grouping_keeps_first_appearance_order() {
        let entries = vec![
            Entry {
                category: Category::Security,
                content: "a".into(),
            },
            Entry {
                category: Category::Feature,
                content: "b".into(),
            },
            Entry {
                category: Category::Security,
                content: "c".into(),
            },
        ];
        assert_eq!(
            group_entries(&entries),
            vec![
                (Category::Security, "a\nc".to_string()),
                (Category::Feature, "b".to_string())
            ]
        );
    }

    #[test]
    fn plan_rejects_missing_template_before_any_call() {
        let config = SynthesisConfig::builder()
            .prompts(PromptSet::default().without(Category::Bugfix))
            .build()
            .unwrap();
        let request = SynthesisRequest::new("R", "[bugfix] login travava");
        match plan(&request, &config) {
            Err(SynthError::ConfigError { category, .. }) => assert_eq!(category, Category::Bugfix),
            other => panic!("expected ConfigError, got {:?}", other.map(|p| p.requests)),
        }
    }

    #[test]
    fn plan_ignores_missing_template_for_absent_category() {
        let config = SynthesisConfig::builder()
            .prompts(PromptSet::default().without(Category::Security))
            .build()
            .unwrap();
        let request = SynthesisRequest::new("R", "[feature] Exportação\n\n   \n");
        let plan = plan(&request, &config).unwrap();
        assert_eq!(plan.classified_lines, 1);
        assert_eq!(plan.requests.len(), 1);
        assert!(!plan.truncated);
    }

    #[test]
    fn null_description_is_empty() {
        let request = SynthesisRequest::from_optional("R", None);
        let plan = plan(&request, &SynthesisConfig::default()).unwrap();
        assert!(plan.requests.is_empty());
    }

    #[tokio::test]
    async fn empty_description_needs_no_provider() {
        let request = SynthesisRequest::new("Release vazia", "")
            .with_date(NaiveDate::from_ymd_opt(2026, 1, 2).unwrap());
        let config = SynthesisConfig::builder()
            .provider_name("no-such-provider")
            .build()
            .unwrap();
        let output = synthesize(&request, &config).await.unwrap();
        assert!(output.document.sections.is_empty());
        assert_eq!(output.document.date, "02/01/2026");
        assert_eq!(output.content_stream, "");
    }

    #[tokio::test]
    async fn write_atomic_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out.json");
        write_atomic(&path, b"{}").await.unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
    }
}
