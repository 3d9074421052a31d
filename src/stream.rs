//! Streaming synthesis API: emit categories as they complete.
//!
//! Unlike the eager [`crate::synthesize::synthesize`], which returns only
//! after every category and figure is done, [`synthesize_stream`] yields one
//! [`CategoryResult`] per category via a `Stream` as soon as its text is
//! final. With `concurrency > 1` categories arrive in completion order; sort
//! by [`crate::Category::rank`] if order matters.
//!
//! Progress callbacks fire as on the eager path: `on_synthesis_complete`
//! runs after the last item, so a caller that stops polling early never
//! sees it.
//!
//! The stream covers generation only. Logo, figures and assembly are left to
//! the caller (see [`crate::pipeline::assemble::assemble`]).

use crate::config::SynthesisConfig;
use crate::error::SynthError;
use crate::model::CategoryResult;
use crate::pipeline::generate::ResilientGenerator;
use crate::provider::resolve_generator;
use crate::synthesize::{generate_category, plan, SynthesisRequest};
use futures::stream::{self, StreamExt};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio_stream::Stream;
use tracing::{error, info};

/// A boxed stream of per-category results.
pub type CategoryStream = Pin<Box<dyn Stream<Item = CategoryResult> + Send>>;

/// Synthesize category by category, streaming results as they are ready.
///
/// # Returns
/// - `Ok(CategoryStream)` — one item per distinct category in the input
/// - `Err(SynthError)` — a missing template or provider, reported before
///   the stream is created and before any network call
///
/// # Example
/// ```rust,no_run
/// use relnote_synth::{synthesize_stream, SynthesisConfig, SynthesisRequest};
/// use futures::StreamExt;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let request = SynthesisRequest::new("Release 2.4", "nova tela de login\nbug no export");
/// let mut stream = synthesize_stream(&request, &SynthesisConfig::default()).await?;
/// while let Some(result) = stream.next().await {
///     println!("{}: {} lines", result.category, result.lines.len());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn synthesize_stream(
    request: &SynthesisRequest,
    config: &SynthesisConfig,
) -> Result<CategoryStream, SynthError> {
    info!("Starting streaming synthesis: {}", request.title);

    let plan = plan(request, config)?;
    let total = plan.requests.len();
    let generator = match total {
        0 => None,
        _ => Some(Arc::new(ResilientGenerator::new(resolve_generator(config)?, config))),
    };
    let callback = config.progress_callback.clone();
    if let Some(ref cb) = callback {
        cb.on_synthesis_start(total);
    }
    let Some(generator) = generator else {
        if let Some(ref cb) = callback {
            cb.on_synthesis_complete(0, 0);
        }
        return Ok(Box::pin(stream::empty()));
    };
    let fallbacks = Arc::new(AtomicUsize::new(0));

    let category_callback = callback.clone();
    let counter = Arc::clone(&fallbacks);
    let categories = stream::iter(plan.requests.into_iter().map(move |request| {
        let generator = Arc::clone(&generator);
        let callback = category_callback.clone();
        async move { generate_category(&generator, request, callback).await }
    }))
    .buffer_unordered(config.concurrency.max(1))
    .filter_map(move |result| {
        let counter = Arc::clone(&counter);
        async move {
            match result {
                Ok(category) => {
                    if category.outcome.is_fallback() {
                        counter.fetch_add(1, Ordering::SeqCst);
                    }
                    Some(category)
                }
                // Templates were checked up front; a miss here is a bug.
                Err(e) => {
                    error!("Category generation aborted: {}", e);
                    None
                }
            }
        }
    });

    // Runs once the last category has been yielded.
    let finish = stream::once(async move {
        let fallbacks = fallbacks.load(Ordering::SeqCst);
        if let Some(cb) = callback {
            cb.on_synthesis_complete(total, fallbacks);
        }
        info!("Streaming synthesis complete: {} categories ({} fallback)", total, fallbacks);
    })
    .filter_map(|()| async { None::<CategoryResult> });

    Ok(Box::pin(categories.chain(finish)))
}
