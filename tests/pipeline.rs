//! Integration tests for the synthesis pipeline.
//!
//! No network: every test plugs a scripted in-memory `TextGenerator` into the
//! config. Tests that assert on retry delays or timeouts run on a paused
//! tokio clock (`start_paused = true`), so the 2 s delays and 30 s timeouts
//! of the default config elapse instantly and deterministically.
//!
//! Run with:
//!   cargo test --test pipeline

use async_trait::async_trait;
use chrono::NaiveDate;
use futures::StreamExt;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use relnote_synth::{
    synthesize, synthesize_stream, synthesize_to_file, Bullet, Category, GenerationError,
    GenerationOutcome, GenerationParams, GenerationRequest, PromptSet, ResilientGenerator,
    SynthError, SynthesisConfig, SynthesisProgressCallback, SynthesisRequest, TextGenerator,
};
use std::collections::VecDeque;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::time::{Duration, Instant};
use tokio_test::assert_ok;

// ── Test helpers ─────────────────────────────────────────────────────────────

/// One scripted response.
#[derive(Clone)]
enum Step {
    Reply(&'static str),
    Fail,
    Hang,
}

/// Plays back a fixed script, then repeats the last step forever.
struct Scripted {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl Scripted {
    fn new(steps: &[Step]) -> Arc<Self> {
        Arc::new(Self {
            steps: Mutex::new(steps.iter().cloned().collect()),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TextGenerator for Scripted {
    async fn generate(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        _params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(user_prompt.to_string());
        let step = {
            let mut steps = self.steps.lock().unwrap();
            if steps.len() > 1 {
                steps.pop_front().unwrap()
            } else {
                steps.front().cloned().unwrap_or(Step::Fail)
            }
        };
        match step {
            Step::Reply(text) => Ok(text.to_string()),
            Step::Fail => Err(GenerationError::Provider("503 Service Unavailable".into())),
            Step::Hang => std::future::pending().await,
        }
    }
}

/// Rewrites the content block of the prompt as bullet lines, echoing a tag
/// the way real models do. Captions answer with a fixed sentence.
struct Rewriter {
    /// Per-call latency derived from the content length.
    jitter: bool,
}

#[async_trait]
impl TextGenerator for Rewriter {
    async fn generate(
        &self,
        _system_prompt: &str,
        user_prompt: &str,
        params: &GenerationParams,
    ) -> Result<String, GenerationError> {
        if !params.images.is_empty() {
            return Ok("\"Tela principal do painel\"\nextra line".to_string());
        }
        let content = user_prompt.rsplit("\n\n").next().unwrap_or_default();
        if self.jitter {
            let ms = 1000 - (content.len() as u64 * 37) % 900;
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
        Ok(content
            .lines()
            .map(|l| format!("- [x] {} (revisado)", l.trim()))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

fn config_with(generator: Arc<dyn TextGenerator>) -> SynthesisConfig {
    SynthesisConfig::builder().generator(generator).build().unwrap()
}

fn release_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 7).unwrap()
}

fn png(w: u32, h: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(w, h, Rgba([10, 120, 200, 255])));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    buf
}

fn request(category: Category, content: &str) -> GenerationRequest {
    GenerationRequest {
        category,
        content: content.to_string(),
        title: "Release 2.4".to_string(),
    }
}

const DESCRIPTION: &str = "\
[security] Tokens de sessão rotacionados
Nova exportação em CSV
corrigido crash ao salvar rascunho

[performance] Busca 2x mais rápida
[problema] Exportação lenta no Safari";

// ── Resilient generator ──────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn succeeds_on_third_attempt_after_two_delays() {
    let scripted = Scripted::new(&[Step::Fail, Step::Fail, Step::Reply("Login corrigido")]);
    let config = config_with(scripted.clone());
    let generator = ResilientGenerator::new(scripted.clone(), &config);

    let start = Instant::now();
    let report = assert_ok!(
        generator
            .generate_with_report(&request(Category::Bugfix, "login travava"))
            .await
    );
    let elapsed = start.elapsed();

    assert_eq!(
        report.outcome,
        GenerationOutcome::Success {
            text: "Login corrigido".into()
        }
    );
    assert_eq!(report.attempts, 3);
    assert_eq!(scripted.calls(), 3);
    let two_delays = Duration::from_millis(2 * config.retry_delay_ms);
    assert!(elapsed >= two_delays, "elapsed {elapsed:?}");
    assert!(elapsed < two_delays + Duration::from_millis(50), "elapsed {elapsed:?}");
}

#[tokio::test(start_paused = true)]
async fn always_failing_service_falls_back_to_input() {
    let scripted = Scripted::new(&[Step::Fail]);
    let config = config_with(scripted.clone());
    let generator = ResilientGenerator::new(scripted.clone(), &config);

    let outcome = assert_ok!(
        generator
            .generate(&request(Category::Bugfix, "login travava\nexport quebrado"))
            .await
    );

    assert!(outcome.is_fallback());
    assert!(outcome.text().contains("[bugfix]"));
    assert!(outcome.text().contains("login travava\nexport quebrado"));
    assert_eq!(scripted.calls(), config.max_retries as usize);
}

#[tokio::test(start_paused = true)]
async fn hanging_service_is_cut_off_by_the_timeout() {
    let scripted = Scripted::new(&[Step::Hang]);
    let config = SynthesisConfig::builder()
        .generator(scripted.clone())
        .max_retries(2)
        .retry_delay_ms(500)
        .generation_timeout_ms(1000)
        .build()
        .unwrap();
    let generator = ResilientGenerator::new(scripted.clone(), &config);

    let start = Instant::now();
    let report = assert_ok!(
        generator
            .generate_with_report(&request(Category::Feature, "exportação"))
            .await
    );

    assert!(report.outcome.is_fallback());
    assert_eq!(report.attempts, 2);
    assert!(matches!(
        report.last_error,
        Some(GenerationError::Timeout { elapsed_ms: 1000 })
    ));
    // timeout + delay + timeout
    assert_eq!(start.elapsed().as_millis() / 100, 25);
}

#[tokio::test(start_paused = true)]
async fn blank_reply_counts_as_a_failed_attempt() {
    let scripted = Scripted::new(&[Step::Reply("   \n "), Step::Reply("Pronto")]);
    let config = config_with(scripted.clone());
    let generator = ResilientGenerator::new(scripted.clone(), &config);

    let report = assert_ok!(
        generator
            .generate_with_report(&request(Category::Feature, "x"))
            .await
    );
    assert_eq!(report.attempts, 2);
    assert_eq!(report.outcome.text(), "Pronto");
}

#[tokio::test]
async fn missing_template_is_a_config_error() {
    let scripted = Scripted::new(&[Step::Reply("ok")]);
    let config = SynthesisConfig::builder()
        .generator(scripted.clone())
        .prompts(PromptSet::default().without(Category::Bugfix))
        .build()
        .unwrap();
    let generator = ResilientGenerator::new(scripted.clone(), &config);

    let err = generator
        .generate(&request(Category::Bugfix, "login"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        SynthError::ConfigError {
            category: Category::Bugfix,
            ..
        }
    ));
    assert_eq!(err.to_report().kind, "ConfigError");
    assert_eq!(scripted.calls(), 0);
}

#[tokio::test]
async fn empty_content_is_sent_as_placeholder() {
    let scripted = Scripted::new(&[Step::Reply("Sem alterações")]);
    let config = config_with(scripted.clone());
    let generator = ResilientGenerator::new(scripted.clone(), &config);

    let outcome = assert_ok!(generator.generate(&request(Category::Feature, "")).await);
    assert_eq!(outcome.text(), "Sem alterações");
    let prompts = scripted.prompts.lock().unwrap();
    assert!(prompts[0].contains("(vazio)"));
}

// ── End-to-end synthesis ─────────────────────────────────────────────────────

#[tokio::test]
async fn sections_follow_display_order() {
    let config = config_with(Arc::new(Rewriter { jitter: false }));
    let req = SynthesisRequest::new("Release 2.4", DESCRIPTION)
        .with_author("Equipe Core")
        .with_date(release_date());

    let output = assert_ok!(synthesize(&req, &config).await);
    let doc = &output.document;

    let order: Vec<Category> = doc.sections.iter().map(|s| s.category).collect();
    assert_eq!(
        order,
        vec![
            Category::Feature,
            Category::Bugfix,
            Category::Performance,
            Category::Security
        ]
    );
    assert_eq!(
        doc.section(Category::Bugfix).unwrap().bullets,
        vec![Bullet::Text("corrigido crash ao salvar rascunho (revisado)".into())]
    );
    assert_eq!(doc.date, "07/03/2026");
    assert_eq!(doc.metadata.len(), 3);

    // known_issue is generated but has no section
    assert_eq!(output.stats.categories, 5);
    assert_eq!(output.stats.unrendered_lines, 1);
    assert_eq!(output.stats.classified_lines, 5);
    assert!(output
        .content_stream
        .contains("[known_issue] Exportação lenta no Safari (revisado)"));
    assert!(output
        .content_stream
        .starts_with("[feature] Nova exportação em CSV (revisado)"));
}

#[tokio::test]
async fn same_input_same_document() {
    let config = config_with(Arc::new(Rewriter { jitter: false }));
    let req = SynthesisRequest::new("Release 2.4", DESCRIPTION).with_date(release_date());

    let a = assert_ok!(synthesize(&req, &config).await);
    let b = assert_ok!(synthesize(&req, &config).await);
    assert_eq!(a.document, b.document);
    assert_eq!(a.content_stream, b.content_stream);
}

#[tokio::test(start_paused = true)]
async fn concurrent_generation_merges_deterministically() {
    let req = SynthesisRequest::new("Release 2.4", DESCRIPTION).with_date(release_date());

    let sequential = SynthesisConfig::builder()
        .generator(Arc::new(Rewriter { jitter: true }))
        .build()
        .unwrap();
    let concurrent = sequential.to_builder().concurrency(4).build().unwrap();

    let a = assert_ok!(synthesize(&req, &sequential).await);
    let b = assert_ok!(synthesize(&req, &concurrent).await);

    assert_eq!(a.content_stream, b.content_stream);
    assert_eq!(a.document, b.document);
    let ranks: Vec<usize> = b.categories.iter().map(|c| c.category.rank()).collect();
    let mut sorted = ranks.clone();
    sorted.sort_unstable();
    assert_eq!(ranks, sorted);
}

#[tokio::test(start_paused = true)]
async fn failing_provider_still_produces_a_document() {
    let scripted = Scripted::new(&[Step::Fail]);
    let config = config_with(scripted.clone());
    let req = SynthesisRequest::new("Release 2.4", "[bug] login travava").with_date(release_date());

    let output = assert_ok!(synthesize(&req, &config).await);
    assert_eq!(output.stats.fallbacks, 1);
    assert_eq!(
        output.document.section(Category::Bugfix).unwrap().bullets,
        vec![
            Bullet::Text("Bugfix".into()),
            Bullet::Text("login travava".into())
        ]
    );
}

#[tokio::test]
async fn missing_template_aborts_before_any_call() {
    let scripted = Scripted::new(&[Step::Reply("ok")]);
    let config = SynthesisConfig::builder()
        .generator(scripted.clone())
        .prompts(PromptSet::default().without(Category::Security))
        .build()
        .unwrap();
    let req = SynthesisRequest::new("Release 2.4", DESCRIPTION);

    let err = synthesize(&req, &config).await.unwrap_err();
    assert!(matches!(
        err,
        SynthError::ConfigError {
            category: Category::Security,
            ..
        }
    ));
    assert_eq!(scripted.calls(), 0);
}

#[tokio::test]
async fn marker_only_line_is_generated_with_empty_content() {
    let scripted = Scripted::new(&[Step::Reply("Ajustes gerais")]);
    let config = config_with(scripted.clone());
    let req = SynthesisRequest::new("Release 2.4", "[feature]").with_date(release_date());

    let output = assert_ok!(synthesize(&req, &config).await);
    assert_eq!(output.content_stream, "[feature] Ajustes gerais");
    assert!(scripted.prompts.lock().unwrap()[0].contains("(vazio)"));
}

#[tokio::test]
async fn long_description_is_truncated() {
    let scripted = Scripted::new(&[Step::Reply("ok")]);
    let config = SynthesisConfig::builder()
        .generator(scripted.clone())
        .max_description_length(20)
        .build()
        .unwrap();
    let req = SynthesisRequest::new("R", "nova tela de login com SSO e MFA");

    let output = assert_ok!(synthesize(&req, &config).await);
    assert!(output.stats.truncated_description);
    let prompts = scripted.prompts.lock().unwrap();
    assert!(prompts[0].ends_with("nova tela de logi..."));
}

// ── Images ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn logo_is_fitted_into_the_header() {
    let config = config_with(Arc::new(Rewriter { jitter: false }));
    let req = SynthesisRequest::new("R", "nova tela")
        .with_date(release_date())
        .with_logo(png(400, 200));

    let output = assert_ok!(synthesize(&req, &config).await);
    let logo = output.document.logo().unwrap();
    assert_eq!((logo.width, logo.height), (120, 60));
}

#[tokio::test]
async fn broken_logo_leaves_header_empty() {
    let config = config_with(Arc::new(Rewriter { jitter: false }));
    let req = SynthesisRequest::new("R", "nova tela")
        .with_date(release_date())
        .with_logo(b"not an image".to_vec());

    let output = assert_ok!(synthesize(&req, &config).await);
    assert!(output.document.header.logo.is_none());
    assert_eq!(output.document.sections.len(), 1);
}

#[tokio::test]
async fn figures_are_captioned_in_input_order() {
    let config = SynthesisConfig::builder()
        .generator(Arc::new(Rewriter { jitter: false }))
        .max_images(2)
        .build()
        .unwrap();
    let req = SynthesisRequest::new("R", "nova tela")
        .with_date(release_date())
        .with_image(png(960, 540))
        .with_image(b"garbage".to_vec())
        .with_image(png(100, 100));

    let output = assert_ok!(synthesize(&req, &config).await);
    let figures = &output.document.figures;
    // the third image is beyond max_images; the second is unreadable
    assert_eq!(figures.len(), 1);
    assert_eq!(figures[0].caption, "Tela principal do painel");
    assert_eq!((figures[0].image.width, figures[0].image.height), (480, 270));
}

#[tokio::test(start_paused = true)]
async fn caption_failure_uses_numbered_fallback() {
    let scripted = Scripted::new(&[Step::Fail]);
    let config = config_with(scripted.clone());
    let req = SynthesisRequest::new("R", "")
        .with_date(release_date())
        .with_image(png(50, 50));

    let output = assert_ok!(synthesize(&req, &config).await);
    assert_eq!(output.document.figures[0].caption, "Figura 1");
    assert!(output.document.sections.is_empty());
}

// ── Streaming, progress, file output ─────────────────────────────────────────

#[tokio::test]
async fn stream_yields_one_result_per_category() {
    let config = config_with(Arc::new(Rewriter { jitter: false }));
    let req = SynthesisRequest::new("Release 2.4", DESCRIPTION);

    let stream = assert_ok!(synthesize_stream(&req, &config).await);
    let mut results: Vec<_> = stream.collect().await;
    results.sort_by_key(|r| r.category.rank());

    let categories: Vec<Category> = results.iter().map(|r| r.category).collect();
    assert_eq!(
        categories,
        vec![
            Category::Feature,
            Category::Bugfix,
            Category::Performance,
            Category::Security,
            Category::KnownIssue
        ]
    );
    assert!(results.iter().all(|r| !r.outcome.is_fallback()));
}

#[derive(Default)]
struct Recorder {
    started: AtomicUsize,
    completed: AtomicUsize,
    fallbacks: AtomicUsize,
    finished: Mutex<Vec<(usize, usize)>>,
}

impl SynthesisProgressCallback for Recorder {
    fn on_synthesis_start(&self, total_categories: usize) {
        self.started.store(total_categories, Ordering::SeqCst);
    }

    fn on_category_complete(&self, _category: Category, _lines: usize, fell_back: bool) {
        self.completed.fetch_add(1, Ordering::SeqCst);
        if fell_back {
            self.fallbacks.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn on_synthesis_complete(&self, total_categories: usize, fallbacks: usize) {
        self.finished
            .lock()
            .unwrap()
            .push((total_categories, fallbacks));
    }
}

#[tokio::test(start_paused = true)]
async fn progress_events_cover_every_category() {
    let recorder = Arc::new(Recorder::default());
    let config = SynthesisConfig::builder()
        .generator(Scripted::new(&[Step::Fail]))
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let req = SynthesisRequest::new("R", "[bug] a\n[feature] b");

    assert_ok!(synthesize(&req, &config).await);
    assert_eq!(recorder.started.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.fallbacks.load(Ordering::SeqCst), 2);
    assert_eq!(*recorder.finished.lock().unwrap(), vec![(2, 2)]);
}

#[tokio::test(start_paused = true)]
async fn stream_fires_completion_after_last_category() {
    let recorder = Arc::new(Recorder::default());
    let config = SynthesisConfig::builder()
        .generator(Scripted::new(&[Step::Reply("Linha ok"), Step::Fail]))
        .max_retries(1)
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let req = SynthesisRequest::new("R", "[bug] a\n[feature] b");

    let stream = assert_ok!(synthesize_stream(&req, &config).await);
    let results: Vec<_> = stream.collect().await;

    assert_eq!(results.len(), 2);
    assert_eq!(recorder.started.load(Ordering::SeqCst), 2);
    assert_eq!(recorder.completed.load(Ordering::SeqCst), 2);
    assert_eq!(*recorder.finished.lock().unwrap(), vec![(2, 1)]);
}

#[tokio::test]
async fn empty_stream_still_reports_start_and_completion() {
    let recorder = Arc::new(Recorder::default());
    let config = SynthesisConfig::builder()
        .provider_name("no-such-provider")
        .progress_callback(recorder.clone())
        .build()
        .unwrap();
    let req = SynthesisRequest::new("R", "   \n\n");

    let stream = assert_ok!(synthesize_stream(&req, &config).await);
    let results: Vec<_> = stream.collect().await;

    assert!(results.is_empty());
    assert_eq!(*recorder.finished.lock().unwrap(), vec![(0, 0)]);
}

#[tokio::test]
async fn synthesize_to_file_writes_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out/release.json");
    let config = config_with(Arc::new(Rewriter { jitter: false }));
    let req = SynthesisRequest::new("Release 2.4", DESCRIPTION).with_date(release_date());

    let stats = assert_ok!(synthesize_to_file(&req, &path, &config).await);
    assert_eq!(stats.categories, 5);

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["document"]["title"], "Release 2.4");
    assert_eq!(json["document"]["sections"][0]["heading"], "Novas Funcionalidades");
    assert_eq!(json["categories"][0]["outcome"]["status"], "success");
}
