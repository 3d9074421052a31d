//! Value types flowing through the synthesis pipeline.
//!
//! Every type here is a plain value: no interior mutability, no shared
//! handles. A synthesis request builds them, the orchestrator merges them,
//! and the resulting [`DocumentModel`] is handed once to whatever serializer
//! the host application uses.

use serde::{Deserialize, Serialize};
use std::fmt;

// ── Category ─────────────────────────────────────────────────────────────

/// The closed change-type taxonomy.
///
/// Variant order is the merge/sort order. [`Category::DISPLAY_ORDER`] is the
/// subset that produces document sections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Feature,
    Bugfix,
    Performance,
    Enhancement,
    Security,
    Resource,
    KnownIssue,
    Deprecated,
}

impl Category {
    /// Every category, in merge order.
    pub const ALL: [Category; 8] = [
        Category::Feature,
        Category::Bugfix,
        Category::Performance,
        Category::Enhancement,
        Category::Security,
        Category::Resource,
        Category::KnownIssue,
        Category::Deprecated,
    ];

    /// Categories that get a section in the assembled document.
    ///
    /// `KnownIssue` and `Deprecated` are classified but have no section.
    pub const DISPLAY_ORDER: [Category; 6] = [
        Category::Feature,
        Category::Bugfix,
        Category::Performance,
        Category::Enhancement,
        Category::Security,
        Category::Resource,
    ];

    /// Tag used in annotated lines and fallback text, e.g. `known_issue`.
    pub fn tag(self) -> &'static str {
        match self {
            Category::Feature => "feature",
            Category::Bugfix => "bugfix",
            Category::Performance => "performance",
            Category::Enhancement => "enhancement",
            Category::Security => "security",
            Category::Resource => "resource",
            Category::KnownIssue => "known_issue",
            Category::Deprecated => "deprecated",
        }
    }

    /// Parse a canonical tag (case-insensitive).
    pub fn from_tag(tag: &str) -> Option<Category> {
        let tag = tag.trim().to_lowercase();
        Category::ALL.into_iter().find(|c| c.tag() == tag)
    }

    /// The tag with its first letter upper-cased: `Bugfix`, `Known_issue`.
    pub fn capitalized(self) -> String {
        let tag = self.tag();
        let mut chars = tag.chars();
        match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        }
    }

    /// Section heading rendered in the document.
    pub fn heading(self) -> &'static str {
        match self {
            Category::Feature => "Novas Funcionalidades",
            Category::Bugfix => "Correções",
            Category::Performance => "Melhorias de Performance",
            Category::Enhancement => "Aprimoramentos",
            Category::Security => "Segurança",
            Category::Resource => "Recursos",
            Category::KnownIssue => "Problemas Conhecidos",
            Category::Deprecated => "Descontinuado",
        }
    }

    /// Whether the assembler gives this category a section.
    pub fn is_rendered(self) -> bool {
        Category::DISPLAY_ORDER.contains(&self)
    }

    /// Position in [`Category::ALL`]; the merge sort key.
    pub fn rank(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

// ── Classification & generation values ───────────────────────────────────

/// One classified input line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub category: Category,
    /// Trimmed line with any leading `[tag]` removed. May be empty when the
    /// line consisted of a marker only.
    pub content: String,
}

/// Immutable input to the Resilient Generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub category: Category,
    pub content: String,
    pub title: String,
}

/// What one category's generation produced.
///
/// Both variants carry renderable text; a raw failure never crosses this
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationOutcome {
    Success { text: String },
    Fallback { text: String },
}

impl GenerationOutcome {
    pub fn text(&self) -> &str {
        match self {
            GenerationOutcome::Success { text } | GenerationOutcome::Fallback { text } => text,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, GenerationOutcome::Fallback { .. })
    }
}

/// One normalised output line annotated with its category.
///
/// `content: None` marks a structurally invalid line; the assembler renders
/// it as a visible placeholder bullet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedLine {
    pub category: Category,
    pub content: Option<String>,
}

impl TaggedLine {
    pub fn new(category: Category, content: impl Into<String>) -> Self {
        Self {
            category,
            content: Some(content.into()),
        }
    }

    /// A line whose content is missing.
    pub fn malformed(category: Category) -> Self {
        Self {
            category,
            content: None,
        }
    }

    /// Render as `[tag] content` for the merged content stream.
    pub fn annotate(&self) -> String {
        format!("[{}] {}", self.category.tag(), self.content.as_deref().unwrap_or(""))
    }

    /// Parse an annotated `[tag] content` line.
    ///
    /// Returns `None` when the line carries no canonical category tag. A
    /// recognised tag with nothing after it yields a malformed line.
    pub fn parse(line: &str) -> Option<TaggedLine> {
        let rest = line.trim_start().strip_prefix('[')?;
        let (tag, content) = rest.split_once(']')?;
        let category = Category::from_tag(tag)?;
        let content = content.trim();
        if content.is_empty() {
            Some(TaggedLine::malformed(category))
        } else {
            Some(TaggedLine::new(category, content))
        }
    }
}

// ── Images ───────────────────────────────────────────────────────────────

/// Image formats accepted as input and produced as output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Png,
    Jpeg,
    Gif,
    Webp,
}

impl ImageKind {
    pub fn mime_type(self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
            ImageKind::Gif => "image/gif",
            ImageKind::Webp => "image/webp",
        }
    }
}

/// An image re-encoded and scaled to fit a bounding box.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct FittedImage {
    #[serde(serialize_with = "serialize_base64")]
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Format of `bytes`.
    pub format: ImageKind,
    /// Format detected in the source before re-encoding.
    pub source_format: ImageKind,
}

impl fmt::Debug for FittedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FittedImage")
            .field("bytes", &format_args!("<{} bytes>", self.bytes.len()))
            .field("width", &self.width)
            .field("height", &self.height)
            .field("format", &self.format)
            .field("source_format", &self.source_format)
            .finish()
    }
}

fn serialize_base64<S: serde::Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    s.serialize_str(&STANDARD.encode(bytes))
}

// ── Document ─────────────────────────────────────────────────────────────

/// One key/value row of the metadata table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataRow {
    pub label: String,
    pub value: String,
}

/// A bullet in a category section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Bullet {
    Text(String),
    /// Content was missing or sanitised away.
    Placeholder,
}

impl Bullet {
    /// Visible marker used for [`Bullet::Placeholder`].
    pub const PLACEHOLDER_TEXT: &'static str = "⚠ [conteúdo inválido]";

    pub fn display_text(&self) -> &str {
        match self {
            Bullet::Text(t) => t,
            Bullet::Placeholder => Bullet::PLACEHOLDER_TEXT,
        }
    }
}

/// A rendered category section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Section {
    pub category: Category,
    pub heading: String,
    pub bullets: Vec<Bullet>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    #[default]
    Center,
    Left,
    Right,
}

/// Banner region at the top of the document. Empty when `logo` is `None`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Header {
    pub logo: Option<FittedImage>,
    pub alignment: Alignment,
}

/// A captioned image placed after the category sections.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Figure {
    pub caption: String,
    pub image: FittedImage,
}

/// The fully assembled, serializer-ready document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentModel {
    pub title: String,
    pub author: Option<String>,
    /// Localised release date (`dd/mm/yyyy`).
    pub date: String,
    pub version: String,
    pub header: Header,
    pub metadata: Vec<MetadataRow>,
    /// Sections in display order; categories without lines are absent.
    pub sections: Vec<Section>,
    pub figures: Vec<Figure>,
}

impl DocumentModel {
    pub fn logo(&self) -> Option<&FittedImage> {
        self.header.logo.as_ref()
    }

    pub fn section(&self, category: Category) -> Option<&Section> {
        self.sections.iter().find(|s| s.category == category)
    }
}

// ── Synthesis output ─────────────────────────────────────────────────────

/// Result of generating one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryResult {
    pub category: Category,
    pub outcome: GenerationOutcome,
    /// Attempts made against the provider (0 when it was never called).
    pub attempts: u32,
    pub duration_ms: u64,
    /// Normalised lines ready for assembly.
    pub lines: Vec<TaggedLine>,
}

/// Summary counters for one synthesis call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SynthesisStats {
    /// Non-blank input lines that were classified.
    pub classified_lines: usize,
    /// Distinct categories sent to the generator.
    pub categories: usize,
    /// Categories that ended in fallback text.
    pub fallbacks: usize,
    /// Output lines dropped because their category has no section.
    pub unrendered_lines: usize,
    pub figures: usize,
    pub truncated_description: bool,
    pub total_duration_ms: u64,
    pub generation_duration_ms: u64,
}

/// Everything a synthesis call produces.
#[derive(Debug, Clone, Serialize)]
pub struct SynthesisOutput {
    pub document: DocumentModel,
    /// The merged `[tag] line` stream fed to the assembler.
    pub content_stream: String,
    /// Per-category generation results, in merge order.
    pub categories: Vec<CategoryResult>,
    pub stats: SynthesisStats,
}
