//! Document assembly: tagged lines + metadata → [`DocumentModel`].
//!
//! Pure and deterministic for a fixed release date. Lines are grouped by
//! category into [`Category::DISPLAY_ORDER`], whatever order they arrive in;
//! within a category input order is kept. Categories with no lines get no
//! section. Lines for categories without a section (`known_issue`,
//! `deprecated`) are dropped.
//!
//! Each line is passed through [`sanitize_line`]. A line that is missing or
//! empty after sanitisation becomes a [`Bullet::Placeholder`] so the loss is
//! visible in the output rather than silent.

use crate::model::{
    Bullet, Category, DocumentModel, Figure, FittedImage, Header, MetadataRow, Section, TaggedLine,
};
use crate::pipeline::normalize::sanitize_line;
use chrono::NaiveDate;
use tracing::debug;

pub const VERSION_LABEL: &str = "Versão";
pub const DATE_LABEL: &str = "Data de Lançamento";
pub const AUTHOR_LABEL: &str = "Autor";

/// Cover metadata for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentMetadata {
    pub title: String,
    pub author: Option<String>,
    pub date: NaiveDate,
    pub version: String,
}

/// Localised (`dd/mm/yyyy`) release date.
pub fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Build the key/value table shown before the sections.
pub fn metadata_rows(metadata: &DocumentMetadata) -> Vec<MetadataRow> {
    let mut rows = vec![
        MetadataRow {
            label: VERSION_LABEL.to_string(),
            value: metadata.version.clone(),
        },
        MetadataRow {
            label: DATE_LABEL.to_string(),
            value: format_date(metadata.date),
        },
    ];
    if let Some(author) = metadata.author.as_deref().map(str::trim) {
        if !author.is_empty() {
            rows.push(MetadataRow {
                label: AUTHOR_LABEL.to_string(),
                value: author.to_string(),
            });
        }
    }
    rows
}

/// Turn one tagged line into a bullet.
pub fn bullet_for(line: &TaggedLine) -> Bullet {
    match line.content.as_deref() {
        Some(content) => {
            let clean = sanitize_line(content);
            let clean = clean.trim();
            if clean.is_empty() {
                Bullet::Placeholder
            } else {
                Bullet::Text(clean.to_string())
            }
        }
        None => Bullet::Placeholder,
    }
}

/// Assemble the document. Never fails.
pub fn assemble(
    lines: &[TaggedLine],
    metadata: &DocumentMetadata,
    logo: Option<FittedImage>,
    figures: Vec<Figure>,
) -> DocumentModel {
    let sections: Vec<Section> = Category::DISPLAY_ORDER
        .iter()
        .filter_map(|&category| {
            let bullets: Vec<Bullet> = lines
                .iter()
                .filter(|l| l.category == category)
                .map(bullet_for)
                .collect();
            if bullets.is_empty() {
                None
            } else {
                Some(Section {
                    category,
                    heading: category.heading().to_string(),
                    bullets,
                })
            }
        })
        .collect();

    let unrendered = lines.iter().filter(|l| !l.category.is_rendered()).count();
    if unrendered > 0 {
        debug!("{} lines have no section and were left out", unrendered);
    }

    let author = metadata
        .author
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string);

    DocumentModel {
        title: metadata.title.clone(),
        author,
        date: format_date(metadata.date),
        version: metadata.version.clone(),
        header: Header {
            logo,
            ..Header::default()
        },
        metadata: metadata_rows(metadata),
        sections,
        figures,
    }
}
