//! Markdown preview of an assembled document.
//!
//! Binary office formats are produced by whatever serializer the host
//! application plugs in; this is the human-readable view the CLI prints.

use crate::model::DocumentModel;
use std::fmt::Write;

/// Render `doc` as Markdown.
///
/// ```text
/// # <title>
///
/// _Logo: 120×60 px (png)_
///
/// | Campo | Valor |
/// |-------|-------|
/// | Versão | 1.0.0 |
///
/// ## Novas Funcionalidades
///
/// - ...
///
/// ## Figuras
///
/// 1. <caption> (480×270 px)
/// ```
pub fn to_markdown(doc: &DocumentModel) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# {}\n", doc.title.trim());

    if let Some(logo) = doc.logo() {
        let _ = writeln!(
            out,
            "_Logo: {}×{} px ({})_\n",
            logo.width,
            logo.height,
            logo.format.mime_type().trim_start_matches("image/")
        );
    }

    if !doc.metadata.is_empty() {
        out.push_str("| Campo | Valor |\n|-------|-------|\n");
        for row in &doc.metadata {
            let _ = writeln!(out, "| {} | {} |", escape_cell(&row.label), escape_cell(&row.value));
        }
        out.push('\n');
    }

    for section in &doc.sections {
        let _ = writeln!(out, "## {}\n", section.heading);
        for bullet in &section.bullets {
            let _ = writeln!(out, "- {}", bullet.display_text());
        }
        out.push('\n');
    }

    if !doc.figures.is_empty() {
        out.push_str("## Figuras\n\n");
        for (i, figure) in doc.figures.iter().enumerate() {
            let _ = writeln!(
                out,
                "{}. {} ({}×{} px)",
                i + 1,
                figure.caption,
                figure.image.width,
                figure.image.height
            );
        }
        out.push('\n');
    }

    let trimmed = out.trim_end().len();
    out.truncate(trimmed);
    out.push('\n');
    out
}

fn escape_cell(value: &str) -> String {
    value.replace('|', "\\|")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        Bullet, Category, Figure, FittedImage, Header, ImageKind, MetadataRow, Section,
    };

    fn image(width: u32, height: u32) -> FittedImage {
        FittedImage {
            bytes: vec![0],
            width,
            height,
            format: ImageKind::Png,
            source_format: ImageKind::Png,
        }
    }

    fn doc() -> DocumentModel {
        DocumentModel {
            title: "Release 3.1".into(),
            author: None,
            date: "07/03/2026".into(),
            version: "1.0.0".into(),
            header: Header::default(),
            metadata: vec![
                MetadataRow {
                    label: "Versão".into(),
                    value: "1.0.0".into(),
                },
                MetadataRow {
                    label: "Data de Lançamento".into(),
                    value: "07/03/2026".into(),
                },
            ],
            sections: vec![Section {
                category: Category::Bugfix,
                heading: Category::Bugfix.heading().into(),
                bullets: vec![Bullet::Text("Login corrigido".into()), Bullet::Placeholder],
            }],
            figures: vec![],
        }
    }

    #[test]
    fn renders_title_table_and_sections() {
        let md = to_markdown(&doc());
        assert!(md.starts_with("# Release 3.1\n\n| Campo | Valor |"));
        assert!(md.contains("| Versão | 1.0.0 |"));
        assert!(md.contains("## Correções\n\n- Login corrigido\n- ⚠ [conteúdo inválido]"));
        assert!(md.ends_with("inválido]\n"));
        assert!(!md.contains("Logo"));
    }

    #[test]
    fn renders_logo_and_figures() {
        let mut d = doc();
        d.header.logo = Some(image(120, 60));
        d.figures.push(Figure {
            caption: "Nova tela de login".into(),
            image: image(480, 270),
        });
        let md = to_markdown(&d);
        assert!(md.contains("_Logo: 120×60 px (png)_"));
        assert!(md.contains("## Figuras\n\n1. Nova tela de login (480×270 px)"));
    }

    #[test]
    fn pipes_in_cells_are_escaped() {
        let mut d = doc();
        d.metadata[0].value = "1.0|beta".into();
        assert!(to_markdown(&d).contains("| Versão | 1.0\\|beta |"));
    }
}
