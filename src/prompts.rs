//! Prompt templates for category rewriting and figure captions.
//!
//! Every category has its own system/user pair so the model can be told
//! what kind of change it is looking at. User templates carry `{TITLE}` and
//! `{CONTENT}` placeholders that are filled per request.
//!
//! Callers replace or remove templates through
//! [`crate::config::SynthesisConfig::prompts`]. A category present in the
//! input without a template is a deployment defect and surfaces as
//! [`crate::error::SynthError::ConfigError`].

use crate::model::Category;
use std::collections::HashMap;

/// Substituted for `{CONTENT}` when a category's content is empty.
pub const EMPTY_CONTENT_PLACEHOLDER: &str = "(vazio)";

/// Shared instructions placed in every category system prompt.
const BASE_SYSTEM_PROMPT: &str = r#"You are a technical writer producing release notes.

Rules:
- Rewrite the provided changes as short, clear bullet lines, one change per line
- Keep the language of the input (Portuguese input stays Portuguese)
- Do NOT invent changes that are not in the input
- Do NOT add headings, numbering, markdown, or commentary
- Do NOT prefix lines with category tags in square brackets
- Output ONLY the rewritten lines"#;

const DEFAULT_USER_TEMPLATE: &str =
    "Release: {TITLE}\n\nRewrite these changes:\n\n{CONTENT}";

/// System prompt used for figure captions.
pub const CAPTION_SYSTEM_PROMPT: &str = r#"You write captions for screenshots in release notes.
Answer with ONE short sentence (at most 15 words) describing what the image shows.
Do NOT add quotes, markdown, or commentary."#;

/// User prompt used for figure captions.
pub const CAPTION_USER_TEMPLATE: &str = "Release: {TITLE}\n\nDescribe figure {CONTENT}.";

/// A system/user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub system: String,
    pub user: String,
}

impl PromptTemplate {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Fill `{TITLE}` and `{CONTENT}` in the user template.
    pub fn render_user(&self, title: &str, content: &str) -> String {
        let content = if content.trim().is_empty() {
            EMPTY_CONTENT_PLACEHOLDER
        } else {
            content
        };
        self.user
            .replace("{TITLE}", title)
            .replace("{CONTENT}", content)
    }
}

/// Category-specific focus appended to the base system prompt.
fn category_focus(category: Category) -> &'static str {
    match category {
        Category::Feature => "These are NEW FEATURES. Describe what users can now do.",
        Category::Bugfix => "These are BUG FIXES. Describe what was broken and is now fixed.",
        Category::Performance => {
            "These are PERFORMANCE improvements. Mention what got faster or lighter."
        }
        Category::Enhancement => {
            "These are ENHANCEMENTS to existing features. Describe what improved."
        }
        Category::Security => {
            "These are SECURITY changes. Be precise and do not disclose exploit details."
        }
        Category::Resource => {
            "These are RESOURCES (documentation, manuals, guides). Say what is available."
        }
        Category::KnownIssue => {
            "These are KNOWN ISSUES. State the problem and any workaround."
        }
        Category::Deprecated => {
            "These are DEPRECATIONS. State what is deprecated and what replaces it."
        }
    }
}

/// Templates keyed by category, plus the caption template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    templates: HashMap<Category, PromptTemplate>,
    caption: PromptTemplate,
}

impl Default for PromptSet {
    fn default() -> Self {
        let templates = Category::ALL
            .into_iter()
            .map(|c| {
                let system = format!("{BASE_SYSTEM_PROMPT}\n\n{}", category_focus(c));
                (c, PromptTemplate::new(system, DEFAULT_USER_TEMPLATE))
            })
            .collect();
        Self {
            templates,
            caption: PromptTemplate::new(CAPTION_SYSTEM_PROMPT, CAPTION_USER_TEMPLATE),
        }
    }
}

impl PromptSet {
    pub fn get(&self, category: Category) -> Option<&PromptTemplate> {
        self.templates.get(&category)
    }

    pub fn insert(&mut self, category: Category, template: PromptTemplate) {
        self.templates.insert(category, template);
    }

    pub fn remove(&mut self, category: Category) -> Option<PromptTemplate> {
        self.templates.remove(&category)
    }

    pub fn with(mut self, category: Category, template: PromptTemplate) -> Self {
        self.insert(category, template);
        self
    }

    pub fn without(mut self, category: Category) -> Self {
        self.remove(category);
        self
    }

    pub fn caption(&self) -> &PromptTemplate {
        &self.caption
    }

    pub fn set_caption(&mut self, template: PromptTemplate) {
        self.caption = template;
    }
}
