//! Line classification: raw change description → categorised entries.
//!
//! Pure and deterministic. Each non-blank line is tested, first match wins:
//!
//! 1. **Explicit marker**: a leading `[tag]` whose tag is in the alias table.
//! 2. **Keyword heuristic**: the lowercase line is searched for the keyword
//!    sets in [`ClassifierRules::keywords`] order.
//! 3. **Default**: [`Category::Feature`].
//!
//! The alias and keyword tables are data ([`ClassifierRules`]) so they can be
//! localised or extended without touching the matching code.

use crate::model::{Category, Entry};
use once_cell::sync::Lazy;
use regex::Regex;

/// A leading `[tag]` token and the rest of the line.
static RE_LEADING_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*\[([^\[\]]*)\]\s*(.*)$").unwrap());

/// Alias and keyword tables driving the classifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierRules {
    /// Marker tags per category. Matched case-insensitively.
    pub aliases: Vec<(Category, Vec<String>)>,
    /// Keyword sets in priority order. Matched as lowercase substrings.
    pub keywords: Vec<(Category, Vec<String>)>,
    /// Category for lines nothing else matched.
    pub default_category: Category,
}

fn owned(words: &[&str]) -> Vec<String> {
    words.iter().map(|w| w.to_lowercase()).collect()
}

impl Default for ClassifierRules {
    fn default() -> Self {
        let aliases = vec![
            (Category::Feature, owned(&["nova", "novo", "new", "funcionalidade", "feature"])),
            (Category::Bugfix, owned(&["correção", "correcao", "bug", "fixed", "fix", "bugfix"])),
            (Category::Performance, owned(&["performance", "melhoria", "speed", "desempenho"])),
            (Category::Security, owned(&["segurança", "seguranca", "security"])),
            (Category::Resource, owned(&["recurso", "resource", "manual"])),
            (Category::Enhancement, owned(&["aprimoramento", "enhancement"])),
            (Category::KnownIssue, owned(&["known_issue", "problema", "known issue"])),
            (Category::Deprecated, owned(&["deprecated", "obsoleto", "descontinuado"])),
        ];

        let keywords = vec![
            (
                Category::Feature,
                owned(&[
                    "nova", "novo", "adicionad", "adicionamos", "implementad", "funcionalidade",
                    "new ", "added", "introduc", "feature",
                ]),
            ),
            (
                Category::Enhancement,
                owned(&["aprimora", "aprimorad", "melhorad", "improved", "enhance", "atualizad"]),
            ),
            (
                Category::Bugfix,
                owned(&[
                    "corrigido", "corrigida", "correção", "correcao", "corrige", "bug", "erro",
                    "falha", "fixed", "crash",
                ]),
            ),
            (
                Category::Performance,
                owned(&[
                    "performance", "desempenho", "otimiz", "rápido", "rapido", "lentidão",
                    "latência", "faster", "speed",
                ]),
            ),
            (
                Category::Security,
                owned(&[
                    "segurança", "seguranca", "vulnerab", "security", "cve-", "xss", "csrf",
                    "criptografia",
                ]),
            ),
            (
                Category::KnownIssue,
                owned(&["problema conhecido", "known issue", "limitação", "workaround", "contorno"]),
            ),
            (
                Category::Deprecated,
                owned(&["obsoleto", "descontinuad", "deprecated", "será removid"]),
            ),
            (
                Category::Resource,
                owned(&["documentação", "documentacao", "manual", "tutorial", "guia ", "recurso"]),
            ),
        ];

        Self {
            aliases,
            keywords,
            default_category: Category::Feature,
        }
    }
}

impl ClassifierRules {
    /// Category for a marker tag, if the tag is a known alias.
    pub fn alias(&self, tag: &str) -> Option<Category> {
        let tag = tag.trim().to_lowercase();
        self.aliases
            .iter()
            .find(|(_, names)| names.iter().any(|n| *n == tag))
            .map(|(c, _)| *c)
    }

    /// First keyword set (in priority order) with an occurrence in `line`.
    pub fn keyword_match(&self, line: &str) -> Option<Category> {
        let lower = line.to_lowercase();
        self.keywords
            .iter()
            .find(|(_, words)| words.iter().any(|w| lower.contains(w.as_str())))
            .map(|(c, _)| *c)
    }
}

/// Classifies lines against a rule table.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    rules: ClassifierRules,
}

impl Classifier {
    pub fn new(rules: ClassifierRules) -> Self {
        Self { rules }
    }

    /// Classify every non-blank line of `text`, preserving input order.
    pub fn classify(&self, text: &str) -> Vec<Entry> {
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| self.classify_line(line))
            .collect()
    }

    /// Classify a single non-blank line.
    pub fn classify_line(&self, line: &str) -> Entry {
        if let Some(caps) = RE_LEADING_MARKER.captures(line) {
            let rest = caps.get(2).map_or("", |m| m.as_str()).trim();
            if let Some(category) = self.rules.alias(&caps[1]) {
                return Entry {
                    category,
                    content: rest.to_string(),
                };
            }
            // Unknown tag: drop it and classify what follows.
            return Entry {
                category: self.heuristic(rest),
                content: rest.to_string(),
            };
        }

        let content = line.trim();
        Entry {
            category: self.heuristic(content),
            content: content.to_string(),
        }
    }

    fn heuristic(&self, line: &str) -> Category {
        self.rules
            .keyword_match(line)
            .unwrap_or(self.rules.default_category)
    }
}

/// Classify `text` with the default rule table.
pub fn classify(text: &str) -> Vec<Entry> {
    static DEFAULT: Lazy<Classifier> = Lazy::new(Classifier::default);
    DEFAULT.classify(text)
}
