// src/classify.rs
//! Keyword fallback classifier for articles the provider did not tag.
//!
//! Matching is case-insensitive whole-word/phrase containment over
//! `title + description + body`; each keyword also matches its plain `s`
//! plural. The first category in declared order with
//! any matching keyword wins; match counts are never compared.

use regex::Regex;

use crate::ingest::types::RawArticle;
use crate::model::Category;

const TECH: &[&str] = &[
    "technology",
    "tech",
    "software",
    "startup",
    "smartphone",
    "chip",
    "semiconductor",
    "gadget",
    "cybersecurity",
    "cloud computing",
];
const FINANCE: &[&str] = &[
    "stock",
    "stock market",
    "finance",
    "financial",
    "investment",
    "investor",
    "bank",
    "venture capital",
    "earnings",
    "economy",
    "funding",
];
const SCIENCE: &[&str] = &[
    "science",
    "scientific",
    "scientist",
    "research",
    "researcher",
    "space",
    "nasa",
    "physics",
    "quantum",
    "astronomy",
    "climate",
];
const HEALTH: &[&str] = &[
    "health",
    "healthcare",
    "medical",
    "medicine",
    "hospital",
    "vaccine",
    "disease",
    "patient",
    "clinical",
    "drug",
];
const AI: &[&str] = &[
    "artificial intelligence",
    "machine learning",
    "ai",
    "neural network",
    "deep learning",
    "chatgpt",
    "openai",
    "llm",
];

pub fn default_keywords(category: Category) -> &'static [&'static str] {
    match category {
        Category::Tech => TECH,
        Category::Finance => FINANCE,
        Category::Science => SCIENCE,
        Category::Health => HEALTH,
        Category::Ai => AI,
    }
}

#[derive(Debug, Clone)]
pub struct CategoryClassifier {
    rules: Vec<(Category, Regex)>,
}

impl Default for CategoryClassifier {
    fn default() -> Self {
        Self::from_table(
            Category::ALL
                .into_iter()
                .map(|c| (c, default_keywords(c).iter().map(|k| k.to_string()).collect())),
        )
    }
}

impl CategoryClassifier {
    /// Build from an ordered `(category, keywords)` table; order is the tie-break.
    /// Categories with no usable keywords never match.
    pub fn from_table<I>(table: I) -> Self
    where
        I: IntoIterator<Item = (Category, Vec<String>)>,
    {
        let rules = table
            .into_iter()
            .filter_map(|(cat, kws)| compile_keywords(&kws).map(|re| (cat, re)))
            .collect();
        Self { rules }
    }

    pub fn classify(&self, article: &RawArticle) -> Option<Category> {
        let haystack = format!(
            "{} {} {}",
            article.title,
            article.description.as_deref().unwrap_or_default(),
            article.content.as_deref().unwrap_or_default()
        );
        self.classify_text(&haystack)
    }

    pub fn classify_text(&self, text: &str) -> Option<Category> {
        self.rules
            .iter()
            .find(|(_, re)| re.is_match(text))
            .map(|(cat, _)| *cat)
    }
}

fn compile_keywords(keywords: &[String]) -> Option<Regex> {
    let alts: Vec<String> = keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty())
        .map(|k| {
            // "machine  learning" also matches across any whitespace run
            k.split_whitespace()
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(r"\s+")
                + "s?"
        })
        .collect();
    if alts.is_empty() {
        return None;
    }
    let pattern = format!(r"(?i)\b(?:{})\b", alts.join("|"));
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!(error = %e, "classifier keyword pattern rejected");
            None
        }
    }
}
