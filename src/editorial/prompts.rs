// src/editorial/prompts.rs
use crate::ingest::types::RawArticle;
use crate::model::Category;

pub const SELECTION_SYSTEM: &str = "You are the editor of a minimalist news digest. \
From the numbered articles, pick the single story most likely to make a reader want to learn more. \
Weigh novelty, impact on readers or society, technological or scientific advancement, and cultural significance. \
Reply with ONLY a JSON object, no prose and no code fence: \
{\"selectedIndex\": <integer index of the article>, \"reason\": \"<one short sentence>\"}";

pub const REWRITE_SYSTEM: &str = "You are a news writer for a minimalist news digest. \
Rewrite the article: a concise, intriguing headline and 3 to 4 short paragraphs of 2 to 3 sentences each, \
about 150 words in total. Stay factual, plain and engaging; do not oversimplify. \
Reply with ONLY a JSON object on a single line, no prose and no code fence: \
{\"headline\": \"...\", \"content\": \"First paragraph\\\\n\\\\nSecond paragraph\\\\n\\\\nThird paragraph\"} \
Separate paragraphs with the two characters \\\\n twice; never emit raw line breaks.";

/// User message for the selection call: one numbered block per candidate.
pub fn selection_context(candidates: &[RawArticle]) -> String {
    candidates
        .iter()
        .enumerate()
        .map(|(i, a)| {
            format!(
                "Article {i}:\nTitle: {}\nDescription: {}\nContent: {}",
                a.title,
                a.description.as_deref().unwrap_or_default(),
                a.content.as_deref().unwrap_or_default()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn rewrite_context(article: &RawArticle, category: Category) -> String {
    format!(
        "Title: {}\nDescription: {}\nContent: {}\nCategory: {}\nSource: {}",
        article.title,
        article.description.as_deref().unwrap_or_default(),
        article.content.as_deref().unwrap_or_default(),
        category,
        article.source_name
    )
}
