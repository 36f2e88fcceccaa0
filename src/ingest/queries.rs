// src/ingest/queries.rs
//! Search query rotation per category.

use rand::seq::IndexedRandom;
use rand::Rng;

use crate::model::Category;

pub fn queries_for(category: Category) -> &'static [&'static str] {
    match category {
        Category::Tech => &[
            "technology innovation",
            "tech startup",
            "software development",
            "digital technology",
            "tech industry",
            "emerging technology",
        ],
        Category::Finance => &[
            "business finance",
            "stock market",
            "financial technology",
            "investment news",
            "venture capital",
            "startup funding",
        ],
        Category::Science => &[
            "scientific discovery",
            "research breakthrough",
            "space exploration",
            "quantum computing",
            "scientific innovation",
            "research development",
        ],
        Category::Health => &[
            "healthcare innovation",
            "medical technology",
            "health research",
            "digital health",
            "medical breakthrough",
            "healthcare startup",
        ],
        Category::Ai => &[
            "artificial intelligence",
            "machine learning",
            "AI technology",
            "neural networks",
            "AI research",
            "deep learning",
        ],
    }
}

/// Pick one query for `category` at random.
pub fn pick_query<R: Rng + ?Sized>(category: Category, rng: &mut R) -> &'static str {
    queries_for(category)
        .choose(rng)
        .copied()
        .unwrap_or_else(|| category.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_category_has_queries_and_pick_stays_in_table() {
        let mut rng = rand::rng();
        for c in Category::ALL {
            assert!(!queries_for(c).is_empty());
            let q = pick_query(c, &mut rng);
            assert!(queries_for(c).contains(&q));
        }
    }
}
