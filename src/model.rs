// src/model.rs
//! Core value types shared by the scheduler, cache, pipeline and HTTP layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Paragraph separator used inside `Story::content`.
pub const PARAGRAPH_BREAK: &str = "\n\n";

/// Topic tag. Declaration order is the classifier tie-break order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Tech,
    Finance,
    Science,
    Health,
    Ai,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Tech,
        Category::Finance,
        Category::Science,
        Category::Health,
        Category::Ai,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::Tech => "tech",
            Category::Finance => "finance",
            Category::Science => "science",
            Category::Health => "health",
            Category::Ai => "ai",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownTag(s.to_string()))
    }
}

/// A named daily publication window. Ordered by time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TimeSlot {
    #[serde(rename = "10AM")]
    Morning,
    #[serde(rename = "3PM")]
    Afternoon,
    #[serde(rename = "8PM")]
    Evening,
}

impl TimeSlot {
    pub const ALL: [TimeSlot; 3] = [TimeSlot::Morning, TimeSlot::Afternoon, TimeSlot::Evening];

    pub fn as_str(self) -> &'static str {
        match self {
            TimeSlot::Morning => "10AM",
            TimeSlot::Afternoon => "3PM",
            TimeSlot::Evening => "8PM",
        }
    }

    /// Position in `ALL`; used to index per-slot configuration.
    pub fn index(self) -> usize {
        match self {
            TimeSlot::Morning => 0,
            TimeSlot::Afternoon => 1,
            TimeSlot::Evening => 2,
        }
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TimeSlot {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeSlot::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownTag(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized tag `{0}`")]
pub struct UnknownTag(pub String);

/// One rewritten, categorized news item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Story {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub category: Category,
    pub headline: String,
    pub content: String,
    pub source: String,
    pub image: String,
    pub original_url: String,
}

impl Story {
    pub fn paragraphs(&self) -> Vec<&str> {
        self.content
            .split(PARAGRAPH_BREAK)
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect()
    }
}

/// The finished bundle of stories for one (date, slot).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBlock {
    pub time: TimeSlot,
    pub date: String,
    pub stories: Vec<Story>,
}
