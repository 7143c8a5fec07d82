//! Memory item types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LookupError;

/// Kind of fact a memory item records.
///
/// Declaration order is the priority order used when scanning slot
/// categories for removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// A decision the agent or user committed to
    Decision,
    /// An error observed in tool output
    Error,
    /// An open task or goal
    Task,
    /// A file the session touched
    FilePath,
    /// Anything else worth remembering
    Discovery,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Decision,
        Category::Error,
        Category::Task,
        Category::FilePath,
        Category::Discovery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Decision => "decision",
            Category::Error => "error",
            Category::Task => "task",
            Category::FilePath => "file_path",
            Category::Discovery => "discovery",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = LookupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "decision" => Ok(Category::Decision),
            "error" => Ok(Category::Error),
            "task" => Ok(Category::Task),
            "file_path" | "file" => Ok(Category::FilePath),
            "discovery" | "other" => Ok(Category::Discovery),
            _ => Err(LookupError::UnknownCategory(s.to_string())),
        }
    }
}

/// A single fact held in a session's working memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryItem {
    /// Unique identifier within the session
    pub id: Uuid,
    pub category: Category,
    /// Fact text, bounded by `max_content_chars`
    pub content: String,
    /// Provenance tag (tool name, "assistant", "manual", ...)
    pub source: String,
    /// Wall-clock time of creation or of the last dedup refresh
    pub created_at: DateTime<Utc>,
    /// Times this fact was recorded; starts at 1
    pub mentions: u32,
    /// Decayed importance, pool items only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Logical clock value at the last score update, pool items only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_scored_at: Option<u64>,
}

impl MemoryItem {
    pub fn new(category: Category, content: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            category,
            content: content.into(),
            source: source.into(),
            created_at: Utc::now(),
            mentions: 1,
            score: None,
            last_scored_at: None,
        }
    }
}

/// Clamp `content` to `max_chars` characters.
///
/// Returns the (possibly shortened) content and a warning when anything
/// was cut. Counting is by `char`, so multi-byte text is never split.
pub fn bound_content(content: &str, max_chars: usize) -> (String, Option<String>) {
    let content = content.trim();
    let total = content.chars().count();
    if total <= max_chars {
        return (content.to_string(), None);
    }
    let bounded: String = content.chars().take(max_chars).collect();
    let warning = format!(
        "content truncated from {total} to {max_chars} characters"
    );
    (bounded, Some(warning))
}
