use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shown in the sidebar for sessions that have no stored title.
pub const UNTITLED: &str = "Untitled Chat";

/// Default number of characters of the first question used as a title.
pub const DEFAULT_TITLE_CHARS: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub String);

impl ChatId {
    /// Millisecond timestamp of the current instant.
    pub fn now() -> Self {
        Self(Utc::now().timestamp_millis().to_string())
    }

    /// The id one millisecond later, used when `now()` collides with an existing session.
    pub fn next(&self) -> Self {
        match self.0.parse::<i64>() {
            Ok(ms) => Self((ms + 1).to_string()),
            Err(_) => Self(format!("{}-1", self.0)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form for headers and log lines.
    pub fn short(&self) -> &str {
        match self.0.char_indices().rev().nth(5) {
            Some((i, _)) => &self.0[i..],
            None => &self.0,
        }
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ChatId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Title derived from the first question: its first `max_chars` characters.
pub fn default_title(question: &str, max_chars: usize) -> String {
    question.chars().take(max_chars).collect()
}

/// Whether a stored title should be replaced by the default one.
pub fn is_unset_title(title: Option<&str>) -> bool {
    match title {
        None => true,
        Some(t) => t.is_empty() || t == UNTITLED,
    }
}
