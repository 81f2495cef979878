//! Heuristic that picks assistant messages likely to contain React source.

use crate::config::MIN_CONTENT_CHARS;
use crate::snippet::Message;

/// Lowercase markers searched for in candidate messages.
pub const REACT_KEYWORDS: &[&str] = &[
    "import react",
    "from 'react'",
    "export default",
    "usestate",
    "useeffect",
    "jsx",
    "component",
    "function",
    "const",
    "=>",
    "return",
];

const ASSISTANT_ROLE: &str = "assistant";

/// Keyword filter with a configurable length floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentFilter {
    min_chars: usize,
}

impl ContentFilter {
    /// Builds a filter rejecting content shorter than `min_chars` characters.
    pub fn new(min_chars: usize) -> Self {
        Self { min_chars }
    }

    /// Whether the message is an assistant turn that plausibly holds React code.
    pub fn is_candidate(&self, message: &Message) -> bool {
        if message.role != ASSISTANT_ROLE {
            return false;
        }
        let content = message.content.as_str();
        if content.is_empty() || content.chars().count() < self.min_chars {
            return false;
        }
        let lowered = content.to_lowercase();
        REACT_KEYWORDS
            .iter()
            .any(|keyword| lowered.contains(keyword))
    }
}

impl Default for ContentFilter {
    fn default() -> Self {
        Self::new(MIN_CONTENT_CHARS)
    }
}

/// [`ContentFilter::is_candidate`] with the default length floor.
pub fn is_candidate(message: &Message) -> bool {
    ContentFilter::default().is_candidate(message)
}
