//! Suggestion generation: asks the text model for short edit ideas.

use serde::{Deserialize, Serialize};

/// Instruction sent alongside the uploaded image.
pub const SUGGESTION_INSTRUCTION: &str = "Look at the character in this image and suggest \
exactly three short transformation ideas (two to five words each), such as a new facial \
expression, gesture, or accessory. Reply with the three phrases separated by commas and \
nothing else.";

/// A selectable transformation idea.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    /// Text placed into the prompt when selected.
    pub label: String,
}

impl Suggestion {
    /// Creates a suggestion.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

/// Parses a model reply into suggestions.
///
/// Items are separated by commas or newlines. Any number of items is
/// accepted; blank items are dropped, and list decoration (bullets,
/// numbering, quotes, a trailing period) is stripped from each.
pub fn parse_suggestions(reply: &str) -> Vec<Suggestion> {
    reply
        .split([',', '\n'])
        .map(clean_item)
        .filter(|item| !item.is_empty())
        .map(Suggestion::new)
        .collect()
}

fn clean_item(raw: &str) -> String {
    let mut item = raw.trim();

    item = item.trim_start_matches(['-', '*', '•']).trim_start();

    // "1." / "2)" numbering
    let digits = item.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &item[digits..];
        if let Some(stripped) = rest.strip_prefix('.').or_else(|| rest.strip_prefix(')')) {
            item = stripped.trim_start();
        }
    }

    item = item.trim_end_matches('.').trim();
    item.trim_matches(['"', '\'', '`']).trim().to_string()
}
