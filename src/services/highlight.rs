//! Search term highlighting.
//!
//! Splits text into runs so a presentation layer can emphasize the words a
//! search matched.

use regex::RegexBuilder;
use serde::Serialize;

/// A run of text, highlighted or not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextSegment {
    /// The text of this run.
    pub text: String,
    /// Whether the run matched a query word.
    pub is_highlight: bool,
}

impl TextSegment {
    fn plain(text: &str) -> Self {
        Self {
            text: text.to_string(),
            is_highlight: false,
        }
    }
}

/// Splits `text` into segments, highlighting case-insensitive occurrences of
/// any whitespace-separated word of `query`.
///
/// Matches may be partial words ("bra" highlights inside "brave"). Where two
/// query words match at the same position the longer wins. Concatenating the
/// segments always yields `text`. With a blank query or no match, the whole
/// text is one plain segment.
#[must_use]
pub fn highlight_terms(text: &str, query: &str) -> Vec<TextSegment> {
    let mut words: Vec<String> = query
        .split_whitespace()
        .map(|word| regex::escape(&word.to_lowercase()))
        .collect();
    if text.is_empty() || words.is_empty() {
        return vec![TextSegment::plain(text)];
    }
    // Alternation is leftmost-first, so longer words must come first.
    words.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    words.dedup();

    let Ok(pattern) = RegexBuilder::new(&words.join("|"))
        .case_insensitive(true)
        .build()
    else {
        return vec![TextSegment::plain(text)];
    };

    let mut segments = Vec::new();
    let mut last = 0;
    for found in pattern.find_iter(text) {
        if found.start() > last {
            segments.push(TextSegment::plain(&text[last..found.start()]));
        }
        segments.push(TextSegment {
            text: found.as_str().to_string(),
            is_highlight: true,
        });
        last = found.end();
    }
    if last < text.len() {
        segments.push(TextSegment::plain(&text[last..]));
    }

    if segments.is_empty() {
        segments.push(TextSegment::plain(text));
    }
    segments
}
