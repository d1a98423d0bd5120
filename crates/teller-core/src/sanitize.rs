//! Shared textual sanitization for user input and model output.
//!
//! Applies the same denylist filter in both directions: inbound queries are
//! cleaned before they reach a backend, and raw model replies are cleaned
//! before they reach the caller (a backend can echo an injection sequence
//! back). Filtering is purely textual; nothing here is ever parsed or
//! executed.

use crate::config::SanitizeConfig;

/// Byte sequences removed from text by default. Markup and script-like
/// fragments that have no place in a banking conversation, matched
/// ASCII-case-insensitively.
pub const DEFAULT_DENY_PATTERNS: &[&str] = &[
    "<script",
    "</script>",
    "<iframe",
    "</iframe>",
    "<object",
    "<embed",
    "<svg",
    "<img",
    "javascript:",
    "vbscript:",
    "data:text/html",
    "onerror=",
    "onload=",
    "<?php",
    "${",
    "{{",
    "}}",
];

/// Result of a sanitization pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sanitized {
    /// Cleaned text: control characters stripped, denied sequences
    /// removed, whitespace collapsed and trimmed.
    pub text: String,
    /// Number of denied sequences removed.
    pub removed: usize,
}

/// Denylist text filter shared by the input and output paths.
pub struct Sanitizer {
    deny_patterns: Vec<String>,
}

impl Sanitizer {
    /// Create a sanitizer with an explicit pattern list.
    pub fn new(deny_patterns: Vec<String>) -> Self {
        Self { deny_patterns }
    }

    /// Create a sanitizer from the shared configuration section.
    pub fn from_config(config: &SanitizeConfig) -> Self {
        Self::new(config.deny_patterns.clone())
    }

    /// Sanitize a piece of text.
    ///
    /// Order matters: control characters are stripped first so a pattern
    /// split by them cannot survive, denied sequences are then removed
    /// until none remain (removal can splice two halves of a pattern back
    /// together), and whitespace is collapsed last so removals never leave
    /// double spaces behind. The result is a fixed point: sanitizing
    /// already-sanitized text returns it unchanged.
    pub fn apply(&self, text: &str) -> Sanitized {
        let mut cleaned = strip_control_chars(text);
        let mut removed = 0usize;

        loop {
            let mut removed_this_round = 0usize;
            for pattern in &self.deny_patterns {
                let (next, count) = remove_pattern_ignore_case(&cleaned, pattern);
                if count > 0 {
                    cleaned = next;
                    removed_this_round += count;
                }
            }
            if removed_this_round == 0 {
                break;
            }
            removed += removed_this_round;
        }

        Sanitized {
            text: collapse_whitespace(&cleaned),
            removed,
        }
    }
}

/// Remove control characters, keeping tab/newline/carriage-return for the
/// whitespace collapse step.
pub fn strip_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control() || *c == '\t' || *c == '\n' || *c == '\r')
        .collect()
}

/// Collapse every whitespace run to a single space and trim both ends.
pub fn collapse_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut in_run = false;
    for c in text.chars() {
        if c.is_whitespace() {
            in_run = true;
        } else {
            if in_run && !result.is_empty() {
                result.push(' ');
            }
            in_run = false;
            result.push(c);
        }
    }
    result
}

/// Remove every occurrence of `pattern` from `text`, comparing ASCII
/// case-insensitively. Returns the new text and the occurrence count.
fn remove_pattern_ignore_case(text: &str, pattern: &str) -> (String, usize) {
    if pattern.is_empty() {
        return (text.to_string(), 0);
    }
    let hay: Vec<char> = text.chars().collect();
    let pat: Vec<char> = pattern.chars().map(|c| c.to_ascii_lowercase()).collect();
    let mut result = String::with_capacity(text.len());
    let mut count = 0usize;
    let mut i = 0usize;

    while i < hay.len() {
        if i + pat.len() <= hay.len()
            && hay[i..i + pat.len()]
                .iter()
                .zip(pat.iter())
                .all(|(h, p)| h.to_ascii_lowercase() == *p)
        {
            count += 1;
            i += pat.len();
        } else {
            result.push(hay[i]);
            i += 1;
        }
    }

    (result, count)
}
