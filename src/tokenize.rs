//! Term extraction shared by indexing and search.
//!
//! A term is a maximal run of ASCII letters, digits, and `+ # . -`, lowercased,
//! so `C++`, `C#`, `Node.js` and `front-end` each survive as one term.

use std::collections::BTreeSet;

fn is_term_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '#' | '.' | '-')
}

/// Lazily yields the terms of `text` in order of appearance.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !is_term_char(c))
        .filter(|run| !run.is_empty())
        .map(str::to_ascii_lowercase)
}

/// The distinct terms of `text`, sorted.
pub fn term_set(text: &str) -> BTreeSet<String> {
    tokenize(text).collect()
}
