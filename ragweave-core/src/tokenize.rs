//! Text tokenization for length accounting.
//!
//! Splits raw text into counting units: word runs, number runs, individual
//! CJK characters, and individual punctuation marks. Chunk size limits are
//! expressed in these units.

use regex::Regex;
use std::sync::OnceLock;

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Word runs, digit runs, single CJK characters, then any other
        // non-whitespace character (punctuation) one at a time.
        Regex::new(
            r"[A-Za-z]+|[0-9]+|[\p{Han}\p{Hiragana}\p{Katakana}\p{Hangul}]|[^\sA-Za-z0-9]",
        )
        .expect("token pattern is valid")
    })
}

/// Split text into counting tokens.
pub fn tokenize(text: &str) -> Vec<&str> {
    token_pattern().find_iter(text).map(|m| m.as_str()).collect()
}

/// Count tokens without materializing them.
pub fn count_tokens(text: &str) -> usize {
    token_pattern().find_iter(text).count()
}
