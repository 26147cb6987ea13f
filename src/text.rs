// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Cleanup of provider-specific markers in message text.
//!
//! Assistant answers with web citations embed invisible markers: runs of
//! private-use characters wrapped around tokens such as `citeturn0search1`.
//! They carry no meaning outside the provider's own renderer.

use regex::Regex;
use std::sync::LazyLock;

/// Matches a `U+E200 … U+E201` citation marker and the whitespace before it.
static CITATION_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[ \t]*\x{E200}[^\x{E201}]*\x{E201}")
        .expect("CITATION_MARKER: hardcoded regex is valid")
});

/// Removes characters from the Basic Multilingual Plane private-use area.
#[must_use]
pub fn strip_private_use(text: &str) -> String {
    text.chars()
        .filter(|c| !('\u{E000}'..='\u{F8FF}').contains(c))
        .collect()
}

/// Removes citation markers, including the tokens between the delimiters.
///
/// Only text wrapped in `U+E200`/`U+E201` is touched, so ordinary words that
/// look like tokens survive.
#[must_use]
pub fn strip_citation_tokens(text: &str) -> String {
    CITATION_MARKER.replace_all(text, "").into_owned()
}

/// Cleans one text part: citation markers first, then stray private-use
/// characters, then surrounding whitespace.
#[must_use]
pub fn clean_text(text: &str) -> String {
    strip_private_use(&strip_citation_tokens(text)).trim().to_owned()
}

/// Joins the non-blank segments with a blank line between each.
pub fn join_paragraphs<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    segments
        .into_iter()
        .filter(|s| !s.as_ref().trim().is_empty())
        .map(|s| s.as_ref().to_owned())
        .collect::<Vec<String>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_private_use_characters() {
        assert_eq!(strip_private_use("a\u{E200}b\u{F8FF}c"), "abc");
        assert_eq!(strip_private_use("plain"), "plain");
    }

    #[test]
    fn strips_citation_markers() {
        let text = "Rust is fast. \u{E200}cite\u{E202}turn0search1\u{E201}\nSecond line \u{E200}filecite\u{E202}turn0file2\u{E201} end";
        assert_eq!(strip_citation_tokens(text), "Rust is fast.\nSecond line end");
    }

    #[test]
    fn keeps_token_like_words_outside_markers() {
        let text = "Explain the Saturn5 navlist widget\n\nciteturn0search1 and turn2x()";
        assert_eq!(strip_citation_tokens(text), text);
    }

    #[test]
    fn unterminated_marker_is_left_to_private_use_stripping() {
        assert_eq!(clean_text("  open \u{E200}cite tail "), "open cite tail");
    }

    #[test]
    fn joins_non_blank_segments() {
        assert_eq!(join_paragraphs(["a", "", "  ", "b"]), "a\n\nb");
        assert_eq!(join_paragraphs(Vec::<String>::new()), "");
    }
}
