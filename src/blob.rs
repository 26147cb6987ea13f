// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Locating embedded data blobs in share-page HTML.
//!
//! Modern share pages stream their loader data through calls of the form
//! `streamController.enqueue("<escaped JSON>")`. [`locate_chunks`] finds every
//! such call in document order and returns the still-escaped string bodies.
//!
//! Older pages embed the same data as a Next.js `__NEXT_DATA__` script, which
//! [`locate_next_data`] extracts.

use regex::Regex;
use snafu::prelude::*;
use std::sync::LazyLock;

/// Chunks shorter than this many characters are ignored.
///
/// Small enqueue calls carry bootstrap flags, not conversation data.
pub const MIN_CHUNK_LEN: usize = 100;

/// Matches `.enqueue("…")`, capturing the string body.
///
/// The body alternates between non-special characters and complete escape
/// pairs, so an escaped quote never ends the match.
static ENQUEUE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\.enqueue\("((?:[^"\\]|\\.)*)"\)"#)
        .expect("ENQUEUE_PATTERN: hardcoded regex is valid")
});

static NEXT_DATA_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<script id="__NEXT_DATA__"[^>]*>([^<]+)</script>"#)
        .expect("NEXT_DATA_PATTERN: hardcoded regex is valid")
});

/// Error returned when a page has no usable enqueue payload.
#[derive(Debug, Snafu)]
pub enum LocateError {
    /// No `.enqueue("…")` call of sufficient length was found.
    #[snafu(display("no enqueue data found ({discarded} short chunks discarded)"))]
    NoDataFound {
        /// Number of enqueue calls skipped for being below the length threshold.
        discarded: usize,
    },
}

/// An escaped enqueue body, borrowed from the page HTML.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawChunk<'a> {
    /// Byte offset of the body within the HTML.
    pub offset: usize,
    /// The escaped string body, without the surrounding quotes.
    pub text: &'a str,
}

/// Finds all enqueue bodies of at least `min_len` characters, in document order.
///
/// # Errors
///
/// Returns [`LocateError::NoDataFound`] when no body meets the threshold.
///
/// # Example
///
/// ```
/// use share2md::blob::locate_chunks;
///
/// let html = r#"<script>c.enqueue("[\"hello\"]")</script>"#;
/// let chunks = locate_chunks(html, 1).unwrap();
/// assert_eq!(chunks[0].text, r#"[\"hello\"]"#);
/// ```
pub fn locate_chunks(html: &str, min_len: usize) -> Result<Vec<RawChunk<'_>>, LocateError> {
    let mut chunks = Vec::new();
    let mut discarded: usize = 0;

    for caps in ENQUEUE_PATTERN.captures_iter(html) {
        let Some(body) = caps.get(1) else { continue };
        if body.as_str().chars().count() < min_len {
            discarded += 1;
            continue;
        }
        chunks.push(RawChunk {
            offset: body.start(),
            text: body.as_str(),
        });
    }

    ensure!(!chunks.is_empty(), NoDataFoundSnafu { discarded });
    Ok(chunks)
}

/// Returns the raw JSON text of the `__NEXT_DATA__` script, if present.
#[must_use]
pub fn locate_next_data(html: &str) -> Option<&str> {
    NEXT_DATA_PATTERN
        .captures(html)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn enqueue(body: &str) -> String {
        format!(r#"<script>window.__reactRouterContext.streamController.enqueue("{body}");</script>"#)
    }

    fn long_body(fill: char) -> String {
        format!(r#"[\"{}\"]"#, fill.to_string().repeat(MIN_CHUNK_LEN))
    }

    #[test]
    fn finds_chunks_in_document_order() {
        let first = long_body('a');
        let second = long_body('b');
        let html = format!("{}<p>x</p>{}", enqueue(&first), enqueue(&second));

        let chunks = locate_chunks(&html, MIN_CHUNK_LEN).unwrap();

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, first);
        assert_eq!(chunks[1].text, second);
        assert!(chunks[0].offset < chunks[1].offset);
    }

    #[test]
    fn escaped_quote_does_not_end_match() {
        let body = r#"[\"say \\\"hi\\\")\"]"#;
        let html = enqueue(body);

        let chunks = locate_chunks(&html, 1).unwrap();

        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, body);
    }

    #[test]
    fn discards_short_chunks() {
        let html = format!("{}{}", enqueue("[1]"), enqueue(&long_body('z')));

        let chunks = locate_chunks(&html, MIN_CHUNK_LEN).unwrap();

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains('z'));
    }

    #[test]
    fn only_short_chunks_is_no_data() {
        let html = enqueue(r#"[\"tiny\"]"#);

        let err = locate_chunks(&html, MIN_CHUNK_LEN).unwrap_err();

        assert!(matches!(err, LocateError::NoDataFound { discarded: 1 }));
    }

    #[test]
    fn page_without_enqueue_is_no_data() {
        let err = locate_chunks("<html><body>nothing</body></html>", 1).unwrap_err();
        assert!(matches!(err, LocateError::NoDataFound { discarded: 0 }));
    }

    #[test]
    fn threshold_counts_characters_not_bytes() {
        let body = "é".repeat(60);
        let html = enqueue(&body);

        assert!(locate_chunks(&html, 100).is_err());
        assert!(locate_chunks(&html, 60).is_ok());
    }

    #[test]
    fn extracts_next_data_script() {
        let html = r#"<script id="__NEXT_DATA__" type="application/json">{"props":{}}</script>"#;
        assert_eq!(locate_next_data(html), Some(r#"{"props":{}}"#));
    }

    #[test]
    fn missing_next_data_is_none() {
        assert!(locate_next_data("<script>var x = 1;</script>").is_none());
    }
}
