// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! The extraction pipeline from share page to messages.
//!
//! [`parse_share_html`] runs every stage after the network: blob location,
//! unescaping, flat-array parsing, message location, flattening and
//! assembly. [`extract_share_link`] adds the fetch in front of it.
//!
//! A chunk that fails to parse only loses that chunk's messages. The
//! pipeline fails as a whole only when the page has no data at all
//! ([`ExtractError::NoDataFound`]) or when data was found but no message
//! survived ([`ExtractError::EmptyResult`]).

use crate::assemble::{Conversation, ParsedMessage, assemble};
use crate::blob::{LocateError, locate_chunks, locate_next_data};
use crate::diagnostics::{Diagnostics, diag};
use crate::fetch::{FetchError, FetchOptions, fetch_html};
use crate::flat::FlatRecord;
use crate::flatten::{FlattenContext, FlattenerRegistry};
use crate::locate::{Heuristics, locate_messages};
use crate::next_data::parse_next_data;
use crate::unescape::unescape_js;
use chrono::Utc;
use snafu::prelude::*;

/// Options for [`parse_share_html`].
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Positional search parameters.
    pub heuristics: Heuristics,
    /// Flattening rules per content type.
    pub registry: FlattenerRegistry,
    /// Diagnostic logging level.
    pub diagnostics: Diagnostics,
}

/// Error type for share link extraction.
#[derive(Debug, Snafu)]
pub enum ExtractError {
    /// The page could not be fetched.
    #[snafu(display("failed to fetch share page: {source}"))]
    Fetch {
        /// The underlying fetch error.
        source: FetchError,
    },

    /// The page contains no conversation data.
    #[snafu(display(
        "no conversation data found in page ({discarded} enqueue chunks below {min_len} characters)"
    ))]
    NoDataFound {
        /// Enqueue calls skipped for being too short.
        discarded: usize,
        /// The length threshold that was applied.
        min_len: usize,
    },

    /// Conversation data was found but yielded no messages.
    #[snafu(display("no messages could be extracted from {chunks} data chunks"))]
    EmptyResult {
        /// Number of data chunks examined.
        chunks: usize,
    },
}

impl ExtractError {
    /// Returns the stable error code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Fetch { .. } => "E-FETCH-001",
            Self::NoDataFound { .. } => "E-PARSE-001",
            Self::EmptyResult { .. } => "E-PARSE-005",
        }
    }
}

/// Extracts the messages of a share page from its HTML.
///
/// # Errors
///
/// Returns [`ExtractError::NoDataFound`] if the page has neither enqueue data
/// nor a legacy `__NEXT_DATA__` payload, and [`ExtractError::EmptyResult`] if
/// data was present but no message could be extracted.
///
/// # Example
///
/// ```
/// use share2md::{ExtractError, ParseOptions, parse_share_html};
///
/// let err = parse_share_html("<html></html>", &ParseOptions::default()).unwrap_err();
/// assert_eq!(err.code(), "E-PARSE-001");
/// assert!(matches!(err, ExtractError::NoDataFound { .. }));
/// ```
pub fn parse_share_html(
    html: &str,
    opts: &ParseOptions,
) -> Result<Vec<ParsedMessage>, ExtractError> {
    let diagnostics = opts.diagnostics;
    let min_len = opts.heuristics.min_chunk_len;
    diag!(diagnostics, html_bytes = html.len(), "parsing share page");

    let (messages, mut chunks, discarded) = match locate_chunks(html, min_len) {
        Ok(raw_chunks) => {
            let count = raw_chunks.len();
            let mut located = Vec::new();

            for (index, chunk) in raw_chunks.iter().enumerate() {
                let text = unescape_js(chunk.text);
                let record = match FlatRecord::parse(&text) {
                    Ok(record) => record,
                    Err(e) => {
                        diag!(diagnostics, chunk = index, offset = chunk.offset, error = %e, "skipping chunk");
                        continue;
                    }
                };

                let found = locate_messages(&record, &opts.heuristics);
                diag!(
                    diagnostics,
                    chunk = index,
                    offset = chunk.offset,
                    elements = record.len(),
                    messages = found.len(),
                    "scanned chunk"
                );
                located.extend(found);
            }

            let messages = assemble(
                located,
                &opts.registry,
                &FlattenContext::default(),
                diagnostics,
            );
            (messages, count, 0)
        }
        Err(LocateError::NoDataFound { discarded }) => {
            diag!(diagnostics, discarded, "no enqueue chunks found");
            (Vec::new(), 0, discarded)
        }
    };

    if !messages.is_empty() {
        return Ok(messages);
    }

    let legacy = locate_next_data(html).and_then(|json| parse_next_data(json, diagnostics));
    let Some(payload) = legacy else {
        ensure!(chunks > 0, NoDataFoundSnafu { discarded, min_len });
        return EmptyResultSnafu { chunks }.fail();
    };

    chunks += 1;
    let ctx = FlattenContext {
        shared_conversation_id: payload.shared_conversation_id,
    };
    let messages = assemble(payload.messages, &opts.registry, &ctx, diagnostics);
    diag!(diagnostics, messages = messages.len(), "used __NEXT_DATA__ payload");

    ensure!(!messages.is_empty(), EmptyResultSnafu { chunks });
    Ok(messages)
}

/// Fetches a share page and extracts its conversation.
///
/// # Errors
///
/// Returns [`ExtractError::Fetch`] if the page cannot be fetched, otherwise
/// the errors of [`parse_share_html`].
pub fn extract_share_link(
    url: &str,
    fetch: &FetchOptions,
    parse: &ParseOptions,
) -> Result<Conversation, ExtractError> {
    let html = fetch_html(url, fetch).context(FetchSnafu)?;
    let fetched_at = Utc::now();
    let messages = parse_share_html(&html, parse)?;

    Ok(Conversation {
        source_url: url.to_owned(),
        fetched_at: Some(fetched_at),
        messages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::Role;

    /// Escapes `json` the way the page embeds it in a JS string literal.
    fn enqueue(json: &str) -> String {
        let escaped = json.replace('\\', "\\\\").replace('"', "\\\"");
        format!("<script>streamController.enqueue(\"{escaped}\");</script>")
    }

    fn padded(items: &str) -> String {
        format!(r#"[{items}, "{}"]"#, "-".repeat(100))
    }

    #[test]
    fn extracts_user_and_assistant() {
        let html = enqueue(&padded(
            r#""post", "text", "Hello", "Hi!", "role", "assistant", "parts", [3]"#,
        ));

        let messages = parse_share_html(&html, &ParseOptions::default()).unwrap();

        assert_eq!(
            messages,
            vec![
                ParsedMessage::new(Role::User, "Hello"),
                ParsedMessage::new(Role::Assistant, "Hi!"),
            ]
        );
    }

    #[test]
    fn malformed_chunk_is_skipped() {
        let broken = format!("<script>c.enqueue(\"[{}\");</script>", "x".repeat(120));
        let good = enqueue(&padded(
            r#""Answer", "role", "assistant", "parts", [0]"#,
        ));

        let messages =
            parse_share_html(&format!("{broken}{good}"), &ParseOptions::default()).unwrap();

        assert_eq!(messages, vec![ParsedMessage::new(Role::Assistant, "Answer")]);
    }

    #[test]
    fn all_chunks_malformed_is_empty_result() {
        let unterminated = format!("<script>c.enqueue(\"[{}\");</script>", "x".repeat(120));
        let not_json = format!("<script>c.enqueue(\"{{{}\");</script>", "y".repeat(120));

        let err = parse_share_html(&format!("{unterminated}{not_json}"), &ParseOptions::default())
            .unwrap_err();

        assert!(matches!(err, ExtractError::EmptyResult { chunks: 2 }));
        assert_eq!(err.code(), "E-PARSE-005");
    }

    #[test]
    fn chunks_without_messages_is_empty_result() {
        let html = enqueue(&padded(r#""nothing", "here""#));

        let err = parse_share_html(&html, &ParseOptions::default()).unwrap_err();

        assert!(matches!(err, ExtractError::EmptyResult { chunks: 1 }));
        assert_eq!(err.code(), "E-PARSE-005");
    }

    #[test]
    fn short_chunks_only_is_no_data() {
        let html = enqueue(r#"["post", "text", "Hello"]"#);

        let err = parse_share_html(&html, &ParseOptions::default()).unwrap_err();

        assert!(matches!(err, ExtractError::NoDataFound { discarded: 1, .. }));
    }

    #[test]
    fn lowered_threshold_accepts_short_chunks() {
        let html = enqueue(r#"["post", "text", "Hello"]"#);
        let opts = ParseOptions {
            heuristics: Heuristics {
                min_chunk_len: 10,
                ..Heuristics::default()
            },
            ..ParseOptions::default()
        };

        let messages = parse_share_html(&html, &opts).unwrap();

        assert_eq!(messages, vec![ParsedMessage::new(Role::User, "Hello")]);
    }

    #[test]
    fn falls_back_to_next_data() {
        let html = r#"<script id="__NEXT_DATA__" type="application/json">{"props":{"pageProps":{"serverResponse":{"data":{"linear_conversation":[{"id":"u"}],"mapping":{"u":{"message":{"author":{"role":"user"},"content":{"content_type":"text","parts":["Legacy question"]}}}}}}}}}</script>"#;

        let messages = parse_share_html(html, &ParseOptions::default()).unwrap();

        assert_eq!(messages, vec![ParsedMessage::new(Role::User, "Legacy question")]);
    }

    #[test]
    fn error_codes() {
        assert_eq!(ExtractError::NoDataFound { discarded: 0, min_len: 100 }.code(), "E-PARSE-001");
        assert_eq!(ExtractError::EmptyResult { chunks: 2 }.code(), "E-PARSE-005");
    }
}
