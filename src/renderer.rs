// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Markdown rendering for extracted conversations.
//!
//! This module turns a [`Conversation`] into a readable Markdown document.
//!
//! # Output Format
//!
//! The rendered Markdown includes:
//! - A top-level heading with the conversation title
//! - Optional metadata (source link, fetch time)
//! - `## User` and `## Assistant` sections for each message
//!
//! # Example
//!
//! ```
//! use share2md::assemble::{Conversation, ParsedMessage, Role};
//! use share2md::renderer::{render_conversation, RenderOptions};
//!
//! let conversation = Conversation {
//!     source_url: "https://chatgpt.com/share/abc".into(),
//!     fetched_at: None,
//!     messages: vec![
//!         ParsedMessage::new(Role::User, "Hello!"),
//!         ParsedMessage::new(Role::Assistant, "Hi there!"),
//!     ],
//! };
//!
//! let markdown = render_conversation(&conversation, &RenderOptions::default());
//!
//! assert!(markdown.starts_with("# ChatGPT Conversation"));
//! assert!(markdown.contains("Hello!"));
//! assert!(markdown.contains("Hi there!"));
//! ```

use crate::assemble::{Conversation, ParsedMessage, Role};
use std::fmt::Write;

/// Title used when none is given.
pub const DEFAULT_TITLE: &str = "ChatGPT Conversation";

/// Configuration options for Markdown rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderOptions {
    /// Whether to include the time the page was fetched.
    pub show_timestamps: bool,

    /// Whether to include the share URL under the title.
    pub show_source: bool,

    /// Number of heading levels to shift (0-5).
    ///
    /// A value of 0 produces H1/H2 headings (default).
    /// A value of 1 produces H2/H3 headings, useful for embedding.
    pub heading_offset: u8,

    /// Document title; [`DEFAULT_TITLE`] when `None`.
    pub title: Option<String>,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            show_timestamps: false,
            show_source: true,
            heading_offset: 0,
            title: None,
        }
    }
}

/// Returns a markdown heading prefix with the given level and offset.
///
/// The heading level is clamped to a maximum of 6 (H6).
fn heading(level: u8, offset: u8) -> String {
    let actual = (level + offset).min(6);
    "#".repeat(actual as usize)
}

/// Renders a conversation as a Markdown document.
#[must_use]
pub fn render_conversation(conversation: &Conversation, opts: &RenderOptions) -> String {
    let mut out = String::new();
    let title = opts.title.as_deref().unwrap_or(DEFAULT_TITLE);
    writeln!(out, "{} {}\n", heading(1, opts.heading_offset), escape_xml_tags(title)).unwrap();

    let timestamp = conversation
        .fetched_at
        .map(|dt| dt.format("%Y-%m-%d %H:%M UTC").to_string());

    let metadata = match (opts.show_source, opts.show_timestamps, &timestamp) {
        (true, true, Some(ts)) => format!("*{} · fetched {ts}*", conversation.source_url),
        (true, _, _) => format!("*{}*", conversation.source_url),
        (false, true, Some(ts)) => format!("*Fetched {ts}*"),
        _ => String::new(),
    };
    if !metadata.is_empty() {
        writeln!(out, "{metadata}\n").unwrap();
    }

    for message in &conversation.messages {
        render_message(&mut out, message, opts);
    }

    out
}

fn render_message(out: &mut String, message: &ParsedMessage, opts: &RenderOptions) {
    let content = message.content.trim();
    if content.is_empty() || is_only_code_fences(content) {
        return;
    }

    let label = match message.role {
        Role::User => "User",
        Role::Assistant => "Assistant",
    };
    writeln!(out, "{} {label}\n", heading(2, opts.heading_offset)).unwrap();
    writeln!(out, "{}\n", escape_outside_code(content)).unwrap();
}

/// Returns `true` if the string contains only code fence markers and whitespace.
fn is_only_code_fences(s: &str) -> bool {
    s.lines().all(|line| {
        let trimmed = line.trim();
        trimmed.is_empty() || trimmed == "```"
    })
}

/// Escapes tags in prose while leaving fenced code blocks untouched.
fn escape_outside_code(s: &str) -> String {
    let mut in_fence = false;
    s.split('\n')
        .map(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                line.to_owned()
            } else if in_fence {
                line.to_owned()
            } else {
                escape_xml_tags(line)
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Escapes XML/HTML-like tags so they render literally in Markdown.
///
/// Uses HTML entities (`&lt;` `&gt;`) which are more reliably rendered across
/// markdown viewers. Only escapes `<` when followed by a letter, `/`, or `!`
/// to avoid false positives on mathematical comparisons like `x < 5`.
fn escape_xml_tags(s: &str) -> String {
    let mut result = String::with_capacity(s.len() * 2);
    let mut chars = s.chars().peekable();
    let mut in_tag = false;

    while let Some(c) = chars.next() {
        if c == '<' {
            let is_tag_start = chars
                .peek()
                .is_some_and(|&next| next.is_ascii_alphabetic() || next == '/' || next == '!');

            if is_tag_start {
                result.push_str("&lt;");
                in_tag = true;
            } else {
                result.push(c);
            }
        } else if c == '>' && in_tag {
            result.push_str("&gt;");
            in_tag = false;
        } else {
            result.push(c);
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn make_conversation(messages: Vec<ParsedMessage>) -> Conversation {
        Conversation {
            source_url: "https://chatgpt.com/share/abc".into(),
            fetched_at: Utc.timestamp_millis_opt(1_733_356_800_000).single(), // 2024-12-05 00:00:00 UTC
            messages,
        }
    }

    fn exchange(question: &str, answer: &str) -> Vec<ParsedMessage> {
        vec![
            ParsedMessage::new(Role::User, question),
            ParsedMessage::new(Role::Assistant, answer),
        ]
    }

    fn default_opts() -> RenderOptions {
        RenderOptions::default()
    }

    #[test]
    fn renders_basic_structure() {
        let output = render_conversation(&make_conversation(exchange("Hello", "Hi!")), &default_opts());

        assert!(output.starts_with("# ChatGPT Conversation\n\n"));
        assert!(output.contains("## User\n\nHello\n"));
        assert!(output.contains("## Assistant\n\nHi!\n"));
    }

    #[test]
    fn renders_custom_title() {
        let opts = RenderOptions {
            title: Some("Rust questions".into()),
            ..Default::default()
        };
        let output = render_conversation(&make_conversation(vec![]), &opts);

        assert!(output.starts_with("# Rust questions\n"));
    }

    #[test]
    fn renders_source_by_default() {
        let output = render_conversation(&make_conversation(vec![]), &default_opts());

        assert!(output.contains("*https://chatgpt.com/share/abc*"));
        assert!(!output.contains("2024-12-05"));
    }

    #[test]
    fn renders_source_and_timestamp_when_enabled() {
        let opts = RenderOptions {
            show_timestamps: true,
            ..Default::default()
        };
        let output = render_conversation(&make_conversation(vec![]), &opts);

        assert!(output.contains("*https://chatgpt.com/share/abc · fetched 2024-12-05 00:00 UTC*"));
    }

    #[test]
    fn renders_timestamp_without_source() {
        let opts = RenderOptions {
            show_timestamps: true,
            show_source: false,
            ..Default::default()
        };
        let output = render_conversation(&make_conversation(vec![]), &opts);

        assert!(output.contains("*Fetched 2024-12-05 00:00 UTC*"));
        assert!(!output.contains("chatgpt.com"));
    }

    #[test]
    fn hides_all_metadata() {
        let opts = RenderOptions {
            show_source: false,
            ..Default::default()
        };
        let output = render_conversation(&make_conversation(exchange("Q?", "A.")), &opts);

        assert_eq!(output, "# ChatGPT Conversation\n\n## User\n\nQ?\n\n## Assistant\n\nA.\n\n");
    }

    #[test]
    fn applies_heading_offset() {
        let opts = RenderOptions {
            heading_offset: 2,
            ..Default::default()
        };
        let output = render_conversation(&make_conversation(exchange("Q?", "A.")), &opts);

        assert!(output.starts_with("### ChatGPT Conversation"));
        assert!(output.contains("#### User"));
    }

    #[test]
    fn heading_level_is_clamped() {
        assert_eq!(heading(2, 5), "######");
    }

    #[test]
    fn renders_multiple_assistant_turns() {
        let mut messages = exchange("Question", "First answer");
        messages.push(ParsedMessage::new(Role::Assistant, "Second answer"));
        let output = render_conversation(&make_conversation(messages), &default_opts());

        assert_eq!(output.matches("## User").count(), 1);
        assert_eq!(output.matches("## Assistant").count(), 2);
    }

    #[test]
    fn skips_code_fence_only_messages() {
        let output = render_conversation(
            &make_conversation(exchange("Hi", "```\n```")),
            &default_opts(),
        );

        assert!(!output.contains("## Assistant"));
    }

    // Tests for escape_xml_tags helper
    #[test]
    fn escapes_xml_tags() {
        assert_eq!(escape_xml_tags("<div>"), "&lt;div&gt;");
        assert_eq!(escape_xml_tags("</div>"), "&lt;/div&gt;");
        assert_eq!(escape_xml_tags("<!DOCTYPE>"), "&lt;!DOCTYPE&gt;");
    }

    #[test]
    fn preserves_non_tag_less_than() {
        assert_eq!(escape_xml_tags("a < b"), "a < b");
        assert_eq!(escape_xml_tags("x<5"), "x<5");
        assert_eq!(escape_xml_tags("value<"), "value<");
    }

    #[test]
    fn escapes_mixed_content() {
        assert_eq!(
            escape_xml_tags("Use <code> for x < 5"),
            "Use &lt;code&gt; for x < 5"
        );
    }

    #[test]
    fn leaves_code_blocks_unescaped() {
        let text = "Use <b>bold</b>:\n```html\n<b>bold</b>\n```\nDone <i>";

        assert_eq!(
            escape_outside_code(text),
            "Use &lt;b&gt;bold&lt;/b&gt;:\n```html\n<b>bold</b>\n```\nDone &lt;i&gt;"
        );
    }

    #[test]
    fn escapes_xml_in_messages() {
        let output = render_conversation(
            &make_conversation(exchange("<instructions>do stuff</instructions>", "ok")),
            &default_opts(),
        );

        assert!(output.contains("&lt;instructions&gt;"));
        assert!(output.contains("&lt;/instructions&gt;"));
    }

    // Tests for is_only_code_fences helper
    #[test]
    fn detects_code_fence_only() {
        assert!(is_only_code_fences("```"));
        assert!(is_only_code_fences("```\n```"));
        assert!(is_only_code_fences("\n```\n\n```\n"));
    }

    #[test]
    fn detects_non_code_fence_content() {
        assert!(!is_only_code_fences("```rust\nfn main() {}\n```"));
        assert!(!is_only_code_fences("some text"));
    }
}
