// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Positional search for messages inside a [`FlatRecord`].
//!
//! The flat array has no schema the page publishes, so messages are found by
//! looking for known key/value sequences:
//!
//! - the user's prompt is a `"text"` key followed by its string, preceded
//!   within a short window by one of the marker keys of an authored post;
//! - each assistant turn starts at a `"role"`, `"assistant"` pair and its
//!   content sits behind the index reference that follows the next `"parts"`
//!   key.
//!
//! All window sizes and markers live in [`Heuristics`] so they can be tuned
//! when the page format drifts. Failing to match is never an error: the chunk
//! simply holds no message of that kind.

use crate::content::MessageContent;
use crate::flat::{FlatRecord, IndexRef, Slot};
use serde_json::Value;

/// Minimum length of a chunk body, in characters.
pub const DEFAULT_MIN_CHUNK_LEN: usize = crate::blob::MIN_CHUNK_LEN;

/// How many elements before a user `"text"` key are searched for a marker.
pub const DEFAULT_USER_MARKER_WINDOW: usize = 15;

/// Keys that identify the user's own post near its text.
pub const DEFAULT_USER_MARKERS: &[&str] = &["post", "attachments"];

/// User text must be longer than this many characters.
pub const DEFAULT_MIN_USER_TEXT_CHARS: usize = 3;

/// How far past an assistant role pair the `"parts"` key may appear.
pub const DEFAULT_ASSISTANT_PARTS_WINDOW: usize = 40;

/// Tunable parameters of the positional search.
///
/// The defaults were tuned against live share pages. They have no documented
/// derivation and need re-checking whenever extraction starts coming back
/// empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heuristics {
    /// Enqueue bodies shorter than this are ignored.
    pub min_chunk_len: usize,
    /// Size of the backward window searched for a user marker.
    pub user_marker_window: usize,
    /// Marker keys confirming a `"text"` value belongs to the user's post.
    pub user_markers: Vec<String>,
    /// User text must be strictly longer than this.
    pub min_user_text_chars: usize,
    /// Size of the forward window searched for `"parts"`.
    pub assistant_parts_window: usize,
}

impl Default for Heuristics {
    fn default() -> Self {
        Self {
            min_chunk_len: DEFAULT_MIN_CHUNK_LEN,
            user_marker_window: DEFAULT_USER_MARKER_WINDOW,
            user_markers: DEFAULT_USER_MARKERS.iter().map(|m| (*m).to_owned()).collect(),
            min_user_text_chars: DEFAULT_MIN_USER_TEXT_CHARS,
            assistant_parts_window: DEFAULT_ASSISTANT_PARTS_WINDOW,
        }
    }
}

/// Who authored a located message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Author {
    /// The person who shared the conversation.
    User,
    /// The model.
    Assistant,
    /// A system prompt.
    System,
    /// A tool invoked by the model.
    Tool,
    /// Any other author role.
    Other(String),
}

impl Author {
    /// Maps a role string to an author.
    #[must_use]
    pub fn from_role(role: &str) -> Self {
        match role {
            "user" => Self::User,
            "assistant" => Self::Assistant,
            "system" => Self::System,
            "tool" => Self::Tool,
            other => Self::Other(other.to_owned()),
        }
    }
}

/// A message found in a chunk, before flattening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedMessage {
    /// Who wrote it.
    pub author: Author,
    /// Position of the match in the flat array.
    pub position: usize,
    /// The content to flatten.
    pub content: MessageContent,
}

/// Finds the user's prompt: the first confirmed `"text"` pair.
#[must_use]
pub fn find_user_message(record: &FlatRecord, heuristics: &Heuristics) -> Option<LocatedMessage> {
    let len = record.len();

    for i in 0..len.saturating_sub(1) {
        if !record.slot(i).is_some_and(|slot| slot.is_str("text")) {
            continue;
        }
        let Some(Slot::Str(text)) = record.slot(i + 1) else {
            continue;
        };
        if text.chars().count() <= heuristics.min_user_text_chars {
            continue;
        }
        if !has_marker_before(record, i, heuristics) {
            continue;
        }

        return Some(LocatedMessage {
            author: Author::User,
            position: i + 1,
            content: MessageContent::Text {
                parts: vec![text.to_owned()],
                text: None,
            },
        });
    }

    None
}

/// Finds every assistant turn, in array order.
#[must_use]
pub fn find_assistant_messages(record: &FlatRecord, heuristics: &Heuristics) -> Vec<LocatedMessage> {
    let len = record.len();
    let mut found = Vec::new();

    for i in 0..len.saturating_sub(1) {
        let is_role_pair = record.slot(i).is_some_and(|slot| slot.is_str("role"))
            && record.slot(i + 1).is_some_and(|slot| slot.is_str("assistant"));
        if !is_role_pair {
            continue;
        }

        if let Some(content) = assistant_content(record, i, heuristics) {
            found.push(LocatedMessage {
                author: Author::Assistant,
                position: i,
                content,
            });
        }
    }

    found
}

/// Finds the user message followed by all assistant messages of one chunk.
#[must_use]
pub fn locate_messages(record: &FlatRecord, heuristics: &Heuristics) -> Vec<LocatedMessage> {
    let mut messages: Vec<LocatedMessage> = find_user_message(record, heuristics).into_iter().collect();
    messages.extend(find_assistant_messages(record, heuristics));
    messages
}

fn has_marker_before(record: &FlatRecord, index: usize, heuristics: &Heuristics) -> bool {
    let start = index.saturating_sub(heuristics.user_marker_window);
    (start..index).any(|k| {
        record
            .slot(k)
            .and_then(|slot| slot.as_str())
            .is_some_and(|s| heuristics.user_markers.iter().any(|m| m == s))
    })
}

/// Follows the first `"parts"` key after the role pair at `role_index`.
fn assistant_content(
    record: &FlatRecord,
    role_index: usize,
    heuristics: &Heuristics,
) -> Option<MessageContent> {
    let end = (role_index + heuristics.assistant_parts_window).min(record.len().saturating_sub(1));

    let parts_index = (role_index + 2..end).find(|&j| record.slot(j).is_some_and(|slot| slot.is_str("parts")))?;

    let Some(Slot::IndexRef(target)) = record.slot(parts_index + 1) else {
        return None;
    };

    match record.deref(target)? {
        Value::String(text) => Some(MessageContent::Text {
            parts: vec![text.clone()],
            text: None,
        }),
        object @ Value::Object(_) => Some(MessageContent::from_value(&record.resolve(object))),
        Value::Array(items) => Some(MessageContent::Text {
            parts: items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => n
                        .as_u64()
                        .and_then(|n| usize::try_from(n).ok())
                        .and_then(|n| record.deref(IndexRef(n)))
                        .and_then(Value::as_str)
                        .map(str::to_owned),
                    _ => None,
                })
                .collect(),
            text: None,
        }),
        _ => None,
    }
}
