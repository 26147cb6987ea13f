// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Typed message content payloads.
//!
//! Every message in a share page carries a content object tagged by a
//! `content_type` string. The shape behind each tag differs: plain text uses a
//! `parts` array, code uses `language` and `text`, reasoning uses a list of
//! thoughts, and so on. [`MessageContent`] captures the tags this crate knows
//! how to flatten and keeps anything else as [`MessageContent::Other`].
//!
//! Missing or mistyped fields never fail parsing; they become empty values.
//!
//! # Example
//!
//! ```
//! use share2md::content::MessageContent;
//!
//! let content: MessageContent = serde_json::from_str(
//!     r#"{"content_type": "code", "language": "python", "text": "print(1)"}"#,
//! )
//! .unwrap();
//!
//! assert_eq!(content.content_type(), "code");
//! ```

use serde::Deserialize;
use serde_json::Value;

/// Known `content_type` tags.
pub mod content_type {
    /// Plain text split into parts.
    pub const TEXT: &str = "text";
    /// A code block with an optional language.
    pub const CODE: &str = "code";
    /// Reasoning steps as summary/content pairs.
    pub const THOUGHTS: &str = "thoughts";
    /// A one-line recap of reasoning time.
    pub const REASONING_RECAP: &str = "reasoning_recap";
    /// Text mixed with images and other attachments.
    pub const MULTIMODAL_TEXT: &str = "multimodal_text";
    /// Output returned by a tool call.
    pub const TOOL_RESPONSE: &str = "tool_response";
    /// The model's editable memory context.
    pub const MODEL_EDITABLE_CONTEXT: &str = "model_editable_context";
    /// An image attachment inside multimodal parts.
    pub const IMAGE_ASSET_POINTER: &str = "image_asset_pointer";
}

/// A message content payload, tagged by its `content_type`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageContent {
    /// `text`: string parts, with an optional `text` field used when parts are empty.
    Text {
        /// The string-valued parts, in order.
        parts: Vec<String>,
        /// The `text` field, when present.
        text: Option<String>,
    },
    /// `code`: source text with an optional language tag.
    Code {
        /// The language tag (may be `"unknown"`).
        language: Option<String>,
        /// The code body.
        text: String,
    },
    /// `thoughts`: reasoning steps.
    Thoughts(Vec<Thought>),
    /// `reasoning_recap`: a short reasoning summary.
    ReasoningRecap {
        /// The recap text.
        text: String,
    },
    /// `multimodal_text`: text parts interleaved with attachments.
    MultimodalText {
        /// The parts, in order.
        parts: Vec<ContentPart>,
    },
    /// `tool_response`: tool output.
    ToolResponse {
        /// The output text.
        output: String,
    },
    /// `model_editable_context`: the model's memory context.
    ModelEditableContext {
        /// The `model_set_context` text.
        context: String,
    },
    /// Any other tag, keeping only string-valued parts.
    ///
    /// This variant handles forward compatibility with content types that
    /// may be added to the page format in the future.
    Other {
        /// The original tag (empty if absent).
        content_type: String,
        /// The string-valued parts, in order.
        parts: Vec<String>,
    },
}

/// One reasoning step of a `thoughts` payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Thought {
    /// Short heading of the step.
    pub summary: String,
    /// Body of the step.
    pub content: String,
}

/// A part of a `multimodal_text` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    /// Literal text.
    Text(String),
    /// An image stored by the chat provider.
    Image {
        /// The provider's pointer, e.g. `sediment://file_abc` or `file-service://file-abc`.
        asset_pointer: String,
        /// The image generation prompt, when the image was generated.
        prompt: Option<String>,
    },
    /// A part this crate does not render.
    Other,
}

impl MessageContent {
    /// Builds content from a JSON object.
    ///
    /// A bare string is treated as a single text part.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        if let Some(text) = value.as_str() {
            return Self::Text {
                parts: vec![text.to_owned()],
                text: None,
            };
        }

        let tag = get_str(value, &["content_type"]).unwrap_or_default();
        match tag {
            content_type::TEXT => Self::Text {
                parts: string_parts(value),
                text: get_string(value, &["text"]),
            },
            content_type::CODE => Self::Code {
                language: get_string(value, &["language"]),
                text: get_string(value, &["text"]).unwrap_or_default(),
            },
            content_type::THOUGHTS => Self::Thoughts(extract_thoughts(value)),
            content_type::REASONING_RECAP => Self::ReasoningRecap {
                text: get_string(value, &["text"]).unwrap_or_default(),
            },
            content_type::MULTIMODAL_TEXT => Self::MultimodalText {
                parts: value
                    .get("parts")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .map(ContentPart::from_value)
                    .collect(),
            },
            content_type::TOOL_RESPONSE => Self::ToolResponse {
                output: get_string(value, &["output"]).unwrap_or_default(),
            },
            content_type::MODEL_EDITABLE_CONTEXT => Self::ModelEditableContext {
                context: get_string(value, &["model_set_context"]).unwrap_or_default(),
            },
            other => Self::Other {
                content_type: other.to_owned(),
                parts: string_parts(value),
            },
        }
    }

    /// Returns the `content_type` tag this payload was parsed from.
    #[must_use]
    pub fn content_type(&self) -> &str {
        match self {
            Self::Text { .. } => content_type::TEXT,
            Self::Code { .. } => content_type::CODE,
            Self::Thoughts(_) => content_type::THOUGHTS,
            Self::ReasoningRecap { .. } => content_type::REASONING_RECAP,
            Self::MultimodalText { .. } => content_type::MULTIMODAL_TEXT,
            Self::ToolResponse { .. } => content_type::TOOL_RESPONSE,
            Self::ModelEditableContext { .. } => content_type::MODEL_EDITABLE_CONTEXT,
            Self::Other { content_type, .. } => content_type.as_str(),
        }
    }

    /// Returns the plain string parts of this payload, if it has any.
    ///
    /// Used by the fallback flattener.
    #[must_use]
    pub fn string_parts(&self) -> Vec<&str> {
        match self {
            Self::Text { parts, .. } | Self::Other { parts, .. } => {
                parts.iter().map(String::as_str).collect()
            }
            Self::MultimodalText { parts } => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text(text) => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

impl<'de> Deserialize<'de> for MessageContent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_value(&value))
    }
}

impl ContentPart {
    fn from_value(value: &Value) -> Self {
        if let Some(text) = value.as_str() {
            return Self::Text(text.to_owned());
        }

        let tag = get_str(value, &["content_type"]).or_else(|| get_str(value, &["type"]));
        match tag {
            Some(content_type::IMAGE_ASSET_POINTER) => {
                match get_string(value, &["asset_pointer"]) {
                    Some(asset_pointer) => Self::Image {
                        asset_pointer,
                        prompt: get_string(value, &["metadata", "dalle", "prompt"]),
                    },
                    None => Self::Other,
                }
            }
            Some(content_type::TEXT) => match value.get("text") {
                Some(Value::String(text)) => Self::Text(text.clone()),
                Some(Value::Array(texts)) => Self::Text(
                    texts
                        .iter()
                        .filter_map(Value::as_str)
                        .collect::<Vec<_>>()
                        .join("\n\n"),
                ),
                _ => Self::Other,
            },
            _ => Self::Other,
        }
    }
}

fn extract_thoughts(value: &Value) -> Vec<Thought> {
    value
        .get("thoughts")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .map(|thought| Thought {
            summary: get_string(thought, &["summary"]).unwrap_or_default(),
            content: get_string(thought, &["content"]).unwrap_or_default(),
        })
        .collect()
}

/// Collects the string-valued entries of the `parts` array.
fn string_parts(value: &Value) -> Vec<String> {
    value
        .get("parts")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
        .map(str::to_owned)
        .collect()
}

/// Navigates a JSON path and returns the string value at the end.
pub(crate) fn get_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_str()
}

/// Like [`get_str`] but returns an owned `String`.
fn get_string(value: &Value, path: &[&str]) -> Option<String> {
    get_str(value, path).map(str::to_owned)
}
