// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Flattening of message content into Markdown.
//!
//! Each `content_type` has its own flattening rule, looked up in a
//! [`FlattenerRegistry`]. All rules are pure functions returning a single
//! Markdown string and never fail: missing fields flatten to nothing.
//!
//! | `content_type` | Output |
//! |---|---|
//! | `text` | non-blank parts joined by blank lines; a JSON part with a `response` or `content` string yields that string |
//! | `code` | fenced code block, language tag unless `unknown` |
//! | `thoughts` | `_summary: content_` per step, one per line |
//! | `reasoning_recap` | `_recap_` |
//! | `multimodal_text` | text parts and image links joined by blank lines |
//! | `tool_response` | `output` verbatim |
//! | `model_editable_context` | `model_set_context` verbatim |
//! | anything else | string parts joined like `text` |
//!
//! # Example
//!
//! ```
//! use share2md::content::MessageContent;
//! use share2md::flatten::flatten_content;
//!
//! let content = MessageContent::Code {
//!     language: Some("python".into()),
//!     text: "print(1)".into(),
//! };
//!
//! assert_eq!(flatten_content(&content), "```python\nprint(1)\n```");
//! ```

use crate::content::{ContentPart, MessageContent, content_type};
use crate::text::{clean_text, join_paragraphs};
use serde_json::Value;
use std::collections::HashMap;

/// Base URL of the anonymous file-download API for shared conversations.
pub const FILE_DOWNLOAD_ENDPOINT: &str = "https://chatgpt.com/backend-anon/files/download";

const SEDIMENT_PREFIX: &str = "sediment://";
const FILE_SERVICE_PREFIX: &str = "file-service://";

/// Key removed from JSON tool payloads in code blocks.
const RESPONSE_LENGTH_KEY: &str = "response_length";

/// Per-conversation information some flatteners need.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlattenContext {
    /// ID of the shared conversation, used to build attachment URLs.
    pub shared_conversation_id: Option<String>,
}

/// A flattening rule.
pub type Flattener = fn(&MessageContent, &FlattenContext) -> String;

/// Mapping from `content_type` to [`Flattener`].
///
/// [`FlattenerRegistry::default`] holds the built-in rules. Content types
/// without a registered rule use [`flatten_fallback`].
#[derive(Debug, Clone)]
pub struct FlattenerRegistry {
    flatteners: HashMap<String, Flattener>,
}

impl Default for FlattenerRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(content_type::TEXT, flatten_text);
        registry.register(content_type::CODE, flatten_code);
        registry.register(content_type::THOUGHTS, flatten_thoughts);
        registry.register(content_type::REASONING_RECAP, flatten_reasoning_recap);
        registry.register(content_type::MULTIMODAL_TEXT, flatten_multimodal_text);
        registry.register(content_type::TOOL_RESPONSE, flatten_tool_response);
        registry.register(
            content_type::MODEL_EDITABLE_CONTEXT,
            flatten_model_editable_context,
        );
        registry
    }
}

impl FlattenerRegistry {
    /// Creates a registry with no rules; everything uses the fallback.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            flatteners: HashMap::new(),
        }
    }

    /// Registers `flattener` for `content_type`, returning the rule it replaced.
    pub fn register(
        &mut self,
        content_type: impl Into<String>,
        flattener: Flattener,
    ) -> Option<Flattener> {
        self.flatteners.insert(content_type.into(), flattener)
    }

    /// Removes the rule for `content_type`, returning it.
    pub fn unregister(&mut self, content_type: &str) -> Option<Flattener> {
        self.flatteners.remove(content_type)
    }

    /// Returns the rule registered for `content_type`.
    #[must_use]
    pub fn get(&self, content_type: &str) -> Option<Flattener> {
        self.flatteners.get(content_type).copied()
    }

    /// Returns the registered content types, sorted.
    #[must_use]
    pub fn content_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.flatteners.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Flattens `content` with the rule for its type, or the fallback.
    #[must_use]
    pub fn flatten(&self, content: &MessageContent, ctx: &FlattenContext) -> String {
        let flattener = self
            .get(content.content_type())
            .unwrap_or(flatten_fallback as Flattener);
        flattener(content, ctx)
    }
}

/// Flattens `content` with the built-in rules and no conversation context.
#[must_use]
pub fn flatten_content(content: &MessageContent) -> String {
    FlattenerRegistry::default().flatten(content, &FlattenContext::default())
}

/// Rule for `text` content.
#[must_use]
pub fn flatten_text(content: &MessageContent, ctx: &FlattenContext) -> String {
    let MessageContent::Text { parts, text } = content else {
        return flatten_fallback(content, ctx);
    };

    let joined = join_paragraphs(parts.iter().map(|part| unwrap_json_response(part)));
    if !joined.is_empty() {
        return joined;
    }

    text.as_deref()
        .map(clean_text)
        .unwrap_or_default()
}

/// Rule for `code` content.
#[must_use]
pub fn flatten_code(content: &MessageContent, ctx: &FlattenContext) -> String {
    let MessageContent::Code { language, text } = content else {
        return flatten_fallback(content, ctx);
    };

    let lang = language
        .as_deref()
        .filter(|l| !l.is_empty() && *l != "unknown")
        .unwrap_or("");

    let Some(body) = summarize_code_body(text.trim_end()) else {
        return String::new();
    };
    if body.is_empty() {
        return String::new();
    }

    format!("```{lang}\n{body}\n```")
}

/// Rule for `thoughts` content.
#[must_use]
pub fn flatten_thoughts(content: &MessageContent, ctx: &FlattenContext) -> String {
    let MessageContent::Thoughts(thoughts) = content else {
        return flatten_fallback(content, ctx);
    };

    thoughts
        .iter()
        .filter_map(|thought| {
            let combined = [thought.summary.as_str(), thought.content.as_str()]
                .into_iter()
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>()
                .join(": ");
            (!combined.is_empty()).then(|| format!("_{combined}_"))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Rule for `reasoning_recap` content.
#[must_use]
pub fn flatten_reasoning_recap(content: &MessageContent, ctx: &FlattenContext) -> String {
    let MessageContent::ReasoningRecap { text } = content else {
        return flatten_fallback(content, ctx);
    };

    let recap = text.trim();
    if recap.is_empty() {
        String::new()
    } else {
        format!("_{recap}_")
    }
}

/// Rule for `multimodal_text` content.
#[must_use]
pub fn flatten_multimodal_text(content: &MessageContent, ctx: &FlattenContext) -> String {
    let MessageContent::MultimodalText { parts } = content else {
        return flatten_fallback(content, ctx);
    };

    let segments = parts.iter().filter_map(|part| match part {
        ContentPart::Text(text) => Some(clean_text(text)),
        ContentPart::Image {
            asset_pointer,
            prompt,
        } => image_link(asset_pointer, prompt.as_deref(), ctx),
        ContentPart::Other => None,
    });

    join_paragraphs(segments)
}

/// Rule for `tool_response` content.
#[must_use]
pub fn flatten_tool_response(content: &MessageContent, ctx: &FlattenContext) -> String {
    match content {
        MessageContent::ToolResponse { output } => output.clone(),
        other => flatten_fallback(other, ctx),
    }
}

/// Rule for `model_editable_context` content.
#[must_use]
pub fn flatten_model_editable_context(content: &MessageContent, ctx: &FlattenContext) -> String {
    match content {
        MessageContent::ModelEditableContext { context } => context.clone(),
        other => flatten_fallback(other, ctx),
    }
}

/// Rule for content types without a registered flattener.
#[must_use]
pub fn flatten_fallback(content: &MessageContent, _ctx: &FlattenContext) -> String {
    join_paragraphs(
        content
            .string_parts()
            .into_iter()
            .map(clean_text),
    )
}

/// Cleans a text part, unwrapping `{"response": …}` / `{"content": …}` JSON.
fn unwrap_json_response(part: &str) -> String {
    let cleaned = clean_text(part);
    if !(cleaned.starts_with('{') && cleaned.ends_with('}')) {
        return cleaned;
    }

    let Ok(Value::Object(json)) = serde_json::from_str::<Value>(&cleaned) else {
        return cleaned;
    };

    json.get("response")
        .and_then(Value::as_str)
        .or_else(|| json.get("content").and_then(Value::as_str))
        .map_or(cleaned.clone(), str::to_owned)
}

/// Pretty-prints JSON object bodies without `response_length`.
///
/// Returns `None` when the body is a JSON object with nothing else in it.
fn summarize_code_body(body: &str) -> Option<String> {
    let Ok(Value::Object(mut json)) = serde_json::from_str::<Value>(body) else {
        return Some(body.to_owned());
    };

    json.shift_remove(RESPONSE_LENGTH_KEY);
    if json.is_empty() {
        return None;
    }

    serde_json::to_string_pretty(&Value::Object(json))
        .ok()
        .or_else(|| Some(body.to_owned()))
}

/// Builds a Markdown image link for an asset pointer.
///
/// The link targets the download API; it is not resolved here.
fn image_link(asset_pointer: &str, prompt: Option<&str>, ctx: &FlattenContext) -> Option<String> {
    let mut conversation_id = ctx.shared_conversation_id.clone();

    let file_id = if let Some(rest) = asset_pointer.strip_prefix(SEDIMENT_PREFIX) {
        let (id, query) = rest.split_once('?').unwrap_or((rest, ""));
        if conversation_id.is_none() {
            conversation_id = query
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(key, _)| *key == "shared_conversation_id")
                .map(|(_, value)| value.to_owned());
        }
        id
    } else {
        asset_pointer.strip_prefix(FILE_SERVICE_PREFIX)?
    };

    if file_id.is_empty() {
        return None;
    }

    let url = match conversation_id {
        Some(id) => format!("{FILE_DOWNLOAD_ENDPOINT}/{file_id}?shared_conversation_id={id}"),
        None => format!("{FILE_DOWNLOAD_ENDPOINT}/{file_id}"),
    };
    let alt = prompt.filter(|p| !p.is_empty()).unwrap_or("Generated image");

    Some(format!("![{alt}]({url})"))
}
