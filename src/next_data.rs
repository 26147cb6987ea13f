// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Legacy share pages with a Next.js `__NEXT_DATA__` payload.
//!
//! Older share pages embed the whole conversation as a JSON document under
//! `props.pageProps.serverResponse.data`. Messages live in a `mapping` from
//! node ID to node, and `linear_conversation` lists the node IDs in display
//! order. Pages without `linear_conversation` are walked from the root node
//! along the first child of each node.

use crate::content::{MessageContent, content_type, get_str};
use crate::diagnostics::{Diagnostics, diag};
use crate::locate::{Author, LocatedMessage};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;

/// Messages extracted from a `__NEXT_DATA__` document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NextDataPayload {
    /// Presentable messages in display order.
    pub messages: Vec<LocatedMessage>,
    /// The shared conversation ID, used for attachment links.
    pub shared_conversation_id: Option<String>,
}

/// Why a node was left out of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The ID is not present in the mapping.
    NoNode,
    /// The node has no message.
    NoMessage,
    /// The message is a system prompt.
    SystemRole,
    /// The author role is not user, assistant or tool.
    InvalidRole,
    /// Reasoning steps, which the page does not show.
    HiddenThoughts,
    /// Tool-call code, which the page does not show.
    HiddenCode,
    /// Flagged as hidden from the conversation.
    VisuallyHidden,
    /// Redacted by the provider.
    Redacted,
    /// A user-level system message such as custom instructions.
    UserSystemMessage,
    /// An in-progress reasoning status message.
    ReasoningStatus,
    /// The message has no content object.
    NoContent,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            Self::NoNode => "no_node",
            Self::NoMessage => "no_message",
            Self::SystemRole => "system_role",
            Self::InvalidRole => "invalid_role",
            Self::HiddenThoughts => "hidden_thoughts",
            Self::HiddenCode => "hidden_code",
            Self::VisuallyHidden => "visually_hidden",
            Self::Redacted => "redacted",
            Self::UserSystemMessage => "user_system_message",
            Self::ReasoningStatus => "reasoning_status",
            Self::NoContent => "no_content",
        };
        f.write_str(reason)
    }
}

/// Parses the text of a `__NEXT_DATA__` script.
///
/// Returns `None` if the text is not JSON or has no conversation data.
#[must_use]
pub fn parse_next_data(json: &str, diagnostics: Diagnostics) -> Option<NextDataPayload> {
    let document: Value = match serde_json::from_str(json) {
        Ok(document) => document,
        Err(e) => {
            diag!(diagnostics, error = %e, "__NEXT_DATA__ is not valid JSON");
            return None;
        }
    };

    let page_props = document.get("props")?.get("pageProps")?;
    let server_response = page_props.get("serverResponse")?;
    let data = server_response.get("data")?;
    let mapping = data.get("mapping").and_then(Value::as_object);

    let shared_conversation_id = get_str(server_response, &["sharedConversationId"])
        .or_else(|| get_str(page_props, &["sharedConversationId"]))
        .map(str::to_owned);

    let order = display_order(data);
    diag!(
        diagnostics,
        nodes = mapping.map_or(0, serde_json::Map::len),
        sequence = order.len(),
        "parsed __NEXT_DATA__ payload"
    );

    let mut messages = Vec::new();
    let mut fallback_conversation_id = None;

    for (position, id) in order.iter().enumerate() {
        let node = mapping.and_then(|m| m.get(*id));
        match convert_node(node) {
            Ok((message, conversation_id)) => {
                if fallback_conversation_id.is_none() {
                    fallback_conversation_id = conversation_id;
                }
                messages.push(LocatedMessage {
                    position,
                    ..message
                });
            }
            Err(reason) => {
                diag!(diagnostics, position, %reason, "skipping node");
            }
        }
    }

    Some(NextDataPayload {
        messages,
        shared_conversation_id: shared_conversation_id.or(fallback_conversation_id),
    })
}

/// Node IDs in display order.
fn display_order(data: &Value) -> Vec<&str> {
    if let Some(sequence) = data.get("linear_conversation").and_then(Value::as_array) {
        return sequence
            .iter()
            .filter_map(|entry| get_str(entry, &["id"]))
            .collect();
    }

    let Some(mapping) = data.get("mapping").and_then(Value::as_object) else {
        return Vec::new();
    };

    let root = mapping.iter().find_map(|(id, node)| {
        let parent = node.get("parent");
        parent.is_none_or(Value::is_null).then_some(id.as_str())
    });

    let mut order = Vec::new();
    let mut seen = HashSet::new();
    let mut current = root;
    while let Some(id) = current {
        if !seen.insert(id) {
            break;
        }
        order.push(id);
        current = mapping
            .get(id)
            .and_then(|node| node.get("children"))
            .and_then(Value::as_array)
            .and_then(|children| children.first())
            .and_then(Value::as_str);
    }
    order
}

/// Converts one mapping node, returning the message and its conversation ID.
fn convert_node(node: Option<&Value>) -> Result<(LocatedMessage, Option<String>), SkipReason> {
    let node = node.ok_or(SkipReason::NoNode)?;
    let message = node
        .get("message")
        .filter(|m| !m.is_null())
        .ok_or(SkipReason::NoMessage)?;

    let role = get_str(message, &["author", "role"]).unwrap_or_default();
    let author = match Author::from_role(role) {
        Author::System => return Err(SkipReason::SystemRole),
        Author::Other(_) => return Err(SkipReason::InvalidRole),
        author => author,
    };

    match get_str(message, &["content", "content_type"]) {
        Some(content_type::THOUGHTS) => return Err(SkipReason::HiddenThoughts),
        Some(content_type::CODE) => return Err(SkipReason::HiddenCode),
        _ => {}
    }

    let flag = |key: &str| {
        message
            .get("metadata")
            .and_then(|m| m.get(key))
            .is_some_and(is_truthy)
    };
    if flag("is_visually_hidden_from_conversation") {
        return Err(SkipReason::VisuallyHidden);
    }
    if flag("is_redacted") {
        return Err(SkipReason::Redacted);
    }
    if flag("is_user_system_message") {
        return Err(SkipReason::UserSystemMessage);
    }
    if flag("reasoning_status") {
        return Err(SkipReason::ReasoningStatus);
    }

    let content = message
        .get("content")
        .filter(|c| !c.is_null())
        .ok_or(SkipReason::NoContent)?;

    let conversation_id =
        get_str(message, &["metadata", "shared_conversation_id"]).map(str::to_owned);

    Ok((
        LocatedMessage {
            author,
            position: 0,
            content: MessageContent::from_value(content),
        },
        conversation_id,
    ))
}

/// JavaScript-style truthiness for metadata flags.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}
