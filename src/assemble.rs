// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Assembly of located messages into an ordered conversation.

use crate::diagnostics::{Diagnostics, diag};
use crate::flatten::{FlattenContext, FlattenerRegistry};
use crate::locate::{Author, LocatedMessage};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Speaker of a conversation message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person who shared the conversation.
    User,
    /// The model, including tool output shown in its turn.
    Assistant,
}

impl Role {
    /// Maps an author to a presentable role.
    ///
    /// System prompts and unknown authors have no role and are dropped.
    #[must_use]
    pub const fn from_author(author: &Author) -> Option<Self> {
        match author {
            Author::User => Some(Self::User),
            Author::Assistant | Author::Tool => Some(Self::Assistant),
            Author::System | Author::Other(_) => None,
        }
    }

    /// Returns the lowercase role name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message of an extracted conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedMessage {
    /// Who said it.
    pub role: Role,
    /// Flattened Markdown content, never empty.
    pub content: String,
}

impl ParsedMessage {
    /// Creates a message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// A conversation extracted from a share link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Conversation {
    /// The share URL the conversation was fetched from.
    pub source_url: String,
    /// When the page was fetched.
    pub fetched_at: Option<DateTime<Utc>>,
    /// The messages, in conversation order.
    pub messages: Vec<ParsedMessage>,
}

/// Flattens located messages and keeps the presentable ones.
///
/// Messages keep their input order. Authors without a [`Role`] are dropped,
/// as are messages whose flattened content is empty. Identical messages are
/// all kept.
#[must_use]
pub fn assemble(
    located: Vec<LocatedMessage>,
    registry: &FlattenerRegistry,
    ctx: &FlattenContext,
    diagnostics: Diagnostics,
) -> Vec<ParsedMessage> {
    let mut messages = Vec::with_capacity(located.len());

    for message in located {
        let Some(role) = Role::from_author(&message.author) else {
            diag!(
                diagnostics,
                position = message.position,
                author = ?message.author,
                "dropping message without presentable role"
            );
            continue;
        };

        let flattened = registry.flatten(&message.content, ctx);
        let content = flattened.trim().to_owned();
        if content.is_empty() {
            diag!(
                diagnostics,
                position = message.position,
                content_type = message.content.content_type(),
                "dropping message with empty content"
            );
            continue;
        }

        diag!(
            diagnostics,
            %role,
            position = message.position,
            content_type = message.content.content_type(),
            chars = content.chars().count(),
            sample = ?diagnostics.sample(&content),
            "assembled message"
        );
        messages.push(ParsedMessage { role, content });
    }

    messages
}
