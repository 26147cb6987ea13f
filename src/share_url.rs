// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Recognition of conversation share links.
//!
//! ChatGPT links are accepted in both their current `chatgpt.com` form and the
//! older `chat.openai.com` form, which is rewritten to `chatgpt.com`. Claude
//! and Gemini share links are recognised so callers can report them as
//! unsupported instead of failing to find data in the page.

use snafu::prelude::*;
use std::fmt;
use url::Url;

/// Chat provider a share link belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Provider {
    /// `chatgpt.com` and `chat.openai.com`.
    ChatGpt,
    /// `claude.ai`.
    Claude,
    /// `gemini.google.com`.
    Gemini,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ChatGpt => "ChatGPT",
            Self::Claude => "Claude",
            Self::Gemini => "Gemini",
        })
    }
}

/// Error type for share link recognition.
#[derive(Debug, Snafu)]
pub enum ShareUrlError {
    /// The input is not an absolute URL.
    #[snafu(display("invalid URL '{input}': {source}"))]
    Invalid {
        /// The rejected input.
        input: String,
        /// The underlying parse error.
        source: url::ParseError,
    },

    /// The URL is not HTTP(S).
    #[snafu(display("unsupported URL scheme '{scheme}' in '{input}'"))]
    Scheme {
        /// The rejected input.
        input: String,
        /// The scheme found.
        scheme: String,
    },

    /// The URL does not point at a known share page.
    #[snafu(display("'{input}' is not a recognised share link"))]
    NotShareLink {
        /// The rejected input.
        input: String,
    },
}

/// A recognised share link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareUrl {
    provider: Provider,
    share_id: String,
    url: Url,
}

impl ShareUrl {
    /// Parses and normalises a share link.
    ///
    /// # Errors
    ///
    /// Returns a [`ShareUrlError`] if `input` is not an HTTP(S) URL pointing at
    /// a share page of a known provider.
    ///
    /// # Example
    ///
    /// ```
    /// use share2md::share_url::{Provider, ShareUrl};
    ///
    /// let link = ShareUrl::parse("https://chat.openai.com/share/abc-123").unwrap();
    /// assert_eq!(link.provider(), Provider::ChatGpt);
    /// assert_eq!(link.as_str(), "https://chatgpt.com/share/abc-123");
    /// ```
    pub fn parse(input: &str) -> Result<Self, ShareUrlError> {
        let trimmed = input.trim();
        let mut url = Url::parse(trimmed).context(InvalidSnafu { input: trimmed })?;

        ensure!(
            matches!(url.scheme(), "http" | "https"),
            SchemeSnafu {
                input: trimmed,
                scheme: url.scheme(),
            }
        );

        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host).to_owned();
        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        let (provider, share_id) = match (host.as_str(), segments.as_slice()) {
            ("chatgpt.com" | "chat.openai.com", ["share" | "s", id]) => (Provider::ChatGpt, *id),
            ("claude.ai", ["share", id]) => (Provider::Claude, *id),
            ("gemini.google.com", ["share", id]) => (Provider::Gemini, *id),
            _ => return NotShareLinkSnafu { input: trimmed }.fail(),
        };
        let share_id = share_id.to_owned();

        if provider == Provider::ChatGpt {
            url.set_scheme("https")
                .ok()
                .context(SchemeSnafu {
                    input: trimmed,
                    scheme: url.scheme().to_owned(),
                })?;
            url.set_host(Some("chatgpt.com"))
                .context(InvalidSnafu { input: trimmed })?;
        }
        url.set_fragment(None);

        Ok(Self {
            provider,
            share_id,
            url,
        })
    }

    /// The provider the link belongs to.
    #[must_use]
    pub const fn provider(&self) -> Provider {
        self.provider
    }

    /// The share ID from the path.
    #[must_use]
    pub fn share_id(&self) -> &str {
        &self.share_id
    }

    /// The normalised URL.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

impl fmt::Display for ShareUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
