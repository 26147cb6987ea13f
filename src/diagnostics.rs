// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Opt-in diagnostic logging for the extraction pipeline.
//!
//! Share pages contain other people's conversations, so the pipeline stays
//! silent unless a caller asks otherwise. Every `tracing` event in this crate
//! is emitted behind a [`Diagnostics`] check; with the default
//! [`Diagnostics::Off`] not a single event reaches the subscriber.
//!
//! [`Diagnostics::Metadata`] reports structure only (chunk counts, array
//! positions, lengths). [`Diagnostics::Content`] additionally includes short
//! samples of the conversation text and is intended for local development.

/// Longest sample of conversation text included in a log event.
pub const MAX_SAMPLE_CHARS: usize = 100;

/// How much the pipeline is allowed to log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Diagnostics {
    /// No log events at all.
    #[default]
    Off,
    /// Structural events: counts, positions, lengths. Never message text.
    Metadata,
    /// Structural events plus truncated samples of message text.
    Content,
}

impl Diagnostics {
    /// Returns `true` if any diagnostic events may be emitted.
    #[must_use]
    pub const fn enabled(self) -> bool {
        !matches!(self, Self::Off)
    }

    /// Returns `true` if events may carry conversation text.
    #[must_use]
    pub const fn includes_content(self) -> bool {
        matches!(self, Self::Content)
    }

    /// Returns a loggable sample of `text`, or `None` if content logging is off.
    ///
    /// Samples longer than [`MAX_SAMPLE_CHARS`] are cut and suffixed with the
    /// full character count.
    #[must_use]
    pub fn sample(self, text: &str) -> Option<String> {
        if !self.includes_content() {
            return None;
        }

        let total = text.chars().count();
        if total <= MAX_SAMPLE_CHARS {
            return Some(text.to_owned());
        }

        let head: String = text.chars().take(MAX_SAMPLE_CHARS).collect();
        Some(format!("{head}... ({total} chars)"))
    }
}

/// Emits a `tracing::debug!` event only when diagnostics are enabled.
macro_rules! diag {
    ($diagnostics:expr, $($arg:tt)+) => {
        if $diagnostics.enabled() {
            ::tracing::debug!($($arg)+);
        }
    };
}

pub(crate) use diag;
