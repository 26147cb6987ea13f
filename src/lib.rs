// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Extract ChatGPT share-link conversations as Markdown.
//!
//! A share page does not expose its conversation through an API. The
//! messages are embedded in the HTML as escaped JSON passed to
//! `streamController.enqueue("…")` calls, serialized as a flat array whose
//! elements refer to each other by position. This crate recovers the
//! ordered user/assistant messages from such a page without running any of
//! its JavaScript.
//!
//! # Overview
//!
//! The pipeline runs in stages, each in its own module:
//!
//! 1. [`fetch`] downloads the page with browser-like headers
//! 2. [`blob`] finds the enqueue bodies
//! 3. [`unescape`] decodes their JavaScript string escapes
//! 4. [`flat`] parses each body into a [`flat::FlatRecord`]
//! 5. [`locate`] finds user and assistant messages by position
//! 6. [`flatten`] turns typed [`content`] into Markdown
//! 7. [`assemble`] orders the results and drops what cannot be shown
//!
//! Pages in the older Next.js format are handled by [`next_data`].
//!
//! # Example
//!
//! ```no_run
//! use share2md::{FetchOptions, ParseOptions, extract_share_link, renderer};
//!
//! let conversation = extract_share_link(
//!     "https://chatgpt.com/share/6801-abcd",
//!     &FetchOptions::default(),
//!     &ParseOptions::default(),
//! )
//! .unwrap();
//!
//! let markdown = renderer::render_conversation(&conversation, &renderer::RenderOptions::default());
//! println!("{markdown}");
//! ```
//!
//! # Privacy
//!
//! Nothing is logged unless [`Diagnostics`] is turned on in the options.

#![deny(missing_docs)]

pub mod assemble;
pub mod blob;
pub mod content;
pub mod diagnostics;
pub mod extract;
pub mod fetch;
pub mod flat;
pub mod flatten;
pub mod locate;
pub mod next_data;
pub mod renderer;
pub mod share_url;
pub mod text;
pub mod unescape;

pub use assemble::{Conversation, ParsedMessage, Role};
pub use diagnostics::Diagnostics;
pub use extract::{ExtractError, ParseOptions, extract_share_link, parse_share_html};
pub use fetch::{FetchError, FetchOptions};
