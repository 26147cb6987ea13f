// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! The flat, index-referencing array carried by each enqueue chunk.
//!
//! Share-page loader data is serialized as one top-level JSON array. Shared
//! substructures are stored once and referred to by position: a value of the
//! form `[7]` means "whatever is at position 7". [`FlatRecord`] wraps the
//! parsed array and exposes each element as a [`Slot`], making those
//! references explicit as [`IndexRef`] values with bounds-checked lookup.
//!
//! Objects inside the array use the same convention for their members: keys
//! look like `"_12"` (the key text lives at position 12) and integer values
//! point at other positions. [`FlatRecord::resolve`] expands such objects into
//! ordinary JSON so that content flattening can work on them.

use serde_json::{Map, Value};
use snafu::prelude::*;
use std::collections::HashSet;

/// Expansion stops below this nesting depth.
const MAX_RESOLVE_DEPTH: usize = 32;

/// Error type for chunks that are not valid JSON.
#[derive(Debug, Snafu)]
pub enum ChunkParseError {
    /// The unescaped chunk could not be parsed.
    #[snafu(display("chunk is not valid JSON: {source}"))]
    Json {
        /// The underlying JSON parsing error.
        source: serde_json::Error,
    },
}

/// A position in a [`FlatRecord`] referenced by another element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IndexRef(pub usize);

/// A classified view of one element of a [`FlatRecord`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot<'a> {
    /// A string element.
    Str(&'a str),
    /// A single-element array holding a non-negative integer.
    IndexRef(IndexRef),
    /// Anything else: numbers, booleans, null, other arrays, objects.
    Value(&'a Value),
}

impl<'a> Slot<'a> {
    /// Classifies a raw JSON element.
    #[must_use]
    pub fn classify(value: &'a Value) -> Self {
        match value {
            Value::String(s) => Self::Str(s),
            Value::Array(items) if items.len() == 1 => items[0]
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .map_or(Self::Value(value), |n| Self::IndexRef(IndexRef(n))),
            other => Self::Value(other),
        }
    }

    /// Returns the string if this slot is a string element.
    #[must_use]
    pub const fn as_str(&self) -> Option<&'a str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns `true` if this slot is exactly the string `s`.
    #[must_use]
    pub fn is_str(&self, s: &str) -> bool {
        self.as_str() == Some(s)
    }
}

/// One parsed enqueue chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatRecord {
    items: Vec<Value>,
}

impl FlatRecord {
    /// Parses an unescaped chunk.
    ///
    /// A top-level array becomes the record's elements; any other JSON
    /// document becomes a one-element record.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkParseError::Json`] if `text` is not valid JSON.
    pub fn parse(text: &str) -> Result<Self, ChunkParseError> {
        let value: Value = serde_json::from_str(text.trim()).context(JsonSnafu)?;
        Ok(Self::from_value(value))
    }

    /// Wraps an already parsed JSON document.
    #[must_use]
    pub fn from_value(value: Value) -> Self {
        let items = match value {
            Value::Array(items) => items,
            other => vec![other],
        };
        Self { items }
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the record has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the classified element at `index`.
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<Slot<'_>> {
        self.items.get(index).map(Slot::classify)
    }

    /// Returns the raw element at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.items.get(index)
    }

    /// Follows an index reference. Out-of-range references yield `None`.
    #[must_use]
    pub fn deref(&self, target: IndexRef) -> Option<&Value> {
        self.items.get(target.0)
    }

    /// Iterates over all elements as slots.
    pub fn slots(&self) -> impl Iterator<Item = Slot<'_>> {
        self.items.iter().map(Slot::classify)
    }

    /// Expands a dereferenced element into self-contained JSON.
    ///
    /// Objects using `"_N"` keys are decoded member by member, following
    /// integer values as positions. Objects without such keys, strings, and
    /// scalars are returned as they are. Cycles and out-of-range positions
    /// resolve to `null`.
    #[must_use]
    pub fn resolve(&self, value: &Value) -> Value {
        match value {
            Value::Object(map) if map.keys().any(|k| key_ref(k).is_some()) => {
                let mut visiting = HashSet::new();
                self.expand(value, &mut visiting, 0)
            }
            other => other.clone(),
        }
    }

    fn expand(&self, value: &Value, visiting: &mut HashSet<usize>, depth: usize) -> Value {
        if depth > MAX_RESOLVE_DEPTH {
            return Value::Null;
        }

        match value {
            Value::Number(n) => match n.as_i64() {
                Some(i) if i < 0 => Value::Null,
                Some(i) => {
                    let Ok(index) = usize::try_from(i) else {
                        return Value::Null;
                    };
                    let Some(target) = self.items.get(index) else {
                        return Value::Null;
                    };
                    if !visiting.insert(index) {
                        return Value::Null;
                    }
                    let expanded = self.expand_target(target, visiting, depth + 1);
                    visiting.remove(&index);
                    expanded
                }
                // Floats are literal values
                None => value.clone(),
            },
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.expand(item, visiting, depth + 1))
                    .collect(),
            ),
            Value::Object(map) => {
                let mut out = Map::with_capacity(map.len());
                for (key, member) in map {
                    let key = self.decode_key(key);
                    out.insert(key, self.expand(member, visiting, depth + 1));
                }
                Value::Object(out)
            }
            other => other.clone(),
        }
    }

    /// Expands the element a position points at.
    ///
    /// Strings and scalars at the target are literal; containers are expanded.
    fn expand_target(&self, target: &Value, visiting: &mut HashSet<usize>, depth: usize) -> Value {
        match target {
            Value::Array(_) | Value::Object(_) => self.expand(target, visiting, depth),
            other => other.clone(),
        }
    }

    fn decode_key(&self, key: &str) -> String {
        key_ref(key)
            .and_then(|index| self.items.get(index))
            .and_then(Value::as_str)
            .unwrap_or(key)
            .to_owned()
    }
}

/// Parses a `"_N"` member key into the position it names.
fn key_ref(key: &str) -> Option<usize> {
    let digits = key.strip_prefix('_')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}
