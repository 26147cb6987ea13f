// SPDX-License-Identifier: GPL-3.0-only
// Copyright (C) 2025 Brian Hetro <whee@smaertness.net>

//! Decoding of JavaScript string-literal escapes.
//!
//! Enqueue chunks are the bodies of double-quoted JavaScript string literals.
//! [`unescape_js`] turns such a body back into the text the page script would
//! see, by interpreting each escape sequence directly. Nothing is evaluated.
//!
//! Recognised sequences:
//!
//! | Escape | Result |
//! |---|---|
//! | `\n` `\r` `\t` `\b` `\f` `\v` `\0` | the control character |
//! | `\\` `\"` `\'` `\/` | the literal character |
//! | `\xHH` | code point `0xHH` |
//! | `\uXXXX` | UTF-16 code unit; surrogate pairs are combined |
//! | `\u{X…}` | code point |
//! | backslash + line terminator | line continuation (nothing) |
//!
//! Any other escaped character stands for itself, as in JavaScript. Malformed
//! hex escapes and lone surrogates never fail: the former are copied through
//! unchanged, the latter become U+FFFD.

use std::iter::Peekable;
use std::str::Chars;

/// Decodes the body of a double-quoted JavaScript string literal.
///
/// # Example
///
/// ```
/// use share2md::unescape::unescape_js;
///
/// assert_eq!(unescape_js(r#"[\"a\u00e9\",1]"#), r#"["aé",1]"#);
/// ```
#[must_use]
pub fn unescape_js(input: &str) -> String {
    // Fast path: nothing to decode
    if !input.contains('\\') {
        return input.to_owned();
    }

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }

        let Some(escaped) = chars.next() else {
            // Trailing lone backslash
            out.push('\\');
            break;
        };

        match escaped {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'b' => out.push('\u{0008}'),
            'f' => out.push('\u{000C}'),
            'v' => out.push('\u{000B}'),
            '0' if !chars.peek().is_some_and(char::is_ascii_digit) => out.push('\0'),
            'x' => match take_hex(&mut chars, 2) {
                Some(value) => push_code_point(&mut out, value),
                None => out.push_str("\\x"),
            },
            'u' => decode_unicode_escape(&mut chars, &mut out),
            '\r' => {
                // \r\n counts as one line terminator
                if chars.peek() == Some(&'\n') {
                    chars.next();
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            other => out.push(other),
        }
    }

    out
}

/// Handles everything after `\u`.
fn decode_unicode_escape(chars: &mut Peekable<Chars<'_>>, out: &mut String) {
    if chars.peek() == Some(&'{') {
        let mut lookahead = chars.clone();
        lookahead.next();
        let digits: String = lookahead
            .by_ref()
            .take_while(|c| *c != '}')
            .collect();

        if !digits.is_empty()
            && digits.len() <= 6
            && let Ok(value) = u32::from_str_radix(&digits, 16)
        {
            *chars = lookahead;
            push_code_point(out, value);
        } else {
            out.push_str("\\u");
        }
        return;
    }

    let Some(high) = take_hex(chars, 4) else {
        out.push_str("\\u");
        return;
    };

    if !(0xD800..=0xDBFF).contains(&high) {
        push_code_point(out, high);
        return;
    }

    // High surrogate: combine with a following \uDC00-\uDFFF if present
    let mut lookahead = chars.clone();
    if lookahead.next() == Some('\\')
        && lookahead.next() == Some('u')
        && let Some(low) = take_hex(&mut lookahead, 4)
        && (0xDC00..=0xDFFF).contains(&low)
    {
        *chars = lookahead;
        push_code_point(out, 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00));
        return;
    }

    out.push(char::REPLACEMENT_CHARACTER);
}

/// Consumes exactly `count` hex digits, leaving the iterator untouched on failure.
fn take_hex(chars: &mut Peekable<Chars<'_>>, count: usize) -> Option<u32> {
    let mut lookahead = chars.clone();
    let mut value = 0;
    for _ in 0..count {
        let digit = lookahead.next()?.to_digit(16)?;
        value = value * 16 + digit;
    }
    *chars = lookahead;
    Some(value)
}

fn push_code_point(out: &mut String, value: u32) {
    out.push(char::from_u32(value).unwrap_or(char::REPLACEMENT_CHARACTER));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passes_plain_text_through() {
        assert_eq!(unescape_js("hello world"), "hello world");
    }

    #[test]
    fn decodes_simple_escapes() {
        assert_eq!(unescape_js(r"a\nb\tc"), "a\nb\tc");
        assert_eq!(unescape_js(r#"say \"hi\""#), "say \"hi\"");
        assert_eq!(unescape_js(r"back\\slash"), "back\\slash");
        assert_eq!(unescape_js(r"it\'s \/path"), "it's /path");
    }

    #[test]
    fn decodes_unicode_escapes() {
        assert_eq!(unescape_js(r"caf\u00e9"), "café");
        assert_eq!(unescape_js(r"\u4f60\u597d"), "你好");
        assert_eq!(unescape_js(r"\u{1F600}"), "😀");
    }

    #[test]
    fn combines_surrogate_pairs() {
        assert_eq!(unescape_js(r"\ud83d\ude00"), "😀");
    }

    #[test]
    fn lone_surrogate_becomes_replacement_character() {
        assert_eq!(unescape_js(r"\ud83dx"), "\u{FFFD}x");
        assert_eq!(unescape_js(r"\ude00"), "\u{FFFD}");
    }

    #[test]
    fn decodes_hex_escapes() {
        assert_eq!(unescape_js(r"\x41\x3c"), "A<");
    }

    #[test]
    fn malformed_hex_is_copied_through() {
        assert_eq!(unescape_js(r"\u12zz"), r"\u12zz");
        assert_eq!(unescape_js(r"\xg1"), r"\xg1");
    }

    #[test]
    fn unknown_escape_yields_character() {
        assert_eq!(unescape_js(r"\q"), "q");
    }

    #[test]
    fn trailing_backslash_is_kept() {
        assert_eq!(unescape_js("abc\\"), "abc\\");
    }

    #[test]
    fn line_continuation_is_removed() {
        assert_eq!(unescape_js("a\\\nb"), "ab");
        assert_eq!(unescape_js("a\\\r\nb"), "ab");
    }

    #[test]
    fn double_escaped_json_becomes_json() {
        // JSON string escapes survive as JSON escapes after one pass
        let chunk = r#"[\"text\",\"He said \\\"hi\\\"\"]"#;
        let decoded = unescape_js(chunk);
        assert_eq!(decoded, r#"["text","He said \"hi\""]"#);

        let value: serde_json::Value = serde_json::from_str(&decoded).unwrap();
        assert_eq!(value[1], "He said \"hi\"");
    }

    #[test]
    fn does_not_execute_anything() {
        let hostile = r#"\"); process.exit(1); (\""#;
        assert_eq!(unescape_js(hostile), r#""); process.exit(1); (""#);
    }
}
