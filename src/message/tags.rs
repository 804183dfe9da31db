//! IRCv3 message tag decoding and escaping.
//!
//! # Reference
//! - IRCv3 Message Tags: <https://ircv3.net/specs/extensions/message-tags>

use std::collections::HashMap;
use std::fmt::{Result as FmtResult, Write};

use nom::{
    bytes::complete::take_while1,
    character::complete::char,
    combinator::{all_consuming, opt, recognize},
    sequence::{terminated, tuple},
    IResult,
};

use crate::error::MessageParseError;

/// Decoded message tags. A bare key maps to `None`, `key=` to `Some("")`.
pub type Tags = HashMap<String, Option<String>>;

fn is_vendor_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '.'
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-'
}

/// `['+'] [vendor '/'] key-name`
fn tag_key(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        opt(char('+')),
        opt(terminated(take_while1(is_vendor_char), char('/'))),
        take_while1(is_key_char),
    )))(input)
}

/// Check a tag key against the message-tags key grammar.
pub fn is_valid_key(key: &str) -> bool {
    all_consuming(tag_key)(key).is_ok()
}

/// Decode a raw tags string (without the leading `@`).
///
/// Empty segments are skipped. When a key repeats the last value wins.
pub fn parse_tags(raw: &str) -> Result<Tags, MessageParseError> {
    let mut tags = Tags::new();

    for item in raw.split(';').filter(|s| !s.is_empty()) {
        let (key, value) = match item.split_once('=') {
            Some((key, value)) => (key, Some(unescape_tag_value(value))),
            None => (item, None),
        };

        if !is_valid_key(key) {
            return Err(MessageParseError::InvalidTag(key.to_owned()));
        }

        tags.insert(key.to_owned(), value);
    }

    Ok(tags)
}

/// Escape a tag value for serialization.
///
/// Escapes special characters for an IRCv3 tag value.
pub fn escape_tag_value(f: &mut dyn Write, value: &str) -> FmtResult {
    for c in value.chars() {
        match c {
            ';' => f.write_str("\\:")?,
            ' ' => f.write_str("\\s")?,
            '\\' => f.write_str("\\\\")?,
            '\r' => f.write_str("\\r")?,
            '\n' => f.write_str("\\n")?,
            c => f.write_char(c)?,
        }
    }
    Ok(())
}

/// Unescape a tag value from wire format.
///
/// Unknown escapes lose their backslash and a trailing lone backslash is
/// dropped.
pub fn unescape_tag_value(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut iter = value.chars();
    while let Some(c) = iter.next() {
        let r = if c == '\\' {
            match iter.next() {
                Some(':') => ';',
                Some('s') => ' ',
                Some('\\') => '\\',
                Some('r') => '\r',
                Some('n') => '\n',
                Some(c) => c,
                None => break,
            }
        } else {
            c
        };
        unescaped.push(r);
    }
    unescaped
}
