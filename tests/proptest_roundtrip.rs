//! Property-based tests for IRC line parsing.
//!
//! Uses proptest to generate random IRC components and verify that:
//! 1. Parsing never panics on arbitrary input
//! 2. Canonical output re-parses to the same message
//! 3. Tag decoding is idempotent on input without backslashes
//!
//! Run with: `cargo test --test proptest_roundtrip`

use std::collections::HashMap;

use ircv3_engine::message::tags::{escape_tag_value, parse_tags, unescape_tag_value};
use ircv3_engine::ParsedMessage;
use proptest::prelude::*;

// =============================================================================
// STRATEGIES - Generators for valid IRC components
// =============================================================================

/// Valid IRC nickname: starts with letter or special char, followed by
/// letters, digits, or special chars.
fn nickname_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-zA-Z\\[\\]\\\\^_`{|}][a-zA-Z0-9\\-\\[\\]\\\\^_`{|}]{0,8}")
        .expect("valid regex")
}

/// Server name or `nick!user@host`.
fn source_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[a-z]+\\.[a-z]+\\.[a-z]+").expect("valid regex"),
        (
            nickname_strategy(),
            prop::string::string_regex("[a-zA-Z][a-zA-Z0-9]{0,9}").expect("valid regex"),
            prop::string::string_regex("[a-z0-9]+(\\.[a-z0-9]+)*").expect("valid regex"),
        )
            .prop_map(|(nick, user, host)| format!("{}!{}@{}", nick, user, host)),
    ]
}

/// Word commands or three-digit numerics.
fn command_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex("[A-Z]{3,12}").expect("valid regex"),
        prop::string::string_regex("[0-9]{3}").expect("valid regex"),
    ]
}

/// A middle parameter: non-empty, no spaces, not starting with `:`.
fn middle_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[#&a-zA-Z0-9+\\-_][^ \r\n\0]{0,20}").expect("valid regex")
}

/// Message text that doesn't contain CR/LF (which would break IRC protocol)
fn trailing_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[^\r\n\0]{0,200}").expect("valid regex")
}

/// Tag key with optional client prefix and vendor.
fn tag_key_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("\\+?([a-z0-9.]{1,12}/)?[a-zA-Z0-9\\-]{1,20}").expect("valid regex")
}

/// Any printable value, including characters that need escaping.
fn tag_value_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[^\0]{0,60}").expect("valid regex")
}

fn message_strategy() -> impl Strategy<Value = ParsedMessage> {
    (
        prop::collection::hash_map(
            tag_key_strategy(),
            prop::option::of(tag_value_strategy()),
            0..5,
        ),
        prop::option::of(source_strategy()),
        command_strategy(),
        prop::collection::vec(middle_strategy(), 0..6),
        prop::option::of(trailing_strategy()),
    )
        .prop_map(|(tags, source, command, mut params, trailing)| {
            params.extend(trailing);
            ParsedMessage {
                tags: tags.into_iter().collect::<HashMap<_, _>>(),
                source,
                command,
                params,
            }
        })
}

// =============================================================================
// PROPERTIES
// =============================================================================

proptest! {
    #[test]
    fn parse_never_panics(line in "\\PC{0,300}") {
        let _ = ParsedMessage::parse(&line);
    }

    #[test]
    fn canonical_form_round_trips(msg in message_strategy()) {
        let line = msg.to_string();
        let reparsed = ParsedMessage::parse(&line);
        prop_assert_eq!(reparsed, Ok(msg), "line: {:?}", line);
    }

    #[test]
    fn canonical_form_is_stable(msg in message_strategy()) {
        let once = msg.to_string();
        let twice = ParsedMessage::parse(&once).map(|m| m.to_string());
        prop_assert_eq!(twice, Ok(once));
    }

    #[test]
    fn escaped_values_decode_back(value in tag_value_strategy()) {
        let mut escaped = String::new();
        escape_tag_value(&mut escaped, &value).unwrap();
        prop_assert!(!escaped.contains(' ') && !escaped.contains(';'));
        prop_assert_eq!(unescape_tag_value(&escaped), value);
    }

    #[test]
    fn unescape_is_identity_without_backslashes(value in "[^\\\\\0]{0,60}") {
        prop_assert_eq!(unescape_tag_value(&value), value.clone());
        prop_assert_eq!(unescape_tag_value(&unescape_tag_value(&value)), value);
    }

    #[test]
    fn last_duplicate_wins(key in "[a-z]{1,8}", first in "[a-z0-9]{0,8}", second in "[a-z0-9]{0,8}") {
        let raw = format!("{k}={a};{k}={b}", k = key, a = first, b = second);
        let tags = parse_tags(&raw).unwrap();
        prop_assert_eq!(tags.len(), 1);
        prop_assert_eq!(tags[&key].as_deref(), Some(second.as_str()));
    }
}
