//! Line grammar vectors.
//!
//! Most cases follow the msg-split vectors from
//! <https://github.com/ircdocs/parser-tests/blob/master/tests/msg-split.yaml>.
//!
//! Run with: `cargo test --test parser_vectors`

use ircv3_engine::error::MessageParseError;
use ircv3_engine::message::tags::Tags;
use ircv3_engine::ParsedMessage;

fn parse(line: &str) -> ParsedMessage {
    ParsedMessage::parse(line).unwrap_or_else(|e| panic!("{:?} failed to parse: {}", line, e))
}

fn tags(pairs: &[(&str, Option<&str>)]) -> Tags {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.map(str::to_owned)))
        .collect()
}

fn check(line: &str, source: Option<&str>, command: &str, params: &[&str]) -> ParsedMessage {
    let msg = parse(line);
    assert_eq!(msg.source.as_deref(), source, "source of {:?}", line);
    assert_eq!(msg.command, command, "command of {:?}", line);
    assert_eq!(msg.params, params, "params of {:?}", line);
    msg
}

// =============================================================================
// SPLITTING
// =============================================================================

mod split {
    use super::*;

    #[test]
    fn simple() {
        check("foo bar baz asdf", None, "foo", &["bar", "baz", "asdf"]);
    }

    #[test]
    fn with_source() {
        check(":coolguy foo bar baz asdf", Some("coolguy"), "foo", &["bar", "baz", "asdf"]);
    }

    #[test]
    fn with_trailing() {
        check("foo bar baz :asdf quux", None, "foo", &["bar", "baz", "asdf quux"]);
    }

    #[test]
    fn with_empty_trailing() {
        check("foo bar baz :", None, "foo", &["bar", "baz", ""]);
    }

    #[test]
    fn with_trailing_starting_colon() {
        check("foo bar baz ::asdf", None, "foo", &["bar", "baz", ":asdf"]);
    }

    #[test]
    fn with_source_and_trailing() {
        check(":coolguy foo bar baz :asdf quux", Some("coolguy"), "foo", &["bar", "baz", "asdf quux"]);
    }

    #[test]
    fn with_source_and_trailing_whitespace() {
        check(
            ":coolguy foo bar baz :  asdf quux ",
            Some("coolguy"),
            "foo",
            &["bar", "baz", "  asdf quux "],
        );
    }

    #[test]
    fn with_source_and_trailing_colon() {
        check(":coolguy PRIVMSG bar :lol :) ", Some("coolguy"), "PRIVMSG", &["bar", "lol :) "]);
    }

    #[test]
    fn with_source_and_empty_trailing() {
        check(":coolguy foo bar baz :", Some("coolguy"), "foo", &["bar", "baz", ""]);
    }

    #[test]
    fn with_source_and_trailing_only_whitespace() {
        check(":coolguy foo bar baz :  ", Some("coolguy"), "foo", &["bar", "baz", "  "]);
    }

    #[test]
    fn last_param_with_and_without_colon() {
        check(":src JOIN #chan", Some("src"), "JOIN", &["#chan"]);
        check(":src JOIN :#chan", Some("src"), "JOIN", &["#chan"]);
    }

    #[test]
    fn without_last_param() {
        check(":src AWAY", Some("src"), "AWAY", &[]);
        check(":src AWAY ", Some("src"), "AWAY", &[]);
    }

    #[test]
    fn tab_is_not_a_space() {
        check(":cool\tguy foo bar baz", Some("cool\tguy"), "foo", &["bar", "baz"]);
    }

    #[test]
    fn control_characters_in_source() {
        check(
            ":coolguy!ag@net\x035w\x03ork.admin PRIVMSG foo :bar baz",
            Some("coolguy!ag@net\x035w\x03ork.admin"),
            "PRIVMSG",
            &["foo", "bar baz"],
        );
        check(
            ":coolguy!~ag@n\x02et\x0305w\x0fork.admin PRIVMSG foo :bar baz",
            Some("coolguy!~ag@n\x02et\x0305w\x0fork.admin"),
            "PRIVMSG",
            &["foo", "bar baz"],
        );
    }

    #[test]
    fn command_only() {
        let msg = check("COMMAND", None, "COMMAND", &[]);
        assert!(msg.tags.is_empty());
    }

    #[test]
    fn unreal_broken() {
        check(
            ":gravel.mozilla.org 432  #momo :Erroneous Nickname: Illegal characters",
            Some("gravel.mozilla.org"),
            "432",
            &["#momo", "Erroneous Nickname: Illegal characters"],
        );
        check(":gravel.mozilla.org MODE #tckk +n ", Some("gravel.mozilla.org"), "MODE", &["#tckk", "+n"]);
        check(
            ":services.esper.net MODE #foo-bar +o foobar  ",
            Some("services.esper.net"),
            "MODE",
            &["#foo-bar", "+o", "foobar"],
        );
    }

    #[test]
    fn special_modes() {
        check(":SomeOp MODE #channel :+i", Some("SomeOp"), "MODE", &["#channel", "+i"]);
        check(
            ":SomeOp MODE #channel +oo SomeUser :AnotherUser",
            Some("SomeOp"),
            "MODE",
            &["#channel", "+oo", "SomeUser", "AnotherUser"],
        );
    }

    #[test]
    fn crlf_is_stripped() {
        check("PING :abc\r\n", None, "PING", &["abc"]);
    }
}

// =============================================================================
// TAGS
// =============================================================================

mod tagged {
    use super::*;

    #[test]
    fn with_tags() {
        let msg = check("@a=b;c=32;k;rt=ql7 foo", None, "foo", &[]);
        assert_eq!(
            msg.tags,
            tags(&[("a", Some("b")), ("c", Some("32")), ("k", None), ("rt", Some("ql7"))])
        );
    }

    #[test]
    fn with_escaped_tags() {
        let msg = check(r"@a=b\\and\nk;c=72\s45;d=gh\:764 foo", None, "foo", &[]);
        assert_eq!(
            msg.tags,
            tags(&[("a", Some("b\\and\nk")), ("c", Some("72 45")), ("d", Some("gh;764"))])
        );
    }

    #[test]
    fn with_tags_and_source() {
        let msg = check("@c;h=;a=b :quux ab cd", Some("quux"), "ab", &["cd"]);
        assert_eq!(msg.tags, tags(&[("c", None), ("h", Some("")), ("a", Some("b"))]));
    }

    #[test]
    fn everything() {
        let msg = check(
            "@tag1=value1;tag2;vendor1/tag3=value2;vendor2/tag4= :irc.example.com COMMAND param1 param2 :param3 param3",
            Some("irc.example.com"),
            "COMMAND",
            &["param1", "param2", "param3 param3"],
        );
        assert_eq!(
            msg.tags,
            tags(&[
                ("tag1", Some("value1")),
                ("tag2", None),
                ("vendor1/tag3", Some("value2")),
                ("vendor2/tag4", Some("")),
            ])
        );
    }

    #[test]
    fn everything_but_source() {
        let msg = check(
            "@tag1=value1;tag2;vendor1/tag3=value2;vendor2/tag4 COMMAND param1 param2 :param3 param3",
            None,
            "COMMAND",
            &["param1", "param2", "param3 param3"],
        );
        assert_eq!(msg.tags.len(), 4);
        assert_eq!(msg.tags["vendor2/tag4"], None);
    }

    #[test]
    fn slashes_are_fun() {
        let msg = check(r"@foo=\\\\\:\\s\s\r\n COMMAND", None, "COMMAND", &[]);
        assert_eq!(msg.tag("foo"), Some("\\\\;\\s \r\n"));
    }

    #[test]
    fn escape_one_char_at_a_time() {
        let msg = parse(r"@tag1=value\\ntest COMMAND");
        assert_eq!(msg.tag("tag1"), Some("value\\ntest"));
    }

    #[test]
    fn drop_unnecessary_escapes() {
        let msg = parse(r"@tag1=value\1 COMMAND");
        assert_eq!(msg.tag("tag1"), Some("value1"));
    }

    #[test]
    fn drop_trailing_backslash() {
        let msg = parse(r"@tag1=value1\ COMMAND");
        assert_eq!(msg.tag("tag1"), Some("value1"));
    }

    #[test]
    fn duplicate_tags_last_wins() {
        let msg = parse("@tag1=1;tag2=3;tag3=4;tag1=5 COMMAND");
        assert_eq!(
            msg.tags,
            tags(&[("tag1", Some("5")), ("tag2", Some("3")), ("tag3", Some("4"))])
        );
    }

    #[test]
    fn vendor_tags_are_namespaced() {
        let msg = parse("@tag1=1;tag2=3;tag3=4;tag1=5;vendor/tag2=8 COMMAND");
        assert_eq!(msg.tag("tag2"), Some("3"));
        assert_eq!(msg.tag("vendor/tag2"), Some("8"));
        assert_eq!(msg.tags.len(), 4);
    }

    #[test]
    fn message_tags_examples() {
        let msg = check(
            "@aaa=bbb;ccc;example.com/ddd=eee :nick!ident@host.com PRIVMSG me :Hello",
            Some("nick!ident@host.com"),
            "PRIVMSG",
            &["me", "Hello"],
        );
        assert_eq!(
            msg.tags,
            tags(&[("aaa", Some("bbb")), ("ccc", None), ("example.com/ddd", Some("eee"))])
        );

        let msg = parse(
            "@+icon=https://example.com/favicon.png :url_bot!bot@example.com PRIVMSG #channel :Example.com: A News Story",
        );
        assert_eq!(msg.tag("+icon"), Some("https://example.com/favicon.png"));
        assert_eq!(msg.params, ["#channel", "Example.com: A News Story"]);

        let msg = check(
            "@label=123;msgid=abc;+example-client-tag=example-value :nick!user@example.com TAGMSG #channel",
            Some("nick!user@example.com"),
            "TAGMSG",
            &["#channel"],
        );
        assert_eq!(msg.tag("+example-client-tag"), Some("example-value"));
    }
}

// =============================================================================
// FAILURES
// =============================================================================

mod failures {
    use super::*;

    #[test]
    fn empty_line() {
        assert_eq!(ParsedMessage::parse(""), Err(MessageParseError::EmptyMessage));
        assert_eq!(ParsedMessage::parse("\r\n"), Err(MessageParseError::EmptyMessage));
    }

    #[test]
    fn missing_command() {
        assert!(ParsedMessage::parse(":source").is_err());
        assert!(ParsedMessage::parse("@a=b").is_err());
        assert!(ParsedMessage::parse("@a=b :source ").is_err());
    }

    #[test]
    fn invalid_tag_key() {
        assert_eq!(
            ParsedMessage::parse("@bad_key=1 COMMAND"),
            Err(MessageParseError::InvalidTag("bad_key".to_owned()))
        );
    }
}

// =============================================================================
// CANONICAL FORM
// =============================================================================

#[test]
fn canonical_form_reparses() {
    for line in [
        "foo bar baz ::asdf",
        ":coolguy PRIVMSG bar :lol :) ",
        "@a=b;c=32;k;rt=ql7 foo",
        r"@a=b\\and\nk;c=72\s45;d=gh\:764 foo",
        "@c;h=;a=b :quux ab cd",
        ":coolguy foo bar baz :",
        ":SomeOp MODE #channel +oo SomeUser :AnotherUser",
    ] {
        let msg = parse(line);
        let canonical = msg.to_string();
        assert_eq!(parse(&canonical), msg, "{:?} -> {:?}", line, canonical);
    }
}

#[test]
fn canonical_form_sorts_tags() {
    let msg = parse("@z=1;a :src CMD x :y z");
    assert_eq!(msg.to_string(), "@a;z=1 :src CMD x :y z");
}
