//! Parsed IRC lines.
//!
//! [`ParsedMessage`] is the owned result of running one line through the
//! line grammar and the tag codec in [`tags`].

mod nom_parser;
pub mod tags;

use std::fmt::{self, Write as _};
use std::str::FromStr;

pub use self::nom_parser::{DetailedParseError, RawMessage};
pub use self::tags::Tags;

use crate::error::MessageParseError;

/// One IRC line split into tags, source, command, and parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedMessage {
    /// Decoded IRCv3 tags. Empty when the line had none.
    pub tags: Tags,
    /// The `:source` prefix without its colon.
    pub source: Option<String>,
    /// The command or numeric, compared case-sensitively.
    pub command: String,
    /// Middle parameters followed by the trailing parameter, if any.
    pub params: Vec<String>,
}

impl ParsedMessage {
    /// Parse one line. A trailing CR/LF is stripped first.
    pub fn parse(line: &str) -> Result<Self, MessageParseError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            return Err(MessageParseError::EmptyMessage);
        }

        let raw = RawMessage::parse(line)?;
        let tags = match raw.tags {
            Some(raw_tags) => tags::parse_tags(raw_tags)?,
            None => Tags::new(),
        };

        Ok(Self {
            tags,
            source: raw.source.map(str::to_owned),
            command: raw.command.to_owned(),
            params: raw.params.into_iter().map(str::to_owned).collect(),
        })
    }

    /// Build a message with no tags and no source.
    pub fn new(command: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            command: command.into(),
            params,
            ..Self::default()
        }
    }

    /// Value of a tag, flattening bare tags to `None`.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).and_then(|v| v.as_deref())
    }

    /// Whether the tag is present at all, with or without a value.
    pub fn has_tag(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }

    /// Parameter at `index`.
    pub fn param(&self, index: usize) -> Option<&str> {
        self.params.get(index).map(String::as_str)
    }
}

impl FromStr for ParsedMessage {
    type Err = MessageParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Whether the last parameter must be sent in trailing form.
pub(crate) fn needs_colon_prefix(s: &str) -> bool {
    s.is_empty() || s.contains(' ') || s.starts_with(':')
}

/// Canonical form: tags sorted by key, values escaped, and the last
/// parameter written as trailing only when it has to be.
impl fmt::Display for ParsedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.tags.is_empty() {
            let mut keys: Vec<&String> = self.tags.keys().collect();
            keys.sort();

            f.write_char('@')?;
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    f.write_char(';')?;
                }
                f.write_str(key)?;
                if let Some(Some(value)) = self.tags.get(key) {
                    f.write_char('=')?;
                    tags::escape_tag_value(f, value)?;
                }
            }
            f.write_char(' ')?;
        }

        if let Some(source) = &self.source {
            write!(f, ":{} ", source)?;
        }

        f.write_str(&self.command)?;

        if let Some((last, middle)) = self.params.split_last() {
            for param in middle {
                write!(f, " {}", param)?;
            }
            if needs_colon_prefix(last) {
                write!(f, " :{}", last)?;
            } else {
                write!(f, " {}", last)?;
            }
        }

        Ok(())
    }
}
