//! Nom-based IRC line parser.
//!
//! Splits one line into borrowed tag, source, command, and parameter slices.
//! Tag values are decoded separately by [`super::tags`].

use nom::{
    bytes::complete::{take_till, take_while1},
    character::complete::{char, space0, space1},
    combinator::opt,
    error::{context, ErrorKind, VerboseError},
    sequence::{preceded, terminated},
    IResult,
};

use crate::error::MessageParseError;

type ParseResult<I, O> = IResult<I, O, VerboseError<I>>;

const COMMAND_CONTEXT: &str = "parsing required command";

/// Parse IRCv3 message tags (after `@`, followed by at least one space).
fn parse_tags(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing IRCv3 message tags",
        terminated(preceded(char('@'), take_till(|c| c == ' ')), space1),
    )(input)
}

/// Parse the message source (after `:`, followed by at least one space).
fn parse_source(input: &str) -> ParseResult<&str, &str> {
    context(
        "parsing message source",
        terminated(preceded(char(':'), take_while1(|c| c != ' ')), space1),
    )(input)
}

/// Parse the command token: anything up to a space or colon.
fn parse_command(input: &str) -> ParseResult<&str, &str> {
    context(COMMAND_CONTEXT, take_while1(|c| c != ' ' && c != ':'))(input)
}

/// Split the parameter section.
///
/// Runs of spaces separate middle parameters. A token that starts with `:`
/// takes the rest of the line verbatim, minus that one colon.
fn parse_params(input: &str) -> (&str, Vec<&str>) {
    let mut params = Vec::new();
    let mut rest = input;

    while rest.starts_with(' ') {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            break;
        }

        if let Some(trailing) = rest.strip_prefix(':') {
            params.push(trailing);
            rest = "";
            break;
        }

        let end = rest.find(' ').unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }

    (rest, params)
}

/// Parse a complete line into its components.
///
/// ```text
/// ['@' tags ' '+] [':' source ' '+] command [' '+ middle]* [' '+ ':' trailing]
/// ```
pub fn parse_message(input: &str) -> ParseResult<&str, RawMessage<'_>> {
    let (input, tags) = if input.starts_with('@') {
        let (input, tags) = parse_tags(input)?;
        (input, Some(tags))
    } else {
        (input, None)
    };
    let (input, source) = context("parsing optional source", opt(parse_source))(input)?;
    let (input, _) = space0(input)?;
    let (input, command) = parse_command(input)?;
    let (rest, params) = parse_params(input);

    Ok((
        rest,
        RawMessage {
            tags,
            source,
            command,
            params,
        },
    ))
}

/// A parsed IRC line with borrowed string slices.
///
/// This is the intermediate representation produced by the nom parser.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMessage<'a> {
    /// Raw tags string (without the leading `@`), if present.
    pub tags: Option<&'a str>,
    /// Source (without the leading `:`), if present.
    pub source: Option<&'a str>,
    /// The command name.
    pub command: &'a str,
    /// Command parameters, including trailing.
    pub params: Vec<&'a str>,
}

impl<'a> RawMessage<'a> {
    /// Parse one line. The caller strips the line terminator.
    pub fn parse(input: &'a str) -> Result<Self, DetailedParseError> {
        match parse_message(input) {
            Ok(("", msg)) => Ok(msg),
            Ok((rest, _)) => Err(DetailedParseError {
                input: input.to_string(),
                position: input.len() - rest.len(),
                context: Some("parsing parameters"),
                kind: ErrorKind::Space,
            }),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                let mut context_info = None;
                let mut position = input.len();
                let mut kind = ErrorKind::Tag;

                for (error_input, error_kind) in &e.errors {
                    position = input.len() - error_input.len();
                    match error_kind {
                        nom::error::VerboseErrorKind::Context(ctx) => {
                            context_info = Some(*ctx);
                        }
                        nom::error::VerboseErrorKind::Nom(ek) => {
                            kind = *ek;
                        }
                        nom::error::VerboseErrorKind::Char(_) => {
                            kind = ErrorKind::Char;
                        }
                    }
                }

                Err(DetailedParseError {
                    input: input.to_string(),
                    position,
                    context: context_info,
                    kind,
                })
            }
            Err(nom::Err::Incomplete(_)) => Err(DetailedParseError {
                input: input.to_string(),
                position: input.len(),
                context: Some("incomplete input"),
                kind: ErrorKind::Eof,
            }),
        }
    }
}

/// Detailed parse error with position and context information.
#[derive(Debug, Clone)]
pub struct DetailedParseError {
    /// The original input string that failed to parse.
    pub input: String,
    /// Byte position where parsing failed.
    pub position: usize,
    /// What was being parsed when the error occurred.
    pub context: Option<&'static str>,
    /// The nom error kind.
    pub kind: ErrorKind,
}

impl std::fmt::Display for DetailedParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error at position {}", self.position)?;
        if let Some(ctx) = self.context {
            write!(f, " while {}", ctx)?;
        }
        write!(f, ": {:?}", self.kind)?;

        match (
            self.input.get(..self.position),
            self.input.get(self.position..),
        ) {
            (Some(before), Some(after)) if !after.is_empty() => {
                write!(f, "\n  Input: {}<<<HERE>>>{}", before, after)
            }
            _ => write!(f, "\n  Input: {}<<<EOF>>>", self.input),
        }
    }
}

impl std::error::Error for DetailedParseError {}

impl From<DetailedParseError> for MessageParseError {
    fn from(err: DetailedParseError) -> Self {
        if err.context == Some(COMMAND_CONTEXT) {
            return MessageParseError::InvalidCommand;
        }
        MessageParseError::ParseContext {
            position: err.position,
            context: err.context.unwrap_or("parsing message").to_string(),
            source: Some(Box::new(err)),
            source_message: None,
        }
    }
}
