//! CRLF line framing.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::warn;

use super::MAX_IRC_LINE_LEN;
use crate::error::ProtocolError;

/// Splits the stream into lines and writes lines back with CRLF.
///
/// Incoming lines may end in LF or CRLF. Invalid UTF-8 is replaced and
/// blank lines are skipped. Outgoing lines are cut at the first CR or LF so
/// one item can never become two lines on the wire.
#[derive(Clone, Debug)]
pub struct LineCodec {
    max_len: usize,
    next_index: usize,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LineCodec {
    /// Codec with the standard [`MAX_IRC_LINE_LEN`] limit.
    pub fn new() -> Self {
        Self::with_max_len(MAX_IRC_LINE_LEN)
    }

    /// Codec rejecting lines longer than `max_len` bytes.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            max_len,
            next_index: 0,
        }
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                self.next_index = src.len();
                // A trailing CR may still be waiting for its LF.
                let pending = src.strip_suffix(b"\r").unwrap_or(&src[..]).len();
                if pending > self.max_len {
                    return Err(ProtocolError::MessageTooLong(pending));
                }
                return Ok(None);
            };

            let newline = self.next_index + offset;
            self.next_index = 0;
            let content = src[..newline].strip_suffix(b"\r").unwrap_or(&src[..newline]).len();
            if content > self.max_len {
                return Err(ProtocolError::MessageTooLong(content));
            }

            let frame = src.split_to(newline + 1);
            let line = &frame[..content];
            if line.is_empty() {
                continue;
            }
            return Ok(Some(String::from_utf8_lossy(line).into_owned()));
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>, ProtocolError> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        self.next_index = 0;
        let rest = src.split();
        let line = rest.strip_suffix(b"\r").unwrap_or(&rest[..]);
        if line.is_empty() {
            return Ok(None);
        }
        Ok(Some(String::from_utf8_lossy(line).into_owned()))
    }
}

impl<T: AsRef<str>> Encoder<T> for LineCodec {
    type Error = ProtocolError;

    fn encode(&mut self, item: T, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        let line = item.as_ref();
        let line = match line.find(['\r', '\n']) {
            Some(cut) => {
                warn!(dropped = line.len() - cut, "truncating outgoing line at line break");
                &line[..cut]
            }
            None => line,
        };
        if line.len() > self.max_len {
            return Err(ProtocolError::MessageTooLong(line.len()));
        }

        dst.reserve(line.len() + 2);
        dst.put_slice(line.as_bytes());
        dst.put_slice(b"\r\n");
        Ok(())
    }
}
