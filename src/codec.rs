//! Request framing.
//!
//! Two request shapes are accepted. A multi-bulk request is `*<n>\r\n` followed by `n` bulk
//! strings (`$<len>\r\n<bytes>\r\n`); payloads are read by their declared length, so they may hold
//! any bytes, CR and LF included. Anything not starting with `*` is an inline request: a single
//! line split on whitespace.

use bytes::{Buf, Bytes, BytesMut};
use std::io;
use std::str;
use thiserror::Error as ThisError;
use tokio_util::codec::{Decoder, Encoder};
use tracing::debug;

use crate::command::Command;
use crate::frame::Frame;

static CRLF: &[u8; 2] = b"\r\n";

/// Bounds on what a client may send in a single request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    pub max_bulk_len: usize,
    pub max_args: usize,
    pub max_inline_len: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_bulk_len: 512 * 1024 * 1024,
            max_args: 1024 * 1024,
            max_inline_len: 64 * 1024,
        }
    }
}

#[derive(Debug, ThisError)]
pub enum ProtocolError {
    #[error("Protocol error: invalid multibulk length")]
    InvalidMultiBulkLength,
    #[error("Protocol error: invalid bulk length")]
    InvalidBulkLength,
    #[error("Protocol error: expected '$', got '{0}'")]
    UnexpectedByte(char),
    #[error("Protocol error: bulk payload is not terminated by CRLF")]
    MissingTerminator,
    #[error("Protocol error: too big inline request")]
    LineTooLong,
    #[error("connection I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// A multi-bulk request whose header and leading arguments have already left the buffer.
#[derive(Debug)]
struct Partial {
    remaining: usize,
    parts: Vec<Bytes>,
}

/// Decodes requests and encodes replies.
///
/// Completed bulk arguments are split off the read buffer as soon as they arrive, so a large
/// request trickling in over many reads is scanned once and its payloads are never copied.
#[derive(Debug, Default)]
pub struct CommandCodec {
    limits: Limits,
    partial: Option<Partial>,
}

impl CommandCodec {
    pub fn new(limits: Limits) -> CommandCodec {
        CommandCodec {
            limits,
            partial: None,
        }
    }

    /// Consumes a `*<n>\r\n` header, returning the argument count. Counts `<= 0` yield zero.
    fn multi_bulk_header(&self, src: &mut BytesMut) -> Result<Option<usize>, ProtocolError> {
        let Some((line, consumed)) = self.header_line(&src[..], 1)? else {
            return Ok(None);
        };
        let count = parse_length(line).ok_or(ProtocolError::InvalidMultiBulkLength)?;
        let count = if count <= 0 {
            0
        } else {
            usize::try_from(count)
                .ok()
                .filter(|count| *count <= self.limits.max_args)
                .ok_or(ProtocolError::InvalidMultiBulkLength)?
        };

        src.advance(consumed);
        Ok(Some(count))
    }

    /// Splits one complete `$<len>\r\n<payload>\r\n` element off the buffer.
    fn bulk(&self, src: &mut BytesMut) -> Result<Option<Bytes>, ProtocolError> {
        let Some(&marker) = src.first() else {
            return Ok(None);
        };
        if marker != b'$' {
            return Err(ProtocolError::UnexpectedByte(char::from(marker)));
        }

        let Some((line, consumed)) = self.header_line(&src[..], 1)? else {
            return Ok(None);
        };
        let len = parse_length(line)
            .and_then(|len| usize::try_from(len).ok())
            .filter(|len| *len <= self.limits.max_bulk_len)
            .ok_or(ProtocolError::InvalidBulkLength)?;

        let total = consumed + len + CRLF.len();
        if src.len() < total {
            // Make room for the rest of the payload in one go.
            src.reserve(total - src.len());
            return Ok(None);
        }
        if &src[consumed + len..total] != CRLF {
            return Err(ProtocolError::MissingTerminator);
        }

        src.advance(consumed);
        let payload = src.split_to(len).freeze();
        src.advance(CRLF.len());
        Ok(Some(payload))
    }

    /// The CRLF terminated line starting at `offset`, and the number of bytes up to and including
    /// its terminator.
    fn header_line<'a>(
        &self,
        src: &'a [u8],
        offset: usize,
    ) -> Result<Option<(&'a [u8], usize)>, ProtocolError> {
        let rest = &src[offset..];

        match rest.windows(2).position(|window| window == CRLF) {
            Some(len) if len > self.limits.max_inline_len => Err(ProtocolError::LineTooLong),
            Some(len) => Ok(Some((&rest[..len], offset + len + CRLF.len()))),
            None if rest.len() > self.limits.max_inline_len => Err(ProtocolError::LineTooLong),
            None => Ok(None),
        }
    }

    /// Splits one LF terminated line off the buffer and tokenizes it. `Some(None)` is a blank
    /// line.
    fn inline(&self, src: &mut BytesMut) -> Result<Option<Option<Command>>, ProtocolError> {
        let Some(len) = src.iter().position(|&byte| byte == b'\n') else {
            if src.len() > self.limits.max_inline_len {
                return Err(ProtocolError::LineTooLong);
            }
            return Ok(None);
        };
        if len > self.limits.max_inline_len {
            return Err(ProtocolError::LineTooLong);
        }

        let line = src.split_to(len + 1).freeze();
        let text = &line[..len];
        let text = text.strip_suffix(b"\r").unwrap_or(text);

        let mut tokens = text
            .split(|byte| byte.is_ascii_whitespace())
            .filter(|token| !token.is_empty())
            .map(|token| line.slice_ref(token));

        Ok(Some(tokens.next().map(|name| Command {
            name,
            args: tokens.collect(),
            inline: true,
        })))
    }
}

fn parse_length(line: &[u8]) -> Option<i64> {
    str::from_utf8(line).ok()?.parse().ok()
}

impl Decoder for CommandCodec {
    type Item = Command;
    type Error = ProtocolError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        loop {
            // Taken out so that an error leaves no half-read request behind.
            if let Some(mut partial) = self.partial.take() {
                while partial.remaining > 0 {
                    match self.bulk(src)? {
                        Some(part) => {
                            partial.parts.push(part);
                            partial.remaining -= 1;
                        }
                        None => {
                            self.partial = Some(partial);
                            return Ok(None);
                        }
                    }
                }

                let mut parts = partial.parts.into_iter();
                if let Some(name) = parts.next() {
                    return Ok(Some(Command {
                        name,
                        args: parts.collect(),
                        inline: false,
                    }));
                }
            }

            let Some(&first) = src.first() else {
                return Ok(None);
            };

            if first == b'*' {
                match self.multi_bulk_header(src)? {
                    None => return Ok(None),
                    // `*0` and `*-1` carry nothing to run.
                    Some(0) => continue,
                    Some(count) => {
                        self.partial = Some(Partial {
                            remaining: count,
                            parts: Vec::with_capacity(count.min(1024)),
                        });
                    }
                }
            } else {
                match self.inline(src)? {
                    None => return Ok(None),
                    Some(None) => continue,
                    Some(Some(command)) => return Ok(Some(command)),
                }
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(src)? {
            Some(command) => Ok(Some(command)),
            None => {
                let started = self.partial.take().map_or(0, |partial| partial.parts.len());
                if !src.is_empty() || started > 0 {
                    debug!(
                        bytes = src.len(),
                        arguments = started,
                        "discarding partial request at end of stream"
                    );
                    src.clear();
                }
                Ok(None)
            }
        }
    }
}

impl Encoder<Frame> for CommandCodec {
    type Error = ProtocolError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), Self::Error> {
        frame.write_to(dst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut CommandCodec, bytes: &[u8]) -> Vec<Command> {
        let mut buf = BytesMut::from(bytes);
        let mut commands = Vec::new();
        while let Some(command) = codec.decode(&mut buf).unwrap() {
            commands.push(command);
        }
        commands
    }

    #[test]
    fn multi_bulk_request() {
        let mut codec = CommandCodec::default();
        let commands = decode_all(&mut codec, b"*3\r\n$3\r\nSET\r\n$5\r\nmykey\r\n$7\r\nmyvalue\r\n");

        assert_eq!(commands, vec![Command::new("SET", ["mykey", "myvalue"])]);
    }

    #[test]
    fn bulk_payload_may_contain_crlf() {
        let mut codec = CommandCodec::default();
        let commands = decode_all(&mut codec, b"*2\r\n$4\r\necho\r\n$4\r\na\r\nb\r\n");

        assert_eq!(commands, vec![Command::new("echo", ["a\r\nb"])]);
    }

    #[test]
    fn partial_requests_wait_for_more_bytes() {
        let mut codec = CommandCodec::default();
        let request = b"*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n";
        let mut buf = BytesMut::new();

        for (i, byte) in request.iter().enumerate() {
            buf.extend_from_slice(&[*byte]);
            let decoded = codec.decode(&mut buf).unwrap();
            if i + 1 < request.len() {
                assert_eq!(decoded, None, "decoded early at byte {i}");
            } else {
                assert_eq!(decoded, Some(Command::new("GET", ["key"])));
            }
        }
        assert!(buf.is_empty());
    }

    #[test]
    fn large_request_is_consumed_as_it_arrives() {
        let mut codec = CommandCodec::default();
        let mut request = BytesMut::new();
        let count = 20_000;
        request.extend_from_slice(format!("*{}\r\n$3\r\nDEL\r\n", count + 1).as_bytes());
        for i in 0..count {
            let key = format!("key:{i:05}");
            request.extend_from_slice(format!("${}\r\n{key}\r\n", key.len()).as_bytes());
        }

        let mut buf = BytesMut::new();
        let mut decoded = None;
        for chunk in request.chunks(4096) {
            assert_eq!(decoded, None);
            buf.extend_from_slice(chunk);
            decoded = codec.decode(&mut buf).unwrap();
            // Only the unfinished tail of the chunk stays buffered.
            assert!(buf.len() < 64, "{} bytes left buffered", buf.len());
        }

        let command = decoded.unwrap();
        assert_eq!(command.name, "DEL");
        assert_eq!(command.args.len(), count);
        assert_eq!(command.args[0], "key:00000");
        assert_eq!(command.args[count - 1], "key:19999");
        assert!(buf.is_empty());
    }

    #[test]
    fn error_discards_the_request_in_progress() {
        let mut codec = CommandCodec::default();

        let mut buf = BytesMut::from(&b"*3\r\n$3\r\nSET\r\n:1\r\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::UnexpectedByte(':'))
        ));

        let mut buf = BytesMut::from(&b"*1\r\n$4\r\nPING\r\n"[..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Command::new("PING", Vec::<Bytes>::new()))
        );
    }

    #[test]
    fn pipelined_requests() {
        let mut codec = CommandCodec::default();
        let commands = decode_all(
            &mut codec,
            b"*1\r\n$4\r\nPING\r\n*2\r\n$3\r\nGET\r\n$1\r\na\r\nPING\r\n",
        );

        assert_eq!(
            commands,
            vec![
                Command::new("PING", Vec::<Bytes>::new()),
                Command::new("GET", ["a"]),
                Command::new("PING", Vec::<Bytes>::new()).inline(),
            ]
        );
    }

    #[test]
    fn inline_requests() {
        let mut codec = CommandCodec::default();
        let commands = decode_all(&mut codec, b"SET  k\tv\r\nget k\n");

        assert_eq!(
            commands,
            vec![
                Command::new("SET", ["k", "v"]).inline(),
                Command::new("get", ["k"]).inline(),
            ]
        );
    }

    #[test]
    fn empty_requests_are_skipped() {
        let mut codec = CommandCodec::default();
        let mut buf = BytesMut::from(&b"\r\n   \r\n*0\r\n*-1\r\n*1\r\n$4\r\nPING\r\n"[..]);

        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Command::new("PING", Vec::<Bytes>::new()))
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn malformed_lengths() {
        let mut codec = CommandCodec::default();

        let mut buf = BytesMut::from(&b"*x\r\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::InvalidMultiBulkLength)
        ));

        let mut buf = BytesMut::from(&b"*1\r\n$-3\r\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::InvalidBulkLength)
        ));

        let mut buf = BytesMut::from(&b"*1\r\n:3\r\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::UnexpectedByte(':'))
        ));

        let mut buf = BytesMut::from(&b"*1\r\n$3\r\nabcde\r\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::MissingTerminator)
        ));
    }

    #[test]
    fn limits_are_enforced() {
        let mut codec = CommandCodec::new(Limits {
            max_bulk_len: 4,
            max_args: 2,
            max_inline_len: 8,
        });

        let mut buf = BytesMut::from(&b"*3\r\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::InvalidMultiBulkLength)
        ));

        let mut buf = BytesMut::from(&b"*1\r\n$5\r\n"[..]);
        assert!(matches!(
            codec.decode(&mut buf),
            Err(ProtocolError::InvalidBulkLength)
        ));

        let mut buf = BytesMut::from(&b"GET averylongkey"[..]);
        assert!(matches!(codec.decode(&mut buf), Err(ProtocolError::LineTooLong)));
    }

    #[test]
    fn partial_request_at_eof_is_dropped() {
        let mut codec = CommandCodec::default();
        let mut buf = BytesMut::from(&b"*2\r\n$3\r\nGET"[..]);

        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
        assert!(buf.is_empty());

        // Arguments already split off the buffer are dropped too.
        let mut buf = BytesMut::from(&b"*2\r\n$3\r\nGET\r\n"[..]);
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);

        let mut buf = BytesMut::from(&b"*1\r\n$4\r\nPING\r\n"[..]);
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Command::new("PING", Vec::<Bytes>::new()))
        );
    }

    #[test]
    fn encodes_frames() {
        let mut codec = CommandCodec::default();
        let mut buf = BytesMut::new();

        codec.encode(Frame::Integer(1), &mut buf).unwrap();
        codec.encode(Frame::Inline(None), &mut buf).unwrap();

        assert_eq!(&buf[..], b":1\r\n\r\n");
    }
}
