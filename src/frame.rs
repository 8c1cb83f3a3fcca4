// https://redis.io/docs/reference/protocol-spec

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;
use thiserror::Error as ThisError;

static CRLF: &[u8; 2] = b"\r\n";

#[derive(Debug, ThisError, PartialEq)]
pub enum Error {
    #[error("not enough data is available to parse an entire frame")]
    Incomplete,
    #[error("invalid frame data type: {0}")]
    InvalidDataType(u8),
    #[error("protocol error; invalid frame format")]
    InvalidFormat,
}

/// A reply, in the RESP2 shapes this server produces.
#[derive(Clone, Debug, PartialEq)]
pub enum Frame {
    Simple(String),
    Error(String),
    Integer(i64),
    Bulk(Bytes),
    Null,
    Array(Vec<Frame>),
    /// A reply to an inline command: the payload followed by CRLF, or a bare CRLF for nil.
    Inline(Option<Bytes>),
}

impl Frame {
    pub fn ok() -> Frame {
        Frame::Simple("OK".to_string())
    }

    pub fn bulks(items: impl IntoIterator<Item = Bytes>) -> Frame {
        Frame::Array(items.into_iter().map(Frame::Bulk).collect())
    }

    /// Flattens the reply for an inline command. Arrays become their items joined by CRLF.
    pub fn into_inline(self) -> Frame {
        match self {
            Frame::Null | Frame::Inline(None) => Frame::Inline(None),
            frame => Frame::Inline(Some(frame.into_payload())),
        }
    }

    fn into_payload(self) -> Bytes {
        match self {
            Frame::Simple(s) | Frame::Error(s) => Bytes::from(s),
            Frame::Integer(i) => Bytes::from(i.to_string()),
            Frame::Bulk(bytes) => bytes,
            Frame::Null => Bytes::new(),
            Frame::Inline(payload) => payload.unwrap_or_default(),
            Frame::Array(items) => {
                let lines: Vec<Bytes> = items.into_iter().map(Frame::into_payload).collect();
                Bytes::from(lines.join(&CRLF[..]))
            }
        }
    }

    /// Parses one RESP2 reply. Used by clients of the server, tests included.
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Self, Error> {
        // The first byte in an RESP-serialized payload always identifies its type.
        let first_byte = get_byte(src)?;
        let data_type = DataType::try_from(first_byte)?;

        match data_type {
            DataType::SimpleString => Ok(Frame::Simple(get_string(src)?)),
            DataType::SimpleError => Ok(Frame::Error(get_string(src)?)),
            DataType::Integer => Ok(Frame::Integer(get_integer(src)?)),
            // $<length>\r\n<data>\r\n
            DataType::BulkString => {
                let length = get_integer(src)?;
                if length == -1 {
                    return Ok(Frame::Null);
                }
                let length = usize::try_from(length).map_err(|_| Error::InvalidFormat)?;

                if src.remaining() < length + CRLF.len() {
                    return Err(Error::Incomplete);
                }
                let start = src.position() as usize;
                let data = Bytes::copy_from_slice(&src.get_ref()[start..start + length]);
                if &src.get_ref()[start + length..start + length + CRLF.len()] != CRLF {
                    return Err(Error::InvalidFormat);
                }
                src.advance(length + CRLF.len());

                Ok(Frame::Bulk(data))
            }
            // *<number-of-elements>\r\n<element-1>...<element-n>
            DataType::Array => {
                let length = get_integer(src)?;
                if length == -1 {
                    return Ok(Frame::Null);
                }
                let length = usize::try_from(length).map_err(|_| Error::InvalidFormat)?;

                let mut frames = Vec::with_capacity(length.min(64));
                for _ in 0..length {
                    frames.push(Self::parse(src)?);
                }

                Ok(Frame::Array(frames))
            }
        }
    }

    pub fn write_to(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => {
                dst.put_u8(u8::from(DataType::SimpleString));
                dst.put_slice(s.as_bytes());
                dst.put_slice(CRLF);
            }
            Frame::Error(s) => {
                dst.put_u8(u8::from(DataType::SimpleError));
                dst.put_slice(s.as_bytes());
                dst.put_slice(CRLF);
            }
            Frame::Integer(i) => {
                dst.put_u8(u8::from(DataType::Integer));
                dst.put_slice(i.to_string().as_bytes());
                dst.put_slice(CRLF);
            }
            Frame::Bulk(bytes) => {
                dst.put_u8(u8::from(DataType::BulkString));
                dst.put_slice(bytes.len().to_string().as_bytes());
                dst.put_slice(CRLF);
                dst.put_slice(bytes);
                dst.put_slice(CRLF);
            }
            // RESP2 spells nil as a bulk string of length -1.
            Frame::Null => {
                dst.put_u8(u8::from(DataType::BulkString));
                dst.put_slice(b"-1");
                dst.put_slice(CRLF);
            }
            Frame::Array(arr) => {
                dst.put_u8(u8::from(DataType::Array));
                dst.put_slice(arr.len().to_string().as_bytes());
                dst.put_slice(CRLF);
                for frame in arr {
                    frame.write_to(dst);
                }
            }
            Frame::Inline(payload) => {
                if let Some(payload) = payload {
                    dst.put_slice(payload);
                }
                dst.put_slice(CRLF);
            }
        }
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut bytes = BytesMut::new();
        self.write_to(&mut bytes);
        bytes.to_vec()
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frame::Simple(s) => write!(f, "+{}", s),
            Frame::Error(s) => write!(f, "-{}", s),
            Frame::Integer(i) => write!(f, ":{}", i),
            Frame::Bulk(bytes) => write!(f, "${}", String::from_utf8_lossy(bytes)),
            Frame::Null => write!(f, "$-1"),
            Frame::Array(arr) => {
                write!(f, "*{}", arr.len())?;
                for frame in arr {
                    write!(f, " {}", frame)?;
                }
                Ok(())
            }
            Frame::Inline(Some(payload)) => write!(f, "{}", String::from_utf8_lossy(payload)),
            Frame::Inline(None) => Ok(()),
        }
    }
}

fn get_line<'a>(src: &mut Cursor<&'a [u8]>) -> Result<&'a [u8], Error> {
    let start = src.position() as usize;
    let buf: &'a [u8] = *src.get_ref();

    let end = buf[start..]
        .windows(2)
        .position(|window| window == CRLF)
        .map(|index| start + index)
        .ok_or(Error::Incomplete)?;

    src.set_position((end + CRLF.len()) as u64);

    Ok(&buf[start..end])
}

fn get_string(src: &mut Cursor<&[u8]>) -> Result<String, Error> {
    let line = get_line(src)?;
    String::from_utf8(line.to_vec()).map_err(|_| Error::InvalidFormat)
}

fn get_integer(src: &mut Cursor<&[u8]>) -> Result<i64, Error> {
    get_string(src)?
        .parse::<i64>()
        .map_err(|_| Error::InvalidFormat)
}

fn get_byte(src: &mut Cursor<&[u8]>) -> Result<u8, Error> {
    if !src.has_remaining() {
        return Err(Error::Incomplete);
    }
    Ok(src.get_u8())
}

#[derive(Debug)]
enum DataType {
    SimpleString, // '+'
    SimpleError,  // '-'
    Integer,      // ':'
    BulkString,   // '$'
    Array,        // '*'
}

impl TryFrom<u8> for DataType {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            b'+' => Ok(Self::SimpleString),
            b'-' => Ok(Self::SimpleError),
            b':' => Ok(Self::Integer),
            b'$' => Ok(Self::BulkString),
            b'*' => Ok(Self::Array),
            _ => Err(Error::InvalidDataType(byte)),
        }
    }
}

impl From<DataType> for u8 {
    fn from(value: DataType) -> Self {
        match value {
            DataType::SimpleString => b'+',
            DataType::SimpleError => b'-',
            DataType::Integer => b':',
            DataType::BulkString => b'$',
            DataType::Array => b'*',
        }
    }
}
