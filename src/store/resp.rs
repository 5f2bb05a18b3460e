//! Minimal RESP wire codec.
//!
//! Commands go out as arrays of bulk strings; replies are parsed
//! incrementally from a read buffer, returning [`ParseError::Incomplete`]
//! until a full reply is buffered. Only the reply shapes the probe and the
//! discovery handshake use are supported.

use bytes::{BufMut, Bytes, BytesMut};

/// A single parsed server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `+OK\r\n`
    Simple(String),
    /// `-ERR ...\r\n`
    Error(String),
    /// `:42\r\n`
    Integer(i64),
    /// `$5\r\nhello\r\n`
    Bulk(Bytes),
    /// `$-1\r\n` or `*-1\r\n`
    Null,
    /// `*2\r\n...`
    Array(Vec<Reply>),
}

impl Reply {
    /// The reply as UTF-8 text, for `Simple` and `Bulk` replies.
    pub fn as_utf8(&self) -> Option<&str> {
        match self {
            Reply::Simple(s) => Some(s),
            Reply::Bulk(b) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// More bytes are needed before a full reply can be parsed.
    Incomplete,
    /// The buffer cannot be a valid reply.
    Invalid(String),
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParseError::Incomplete => write!(f, "incomplete reply"),
            ParseError::Invalid(detail) => write!(f, "invalid reply: {}", detail),
        }
    }
}

/// Encode a command as a RESP array of bulk strings.
pub fn encode_command(args: &[&str], buf: &mut BytesMut) {
    buf.put_slice(format!("*{}\r\n", args.len()).as_bytes());
    for arg in args {
        buf.put_slice(format!("${}\r\n", arg.len()).as_bytes());
        buf.put_slice(arg.as_bytes());
        buf.put_slice(b"\r\n");
    }
}

/// Parse one reply from the front of `buf`.
///
/// On success returns the reply and the number of bytes consumed; the
/// caller removes them with `split_to`.
pub fn parse_reply(buf: &[u8]) -> Result<(Reply, usize), ParseError> {
    parse_at(buf, 0)
}

fn parse_at(buf: &[u8], pos: usize) -> Result<(Reply, usize), ParseError> {
    let tag = *buf.get(pos).ok_or(ParseError::Incomplete)?;
    let (line, next) = read_line(buf, pos + 1)?;
    match tag {
        b'+' => Ok((Reply::Simple(text(line)?), next)),
        b'-' => Ok((Reply::Error(text(line)?), next)),
        b':' => Ok((Reply::Integer(integer(line)?), next)),
        b'$' => {
            let len = integer(line)?;
            if len < 0 {
                return Ok((Reply::Null, next));
            }
            let len = len as usize;
            let end = next + len;
            if buf.len() < end + 2 {
                return Err(ParseError::Incomplete);
            }
            if &buf[end..end + 2] != b"\r\n" {
                return Err(ParseError::Invalid("bulk string missing terminator".into()));
            }
            Ok((Reply::Bulk(Bytes::copy_from_slice(&buf[next..end])), end + 2))
        }
        b'*' => {
            let len = integer(line)?;
            if len < 0 {
                return Ok((Reply::Null, next));
            }
            let mut items = Vec::with_capacity(len as usize);
            let mut pos = next;
            for _ in 0..len {
                let (item, after) = parse_at(buf, pos)?;
                items.push(item);
                pos = after;
            }
            Ok((Reply::Array(items), pos))
        }
        other => Err(ParseError::Invalid(format!(
            "unknown reply tag {:?}",
            other as char
        ))),
    }
}

/// Read up to the next CRLF, returning the line body and the position
/// after the terminator.
fn read_line(buf: &[u8], pos: usize) -> Result<(&[u8], usize), ParseError> {
    let mut i = pos;
    while i + 1 < buf.len() {
        if buf[i] == b'\r' && buf[i + 1] == b'\n' {
            return Ok((&buf[pos..i], i + 2));
        }
        i += 1;
    }
    Err(ParseError::Incomplete)
}

fn text(line: &[u8]) -> Result<String, ParseError> {
    std::str::from_utf8(line)
        .map(str::to_owned)
        .map_err(|_| ParseError::Invalid("non-utf8 line".into()))
}

fn integer(line: &[u8]) -> Result<i64, ParseError> {
    std::str::from_utf8(line)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| ParseError::Invalid("malformed integer".into()))
}
