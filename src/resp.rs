//! # RESP2 Values and Wire Codec
//!
//! Purpose: Model the five protocol data types and encode/decode them over
//! buffered byte streams, keeping allocations under control.
//!
//! ## Design Principles
//! 1. **Null Is Not Empty**: Bulk strings and arrays carry a distinct null
//!    sentinel that survives a round trip.
//! 2. **Streaming Decode**: One complete top-level value is materialised per
//!    call, recursing for nested arrays.
//! 3. **Binary-Safe**: Bulk strings are length-prefixed raw bytes; embedded
//!    CRLF is legal payload.
//! 4. **Fail Fast**: Any malformed framing is an immediate, fatal error.

use std::io::{self, BufRead, Write};

/// Maximum accepted bulk string payload (512 MiB).
pub const MAX_BULK_LEN: i64 = 512 * 1024 * 1024;

/// A single RESP2 protocol value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RespValue {
    /// `+OK` style single-line string. Must not contain CR or LF.
    Simple(String),
    /// `-ERR ...` style error line reported by the server.
    Error(String),
    /// `:123` signed 64-bit integer.
    Integer(i64),
    /// `$...` bulk string; `None` is the null sentinel, distinct from empty.
    Bulk(Option<Vec<u8>>),
    /// `*...` array; `None` is the null sentinel, distinct from empty.
    Array(Option<Vec<RespValue>>),
}

impl RespValue {
    /// Builds a non-null bulk string.
    pub fn bulk(data: impl Into<Vec<u8>>) -> RespValue {
        RespValue::Bulk(Some(data.into()))
    }

    /// Builds a non-null array.
    pub fn array(items: Vec<RespValue>) -> RespValue {
        RespValue::Array(Some(items))
    }

    /// Short name of the variant, used in response-mismatch messages.
    pub(crate) fn kind(&self) -> &'static str {
        match self {
            RespValue::Simple(_) => "simple string",
            RespValue::Error(_) => "error",
            RespValue::Integer(_) => "integer",
            RespValue::Bulk(_) => "bulk string",
            RespValue::Array(_) => "array",
        }
    }
}

/// Decode failure, split by which side of the reuse line it falls on.
///
/// Both variants are fatal to the connection that produced them; the split
/// exists so the connection layer can fold timeouts into cancellation.
#[derive(Debug)]
pub(crate) enum DecodeError {
    /// Transport failure (including EOF and read timeouts).
    Io(io::Error),
    /// The peer sent bytes that do not form a valid frame.
    Frame(String),
}

/// Encodes one value into `w`, depth-first, without flushing.
///
/// The caller owns buffering and the final flush; a message is never pushed
/// to the transport from here.
pub fn write_value<W: Write>(w: &mut W, value: &RespValue) -> io::Result<()> {
    let mut digits = itoa::Buffer::new();
    match value {
        RespValue::Simple(line) => {
            w.write_all(b"+")?;
            w.write_all(line.as_bytes())?;
            w.write_all(b"\r\n")
        }
        RespValue::Error(line) => {
            w.write_all(b"-")?;
            w.write_all(line.as_bytes())?;
            w.write_all(b"\r\n")
        }
        RespValue::Integer(n) => {
            w.write_all(b":")?;
            w.write_all(digits.format(*n).as_bytes())?;
            w.write_all(b"\r\n")
        }
        RespValue::Bulk(None) => w.write_all(b"$-1\r\n"),
        RespValue::Bulk(Some(data)) => {
            w.write_all(b"$")?;
            w.write_all(digits.format(data.len()).as_bytes())?;
            w.write_all(b"\r\n")?;
            w.write_all(data)?;
            w.write_all(b"\r\n")
        }
        RespValue::Array(None) => w.write_all(b"*-1\r\n"),
        RespValue::Array(Some(items)) => {
            w.write_all(b"*")?;
            w.write_all(digits.format(items.len()).as_bytes())?;
            w.write_all(b"\r\n")?;
            for item in items {
                write_value(w, item)?;
            }
            Ok(())
        }
    }
}

/// Reads one complete value from `r`.
///
/// `line_buf` is caller-owned scratch so repeated receives on one
/// connection reuse the same allocation.
pub(crate) fn read_value<R: BufRead>(
    r: &mut R,
    line_buf: &mut Vec<u8>,
) -> Result<RespValue, DecodeError> {
    read_line(r, line_buf)?;
    if line_buf.is_empty() {
        return Err(DecodeError::Frame("empty line response".into()));
    }

    let (tag, header) = (line_buf[0], &line_buf[1..]);
    match tag {
        b'+' => Ok(RespValue::Simple(header_text(header)?)),
        b'-' => Ok(RespValue::Error(header_text(header)?)),
        b':' => Ok(RespValue::Integer(header_int(header)?)),
        b'$' => {
            let len = header_int(header)?;
            read_bulk(r, len)
        }
        b'*' => {
            let len = header_int(header)?;
            read_array(r, line_buf, len)
        }
        other => Err(DecodeError::Frame(format!(
            "unknown data type {:?}",
            other as char
        ))),
    }
}

fn read_bulk<R: BufRead>(r: &mut R, len: i64) -> Result<RespValue, DecodeError> {
    if len == -1 {
        return Ok(RespValue::Bulk(None));
    }
    if len < -1 || len > MAX_BULK_LEN {
        return Err(DecodeError::Frame(format!("invalid bulk length {}", len)));
    }

    // Body plus trailing CRLF in one read to stay aligned on short reads.
    let mut body = vec![0u8; len as usize + 2];
    r.read_exact(&mut body).map_err(DecodeError::Io)?;
    if body[body.len() - 2..] != *b"\r\n" {
        return Err(DecodeError::Frame("bulk string missing trailing CRLF".into()));
    }
    body.truncate(body.len() - 2);
    Ok(RespValue::Bulk(Some(body)))
}

fn read_array<R: BufRead>(
    r: &mut R,
    line_buf: &mut Vec<u8>,
    len: i64,
) -> Result<RespValue, DecodeError> {
    if len == -1 {
        return Ok(RespValue::Array(None));
    }
    if len < -1 {
        return Err(DecodeError::Frame(format!("invalid array length {}", len)));
    }

    let len = len as usize;
    let mut items = Vec::with_capacity(len.min(64));
    for _ in 0..len {
        items.push(read_value(r, line_buf)?);
    }
    Ok(RespValue::Array(Some(items)))
}

/// Reads one CRLF-terminated line into `buf` with the terminator stripped.
fn read_line<R: BufRead>(r: &mut R, buf: &mut Vec<u8>) -> Result<(), DecodeError> {
    buf.clear();
    let n = r.read_until(b'\n', buf).map_err(DecodeError::Io)?;
    if n == 0 {
        return Err(DecodeError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed by peer",
        )));
    }
    if buf.len() < 2 || buf[buf.len() - 2] != b'\r' || buf[buf.len() - 1] != b'\n' {
        return Err(DecodeError::Frame("line not terminated by CRLF".into()));
    }
    buf.truncate(buf.len() - 2);
    Ok(())
}

fn header_text(header: &[u8]) -> Result<String, DecodeError> {
    String::from_utf8(header.to_vec())
        .map_err(|_| DecodeError::Frame("line is not valid UTF-8".into()))
}

fn header_int(header: &[u8]) -> Result<i64, DecodeError> {
    atoi::atoi::<i64>(header).ok_or_else(|| {
        DecodeError::Frame(format!(
            "invalid integer header {:?}",
            String::from_utf8_lossy(header)
        ))
    })
}
