//! # Typed Responses
//!
//! Purpose: Project decoded protocol values into the shapes callers want,
//! surfacing server error replies and shape mismatches as errors.
//!
//! A sink never marks the connection bad: by the time it runs, the value
//! was already decoded cleanly off the wire.

use crate::error::{ClientError, ClientResult};
use crate::resp::RespValue;

/// Input-only sink that a decoded value is projected into.
pub trait Response {
    /// Populates the sink from a decoded value.
    fn from_data(&mut self, data: RespValue) -> ClientResult<()>;
}

/// String projection of a reply.
///
/// Accepts simple strings verbatim, renders bulk strings and integers, and
/// keeps the bulk null sentinel observable through [`StringResponse::is_null`].
#[derive(Debug, Default, Clone)]
pub struct StringResponse {
    value: String,
    is_null: bool,
}

impl StringResponse {
    pub fn new() -> StringResponse {
        StringResponse::default()
    }

    /// The projected text. Empty for a null bulk reply.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// True when the reply was a null bulk string.
    pub fn is_null(&self) -> bool {
        self.is_null
    }
}

impl Response for StringResponse {
    fn from_data(&mut self, data: RespValue) -> ClientResult<()> {
        self.is_null = false;
        match data {
            RespValue::Simple(text) => self.value = text,
            RespValue::Error(msg) => return Err(ClientError::Server(msg)),
            RespValue::Integer(n) => self.value = n.to_string(),
            RespValue::Bulk(Some(bytes)) => {
                self.value = String::from_utf8_lossy(&bytes).into_owned()
            }
            RespValue::Bulk(None) => {
                self.value.clear();
                self.is_null = true;
            }
            data @ RespValue::Array(_) => {
                return Err(ClientError::UnexpectedResponse(format!(
                    "expected string but {}",
                    data.kind()
                )))
            }
        }
        Ok(())
    }
}

/// Integer projection of a reply.
///
/// Accepts integers directly and parses simple or bulk strings as base-10.
#[derive(Debug, Default, Clone, Copy)]
pub struct IntegerResponse {
    value: i64,
}

impl IntegerResponse {
    pub fn new() -> IntegerResponse {
        IntegerResponse::default()
    }

    pub fn value(&self) -> i64 {
        self.value
    }
}

impl Response for IntegerResponse {
    fn from_data(&mut self, data: RespValue) -> ClientResult<()> {
        match data {
            RespValue::Integer(n) => self.value = n,
            RespValue::Simple(text) => self.value = parse_integer(text.as_bytes())?,
            RespValue::Bulk(Some(bytes)) => self.value = parse_integer(&bytes)?,
            RespValue::Error(msg) => return Err(ClientError::Server(msg)),
            data => {
                return Err(ClientError::UnexpectedResponse(format!(
                    "expected integer but {}",
                    data.kind()
                )))
            }
        }
        Ok(())
    }
}

fn parse_integer(bytes: &[u8]) -> ClientResult<i64> {
    atoi::atoi::<i64>(bytes).ok_or_else(|| {
        ClientError::UnexpectedResponse(format!(
            "cannot parse integer from {:?}",
            String::from_utf8_lossy(bytes)
        ))
    })
}

/// Sink that accepts any reply shape and only surfaces server errors.
///
/// Used for replies whose payload carries no information, like the `QUEUED`
/// echoes inside a transaction.
#[derive(Debug, Default, Clone, Copy)]
pub struct Discard;

impl Response for Discard {
    fn from_data(&mut self, data: RespValue) -> ClientResult<()> {
        match data {
            RespValue::Error(msg) => Err(ClientError::Server(msg)),
            _ => Ok(()),
        }
    }
}
