//! # Requests
//!
//! Purpose: Describe commands as values. A request only knows how to render
//! itself as a protocol array; moving it across the wire is the pipeline's
//! job.

use std::time::Duration;

use crate::error::ClientResult;
use crate::resp::RespValue;

/// A command that can be rendered as a protocol value.
pub trait Request {
    fn to_data(&self) -> ClientResult<RespValue>;
}

/// `GET key`.
#[derive(Debug, Clone)]
pub struct GetRequest {
    pub key: String,
}

impl GetRequest {
    pub fn new(key: impl Into<String>) -> GetRequest {
        GetRequest { key: key.into() }
    }
}

impl Request for GetRequest {
    fn to_data(&self) -> ClientResult<RespValue> {
        Ok(RespValue::array(vec![
            RespValue::bulk("GET"),
            RespValue::bulk(self.key.as_str()),
        ]))
    }
}

/// `SET key value [PX ms] [NX|XX]`.
#[derive(Debug, Clone, Default)]
pub struct SetRequest {
    pub key: String,
    pub value: String,
    pub expire: Option<Duration>,
    pub not_exist: bool,
    pub already_exist: bool,
}

impl SetRequest {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> SetRequest {
        SetRequest {
            key: key.into(),
            value: value.into(),
            ..SetRequest::default()
        }
    }

    /// Attaches a millisecond expiry (`PX`).
    pub fn expire(mut self, ttl: Duration) -> SetRequest {
        self.expire = Some(ttl);
        self
    }

    /// Only set the key when it does not exist (`NX`).
    pub fn if_not_exist(mut self) -> SetRequest {
        self.not_exist = true;
        self
    }

    /// Only set the key when it already exists (`XX`).
    pub fn if_already_exist(mut self) -> SetRequest {
        self.already_exist = true;
        self
    }
}

impl Request for SetRequest {
    fn to_data(&self) -> ClientResult<RespValue> {
        let mut items = vec![
            RespValue::bulk("SET"),
            RespValue::bulk(self.key.as_str()),
            RespValue::bulk(self.value.as_str()),
        ];
        if let Some(ttl) = self.expire {
            items.push(RespValue::bulk("PX"));
            items.push(RespValue::Integer(ttl.as_millis() as i64));
        }
        if self.not_exist {
            items.push(RespValue::bulk("NX"));
        } else if self.already_exist {
            items.push(RespValue::bulk("XX"));
        }
        Ok(RespValue::array(items))
    }
}

/// `INCR key`.
#[derive(Debug, Clone)]
pub struct IncrRequest {
    pub key: String,
}

impl IncrRequest {
    pub fn new(key: impl Into<String>) -> IncrRequest {
        IncrRequest { key: key.into() }
    }
}

impl Request for IncrRequest {
    fn to_data(&self) -> ClientResult<RespValue> {
        Ok(RespValue::array(vec![
            RespValue::bulk("INCR"),
            RespValue::bulk(self.key.as_str()),
        ]))
    }
}

macro_rules! bare_request {
    ($name:ident, $word:literal) => {
        #[derive(Debug, Clone, Copy)]
        pub(crate) struct $name;

        impl Request for $name {
            fn to_data(&self) -> ClientResult<RespValue> {
                Ok(RespValue::array(vec![RespValue::bulk($word)]))
            }
        }
    };
}

bare_request!(MultiRequest, "MULTI");
bare_request!(ExecRequest, "EXEC");
bare_request!(DiscardRequest, "DISCARD");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_renders_two_bulks() {
        let data = GetRequest::new("aaa").to_data().unwrap();
        assert_eq!(
            data,
            RespValue::array(vec![RespValue::bulk("GET"), RespValue::bulk("aaa")])
        );
    }

    #[test]
    fn set_renders_options_in_order() {
        let data = SetRequest::new("k", "v")
            .expire(Duration::from_secs(2))
            .if_not_exist()
            .to_data()
            .unwrap();
        assert_eq!(
            data,
            RespValue::array(vec![
                RespValue::bulk("SET"),
                RespValue::bulk("k"),
                RespValue::bulk("v"),
                RespValue::bulk("PX"),
                RespValue::Integer(2000),
                RespValue::bulk("NX"),
            ])
        );
    }

    #[test]
    fn bare_requests_render_single_word() {
        assert_eq!(
            MultiRequest.to_data().unwrap(),
            RespValue::array(vec![RespValue::bulk("MULTI")])
        );
        assert_eq!(
            ExecRequest.to_data().unwrap(),
            RespValue::array(vec![RespValue::bulk("EXEC")])
        );
        assert_eq!(
            DiscardRequest.to_data().unwrap(),
            RespValue::array(vec![RespValue::bulk("DISCARD")])
        );
    }
}
