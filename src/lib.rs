//! # LineKV Client
//!
//! Purpose: Provide a synchronous client for RESP2 key-value servers with
//! connection pooling, pipelining, and server-side transactions.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Dialed connections are reused through a
//!    bounded idle ring with background eviction.
//! 2. **Reuse Bit As Alignment Proof**: Every error states whether the
//!    connection's wire cursor is still at a message boundary; only aligned
//!    connections go back to the pool.
//! 3. **Pipelining Without Reordering**: Batched sends decouple the two
//!    halves of a round trip while the wire stays strictly in order.
//! 4. **Protocol Clarity**: The codec is explicit about null versus empty
//!    and fails fast on malformed framing.

mod client;
mod command;
mod conn;
mod context;
mod error;
mod pipeline;
mod pool;
mod resp;
mod response;
mod slots;
mod transaction;

pub use client::Client;
pub use command::{GetRequest, IncrRequest, Request, SetRequest};
pub use conn::Conn;
pub use context::{CancelToken, Context};
pub use error::{ClientError, ClientResult};
pub use pipeline::Pipeline;
pub use pool::{DialFunc, ErrorSink, Pool, PoolConfig, PoolStats};
pub use resp::{RespValue, MAX_BULK_LEN};
pub use response::{Discard, IntegerResponse, Response, StringResponse};
pub use transaction::Transaction;
