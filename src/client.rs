//! # Client Facade
//!
//! Purpose: Expose a compact request/response API over the pool, hiding
//! connection borrowing and the return-or-destroy decision.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: One call borrows a connection, runs one round
//!    trip, and settles the connection before the caller sees the result.
//! 2. **Reuse On Aligned Errors**: A failed call still parks the connection
//!    when the error left the wire at a message boundary.
//! 3. **Typed Results**: Helpers return populated response sinks rather
//!    than raw protocol values.

use crate::command::{GetRequest, IncrRequest, Request, SetRequest};
use crate::conn::Conn;
use crate::context::Context;
use crate::error::{ClientError, ClientResult};
use crate::pipeline::Pipeline;
use crate::pool::Pool;
use crate::response::{IntegerResponse, Response, StringResponse};

/// Pooled client for a single server.
#[derive(Clone)]
pub struct Client {
    pool: Pool,
}

impl Client {
    /// Wraps an existing pool.
    pub fn new(pool: Pool) -> Client {
        Client { pool }
    }

    /// Runs one request/response round trip on a pool-borrowed connection.
    pub fn call(&self, ctx: &Context, req: &dyn Request, res: &mut dyn Response) -> ClientResult<()> {
        let data = req.to_data()?;
        let mut conn = self.pool.get(ctx)?;

        if let Err(err) = conn.send(ctx, &data) {
            return self.settle(err, conn);
        }
        if let Err(err) = conn.flush(ctx) {
            return self.settle(err, conn);
        }
        let value = match conn.receive(ctx) {
            Ok(value) => value,
            Err(err) => return self.settle(err, conn),
        };

        self.pool.put(conn)?;
        res.from_data(value)
    }

    /// Fetches a key. A missing key reads back as a null string response.
    pub fn get(&self, ctx: &Context, key: impl Into<String>) -> ClientResult<StringResponse> {
        let mut res = StringResponse::new();
        self.call(ctx, &GetRequest::new(key), &mut res)?;
        Ok(res)
    }

    /// Sets a key.
    pub fn set(&self, ctx: &Context, req: &SetRequest) -> ClientResult<StringResponse> {
        let mut res = StringResponse::new();
        self.call(ctx, req, &mut res)?;
        Ok(res)
    }

    /// Increments a key, returning the new value.
    pub fn incr(&self, ctx: &Context, key: impl Into<String>) -> ClientResult<IntegerResponse> {
        let mut res = IntegerResponse::new();
        self.call(ctx, &IncrRequest::new(key), &mut res)?;
        Ok(res)
    }

    /// Borrows a connection into a pipeline for batched or transactional
    /// use. Closing the pipeline settles the connection.
    pub fn pipeline<'a>(&self, ctx: &Context) -> ClientResult<Pipeline<'a>> {
        Ok(Pipeline::new(self.pool.get(ctx)?, self.pool.clone()))
    }

    /// Route a failed round trip: park the connection when the wire is
    /// still aligned, destroy it otherwise, and surface the error.
    fn settle(&self, err: ClientError, conn: Conn) -> ClientResult<()> {
        if err.can_reuse() {
            let _ = self.pool.put(conn);
        } else {
            let _ = self.pool.discard(conn);
        }
        Err(err)
    }
}
