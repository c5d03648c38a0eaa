//! # Pipeline
//!
//! Purpose: Drive one borrowed connection through synchronous round trips
//! or batched send/await, and decide on close whether the connection may go
//! back to the pool.
//!
//! ## Design Principles
//! 1. **Order Is The Contract**: Enqueue order equals wire order equals
//!    reply order; the pending queue is strictly FIFO.
//! 2. **Monotonic Reuse Bit**: Every wire operation can only demote
//!    `can_reuse` from true to false, never back.
//! 3. **Drain To Realign**: Sink-level failures do not stop the drain; only
//!    a connection-class error abandons the wire.

use std::mem;

use crate::command::Request;
use crate::conn::Conn;
use crate::context::Context;
use crate::error::{ClientError, ClientResult};
use crate::pool::Pool;
use crate::resp::RespValue;
use crate::response::{Discard, Response};

/// One queued reply slot, in send order.
pub(crate) enum PendingReply<'a> {
    /// Reply projected into a caller-owned sink.
    User(&'a mut dyn Response),
    /// Reply consumed and dropped (still surfaces server errors).
    Ignore,
    /// `EXEC` reply: an array demultiplexed into the queued sinks in order.
    Exec(Vec<&'a mut dyn Response>),
}

impl PendingReply<'_> {
    fn from_data(&mut self, data: RespValue) -> ClientResult<()> {
        match self {
            PendingReply::User(res) => res.from_data(data),
            PendingReply::Ignore => Discard.from_data(data),
            PendingReply::Exec(responses) => match data {
                RespValue::Array(None) => Err(ClientError::AbortedTransaction),
                RespValue::Array(Some(items)) => {
                    if items.len() != responses.len() {
                        return Err(ClientError::UnexpectedResponse(format!(
                            "transaction reply carries {} elements for {} queued commands",
                            items.len(),
                            responses.len()
                        )));
                    }
                    for (res, item) in responses.iter_mut().zip(items) {
                        res.from_data(item)?;
                    }
                    Ok(())
                }
                other => Err(ClientError::UnexpectedResponse(format!(
                    "expected array but {}",
                    other.kind()
                ))),
            },
        }
    }
}

/// Stateful wrapper around one borrowed connection.
///
/// The lifetime parameter ties queued response sinks to the pipeline:
/// callers get their sinks back once the pipeline is closed or dropped.
pub struct Pipeline<'a> {
    conn: Option<Conn>,
    pool: Pool,
    can_reuse: bool,
    pending: Vec<PendingReply<'a>>,
}

impl<'a> Pipeline<'a> {
    pub(crate) fn new(conn: Conn, pool: Pool) -> Pipeline<'a> {
        Pipeline {
            conn: Some(conn),
            pool,
            can_reuse: true,
            pending: Vec::new(),
        }
    }

    /// Synchronous round trip: send, flush, receive, project.
    pub fn execute(
        &mut self,
        ctx: &Context,
        req: &dyn Request,
        res: &mut dyn Response,
    ) -> ClientResult<()> {
        self.send(ctx, req)?;
        self.flush(ctx)?;
        let value = self.receive(ctx)?;
        res.from_data(value)
    }

    /// Queued send: the request goes into the write buffer, the sink joins
    /// the pending queue. Nothing is flushed until [`Pipeline::wait`].
    pub fn feed(
        &mut self,
        ctx: &Context,
        req: &dyn Request,
        res: &'a mut dyn Response,
    ) -> ClientResult<()> {
        self.send(ctx, req)?;
        self.pending.push(PendingReply::User(res));
        Ok(())
    }

    /// Queued send whose reply is consumed and dropped.
    pub(crate) fn feed_ignored(&mut self, ctx: &Context, req: &dyn Request) -> ClientResult<()> {
        self.send(ctx, req)?;
        self.pending.push(PendingReply::Ignore);
        Ok(())
    }

    /// Queued send whose array reply is demultiplexed into `responses`.
    pub(crate) fn feed_exec(
        &mut self,
        ctx: &Context,
        req: &dyn Request,
        responses: Vec<&'a mut dyn Response>,
    ) -> ClientResult<()> {
        self.send(ctx, req)?;
        self.pending.push(PendingReply::Exec(responses));
        Ok(())
    }

    /// Flushes once, then drains one reply per queued sink in FIFO order.
    ///
    /// A connection-class error aborts immediately: the wire alignment is
    /// gone and the remaining sinks stay unpopulated. Any other failure is
    /// remembered (first one wins) while the drain continues, so the
    /// connection ends the call aligned to a message boundary.
    pub fn wait(&mut self, ctx: &Context) -> ClientResult<()> {
        self.flush(ctx)?;

        let mut first_err = None;
        for mut reply in mem::take(&mut self.pending) {
            let value = self.receive(ctx)?;
            if let Err(err) = reply.from_data(value) {
                if first_err.is_none() {
                    first_err = Some(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Releases the connection: back to the pool when every wire operation
    /// so far left it aligned, destroyed otherwise.
    pub fn close(mut self) -> ClientResult<()> {
        self.release()
    }

    /// Number of replies still owed by the server.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn send(&mut self, ctx: &Context, req: &dyn Request) -> ClientResult<()> {
        let data = req.to_data()?;
        let result = self.conn_mut().send(ctx, &data);
        self.track(result)
    }

    fn flush(&mut self, ctx: &Context) -> ClientResult<()> {
        let result = self.conn_mut().flush(ctx);
        self.track(result)
    }

    fn receive(&mut self, ctx: &Context) -> ClientResult<RespValue> {
        match self.conn_mut().receive(ctx) {
            Ok(value) => Ok(value),
            Err(err) => {
                self.can_reuse = self.can_reuse && err.can_reuse();
                Err(err)
            }
        }
    }

    fn track(&mut self, result: ClientResult<()>) -> ClientResult<()> {
        if let Err(err) = &result {
            self.can_reuse = self.can_reuse && err.can_reuse();
        }
        result
    }

    fn conn_mut(&mut self) -> &mut Conn {
        self.conn
            .as_mut()
            .expect("pipeline holds its connection until release")
    }

    fn release(&mut self) -> ClientResult<()> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => return Ok(()),
        };
        if self.can_reuse {
            self.pool.put(conn)
        } else {
            self.pool.discard(conn)
        }
    }
}

impl Drop for Pipeline<'_> {
    fn drop(&mut self) {
        let _ = self.release();
    }
}
