//! # Transactions
//!
//! Purpose: Group commands into a server-side `MULTI`/`EXEC` block over a
//! pipeline, deferring every user-visible result to the `EXEC` reply.
//!
//! While the block is open the server echoes `QUEUED` per command; those
//! echoes carry no payload and are consumed by discarding sinks. The `EXEC`
//! reply is one array with a slot per buffered command, demultiplexed into
//! the queued sinks in order.

use std::mem;

use crate::command::{DiscardRequest, ExecRequest, MultiRequest, Request};
use crate::context::Context;
use crate::error::ClientResult;
use crate::pipeline::Pipeline;
use crate::response::{Discard, Response};

impl<'a> Pipeline<'a> {
    /// Opens a transaction: issues `MULTI` and consumes its OK reply.
    pub fn multi<'p>(&'p mut self, ctx: &Context) -> ClientResult<Transaction<'p, 'a>> {
        self.execute(ctx, &MultiRequest, &mut Discard)?;
        Ok(Transaction {
            pipeline: self,
            pending: Vec::new(),
        })
    }
}

/// An open `MULTI` block bound to one pipeline.
///
/// Queued sinks stay unpopulated until [`Transaction::exec`] succeeds.
pub struct Transaction<'p, 'a> {
    pipeline: &'p mut Pipeline<'a>,
    pending: Vec<&'a mut dyn Response>,
}

impl<'p, 'a> Transaction<'p, 'a> {
    /// Buffers a command inside the block.
    ///
    /// The request is sent right away (its `QUEUED` echo is discarded); the
    /// sink is held locally for the `EXEC` demultiplex.
    pub fn queue(
        &mut self,
        ctx: &Context,
        req: &dyn Request,
        res: &'a mut dyn Response,
    ) -> ClientResult<()> {
        self.pipeline.feed_ignored(ctx, req)?;
        self.pending.push(res);
        Ok(())
    }

    /// Executes the block.
    ///
    /// Sends `EXEC` with the demultiplexing sink, then drains the pipeline:
    /// the pending `QUEUED` echoes first, then the `EXEC` array itself. A
    /// null-array reply means the server aborted the block; that surfaces
    /// as [`crate::ClientError::AbortedTransaction`] with every queued sink
    /// left untouched.
    pub fn exec(mut self, ctx: &Context) -> ClientResult<()> {
        let responses = mem::take(&mut self.pending);
        self.pipeline.feed_exec(ctx, &ExecRequest, responses)?;
        self.pipeline.wait(ctx)
    }

    /// Abandons the block: issues `DISCARD`, drains the pending echoes, and
    /// drops the queued sinks unpopulated.
    pub fn discard(mut self, ctx: &Context) -> ClientResult<()> {
        self.pending.clear();
        self.pipeline.feed_ignored(ctx, &DiscardRequest)?;
        self.pipeline.wait(ctx)
    }
}
