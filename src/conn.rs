//! # Connection
//!
//! Purpose: Own one transport and its buffered adapters, move values across
//! the wire, and classify every failure as reusable or fatal.
//!
//! ## Design Principles
//! 1. **Single Owner**: A connection is operated by at most one caller at a
//!    time; no internal locking.
//! 2. **Buffer Then Flush**: `send` encodes into the write buffer; only
//!    `flush` pushes bytes to the transport.
//! 3. **Alignment Proof**: An error is reusable only when the wire cursor is
//!    provably still at a message boundary.

use std::io::{self, BufReader, BufWriter, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Instant;

use crate::context::Context;
use crate::error::{ClientError, ClientResult};
use crate::resp::{read_value, write_value, DecodeError, RespValue};

/// Buffer size for each side of the connection.
const BUF_SIZE: usize = 1024;

/// A single connection to the server with reusable buffers.
#[derive(Debug)]
pub struct Conn {
    stream: TcpStream,
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
    line_buf: Vec<u8>,
    closed: bool,
}

impl Conn {
    /// Wraps a dialed stream with buffered adapters.
    pub fn new(stream: TcpStream) -> io::Result<Conn> {
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;
        let reader = BufReader::with_capacity(BUF_SIZE, stream.try_clone()?);
        let writer = BufWriter::with_capacity(BUF_SIZE, stream.try_clone()?);
        Ok(Conn {
            stream,
            reader,
            writer,
            line_buf: Vec::with_capacity(128),
            closed: false,
        })
    }

    /// Encodes `value` into the write buffer.
    ///
    /// No flush happens here. A context trip before encoding leaves the
    /// connection reusable; an IO error mid-encode (the buffer spilling to
    /// the transport) is fatal.
    pub fn send(&mut self, ctx: &Context, value: &RespValue) -> ClientResult<()> {
        ctx.checkpoint()?;
        self.set_write_deadline(ctx)?;
        write_value(&mut self.writer, value).map_err(|err| classify_io(ctx, err))
    }

    /// Forces the write buffer out to the transport.
    pub fn flush(&mut self, ctx: &Context) -> ClientResult<()> {
        ctx.checkpoint()?;
        self.set_write_deadline(ctx)?;
        self.writer.flush().map_err(|err| classify_io(ctx, err))
    }

    /// Reads and decodes one complete value.
    ///
    /// Any IO or framing failure is fatal. A decoded error reply is data,
    /// not a transport error, and comes back as `Ok(RespValue::Error)`.
    pub fn receive(&mut self, ctx: &Context) -> ClientResult<RespValue> {
        self.set_read_deadline(ctx)?;
        match read_value(&mut self.reader, &mut self.line_buf) {
            Ok(value) => Ok(value),
            Err(DecodeError::Io(err)) => Err(classify_io(ctx, err)),
            Err(DecodeError::Frame(msg)) => Err(ClientError::Frame(msg)),
        }
    }

    /// Releases the transport. Safe to call more than once.
    pub fn close(&mut self) -> io::Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        match self.stream.shutdown(Shutdown::Both) {
            Err(err) if err.kind() != io::ErrorKind::NotConnected => Err(err),
            _ => Ok(()),
        }
    }

    fn set_write_deadline(&mut self, ctx: &Context) -> ClientResult<()> {
        let timeout = remaining(ctx)?;
        self.stream
            .set_write_timeout(timeout)
            .map_err(|err| ClientError::Conn {
                source: err,
                can_reuse: false,
            })
    }

    fn set_read_deadline(&mut self, ctx: &Context) -> ClientResult<()> {
        let timeout = remaining(ctx)?;
        self.stream
            .set_read_timeout(timeout)
            .map_err(|err| ClientError::Conn {
                source: err,
                can_reuse: false,
            })
    }
}

/// Time left until the context deadline, or `None` for no deadline.
///
/// An already-expired deadline trips here, before any IO, so the error is
/// reusable.
fn remaining(ctx: &Context) -> ClientResult<Option<std::time::Duration>> {
    match ctx.deadline() {
        None => Ok(None),
        Some(deadline) => {
            let now = Instant::now();
            if deadline <= now {
                return Err(ClientError::Cancelled { can_reuse: true });
            }
            Ok(Some(deadline - now))
        }
    }
}

/// Maps an IO failure to the error taxonomy.
///
/// Socket timeouts are only ever derived from the context deadline, so a
/// timeout under a deadline is a deadline strike: reported as cancellation,
/// fatal to the connection. Everything else is a plain fatal transport
/// error.
fn classify_io(ctx: &Context, err: io::Error) -> ClientError {
    let timed_out = matches!(
        err.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    );
    if timed_out && ctx.deadline().is_some() {
        return ClientError::Cancelled { can_reuse: false };
    }
    ClientError::Conn {
        source: err,
        can_reuse: false,
    }
}
