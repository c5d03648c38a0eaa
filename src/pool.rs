//! # Connection Pool
//!
//! Purpose: Reuse dialed connections to reduce handshake latency, cap the
//! number of open connections, and retire idle entries in the background.
//!
//! ## Design Principles
//! 1. **Minimal Locking**: One mutex guards the in-memory bookkeeping; it is
//!    never held across dial, close, or any other IO.
//! 2. **Admission Ticket**: The open counter is bumped before dialing, so the
//!    ceiling holds with no transient overshoot.
//! 3. **Fail Fast**: At the ceiling with no idle entry, acquisition returns a
//!    capacity error instead of queueing.
//! 4. **Background Eviction**: A dedicated thread closes entries that sit
//!    idle past their timeout, down to a warm floor.

use std::io;
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex, MutexGuard};

use crate::conn::Conn;
use crate::context::Context;
use crate::error::{ClientError, ClientResult};
use crate::slots::SlotPool;

/// Pluggable dial step: produces a connected stream for `addr`, honouring
/// the context deadline.
pub type DialFunc = Arc<dyn Fn(&Context, &str) -> io::Result<TcpStream> + Send + Sync>;

/// Sink for errors raised off the caller's path (eviction, drains).
pub type ErrorSink = Arc<dyn Fn(&ClientError) + Send + Sync>;

/// Pool configuration.
///
/// Built with [`PoolConfig::new`] and adjusted through the chained setters.
#[derive(Clone)]
pub struct PoolConfig {
    addr: String,
    max_open: usize,
    max_idle: usize,
    min_idle: usize,
    idle_timeout: Duration,
    dial_func: DialFunc,
    on_error: ErrorSink,
}

impl std::fmt::Debug for PoolConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PoolConfig")
            .field("addr", &self.addr)
            .field("max_open", &self.max_open)
            .field("max_idle", &self.max_idle)
            .field("min_idle", &self.min_idle)
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}

impl PoolConfig {
    /// Configuration for `addr` with defaults scaled to the CPU count:
    /// unlimited opens, `10 x CPU` idle capacity, `CPU` warm floor, and a
    /// 60 second idle timeout.
    pub fn new(addr: impl Into<String>) -> PoolConfig {
        let cpus = cpu_count();
        PoolConfig {
            addr: addr.into(),
            max_open: 0,
            max_idle: 10 * cpus,
            min_idle: cpus,
            idle_timeout: Duration::from_secs(60),
            dial_func: Arc::new(default_dial),
            on_error: Arc::new(|err: &ClientError| {
                tracing::error!(cause = %err, "pool background error");
            }),
        }
    }

    /// Maximum total connections, idle plus in-use. Zero means unlimited.
    pub fn max_open(mut self, n: usize) -> PoolConfig {
        self.max_open = n;
        self
    }

    /// Capacity of the idle ring.
    pub fn max_idle(mut self, n: usize) -> PoolConfig {
        self.max_idle = n;
        self
    }

    /// Number of idle connections the evictor leaves parked.
    pub fn min_idle(mut self, n: usize) -> PoolConfig {
        self.min_idle = n;
        self
    }

    /// Age past which an idle connection is closed by the evictor.
    pub fn idle_timeout(mut self, timeout: Duration) -> PoolConfig {
        self.idle_timeout = timeout;
        self
    }

    /// Replaces the dial step.
    pub fn dial_func(
        mut self,
        dial: impl Fn(&Context, &str) -> io::Result<TcpStream> + Send + Sync + 'static,
    ) -> PoolConfig {
        self.dial_func = Arc::new(dial);
        self
    }

    /// Replaces the background error sink.
    pub fn on_error(mut self, sink: impl Fn(&ClientError) + Send + Sync + 'static) -> PoolConfig {
        self.on_error = Arc::new(sink);
        self
    }
}

/// Point-in-time pool counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Connections currently open (idle plus in-use).
    pub open: usize,
    /// Connections parked in the idle ring.
    pub idle: usize,
}

#[derive(Debug)]
struct PoolState {
    idles: Vec<Option<Conn>>,
    slots: SlotPool,
    num_open: usize,
    started: bool,
}

#[derive(Debug)]
struct PoolInner {
    state: Mutex<PoolState>,
    evictor_gate: Condvar,
    stop: AtomicBool,
    evictor: Mutex<Option<JoinHandle<()>>>,
    config: PoolConfig,
}

/// Connection pool handle. Clones share the same pool.
#[derive(Clone, Debug)]
pub struct Pool {
    inner: Arc<PoolInner>,
}

impl Pool {
    /// Creates a pool from the provided configuration.
    pub fn new(config: PoolConfig) -> ClientResult<Pool> {
        if config.addr.is_empty() {
            return Err(ClientError::InvalidConfig("addr must not be empty".into()));
        }
        let mut config = config;
        // The warm floor cannot exceed the ring that holds it.
        config.min_idle = config.min_idle.min(config.max_idle);

        let mut idles = Vec::with_capacity(config.max_idle);
        idles.resize_with(config.max_idle, || None);
        let state = PoolState {
            idles,
            slots: SlotPool::new(config.max_idle, config.min_idle, config.idle_timeout),
            num_open: 0,
            started: false,
        };
        Ok(Pool {
            inner: Arc::new(PoolInner {
                state: Mutex::new(state),
                evictor_gate: Condvar::new(),
                stop: AtomicBool::new(false),
                evictor: Mutex::new(None),
                config,
            }),
        })
    }

    /// Acquires a connection: the most recently parked idle entry when one
    /// exists, otherwise a fresh dial.
    pub fn get(&self, ctx: &Context) -> ClientResult<Conn> {
        ctx.checkpoint()?;
        {
            let mut state = self.inner.state.lock();
            if let Some(idx) = state.slots.get() {
                let conn = state.idles[idx].take().expect("idle slot holds a connection");
                return Ok(conn);
            }
            let max_open = self.inner.config.max_open;
            if max_open > 0 && state.num_open >= max_open {
                return Err(ClientError::PoolExhausted);
            }
            // The bump is the admission ticket; the dial happens unlocked
            // because the TCP handshake can take a while.
            state.num_open += 1;
        }
        match self.dial(ctx) {
            Ok(conn) => Ok(conn),
            Err(err) => {
                self.inner.state.lock().num_open -= 1;
                Err(err)
            }
        }
    }

    /// Returns a connection to the idle ring, or closes it when the ring is
    /// full.
    pub fn put(&self, conn: Conn) -> ClientResult<()> {
        let mut conn = conn;
        {
            let mut state = self.inner.state.lock();
            if let Some(idx) = state.slots.put(Instant::now()) {
                state.idles[idx] = Some(conn);
                return Ok(());
            }
            state.num_open -= 1;
        }
        conn.close().map_err(|err| ClientError::Conn {
            source: err,
            can_reuse: false,
        })
    }

    /// Destroys a connection that must not be reused, releasing its open
    /// slot.
    pub fn discard(&self, conn: Conn) -> ClientResult<()> {
        self.inner.state.lock().num_open -= 1;
        let mut conn = conn;
        conn.close().map_err(|err| ClientError::Conn {
            source: err,
            can_reuse: false,
        })
    }

    /// Starts the background evictor, first warming the pool to the idle
    /// floor. May only be called once.
    pub fn start(&self) -> ClientResult<()> {
        {
            let mut state = self.inner.state.lock();
            if state.started {
                return Err(ClientError::PoolStarted);
            }
            state.started = true;
        }
        self.warm_up()?;

        let inner = Arc::clone(&self.inner);
        let handle = std::thread::spawn(move || run_evictor(&inner));
        *self.inner.evictor.lock() = Some(handle);
        Ok(())
    }

    /// Stops the evictor and closes every idle connection. Close errors
    /// aggregate last-wins.
    pub fn close(&self) -> ClientResult<()> {
        self.inner.stop.store(true, Ordering::Release);
        self.inner.evictor_gate.notify_all();
        let handle = self.inner.evictor.lock().take();
        if let Some(handle) = handle {
            let _ = handle.join();
        }

        let mut drained = Vec::new();
        {
            let mut state = self.inner.state.lock();
            while let Some(idx) = state.slots.get() {
                if let Some(conn) = state.idles[idx].take() {
                    state.num_open -= 1;
                    drained.push(conn);
                }
            }
        }

        let mut last_err = None;
        for mut conn in drained {
            if let Err(err) = conn.close() {
                last_err = Some(ClientError::Conn {
                    source: err,
                    can_reuse: false,
                });
            }
        }
        match last_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Current open and idle counts.
    pub fn stats(&self) -> PoolStats {
        let state = self.inner.state.lock();
        PoolStats {
            open: state.num_open,
            idle: state.slots.idle_count(),
        }
    }

    fn dial(&self, ctx: &Context) -> ClientResult<Conn> {
        let stream = (self.inner.config.dial_func)(ctx, &self.inner.config.addr).map_err(|err| {
            ClientError::Conn {
                source: err,
                can_reuse: false,
            }
        })?;
        Conn::new(stream).map_err(|err| ClientError::Conn {
            source: err,
            can_reuse: false,
        })
    }

    /// Dials until the open count reaches the idle floor, parking each
    /// connection. A dial failure aborts the warm-up.
    fn warm_up(&self) -> ClientResult<()> {
        let ctx = Context::background();
        loop {
            {
                let mut state = self.inner.state.lock();
                if state.num_open >= self.inner.config.min_idle {
                    return Ok(());
                }
                state.num_open += 1;
            }
            match self.dial(&ctx) {
                Ok(conn) => {
                    let mut state = self.inner.state.lock();
                    match state.slots.put(Instant::now()) {
                        Some(idx) => state.idles[idx] = Some(conn),
                        None => {
                            state.num_open -= 1;
                            drop(state);
                            let mut conn = conn;
                            let _ = conn.close();
                            return Ok(());
                        }
                    }
                }
                Err(err) => {
                    self.inner.state.lock().num_open -= 1;
                    return Err(err);
                }
            }
        }
    }
}

/// Eviction loop: close one overdue idle entry at a time, then sleep until
/// the next candidate comes due or shutdown is signalled.
fn run_evictor(inner: &PoolInner) {
    let mut state = inner.state.lock();
    while !inner.stop.load(Ordering::Acquire) {
        let now = Instant::now();
        let (victim, next) = state.slots.close_idle(now);
        match victim {
            Some(idx) => {
                let conn = state.idles[idx].take();
                state.num_open -= 1;
                // Close outside the lock so acquirers are never blocked on
                // a socket teardown.
                MutexGuard::unlocked(&mut state, || {
                    if let Some(mut conn) = conn {
                        tracing::debug!("closing idle connection past its timeout");
                        if let Err(err) = conn.close() {
                            (inner.config.on_error)(&ClientError::Conn {
                                source: err,
                                can_reuse: false,
                            });
                        }
                    }
                });
            }
            None => {
                inner.evictor_gate.wait_until(&mut state, next);
            }
        }
    }
}

fn cpu_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Default dial step: plain TCP, bounded by the context deadline.
fn default_dial(ctx: &Context, addr: &str) -> io::Result<TcpStream> {
    let target = addr.to_socket_addrs()?.next().ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing")
    })?;
    match ctx.deadline() {
        Some(deadline) => {
            let now = Instant::now();
            if deadline <= now {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "dial deadline exceeded",
                ));
            }
            TcpStream::connect_timeout(&target, deadline - now)
        }
        None => TcpStream::connect(target),
    }
}
