//! # Client Errors
//!
//! Purpose: Classify every failure the client can surface, and carry the
//! reuse bit that decides whether a connection may go back to the pool.
//!
//! ## Design Principles
//! 1. **One Flat Enum**: Callers match a single type for every failure kind.
//! 2. **Explicit Reuse Bit**: Connection-class errors state at the point of
//!    construction whether the wire is still aligned to a message boundary.
//! 3. **Server Errors Are Data**: A `-` reply is an application-level error
//!    and never poisons the connection.

use std::fmt;
use std::io;

/// Result type for the client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the client.
#[derive(Debug)]
pub enum ClientError {
    /// Network or IO failure while reading or writing.
    ///
    /// `can_reuse` is true only when the wire position is known to still be
    /// aligned to a message boundary.
    Conn { source: io::Error, can_reuse: bool },
    /// The ambient context was cancelled or its deadline expired.
    ///
    /// Reusable when the trip happened before any IO began; fatal when a
    /// deadline struck mid-operation.
    Cancelled { can_reuse: bool },
    /// Malformed bytes from the peer. Always fatal to the connection.
    Frame(String),
    /// Error reply decoded from the server. Never fatal.
    Server(String),
    /// A typed response sink rejected the decoded shape.
    UnexpectedResponse(String),
    /// Pool is at its open ceiling and no idle connection is available.
    PoolExhausted,
    /// The pool evictor was already started.
    PoolStarted,
    /// Pool configuration rejected at construction.
    InvalidConfig(String),
    /// `EXEC` returned a null array: the transaction was aborted server-side.
    AbortedTransaction,
}

impl ClientError {
    /// Returns whether the connection that produced this error is still
    /// usable for the next operation.
    ///
    /// Errors that never touch the wire (server replies, response-shape
    /// mismatches, pool bookkeeping) leave the connection aligned, so they
    /// report true.
    pub fn can_reuse(&self) -> bool {
        match self {
            ClientError::Conn { can_reuse, .. } => *can_reuse,
            ClientError::Cancelled { can_reuse } => *can_reuse,
            ClientError::Frame(_) => false,
            _ => true,
        }
    }

    /// Returns true for connection-class errors (transport, cancellation,
    /// framing). The pipeline aborts its drain on these; everything else is
    /// recorded and the drain continues to keep the wire aligned.
    pub fn is_conn_error(&self) -> bool {
        matches!(
            self,
            ClientError::Conn { .. } | ClientError::Cancelled { .. } | ClientError::Frame(_)
        )
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Conn { source, .. } => write!(f, "conn error: {}", source),
            ClientError::Cancelled { .. } => write!(f, "context cancelled or deadline exceeded"),
            ClientError::Frame(msg) => write!(f, "frame error: {}", msg),
            ClientError::Server(msg) => write!(f, "server error: {}", msg),
            ClientError::UnexpectedResponse(msg) => write!(f, "unexpected response: {}", msg),
            ClientError::PoolExhausted => write!(f, "cannot open new conn due to max open limit"),
            ClientError::PoolStarted => write!(f, "pool has already started"),
            ClientError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
            ClientError::AbortedTransaction => write!(f, "transaction aborted by server"),
        }
    }
}

impl std::error::Error for ClientError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reuse_bit_follows_classification() {
        let fatal = ClientError::Conn {
            source: io::Error::new(io::ErrorKind::BrokenPipe, "pipe"),
            can_reuse: false,
        };
        assert!(!fatal.can_reuse());
        assert!(fatal.is_conn_error());

        assert!(ClientError::Cancelled { can_reuse: true }.can_reuse());
        assert!(!ClientError::Frame("bad tag".into()).can_reuse());
        assert!(ClientError::Server("ERR oops".into()).can_reuse());
        assert!(ClientError::UnexpectedResponse("expected string".into()).can_reuse());
    }

    #[test]
    fn drain_abort_predicate_covers_wire_errors_only() {
        assert!(ClientError::Frame("short read".into()).is_conn_error());
        assert!(ClientError::Cancelled { can_reuse: false }.is_conn_error());
        assert!(!ClientError::Server("ERR".into()).is_conn_error());
        assert!(!ClientError::AbortedTransaction.is_conn_error());
        assert!(!ClientError::PoolExhausted.is_conn_error());
    }
}
