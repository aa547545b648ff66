//! # Error Taxonomy
//!
//! Purpose: One error type for every failure a beanstalkd exchange can
//! produce, split so callers can tell transport trouble from a rejected
//! command without string matching.
//!
//! ## Design Principles
//! 1. **Transport vs. Protocol**: Socket-level failures are grouped by
//!    `is_connection_error()`; status-level rejections carry the reply.
//! 2. **Sentinels Are Not Errors**: `TIMED_OUT`, peek `NOT_FOUND` and
//!    `NOT_IGNORED` never reach this type; they are typed outcomes upstream.
//! 3. **Full Context**: Command failures keep the command name, status token
//!    and every reply token.

use std::io;

use thiserror::Error;

/// Result alias used across the workspace.
pub type BeanstalkResult<T> = Result<T, BeanstalkError>;

/// Errors surfaced by the beanstalkd client.
#[derive(Debug, Error)]
pub enum BeanstalkError {
    /// Socket failure while connecting, writing or reading.
    #[error("connection error: {0}")]
    Connection(#[source] io::Error),

    /// The server closed the stream before a reply line arrived.
    #[error("connection closed by server")]
    ConnectionClosed,

    /// The stream ended before the declared payload length was read.
    #[error("short read: expected {expected} payload bytes, received {received}")]
    ShortRead { expected: usize, received: usize },

    /// A connect, read or write deadline elapsed.
    #[error("timed out: {0}")]
    Timeout(#[source] io::Error),

    /// Reply status belongs to the command's declared failure set.
    #[error("{command} failed with {status}")]
    CommandFailed {
        command: &'static str,
        status: String,
        response: Vec<String>,
    },

    /// Reply status is outside both declared sets for the command.
    #[error("{command} got unexpected status {status}")]
    Unknown {
        command: &'static str,
        status: String,
        response: Vec<String>,
    },

    /// Every connection slot is checked out.
    #[error("connection pool exhausted")]
    PoolExhausted,

    /// A reservation held by this session is about to expire.
    ///
    /// Returned only by reserve; touch, release or delete the held job.
    #[error("job deadline soon")]
    DeadlineSoon { detail: Vec<String> },

    /// Host/port did not resolve to a socket address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Tube name is empty, too long, or uses characters outside the
    /// daemon's name alphabet.
    #[error("invalid tube name: {0:?}")]
    InvalidTubeName(String),

    /// A success reply whose arguments do not match the declared shape.
    #[error("malformed {command} reply: {line:?}")]
    MalformedReply { command: &'static str, line: String },

    /// A structured payload could not be decoded.
    #[error("decode error: {0}")]
    Decode(#[from] serde_yaml::Error),
}

impl BeanstalkError {
    /// True for every transport-level failure.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            BeanstalkError::Connection(_)
                | BeanstalkError::ConnectionClosed
                | BeanstalkError::ShortRead { .. }
                | BeanstalkError::Timeout(_)
        )
    }

    /// True when the failure may leave unread reply bytes on the session.
    ///
    /// Covers transport failures plus replies that were abandoned partway:
    /// malformed framing and statuses outside the command's vocabulary.
    pub fn breaks_session(&self) -> bool {
        self.is_connection_error()
            || matches!(
                self,
                BeanstalkError::MalformedReply { .. } | BeanstalkError::Unknown { .. }
            )
    }

    /// Status token carried by command/unknown failures.
    pub fn status(&self) -> Option<&str> {
        match self {
            BeanstalkError::CommandFailed { status, .. } | BeanstalkError::Unknown { status, .. } => {
                Some(status)
            }
            _ => None,
        }
    }
}

impl From<io::Error> for BeanstalkError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => BeanstalkError::Timeout(err),
            io::ErrorKind::UnexpectedEof => BeanstalkError::ConnectionClosed,
            _ => BeanstalkError::Connection(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_timeouts_map_to_timeout() {
        let err: BeanstalkError = io::Error::new(io::ErrorKind::WouldBlock, "slow").into();
        assert!(matches!(err, BeanstalkError::Timeout(_)));
        assert!(err.is_connection_error());

        let err: BeanstalkError = io::Error::new(io::ErrorKind::TimedOut, "slow").into();
        assert!(matches!(err, BeanstalkError::Timeout(_)));
    }

    #[test]
    fn other_io_errors_map_to_connection() {
        let err: BeanstalkError = io::Error::new(io::ErrorKind::ConnectionReset, "reset").into();
        assert!(matches!(err, BeanstalkError::Connection(_)));
        assert!(err.is_connection_error());
    }

    #[test]
    fn command_failures_are_not_connection_errors() {
        let err = BeanstalkError::CommandFailed {
            command: "delete",
            status: "NOT_FOUND".to_string(),
            response: vec!["NOT_FOUND".to_string()],
        };
        assert!(!err.is_connection_error());
        assert!(!err.breaks_session());
        assert_eq!(err.status(), Some("NOT_FOUND"));
        assert_eq!(err.to_string(), "delete failed with NOT_FOUND");
    }

    #[test]
    fn abandoned_replies_break_the_session() {
        let malformed = BeanstalkError::MalformedReply {
            command: "reserve",
            line: "XX".to_string(),
        };
        assert!(!malformed.is_connection_error());
        assert!(malformed.breaks_session());

        let unknown = BeanstalkError::Unknown {
            command: "delete",
            status: "OUT_OF_MEMORY".to_string(),
            response: vec!["OUT_OF_MEMORY".to_string()],
        };
        assert!(unknown.breaks_session());
        assert!(BeanstalkError::ConnectionClosed.breaks_session());
        assert!(!BeanstalkError::PoolExhausted.breaks_session());
    }
}
