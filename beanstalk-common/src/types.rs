//! # Queue Types and Defaults
//!
//! Scalar types shared by the codec and the client, plus the protocol
//! defaults the daemon documents.

use std::time::Duration;

/// Server-assigned job identifier.
pub type JobId = u64;

/// Job priority; lower values are served first.
pub type Priority = u32;

/// Default priority (`2^31`), the midpoint of the urgent/non-urgent range.
pub const DEFAULT_PRIORITY: Priority = 1 << 31;

/// Default time-to-run for new jobs.
pub const DEFAULT_TTR: Duration = Duration::from_secs(120);

/// Default daemon port.
pub const DEFAULT_PORT: u16 = 11300;

/// Default daemon host.
pub const DEFAULT_HOST: &str = "localhost";

/// Longest tube name the daemon accepts.
pub const MAX_TUBE_NAME_LEN: usize = 200;
