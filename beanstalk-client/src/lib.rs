//! # Beanstalk Sync Client
//!
//! Purpose: Provide a lightweight, synchronous client for the beanstalkd
//! work queue with connection pooling that stays correct across forks.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Reuse TCP sessions to avoid repeated connects.
//! 2. **Protocol Clarity**: Every command is classified against its declared
//!    success and failure statuses.
//! 3. **Typed Outcomes**: Absent jobs are `Option`, failures are `Result`.
//! 4. **Minimal Allocation**: Connections reuse their framing buffers.

mod client;
mod config;
mod connection;
mod engine;
mod identity;
mod job;
mod pool;
mod stats;

pub use beanstalk_common::{
    BeanstalkError, BeanstalkResult, JobId, Priority, DEFAULT_PORT, DEFAULT_PRIORITY, DEFAULT_TTR,
};
pub use client::Beanstalk;
pub use config::{ClientConfig, DEFAULT_MAX_CONNECTIONS};
pub use connection::{Connection, ConnectionId};
pub use engine::{RequestEngine, Response};
pub use identity::{OsProcess, ProcessIdentity};
pub use job::Job;
pub use pool::{ConnectionPool, PoolConfig, PoolStatus, PooledConnection};
pub use stats::{JobState, JobStats, ServerStats, TubeStats};
