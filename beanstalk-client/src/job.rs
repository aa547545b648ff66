//! # Job Handle
//!
//! A job returned by reserve or peek. The handle borrows the client that
//! produced it, so the pool is guaranteed to outlive every job that can
//! still call back into it.
//!
//! ## State Machine
//!
//! ```text
//!             ┌── delete() ───▶ Deleted
//! Reserved ───┼── release() ──▶ Released
//!   │  ▲      └── bury() ─────▶ Buried
//!   └──┘ touch()
//! ```
//!
//! Every transition requires `reserved` and clears it once the daemon
//! acknowledges. With `reserved` false the calls are no-ops and send
//! nothing. `kick` and `stats` work in any state.
//!
//! ## Sessions
//!
//! The daemon ties a reservation to the session that made it. Each call
//! checks out whatever pooled connection is free, so with
//! `max_connections > 1` and concurrent callers a `delete`, `release`,
//! `bury` or `touch` can go out on a different session and come back
//! `NOT_FOUND`. Workers that reserve should use a client whose pool holds a
//! single connection, or one client per worker thread.

use std::fmt;
use std::time::Duration;

use beanstalk_common::{BeanstalkResult, JobId, Priority, DEFAULT_PRIORITY};

use crate::client::Beanstalk;
use crate::stats::JobStats;

/// A dequeued unit of work.
pub struct Job<'c> {
    client: &'c Beanstalk,
    id: JobId,
    body: Vec<u8>,
    reserved: bool,
}

impl<'c> Job<'c> {
    pub(crate) fn new(client: &'c Beanstalk, id: JobId, body: Vec<u8>, reserved: bool) -> Self {
        Job {
            client,
            id,
            body,
            reserved,
        }
    }

    /// Server-assigned id.
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Job payload.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consumes the handle and returns the payload.
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// True while this handle holds the reservation.
    ///
    /// Peeked jobs are never reserved.
    pub fn is_reserved(&self) -> bool {
        self.reserved
    }

    /// Deletes the job.
    pub fn delete(&mut self) -> BeanstalkResult<()> {
        if !self.reserved {
            return Ok(());
        }
        self.client.delete(self.id)?;
        self.reserved = false;
        Ok(())
    }

    /// Releases the job back to the ready queue.
    ///
    /// Without an explicit priority the job's current priority is read
    /// from the daemon first.
    pub fn release(&mut self, priority: Option<Priority>, delay: Duration) -> BeanstalkResult<()> {
        if !self.reserved {
            return Ok(());
        }
        let priority = self.resolve_priority(priority)?;
        self.client.release(self.id, priority, delay)?;
        self.reserved = false;
        Ok(())
    }

    /// Buries the job, keeping it out of the ready queue until kicked.
    pub fn bury(&mut self, priority: Option<Priority>) -> BeanstalkResult<()> {
        if !self.reserved {
            return Ok(());
        }
        let priority = self.resolve_priority(priority)?;
        self.client.bury(self.id, priority)?;
        self.reserved = false;
        Ok(())
    }

    /// Moves the job from buried or delayed to ready.
    pub fn kick(&self) -> BeanstalkResult<()> {
        self.client.kick_job(self.id)
    }

    /// Asks for more time before the reservation expires.
    pub fn touch(&self) -> BeanstalkResult<()> {
        if !self.reserved {
            return Ok(());
        }
        self.client.touch(self.id)
    }

    /// Current statistics; `Ok(None)` once the job no longer exists.
    pub fn stats(&self) -> BeanstalkResult<Option<JobStats>> {
        self.client.stats_job(self.id)
    }

    fn resolve_priority(&self, priority: Option<Priority>) -> BeanstalkResult<Priority> {
        match priority {
            Some(priority) => Ok(priority),
            None => Ok(self
                .stats()?
                .map(|stats| stats.pri)
                .unwrap_or(DEFAULT_PRIORITY)),
        }
    }
}

impl fmt::Debug for Job<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("body_len", &self.body.len())
            .field("reserved", &self.reserved)
            .finish()
    }
}
