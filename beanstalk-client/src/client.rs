//! # Synchronous Client API
//!
//! Purpose: Expose a compact, blocking API for the beanstalkd work queue.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `Beanstalk` hides pooling and protocol details.
//! 2. **Typed Absence**: "no job" is `Ok(None)`, never an error and never an
//!    unchecked sentinel.
//! 3. **Fail Fast**: Declared failures and unknown statuses surface
//!    immediately; nothing is retried.
//! 4. **Borrow-Friendly API**: Bodies go in as `&[u8]`.

use std::time::Duration;

use beanstalk_common::{
    failure_error, parse_number, validate_tube_name, BeanstalkError, BeanstalkResult, Command,
    JobId, Priority, Reply, Status, DEFAULT_PRIORITY, DEFAULT_TTR,
};

use crate::config::ClientConfig;
use crate::engine::{RequestEngine, Response};
use crate::job::Job;
use crate::pool::{ConnectionPool, PoolStatus};
use crate::stats::{self, JobStats, ServerStats, TubeStats};

/// Synchronous beanstalkd client with connection pooling.
///
/// Each call checks out one connection, runs one exchange and returns the
/// connection. Cloning shares the pool.
#[derive(Clone)]
pub struct Beanstalk {
    engine: RequestEngine,
}

impl Beanstalk {
    /// Creates a client for `host:port` with default settings.
    ///
    /// No socket is opened until the first request.
    pub fn connect(host: impl Into<String>, port: u16) -> Self {
        let config = ClientConfig {
            host: host.into(),
            port,
            ..ClientConfig::default()
        };
        Self::with_config(config)
    }

    /// Creates a client with a custom configuration.
    pub fn with_config(config: ClientConfig) -> Self {
        Self::with_pool(ConnectionPool::new(config.pool_config()))
    }

    /// Creates a client over an existing pool.
    pub fn with_pool(pool: ConnectionPool) -> Self {
        Beanstalk {
            engine: RequestEngine::new(pool),
        }
    }

    /// Pool bookkeeping snapshot.
    pub fn pool_status(&self) -> PoolStatus {
        self.engine.pool().status()
    }

    /// Puts a job into the used tube and returns its id.
    ///
    /// `delay` and `ttr` are sent in whole seconds, rounded up.
    pub fn put(
        &self,
        body: &[u8],
        priority: Priority,
        delay: Duration,
        ttr: Duration,
    ) -> BeanstalkResult<JobId> {
        let command = Command::Put {
            priority,
            delay: whole_seconds(delay),
            ttr: whole_seconds(ttr),
            body,
        };
        self.request_number(&command)
    }

    /// Puts a job with default priority, no delay and the default TTR.
    pub fn put_default(&self, body: &[u8]) -> BeanstalkResult<JobId> {
        self.put(body, DEFAULT_PRIORITY, Duration::ZERO, DEFAULT_TTR)
    }

    /// Reserves the next job from the watched tubes, blocking until one is ready.
    ///
    /// Fails with `DeadlineSoon` when a job already reserved by this session
    /// is about to exceed its TTR.
    pub fn reserve(&self) -> BeanstalkResult<Option<Job<'_>>> {
        self.request_reserve(&Command::Reserve)
    }

    /// Reserves with a server-side timeout; `Ok(None)` when it elapses.
    ///
    /// Sub-second timeouts round up to the next whole second.
    pub fn reserve_with_timeout(&self, timeout: Duration) -> BeanstalkResult<Option<Job<'_>>> {
        self.request_reserve(&Command::ReserveWithTimeout(whole_seconds(timeout)))
    }

    /// Kicks at most `bound` buried or delayed jobs; returns how many moved.
    pub fn kick(&self, bound: u64) -> BeanstalkResult<u64> {
        self.request_number(&Command::Kick(bound))
    }

    /// Kicks one buried or delayed job.
    pub fn kick_job(&self, id: JobId) -> BeanstalkResult<()> {
        self.request_unit(&Command::KickJob(id))
    }

    /// Peeks at a job by id.
    pub fn peek(&self, id: JobId) -> BeanstalkResult<Option<Job<'_>>> {
        self.request_peek(&Command::Peek(id))
    }

    /// Peeks at the next ready job in the used tube.
    pub fn peek_ready(&self) -> BeanstalkResult<Option<Job<'_>>> {
        self.request_peek(&Command::PeekReady)
    }

    /// Peeks at the delayed job with the shortest delay left.
    pub fn peek_delayed(&self) -> BeanstalkResult<Option<Job<'_>>> {
        self.request_peek(&Command::PeekDelayed)
    }

    /// Peeks at the next buried job.
    pub fn peek_buried(&self) -> BeanstalkResult<Option<Job<'_>>> {
        self.request_peek(&Command::PeekBuried)
    }

    /// Deletes a job by id.
    pub fn delete(&self, id: JobId) -> BeanstalkResult<()> {
        self.request_unit(&Command::Delete(id))
    }

    /// Releases a reserved job back to the ready queue.
    ///
    /// The daemon may bury the job instead when it is out of memory; both
    /// count as success.
    pub fn release(&self, id: JobId, priority: Priority, delay: Duration) -> BeanstalkResult<()> {
        self.request_unit(&Command::Release {
            id,
            priority,
            delay: whole_seconds(delay),
        })
    }

    /// Buries a reserved job.
    pub fn bury(&self, id: JobId, priority: Priority) -> BeanstalkResult<()> {
        self.request_unit(&Command::Bury { id, priority })
    }

    /// Extends the TTR of a reserved job.
    pub fn touch(&self, id: JobId) -> BeanstalkResult<()> {
        self.request_unit(&Command::Touch(id))
    }

    /// Statistics for one job; `Ok(None)` when the job does not exist.
    pub fn stats_job(&self, id: JobId) -> BeanstalkResult<Option<JobStats>> {
        self.request_data_optional(&Command::StatsJob(id))?
            .map(|payload| stats::decode(&payload))
            .transpose()
    }

    /// Statistics for one tube; `Ok(None)` when the tube does not exist.
    pub fn stats_tube(&self, name: &str) -> BeanstalkResult<Option<TubeStats>> {
        validate_tube_name(name)?;
        self.request_data_optional(&Command::StatsTube(name))?
            .map(|payload| stats::decode(&payload))
            .transpose()
    }

    /// Server-wide statistics.
    pub fn stats(&self) -> BeanstalkResult<ServerStats> {
        stats::decode(&self.request_data(&Command::Stats)?)
    }

    /// Every tube that currently exists.
    pub fn tubes(&self) -> BeanstalkResult<Vec<String>> {
        stats::decode_names(&self.request_data(&Command::ListTubes)?)
    }

    /// Tubes watched by the session serving this call.
    pub fn watching(&self) -> BeanstalkResult<Vec<String>> {
        stats::decode_names(&self.request_data(&Command::ListTubesWatched)?)
    }

    /// Tube used by the session serving this call.
    pub fn using(&self) -> BeanstalkResult<String> {
        self.request_word(&Command::ListTubeUsed)
    }

    /// Selects the tube subsequent puts go to; returns its name.
    pub fn use_tube(&self, name: &str) -> BeanstalkResult<String> {
        validate_tube_name(name)?;
        self.request_word(&Command::Use(name))
    }

    /// Adds a tube to the watch list; returns the number of watched tubes.
    pub fn watch(&self, name: &str) -> BeanstalkResult<u64> {
        validate_tube_name(name)?;
        self.request_number(&Command::Watch(name))
    }

    /// Removes a tube from the watch list; returns the number still watched.
    ///
    /// The daemon refuses to ignore the last watched tube (`NOT_IGNORED`);
    /// that refusal is reported as `Ok(1)`, indistinguishable from a
    /// successful ignore that leaves one tube watched.
    pub fn ignore(&self, name: &str) -> BeanstalkResult<u64> {
        validate_tube_name(name)?;
        let command = Command::Ignore(name);
        match self.engine.request(&command)?.reply {
            Reply::Success { args, .. } => parse_number(command.name(), args.first()),
            Reply::Failure {
                status: Status::NotIgnored,
                ..
            } => Ok(1),
            Reply::Failure { status, args } => Err(failure_error(command.name(), status, args)),
        }
    }

    /// Pauses new reservations from a tube for `delay`.
    pub fn pause_tube(&self, name: &str, delay: Duration) -> BeanstalkResult<()> {
        validate_tube_name(name)?;
        self.request_unit(&Command::PauseTube {
            tube: name,
            delay: whole_seconds(delay),
        })
    }

    fn request_unit(&self, command: &Command<'_>) -> BeanstalkResult<()> {
        self.engine.request(command)?.reply.into_args(command.name())?;
        Ok(())
    }

    fn request_word(&self, command: &Command<'_>) -> BeanstalkResult<String> {
        let args = self.engine.request(command)?.reply.into_args(command.name())?;
        args.into_iter()
            .next()
            .ok_or_else(|| BeanstalkError::MalformedReply {
                command: command.name(),
                line: String::new(),
            })
    }

    fn request_number(&self, command: &Command<'_>) -> BeanstalkResult<u64> {
        let args = self.engine.request(command)?.reply.into_args(command.name())?;
        parse_number(command.name(), args.first())
    }

    fn request_data(&self, command: &Command<'_>) -> BeanstalkResult<Vec<u8>> {
        let response = self.engine.request(command)?;
        response.reply.into_args(command.name())?;
        Ok(response.body.unwrap_or_default())
    }

    fn request_data_optional(&self, command: &Command<'_>) -> BeanstalkResult<Option<Vec<u8>>> {
        let response = self.engine.request(command)?;
        match response.reply {
            Reply::Success { .. } => Ok(Some(response.body.unwrap_or_default())),
            Reply::Failure {
                status: Status::NotFound,
                ..
            } => Ok(None),
            Reply::Failure { status, args } => Err(failure_error(command.name(), status, args)),
        }
    }

    fn request_reserve(&self, command: &Command<'_>) -> BeanstalkResult<Option<Job<'_>>> {
        let Response { reply, body } = self.engine.request(command)?;
        match reply {
            Reply::Success { args, .. } => {
                let id = parse_number(command.name(), args.first())?;
                Ok(Some(Job::new(self, id, body.unwrap_or_default(), true)))
            }
            Reply::Failure {
                status: Status::TimedOut,
                ..
            } => Ok(None),
            Reply::Failure {
                status: Status::DeadlineSoon,
                args,
            } => {
                let mut detail = vec![Status::DeadlineSoon.as_str().to_string()];
                detail.extend(args);
                Err(BeanstalkError::DeadlineSoon { detail })
            }
            Reply::Failure { status, args } => Err(failure_error(command.name(), status, args)),
        }
    }

    fn request_peek(&self, command: &Command<'_>) -> BeanstalkResult<Option<Job<'_>>> {
        let Response { reply, body } = self.engine.request(command)?;
        match reply {
            Reply::Success { args, .. } => {
                let id = parse_number(command.name(), args.first())?;
                Ok(Some(Job::new(self, id, body.unwrap_or_default(), false)))
            }
            Reply::Failure {
                status: Status::NotFound,
                ..
            } => Ok(None),
            Reply::Failure { status, args } => Err(failure_error(command.name(), status, args)),
        }
    }
}

// Whole seconds on the wire; fractions round up.
fn whole_seconds(duration: Duration) -> u64 {
    let secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_round_up_to_whole_seconds() {
        assert_eq!(whole_seconds(Duration::ZERO), 0);
        assert_eq!(whole_seconds(Duration::from_millis(500)), 1);
        assert_eq!(whole_seconds(Duration::from_secs(2)), 2);
        assert_eq!(whole_seconds(Duration::from_millis(2001)), 3);
        assert_eq!(whole_seconds(Duration::MAX), u64::MAX);
    }
}
