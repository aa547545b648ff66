//! # Request Engine
//!
//! Purpose: Run one request/response exchange for any command: check out a
//! connection, write the request, read and classify the status line, read a
//! declared payload, and return the connection to the pool.
//!
//! ## Design Principles
//! 1. **One Cycle For Everything**: Every operation goes through `request`.
//! 2. **Tagged Outcome**: Callers receive `Reply::Success`/`Reply::Failure`
//!    and map it through their own vocabulary; unknown statuses are errors.
//! 3. **No Leaks**: The pooled guard releases on every exit path. A session
//!    that failed at the transport level, or whose reply was abandoned
//!    partway, is disconnected before release so the next caller starts
//!    from a clean stream.

use tracing::trace;

use beanstalk_common::{
    parse_number, BeanstalkError, BeanstalkResult, Command, Reply, ReplyBody, StatusLine,
};

use crate::connection::Connection;
use crate::pool::ConnectionPool;

/// Classified reply plus any payload that followed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub reply: Reply,
    pub body: Option<Vec<u8>>,
}

/// Executes commands over pooled connections.
#[derive(Clone)]
pub struct RequestEngine {
    pool: ConnectionPool,
}

impl RequestEngine {
    pub fn new(pool: ConnectionPool) -> Self {
        RequestEngine { pool }
    }

    /// Underlying pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Runs one full exchange for `command`.
    pub fn request(&self, command: &Command<'_>) -> BeanstalkResult<Response> {
        let mut conn = self.pool.pick_connection()?;
        let result = exchange(&mut conn, command);
        if let Err(err) = &result {
            if err.breaks_session() {
                trace!(connection = conn.id(), error = %err, "dropping session");
                conn.disconnect();
            }
        }
        result
    }
}

fn exchange(conn: &mut Connection, command: &Command<'_>) -> BeanstalkResult<Response> {
    let name = command.name();
    trace!(command = name, connection = conn.id(), "sending command");
    conn.send(command)?;

    let line = conn.read_line()?;
    let status = StatusLine::parse(line).ok_or_else(|| BeanstalkError::MalformedReply {
        command: name,
        line: String::from_utf8_lossy(line).into_owned(),
    })?;
    trace!(command = name, status = %status.status, "received reply");

    let reply = Reply::classify(command, status)?;
    let body = match (&reply, command.expectation().body) {
        (Reply::Success { args, .. }, ReplyBody::Job) => {
            let size = body_size(name, args.get(1))?;
            Some(conn.read_body(name, size)?)
        }
        (Reply::Success { args, .. }, ReplyBody::Data) => {
            let size = body_size(name, args.first())?;
            Some(conn.read_body(name, size)?)
        }
        _ => None,
    };

    Ok(Response { reply, body })
}

fn body_size(command: &'static str, arg: Option<&String>) -> BeanstalkResult<usize> {
    let size = parse_number(command, arg)?;
    usize::try_from(size).map_err(|_| BeanstalkError::MalformedReply {
        command,
        line: size.to_string(),
    })
}
