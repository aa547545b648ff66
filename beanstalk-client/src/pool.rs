//! # Connection Pool
//!
//! Purpose: Bound the number of beanstalkd sessions a process opens and hand
//! each caller exclusive use of one session per request.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Idle connections are reused, most recently
//!    released first, so warm sockets are preferred.
//! 2. **Single Lock**: Checkout, release and fork reset all mutate state under
//!    one mutex; no caller can observe a connection another caller holds.
//! 3. **Fail Fast**: At capacity with nothing idle, checkout errors at once.
//! 4. **Fork Safety**: The pool is bound to a process identity. A changed
//!    identity resets the pool exactly once and starts a new generation;
//!    connections from older generations are discarded on release.
//!
//! ## State
//!
//! ```text
//! PoolState
//!   ├── available: Vec<Connection>      (LIFO stack of idle sessions)
//!   ├── in_use:    HashSet<ConnectionId>
//!   ├── created:   available.len() + in_use.len()  (<= max_connections)
//!   ├── owner:     process identity the state belongs to
//!   └── generation: bumped on every reset
//! ```

use std::collections::HashSet;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};
use tracing::{debug, warn};

use beanstalk_common::{BeanstalkError, BeanstalkResult};

use crate::connection::{Connection, ConnectionId};
use crate::identity::{OsProcess, ProcessIdentity};

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Daemon host name or address.
    pub host: String,
    /// Daemon port.
    pub port: u16,
    /// Maximum connections (idle + in-use).
    pub max_connections: usize,
    /// Optional TCP connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Optional TCP read timeout.
    pub read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub write_timeout: Option<Duration>,
}

/// Point-in-time view of the pool bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    pub available: usize,
    pub in_use: usize,
    pub created: usize,
    pub max_connections: usize,
    pub generation: u64,
}

struct PoolState {
    available: Vec<Connection>,
    in_use: HashSet<ConnectionId>,
    created: usize,
    owner: u32,
    generation: u64,
    next_id: ConnectionId,
}

struct PoolInner {
    config: Arc<PoolConfig>,
    identity: Arc<dyn ProcessIdentity>,
    state: Mutex<PoolState>,
}

/// Connection pool handle.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Creates a pool bound to the current OS process.
    pub fn new(config: PoolConfig) -> Self {
        Self::with_identity(config, Arc::new(OsProcess))
    }

    /// Creates a pool bound to the identity reported by `identity`.
    pub fn with_identity(mut config: PoolConfig, identity: Arc<dyn ProcessIdentity>) -> Self {
        config.max_connections = config.max_connections.max(1);
        let state = PoolState {
            available: Vec::with_capacity(config.max_connections),
            in_use: HashSet::with_capacity(config.max_connections),
            created: 0,
            owner: identity.current(),
            generation: 0,
            next_id: 0,
        };
        ConnectionPool {
            inner: Arc::new(PoolInner {
                config: Arc::new(config),
                identity,
                state: Mutex::new(state),
            }),
        }
    }

    /// Pool configuration.
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    /// Checks out a connection for exclusive use.
    ///
    /// Prefers the most recently released idle connection, then creates a
    /// new one if under capacity. The returned guard releases on drop.
    pub fn pick_connection(&self) -> BeanstalkResult<PooledConnection> {
        let mut state = self.lock_state();

        let conn = match state.available.pop() {
            Some(conn) => conn,
            None => {
                if state.created >= self.inner.config.max_connections {
                    return Err(BeanstalkError::PoolExhausted);
                }
                state.created += 1;
                state.next_id += 1;
                debug!(
                    connection = state.next_id,
                    created = state.created,
                    max = self.inner.config.max_connections,
                    "pool created connection"
                );
                Connection::new(state.next_id, state.generation, self.inner.config.clone())
            }
        };
        state.in_use.insert(conn.id());

        Ok(PooledConnection {
            pool: self.clone(),
            conn: Some(conn),
        })
    }

    /// Returns a connection to the idle stack.
    ///
    /// Connections from a discarded generation are dropped without a quit
    /// notice and without touching the current bookkeeping.
    fn release(&self, conn: Connection) {
        let mut state = self.lock_state();

        if conn.generation() != state.generation || !state.in_use.remove(&conn.id()) {
            warn!(
                connection = conn.id(),
                generation = conn.generation(),
                current = state.generation,
                "dropping connection from a discarded pool generation"
            );
            return;
        }
        state.available.push(conn);
    }

    /// Snapshot of the pool bookkeeping.
    pub fn status(&self) -> PoolStatus {
        let state = self.inner.state.lock();
        PoolStatus {
            available: state.available.len(),
            in_use: state.in_use.len(),
            created: state.created,
            max_connections: self.inner.config.max_connections,
            generation: state.generation,
        }
    }

    /// Disconnects every idle connection and forgets it.
    ///
    /// Checked-out connections are unaffected and return normally.
    pub fn disconnect_idle(&self) {
        let idle = {
            let mut state = self.inner.state.lock();
            let idle = std::mem::take(&mut state.available);
            state.created -= idle.len();
            idle
        };
        disconnect_all(idle);
    }

    // Locks the state after the owner check; connections evicted by a reset
    // are disconnected with the lock released.
    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        let mut state = self.inner.state.lock();
        let evicted = self.check_owner(&mut state);
        if evicted.is_empty() {
            return state;
        }
        drop(state);
        disconnect_all(evicted);
        self.inner.state.lock()
    }

    // Runs under the state lock, so concurrent first callers after a fork
    // serialize here and only the first one performs the reset.
    fn check_owner(&self, state: &mut PoolState) -> Vec<Connection> {
        let current = self.inner.identity.current();
        if state.owner == current {
            return Vec::new();
        }

        warn!(
            previous = state.owner,
            current,
            generation = state.generation + 1,
            "process identity changed, resetting connection pool"
        );
        let evicted = std::mem::take(&mut state.available);
        // Checked-out connections are owned by their callers; forgetting
        // their ids makes release discard them.
        state.in_use.clear();
        state.created = 0;
        state.owner = current;
        state.generation += 1;
        evicted
    }
}

fn disconnect_all(conns: Vec<Connection>) {
    for mut conn in conns {
        conn.disconnect();
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        let state = self.state.get_mut();
        // A child that never touched the pool must not close its parent's
        // sessions.
        if state.owner != self.identity.current() {
            return;
        }
        for conn in state.available.iter_mut() {
            conn.disconnect();
        }
    }
}

/// RAII guard returning its connection to the pool on drop.
pub struct PooledConnection {
    pool: ConnectionPool,
    conn: Option<Connection>,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        self.conn.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.conn.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.release(conn);
        }
    }
}
