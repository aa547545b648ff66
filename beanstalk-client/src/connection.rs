//! # Connection
//!
//! Purpose: Own one TCP session to the daemon, established lazily on first
//! use, with reusable buffers for framing requests and reading replies.
//!
//! ## Design Principles
//! 1. **Lazy Connect**: Constructing a `Connection` performs no I/O; the
//!    first write or read opens the socket.
//! 2. **Quiet Teardown**: `disconnect` is best-effort and never fails.
//! 3. **Buffer Reuse**: Line and write buffers live on the connection.
//! 4. **Per-Phase Timeouts**: Connect, read and write deadlines come from
//!    the pool configuration.

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::Arc;

use tracing::debug;

use beanstalk_common::{BeanstalkError, BeanstalkResult, Command, CRLF};

use crate::pool::PoolConfig;

// Upper bound on the up-front body allocation; larger bodies grow as read.
const BODY_PREALLOC_LIMIT: usize = 64 * 1024;

/// Pool-assigned identifier, unique within one pool.
pub type ConnectionId = u64;

/// Single beanstalkd session.
pub struct Connection {
    id: ConnectionId,
    generation: u64,
    config: Arc<PoolConfig>,
    // Buffered reader owns the socket; writes go through `get_mut`.
    reader: Option<BufReader<TcpStream>>,
    line_buf: Vec<u8>,
    write_buf: Vec<u8>,
}

impl Connection {
    pub(crate) fn new(id: ConnectionId, generation: u64, config: Arc<PoolConfig>) -> Self {
        Connection {
            id,
            generation,
            config,
            reader: None,
            line_buf: Vec::with_capacity(128),
            write_buf: Vec::with_capacity(256),
        }
    }

    /// Pool-assigned identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Pool generation this connection was created in.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True once a socket is open.
    pub fn is_connected(&self) -> bool {
        self.reader.is_some()
    }

    /// Opens the socket if it is not already open.
    pub fn connect(&mut self) -> BeanstalkResult<()> {
        if self.reader.is_some() {
            return Ok(());
        }
        let stream = connect_stream(&self.config)?;
        debug!(
            connection = self.id,
            host = %self.config.host,
            port = self.config.port,
            "connected to beanstalkd"
        );
        self.reader = Some(BufReader::new(stream));
        Ok(())
    }

    /// Sends `quit` and closes the socket, swallowing every error.
    pub fn disconnect(&mut self) {
        let Some(mut reader) = self.reader.take() else {
            return;
        };
        self.write_buf.clear();
        Command::Quit.encode(&mut self.write_buf);
        if let Err(err) = reader.get_mut().write_all(&self.write_buf) {
            debug!(connection = self.id, error = %err, "quit notice not delivered");
        }
        // Dropping the reader closes the socket.
        drop(reader);
        debug!(connection = self.id, "disconnected");
    }

    /// Drops the current socket and opens a fresh one.
    pub fn reconnect(&mut self) -> BeanstalkResult<()> {
        self.disconnect();
        self.connect()
    }

    /// Write side of the session, connecting first if needed.
    pub fn writer(&mut self) -> BeanstalkResult<&mut TcpStream> {
        Ok(self.reader()?.get_mut())
    }

    /// Line-buffered read side of the session, connecting first if needed.
    pub fn reader(&mut self) -> BeanstalkResult<&mut BufReader<TcpStream>> {
        self.connect()?;
        self.reader.as_mut().ok_or(BeanstalkError::ConnectionClosed)
    }

    /// Encodes and writes one full request, body included.
    pub fn send(&mut self, command: &Command<'_>) -> BeanstalkResult<()> {
        self.connect()?;
        self.write_buf.clear();
        command.encode(&mut self.write_buf);

        let stream = match self.reader.as_mut() {
            Some(reader) => reader.get_mut(),
            None => return Err(BeanstalkError::ConnectionClosed),
        };
        stream.write_all(&self.write_buf)?;
        stream.flush()?;
        Ok(())
    }

    /// Reads one CRLF-terminated line, returning it without the terminator.
    ///
    /// An empty read means the server closed the session.
    pub fn read_line(&mut self) -> BeanstalkResult<&[u8]> {
        self.line_buf.clear();
        let reader = self.reader.as_mut().ok_or(BeanstalkError::ConnectionClosed)?;
        let bytes = reader.read_until(b'\n', &mut self.line_buf)?;
        if bytes == 0 {
            return Err(BeanstalkError::ConnectionClosed);
        }
        let mut end = self.line_buf.len();
        if self.line_buf.ends_with(b"\n") {
            end -= 1;
            if self.line_buf[..end].ends_with(b"\r") {
                end -= 1;
            }
        }
        Ok(&self.line_buf[..end])
    }

    /// Reads exactly `size` payload bytes plus the trailing CRLF.
    pub fn read_body(&mut self, command: &'static str, size: usize) -> BeanstalkResult<Vec<u8>> {
        let reader = self.reader.as_mut().ok_or(BeanstalkError::ConnectionClosed)?;

        let mut data = Vec::with_capacity(size.min(BODY_PREALLOC_LIMIT));
        reader.by_ref().take(size as u64).read_to_end(&mut data)?;
        if data.len() < size {
            return Err(BeanstalkError::ShortRead {
                expected: size,
                received: data.len(),
            });
        }

        let mut crlf = [0u8; 2];
        reader.read_exact(&mut crlf)?;
        if crlf != CRLF {
            return Err(BeanstalkError::MalformedReply {
                command,
                line: String::from_utf8_lossy(&crlf).into_owned(),
            });
        }
        Ok(data)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("connected", &self.is_connected())
            .finish()
    }
}

fn connect_stream(config: &PoolConfig) -> BeanstalkResult<TcpStream> {
    let addrs: Vec<SocketAddr> = (config.host.as_str(), config.port)
        .to_socket_addrs()
        .map_err(|_| BeanstalkError::InvalidAddress(format!("{}:{}", config.host, config.port)))?
        .collect();
    if addrs.is_empty() {
        return Err(BeanstalkError::InvalidAddress(format!(
            "{}:{}",
            config.host, config.port
        )));
    }

    let mut last_err = None;
    for addr in addrs {
        let attempt = match config.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => {
                stream.set_read_timeout(config.read_timeout)?;
                stream.set_write_timeout(config.write_timeout)?;
                // Disable Nagle so short command lines are not held back.
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }

    Err(match last_err {
        Some(err) => err.into(),
        None => BeanstalkError::ConnectionClosed,
    })
}
