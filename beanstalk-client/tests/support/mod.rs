#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use beanstalk_client::{Beanstalk, ClientConfig};

/// Handler invoked per received command: index, command line, put body.
pub type Handler = fn(usize, &str, Option<&[u8]>, &mut TcpStream);

/// In-process stand-in for the daemon, serving a single session.
pub struct FakeServer {
    pub addr: std::net::SocketAddr,
    handle: JoinHandle<Vec<String>>,
}

impl FakeServer {
    /// Waits for the session to end and returns every command line received,
    /// excluding the final `quit`.
    ///
    /// Drop the client first so the session closes.
    pub fn finish(self) -> Vec<String> {
        self.handle.join().expect("server thread")
    }
}

pub fn spawn_server(handler: Handler) -> FakeServer {
    spawn_sessions(1, handler)
}

/// Serves `sessions` consecutive sessions; the handler index keeps counting
/// across them.
pub fn spawn_sessions(sessions: usize, handler: Handler) -> FakeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");

    let handle = thread::spawn(move || {
        let mut received = Vec::new();
        for _ in 0..sessions {
            let (stream, _) = listener.accept().expect("accept");
            serve_session(stream, handler, &mut received);
        }
        received
    });

    FakeServer { addr, handle }
}

fn serve_session(mut stream: TcpStream, handler: Handler, received: &mut Vec<String>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let mut reader = BufReader::new(stream.try_clone().expect("clone"));

    while let Some(line) = read_line(&mut reader) {
        if line == "quit" {
            break;
        }
        let body = if line.starts_with("put ") {
            let size: usize = line
                .rsplit(' ')
                .next()
                .and_then(|raw| raw.parse().ok())
                .expect("put size");
            let mut data = vec![0u8; size + 2];
            reader.read_exact(&mut data).expect("put body");
            assert_eq!(&data[size..], b"\r\n");
            data.truncate(size);
            Some(data)
        } else {
            None
        };
        handler(received.len(), &line, body.as_deref(), &mut stream);
        received.push(line);
    }
}

fn read_line(reader: &mut BufReader<TcpStream>) -> Option<String> {
    let mut buf = Vec::new();
    match reader.read_until(b'\n', &mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => {
            assert!(buf.ends_with(b"\r\n"), "command not CRLF terminated");
            buf.truncate(buf.len() - 2);
            Some(String::from_utf8(buf).expect("utf8 command"))
        }
    }
}

pub fn reply(stream: &mut TcpStream, line: &str) {
    let _ = stream.write_all(line.as_bytes());
    let _ = stream.write_all(b"\r\n");
    let _ = stream.flush();
}

pub fn reply_with_body(stream: &mut TcpStream, head: &str, body: &[u8]) {
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(b" ");
    let _ = stream.write_all(body.len().to_string().as_bytes());
    let _ = stream.write_all(b"\r\n");
    let _ = stream.write_all(body);
    let _ = stream.write_all(b"\r\n");
    let _ = stream.flush();
}

pub fn client_for(server: &FakeServer) -> Beanstalk {
    let config = ClientConfig {
        host: server.addr.ip().to_string(),
        port: server.addr.port(),
        max_connections: 1,
        connect_timeout: Some(Duration::from_secs(1)),
        read_timeout: Some(Duration::from_secs(2)),
        write_timeout: Some(Duration::from_secs(1)),
    };
    Beanstalk::with_config(config)
}

pub fn job_stats_yaml(id: u64, pri: u32) -> Vec<u8> {
    format!(
        "---\nid: {id}\ntube: default\nstate: reserved\npri: {pri}\nage: 1\ndelay: 0\nttr: 60\ntime-left: 59\nfile: 0\nreserves: 1\ntimeouts: 0\nreleases: 0\nburies: 0\nkicks: 0\n"
    )
    .into_bytes()
}
