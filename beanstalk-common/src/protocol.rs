//! # Wire Protocol
//!
//! Purpose: Describe the beanstalkd text protocol as data: every command the
//! client sends, the closed vocabulary of reply statuses, and for each
//! command which statuses mean success, which mean a declared failure, and
//! whether a length-prefixed payload follows the status line.
//!
//! ## Design Principles
//! 1. **Closed Vocabulary**: `Command` and `Status` are enums; templates are
//!    not assembled from strings at call sites.
//! 2. **Tagged Replies**: Classification yields `Reply::Success` or
//!    `Reply::Failure`; anything else is `BeanstalkError::Unknown`.
//! 3. **Binary-Safe Bodies**: Job bodies are raw bytes, never re-encoded.
//! 4. **Buffer Reuse**: Encoding appends into a caller-owned buffer.
//!
//! ## Frame Layout
//!
//! ```text
//! request:  <command> [args...]\r\n [<body>\r\n]
//! reply:    <STATUS> [args...]\r\n  [<payload of declared length>\r\n]
//!
//! put 100 0 60 5\r\nhello\r\n   ->   INSERTED 7\r\n
//! reserve\r\n                   ->   RESERVED 7 5\r\nhello\r\n
//! stats-job 7\r\n               ->   OK 142\r\n---\nid: 7\n...\r\n
//! ```

use crate::error::{BeanstalkError, BeanstalkResult};
use crate::types::{JobId, Priority, MAX_TUBE_NAME_LEN};

/// Line terminator used in both directions.
pub const CRLF: &[u8] = b"\r\n";

/// Requests understood by the daemon.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Put {
        priority: Priority,
        delay: u64,
        ttr: u64,
        body: &'a [u8],
    },
    Reserve,
    ReserveWithTimeout(u64),
    Delete(JobId),
    Release {
        id: JobId,
        priority: Priority,
        delay: u64,
    },
    Bury {
        id: JobId,
        priority: Priority,
    },
    Touch(JobId),
    Kick(u64),
    KickJob(JobId),
    Peek(JobId),
    PeekReady,
    PeekDelayed,
    PeekBuried,
    Use(&'a str),
    Watch(&'a str),
    Ignore(&'a str),
    ListTubes,
    ListTubeUsed,
    ListTubesWatched,
    Stats,
    StatsTube(&'a str),
    StatsJob(JobId),
    PauseTube {
        tube: &'a str,
        delay: u64,
    },
    Quit,
}

/// Shape of the data following a success status line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyBody {
    /// Status line only.
    None,
    /// `<id> <bytes>` arguments followed by a job body.
    Job,
    /// `<bytes>` argument followed by a structured payload.
    Data,
}

/// Declared outcome sets for one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Expectation {
    pub success: &'static [Status],
    pub failure: &'static [Status],
    pub body: ReplyBody,
}

impl<'a> Command<'a> {
    /// Wire name, also used as the operation name in errors.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Put { .. } => "put",
            Command::Reserve => "reserve",
            Command::ReserveWithTimeout(_) => "reserve-with-timeout",
            Command::Delete(_) => "delete",
            Command::Release { .. } => "release",
            Command::Bury { .. } => "bury",
            Command::Touch(_) => "touch",
            Command::Kick(_) => "kick",
            Command::KickJob(_) => "kick-job",
            Command::Peek(_) => "peek",
            Command::PeekReady => "peek-ready",
            Command::PeekDelayed => "peek-delayed",
            Command::PeekBuried => "peek-buried",
            Command::Use(_) => "use",
            Command::Watch(_) => "watch",
            Command::Ignore(_) => "ignore",
            Command::ListTubes => "list-tubes",
            Command::ListTubeUsed => "list-tube-used",
            Command::ListTubesWatched => "list-tubes-watched",
            Command::Stats => "stats",
            Command::StatsTube(_) => "stats-tube",
            Command::StatsJob(_) => "stats-job",
            Command::PauseTube { .. } => "pause-tube",
            Command::Quit => "quit",
        }
    }

    /// Success/failure vocabulary and reply shape for this command.
    pub fn expectation(&self) -> Expectation {
        use Status::*;

        let (success, failure, body): (&'static [Status], &'static [Status], ReplyBody) =
            match self {
                Command::Put { .. } => (&[Inserted], &[JobTooBig, Buried, Draining], ReplyBody::None),
                Command::Reserve | Command::ReserveWithTimeout(_) => {
                    (&[Reserved], &[DeadlineSoon, TimedOut], ReplyBody::Job)
                }
                Command::Delete(_) => (&[Deleted], &[NotFound], ReplyBody::None),
                Command::Release { .. } => (&[Released, Buried], &[NotFound], ReplyBody::None),
                Command::Bury { .. } => (&[Buried], &[NotFound], ReplyBody::None),
                Command::Touch(_) => (&[Touched], &[NotFound], ReplyBody::None),
                Command::Kick(_) => (&[Kicked], &[], ReplyBody::None),
                Command::KickJob(_) => (&[Kicked], &[NotFound], ReplyBody::None),
                Command::Peek(_)
                | Command::PeekReady
                | Command::PeekDelayed
                | Command::PeekBuried => (&[Found], &[NotFound], ReplyBody::Job),
                Command::Use(_) | Command::ListTubeUsed => (&[Using], &[], ReplyBody::None),
                Command::Watch(_) => (&[Watching], &[], ReplyBody::None),
                Command::Ignore(_) => (&[Watching], &[NotIgnored], ReplyBody::None),
                Command::ListTubes | Command::ListTubesWatched | Command::Stats => {
                    (&[Ok], &[], ReplyBody::Data)
                }
                Command::StatsTube(_) | Command::StatsJob(_) => (&[Ok], &[NotFound], ReplyBody::Data),
                Command::PauseTube { .. } => (&[Paused], &[NotFound], ReplyBody::None),
                Command::Quit => (&[], &[], ReplyBody::None),
            };

        Expectation {
            success,
            failure,
            body,
        }
    }

    /// Appends the full request, including any job body, to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.name().as_bytes());
        match *self {
            Command::Put {
                priority,
                delay,
                ttr,
                body,
            } => {
                push_arg(out, priority as u64);
                push_arg(out, delay);
                push_arg(out, ttr);
                push_arg(out, body.len() as u64);
                out.extend_from_slice(CRLF);
                out.extend_from_slice(body);
            }
            Command::ReserveWithTimeout(seconds) => push_arg(out, seconds),
            Command::Delete(id)
            | Command::Touch(id)
            | Command::KickJob(id)
            | Command::Peek(id)
            | Command::StatsJob(id) => push_arg(out, id),
            Command::Release {
                id,
                priority,
                delay,
            } => {
                push_arg(out, id);
                push_arg(out, priority as u64);
                push_arg(out, delay);
            }
            Command::Bury { id, priority } => {
                push_arg(out, id);
                push_arg(out, priority as u64);
            }
            Command::Kick(bound) => push_arg(out, bound),
            Command::Use(tube)
            | Command::Watch(tube)
            | Command::Ignore(tube)
            | Command::StatsTube(tube) => push_word(out, tube),
            Command::PauseTube { tube, delay } => {
                push_word(out, tube);
                push_arg(out, delay);
            }
            Command::Reserve
            | Command::PeekReady
            | Command::PeekDelayed
            | Command::PeekBuried
            | Command::ListTubes
            | Command::ListTubeUsed
            | Command::ListTubesWatched
            | Command::Stats
            | Command::Quit => {}
        }
        out.extend_from_slice(CRLF);
    }
}

/// Closed vocabulary of reply status tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    Found,
    NotFound,
    Inserted,
    JobTooBig,
    Buried,
    Draining,
    Reserved,
    DeadlineSoon,
    TimedOut,
    Deleted,
    Released,
    Touched,
    Kicked,
    Using,
    Watching,
    NotIgnored,
    Paused,
    OutOfMemory,
    InternalError,
    BadFormat,
    UnknownCommand,
    ExpectedCrlf,
}

impl Status {
    const ALL: [Status; 23] = [
        Status::Ok,
        Status::Found,
        Status::NotFound,
        Status::Inserted,
        Status::JobTooBig,
        Status::Buried,
        Status::Draining,
        Status::Reserved,
        Status::DeadlineSoon,
        Status::TimedOut,
        Status::Deleted,
        Status::Released,
        Status::Touched,
        Status::Kicked,
        Status::Using,
        Status::Watching,
        Status::NotIgnored,
        Status::Paused,
        Status::OutOfMemory,
        Status::InternalError,
        Status::BadFormat,
        Status::UnknownCommand,
        Status::ExpectedCrlf,
    ];

    /// Wire token for the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Found => "FOUND",
            Status::NotFound => "NOT_FOUND",
            Status::Inserted => "INSERTED",
            Status::JobTooBig => "JOB_TOO_BIG",
            Status::Buried => "BURIED",
            Status::Draining => "DRAINING",
            Status::Reserved => "RESERVED",
            Status::DeadlineSoon => "DEADLINE_SOON",
            Status::TimedOut => "TIMED_OUT",
            Status::Deleted => "DELETED",
            Status::Released => "RELEASED",
            Status::Touched => "TOUCHED",
            Status::Kicked => "KICKED",
            Status::Using => "USING",
            Status::Watching => "WATCHING",
            Status::NotIgnored => "NOT_IGNORED",
            Status::Paused => "PAUSED",
            Status::OutOfMemory => "OUT_OF_MEMORY",
            Status::InternalError => "INTERNAL_ERROR",
            Status::BadFormat => "BAD_FORMAT",
            Status::UnknownCommand => "UNKNOWN_COMMAND",
            Status::ExpectedCrlf => "EXPECTED_CRLF",
        }
    }

    /// Parses a wire token; `None` for tokens outside the vocabulary.
    pub fn parse(token: &str) -> Option<Status> {
        Status::ALL.iter().copied().find(|status| status.as_str() == token)
    }
}

/// One reply line split on whitespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub status: String,
    pub args: Vec<String>,
}

impl StatusLine {
    /// Splits a reply line (terminator already stripped or not).
    ///
    /// Returns `None` for a line with no tokens.
    pub fn parse(line: &[u8]) -> Option<StatusLine> {
        let text = String::from_utf8_lossy(line);
        let mut tokens = text.split_whitespace().map(str::to_string);
        let status = tokens.next()?;
        Some(StatusLine {
            status,
            args: tokens.collect(),
        })
    }

    /// Status followed by every argument, as carried in errors.
    pub fn tokens(&self) -> Vec<String> {
        let mut tokens = Vec::with_capacity(self.args.len() + 1);
        tokens.push(self.status.clone());
        tokens.extend(self.args.iter().cloned());
        tokens
    }
}

/// Reply classified against a command's declared vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Success { status: Status, args: Vec<String> },
    Failure { status: Status, args: Vec<String> },
}

impl Reply {
    /// Classifies `line` for `command`.
    ///
    /// Statuses outside both sets become `BeanstalkError::Unknown`.
    pub fn classify(command: &Command<'_>, line: StatusLine) -> BeanstalkResult<Reply> {
        let expectation = command.expectation();
        match Status::parse(&line.status) {
            Some(status) if expectation.success.contains(&status) => Ok(Reply::Success {
                status,
                args: line.args,
            }),
            Some(status) if expectation.failure.contains(&status) => Ok(Reply::Failure {
                status,
                args: line.args,
            }),
            _ => Err(BeanstalkError::Unknown {
                command: command.name(),
                status: line.status.clone(),
                response: line.tokens(),
            }),
        }
    }

    /// Status of the reply regardless of outcome.
    pub fn status(&self) -> Status {
        match self {
            Reply::Success { status, .. } | Reply::Failure { status, .. } => *status,
        }
    }

    /// Unwraps a success, turning a declared failure into `CommandFailed`.
    pub fn into_args(self, command: &'static str) -> BeanstalkResult<Vec<String>> {
        match self {
            Reply::Success { args, .. } => Ok(args),
            Reply::Failure { status, args } => Err(failure_error(command, status, args)),
        }
    }
}

/// Builds the `CommandFailed` error for a declared failure reply.
pub fn failure_error(command: &'static str, status: Status, args: Vec<String>) -> BeanstalkError {
    let mut response = Vec::with_capacity(args.len() + 1);
    response.push(status.as_str().to_string());
    response.extend(args);
    BeanstalkError::CommandFailed {
        command,
        status: status.as_str().to_string(),
        response,
    }
}

/// Parses a numeric reply argument.
pub fn parse_number(command: &'static str, arg: Option<&String>) -> BeanstalkResult<u64> {
    arg.and_then(|raw| raw.parse().ok())
        .ok_or_else(|| BeanstalkError::MalformedReply {
            command,
            line: arg.cloned().unwrap_or_default(),
        })
}

/// Checks a tube name against the daemon's naming rules.
///
/// Names are 1..=200 bytes of letters, digits and `-+/;.$_()`, and may not
/// start with a hyphen.
pub fn validate_tube_name(name: &str) -> BeanstalkResult<()> {
    let valid = !name.is_empty()
        && name.len() <= MAX_TUBE_NAME_LEN
        && !name.starts_with('-')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-+/;.$_()".contains(&b));
    if valid {
        Ok(())
    } else {
        Err(BeanstalkError::InvalidTubeName(name.to_string()))
    }
}

fn push_word(out: &mut Vec<u8>, word: &str) {
    out.push(b' ');
    out.extend_from_slice(word.as_bytes());
}

fn push_arg(out: &mut Vec<u8>, mut value: u64) {
    out.push(b' ');
    // Digits are written into a stack buffer to keep encoding allocation-free.
    let mut buf = [0u8; 20];
    let mut len = 0;
    if value == 0 {
        buf[0] = b'0';
        len = 1;
    } else {
        while value > 0 {
            buf[len] = b'0' + (value % 10) as u8;
            value /= 10;
            len += 1;
        }
    }
    for idx in (0..len).rev() {
        out.push(buf[idx]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn encoded(command: Command<'_>) -> Vec<u8> {
        let mut buf = Vec::new();
        command.encode(&mut buf);
        buf
    }

    #[test]
    fn encodes_put_with_body() {
        let command = Command::Put {
            priority: 100,
            delay: 0,
            ttr: 60,
            body: b"hello",
        };
        assert_eq!(encoded(command), b"put 100 0 60 5\r\nhello\r\n".to_vec());
    }

    #[test]
    fn encodes_binary_body_verbatim() {
        let body = [0u8, 13, 10, 255];
        let command = Command::Put {
            priority: 0,
            delay: 5,
            ttr: 1,
            body: &body,
        };
        let mut expected = b"put 0 5 1 4\r\n".to_vec();
        expected.extend_from_slice(&body);
        expected.extend_from_slice(b"\r\n");
        assert_eq!(encoded(command), expected);
    }

    #[test]
    fn encodes_job_commands() {
        assert_eq!(encoded(Command::Reserve), b"reserve\r\n".to_vec());
        assert_eq!(
            encoded(Command::ReserveWithTimeout(5)),
            b"reserve-with-timeout 5\r\n".to_vec()
        );
        assert_eq!(encoded(Command::Delete(42)), b"delete 42\r\n".to_vec());
        assert_eq!(
            encoded(Command::Release {
                id: 42,
                priority: 2147483648,
                delay: 3
            }),
            b"release 42 2147483648 3\r\n".to_vec()
        );
        assert_eq!(
            encoded(Command::Bury { id: 7, priority: 1 }),
            b"bury 7 1\r\n".to_vec()
        );
        assert_eq!(encoded(Command::Touch(7)), b"touch 7\r\n".to_vec());
        assert_eq!(encoded(Command::Kick(10)), b"kick 10\r\n".to_vec());
        assert_eq!(encoded(Command::KickJob(7)), b"kick-job 7\r\n".to_vec());
        assert_eq!(encoded(Command::PeekBuried), b"peek-buried\r\n".to_vec());
        assert_eq!(encoded(Command::Quit), b"quit\r\n".to_vec());
    }

    #[test]
    fn encodes_tube_commands() {
        assert_eq!(encoded(Command::Use("emails")), b"use emails\r\n".to_vec());
        assert_eq!(encoded(Command::Ignore("default")), b"ignore default\r\n".to_vec());
        assert_eq!(
            encoded(Command::PauseTube {
                tube: "emails",
                delay: 30
            }),
            b"pause-tube emails 30\r\n".to_vec()
        );
        assert_eq!(
            encoded(Command::ListTubesWatched),
            b"list-tubes-watched\r\n".to_vec()
        );
    }

    #[test]
    fn parses_status_line() {
        let line = StatusLine::parse(b"RESERVED 12 5\r\n").unwrap();
        assert_eq!(line.status, "RESERVED");
        assert_eq!(line.args, vec!["12".to_string(), "5".to_string()]);
        assert_eq!(line.tokens(), vec!["RESERVED", "12", "5"]);
        assert!(StatusLine::parse(b"\r\n").is_none());
    }

    #[test]
    fn classifies_success_and_failure() {
        let put = Command::Put {
            priority: 1,
            delay: 0,
            ttr: 1,
            body: b"x",
        };
        let reply = Reply::classify(&put, StatusLine::parse(b"INSERTED 3").unwrap()).unwrap();
        assert_eq!(
            reply,
            Reply::Success {
                status: Status::Inserted,
                args: vec!["3".to_string()]
            }
        );

        let reply = Reply::classify(&put, StatusLine::parse(b"BURIED 3").unwrap()).unwrap();
        assert_eq!(reply.status(), Status::Buried);
        let err = reply.into_args("put").unwrap_err();
        match err {
            BeanstalkError::CommandFailed {
                command,
                status,
                response,
            } => {
                assert_eq!(command, "put");
                assert_eq!(status, "BURIED");
                assert_eq!(response, vec!["BURIED", "3"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn release_accepts_buried_as_success() {
        let release = Command::Release {
            id: 1,
            priority: 1,
            delay: 0,
        };
        let reply = Reply::classify(&release, StatusLine::parse(b"BURIED").unwrap()).unwrap();
        assert!(matches!(reply, Reply::Success { status: Status::Buried, .. }));
    }

    #[test]
    fn unknown_status_carries_token() {
        let err = Reply::classify(&Command::Delete(1), StatusLine::parse(b"WAT 1 2").unwrap())
            .unwrap_err();
        match err {
            BeanstalkError::Unknown {
                command,
                status,
                response,
            } => {
                assert_eq!(command, "delete");
                assert_eq!(status, "WAT");
                assert_eq!(response, vec!["WAT", "1", "2"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn known_status_outside_sets_is_unknown() {
        let err = Reply::classify(&Command::Kick(1), StatusLine::parse(b"NOT_FOUND").unwrap())
            .unwrap_err();
        assert!(matches!(err, BeanstalkError::Unknown { .. }));
        assert_eq!(err.status(), Some("NOT_FOUND"));
    }

    #[test]
    fn status_tokens_round_trip() {
        for status in Status::ALL {
            assert_eq!(Status::parse(status.as_str()), Some(status));
        }
        assert_eq!(Status::parse("inserted"), None);
    }

    #[test]
    fn parses_numeric_arguments() {
        let args = vec!["17".to_string(), "x".to_string()];
        assert_eq!(parse_number("put", args.first()).unwrap(), 17);
        assert!(matches!(
            parse_number("put", args.get(1)),
            Err(BeanstalkError::MalformedReply { command: "put", .. })
        ));
        assert!(parse_number("put", args.get(5)).is_err());
    }

    #[test]
    fn validates_tube_names() {
        assert!(validate_tube_name("default").is_ok());
        assert!(validate_tube_name("a-b+c/d;e.f$g_h(i)").is_ok());
        assert!(validate_tube_name("").is_err());
        assert!(validate_tube_name("-leading").is_err());
        assert!(validate_tube_name("has space").is_err());
        assert!(validate_tube_name("crlf\r\nquit").is_err());
        assert!(validate_tube_name(&"t".repeat(MAX_TUBE_NAME_LEN + 1)).is_err());
    }
}
