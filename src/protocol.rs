/*!
 * Redis RESP Protocol Types and Request Encoding
 *
 * This module defines the values exchanged with a RESP server: commands going
 * out as multi-bulk frames, and typed replies coming back. Decoding lives in
 * `decode`; this side only ever writes.
 */

use crate::error::{DriverError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// CRLF line terminator used by every RESP frame
pub const CRLF: &[u8] = b"\r\n";

// Reply type markers
pub const ERROR: u8 = b'-';
pub const STATUS: u8 = b'+';
pub const INTEGER: u8 = b':';
pub const BULK: u8 = b'$';
pub const ARRAY: u8 = b'*';

/// A command to send: an ordered, non-empty list of binary-safe arguments
///
/// The first argument is conventionally the command name (`GET`, `SET`, ...),
/// but the driver attaches no meaning to any of them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<Bytes>,
}

impl Command {
    /// Build a command from its arguments
    ///
    /// # Returns
    /// * `Err(DriverError::EmptyCommand)` if `args` yields nothing
    pub fn new<I, A>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = A>,
        A: Into<Bytes>,
    {
        let args: Vec<Bytes> = args.into_iter().map(Into::into).collect();
        if args.is_empty() {
            return Err(DriverError::EmptyCommand);
        }
        Ok(Self { args })
    }

    /// Start a command with its name; add arguments with `arg`
    pub fn cmd(name: impl Into<Bytes>) -> Self {
        Self { args: vec![name.into()] }
    }

    /// Append one argument
    pub fn arg(mut self, arg: impl Into<Bytes>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    /// The command name, lossily decoded for logging
    pub fn name(&self) -> String {
        String::from_utf8_lossy(&self.args[0]).into_owned()
    }
}

/// A decoded server reply
///
/// `Bulk(None)` is the null reply (`$-1`), which is distinct from an empty
/// bulk string (`$0`). Arrays can nest arbitrarily, up to the decoder's depth
/// limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// `-ERR message` - the server rejected the command
    Error(String),
    /// `+OK` - simple acknowledgement
    Status(String),
    /// `:42`
    Integer(i64),
    /// `$5\r\nhello` or `$-1` for null
    Bulk(Option<Bytes>),
    /// `*N` followed by N replies
    Array(Vec<Reply>),
}

impl Reply {
    /// Check if the reply reports a server-side failure
    pub fn is_error(&self) -> bool {
        matches!(self, Reply::Error(_))
    }

    /// Check if the reply is the null bulk string
    pub fn is_nil(&self) -> bool {
        matches!(self, Reply::Bulk(None))
    }

    /// Turn an `Error` reply into `DriverError::Server`, pass anything else through
    pub fn into_result(self) -> Result<Reply> {
        match self {
            Reply::Error(msg) => Err(DriverError::Server(msg)),
            other => Ok(other),
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Reply::Bulk(Some(b)) => Some(b),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Reply::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Status text or UTF-8 bulk payload
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Reply::Status(s) => Some(s.as_str()),
            Reply::Bulk(Some(b)) => std::str::from_utf8(b).ok(),
            _ => None,
        }
    }

    pub fn into_vec(self) -> Option<Vec<Reply>> {
        match self {
            Reply::Array(items) => Some(items),
            _ => None,
        }
    }

    /// Convenience constructor for a non-null bulk reply
    pub fn bulk(b: impl Into<Bytes>) -> Self {
        Reply::Bulk(Some(b.into()))
    }

    fn fmt_indented(&self, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
        match self {
            Reply::Error(msg) => write!(f, "(error) {}", msg),
            Reply::Status(msg) => write!(f, "{}", msg),
            Reply::Integer(i) => write!(f, "(integer) {}", i),
            Reply::Bulk(None) => write!(f, "(nil)"),
            Reply::Bulk(Some(b)) => write!(f, "{:?}", String::from_utf8_lossy(b)),
            Reply::Array(items) if items.is_empty() => write!(f, "(empty array)"),
            Reply::Array(items) => {
                // redis-cli style numbering, nested arrays indented under their index
                let width = items.len().to_string().len();
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, "\n{:indent$}", "", indent = indent)?;
                    }
                    let label = format!("{:>width$}) ", i + 1, width = width);
                    write!(f, "{}", label)?;
                    item.fmt_indented(f, indent + label.len())?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_indented(f, 0)
    }
}

//
// RESP Request Encoders
//

/// Encode one argument as a bulk frame ($<len>\r\n<data>\r\n)
pub fn encode_bulk(b: &[u8]) -> Vec<u8> {
    let mut out = BytesMut::with_capacity(1 + 20 + 2 + b.len() + 2);
    encode_bulk_to(b, &mut out);
    out.to_vec()
}

/// Append the bulk frame for `b` to `out`
#[inline]
pub fn encode_bulk_to(b: &[u8], out: &mut BytesMut) {
    write_len(BULK, b.len(), out);
    out.put_slice(b);
    out.put_slice(CRLF);
}

/// Encode a command as a multi-bulk frame (*<count>\r\n<bulk1><bulk2>...)
pub fn encode_command(cmd: &Command) -> Vec<u8> {
    let mut out = BytesMut::with_capacity(encoded_len(cmd));
    encode_command_to(cmd, &mut out);
    out.to_vec()
}

/// Append the multi-bulk frame for `cmd` to `out`
pub fn encode_command_to(cmd: &Command, out: &mut BytesMut) {
    out.reserve(encoded_len(cmd));
    write_len(ARRAY, cmd.args.len(), out);
    for arg in &cmd.args {
        encode_bulk_to(arg, out);
    }
}

#[inline]
fn write_len(marker: u8, len: usize, out: &mut BytesMut) {
    out.put_u8(marker);
    out.put_slice(len.to_string().as_bytes());
    out.put_slice(CRLF);
}

/// Rough size estimate so the frame is built with a single allocation
fn encoded_len(cmd: &Command) -> usize {
    // marker + up to 20 digits + CRLF per header, payload + CRLF per argument
    let headers = (cmd.args.len() + 1) * 23;
    headers + cmd.args.iter().map(|a| a.len() + 2).sum::<usize>()
}
