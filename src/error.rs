/*!
 * Driver Error Types
 *
 * Every failure a caller can observe from the driver is a `DriverError`.
 * Wire-level framing problems are grouped under `ProtocolError` because they
 * all mean the same thing to the exchange: the stream can no longer be trusted
 * and the command is abandoned without retry.
 */

use std::time::Duration;
use thiserror::Error;

/// Result type used throughout the driver
pub type Result<T> = std::result::Result<T, DriverError>;

/// Errors surfaced by `Driver::open` and `Driver::request`
#[derive(Debug, Error)]
pub enum DriverError {
    /// `request` was called while the transport is not open
    #[error("not connected")]
    NotConnected,

    /// The transport did not reach the connected state in time
    #[error("connect to {host}:{port} timed out after {timeout:?}")]
    ConnectTimeout {
        host: String,
        port: u16,
        timeout: Duration,
    },

    /// No reply bytes arrived within the read deadline
    #[error("read timed out after {0:?}")]
    ReadTimeout(Duration),

    /// The reply stream is malformed; the command is not retried
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The peer closed the stream before a complete reply was read
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// A command must carry at least one argument
    #[error("empty command")]
    EmptyCommand,

    /// A well-formed `-ERR ...` reply, raised by `Reply::into_result`
    #[error("server error: {0}")]
    Server(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Framing violations detected while decoding a reply
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Leading byte of a reply is not one of `- + : $ *`
    #[error("invalid type marker: {:?}", marker_char(.0))]
    InvalidTypeMarker(u8),

    /// Array element that is not a bulk string, integer or array
    #[error("unexpected array element marker: {:?}", marker_char(.0))]
    UnexpectedElement(u8),

    /// Negative length other than the `-1` null sentinel
    #[error("invalid length: {0}")]
    InvalidLength(i64),

    /// Malformed integer line (strict mode only)
    #[error("invalid integer: {0}")]
    InvalidInteger(String),

    /// Bulk payload not followed by CRLF (strict mode only)
    #[error("missing CRLF after bulk payload")]
    MissingTerminator,

    /// Arrays nested deeper than the configured limit
    #[error("nesting exceeds maximum depth of {0}")]
    NestingTooDeep(usize),
}

fn marker_char(b: &u8) -> char {
    *b as char
}
