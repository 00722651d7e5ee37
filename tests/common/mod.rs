//! Scripted in-memory transport for driver tests
//!
//! Each write is handed to a responder that returns the reply chunks to
//! deliver; every `read_available` call hands out one chunk, so a reply can
//! be fed byte by byte or in arbitrary pieces.

#![allow(dead_code)]

use bytes::BytesMut;
use ignix_client::{ConnectionState, Transport};
use std::collections::VecDeque;
use std::io;
use std::time::Duration;

type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

pub struct ScriptedTransport {
    pub state: ConnectionState,
    /// Every byte the driver wrote, in order
    pub written: Vec<u8>,
    pub writes: usize,
    pub reads: usize,
    pub closes: usize,
    pub connected_to: Option<(String, u16)>,
    responder: Responder,
    pending: VecDeque<Vec<u8>>,
    /// wait_ready calls needed before a connect completes; None = never
    connect_after: Option<usize>,
    waits: usize,
    eof_when_drained: bool,
}

impl ScriptedTransport {
    /// Connects immediately, never answers
    pub fn silent() -> Self {
        Self::with_responder(|_| Vec::new())
    }

    /// Answers the first write with `chunks`, later writes with nothing
    pub fn replying(chunks: Vec<Vec<u8>>) -> Self {
        let mut script = Some(chunks);
        Self::with_responder(move |_| script.take().unwrap_or_default())
    }

    /// Answers the first write with `reply`, delivered one byte per read
    pub fn byte_by_byte(reply: &[u8]) -> Self {
        Self::replying(reply.iter().map(|b| vec![*b]).collect())
    }

    pub fn with_responder(f: impl FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static) -> Self {
        Self {
            state: ConnectionState::Closed,
            written: Vec::new(),
            writes: 0,
            reads: 0,
            closes: 0,
            connected_to: None,
            responder: Box::new(f),
            pending: VecDeque::new(),
            connect_after: Some(0),
            waits: 0,
            eof_when_drained: false,
        }
    }

    /// Stay in `Connecting` until `n` readiness waits have happened
    pub fn connects_after(mut self, n: usize) -> Self {
        self.connect_after = Some(n);
        self
    }

    pub fn never_connects(mut self) -> Self {
        self.connect_after = None;
        self
    }

    /// Report EOF once all scripted chunks have been read
    pub fn eof_when_drained(mut self) -> Self {
        self.eof_when_drained = true;
        self
    }

    fn maybe_connect(&mut self) {
        if self.state == ConnectionState::Connecting {
            if let Some(n) = self.connect_after {
                if self.waits >= n {
                    self.state = ConnectionState::Open;
                }
            }
        }
    }
}

impl Transport for ScriptedTransport {
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        self.connected_to = Some((host.to_string(), port));
        self.waits = 0;
        self.state = ConnectionState::Connecting;
        self.maybe_connect();
        Ok(())
    }

    fn close(&mut self) {
        self.closes += 1;
        self.state = ConnectionState::Closed;
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn write_and_flush(&mut self, bytes: &[u8]) -> io::Result<()> {
        if self.state != ConnectionState::Open {
            return Err(io::ErrorKind::NotConnected.into());
        }
        self.writes += 1;
        self.written.extend_from_slice(bytes);
        let chunks = (self.responder)(bytes);
        self.pending.extend(chunks);
        Ok(())
    }

    fn read_available(&mut self, out: &mut BytesMut) -> io::Result<usize> {
        self.reads += 1;
        match self.pending.pop_front() {
            Some(chunk) => {
                out.extend_from_slice(&chunk);
                Ok(chunk.len())
            }
            None if self.eof_when_drained => {
                self.state = ConnectionState::Closed;
                Err(io::ErrorKind::UnexpectedEof.into())
            }
            None => Ok(0),
        }
    }

    fn wait_ready(&mut self, timeout: Duration) -> io::Result<()> {
        self.waits += 1;
        if self.pending.is_empty() {
            std::thread::sleep(timeout);
        }
        self.maybe_connect();
        Ok(())
    }
}

/// Build an `n`-deep nested array around `inner`
pub fn nested_array(depth: usize, inner: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    for _ in 0..depth {
        out.extend_from_slice(b"*1\r\n");
    }
    out.extend_from_slice(inner);
    out
}
