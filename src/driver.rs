/*!
 * Request/Reply Driver
 *
 * `Driver` owns a transport, one receive buffer and a decoder, and runs the
 * full cycle for a single command: encode, write, wait for bytes, decode,
 * and retry the decode while the reply is still incomplete. Only one command
 * is ever in flight; a second `request` must wait for the first to return.
 */

use crate::buffer::ReceiveBuffer;
use crate::config::{DriverConfig, DEFAULT_HOST, DEFAULT_PORT};
use crate::decode::Decoder;
use crate::error::{DriverError, Result};
use crate::protocol::{encode_command, Command, Reply};
use crate::transport::{ConnectionState, TcpTransport, Transport};
use std::io;
use std::time::{Duration, Instant};

/// Common interface of key-value store drivers
///
/// Lets callers hold any driver behind one type without caring which
/// transport sits underneath.
pub trait KvsDriver {
    /// Connect to `host:port`; empty host and port 0 fall back to the defaults
    fn open(&mut self, host: &str, port: u16) -> Result<()>;

    /// Close the connection; safe to call in any state
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Send one command and wait for its reply
    fn request(&mut self, command: &Command) -> Result<Reply>;
}

/// Single-connection RESP driver
pub struct Driver<T: Transport> {
    transport: T,
    config: DriverConfig,
    decoder: Decoder,
    buffer: ReceiveBuffer,
}

impl Driver<TcpTransport> {
    /// Driver over a fresh TCP transport with default configuration
    pub fn tcp() -> Result<Self> {
        Self::tcp_with_config(DriverConfig::default())
    }

    pub fn tcp_with_config(config: DriverConfig) -> Result<Self> {
        Ok(Self::with_config(TcpTransport::new()?, config))
    }
}

impl<T: Transport> Driver<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, DriverConfig::default())
    }

    pub fn with_config(transport: T, config: DriverConfig) -> Self {
        Self {
            transport,
            decoder: Decoder::from_config(&config),
            config,
            buffer: ReceiveBuffer::new(),
        }
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The receive buffer, for inspection
    pub fn buffer(&self) -> &ReceiveBuffer {
        &self.buffer
    }

    pub fn state(&self) -> ConnectionState {
        self.transport.state()
    }

    /// Open using the host and port from the configuration
    pub fn open_default(&mut self) -> Result<()> {
        let host = self.config.host.clone();
        let port = self.config.port;
        self.open(&host, port)
    }

    /// Connect and wait up to `connect_timeout` for the connected state
    ///
    /// # Returns
    /// * `Ok(())` - connected, or already open
    /// * `Err(DriverError::ConnectTimeout)` - not connected in time, transport closed again
    /// * `Err(DriverError::Io)` - resolution or connect failed outright
    pub fn open(&mut self, host: &str, port: u16) -> Result<()> {
        if self.is_open() {
            return Ok(());
        }

        let host = if host.is_empty() { DEFAULT_HOST } else { host };
        let port = if port == 0 { DEFAULT_PORT } else { port };

        log::debug!("open host:{} port:{}", host, port);
        self.buffer.clear();
        if let Err(e) = self.transport.connect(host, port) {
            log::error!("open {}:{} failed: {}", host, port, e);
            self.transport.close();
            return Err(e.into());
        }

        match self.wait_for_state(ConnectionState::Open, self.config.connect_timeout) {
            Ok(true) => {
                log::debug!("opened {}:{}", host, port);
                Ok(())
            }
            Ok(false) => {
                log::error!("open {}:{} failed: timeout", host, port);
                self.transport.close();
                Err(DriverError::ConnectTimeout {
                    host: host.to_string(),
                    port,
                    timeout: self.config.connect_timeout,
                })
            }
            Err(e) => {
                log::error!("open {}:{} failed: {}", host, port, e);
                self.transport.close();
                Err(e.into())
            }
        }
    }

    pub fn close(&mut self) {
        if self.transport.state() != ConnectionState::Closed {
            log::debug!("close");
        }
        self.transport.close();
        self.buffer.clear();
    }

    /// Reflects the transport state only, never the outcome of a command
    pub fn is_open(&self) -> bool {
        self.transport.state() == ConnectionState::Open
    }

    /// Send `command` and return its reply
    ///
    /// A server `-ERR` reply is a successful decode and comes back as
    /// `Ok(Reply::Error(..))`; use `Reply::into_result` to treat it as a failure.
    /// Timeouts, I/O errors and protocol violations clear the receive buffer.
    pub fn request(&mut self, command: &Command) -> Result<Reply> {
        if !self.is_open() {
            log::error!("request {} on a closed connection", command.name());
            return Err(DriverError::NotConnected);
        }

        let frame = encode_command(command);
        if let Err(e) = self.transport.write_and_flush(&frame) {
            self.buffer.clear();
            return Err(e.into());
        }
        self.buffer.clear();

        loop {
            if let Err(e) = self.wait_for_more_bytes(self.config.read_timeout) {
                self.buffer.clear();
                return Err(e);
            }

            let start = self.buffer.cursor();
            let (data, cursor) = self.buffer.parts_mut();
            match self.decoder.decode_one(data, cursor) {
                Ok(Some(reply)) => {
                    match &reply {
                        Reply::Error(msg) => log::error!("{} error reply: {}", command.name(), msg),
                        Reply::Status(msg) => log::debug!("{} reply: {}", command.name(), msg),
                        _ => {}
                    }
                    return Ok(reply);
                }
                Ok(None) => {
                    // Incomplete: rewind and wait for the rest
                    self.buffer.set_cursor(start);
                    log::trace!("incomplete reply, {} bytes buffered", self.buffer.len());
                }
                Err(e) => {
                    log::error!("invalid protocol: {}", e);
                    self.buffer.clear();
                    return Err(e.into());
                }
            }
        }
    }

    /// Wait until at least one new byte lands in the receive buffer
    ///
    /// Compacts the consumed prefix first, then alternates between draining
    /// the transport and waiting on it for at most `poll_interval` at a time.
    pub fn wait_for_more_bytes(&mut self, timeout: Duration) -> Result<()> {
        self.buffer.compact();

        let start_len = self.buffer.len();
        let started = Instant::now();
        loop {
            match self.transport.read_available(self.buffer.as_bytes_mut()) {
                Ok(_) => {}
                // NotConnected: EOF already seen on an earlier read of this exchange
                Err(ref e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::UnexpectedEof | io::ErrorKind::NotConnected
                    ) =>
                {
                    log::warn!("connection closed while waiting for reply");
                    return Err(DriverError::ConnectionClosed);
                }
                Err(e) => return Err(e.into()),
            }
            if self.buffer.len() > start_len {
                return Ok(());
            }

            let elapsed = started.elapsed();
            if elapsed >= timeout {
                log::warn!("read timeout");
                return Err(DriverError::ReadTimeout(timeout));
            }
            let tick = self.config.poll_interval.min(timeout - elapsed);
            self.transport.wait_ready(tick)?;
        }
    }

    /// Wait until the transport reports `state`, or give up after `timeout`
    fn wait_for_state(&mut self, state: ConnectionState, timeout: Duration) -> io::Result<bool> {
        let started = Instant::now();
        while self.transport.state() != state {
            let elapsed = started.elapsed();
            if elapsed >= timeout {
                log::warn!(
                    "wait for state timeout. current state:{:?} timeout:{:?}",
                    self.transport.state(),
                    timeout
                );
                return Ok(false);
            }
            if self.transport.state() == ConnectionState::Closed {
                return Err(io::ErrorKind::ConnectionRefused.into());
            }
            let tick = self.config.poll_interval.min(timeout - elapsed);
            self.transport.wait_ready(tick)?;
        }
        Ok(true)
    }
}

impl<T: Transport> KvsDriver for Driver<T> {
    fn open(&mut self, host: &str, port: u16) -> Result<()> {
        Driver::open(self, host, port)
    }

    fn close(&mut self) {
        Driver::close(self)
    }

    fn is_open(&self) -> bool {
        Driver::is_open(self)
    }

    fn request(&mut self, command: &Command) -> Result<Reply> {
        Driver::request(self, command)
    }
}

impl<T: Transport> Drop for Driver<T> {
    fn drop(&mut self) {
        self.transport.close();
    }
}
