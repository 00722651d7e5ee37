/*!
 * Byte-Stream Transport
 *
 * The driver talks to the server through the `Transport` trait: connect,
 * write, read whatever has arrived, and wait (bounded) until something might
 * have changed. `TcpTransport` implements it over a non-blocking mio socket
 * created with socket2; tests substitute scripted in-memory transports.
 */

use bytes::BytesMut;
use mio::net::TcpStream;
use mio::{Events, Interest, Poll, Token};
use socket2::{Domain, Protocol, Socket, TcpKeepalive, Type};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, ToSocketAddrs};
use std::time::{Duration, Instant};

/// Size of the scratch buffer used for socket reads
const READ_BUF: usize = 4096;

/// How long a blocked write may wait for the socket to become writable
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

const STREAM: Token = Token(0);

/// Connection state as reported by a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Closed,
    Connecting,
    Open,
}

/// The byte-stream primitive the driver is built on
///
/// Implementations are driven from a single thread; none of the methods
/// needs to be reentrant.
pub trait Transport {
    /// Start connecting to `host:port`; completion is observed through `state`
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()>;

    /// Close the stream. Calling it on a closed transport does nothing.
    fn close(&mut self);

    fn state(&self) -> ConnectionState;

    /// Write all of `bytes` and flush them to the peer
    fn write_and_flush(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Append every byte that is available right now to `out`, without blocking
    ///
    /// # Returns
    /// * `Ok(n)` - number of bytes appended, 0 when nothing is pending
    /// * `Err(UnexpectedEof)` - the peer closed the stream and nothing was read
    fn read_available(&mut self, out: &mut BytesMut) -> io::Result<usize>;

    /// Block for at most `timeout` until the stream may be readable or the
    /// connection state may have changed
    fn wait_ready(&mut self, timeout: Duration) -> io::Result<()>;
}

/// Non-blocking TCP transport backed by mio
pub struct TcpTransport {
    poll: Poll,
    events: Events,
    stream: Option<TcpStream>,
    state: ConnectionState,
    /// Remaining addresses to try if the current connect attempt fails
    pending: Vec<SocketAddr>,
}

impl TcpTransport {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(16),
            stream: None,
            state: ConnectionState::Closed,
            pending: Vec::new(),
        })
    }

    /// Address of the connected peer, if any
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.as_ref().and_then(|s| s.peer_addr().ok())
    }

    /// Begin a non-blocking connect to the next pending address
    fn connect_next(&mut self) -> io::Result<()> {
        let mut last_err = io::Error::new(io::ErrorKind::NotFound, "no address resolved");
        while let Some(addr) = self.pending.pop() {
            match connect_nonblocking(addr) {
                Ok(mut stream) => {
                    self.poll.registry().register(
                        &mut stream,
                        STREAM,
                        Interest::READABLE | Interest::WRITABLE,
                    )?;
                    log::debug!("connecting to {}", addr);
                    self.stream = Some(stream);
                    self.state = ConnectionState::Connecting;
                    return Ok(());
                }
                Err(e) => {
                    log::debug!("connect to {} failed: {}", addr, e);
                    last_err = e;
                }
            }
        }
        self.state = ConnectionState::Closed;
        Err(last_err)
    }

    /// Drop the current stream without touching pending addresses
    fn drop_stream(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = self.poll.registry().deregister(&mut stream);
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        self.state = ConnectionState::Closed;
    }

    /// Resolve a pending connect once the socket reports writable
    fn finish_connect(&mut self) -> io::Result<()> {
        let Some(stream) = self.stream.as_ref() else {
            return Ok(());
        };
        // Per mio: a connect is done when take_error is clear and peer_addr works
        if let Some(e) = stream.take_error()? {
            log::debug!("connect failed: {}", e);
            self.drop_stream();
            return self.connect_next().map_err(|_| e);
        }
        match stream.peer_addr() {
            Ok(addr) => {
                log::debug!("connected to {}", addr);
                self.state = ConnectionState::Open;
                Ok(())
            }
            Err(ref e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
            Err(e) => {
                log::debug!("connect failed: {}", e);
                self.drop_stream();
                self.connect_next().map_err(|_| e)
            }
        }
    }

    /// Wait for any event on the stream; returns whether one fired
    fn poll_once(&mut self, timeout: Duration) -> io::Result<bool> {
        match self.poll.poll(&mut self.events, Some(timeout)) {
            Ok(()) => Ok(self.events.iter().any(|ev| ev.token() == STREAM)),
            Err(ref e) if e.kind() == io::ErrorKind::Interrupted => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl Transport for TcpTransport {
    fn connect(&mut self, host: &str, port: u16) -> io::Result<()> {
        self.drop_stream();
        let mut addrs: Vec<SocketAddr> = (host, port).to_socket_addrs()?.collect();
        // connect_next pops from the back
        addrs.reverse();
        self.pending = addrs;
        self.connect_next()
    }

    fn close(&mut self) {
        self.pending.clear();
        self.drop_stream();
    }

    fn state(&self) -> ConnectionState {
        self.state
    }

    fn write_and_flush(&mut self, bytes: &[u8]) -> io::Result<()> {
        let deadline = Instant::now() + WRITE_TIMEOUT;
        let mut off = 0;
        while off < bytes.len() {
            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
            match stream.write(&bytes[off..]) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => off += n,
                Err(ref e) if would_block(e) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(io::ErrorKind::TimedOut.into());
                    }
                    self.poll_once(deadline - now)?;
                }
                Err(e) => {
                    self.drop_stream();
                    return Err(e);
                }
            }
        }
        if let Some(stream) = self.stream.as_mut() {
            stream.flush()?;
        }
        Ok(())
    }

    fn read_available(&mut self, out: &mut BytesMut) -> io::Result<usize> {
        let Some(stream) = self.stream.as_mut() else {
            return Err(io::ErrorKind::NotConnected.into());
        };

        let mut tmp_buf = [0u8; READ_BUF];
        let mut total = 0;
        let mut eof = false;
        loop {
            match stream.read(&mut tmp_buf) {
                Ok(0) => {
                    eof = true;
                    break;
                }
                Ok(n) => {
                    out.extend_from_slice(&tmp_buf[..n]);
                    total += n;
                }
                Err(ref e) if would_block(e) => break,
                Err(e) => {
                    self.drop_stream();
                    return Err(e);
                }
            }
        }

        if eof {
            log::debug!("peer closed the connection");
            self.drop_stream();
            if total == 0 {
                return Err(io::ErrorKind::UnexpectedEof.into());
            }
        }
        Ok(total)
    }

    fn wait_ready(&mut self, timeout: Duration) -> io::Result<()> {
        if self.stream.is_none() {
            std::thread::sleep(timeout);
            return Ok(());
        }
        self.poll_once(timeout)?;
        // Events are edge-triggered, so re-check a pending connect on every wakeup
        if self.state == ConnectionState::Connecting {
            self.finish_connect()?;
        }
        Ok(())
    }
}

/// Create a non-blocking TCP socket and start connecting it
///
/// Uses socket2 to set TCP_NODELAY and keepalive before handing the socket to
/// mio. The connect normally returns `EINPROGRESS`; completion is observed
/// through the poller.
pub fn connect_nonblocking(addr: SocketAddr) -> io::Result<TcpStream> {
    let domain = match addr {
        SocketAddr::V4(_) => Domain::IPV4,
        SocketAddr::V6(_) => Domain::IPV6,
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_nodelay(true)?;
    socket.set_tcp_keepalive(&TcpKeepalive::new().with_time(Duration::from_secs(60)))?;
    socket.set_nonblocking(true)?;

    match socket.connect(&addr.into()) {
        Ok(()) => {}
        Err(ref e) if in_progress(e) => {}
        Err(e) => return Err(e),
    }

    let std_stream: std::net::TcpStream = socket.into();
    Ok(TcpStream::from_std(std_stream))
}

/// Check if an I/O error indicates the operation would block
#[inline]
fn would_block(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

#[inline]
fn in_progress(e: &io::Error) -> bool {
    #[cfg(unix)]
    if e.raw_os_error() == Some(libc::EINPROGRESS) {
        return true;
    }
    e.kind() == io::ErrorKind::WouldBlock
}
