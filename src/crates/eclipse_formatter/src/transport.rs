use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::FormatterConfig;
use crate::envelope::Envelope;
use crate::error::{FormatterError, FormatterResult};
use crate::frame::{self, AckCode};

/// Lifecycle of a [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Closed,
}

/// Best-effort TCP session to the local IDE listener.
///
/// Every fault after construction is logged and moves the session to
/// [`SessionState::Closed`]; from then on `send` and `close` do nothing.
#[derive(Debug)]
pub struct Transport {
    port: u16,
    ack_timeout: Duration,
    stream: Option<TcpStream>,
    state: SessionState,
}

impl Transport {
    /// Connect to `localhost:<port>` once, bounded by the configured timeout.
    ///
    /// A failed connect yields a detached session rather than an error, so
    /// the surrounding test run is never affected.
    pub fn connect(config: &FormatterConfig) -> Self {
        let mut transport = Self {
            port: config.port,
            ack_timeout: config.ack_timeout,
            stream: None,
            state: SessionState::Disconnected,
        };

        transport.state = SessionState::Connecting;
        let opened = open_stream(config.port, config.connect_timeout)
            .and_then(|stream| transport.apply_timeouts(stream));
        match opened {
            Ok(stream) => {
                info!(port = config.port, "connected to message listener");
                transport.stream = Some(stream);
                transport.state = SessionState::Connected;
            }
            Err(err) => {
                warn!(
                    port = config.port,
                    error = %err,
                    "failed to connect to message listener; test events will not be reported"
                );
                transport.state = SessionState::Closed;
            }
        }

        transport
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Bound on each acknowledgment read and frame write; zero means unbounded.
    pub fn ack_timeout(&self) -> Duration {
        self.ack_timeout
    }

    /// Send one envelope and wait for its acknowledgment.
    ///
    /// A goodbye from the peer triggers the termination handshake; a missing
    /// acknowledgment or any fault drops the connection. Nothing is returned
    /// to the caller in either case.
    pub fn send(&mut self, envelope: &Envelope) {
        if !self.is_alive() {
            return;
        }

        match self.exchange(envelope) {
            Ok(AckCode::Continue) => {}
            Ok(AckCode::Goodbye) => {
                info!(port = self.port, "listener said goodbye; closing session");
                self.close();
            }
            Ok(AckCode::None) => {
                warn!(
                    port = self.port,
                    kind = envelope.kind(),
                    "listener did not acknowledge message; disabling reporting"
                );
                self.release();
            }
            Err(err) => {
                warn!(
                    port = self.port,
                    kind = envelope.kind(),
                    error = %err,
                    "error sending message; disabling reporting"
                );
                self.release();
            }
        }
    }

    /// Send the termination sentinel, read the final byte, and drop the socket.
    ///
    /// Idempotent. The session is closed afterwards regardless of how the
    /// handshake went.
    pub fn close(&mut self) {
        if !self.is_alive() {
            self.release();
            return;
        }

        match self.goodbye_handshake() {
            Ok(AckCode::Goodbye) => info!(port = self.port, "session closed"),
            Ok(ack) => debug!(port = self.port, ?ack, "session closed without goodbye"),
            Err(err) => debug!(port = self.port, error = %err, "goodbye handshake failed"),
        }
        self.release();
    }

    fn exchange(&mut self, envelope: &Envelope) -> FormatterResult<AckCode> {
        let framed = frame::encode(envelope)?;
        let stream = self.stream.as_mut().ok_or(FormatterError::ConnectionClosed)?;
        write_framed(stream, &framed)?;
        let ack = read_ack(stream)?;
        debug!(
            kind = envelope.kind(),
            bytes = framed.len(),
            ?ack,
            "message acknowledged"
        );
        Ok(ack)
    }

    fn goodbye_handshake(&mut self) -> FormatterResult<AckCode> {
        let stream = self.stream.as_mut().ok_or(FormatterError::ConnectionClosed)?;
        write_framed(stream, &frame::terminate_frame())?;
        Ok(read_ack(stream)?)
    }

    fn apply_timeouts(&self, stream: TcpStream) -> io::Result<TcpStream> {
        stream.set_read_timeout(bounded(self.ack_timeout))?;
        stream.set_write_timeout(bounded(self.ack_timeout))?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    fn release(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(Shutdown::Both);
        }
        self.state = SessionState::Closed;
    }
}

fn open_stream(port: u16, connect_timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in ("localhost", port).to_socket_addrs()? {
        let attempt = match bounded(connect_timeout) {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
            None => TcpStream::connect(addr),
        };
        match attempt {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                debug!(%addr, error = %err, "connect attempt failed");
                last_err = Some(err);
            }
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(ErrorKind::AddrNotAvailable, "localhost did not resolve")
    }))
}

/// Zero disables the bound; the socket APIs reject a zero duration.
fn bounded(timeout: Duration) -> Option<Duration> {
    (!timeout.is_zero()).then_some(timeout)
}

fn write_framed(stream: &mut TcpStream, framed: &[u8]) -> io::Result<()> {
    stream.write_all(framed)?;
    stream.flush()
}

/// Read one acknowledgment byte; end of stream decodes as [`AckCode::None`].
fn read_ack(stream: &mut TcpStream) -> io::Result<AckCode> {
    let mut buf = [0u8; 1];
    loop {
        match stream.read(&mut buf) {
            Ok(0) => return Ok(frame::decode_ack(None)),
            Ok(_) => return Ok(frame::decode_ack(Some(buf[0]))),
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err),
        }
    }
}
