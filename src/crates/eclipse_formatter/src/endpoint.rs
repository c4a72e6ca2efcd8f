//! Listening side of the protocol.
//!
//! A [`MessageEndpoint`] binds a local port, accepts a single formatter
//! connection on a background thread, acknowledges each frame, and answers
//! the termination sentinel with a goodbye. IDE integrations embed it to
//! receive live updates; the test suite uses it as the peer.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::{mpsc, Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::envelope::Envelope;
use crate::error::{FormatterError, FormatterResult};
use crate::frame::{self, AckCode, Frame, LENGTH_PREFIX_LEN};

/// How the endpoint answers application frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckMode {
    /// Reply `0x01` to every message.
    Acknowledge,
    /// Reply `0x01` until the n-th message, then `0x00`.
    GoodbyeAfter(usize),
    /// Never reply to messages.
    Silent,
    /// Reply with this raw byte to every message.
    Reply(u8),
    /// Close the connection after the first message without replying.
    HangUp,
}

/// A frame as observed by the endpoint, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum ReceivedFrame {
    Message { length: usize, envelope: Envelope },
    Terminate,
}

impl ReceivedFrame {
    pub fn envelope(&self) -> Option<&Envelope> {
        match self {
            ReceivedFrame::Message { envelope, .. } => Some(envelope),
            ReceivedFrame::Terminate => None,
        }
    }
}

/// Bound listener waiting to be started.
#[derive(Debug)]
pub struct MessageEndpoint {
    listener: TcpListener,
    local_addr: SocketAddr,
    ack_mode: AckMode,
    accept_timeout: Duration,
    read_timeout: Duration,
}

impl MessageEndpoint {
    /// Bind an ephemeral port on the loopback interface.
    pub fn bind() -> FormatterResult<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            ack_mode: AckMode::Acknowledge,
            accept_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(5),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn port(&self) -> u16 {
        self.local_addr.port()
    }

    pub fn with_ack_mode(mut self, mode: AckMode) -> Self {
        self.ack_mode = mode;
        self
    }

    /// Bound the wait for the formatter to connect.
    pub fn with_accept_timeout(mut self, timeout: Duration) -> Self {
        self.accept_timeout = timeout;
        self
    }

    /// Bound each read from the connected formatter.
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Accept and serve one connection on a background thread.
    pub fn start(self) -> EndpointHandle {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let gate = Arc::new(SuspendGate::default());
        let (envelope_tx, envelope_rx) = mpsc::channel();
        let worker_frames = frames.clone();
        let worker_gate = gate.clone();

        let worker = thread::spawn(move || {
            let result = self.serve(&worker_frames, &worker_gate, &envelope_tx);
            if let Err(err) = &result {
                warn!(port = self.local_addr.port(), error = %err, "endpoint stopped with error");
            }
            result
        });

        EndpointHandle {
            frames,
            gate,
            envelope_rx,
            worker: Some(worker),
        }
    }

    fn serve(
        &self,
        frames: &Arc<Mutex<Vec<ReceivedFrame>>>,
        gate: &SuspendGate,
        envelope_tx: &mpsc::Sender<Envelope>,
    ) -> FormatterResult<()> {
        let mut stream = self.accept()?;
        stream.set_nonblocking(false)?;
        stream.set_read_timeout(Some(self.read_timeout))?;

        let mut handled = 0usize;
        while let Some((length, frame)) = read_frame(&mut stream)? {
            match frame {
                Frame::Terminate => {
                    debug!("received termination sentinel");
                    record(frames, ReceivedFrame::Terminate);
                    write_ack(&mut stream, AckCode::Goodbye)?;
                    break;
                }
                Frame::Message(envelope) => {
                    gate.wait_while_suspended()?;
                    handled += 1;
                    debug!(kind = envelope.kind(), length, "received message");
                    record(
                        frames,
                        ReceivedFrame::Message {
                            length,
                            envelope: envelope.clone(),
                        },
                    );
                    let _ = envelope_tx.send(envelope);

                    match self.ack_mode {
                        AckMode::Acknowledge => write_ack(&mut stream, AckCode::Continue)?,
                        AckMode::GoodbyeAfter(limit) if handled >= limit => {
                            write_ack(&mut stream, AckCode::Goodbye)?
                        }
                        AckMode::GoodbyeAfter(_) => write_ack(&mut stream, AckCode::Continue)?,
                        AckMode::Silent => {}
                        AckMode::Reply(byte) => {
                            stream.write_all(&[byte])?;
                            stream.flush()?;
                        }
                        AckMode::HangUp => {
                            debug!("hanging up without acknowledging");
                            break;
                        }
                    }
                }
            }
        }

        Ok(())
    }

    fn accept(&self) -> FormatterResult<TcpStream> {
        self.listener.set_nonblocking(true)?;
        let start = Instant::now();
        while start.elapsed() < self.accept_timeout {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    debug!(%peer, "formatter connected");
                    return Ok(stream);
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    thread::sleep(Duration::from_millis(10));
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(FormatterError::Io(io::Error::new(
            ErrorKind::TimedOut,
            format!("no formatter connected within {:?}", self.accept_timeout),
        )))
    }
}

/// Holds back message handling while the endpoint is suspended.
#[derive(Debug, Default)]
struct SuspendGate {
    suspended: Mutex<bool>,
    resumed: Condvar,
}

impl SuspendGate {
    fn set(&self, suspended: bool) {
        if let Ok(mut guard) = self.suspended.lock() {
            *guard = suspended;
        }
        self.resumed.notify_all();
    }

    fn wait_while_suspended(&self) -> FormatterResult<()> {
        let guard = self
            .suspended
            .lock()
            .map_err(|_| FormatterError::EndpointPanicked)?;
        let _guard = self
            .resumed
            .wait_while(guard, |suspended| *suspended)
            .map_err(|_| FormatterError::EndpointPanicked)?;
        Ok(())
    }
}

/// Running endpoint plus the frames it has observed so far.
pub struct EndpointHandle {
    frames: Arc<Mutex<Vec<ReceivedFrame>>>,
    gate: Arc<SuspendGate>,
    envelope_rx: mpsc::Receiver<Envelope>,
    worker: Option<thread::JoinHandle<FormatterResult<()>>>,
}

impl EndpointHandle {
    /// Wait for the next message envelope, in arrival order.
    pub fn next_envelope(&self, timeout: Duration) -> Option<Envelope> {
        self.envelope_rx.recv_timeout(timeout).ok()
    }

    /// Stop handling messages; the formatter blocks on its acknowledgment
    /// until [`EndpointHandle::resume`].
    pub fn suspend(&self) {
        self.gate.set(true);
    }

    pub fn resume(&self) {
        self.gate.set(false);
    }

    /// Snapshot of every frame received so far.
    pub fn frames(&self) -> Vec<ReceivedFrame> {
        self.frames
            .lock()
            .map(|frames| frames.clone())
            .unwrap_or_default()
    }

    /// Wait for the connection to end and return every frame received.
    pub fn join(mut self) -> FormatterResult<Vec<ReceivedFrame>> {
        if let Some(worker) = self.worker.take() {
            worker
                .join()
                .map_err(|_| FormatterError::EndpointPanicked)??;
        }
        Ok(self.frames())
    }
}

impl Drop for EndpointHandle {
    fn drop(&mut self) {
        self.resume();
    }
}

fn record(frames: &Arc<Mutex<Vec<ReceivedFrame>>>, frame: ReceivedFrame) {
    if let Ok(mut guard) = frames.lock() {
        guard.push(frame);
    }
}

/// Read one frame, returning `None` when the peer closed the stream.
fn read_frame<R: Read>(reader: &mut R) -> FormatterResult<Option<(usize, Frame)>> {
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];
    match reader.read_exact(&mut prefix) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    }

    let length = frame::payload_len(prefix);
    let mut payload = vec![0u8; length];
    match reader.read_exact(&mut payload) {
        Ok(()) => {}
        Err(err) if err.kind() == ErrorKind::UnexpectedEof => {
            return Err(FormatterError::ConnectionClosed)
        }
        Err(err) => return Err(err.into()),
    }

    Ok(Some((length, frame::decode_payload(&payload)?)))
}

fn write_ack<W: Write>(writer: &mut W, ack: AckCode) -> FormatterResult<()> {
    if let Some(byte) = ack.byte() {
        writer.write_all(&[byte])?;
        writer.flush()?;
    }
    Ok(())
}
