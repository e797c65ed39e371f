//! Viewer-side session: frame de-framing and the reverse channel.
//!
//! A [`ViewerSession`] binds and listens once and accepts one inbound
//! host connection at a time (one simultaneous host per viewer — a
//! documented limitation, kept). Each accepted connection yields a
//! lazy sequence of decoded frames via [`ViewerConnection::next_frame`]
//! and a cloneable [`EventSender`] that writes keyboard events back
//! over the same socket.

use std::net::SocketAddr;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info};

use crate::codec::{EventCodec, FrameCodec};
use crate::encoder::FrameDecoder;
use crate::error::CastError;
use crate::event::KeyboardEvent;
use crate::frame::RawFrame;

// ── ViewerSession ────────────────────────────────────────────────

/// Listens for one inbound host connection.
pub struct ViewerSession {
    listener: TcpListener,
}

impl ViewerSession {
    /// Bind the listening socket on all interfaces.
    pub async fn bind(port: u16) -> Result<Self, CastError> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        info!(addr = %listener.local_addr()?, "viewer listening");
        Ok(Self { listener })
    }

    /// The bound local address (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr, CastError> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept the next host connection.
    ///
    /// The frame sequence restarts per accepted connection; only one
    /// connection is serviced at a time.
    pub async fn accept(&self) -> Result<ViewerConnection, CastError> {
        let (stream, peer) = self.listener.accept().await?;
        info!(%peer, "host connected");
        Ok(ViewerConnection::new(stream, peer))
    }
}

// ── ViewerConnection ─────────────────────────────────────────────

/// One accepted host connection: inbound frames, outbound events.
pub struct ViewerConnection {
    peer: SocketAddr,
    frames: FramedRead<OwnedReadHalf, FrameCodec>,
    decoder: FrameDecoder,
    event_tx: mpsc::Sender<KeyboardEvent>,
    writer_task: JoinHandle<()>,
    finished: bool,
}

impl ViewerConnection {
    fn new(stream: TcpStream, peer: SocketAddr) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (event_tx, event_rx) = mpsc::channel(64);
        let writer_task = tokio::spawn(event_writer(write_half, event_rx));

        Self {
            peer,
            frames: FramedRead::new(read_half, FrameCodec::new()),
            decoder: FrameDecoder::new(),
            event_tx,
            writer_task,
            finished: false,
        }
    }

    /// The connected host's address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Next raw encoded payload off the wire.
    ///
    /// `None` means the host closed the stream cleanly; a truncated
    /// trailing frame surfaces as `Err(TruncatedFrame)` exactly once.
    /// After either, the sequence stays terminated.
    pub async fn next_encoded(&mut self) -> Option<Result<Bytes, CastError>> {
        if self.finished {
            return None;
        }
        match self.frames.next().await {
            None => {
                debug!(peer = %self.peer, "frame stream ended");
                self.finished = true;
                None
            }
            Some(Ok(payload)) => Some(Ok(payload)),
            Some(Err(e)) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }

    /// Next decoded frame — the lazy sequence the UI consumes.
    ///
    /// A malformed payload terminates the connection with the error
    /// surfaced, per the framing-error contract.
    pub async fn next_frame(&mut self) -> Option<Result<RawFrame, CastError>> {
        let payload = match self.next_encoded().await? {
            Ok(payload) => payload,
            Err(e) => return Some(Err(e)),
        };
        match self.decoder.decode(&payload) {
            Ok(frame) => Some(Ok(frame)),
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }

    /// Cloneable handle for sending local key transitions back to
    /// the host.
    pub fn event_sender(&self) -> EventSender {
        EventSender {
            tx: self.event_tx.clone(),
        }
    }
}

impl Drop for ViewerConnection {
    fn drop(&mut self) {
        self.writer_task.abort();
    }
}

// ── EventSender ──────────────────────────────────────────────────

/// Sends keyboard events to the connected host.
///
/// Cloneable; all clones feed the same writer task, so events keep
/// the order they were sent in.
#[derive(Clone)]
pub struct EventSender {
    tx: mpsc::Sender<KeyboardEvent>,
}

impl EventSender {
    /// Queue one key transition for transmission.
    ///
    /// Auto-repeat release events are filtered here and never reach
    /// the wire.
    pub async fn send(&self, event: KeyboardEvent) -> Result<(), CastError> {
        if !event.should_transmit() {
            debug!(key_code = event.key_code, "suppressing auto-repeat release");
            return Ok(());
        }
        self.tx.send(event).await?;
        Ok(())
    }
}

/// Writer task: drains queued events into the socket's write half.
async fn event_writer(write_half: OwnedWriteHalf, mut event_rx: mpsc::Receiver<KeyboardEvent>) {
    let mut sink = FramedWrite::new(write_half, EventCodec::new());
    while let Some(event) = event_rx.recv().await {
        if let Err(e) = sink.send(event).await {
            debug!(error = %e, "event write failed; reverse channel closed");
            break;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
