//! One outbound connection to one viewer.
//!
//! Each registered viewer owns a bounded frame queue and two tasks
//! sharing one socket:
//!
//! - **sender**: connects lazily, then dequeues raw frames, encodes
//!   them, and writes length-prefixed payloads (write side only);
//! - **receiver**: waits for the sender to hand over the read half,
//!   then decodes keyboard events and forwards them to the
//!   [`InputInjector`] (read side only).
//!
//! The read half travels through a `oneshot` — the receiver never
//! polls for socket readiness. A `CancellationToken` ties the pair
//! together: either task failing takes the other down, and nothing
//! escapes to the rest of the session.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedReadHalf;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::codec::{EventCodec, FrameCodec};
use crate::encoder::FrameEncoder;
use crate::error::CastError;
use crate::frame::{RawFrame, WindowHandle};
use crate::inject::InputInjector;

// ── ClientTuning ─────────────────────────────────────────────────

/// Per-client limits and timeouts.
#[derive(Debug, Clone)]
pub struct ClientTuning {
    /// Frames buffered per client before ticks start missing.
    pub queue_depth: usize,
    /// Consecutive missed ticks before the client is evicted.
    pub max_missed_ticks: u32,
    /// Deadline for establishing the outbound socket.
    pub connect_timeout: Duration,
    /// Deadline for one frame write.
    pub write_timeout: Duration,
    /// zstd level for this client's encoder (1..=19).
    pub compression_level: i32,
}

impl Default for ClientTuning {
    fn default() -> Self {
        Self {
            queue_depth: 32,
            max_missed_ticks: 120,
            connect_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            compression_level: 1,
        }
    }
}

// ── FrameOffer ───────────────────────────────────────────────────

/// Outcome of offering one tick's frame to a client queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameOffer {
    /// Queued for transmission.
    Delivered,
    /// Queue full — frame dropped for this client, tick missed.
    Dropped,
    /// Too many consecutive misses — client evicted.
    Evicted,
    /// The client's tasks already ended (connect failure, peer gone).
    Closed,
}

// ── ClientConnection ─────────────────────────────────────────────

/// Queue message: `None` is the shutdown sentinel.
type FrameMsg = Option<Arc<RawFrame>>;

/// Host-side handle for one viewer connection.
pub struct ClientConnection {
    addr: String,
    frame_tx: mpsc::Sender<FrameMsg>,
    cancel: CancellationToken,
    sender_task: JoinHandle<()>,
    receiver_task: JoinHandle<()>,
    missed_ticks: u32,
    max_missed_ticks: u32,
}

impl ClientConnection {
    /// Spawn the sender/receiver pair for a registered viewer.
    ///
    /// The socket is not connected here: the sender task establishes
    /// it on first run, so registration never blocks.
    pub fn spawn(
        host: &str,
        port: u16,
        tuning: &ClientTuning,
        injector: Arc<dyn InputInjector>,
        window: WindowHandle,
    ) -> Self {
        let addr = format!("{host}:{port}");
        let (frame_tx, frame_rx) = mpsc::channel(tuning.queue_depth);
        let (read_half_tx, read_half_rx) = oneshot::channel();
        let cancel = CancellationToken::new();

        let sender_task = tokio::spawn(sender_loop(
            addr.clone(),
            frame_rx,
            read_half_tx,
            cancel.clone(),
            tuning.clone(),
        ));
        let receiver_task = tokio::spawn(receiver_loop(
            addr.clone(),
            read_half_rx,
            cancel.clone(),
            injector,
            window,
        ));

        Self {
            addr,
            frame_tx,
            cancel,
            sender_task,
            receiver_task,
            missed_ticks: 0,
            max_missed_ticks: tuning.max_missed_ticks,
        }
    }

    /// The `host:port` this connection targets.
    pub fn addr(&self) -> &str {
        &self.addr
    }

    /// Offer one tick's frame. Never blocks the capture loop.
    pub(crate) fn offer_frame(&mut self, frame: &Arc<RawFrame>) -> FrameOffer {
        use mpsc::error::TrySendError;

        match self.frame_tx.try_send(Some(Arc::clone(frame))) {
            Ok(()) => {
                self.missed_ticks = 0;
                FrameOffer::Delivered
            }
            Err(TrySendError::Full(_)) => {
                self.missed_ticks += 1;
                if self.missed_ticks >= self.max_missed_ticks {
                    warn!(
                        addr = %self.addr,
                        missed = self.missed_ticks,
                        "viewer stalled; evicting"
                    );
                    self.cancel.cancel();
                    FrameOffer::Evicted
                } else {
                    FrameOffer::Dropped
                }
            }
            Err(TrySendError::Closed(_)) => FrameOffer::Closed,
        }
    }

    /// Enqueue the shutdown sentinel, cancel the receiver, and join
    /// both tasks.
    pub(crate) async fn shutdown(self) {
        // Sentinel lets the sender drain queued frames first; a full
        // or closed queue means the sender is already on its way out.
        let _ = self.frame_tx.try_send(None);
        self.cancel.cancel();
        let _ = self.sender_task.await;
        let _ = self.receiver_task.await;
        debug!(addr = %self.addr, "client torn down");
    }
}

// ── Sender task ──────────────────────────────────────────────────

async fn sender_loop(
    addr: String,
    mut frame_rx: mpsc::Receiver<FrameMsg>,
    read_half_tx: oneshot::Sender<OwnedReadHalf>,
    cancel: CancellationToken,
    tuning: ClientTuning,
) {
    // Lazy connect; failure isolates this client only.
    let stream = match timeout(tuning.connect_timeout, TcpStream::connect(&addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            let e = CastError::Connect {
                addr: addr.clone(),
                source: e,
            };
            error!(error = %e, "viewer connect failed");
            cancel.cancel();
            return;
        }
        Err(_) => {
            let e = CastError::Timeout(tuning.connect_timeout);
            error!(%addr, error = %e, "viewer connect timed out");
            cancel.cancel();
            return;
        }
    };
    info!(%addr, "viewer connected");

    let (read_half, write_half) = stream.into_split();
    if read_half_tx.send(read_half).is_err() {
        // Receiver already gone; no point streaming.
        cancel.cancel();
        return;
    }

    let mut sink = FramedWrite::new(write_half, FrameCodec::new());
    let mut encoder = FrameEncoder::new().with_level(tuning.compression_level);

    loop {
        let msg = tokio::select! {
            _ = cancel.cancelled() => break,
            msg = frame_rx.recv() => msg,
        };

        let frame = match msg {
            // Shutdown sentinel or closed queue: clean exit.
            None | Some(None) => break,
            Some(Some(frame)) => frame,
        };

        let encoded = match encoder.encode(&frame) {
            Ok(encoded) => encoded,
            Err(e) => {
                error!(%addr, error = %e, "frame encode failed");
                break;
            }
        };

        let written = tokio::select! {
            _ = cancel.cancelled() => break,
            written = timeout(tuning.write_timeout, sink.send(Bytes::from(encoded.data))) => written,
        };
        match written {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let e = match e {
                    CastError::Io(io) => CastError::Transmit(io),
                    other => other,
                };
                warn!(%addr, error = %e, "frame write failed; dropping viewer");
                break;
            }
            Err(_) => {
                let e = CastError::Timeout(tuning.write_timeout);
                warn!(%addr, error = %e, "frame write timed out; dropping viewer");
                break;
            }
        }
    }

    // Take the receiver down with us.
    cancel.cancel();
    debug!(%addr, frames = encoder.frame_count(), "sender exiting");
}

// ── Receiver task ────────────────────────────────────────────────

async fn receiver_loop(
    addr: String,
    read_half_rx: oneshot::Receiver<OwnedReadHalf>,
    cancel: CancellationToken,
    injector: Arc<dyn InputInjector>,
    window: WindowHandle,
) {
    // One-shot socket-ready signal from the sender. Cancelled before
    // it fires means the connect failed.
    let read_half = tokio::select! {
        _ = cancel.cancelled() => return,
        half = read_half_rx => match half {
            Ok(half) => half,
            Err(_) => return,
        },
    };

    let mut events = FramedRead::new(read_half, EventCodec::new());

    loop {
        let item = tokio::select! {
            _ = cancel.cancelled() => break,
            item = events.next() => item,
        };

        match item {
            // Zero-byte read: orderly peer close.
            None => {
                info!(%addr, "viewer closed the reverse channel");
                break;
            }
            Some(Ok(event)) => {
                injector.inject(window, event.key_code, event.key_down);
            }
            // Malformed payloads are absorbed inside the codec; an
            // error here is unrecoverable for this connection.
            Some(Err(e)) => {
                warn!(%addr, error = %e, "reverse channel failed");
                break;
            }
        }
    }

    cancel.cancel();
    debug!(%addr, "receiver exiting");
}

// ── Tests ────────────────────────────────────────────────────────
