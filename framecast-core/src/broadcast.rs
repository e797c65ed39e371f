//! Host-side broadcast session.
//!
//! Owns the capture cadence: every tick the loop pulls one
//! [`RawFrame`] from the source, wraps it in an `Arc`, and offers the
//! same allocation to every registered client's queue. Clients encode
//! and transmit at their own pace; a slow or dead client never stalls
//! the loop or its peers.
//!
//! Queues are bounded. A full queue drops that tick's frame for that
//! client; enough consecutive drops evicts the client (see
//! [`ClientTuning`]).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::client::{ClientConnection, ClientTuning, FrameOffer};
use crate::error::CastError;
use crate::frame::{RawFrame, WindowHandle};
use crate::inject::InputInjector;
use crate::source::FrameSource;

// ── SessionConfig ────────────────────────────────────────────────

/// Configuration for [`BroadcastSession`].
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Target capture rate (1..=60 frames per second).
    pub target_fps: u8,
    /// Per-client queue and timeout tuning.
    pub client: ClientTuning,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target_fps: 30,
            client: ClientTuning::default(),
        }
    }
}

impl SessionConfig {
    fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.target_fps.clamp(1, 60) as f64)
    }
}

// ── SessionHandle ────────────────────────────────────────────────

/// Cloneable handle for registering viewers and stopping the session
/// while the capture loop runs.
#[derive(Clone)]
pub struct SessionHandle {
    clients: Arc<Mutex<Vec<ClientConnection>>>,
    running: Arc<AtomicBool>,
    config: SessionConfig,
    injector: Arc<dyn InputInjector>,
    window: WindowHandle,
}

impl SessionHandle {
    /// Register a viewer address, before or after the loop starts.
    ///
    /// Spawns the client's sender/receiver pair immediately; the
    /// socket itself is connected lazily by the sender task. The
    /// client only ever sees frames captured after this call.
    pub fn register(&self, host: &str, port: u16) -> Result<(), CastError> {
        let mut clients = self.clients.lock().expect("client list poisoned");
        let addr = format!("{host}:{port}");
        if clients.iter().any(|c| c.addr() == addr) {
            return Err(CastError::AlreadyRegistered(addr));
        }

        info!(%addr, "viewer registered");
        clients.push(ClientConnection::spawn(
            host,
            port,
            &self.config.client,
            Arc::clone(&self.injector),
            self.window,
        ));
        Ok(())
    }

    /// Number of live registered clients.
    pub fn client_count(&self) -> usize {
        self.clients.lock().expect("client list poisoned").len()
    }

    /// Signal the capture loop to stop. [`BroadcastSession::run`]
    /// tears down and joins every client before it returns.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Whether the capture loop is currently running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

// ── BroadcastSession ─────────────────────────────────────────────

/// Captures frames at a target rate and fans them out to every
/// registered viewer.
pub struct BroadcastSession<S: FrameSource> {
    source: S,
    handle: SessionHandle,
}

impl<S: FrameSource> BroadcastSession<S> {
    /// Create a session over the given source and injector.
    pub fn new(source: S, injector: Arc<dyn InputInjector>, config: SessionConfig) -> Self {
        let window = source.window();
        Self {
            source,
            handle: SessionHandle {
                clients: Arc::new(Mutex::new(Vec::new())),
                running: Arc::new(AtomicBool::new(false)),
                config,
                injector,
                window,
            },
        }
    }

    /// A handle for registering viewers and stopping the loop from
    /// other tasks.
    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Register a viewer address before the loop starts.
    pub fn register(&self, host: &str, port: u16) -> Result<(), CastError> {
        self.handle.register(host, port)
    }

    /// Run the capture loop until stopped or the source fails.
    ///
    /// Each tick captures one frame, offers it to every client, then
    /// sleeps for the remainder of the tick interval (capture and
    /// dispatch time is compensated, unlike the flat sleep the
    /// original scheme used). A source error is fatal: all clients
    /// are torn down and the error is returned.
    pub async fn run(&mut self) -> Result<(), CastError> {
        self.handle.running.store(true, Ordering::SeqCst);
        let interval = self.handle.config.tick_interval();
        info!(fps = self.handle.config.target_fps, "broadcast started");

        while self.handle.running.load(Ordering::SeqCst) {
            let tick_start = Instant::now();

            let raw = match self.source.capture() {
                Ok(raw) => raw,
                Err(e) => {
                    // No frame source means nothing to broadcast.
                    self.handle.running.store(false, Ordering::SeqCst);
                    self.teardown_clients().await;
                    return Err(e);
                }
            };

            for client in self.fan_out(Arc::new(raw)) {
                client.shutdown().await;
            }
            Self::pace(tick_start, interval).await;
        }

        self.teardown_clients().await;
        info!("broadcast stopped");
        Ok(())
    }

    /// Offer one frame to every client; dead clients come back to the
    /// caller, which joins their tasks outside the lock.
    fn fan_out(&self, frame: Arc<RawFrame>) -> Vec<ClientConnection> {
        let mut clients = self.handle.clients.lock().expect("client list poisoned");
        let mut removed = Vec::new();
        let mut i = 0;
        while i < clients.len() {
            match clients[i].offer_frame(&frame) {
                FrameOffer::Delivered | FrameOffer::Dropped => i += 1,
                FrameOffer::Evicted => removed.push(clients.swap_remove(i)),
                FrameOffer::Closed => {
                    warn!(addr = %clients[i].addr(), "viewer gone; removing");
                    removed.push(clients.swap_remove(i));
                }
            }
        }
        removed
    }

    /// Sentinel-stop every client and join their tasks.
    async fn teardown_clients(&self) {
        let drained: Vec<ClientConnection> = {
            let mut clients = self.handle.clients.lock().expect("client list poisoned");
            clients.drain(..).collect()
        };
        for client in drained {
            client.shutdown().await;
        }
    }

    /// Sleep for the remainder of the tick interval.
    async fn pace(tick_start: Instant, interval: Duration) {
        let elapsed = tick_start.elapsed();
        if elapsed < interval {
            tokio::time::sleep(interval - elapsed).await;
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::WindowHandle;
    use crate::inject::NullInjector;
    use crate::source::TestPatternSource;

    fn session(fps: u8) -> BroadcastSession<TestPatternSource> {
        BroadcastSession::new(
            TestPatternSource::new(WindowHandle(7), 16, 16),
            Arc::new(NullInjector),
            SessionConfig {
                target_fps: fps,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn duplicate_registration_rejected() {
        let session = session(30);
        session.register("127.0.0.1", 40000).unwrap();
        assert!(matches!(
            session.register("127.0.0.1", 40000),
            Err(CastError::AlreadyRegistered(_))
        ));
        assert_eq!(session.handle().client_count(), 1);
    }

    #[tokio::test]
    async fn stop_without_clients_returns_cleanly() {
        let mut session = session(60);
        let handle = session.handle();

        let run = tokio::spawn(async move { session.run().await });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(handle.is_running());
        handle.stop();

        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("run did not stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn dead_client_is_removed_and_joined() {
        let mut session = session(60);
        // Nothing listens on port 1, so the client's tasks end fast
        // and the next offer sees a closed queue.
        session.register("127.0.0.1", 1).unwrap();
        let handle = session.handle();

        let run = tokio::spawn(async move { session.run().await });

        let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
        while handle.client_count() > 0 {
            assert!(
                tokio::time::Instant::now() < deadline,
                "dead client never removed"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(handle.is_running());

        handle.stop();
        tokio::time::timeout(Duration::from_secs(5), run)
            .await
            .expect("run did not stop")
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn source_failure_is_fatal() {
        struct FailingSource;
        impl FrameSource for FailingSource {
            fn capture(&mut self) -> Result<RawFrame, CastError> {
                Err(CastError::Capture("window closed".into()))
            }
            fn window(&self) -> WindowHandle {
                WindowHandle(0)
            }
        }

        let mut session = BroadcastSession::new(
            FailingSource,
            Arc::new(NullInjector),
            SessionConfig::default(),
        );
        let result = session.run().await;
        assert!(matches!(result, Err(CastError::Capture(_))));
        assert!(!session.handle().is_running());
    }
}
