//! Input injection seam.
//!
//! The host replays viewer keyboard events into the captured window.
//! OS-level injection (`SendInput`, `PostMessage`, …) lives outside
//! this crate; the receiver task only needs a fire-and-forget sink.
//! Injection failures are logged and never fatal to the session.

use crate::frame::WindowHandle;

// ── InputInjector ────────────────────────────────────────────────

/// Replays a key transition into the captured window.
///
/// Implementations must be callable from the per-client receiver
/// tasks concurrently.
pub trait InputInjector: Send + Sync {
    /// Inject a key-down (`key_down == true`) or key-up transition.
    ///
    /// Must not return an error: failures are the implementation's
    /// to log, and must never tear down the connection.
    fn inject(&self, window: WindowHandle, key_code: i32, key_down: bool);
}

// ── NullInjector ─────────────────────────────────────────────────

/// Logs events instead of injecting them.
///
/// Used by the stock host binary (real injection is an external
/// collaborator) and by tests that only care about delivery.
#[derive(Debug, Default)]
pub struct NullInjector;

impl InputInjector for NullInjector {
    fn inject(&self, window: WindowHandle, key_code: i32, key_down: bool) {
        tracing::debug!(
            window = window.0,
            key_code,
            key_down,
            "key event (not injected)"
        );
    }
}

// ── Tests ────────────────────────────────────────────────────────
