//! Domain-specific error types for the framecast protocol.
//!
//! All fallible operations return `Result<T, CastError>`.
//! No panics on invalid input — every error is typed, and each
//! variant maps to a blast radius: connect/transmit errors kill one
//! client, framing errors kill one viewer connection, capture errors
//! kill the whole session, decode errors kill nothing.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for the framecast protocol.
#[derive(Debug, Error)]
pub enum CastError {
    // ── Client-scoped errors ─────────────────────────────────────
    /// Could not establish the outbound socket to one viewer.
    /// Fatal to that client only.
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        source: std::io::Error,
    },

    /// A socket write failed mid-stream. Tears down that client's
    /// sender/receiver pair only.
    #[error("transmit failed: {0}")]
    Transmit(std::io::Error),

    /// A viewer address was registered twice. Exactly one connection
    /// may exist per address.
    #[error("client already registered: {0}")]
    AlreadyRegistered(String),

    // ── Framing errors ───────────────────────────────────────────
    /// A frame's declared length exceeds the codec limit.
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    /// The stream ended with a partial frame still pending.
    #[error("truncated frame: stream ended with {pending} bytes buffered")]
    TruncatedFrame { pending: usize },

    // ── Decode errors ────────────────────────────────────────────
    /// An encoded image payload was malformed.
    #[error("bad frame payload: {0}")]
    BadFramePayload(&'static str),

    /// An event payload was malformed (the tag itself was known).
    #[error("bad event payload: {0}")]
    BadEventPayload(&'static str),

    // ── Capture errors ───────────────────────────────────────────
    /// The frame source failed. Fatal to the whole broadcast session.
    #[error("capture failed: {0}")]
    Capture(String),

    // ── Plumbing errors ──────────────────────────────────────────
    /// A channel between tasks was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    /// An operation exceeded its deadline.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Io(#[from] std::io::Error),
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for CastError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        CastError::ChannelClosed
    }
}
