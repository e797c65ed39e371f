//! # framecast-core
//!
//! Protocol and session library for framecast: periodic screen
//! captures streamed from one host to N viewers over TCP, with viewer
//! keyboard input relayed back for remote control.
//!
//! This crate contains:
//! - **Frame model**: [`RawFrame`], [`PixelFormat`], [`WindowHandle`]
//! - **Collaborator seams**: [`FrameSource`], [`InputInjector`]
//! - **Encoding**: [`FrameEncoder`] / [`FrameDecoder`] (zstd still images)
//! - **Wire codecs**: [`FrameCodec`] (length-prefixed image stream),
//!   [`EventCodec`] (tagged keyboard events)
//! - **Host side**: [`BroadcastSession`] + [`ClientConnection`]
//! - **Viewer side**: [`ViewerSession`] + [`EventSender`]
//! - **Error**: [`CastError`] — typed, `thiserror`-based hierarchy
//!
//! ```text
//! HOST                                         VIEWER
//! ┌──────────────────────────────┐            ┌───────────────────────┐
//! │ FrameSource                  │            │ ViewerSession::accept │
//! │   ↓ capture loop (paced)     │            │   ↓                   │
//! │ per-client queue ×N          │  TCP ×N    │ FrameCodec de-framer  │
//! │   ↓ sender task              │ ─────────► │   ↓                   │
//! │ FrameEncoder → FrameCodec    │            │ FrameDecoder → UI     │
//! └──────────────────────────────┘            └───────────────────────┘
//!
//! Input: viewer EventSender ──[KeyboardEvent]──► host InputInjector
//! ```

pub mod broadcast;
pub mod client;
pub mod codec;
pub mod encoder;
pub mod error;
pub mod event;
pub mod frame;
pub mod inject;
pub mod source;
pub mod viewer;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use broadcast::{BroadcastSession, SessionConfig, SessionHandle};
pub use client::{ClientConnection, ClientTuning, FrameOffer};
pub use codec::{EventCodec, FrameCodec, MAX_FRAME_SIZE};
pub use encoder::{EncodedFrame, FrameDecoder, FrameEncoder, IMAGE_HEADER_SIZE};
pub use error::CastError;
pub use event::{KEYBOARD_TAG, KeyboardEvent};
pub use frame::{PixelFormat, RawFrame, WindowHandle};
pub use inject::{InputInjector, NullInjector};
pub use source::{FrameSource, TestPatternSource};
pub use viewer::{EventSender, ViewerConnection, ViewerSession};
