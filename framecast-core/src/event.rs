//! Keyboard events travelling viewer → host.
//!
//! An event is transient: constructed when the viewer's UI reports a
//! local key transition, consumed on the host immediately after
//! decode. The `autorepeat` flag exists only on the viewer side —
//! auto-repeat releases are filtered before transmission and never
//! appear on the wire.

use crate::error::CastError;

/// Wire tag for a keyboard event message.
pub const KEYBOARD_TAG: u8 = 0x01;

// ── KeyboardEvent ────────────────────────────────────────────────

/// One key press or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyboardEvent {
    /// Platform key code as reported by the viewer UI.
    pub key_code: i32,
    /// `true` for press, `false` for release.
    pub key_down: bool,
    /// Whether the OS marked this transition as auto-repeat.
    /// Local-only; not part of the wire payload.
    pub autorepeat: bool,
}

impl KeyboardEvent {
    /// Fixed payload size after the tag byte.
    pub const PAYLOAD_SIZE: usize = 5;

    pub fn new(key_code: i32, key_down: bool) -> Self {
        Self {
            key_code,
            key_down,
            autorepeat: false,
        }
    }

    /// Mark this event as an OS auto-repeat transition.
    pub fn with_autorepeat(mut self, autorepeat: bool) -> Self {
        self.autorepeat = autorepeat;
        self
    }

    /// Whether this event belongs on the wire.
    ///
    /// Auto-repeat release events are noise from the OS repeat timer
    /// and are suppressed before encoding.
    pub fn should_transmit(&self) -> bool {
        !(self.autorepeat && !self.key_down)
    }

    /// Serialize the fixed payload (big-endian).
    pub fn to_payload(&self) -> [u8; Self::PAYLOAD_SIZE] {
        let mut buf = [0u8; Self::PAYLOAD_SIZE];
        buf[0..4].copy_from_slice(&self.key_code.to_be_bytes());
        buf[4] = self.key_down as u8;
        buf
    }

    /// Deserialize the fixed payload.
    pub fn from_payload(data: &[u8]) -> Result<Self, CastError> {
        if data.len() < Self::PAYLOAD_SIZE {
            return Err(CastError::BadEventPayload("keyboard payload too short"));
        }
        let key_down = match data[4] {
            0 => false,
            1 => true,
            _ => return Err(CastError::BadEventPayload("key_down must be 0 or 1")),
        };
        Ok(Self {
            key_code: i32::from_be_bytes(data[0..4].try_into().unwrap()),
            key_down,
            autorepeat: false,
        })
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_roundtrip() {
        let event = KeyboardEvent::new(65, true);
        let decoded = KeyboardEvent::from_payload(&event.to_payload()).unwrap();
        assert_eq!(decoded, event);
    }

    #[test]
    fn negative_key_code_roundtrip() {
        let event = KeyboardEvent::new(-1, false);
        let decoded = KeyboardEvent::from_payload(&event.to_payload()).unwrap();
        assert_eq!(decoded.key_code, -1);
        assert!(!decoded.key_down);
    }

    #[test]
    fn autorepeat_release_is_filtered() {
        let release = KeyboardEvent::new(65, false).with_autorepeat(true);
        assert!(!release.should_transmit());
    }

    #[test]
    fn autorepeat_press_still_transmits() {
        let press = KeyboardEvent::new(65, true).with_autorepeat(true);
        assert!(press.should_transmit());
    }

    #[test]
    fn plain_release_transmits() {
        assert!(KeyboardEvent::new(65, false).should_transmit());
    }

    #[test]
    fn bad_key_down_byte_rejected() {
        let mut payload = KeyboardEvent::new(1, true).to_payload();
        payload[4] = 2;
        assert!(matches!(
            KeyboardEvent::from_payload(&payload),
            Err(CastError::BadEventPayload(_))
        ));
    }

    #[test]
    fn short_payload_rejected() {
        assert!(KeyboardEvent::from_payload(&[0u8; 3]).is_err());
    }
}
