//! MIDI utilities and message types
//!
//! Decodes the Control Change messages delivered by the MIDI driver and
//! converts 7-bit CC values into the normalized range used for chromaticity.

pub mod discovery;
pub mod source;

use std::fmt;

pub use source::{MidiConnection, MidiError, MidiSource, MidirSource};

/// Status nibble of a Control Change message
const CONTROL_CHANGE: u8 = 0xB0;

/// A decoded Control Change event as seen on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlChange {
    /// 0-indexed channel (0-15)
    pub channel: u8,
    pub controller: u8,
    pub value: u8,
}

impl ControlChange {
    /// Decode a Control Change from raw bytes
    ///
    /// Any other message, truncated data and running-status bytes yield `None`.
    pub fn parse(data: &[u8]) -> Option<Self> {
        match *data {
            [status, controller, value, ..] if status & 0xF0 == CONTROL_CHANGE => Some(Self {
                channel: status & 0x0F,
                controller: controller & 0x7F,
                value: value & 0x7F,
            }),
            _ => None,
        }
    }
}

impl fmt::Display for ControlChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CC ch:{} cc:{} v:{}",
            self.channel + 1,
            self.controller,
            self.value
        )
    }
}

/// MIDI value conversion utilities
pub mod convert {
    /// Largest 7-bit value
    pub const MAX_7BIT: u8 = 127;

    /// Map a 7-bit value onto 0.0-1.0 (0 → 0.0, 127 → 1.0)
    pub fn normalize_7bit(value: u8) -> f32 {
        value.min(MAX_7BIT) as f32 / MAX_7BIT as f32
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
