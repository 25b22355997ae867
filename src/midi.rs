//! MIDI short messages
//!
//! Only the channel voice messages a control surface exchanges with a mapping
//! (notes for buttons, control changes for encoders and LED rings) are modelled.
//! Everything else parses to `None` and is ignored by the dispatcher.

use std::fmt;

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;
pub const CONTROL_CHANGE: u8 = 0xB0;

/// Largest 7-bit data value
pub const MAX_7BIT: u8 = 0x7F;

/// MIDI message types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiMessage {
    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Note On: channel (0-15), note (0-127), velocity (0-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },
}

impl MidiMessage {
    /// Parse a 3-byte channel message
    ///
    /// Note On with velocity 0 is normalised to Note Off.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let (&status, rest) = data.split_first()?;
        if !(0x80..0xF0).contains(&status) || rest.len() < 2 {
            return None;
        }

        let channel = status & 0x0F;
        let data1 = rest[0] & MAX_7BIT;
        let data2 = rest[1] & MAX_7BIT;

        match status & 0xF0 {
            NOTE_OFF => Some(MidiMessage::NoteOff {
                channel,
                note: data1,
                velocity: data2,
            }),
            NOTE_ON if data2 == 0 => Some(MidiMessage::NoteOff {
                channel,
                note: data1,
                velocity: 0,
            }),
            NOTE_ON => Some(MidiMessage::NoteOn {
                channel,
                note: data1,
                velocity: data2,
            }),
            CONTROL_CHANGE => Some(MidiMessage::ControlChange {
                channel,
                cc: data1,
                value: data2,
            }),
            _ => None,
        }
    }

    /// Status byte including the channel nibble
    pub fn status(&self) -> u8 {
        match *self {
            MidiMessage::NoteOff { channel, .. } => NOTE_OFF | (channel & 0x0F),
            MidiMessage::NoteOn { channel, .. } => NOTE_ON | (channel & 0x0F),
            MidiMessage::ControlChange { channel, .. } => CONTROL_CHANGE | (channel & 0x0F),
        }
    }

    /// Encode the message to MIDI bytes
    pub fn encode(&self) -> [u8; 3] {
        let (data1, data2) = match *self {
            MidiMessage::NoteOff { note, velocity, .. } | MidiMessage::NoteOn { note, velocity, .. } => {
                (note, velocity)
            }
            MidiMessage::ControlChange { cc, value, .. } => (cc, value),
        };
        [self.status(), data1 & MAX_7BIT, data2 & MAX_7BIT]
    }
}

impl fmt::Display for MidiMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            MidiMessage::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            MidiMessage::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
        }
    }
}

/// Value conversion between the wire range and the unit interval
pub mod convert {
    use super::MAX_7BIT;

    /// Scale a unit value (clamped to 0..1) to 0-127
    pub fn from_unit_7bit(value: f64) -> u8 {
        (value.clamp(0.0, 1.0) * MAX_7BIT as f64).round() as u8
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
