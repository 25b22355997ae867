//! Incoming control events and physical control addresses

use crate::control::Group;
use crate::midi::{MidiMessage, CONTROL_CHANGE, NOTE_OFF, NOTE_ON};
use anyhow::Result;
use std::fmt;
use std::rc::Rc;
use std::time::Instant;

/// Handler invoked for one physical event
///
/// Handlers run to completion on the dispatch thread. Errors come from the
/// host collaborator and are propagated unchanged.
pub type Handler = Rc<dyn Fn(&ControlEvent) -> Result<()>>;

/// Kind of physical control
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AddrKind {
    /// Encoders and LED rings
    ControlChange,
    /// Buttons and button LEDs
    Note,
}

/// Address of a physical input or feedback output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ControlAddr {
    pub kind: AddrKind,
    /// MIDI channel (0-15)
    pub channel: u8,
    /// CC or note number (0-127)
    pub number: u8,
}

impl ControlAddr {
    pub fn cc(channel: u8, number: u8) -> Self {
        Self {
            kind: AddrKind::ControlChange,
            channel,
            number,
        }
    }

    pub fn note(channel: u8, number: u8) -> Self {
        Self {
            kind: AddrKind::Note,
            channel,
            number,
        }
    }

    /// Address of a parsed message
    pub fn of_message(message: &MidiMessage) -> Self {
        match *message {
            MidiMessage::NoteOn { channel, note, .. } | MidiMessage::NoteOff { channel, note, .. } => {
                Self::note(channel, note)
            }
            MidiMessage::ControlChange { channel, cc, .. } => Self::cc(channel, cc),
        }
    }

    /// Address an event arrived on, derived from its status byte
    pub fn of_event(event: &ControlEvent) -> Option<Self> {
        match event.status & 0xF0 {
            NOTE_ON | NOTE_OFF => Some(Self::note(event.channel, event.control)),
            CONTROL_CHANGE => Some(Self::cc(event.channel, event.control)),
            _ => None,
        }
    }

    /// Outgoing message carrying `value` to this address
    pub fn message(&self, value: u8) -> MidiMessage {
        match self.kind {
            AddrKind::ControlChange => MidiMessage::ControlChange {
                channel: self.channel,
                cc: self.number,
                value,
            },
            AddrKind::Note => MidiMessage::NoteOn {
                channel: self.channel,
                note: self.number,
                velocity: value,
            },
        }
    }
}

impl fmt::Display for ControlAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.kind {
            AddrKind::ControlChange => "cc",
            AddrKind::Note => "note",
        };
        write!(f, "{} ch:{} #{}", kind, self.channel + 1, self.number)
    }
}

/// One physical event as seen by handlers
#[derive(Debug, Clone, PartialEq)]
pub struct ControlEvent {
    /// MIDI channel (0-15)
    pub channel: u8,
    /// CC or note number
    pub control: u8,
    /// Data value: velocity for buttons, relative tick for encoders
    pub value: u8,
    /// Raw status byte
    pub status: u8,
    /// Group the physical control is bound to
    pub group: Group,
    /// Arrival time, drives encoder acceleration
    pub at: Instant,
}

impl ControlEvent {
    pub fn from_message(message: &MidiMessage, group: Group, at: Instant) -> Self {
        let (channel, control, value) = match *message {
            MidiMessage::NoteOn { channel, note, velocity } => (channel, note, velocity),
            MidiMessage::NoteOff { channel, note, .. } => (channel, note, 0),
            MidiMessage::ControlChange { channel, cc, value } => (channel, cc, value),
        };
        Self {
            channel,
            control,
            value,
            status: message.status(),
            group,
            at,
        }
    }

    /// Button edge: any non-zero value is a press
    pub fn is_press(&self) -> bool {
        self.value > 0
    }
}
