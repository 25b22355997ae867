//! MIDI port plumbing
//!
//! Input arrives on midir's callback thread and is forwarded as raw bytes over a
//! bounded tokio channel; the dispatch loop owns everything else.

use crate::feedback::FeedbackSink;
use crate::midi::{format_hex, MidiMessage};
use anyhow::{Context, Result};
use midir::{MidiIO, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use std::cell::RefCell;
use std::time::Instant;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const CLIENT_NAME: &str = "shift-mapper";

/// Capacity of the input event channel
pub const EVENT_QUEUE: usize = 1000;

/// Raw message received from the surface
#[derive(Debug, Clone)]
pub struct SurfaceEvent {
    pub at: Instant,
    pub raw: Vec<u8>,
}

/// List available MIDI input ports
pub fn list_input_ports() -> Result<Vec<String>> {
    let midi_in = MidiInput::new(CLIENT_NAME).context("Failed to create MIDI input")?;
    Ok(port_names(&midi_in))
}

/// List available MIDI output ports
pub fn list_output_ports() -> Result<Vec<String>> {
    let midi_out = MidiOutput::new(CLIENT_NAME).context("Failed to create MIDI output")?;
    Ok(port_names(&midi_out))
}

fn port_names<T: MidiIO>(io: &T) -> Vec<String> {
    io.ports()
        .iter()
        .filter_map(|port| io.port_name(port).ok())
        .collect()
}

/// Case-insensitive substring match
pub fn port_matches(name: &str, pattern: &str) -> bool {
    name.to_lowercase().contains(&pattern.to_lowercase())
}

fn find_port<T: MidiIO>(io: &T, pattern: &str) -> Option<(T::Port, String)> {
    for port in io.ports() {
        if let Ok(name) = io.port_name(&port) {
            if port_matches(&name, pattern) {
                debug!("Found port '{}' matching pattern '{}'", name, pattern);
                return Some((port, name));
            }
        }
    }
    None
}

/// Open the first input port matching `pattern`
///
/// Dropping the returned connection closes the port.
pub fn connect_input(pattern: &str, tx: mpsc::Sender<SurfaceEvent>) -> Result<MidiInputConnection<()>> {
    let midi_in = MidiInput::new(CLIENT_NAME).context("Failed to create MIDI input")?;
    debug!("Found {} MIDI input ports", midi_in.port_count());

    let (port, name) = find_port(&midi_in, pattern)
        .ok_or_else(|| anyhow::anyhow!("Input port '{}' not found", pattern))?;
    info!("🎹 Connecting to input port: {}", name);

    midi_in
        .connect(
            &port,
            CLIENT_NAME,
            move |_timestamp, data, _| {
                let event = SurfaceEvent {
                    at: Instant::now(),
                    raw: data.to_vec(),
                };
                if tx.try_send(event).is_err() {
                    warn!("Input queue full, dropping {}", format_hex(data));
                }
            },
            (),
        )
        .map_err(|e| anyhow::anyhow!("Failed to connect to input port '{}': {}", name, e))
}

/// Feedback sink writing to a MIDI output port
pub struct MidiOutputSink {
    conn: RefCell<MidiOutputConnection>,
    port: String,
}

impl MidiOutputSink {
    /// Open the first output port matching `pattern`
    pub fn connect(pattern: &str) -> Result<Self> {
        let midi_out = MidiOutput::new(CLIENT_NAME).context("Failed to create MIDI output")?;
        debug!("Found {} MIDI output ports", midi_out.port_count());

        let (port, name) = find_port(&midi_out, pattern)
            .ok_or_else(|| anyhow::anyhow!("Output port '{}' not found", pattern))?;
        info!("🎹 Connecting to output port: {}", name);

        let conn = midi_out
            .connect(&port, CLIENT_NAME)
            .map_err(|e| anyhow::anyhow!("Failed to connect to output port '{}': {}", name, e))?;
        Ok(Self {
            conn: RefCell::new(conn),
            port: name,
        })
    }

    pub fn port(&self) -> &str {
        &self.port
    }
}

impl FeedbackSink for MidiOutputSink {
    fn send(&self, message: &MidiMessage) -> Result<()> {
        let data = message.encode();
        self.conn
            .borrow_mut()
            .send(&data)
            .context("Failed to send MIDI message")?;
        debug!("Sent: {} | {}", format_hex(&data), message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_matching_ignores_case() {
        assert!(port_matches("BCR2000 Port 1", "bcr2000"));
        assert!(port_matches("bcr2000:bcr2000 MIDI 1 20:0", "BCR2000"));
        assert!(!port_matches("X-Touch", "BCR"));
    }

    #[test]
    fn test_port_listing_does_not_panic() {
        let _ = list_input_ports();
        let _ = list_output_ports();
    }
}
