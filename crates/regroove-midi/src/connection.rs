//! MIDI port discovery and connection
//!
//! Uses midir for cross-platform MIDI I/O (ALSA on Linux, CoreMIDI on macOS, WinMM on Windows).
//! Ports are addressed by their index in the system port list, which is
//! what the `[devices]` config section stores.

use midir::{MidiInput, MidiInputPort, MidiOutput, MidiOutputConnection, MidiOutputPort};

/// Error type for MIDI connection operations
#[derive(Debug, thiserror::Error)]
pub enum MidiConnectionError {
    #[error("Failed to initialize MIDI input: {0}")]
    InputInitError(String),

    #[error("Failed to initialize MIDI output: {0}")]
    OutputInitError(String),

    #[error("No MIDI ports available")]
    NoPorts,

    #[error("No MIDI port at index {0}")]
    PortIndex(usize),

    #[error("Failed to connect to MIDI port: {0}")]
    ConnectionError(String),

    #[error("Failed to get port info: {0}")]
    PortInfoError(String),
}

/// A port as shown to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiPort {
    pub index: usize,
    pub name: String,
}

/// List available input ports
pub fn list_input_ports() -> Result<Vec<MidiPort>, MidiConnectionError> {
    let midi_in = MidiInput::new("regroove-list")
        .map_err(|e| MidiConnectionError::InputInitError(e.to_string()))?;
    Ok(midi_in
        .ports()
        .iter()
        .enumerate()
        .map(|(index, port)| MidiPort {
            index,
            name: midi_in
                .port_name(port)
                .unwrap_or_else(|_| format!("Input {}", index)),
        })
        .collect())
}

/// List available output ports
pub fn list_output_ports() -> Result<Vec<MidiPort>, MidiConnectionError> {
    let midi_out = MidiOutput::new("regroove-list")
        .map_err(|e| MidiConnectionError::OutputInitError(e.to_string()))?;
    Ok(midi_out
        .ports()
        .iter()
        .enumerate()
        .map(|(index, port)| MidiPort {
            index,
            name: midi_out
                .port_name(port)
                .unwrap_or_else(|_| format!("Output {}", index)),
        })
        .collect())
}

/// Open the input client and resolve a port index
pub(crate) fn input_port(index: usize) -> Result<(MidiInput, MidiInputPort, String), MidiConnectionError> {
    let midi_in = MidiInput::new("regroove-midi-in")
        .map_err(|e| MidiConnectionError::InputInitError(e.to_string()))?;

    let ports = midi_in.ports();
    if ports.is_empty() {
        return Err(MidiConnectionError::NoPorts);
    }
    let port = ports
        .get(index)
        .cloned()
        .ok_or(MidiConnectionError::PortIndex(index))?;
    let name = midi_in
        .port_name(&port)
        .map_err(|e| MidiConnectionError::PortInfoError(e.to_string()))?;

    Ok((midi_in, port, name))
}

/// Connect to an output port by index
pub(crate) fn connect_output(index: usize) -> Result<(MidiOutputConnection, String), MidiConnectionError> {
    let midi_out = MidiOutput::new("regroove-midi-out")
        .map_err(|e| MidiConnectionError::OutputInitError(e.to_string()))?;

    let ports = midi_out.ports();
    if ports.is_empty() {
        return Err(MidiConnectionError::NoPorts);
    }
    let port: MidiOutputPort = ports
        .get(index)
        .cloned()
        .ok_or(MidiConnectionError::PortIndex(index))?;
    let name = midi_out
        .port_name(&port)
        .map_err(|e| MidiConnectionError::PortInfoError(e.to_string()))?;

    let connection = midi_out
        .connect(&port, "regroove-midi-output")
        .map_err(|e| MidiConnectionError::ConnectionError(e.to_string()))?;

    log::info!("MIDI: Connected output port {}: {}", index, name);
    Ok((connection, name))
}
