//! MIDI input handling
//!
//! Receives raw MIDI bytes from the midir callback, parses them with midly,
//! and forwards note and CC messages to the session via a flume channel.
//! Each message is tagged with the input slot (0 or 1) it arrived on; that
//! slot is the device id the binding filters match against.

use flume::{Receiver, Sender, TrySendError};
use midir::MidiInputConnection;
use midly::live::LiveEvent;
use midly::MidiMessage as MidlyMessage;
use regroove_core::input::MidiEvent;

use crate::connection::{input_port, MidiConnectionError};

/// Messages buffered between the driver thread and the session
pub const MIDI_QUEUE_CAPACITY: usize = 256;

/// Parse a raw message into a session event
///
/// Only note-on, note-off and control change are kept; anything else
/// (clock, sysex, pitch bend, aftertouch) yields `None`.
pub fn parse_message(data: &[u8], device: u8) -> Option<MidiEvent> {
    let LiveEvent::Midi { channel, message } = LiveEvent::parse(data).ok()? else {
        return None;
    };
    let channel = channel.as_int();
    let (kind, data1, data2) = match message {
        MidlyMessage::NoteOff { key, vel } => (0x80, key.as_int(), vel.as_int()),
        MidlyMessage::NoteOn { key, vel } => (0x90, key.as_int(), vel.as_int()),
        MidlyMessage::Controller { controller, value } => (0xB0, controller.as_int(), value.as_int()),
        _ => return None,
    };
    Some(MidiEvent::new(kind | channel, data1, data2, device))
}

/// Callback body: parse and forward without blocking
fn forward(data: &[u8], device: u8, tx: &Sender<MidiEvent>) {
    let Some(event) = parse_message(data, device) else {
        return;
    };
    match tx.try_send(event) {
        Ok(()) => {}
        Err(TrySendError::Full(_)) => log::debug!("MIDI: input queue full, dropping message"),
        Err(TrySendError::Disconnected(_)) => {}
    }
}

/// MIDI input handler
///
/// Owns the midir connection; dropping it closes the port.
pub struct MidiInputHandler {
    _connection: MidiInputConnection<()>,
    port_name: String,
    device: u8,
}

impl MidiInputHandler {
    /// Connect to the port at `port_index`, tagging its messages with `device`
    pub fn connect(port_index: usize, device: u8, tx: Sender<MidiEvent>) -> Result<Self, MidiConnectionError> {
        let (midi_in, port, port_name) = input_port(port_index)?;
        let connection = midi_in
            .connect(
                &port,
                "regroove-midi-input",
                move |_timestamp, data, _| forward(data, device, &tx),
                (),
            )
            .map_err(|e| MidiConnectionError::ConnectionError(e.to_string()))?;

        log::info!("MIDI: Connected input port {} as device {}: {}", port_index, device, port_name);
        Ok(Self {
            _connection: connection,
            port_name,
            device,
        })
    }

    pub fn port_name(&self) -> &str {
        &self.port_name
    }

    pub fn device(&self) -> u8 {
        self.device
    }
}

/// Up to two input ports feeding one queue
pub struct MidiInputs {
    handlers: Vec<MidiInputHandler>,
    rx: Receiver<MidiEvent>,
}

impl MidiInputs {
    /// Open the configured ports; negative entries are disabled
    ///
    /// A port that fails to open is logged and skipped so the other one
    /// still works.
    pub fn open(ports: &[i32]) -> Self {
        let (tx, rx) = flume::bounded(MIDI_QUEUE_CAPACITY);
        let mut handlers = Vec::new();
        for (slot, &port) in ports.iter().enumerate() {
            let (Ok(index), Ok(device)) = (usize::try_from(port), u8::try_from(slot)) else {
                continue;
            };
            match MidiInputHandler::connect(index, device, tx.clone()) {
                Ok(handler) => handlers.push(handler),
                Err(e) => log::warn!("MIDI: input {} unavailable: {}", index, e),
            }
        }
        Self { handlers, rx }
    }

    pub fn handlers(&self) -> &[MidiInputHandler] {
        &self.handlers
    }

    pub fn is_connected(&self) -> bool {
        !self.handlers.is_empty()
    }

    pub fn try_recv(&self) -> Option<MidiEvent> {
        self.rx.try_recv().ok()
    }

    /// Take everything received since the last call
    pub fn drain(&self) -> Vec<MidiEvent> {
        self.rx.drain().collect()
    }

    /// Receiver for frontends that wait on input asynchronously
    pub fn receiver(&self) -> &Receiver<MidiEvent> {
        &self.rx
    }
}
