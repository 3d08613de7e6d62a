//! MIDI input sources
//!
//! A [`MidiSource`] knows which inputs exist and can start forwarding the
//! Control Change events of one of them into a channel. The midir-backed
//! [`MidirSource`] is used in production.

use midir::{Ignore, MidiInput, MidiInputConnection};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use super::{format_hex, ControlChange};

/// Events buffered per input before the driver thread has to wait
pub const INPUT_BUFFER: usize = 16;

/// Channel receiving the CC events of one input
///
/// Bounded: once [`INPUT_BUFFER`] events are pending, the MIDI driver's
/// callback thread waits for the controller to catch up.
pub type CcSink = mpsc::Sender<ControlChange>;

/// Errors raised while enumerating or opening MIDI inputs
#[derive(Debug, Error)]
pub enum MidiError {
    #[error("Failed to initialize MIDI driver: {0}")]
    Init(#[from] midir::InitError),

    #[error("MIDI input '{0}' not found")]
    PortNotFound(String),

    #[error("Failed to open MIDI input '{port}': {reason}")]
    Connect { port: String, reason: String },
}

/// An open input; events keep flowing until it is dropped
pub trait MidiConnection {
    /// Name of the input this connection listens to
    fn input_name(&self) -> &str;
}

/// Capability interface to the MIDI subsystem
pub trait MidiSource {
    /// Names of all available MIDI inputs
    fn input_names(&self) -> Result<Vec<String>, MidiError>;

    /// Open the input named exactly `input_name` and forward its CC events to `sink`
    fn listen(&self, input_name: &str, sink: CcSink)
        -> Result<Box<dyn MidiConnection>, MidiError>;
}

/// [`MidiSource`] backed by the platform MIDI driver through midir
#[derive(Debug, Clone)]
pub struct MidirSource {
    client_name: String,
}

struct MidirConnection {
    input_name: String,
    _connection: MidiInputConnection<()>,
}

impl MidiConnection for MidirConnection {
    fn input_name(&self) -> &str {
        &self.input_name
    }
}

impl MidirSource {
    /// Create a source registering with the driver as `client_name`
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
        }
    }
}

impl Default for MidirSource {
    fn default() -> Self {
        Self::new("Glovelight")
    }
}

impl MidiSource for MidirSource {
    fn input_names(&self) -> Result<Vec<String>, MidiError> {
        let midi_in = MidiInput::new(&format!("{}-Scanner", self.client_name))?;

        let mut names = Vec::new();
        for port in midi_in.ports() {
            if let Ok(name) = midi_in.port_name(&port) {
                names.push(name);
            }
        }
        Ok(names)
    }

    fn listen(
        &self,
        input_name: &str,
        sink: CcSink,
    ) -> Result<Box<dyn MidiConnection>, MidiError> {
        let mut midi_in = MidiInput::new(&format!("{}-Input", self.client_name))?;
        midi_in.ignore(Ignore::All);

        let port = midi_in
            .ports()
            .into_iter()
            .find(|port| {
                midi_in
                    .port_name(port)
                    .map(|name| name == input_name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| MidiError::PortNotFound(input_name.to_string()))?;

        let connection = midi_in
            .connect(
                &port,
                &self.client_name,
                move |_timestamp, data, _| {
                    forward(data, &sink);
                },
                (),
            )
            .map_err(|e| MidiError::Connect {
                port: input_name.to_string(),
                reason: e.to_string(),
            })?;

        info!("Listening on MIDI input: {}", input_name);
        debug!("MIDI client '{}' connected", self.client_name);

        Ok(Box::new(MidirConnection {
            input_name: input_name.to_string(),
            _connection: connection,
        }))
    }
}

/// Decode one raw message and pass it on if it is a Control Change
///
/// Must run off the tokio runtime: a full sink blocks the calling thread.
/// Returns whether an event was delivered.
fn forward(data: &[u8], sink: &CcSink) -> bool {
    let Some(cc) = ControlChange::parse(data) else {
        trace!("Ignoring MIDI: {}", format_hex(data));
        return false;
    };
    // Fails only once the controller has stopped
    sink.blocking_send(cc).is_ok()
}
