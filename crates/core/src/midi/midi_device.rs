use std::collections::HashMap;

use midir::{MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::modules::traits::{InboundMidi, MidiTransport};

const CLIENT_NAME: &str = "cueline";

/// MIDI ports opened through midir. Ports are matched by substring of
/// their system name.
#[derive(Default)]
pub struct MidirTransport {
    outputs: Mutex<HashMap<String, MidiOutputConnection>>,
    input: Mutex<Option<MidiInputConnection<()>>>,
}

impl MidirTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of the output ports currently visible to the system.
    pub fn available_outputs() -> Result<Vec<String>, TransportError> {
        let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| TransportError::Other(e.to_string()))?;
        Ok(midi_out
            .ports()
            .iter()
            .filter_map(|port| midi_out.port_name(port).ok())
            .collect())
    }

    /// Opens the first output port whose name contains `device_name`. The
    /// connection is registered under `device_name`.
    pub fn connect_output(&self, device_name: &str) -> Result<(), TransportError> {
        let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| TransportError::Other(e.to_string()))?;
        let port = midi_out
            .ports()
            .into_iter()
            .find(|port| {
                midi_out
                    .port_name(port)
                    .map(|name| name.contains(device_name))
                    .unwrap_or(false)
            })
            .ok_or_else(|| TransportError::NotConnected(device_name.to_string()))?;

        let connection = midi_out
            .connect(&port, "cueline-output")
            .map_err(|e| TransportError::Other(e.to_string()))?;
        self.outputs.lock().insert(device_name.to_string(), connection);
        log::info!("MIDI output '{}' connected", device_name);
        Ok(())
    }

    pub fn disconnect_output(&self, device_name: &str) {
        if let Some(connection) = self.outputs.lock().remove(device_name) {
            connection.close();
            log::info!("MIDI output '{}' disconnected", device_name);
        }
    }

    /// Opens the input port matching `device_name` and forwards every
    /// message to `tx`. Replaces any previous input.
    pub fn connect_input(
        &self,
        device_name: &str,
        tx: mpsc::UnboundedSender<InboundMidi>,
    ) -> Result<(), TransportError> {
        let midi_in = MidiInput::new(CLIENT_NAME).map_err(|e| TransportError::Other(e.to_string()))?;
        let port = midi_in
            .ports()
            .into_iter()
            .find(|port| {
                midi_in
                    .port_name(port)
                    .map(|name| name.contains(device_name))
                    .unwrap_or(false)
            })
            .ok_or_else(|| TransportError::NotConnected(device_name.to_string()))?;

        let device = device_name.to_string();
        let connection = midi_in
            .connect(
                &port,
                "cueline-input",
                move |_timestamp, message, _| {
                    let _ = tx.send(InboundMidi {
                        device: device.clone(),
                        bytes: message.to_vec(),
                    });
                },
                (),
            )
            .map_err(|e| TransportError::Other(e.to_string()))?;

        *self.input.lock() = Some(connection);
        log::info!("MIDI input '{}' connected", device_name);
        Ok(())
    }
}

impl MidiTransport for MidirTransport {
    fn send(&self, device: &str, bytes: &[u8]) -> Result<(), TransportError> {
        let mut outputs = self.outputs.lock();
        let connection = outputs
            .get_mut(device)
            .ok_or_else(|| TransportError::NotConnected(device.to_string()))?;
        connection
            .send(bytes)
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    fn output_devices(&self) -> Vec<String> {
        let mut devices: Vec<String> = self.outputs.lock().keys().cloned().collect();
        devices.sort();
        devices
    }
}
