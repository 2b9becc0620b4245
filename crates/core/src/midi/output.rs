use crate::error::TransportError;
use crate::modules::traits::MidiTransport;

use super::codec;
use super::midi::MidiCommand;

/// Sends `command` to its device, or to every connected output when the
/// command names no device. Returns the failures per device.
pub fn send_command(
    transport: &dyn MidiTransport,
    command: &MidiCommand,
) -> Vec<(String, TransportError)> {
    let bytes = codec::encode(command);
    if command.device_name.is_empty() {
        send_all(transport, &bytes)
    } else {
        match transport.send(&command.device_name, &bytes) {
            Ok(()) => Vec::new(),
            Err(e) => vec![(command.device_name.clone(), e)],
        }
    }
}

/// Sends raw bytes to every connected output.
pub fn send_all(transport: &dyn MidiTransport, bytes: &[u8]) -> Vec<(String, TransportError)> {
    transport
        .output_devices()
        .into_iter()
        .filter_map(|device| transport.send(&device, bytes).err().map(|e| (device, e)))
        .collect()
}
