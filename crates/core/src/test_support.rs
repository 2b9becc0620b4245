//! Recording fakes for the collaborator traits.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::cue::cue::{AudioOutput, VideoSettings};
use crate::dmx::channel_buffer::DMX_CHANNELS;
use crate::dmx::scene::DmxUniverse;
use crate::error::TransportError;
use crate::modules::traits::{AudioTransport, DmxTransport, MidiTransport, VideoTransport};

#[derive(Default)]
struct DmxLog {
    frames: Vec<(u16, [u8; DMX_CHANNELS])>,
    failing: BTreeSet<u16>,
    connected: BTreeSet<u16>,
}

#[derive(Clone, Default)]
pub struct RecordingDmx {
    inner: Arc<Mutex<DmxLog>>,
}

impl RecordingDmx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self, universe: u16) -> Vec<[u8; DMX_CHANNELS]> {
        self.inner
            .lock()
            .frames
            .iter()
            .filter(|(u, _)| *u == universe)
            .map(|(_, f)| *f)
            .collect()
    }

    pub fn last_frame(&self, universe: u16) -> Option<[u8; DMX_CHANNELS]> {
        self.frames(universe).last().copied()
    }

    pub fn frame_count(&self) -> usize {
        self.inner.lock().frames.len()
    }

    pub fn set_failing(&self, universe: u16, failing: bool) {
        let mut log = self.inner.lock();
        if failing {
            log.failing.insert(universe);
        } else {
            log.failing.remove(&universe);
        }
    }

    pub fn is_connected(&self, universe: u16) -> bool {
        self.inner.lock().connected.contains(&universe)
    }
}

impl DmxTransport for RecordingDmx {
    fn send(&mut self, universe: u16, frame: &[u8; DMX_CHANNELS]) -> Result<(), TransportError> {
        let mut log = self.inner.lock();
        if log.failing.contains(&universe) {
            return Err(TransportError::SendFailed(format!("universe {}", universe)));
        }
        log.frames.push((universe, *frame));
        Ok(())
    }

    fn connect(&mut self, universe: &DmxUniverse) -> Result<(), TransportError> {
        self.inner.lock().connected.insert(universe.universe_number);
        Ok(())
    }

    fn disconnect(&mut self, universe: u16) -> Result<(), TransportError> {
        self.inner.lock().connected.remove(&universe);
        Ok(())
    }
}

#[derive(Clone)]
pub struct RecordingMidi {
    devices: Vec<String>,
    sent: Arc<Mutex<Vec<(String, Vec<u8>)>>>,
}

impl RecordingMidi {
    pub fn new(devices: &[&str]) -> Self {
        Self {
            devices: devices.iter().map(|d| d.to_string()).collect(),
            sent: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn sent(&self) -> Vec<(String, Vec<u8>)> {
        self.sent.lock().clone()
    }

    /// Messages sent to `device`, in order.
    pub fn sent_to(&self, device: &str) -> Vec<Vec<u8>> {
        self.sent
            .lock()
            .iter()
            .filter(|(d, _)| d == device)
            .map(|(_, b)| b.clone())
            .collect()
    }

    pub fn count(&self, bytes: &[u8]) -> usize {
        self.sent.lock().iter().filter(|(_, b)| b == bytes).count()
    }

    pub fn clear(&self) {
        self.sent.lock().clear();
    }
}

impl MidiTransport for RecordingMidi {
    fn send(&self, device: &str, bytes: &[u8]) -> Result<(), TransportError> {
        if !self.devices.iter().any(|d| d == device) {
            return Err(TransportError::NotConnected(device.to_string()));
        }
        self.sent.lock().push((device.to_string(), bytes.to_vec()));
        Ok(())
    }

    fn output_devices(&self) -> Vec<String> {
        self.devices.clone()
    }
}

/// Records media calls as `"play:<file>"`, `"stop:<file>"`, ...
#[derive(Clone, Default)]
pub struct RecordingMedia {
    calls: Arc<Mutex<Vec<String>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingMedia {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn set_failing(&self, fail: bool) {
        *self.fail.lock() = fail;
    }

    fn record(&self, call: &str, file: &str) -> Result<(), TransportError> {
        self.calls.lock().push(format!("{}:{}", call, file));
        if *self.fail.lock() {
            Err(TransportError::Other(format!("{} failed", call)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AudioTransport for RecordingMedia {
    async fn play(
        &self,
        file: &str,
        _outputs: &BTreeMap<u32, AudioOutput>,
    ) -> Result<(), TransportError> {
        self.record("play", file)
    }

    async fn stop(&self, file: &str) -> Result<(), TransportError> {
        self.record("stop", file)
    }

    async fn pause(&self, file: &str) -> Result<(), TransportError> {
        self.record("pause", file)
    }

    async fn resume(&self, file: &str) -> Result<(), TransportError> {
        self.record("resume", file)
    }
}

#[async_trait]
impl VideoTransport for RecordingMedia {
    async fn play(&self, file: &str, _settings: &VideoSettings) -> Result<(), TransportError> {
        self.record("play", file)
    }

    async fn stop(&self, file: &str) -> Result<(), TransportError> {
        self.record("stop", file)
    }

    async fn pause(&self, file: &str) -> Result<(), TransportError> {
        self.record("pause", file)
    }

    async fn resume(&self, file: &str) -> Result<(), TransportError> {
        self.record("resume", file)
    }

    async fn seek(&self, file: &str, _position: Duration) -> Result<(), TransportError> {
        self.record("seek", file)
    }
}
