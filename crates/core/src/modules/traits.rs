use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::cue::cue::{AudioOutput, VideoSettings};
use crate::dmx::channel_buffer::DMX_CHANNELS;
use crate::dmx::scene::DmxUniverse;
use crate::error::TransportError;
use crate::show::show::Project;

/// Identifies the collaborator a failure came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ModuleId {
    Audio,
    Video,
    Dmx,
    Midi,
}

impl ModuleId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleId::Audio => "audio",
            ModuleId::Video => "video",
            ModuleId::Dmx => "dmx",
            ModuleId::Midi => "midi",
        }
    }
}

/// Frame output to a DMX interface. Called from the show tick, so
/// implementations must not block for longer than a send.
pub trait DmxTransport: Send {
    fn send(&mut self, universe: u16, frame: &[u8; DMX_CHANNELS]) -> Result<(), TransportError>;

    fn connect(&mut self, universe: &DmxUniverse) -> Result<(), TransportError>;

    fn disconnect(&mut self, universe: u16) -> Result<(), TransportError>;
}

/// Raw MIDI output. Shared between the show tick and the clock task.
pub trait MidiTransport: Send + Sync {
    fn send(&self, device: &str, bytes: &[u8]) -> Result<(), TransportError>;

    /// Names of the currently connected output devices.
    fn output_devices(&self) -> Vec<String>;
}

/// Raw bytes received from a MIDI input port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMidi {
    pub device: String,
    pub bytes: Vec<u8>,
}

#[async_trait]
pub trait AudioTransport: Send + Sync {
    async fn play(
        &self,
        file: &str,
        outputs: &BTreeMap<u32, AudioOutput>,
    ) -> Result<(), TransportError>;

    async fn stop(&self, file: &str) -> Result<(), TransportError>;

    async fn pause(&self, file: &str) -> Result<(), TransportError>;

    async fn resume(&self, file: &str) -> Result<(), TransportError>;
}

#[async_trait]
pub trait VideoTransport: Send + Sync {
    async fn play(&self, file: &str, settings: &VideoSettings) -> Result<(), TransportError>;

    async fn stop(&self, file: &str) -> Result<(), TransportError>;

    async fn pause(&self, file: &str) -> Result<(), TransportError>;

    async fn resume(&self, file: &str) -> Result<(), TransportError>;

    async fn seek(&self, file: &str, position: Duration) -> Result<(), TransportError>;
}

/// Project persistence. The on-disk format belongs to the implementation.
#[async_trait]
pub trait ProjectStore: Send + Sync {
    async fn load(&self, path: &Path) -> Result<Project, anyhow::Error>;

    async fn save(&self, project: &Project, path: &Path) -> Result<(), anyhow::Error>;
}
