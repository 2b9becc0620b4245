pub use artnet::artnet::{ArtNet, ArtNetMode};
pub use artnet::network_config::{ArtNetDestination, NetworkConfig};
pub use config::{ConfigError, ConfigManager, ConfigSchema};
pub use console::{ShowConsole, ShowHandle, Transports};
pub use cue::cue::{AudioOutput, AudioTrackType, Cue, CueAction, VideoPlaybackMode, VideoSettings};
pub use cue::cue_sequencer::CueSequencer;
pub use cue::show_state::ShowState;
pub use cue::validation::{validate_cue, validate_project, Severity, ValidationIssue};
pub use dmx::dmx_scheduler::DmxScheduler;
pub use dmx::scene::{DmxScene, DmxUniverse};
pub use error::{EngineError, EngineResult, TransportError};
pub use messages::{Settings, ShowCommand, ShowEvent, ShowReply};
pub use midi::midi::{MidiAction, MidiBinding, MidiCommand, MidiMessageType, MidiTriggerType};
pub use midi::midi_clock::MidiClock;
pub use midi::midi_device::MidirTransport;
pub use midi::midi_learn::MidiLearn;
// Collaborator traits
pub use modules::{
    AudioTransport, DmxTransport, InboundMidi, MidiTransport, ModuleId, ProjectStore,
    VideoTransport,
};
pub use show::show::{Project, ShowSettings};
pub use timeline::easing::EasingType;
pub use timeline::timeline::{Timeline, TimelineStep};

mod artnet;
mod config;
mod console;

mod cue;
pub mod dmx;
mod error;
pub mod messages;
pub mod midi;
mod modules;
mod show;
pub mod timeline;

#[cfg(test)]
mod test_support;
