use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cue::cue::Cue;
use crate::cue::show_state::ShowState;
use crate::dmx::scene::{DmxScene, DmxUniverse};
use crate::midi::midi::{MidiBinding, MidiCommand};
use crate::show::show::Project;
use crate::timeline::timeline::Timeline;

/// Commands sent to the show console
#[derive(Debug, Clone)]
pub enum ShowCommand {
    // System commands
    Shutdown,

    // Show management
    LoadProject {
        project: Box<Project>,
    },

    // Cue management
    InsertCue {
        after: Option<u32>,
        cue: Box<Cue>,
    },
    UpdateCue {
        cue: Box<Cue>,
    },
    DeleteCue {
        number: u32,
    },

    // Playback
    Go,
    GoBack,
    TriggerCue {
        number: u32,
    },
    JumpToCue {
        number: u32,
    },
    StopCue {
        number: u32,
    },
    StopAll,
    Pause,
    Resume,
    SeekVideo {
        file: String,
        position: Duration,
    },

    // Timelines
    StartTimeline {
        timeline: Box<Timeline>,
        universe: Option<u16>,
    },
    StopTimeline {
        name: String,
    },
    PauseTimeline {
        name: String,
    },
    ResumeTimeline {
        name: String,
    },

    // DMX
    Blackout,
    SetMasterIntensity {
        intensity: f32,
    },
    SetChannel {
        universe: u16,
        channel: u16,
        value: u8,
    },
    SetChannels {
        universe: u16,
        values: BTreeMap<u16, u8>,
    },
    SendScene {
        scene: DmxScene,
    },
    FadeScene {
        scene: DmxScene,
        fade_time: Duration,
    },
    ConnectUniverse {
        universe: DmxUniverse,
    },
    DisconnectUniverse {
        universe: u16,
    },

    // MIDI
    SendMidi {
        command: MidiCommand,
    },
    AddMidiBinding {
        binding: MidiBinding,
    },
    ClearMidiBindings,

    // Queries
    QueryCues,
    QueryCurrentCue,
    QueryUniverse {
        universe: u16,
    },
    QueryConnectedUniverses,
    QueryTimelinePosition {
        name: String,
    },
    QueryRunningTimelines,
    QueryProject,
}

/// Successful outcome of a [`ShowCommand`].
#[derive(Debug, Clone, PartialEq)]
pub enum ShowReply {
    Done,
    /// Whether a Go / GoBack found a cue to fire.
    Fired(bool),
    Cues(Vec<Cue>),
    CurrentCue(Option<Cue>),
    UniverseData(Vec<u8>),
    Universes(Vec<DmxUniverse>),
    Position(Duration),
    Timelines(Vec<String>),
    Project(Box<Project>),
}

/// Events published by the show console
#[derive(Debug, Clone, PartialEq)]
pub enum ShowEvent {
    // System events
    ShutdownComplete,
    Error {
        message: String,
    },

    // Cue events
    CueTriggered {
        number: u32,
        name: String,
    },
    CueCompleted {
        number: u32,
    },
    CueStopped {
        number: u32,
    },
    ShowStateChanged {
        state: ShowState,
    },
    ProjectLoaded {
        name: String,
        cue_count: usize,
    },

    // DMX events
    UniverseConnected {
        universe: u16,
    },
    UniverseDisconnected {
        universe: u16,
    },
    UniverseDegraded {
        universe: u16,
        message: String,
    },
    UniverseRecovered {
        universe: u16,
    },

    // Timeline events
    TimelineStarted {
        name: String,
        universe: u16,
    },
    TimelineCompleted {
        name: String,
        universe: u16,
    },
    StepExecuted {
        timeline: String,
        step_index: usize,
        universe: u16,
        channel: u16,
    },

    // MIDI events
    MidiClockStarted {
        bpm: f64,
    },
    MidiClockStopped,
    MidiLearned {
        command: MidiCommand,
    },

    TransportFailure {
        target: String,
        message: String,
    },
}

/// Application settings, persisted by [`crate::ConfigManager`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    // Show timing
    pub show_tick_hz: u32,
    pub continuous_midi_interval_ms: u64,
    pub master_intensity: f32,

    // Output settings (DMX/Art-Net)
    pub dmx_enabled: bool,
    pub dmx_broadcast: bool,
    pub dmx_source_ip: String,
    pub dmx_dest_ip: String,
    pub dmx_port: u16,

    // MIDI settings
    pub midi_enabled: bool,
    pub midi_input_device: String,
    pub midi_output_devices: Vec<String>,
    pub midi_clock_bpm: f64,
    pub midi_learn_timeout_ms: u64,
    pub midi_bindings: Vec<MidiBinding>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            // Timing defaults
            show_tick_hz: 40,
            continuous_midi_interval_ms: 100,
            master_intensity: 1.0,

            // Output defaults
            dmx_enabled: true,
            dmx_broadcast: false,
            dmx_source_ip: "192.168.1.100".to_string(),
            dmx_dest_ip: "192.168.1.200".to_string(),
            dmx_port: 6454,

            // MIDI defaults
            midi_enabled: false,
            midi_input_device: "None".to_string(),
            midi_output_devices: Vec::new(),
            midi_clock_bpm: 120.0,
            midi_learn_timeout_ms: 10_000,
            midi_bindings: Vec::new(),
        }
    }
}

impl Settings {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.show_tick_hz.max(1) as f64)
    }

    pub fn continuous_midi_interval(&self) -> Duration {
        Duration::from_millis(self.continuous_midi_interval_ms.max(1))
    }

    pub fn midi_learn_timeout(&self) -> Duration {
        Duration::from_millis(self.midi_learn_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_settings_rejected() {
        let err = serde_json::from_str::<Settings>(r#"{"show_tick_hz": 50, "wled_ip": "x"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_missing_settings_defaulted() {
        let settings: Settings = serde_json::from_str(r#"{"show_tick_hz": 50}"#).unwrap();
        assert_eq!(settings.show_tick_hz, 50);
        assert_eq!(settings.dmx_port, 6454);
        assert_eq!(settings.tick_interval(), Duration::from_millis(20));
    }
}
