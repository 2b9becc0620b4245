use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::dmx::scene::DmxScene;
use crate::midi::midi::MidiCommand;
use crate::timeline::timeline::Timeline;

/// What happens to already running cues when this cue fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CueAction {
    /// Let previous cues continue.
    #[default]
    Overlay,
    /// Stop the cues listed in `cues_to_stop`.
    Release,
    /// Stop every running cue.
    StopAll,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Cue {
    pub number: u32,
    pub name: String,
    pub duration: Duration,
    pub auto_follow: bool,
    pub auto_follow_delay: Duration,
    pub action: CueAction,
    /// Only meaningful for [`CueAction::Release`]. Treated as an ordered set.
    pub cues_to_stop: Vec<u32>,
    pub audio_file: Option<String>,
    pub video_file: Option<String>,
    pub dmx_scenes: Vec<DmxScene>,
    pub timelines: Vec<Timeline>,
    pub midi_commands: Vec<MidiCommand>,
    /// Output channel index -> routing for the cue's audio file.
    pub audio_outputs: BTreeMap<u32, AudioOutput>,
    pub video_settings: Option<VideoSettings>,
}

impl Default for Cue {
    fn default() -> Self {
        Self {
            number: 0,
            name: String::new(),
            duration: Duration::ZERO,
            auto_follow: false,
            auto_follow_delay: Duration::ZERO,
            action: CueAction::Overlay,
            cues_to_stop: Vec::new(),
            audio_file: None,
            video_file: None,
            dmx_scenes: Vec::new(),
            timelines: Vec::new(),
            midi_commands: Vec::new(),
            audio_outputs: BTreeMap::new(),
            video_settings: None,
        }
    }
}

impl Cue {
    pub fn new(number: u32, name: impl Into<String>) -> Self {
        Self {
            number,
            name: name.into(),
            ..Self::default()
        }
    }

    /// `cues_to_stop` with duplicates removed, first occurrence kept.
    pub fn release_targets(&self) -> Vec<u32> {
        let mut seen = Vec::with_capacity(self.cues_to_stop.len());
        for number in &self.cues_to_stop {
            if !seen.contains(number) {
                seen.push(*number);
            }
        }
        seen
    }

    /// Show time offset (from cue start) at which auto-follow fires.
    pub fn follow_offset(&self) -> Duration {
        self.duration + self.auto_follow_delay
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AudioTrackType {
    /// Audience track
    #[default]
    Main,
    /// Click track for musicians
    Click,
    Backtrack,
    /// In-ear monitor mix
    Iem,
    Custom,
}

/// Audio routing for one output channel. Forwarded to the audio transport
/// untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioOutput {
    pub output_channel: u32,
    pub volume: f32,
    pub muted: bool,
    pub track_type: AudioTrackType,
}

impl Default for AudioOutput {
    fn default() -> Self {
        Self {
            output_channel: 1,
            volume: 1.0,
            muted: false,
            track_type: AudioTrackType::Main,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VideoPlaybackMode {
    #[default]
    Normal,
    Reverse,
    PingPong,
    RandomFrame,
}

/// Video playback parameters. Forwarded to the video transport untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoSettings {
    pub output_display: String,
    pub fullscreen: bool,
    pub playback_mode: VideoPlaybackMode,
    pub looping: bool,
    pub start_offset: Duration,
    pub end_offset: Duration,
    pub volume: f32,
    /// Mute the video's own audio and rely on a separate audio track.
    pub mute_video: bool,
}

impl Default for VideoSettings {
    fn default() -> Self {
        Self {
            output_display: String::new(),
            fullscreen: true,
            playback_mode: VideoPlaybackMode::Normal,
            looping: false,
            start_offset: Duration::ZERO,
            end_offset: Duration::ZERO,
            volume: 1.0,
            mute_video: false,
        }
    }
}
