use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cue::cue::Cue;
use crate::dmx::scene::DmxUniverse;

/// Typed per-show settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ShowSettings {
    pub bpm: f64,
    /// Start the MIDI clock when the first cue of the show fires.
    pub start_clock_on_go: bool,
    pub default_universe: u16,
}

impl Default for ShowSettings {
    fn default() -> Self {
        Self {
            bpm: 120.0,
            start_clock_on_go: false,
            default_universe: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub version: String, // Schema version for future compatibility
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
    pub cues: Vec<Cue>,
    pub universes: Vec<DmxUniverse>,
    #[serde(default)]
    pub settings: ShowSettings,
}

impl Project {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            created: now,
            modified: now,
            cues: Vec::new(),
            universes: Vec::new(),
            settings: ShowSettings::default(),
        }
    }

    pub fn with_cue(mut self, cue: Cue) -> Self {
        self.cues.push(cue);
        self
    }

    pub fn touch(&mut self) {
        self.modified = Utc::now();
    }
}
