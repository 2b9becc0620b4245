use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

/// Snapshot of the sequencer's playback state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShowState {
    /// Standby pointer. `None` before the first cue.
    pub current_cue_number: Option<u32>,
    pub running_cues: BTreeSet<u32>,
    /// Master time at which each running cue fired.
    pub cue_start_times: BTreeMap<u32, Duration>,
    pub is_playing: bool,
    pub is_paused: bool,
    /// Show clock. Only advances while not paused.
    pub master_time: Duration,
    pub running_timelines: BTreeSet<String>,
}

impl ShowState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self, number: u32) -> bool {
        self.running_cues.contains(&number)
    }

    /// How long a running cue has been running in show time.
    pub fn cue_elapsed(&self, number: u32) -> Option<Duration> {
        self.cue_start_times
            .get(&number)
            .map(|start| self.master_time.saturating_sub(*start))
    }
}
