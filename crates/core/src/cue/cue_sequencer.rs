use std::collections::{BTreeMap, BTreeSet};
use std::ops::Bound::{Excluded, Unbounded};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use super::cue::{Cue, CueAction};
use super::show_state::ShowState;
use super::validation::{self, Severity};
use crate::dmx::arena::Handle;
use crate::dmx::dmx_scheduler::DmxScheduler;
use crate::error::{EngineError, EngineResult};
use crate::messages::ShowEvent;
use crate::midi::midi::{MidiCommand, MidiTriggerType};
use crate::midi::output;
use crate::modules::media_worker::MediaRequest;
use crate::modules::traits::MidiTransport;
use crate::show::show::{Project, ShowSettings};

/// What a running cue registered, so an explicit stop can undo it.
#[derive(Debug, Default)]
struct RunningCue {
    cue: Cue,
    faders: Vec<Handle>,
    players: Vec<Handle>,
}

#[derive(Debug, Clone)]
struct PendingMidi {
    due: Duration,
    cue: u32,
    command: MidiCommand,
}

#[derive(Debug, Clone)]
struct ContinuousMidi {
    next_due: Duration,
    cue: u32,
    command: MidiCommand,
}

/// The show state machine. Owns the cue list, the playback state and the
/// DMX scheduler; driven by [`CueSequencer::tick`].
pub struct CueSequencer {
    cues: BTreeMap<u32, Cue>,
    state: ShowState,
    scheduler: DmxScheduler,
    running: BTreeMap<u32, RunningCue>,
    pending_midi: Vec<PendingMidi>,
    continuous_midi: Vec<ContinuousMidi>,
    /// cue number -> master time its auto-follow fires
    pending_follows: BTreeMap<u32, Duration>,
    continuous_interval: Duration,
    project_name: String,
    show_settings: ShowSettings,
    midi: Arc<dyn MidiTransport>,
    media_tx: mpsc::UnboundedSender<MediaRequest>,
    event_tx: mpsc::UnboundedSender<ShowEvent>,
}

impl CueSequencer {
    pub fn new(
        scheduler: DmxScheduler,
        midi: Arc<dyn MidiTransport>,
        media_tx: mpsc::UnboundedSender<MediaRequest>,
        event_tx: mpsc::UnboundedSender<ShowEvent>,
    ) -> Self {
        Self {
            cues: BTreeMap::new(),
            state: ShowState::new(),
            scheduler,
            running: BTreeMap::new(),
            pending_midi: Vec::new(),
            continuous_midi: Vec::new(),
            pending_follows: BTreeMap::new(),
            continuous_interval: Duration::from_millis(100),
            project_name: "Untitled Show".to_string(),
            show_settings: ShowSettings::default(),
            midi,
            media_tx,
            event_tx,
        }
    }

    pub fn set_continuous_interval(&mut self, interval: Duration) {
        self.continuous_interval = interval.max(Duration::from_millis(1));
    }

    fn emit(&self, event: ShowEvent) {
        let _ = self.event_tx.send(event);
    }

    fn emit_state(&self) {
        self.emit(ShowEvent::ShowStateChanged {
            state: self.state.clone(),
        });
    }

    fn queue_media(&self, request: MediaRequest) {
        if self.media_tx.send(request).is_err() {
            log::warn!("Media worker is not running; dropping request");
        }
    }

    // Accessors

    pub fn cues(&self) -> Vec<Cue> {
        self.cues.values().cloned().collect()
    }

    pub fn cue(&self, number: u32) -> Option<&Cue> {
        self.cues.get(&number)
    }

    pub fn current_cue(&self) -> Option<&Cue> {
        self.state
            .current_cue_number
            .and_then(|number| self.cues.get(&number))
    }

    pub fn show_state(&self) -> ShowState {
        self.state.clone()
    }

    pub fn show_settings(&self) -> &ShowSettings {
        &self.show_settings
    }

    /// The loaded show as it stands now, edits and connected universes
    /// included.
    pub fn to_project(&self) -> Project {
        let mut project = Project::new(self.project_name.clone());
        project.cues = self.cues();
        project.universes = self.scheduler.connected_universes();
        project.settings = self.show_settings.clone();
        project
    }

    pub fn scheduler(&self) -> &DmxScheduler {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut DmxScheduler {
        &mut self.scheduler
    }

    // Cue list editing

    pub fn load_project(&mut self, project: &Project) -> EngineResult<()> {
        let issues = validation::validate_project(project);
        if let Some(dupe) = issues.iter().find(|i| i.duplicate_number) {
            return Err(EngineError::Conflict(format!(
                "project '{}' has a {}",
                project.name, dupe
            )));
        }
        validation::log_issues(&issues);

        self.stop_all();
        self.cues = project
            .cues
            .iter()
            .map(|cue| (cue.number, cue.clone()))
            .collect();
        self.state = ShowState::new();
        self.project_name = project.name.clone();
        self.show_settings = project.settings.clone();

        if let Err(e) = self
            .scheduler
            .set_default_universe(self.show_settings.default_universe)
        {
            log::warn!("Project '{}' default universe ignored: {}", project.name, e);
        }
        for universe in &project.universes {
            if let Err(e) = self.scheduler.ensure_universe(universe.universe_number) {
                log::warn!("Project '{}': {}", project.name, e);
                continue;
            }
            if let Err(e) = self.scheduler.connect_universe(universe.clone()) {
                log::warn!("Project '{}': {}", project.name, e);
            }
        }

        let errors = issues
            .iter()
            .filter(|i| i.severity == Severity::Error)
            .count();
        log::info!(
            "Loaded project '{}' with {} cues ({} validation errors)",
            project.name,
            self.cues.len(),
            errors
        );
        self.emit(ShowEvent::ProjectLoaded {
            name: project.name.clone(),
            cue_count: self.cues.len(),
        });
        self.emit_state();
        Ok(())
    }

    /// Adds `cue`. Cues are kept in numeric order, so `after` only matters
    /// for logging.
    pub fn insert_cue(&mut self, after: Option<u32>, cue: Cue) -> EngineResult<()> {
        if self.cues.contains_key(&cue.number) {
            return Err(EngineError::Conflict(format!(
                "cue {} already exists",
                cue.number
            )));
        }
        if let Some(after) = after {
            if after > cue.number {
                log::debug!(
                    "Cue {} inserted after {} is ordered by number",
                    cue.number,
                    after
                );
            }
        }
        let known: BTreeSet<u32> = self.cues.keys().copied().chain([cue.number]).collect();
        validation::log_issues(&validation::validate_cue(&cue, &known));

        self.cues.insert(cue.number, cue);
        Ok(())
    }

    /// Replaces a cue definition. A running instance keeps the definition it
    /// fired with.
    pub fn update_cue(&mut self, cue: Cue) -> EngineResult<()> {
        let slot = self
            .cues
            .get_mut(&cue.number)
            .ok_or_else(|| EngineError::cue_not_found(cue.number))?;
        *slot = cue;
        Ok(())
    }

    pub fn delete_cue(&mut self, number: u32) -> EngineResult<Cue> {
        if !self.cues.contains_key(&number) {
            return Err(EngineError::cue_not_found(number));
        }
        if self.stop_running(number) {
            self.emit_state();
        }
        self.cues
            .remove(&number)
            .ok_or_else(|| EngineError::cue_not_found(number))
    }

    // Playback

    pub fn trigger_cue(&mut self, number: u32) -> EngineResult<()> {
        let cue = self
            .cues
            .get(&number)
            .cloned()
            .ok_or_else(|| EngineError::cue_not_found(number))?;

        match cue.action {
            CueAction::Overlay => {}
            CueAction::Release => {
                for target in cue.release_targets() {
                    if target != number {
                        self.stop_running(target);
                    }
                }
            }
            CueAction::StopAll => {
                let running: Vec<u32> = self.running.keys().copied().collect();
                for target in running {
                    self.stop_running(target);
                }
            }
        }

        // firing a running cue restarts it
        self.stop_running(number);
        self.fire(cue);
        Ok(())
    }

    fn fire(&mut self, cue: Cue) {
        let number = cue.number;
        let now = self.state.master_time;
        log::info!("GO cue {} '{}'", number, cue.name);

        let faders = cue
            .dmx_scenes
            .iter()
            .filter_map(|scene| match self.scheduler.register_scene(scene, Some(number)) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    log::warn!("Cue {} scene '{}' skipped: {}", number, scene.name, e);
                    None
                }
            })
            .collect();
        let players = cue
            .timelines
            .iter()
            .filter_map(|timeline| {
                match self.scheduler.start_timeline(timeline.clone(), None, Some(number)) {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        log::warn!("Cue {} timeline '{}' skipped: {}", number, timeline.name, e);
                        None
                    }
                }
            })
            .collect();

        for command in &cue.midi_commands {
            match command.trigger_type {
                MidiTriggerType::OnCueStart | MidiTriggerType::OnBeat | MidiTriggerType::OnFrame => {
                    self.schedule_midi(number, command, now)
                }
                MidiTriggerType::Continuous => self.continuous_midi.push(ContinuousMidi {
                    next_due: now + command.delay,
                    cue: number,
                    command: command.clone(),
                }),
                MidiTriggerType::OnCueEnd | MidiTriggerType::OnCueStop => {}
            }
        }

        if let Some(file) = &cue.audio_file {
            self.queue_media(MediaRequest::AudioPlay {
                file: file.clone(),
                outputs: cue.audio_outputs.clone(),
            });
        }
        if let Some(file) = &cue.video_file {
            self.queue_media(MediaRequest::VideoPlay {
                file: file.clone(),
                settings: cue.video_settings.clone().unwrap_or_default(),
            });
        }

        if cue.auto_follow {
            self.pending_follows.insert(number, now + cue.follow_offset());
        }

        self.state.cue_start_times.insert(number, now);
        self.state.running_cues.insert(number);
        self.state.current_cue_number = Some(number);
        self.state.is_playing = true;
        self.sync_running_timelines();

        let name = cue.name.clone();
        self.running.insert(
            number,
            RunningCue {
                cue,
                faders,
                players,
            },
        );

        self.emit(ShowEvent::CueTriggered { number, name });
        self.emit_state();
    }

    /// Fires the lowest-numbered cue after the standby pointer. Returns
    /// `false` at the end of the list.
    pub fn trigger_next_cue(&mut self) -> EngineResult<bool> {
        let next = match self.state.current_cue_number {
            None => self.cues.keys().next().copied(),
            Some(current) => self
                .cues
                .range((Excluded(current), Unbounded))
                .next()
                .map(|(n, _)| *n),
        };
        match next {
            Some(number) => {
                self.trigger_cue(number)?;
                Ok(true)
            }
            None => {
                log::info!("GO: reached end of cue list");
                Ok(false)
            }
        }
    }

    /// Fires the highest-numbered cue before the standby pointer.
    pub fn go_back(&mut self) -> EngineResult<bool> {
        let Some(current) = self.state.current_cue_number else {
            return Ok(false);
        };
        match self.cues.range(..current).next_back().map(|(n, _)| *n) {
            Some(number) => {
                self.trigger_cue(number)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Moves the standby pointer without firing anything.
    pub fn jump_to_cue(&mut self, number: u32) -> EngineResult<()> {
        if !self.cues.contains_key(&number) {
            return Err(EngineError::cue_not_found(number));
        }
        self.state.current_cue_number = Some(number);
        self.emit_state();
        Ok(())
    }

    pub fn stop_cue(&mut self, number: u32) -> EngineResult<()> {
        if !self.stop_running(number) {
            return Err(EngineError::NotFound {
                kind: "running cue",
                id: number.to_string(),
            });
        }
        self.emit_state();
        Ok(())
    }

    /// Stops every cue, timeline and fade. The standby pointer is kept.
    pub fn stop_all(&mut self) {
        // stopped cues queue their OnCueStop commands below
        self.pending_midi.clear();
        self.continuous_midi.clear();
        let running: Vec<u32> = self.running.keys().copied().collect();
        for number in running {
            self.stop_running(number);
        }

        self.scheduler.clear_all();
        self.pending_follows.clear();
        self.state.running_cues.clear();
        self.state.cue_start_times.clear();
        self.state.is_playing = false;
        self.sync_running_timelines();
        log::info!("Stopped all cues");
        self.emit_state();
    }

    pub fn pause_show(&mut self) {
        if self.state.is_paused {
            return;
        }
        self.state.is_paused = true;
        for running in self.running.values() {
            if let Some(file) = &running.cue.audio_file {
                self.queue_media(MediaRequest::AudioPause { file: file.clone() });
            }
            if let Some(file) = &running.cue.video_file {
                self.queue_media(MediaRequest::VideoPause { file: file.clone() });
            }
        }
        log::info!("Show paused at {:?}", self.state.master_time);
        self.emit_state();
    }

    pub fn resume_show(&mut self) {
        if !self.state.is_paused {
            return;
        }
        self.state.is_paused = false;
        for running in self.running.values() {
            if let Some(file) = &running.cue.audio_file {
                self.queue_media(MediaRequest::AudioResume { file: file.clone() });
            }
            if let Some(file) = &running.cue.video_file {
                self.queue_media(MediaRequest::VideoResume { file: file.clone() });
            }
        }
        log::info!("Show resumed");
        self.emit_state();
    }

    /// Seeks the video of a running cue.
    pub fn seek_video(&mut self, file: &str, position: Duration) -> EngineResult<()> {
        let playing = self
            .running
            .values()
            .any(|running| running.cue.video_file.as_deref() == Some(file));
        if !playing {
            return Err(EngineError::NotFound {
                kind: "playing video",
                id: file.to_string(),
            });
        }
        log::debug!("Seeking '{}' to {:?}", file, position);
        self.queue_media(MediaRequest::VideoSeek {
            file: file.to_string(),
            position,
        });
        Ok(())
    }

    /// Explicit stop of one running cue. Returns whether it was running.
    fn stop_running(&mut self, number: u32) -> bool {
        let Some(running) = self.running.remove(&number) else {
            return false;
        };

        if let Some(file) = &running.cue.audio_file {
            self.queue_media(MediaRequest::AudioStop { file: file.clone() });
        }
        if let Some(file) = &running.cue.video_file {
            self.queue_media(MediaRequest::VideoStop { file: file.clone() });
        }
        for handle in &running.faders {
            self.scheduler.remove_fader(*handle);
        }
        for handle in &running.players {
            self.scheduler.remove_player(*handle);
        }

        self.pending_midi.retain(|p| p.cue != number);
        self.continuous_midi.retain(|c| c.cue != number);
        self.pending_follows.remove(&number);

        let now = self.state.master_time;
        for command in &running.cue.midi_commands {
            if command.trigger_type == MidiTriggerType::OnCueStop {
                self.schedule_midi(number, command, now);
            }
        }

        self.state.running_cues.remove(&number);
        self.state.cue_start_times.remove(&number);
        self.state.is_playing = !self.state.running_cues.is_empty();
        self.sync_running_timelines();

        log::info!("Stopped cue {}", number);
        self.emit(ShowEvent::CueStopped { number });
        true
    }

    fn complete(&mut self, number: u32) {
        let Some(running) = self.running.remove(&number) else {
            return;
        };

        let now = self.state.master_time;
        for command in &running.cue.midi_commands {
            if command.trigger_type == MidiTriggerType::OnCueEnd {
                self.schedule_midi(number, command, now);
            }
        }
        self.continuous_midi.retain(|c| c.cue != number);

        self.state.running_cues.remove(&number);
        self.state.cue_start_times.remove(&number);
        self.state.is_playing = !self.state.running_cues.is_empty();

        log::debug!("Cue {} completed", number);
        self.emit(ShowEvent::CueCompleted { number });
    }

    // MIDI

    fn schedule_midi(&mut self, cue: u32, command: &MidiCommand, from: Duration) {
        if command.delay.is_zero() {
            self.send_midi(command);
        } else {
            self.pending_midi.push(PendingMidi {
                due: from + command.delay,
                cue,
                command: command.clone(),
            });
        }
    }

    fn send_midi(&self, command: &MidiCommand) {
        for (device, e) in output::send_command(self.midi.as_ref(), command) {
            log::warn!("MIDI send to '{}' failed: {}", device, e);
            self.emit(ShowEvent::TransportFailure {
                target: format!("midi:{}", device),
                message: e.to_string(),
            });
        }
    }

    /// Sends a command right away, outside of any cue.
    pub fn send_midi_command(&self, command: &MidiCommand) -> EngineResult<()> {
        let failures = output::send_command(self.midi.as_ref(), command);
        match failures.into_iter().next() {
            None => Ok(()),
            Some((device, e)) => Err(EngineError::transport(format!("midi:{}", device), e)),
        }
    }

    fn sync_running_timelines(&mut self) -> bool {
        let names: BTreeSet<String> = self.scheduler.running_timelines().into_iter().collect();
        if names != self.state.running_timelines {
            self.state.running_timelines = names;
            true
        } else {
            false
        }
    }

    // Tick

    /// Advances the show by `delta`: completes cues, sends due MIDI, fires
    /// auto-follows, then merges and flushes DMX. While paused only the
    /// flush happens.
    pub fn tick(&mut self, delta: Duration) {
        if self.state.is_paused {
            self.scheduler.tick(Duration::ZERO);
            return;
        }

        self.state.master_time += delta;
        let now = self.state.master_time;
        let mut changed = false;

        let finished: Vec<u32> = self
            .running
            .iter()
            .filter(|(number, running)| {
                self.state
                    .cue_start_times
                    .get(*number)
                    .is_some_and(|start| now.saturating_sub(*start) >= running.cue.duration)
            })
            .map(|(number, _)| *number)
            .collect();
        for number in finished {
            self.complete(number);
            changed = true;
        }

        let (mut due, pending): (Vec<PendingMidi>, Vec<PendingMidi>) = self
            .pending_midi
            .drain(..)
            .partition(|p| p.due <= now);
        self.pending_midi = pending;
        due.sort_by_key(|p| p.due);
        for p in &due {
            self.send_midi(&p.command);
        }

        let interval = self.continuous_interval;
        let mut repeats = Vec::new();
        for entry in self.continuous_midi.iter_mut() {
            if entry.next_due <= now {
                repeats.push(entry.command.clone());
                while entry.next_due <= now {
                    entry.next_due += interval;
                }
            }
        }
        for command in &repeats {
            self.send_midi(command);
        }

        // collect before firing so a chain of follows advances one link per tick
        let mut follows: Vec<(Duration, u32)> = self
            .pending_follows
            .iter()
            .filter(|(_, deadline)| **deadline <= now)
            .map(|(number, deadline)| (*deadline, *number))
            .collect();
        follows.sort();
        for (_, number) in &follows {
            self.pending_follows.remove(number);
        }
        for (_, number) in follows {
            log::info!("Auto-follow from cue {}", number);
            if let Err(e) = self.trigger_next_cue() {
                log::error!("Auto-follow from cue {} failed: {}", number, e);
            }
        }

        self.scheduler.tick(delta);
        if self.sync_running_timelines() {
            changed = true;
        }
        if changed {
            self.emit_state();
        }
    }
}
