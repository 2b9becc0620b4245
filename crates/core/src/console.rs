use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

use crate::cue::cue::Cue;
use crate::cue::cue_sequencer::CueSequencer;
use crate::cue::show_state::ShowState;
use crate::dmx::dmx_scheduler::DmxScheduler;
use crate::error::{EngineError, EngineResult};
use crate::messages::{Settings, ShowCommand, ShowEvent, ShowReply};
use crate::midi::codec;
use crate::midi::midi::{MidiAction, MidiBinding, MidiCommand};
use crate::midi::midi_clock::MidiClock;
use crate::midi::midi_learn::MidiLearn;
use crate::modules::media_worker::{MediaRequest, MediaWorker};
use crate::modules::traits::{
    AudioTransport, DmxTransport, InboundMidi, MidiTransport, ProjectStore, VideoTransport,
};
use crate::show::show::Project;

/// The collaborators a console drives.
pub struct Transports {
    pub dmx: Box<dyn DmxTransport>,
    pub midi: Arc<dyn MidiTransport>,
    pub audio: Arc<dyn AudioTransport>,
    pub video: Arc<dyn VideoTransport>,
}

type Reply = oneshot::Sender<EngineResult<ShowReply>>;

struct Envelope {
    command: ShowCommand,
    reply: Option<Reply>,
}

/// Owns the sequencer and runs the show tick. All show state is mutated on
/// this task only; everything else talks to it through a [`ShowHandle`].
pub struct ShowConsole {
    sequencer: CueSequencer,
    settings: Settings,
    bindings: Vec<MidiBinding>,
    learn: Arc<MidiLearn>,
    clock: Arc<MidiClock>,
    event_tx: mpsc::UnboundedSender<ShowEvent>,
    state_tx: watch::Sender<ShowState>,
    media_tx: mpsc::UnboundedSender<MediaRequest>,
    media_worker: Option<JoinHandle<()>>,
}

async fn recv_inbound(rx: &mut Option<mpsc::UnboundedReceiver<InboundMidi>>) -> Option<InboundMidi> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl ShowConsole {
    /// Starts the console, its media worker and (stopped) MIDI clock on the
    /// current tokio runtime.
    pub fn spawn(
        settings: Settings,
        transports: Transports,
        inbound_midi: Option<mpsc::UnboundedReceiver<InboundMidi>>,
    ) -> (ShowHandle, mpsc::UnboundedReceiver<ShowEvent>, JoinHandle<()>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(ShowState::new());

        let (media_tx, media_worker) =
            MediaWorker::spawn(transports.audio, transports.video, event_tx.clone());

        let mut scheduler = DmxScheduler::new(transports.dmx, event_tx.clone());
        scheduler.set_master_intensity(settings.master_intensity);
        let mut sequencer = CueSequencer::new(
            scheduler,
            transports.midi.clone(),
            media_tx.clone(),
            event_tx.clone(),
        );
        sequencer.set_continuous_interval(settings.continuous_midi_interval());

        let clock = Arc::new(
            MidiClock::new(transports.midi, settings.midi_clock_bpm).with_events(event_tx.clone()),
        );
        let learn = Arc::new(MidiLearn::new());
        let learn_timeout = settings.midi_learn_timeout();

        let console = ShowConsole {
            sequencer,
            bindings: settings.midi_bindings.clone(),
            settings,
            learn: learn.clone(),
            clock: clock.clone(),
            event_tx,
            state_tx,
            media_tx,
            media_worker: Some(media_worker),
        };
        let task = tokio::spawn(console.run(command_rx, inbound_midi));

        let handle = ShowHandle {
            command_tx,
            state_rx,
            learn,
            learn_timeout,
            clock,
        };
        (handle, event_rx, task)
    }

    fn emit(&self, event: ShowEvent) {
        let _ = self.event_tx.send(event);
    }

    fn publish_state(&self) {
        let state = self.sequencer.show_state();
        self.state_tx.send_if_modified(|current| {
            if *current != state {
                *current = state;
                true
            } else {
                false
            }
        });
    }

    async fn run(
        mut self,
        mut command_rx: mpsc::UnboundedReceiver<Envelope>,
        mut inbound_rx: Option<mpsc::UnboundedReceiver<InboundMidi>>,
    ) {
        let mut tick = tokio::time::interval(self.settings.tick_interval());
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last_tick = Instant::now();
        let mut inbound_open = inbound_rx.is_some();

        log::info!(
            "Show console running at {} Hz",
            self.settings.show_tick_hz.max(1)
        );

        loop {
            tokio::select! {
                envelope = command_rx.recv() => {
                    let Some(Envelope { command, reply }) = envelope else {
                        log::info!("All show handles dropped");
                        break;
                    };
                    if matches!(command, ShowCommand::Shutdown) {
                        if let Some(reply) = reply {
                            let _ = reply.send(Ok(ShowReply::Done));
                        }
                        break;
                    }

                    let result = self.process_command(command);
                    match reply {
                        Some(reply) => {
                            let _ = reply.send(result);
                        }
                        None => {
                            if let Err(e) = result {
                                log::error!("Command failed: {}", e);
                                self.emit(ShowEvent::Error { message: e.to_string() });
                            }
                        }
                    }
                    self.publish_state();
                }

                _ = tick.tick() => {
                    let now = Instant::now();
                    let delta = now.duration_since(last_tick);
                    last_tick = now;
                    self.sequencer.tick(delta);
                    self.publish_state();
                }

                inbound = recv_inbound(&mut inbound_rx), if inbound_open => {
                    match inbound {
                        Some(message) => {
                            self.handle_inbound(message);
                            self.publish_state();
                        }
                        None => {
                            log::warn!("MIDI input closed");
                            inbound_open = false;
                        }
                    }
                }
            }
        }

        self.shutdown().await;
    }

    async fn shutdown(&mut self) {
        log::info!("Shutting down show console");
        self.sequencer.stop_all();
        self.clock.stop();
        self.learn.stop();
        let _ = self.media_tx.send(MediaRequest::Shutdown);
        if let Some(worker) = self.media_worker.take() {
            if tokio::time::timeout(Duration::from_secs(2), worker).await.is_err() {
                log::warn!("Media worker did not stop in time");
            }
        }
        self.publish_state();
        self.emit(ShowEvent::ShutdownComplete);
    }

    fn process_command(&mut self, command: ShowCommand) -> EngineResult<ShowReply> {
        use ShowCommand::*;

        log::debug!("Processing command: {:?}", command);
        let seq = &mut self.sequencer;

        match command {
            // handled by the run loop
            Shutdown => {}

            LoadProject { project } => {
                seq.load_project(&project)?;
                if let Err(e) = self.clock.set_bpm(project.settings.bpm) {
                    log::warn!("Project '{}' tempo ignored: {}", project.name, e);
                }
            }

            InsertCue { after, cue } => seq.insert_cue(after, *cue)?,
            UpdateCue { cue } => seq.update_cue(*cue)?,
            DeleteCue { number } => {
                seq.delete_cue(number)?;
            }

            Go => {
                let fired = seq.trigger_next_cue()?;
                if fired && seq.show_settings().start_clock_on_go && !self.clock.is_running() {
                    let bpm = seq.show_settings().bpm;
                    if let Err(e) = self.clock.start(bpm) {
                        log::error!("MIDI clock did not start on GO: {}", e);
                        self.emit(ShowEvent::Error {
                            message: format!("MIDI clock: {}", e),
                        });
                    }
                }
                return Ok(ShowReply::Fired(fired));
            }
            GoBack => return Ok(ShowReply::Fired(seq.go_back()?)),
            TriggerCue { number } => seq.trigger_cue(number)?,
            JumpToCue { number } => seq.jump_to_cue(number)?,
            StopCue { number } => seq.stop_cue(number)?,
            StopAll => seq.stop_all(),
            Pause => seq.pause_show(),
            Resume => seq.resume_show(),
            SeekVideo { file, position } => seq.seek_video(&file, position)?,

            StartTimeline { timeline, universe } => {
                seq.scheduler_mut().start_timeline(*timeline, universe, None)?;
            }
            StopTimeline { name } => seq.scheduler_mut().stop_timeline(&name)?,
            PauseTimeline { name } => seq.scheduler_mut().pause_timeline(&name)?,
            ResumeTimeline { name } => seq.scheduler_mut().resume_timeline(&name)?,

            Blackout => seq.scheduler_mut().blackout_all(),
            SetMasterIntensity { intensity } => seq.scheduler_mut().set_master_intensity(intensity),
            SetChannel {
                universe,
                channel,
                value,
            } => seq.scheduler_mut().set_channel(universe, channel, value)?,
            SetChannels { universe, values } => {
                seq.scheduler_mut().set_channels(universe, &values)?
            }
            SendScene { scene } => seq.scheduler_mut().send_scene(&scene)?,
            FadeScene { scene, fade_time } => {
                seq.scheduler_mut().fade_scene(&scene, fade_time, None)?;
            }
            ConnectUniverse { universe } => seq.scheduler_mut().connect_universe(universe)?,
            DisconnectUniverse { universe } => seq.scheduler_mut().disconnect_universe(universe)?,

            SendMidi { command } => seq.send_midi_command(&command)?,
            AddMidiBinding { binding } => self.bindings.push(binding),
            ClearMidiBindings => self.bindings.clear(),

            QueryCues => return Ok(ShowReply::Cues(seq.cues())),
            QueryCurrentCue => return Ok(ShowReply::CurrentCue(seq.current_cue().cloned())),
            QueryUniverse { universe } => {
                return Ok(ShowReply::UniverseData(
                    seq.scheduler().universe_data(universe).to_vec(),
                ))
            }
            QueryConnectedUniverses => {
                return Ok(ShowReply::Universes(seq.scheduler().connected_universes()))
            }
            QueryTimelinePosition { name } => {
                return Ok(ShowReply::Position(seq.scheduler().timeline_position(&name)?))
            }
            QueryRunningTimelines => {
                return Ok(ShowReply::Timelines(seq.scheduler().running_timelines()))
            }
            QueryProject => return Ok(ShowReply::Project(Box::new(seq.to_project()))),
        }

        Ok(ShowReply::Done)
    }

    /// Bindings get first pick of an inbound message, then a pending learn.
    fn handle_inbound(&mut self, message: InboundMidi) {
        let Some(command) = codec::parse(&message.device, &message.bytes) else {
            log::trace!("Ignoring MIDI {:02X?} from '{}'", message.bytes, message.device);
            return;
        };

        let action = self
            .bindings
            .iter()
            .find(|binding| binding.matches(&command))
            .map(|binding| binding.action.clone());
        if let Some(action) = action {
            log::debug!("MIDI binding {:?} from '{}'", action, message.device);
            let command = match action {
                MidiAction::Go => ShowCommand::Go,
                MidiAction::GoBack => ShowCommand::GoBack,
                MidiAction::TriggerCue(number) => ShowCommand::TriggerCue { number },
                MidiAction::StopAll => ShowCommand::StopAll,
                MidiAction::Blackout => ShowCommand::Blackout,
                MidiAction::Pause => ShowCommand::Pause,
                MidiAction::Resume => ShowCommand::Resume,
            };
            if let Err(e) = self.process_command(command) {
                log::warn!("MIDI binding {:?} failed: {}", action, e);
            }
            return;
        }

        if self.learn.offer(&command) {
            log::info!("MIDI learned {:?} from '{}'", command.message_type, command.device_name);
            self.emit(ShowEvent::MidiLearned { command });
        }
    }
}

/// Cloneable front end to a running [`ShowConsole`].
#[derive(Clone)]
pub struct ShowHandle {
    command_tx: mpsc::UnboundedSender<Envelope>,
    state_rx: watch::Receiver<ShowState>,
    learn: Arc<MidiLearn>,
    learn_timeout: Duration,
    clock: Arc<MidiClock>,
}

impl ShowHandle {
    /// Runs `command` on the console and waits for its outcome.
    pub async fn request(&self, command: ShowCommand) -> EngineResult<ShowReply> {
        let (tx, rx) = oneshot::channel();
        self.command_tx
            .send(Envelope {
                command,
                reply: Some(tx),
            })
            .map_err(|_| EngineError::ConsoleClosed)?;
        rx.await.map_err(|_| EngineError::ConsoleClosed)?
    }

    /// Queues `command` without waiting. Failures are published as
    /// [`ShowEvent::Error`].
    pub fn send(&self, command: ShowCommand) -> EngineResult<()> {
        self.command_tx
            .send(Envelope {
                command,
                reply: None,
            })
            .map_err(|_| EngineError::ConsoleClosed)
    }

    async fn done(&self, command: ShowCommand) -> EngineResult<()> {
        self.request(command).await.map(|_| ())
    }

    pub async fn go(&self) -> EngineResult<bool> {
        match self.request(ShowCommand::Go).await? {
            ShowReply::Fired(fired) => Ok(fired),
            _ => Ok(false),
        }
    }

    pub async fn go_back(&self) -> EngineResult<bool> {
        match self.request(ShowCommand::GoBack).await? {
            ShowReply::Fired(fired) => Ok(fired),
            _ => Ok(false),
        }
    }

    pub async fn trigger_cue(&self, number: u32) -> EngineResult<()> {
        self.done(ShowCommand::TriggerCue { number }).await
    }

    pub async fn jump_to_cue(&self, number: u32) -> EngineResult<()> {
        self.done(ShowCommand::JumpToCue { number }).await
    }

    pub async fn stop_cue(&self, number: u32) -> EngineResult<()> {
        self.done(ShowCommand::StopCue { number }).await
    }

    pub async fn stop_all(&self) -> EngineResult<()> {
        self.done(ShowCommand::StopAll).await
    }

    pub async fn pause(&self) -> EngineResult<()> {
        self.done(ShowCommand::Pause).await
    }

    pub async fn resume(&self) -> EngineResult<()> {
        self.done(ShowCommand::Resume).await
    }

    pub async fn seek_video(&self, file: &str, position: Duration) -> EngineResult<()> {
        self.done(ShowCommand::SeekVideo {
            file: file.to_string(),
            position,
        })
        .await
    }

    pub async fn blackout(&self) -> EngineResult<()> {
        self.done(ShowCommand::Blackout).await
    }

    pub async fn insert_cue(&self, after: Option<u32>, cue: Cue) -> EngineResult<()> {
        self.done(ShowCommand::InsertCue {
            after,
            cue: Box::new(cue),
        })
        .await
    }

    pub async fn load_project(&self, project: Project) -> EngineResult<()> {
        self.done(ShowCommand::LoadProject {
            project: Box::new(project),
        })
        .await
    }

    pub async fn load_project_from(
        &self,
        store: &dyn ProjectStore,
        path: &Path,
    ) -> Result<(), anyhow::Error> {
        let project = store.load(path).await?;
        log::info!("Loading project '{}' from {}", project.name, path.display());
        self.load_project(project).await?;
        Ok(())
    }

    pub async fn save_project_to(
        &self,
        store: &dyn ProjectStore,
        path: &Path,
    ) -> Result<(), anyhow::Error> {
        let mut project = match self.request(ShowCommand::QueryProject).await? {
            ShowReply::Project(project) => *project,
            other => anyhow::bail!("unexpected reply {:?}", other),
        };
        project.touch();
        store.save(&project, path).await?;
        log::info!("Saved project '{}' to {}", project.name, path.display());
        Ok(())
    }

    pub async fn cues(&self) -> EngineResult<Vec<Cue>> {
        match self.request(ShowCommand::QueryCues).await? {
            ShowReply::Cues(cues) => Ok(cues),
            _ => Ok(Vec::new()),
        }
    }

    pub async fn current_cue(&self) -> EngineResult<Option<Cue>> {
        match self.request(ShowCommand::QueryCurrentCue).await? {
            ShowReply::CurrentCue(cue) => Ok(cue),
            _ => Ok(None),
        }
    }

    pub async fn universe_data(&self, universe: u16) -> EngineResult<Vec<u8>> {
        match self.request(ShowCommand::QueryUniverse { universe }).await? {
            ShowReply::UniverseData(data) => Ok(data),
            _ => Ok(Vec::new()),
        }
    }

    /// Latest published state.
    pub fn state(&self) -> ShowState {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ShowState> {
        self.state_rx.clone()
    }

    /// Captures the next inbound MIDI message not taken by a binding.
    pub async fn learn_midi(&self, timeout: Duration) -> EngineResult<Option<MidiCommand>> {
        self.learn.start(timeout).await
    }

    /// [`ShowHandle::learn_midi`] with the configured timeout.
    pub async fn learn_midi_default(&self) -> EngineResult<Option<MidiCommand>> {
        self.learn_midi(self.learn_timeout).await
    }

    pub fn stop_learning(&self) {
        self.learn.stop();
    }

    pub fn is_learning(&self) -> bool {
        self.learn.is_learning()
    }

    pub fn clock(&self) -> &MidiClock {
        &self.clock
    }

    pub async fn shutdown(&self) -> EngineResult<()> {
        self.done(ShowCommand::Shutdown).await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::dmx::scene::DmxScene;
    use crate::midi::midi::MidiMessageType;
    use crate::test_support::{RecordingDmx, RecordingMedia, RecordingMidi};

    struct Fixture {
        handle: ShowHandle,
        events: mpsc::UnboundedReceiver<ShowEvent>,
        inbound: mpsc::UnboundedSender<InboundMidi>,
        midi: RecordingMidi,
        task: JoinHandle<()>,
    }

    fn start(settings: Settings) -> Fixture {
        let midi = RecordingMidi::new(&["out"]);
        let media = RecordingMedia::new();
        let (inbound, inbound_rx) = mpsc::unbounded_channel();
        let (handle, events, task) = ShowConsole::spawn(
            settings,
            Transports {
                dmx: Box::new(RecordingDmx::new()),
                midi: Arc::new(midi.clone()),
                audio: Arc::new(media.clone()),
                video: Arc::new(media),
            },
            Some(inbound_rx),
        );
        Fixture {
            handle,
            events,
            inbound,
            midi,
            task,
        }
    }

    fn cue(number: u32) -> Cue {
        let mut cue = Cue::new(number, format!("Cue {}", number));
        cue.duration = Duration::from_secs(30);
        cue
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ShowEvent>) -> Vec<ShowEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[tokio::test(start_paused = true)]
    async fn test_go_updates_state_and_events() {
        let mut fx = start(Settings::default());
        fx.handle.insert_cue(None, cue(1)).await.unwrap();
        fx.handle.insert_cue(None, cue(2)).await.unwrap();

        assert!(fx.handle.go().await.unwrap());
        assert_eq!(fx.handle.state().current_cue_number, Some(1));
        assert!(fx.handle.go().await.unwrap());
        assert!(!fx.handle.go().await.unwrap());
        assert_eq!(fx.handle.current_cue().await.unwrap().map(|c| c.number), Some(2));

        let events = drain(&mut fx.events);
        assert!(events.contains(&ShowEvent::CueTriggered {
            number: 1,
            name: "Cue 1".into()
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_drives_fades() {
        let fx = start(Settings::default());
        let mut lit = cue(1);
        lit.dmx_scenes.push(
            DmxScene::new("warm", 1)
                .with_value(1, 200)
                .with_fade(Duration::from_secs(1)),
        );
        fx.handle.insert_cue(None, lit).await.unwrap();
        fx.handle.trigger_cue(1).await.unwrap();

        tokio::time::sleep(Duration::from_millis(500)).await;
        let mid = fx.handle.universe_data(1).await.unwrap()[0];
        assert!(mid > 50 && mid < 150, "mid-fade value {}", mid);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(fx.handle.universe_data(1).await.unwrap()[0], 200);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_reach_the_caller() {
        let fx = start(Settings::default());
        assert_eq!(
            fx.handle.trigger_cue(42).await,
            Err(EngineError::cue_not_found(42))
        );
        assert!(matches!(
            fx.handle
                .request(ShowCommand::SetChannel {
                    universe: 1,
                    channel: 513,
                    value: 1
                })
                .await,
            Err(EngineError::InvalidRange { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_binding_beats_learn() {
        let mut settings = Settings::default();
        settings
            .midi_bindings
            .push(MidiBinding::new(MidiMessageType::NoteOn, Some(60), MidiAction::Go));
        let mut fx = start(settings);
        fx.handle.insert_cue(None, cue(1)).await.unwrap();

        let learner = tokio::spawn({
            let handle = fx.handle.clone();
            async move { handle.learn_midi(Duration::from_secs(5)).await }
        });
        while !fx.handle.is_learning() {
            tokio::task::yield_now().await;
        }

        fx.inbound
            .send(InboundMidi {
                device: "pad".into(),
                bytes: vec![0x90, 60, 100],
            })
            .unwrap();
        fx.inbound
            .send(InboundMidi {
                device: "pad".into(),
                bytes: vec![0xB1, 7, 90],
            })
            .unwrap();

        let learned = learner.await.unwrap().unwrap().unwrap();
        assert_eq!(learned.message_type, MidiMessageType::ControlChange);
        assert_eq!(learned.channel, 2);
        assert_eq!(learned.controller, 7);
        assert_eq!(fx.handle.state().current_cue_number, Some(1));

        let events = drain(&mut fx.events);
        assert!(events
            .iter()
            .any(|e| matches!(e, ShowEvent::MidiLearned { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_go_starts_clock_when_configured() {
        let fx = start(Settings::default());
        let mut project = Project::new("Clocked").with_cue(cue(1));
        project.settings.start_clock_on_go = true;
        project.settings.bpm = 100.0;
        fx.handle.load_project(project).await.unwrap();

        assert!(!fx.handle.clock().is_running());
        fx.handle.go().await.unwrap();
        assert!(fx.handle.clock().is_running());
        assert_eq!(fx.handle.clock().bpm(), 100.0);
        assert_eq!(fx.midi.count(&[codec::START]), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_go_fires_when_clock_fails() {
        let mut fx = start(Settings::default());
        let mut project = Project::new("Bad tempo").with_cue(cue(1));
        project.settings.start_clock_on_go = true;
        project.settings.bpm = f64::NAN;
        fx.handle.load_project(project).await.unwrap();

        assert!(fx.handle.go().await.unwrap());
        assert_eq!(fx.handle.state().running_cues.len(), 1);
        assert!(!fx.handle.clock().is_running());
        assert!(drain(&mut fx.events)
            .iter()
            .any(|e| matches!(e, ShowEvent::Error { message } if message.contains("clock"))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_learn_timeout_from_settings() {
        let mut settings = Settings::default();
        settings.midi_learn_timeout_ms = 200;
        let fx = start(settings);

        let started = Instant::now();
        assert_eq!(fx.handle.learn_midi_default().await.unwrap(), None);
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(!fx.handle.is_learning());
    }

    #[tokio::test(start_paused = true)]
    async fn test_seek_video_reaches_transport() {
        let media = RecordingMedia::new();
        let (handle, _events, task) = ShowConsole::spawn(
            Settings::default(),
            Transports {
                dmx: Box::new(RecordingDmx::new()),
                midi: Arc::new(RecordingMidi::new(&[])),
                audio: Arc::new(RecordingMedia::new()),
                video: Arc::new(media.clone()),
            },
            None,
        );
        let mut clip = cue(1);
        clip.video_file = Some("clip.mp4".into());
        handle.insert_cue(None, clip).await.unwrap();
        handle.trigger_cue(1).await.unwrap();
        handle
            .seek_video("clip.mp4", Duration::from_secs(2))
            .await
            .unwrap();
        assert!(handle.seek_video("nope.mp4", Duration::ZERO).await.is_err());

        handle.shutdown().await.unwrap();
        task.await.unwrap();
        assert_eq!(
            media.calls(),
            vec!["play:clip.mp4", "seek:clip.mp4", "stop:clip.mp4"]
        );
    }

    #[derive(Default)]
    struct MemoryStore {
        projects: Mutex<HashMap<PathBuf, Project>>,
    }

    #[async_trait]
    impl ProjectStore for MemoryStore {
        async fn load(&self, path: &Path) -> Result<Project, anyhow::Error> {
            self.projects
                .lock()
                .get(path)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no project at {}", path.display()))
        }

        async fn save(&self, project: &Project, path: &Path) -> Result<(), anyhow::Error> {
            self.projects
                .lock()
                .insert(path.to_path_buf(), project.clone());
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_project_store_round_trip() {
        let fx = start(Settings::default());
        let store = MemoryStore::default();
        assert!(fx
            .handle
            .load_project_from(&store, Path::new("missing.show"))
            .await
            .is_err());

        store
            .save(
                &Project::new("Tour").with_cue(cue(1)).with_cue(cue(2)),
                Path::new("tour.show"),
            )
            .await
            .unwrap();
        fx.handle
            .load_project_from(&store, Path::new("tour.show"))
            .await
            .unwrap();
        fx.handle.insert_cue(Some(2), cue(3)).await.unwrap();
        fx.handle
            .save_project_to(&store, Path::new("tour-edit.show"))
            .await
            .unwrap();

        let saved = store.load(Path::new("tour-edit.show")).await.unwrap();
        assert_eq!(saved.name, "Tour");
        assert_eq!(saved.cues.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown() {
        let mut fx = start(Settings::default());
        fx.handle.insert_cue(None, cue(1)).await.unwrap();
        fx.handle.go().await.unwrap();

        fx.handle.shutdown().await.unwrap();
        fx.task.await.unwrap();
        assert!(drain(&mut fx.events).contains(&ShowEvent::ShutdownComplete));
        assert!(fx.handle.state().running_cues.is_empty());
        assert_eq!(fx.handle.go().await, Err(EngineError::ConsoleClosed));
    }
}
