use std::collections::BTreeMap;
use std::time::Duration;

use tokio::sync::mpsc;

use super::arena::{Arena, Handle};
use super::channel_buffer::{
    validate_channel, validate_universe, ChannelBuffer, SourceKind, DMX_CHANNELS,
};
use super::scene::{DmxScene, DmxUniverse};
use super::scene_fader::SceneFader;
use crate::error::{EngineError, EngineResult};
use crate::messages::ShowEvent;
use crate::modules::traits::DmxTransport;
use crate::timeline::timeline::Timeline;
use crate::timeline::timeline_player::TimelinePlayer;

#[derive(Default)]
struct UniverseSlot {
    buffer: ChannelBuffer,
    faders: Arena<SceneFader>,
    players: Arena<TimelinePlayer>,
    info: Option<DmxUniverse>,
    degraded: bool,
}

/// Merges fader and player output per universe and flushes it every tick.
pub struct DmxScheduler {
    transport: Box<dyn DmxTransport>,
    universes: BTreeMap<u16, UniverseSlot>,
    master_intensity: f32,
    suppress_next_tick: bool,
    default_universe: u16,
    event_tx: mpsc::UnboundedSender<ShowEvent>,
}

impl DmxScheduler {
    pub fn new(
        transport: Box<dyn DmxTransport>,
        event_tx: mpsc::UnboundedSender<ShowEvent>,
    ) -> Self {
        Self {
            transport,
            universes: BTreeMap::new(),
            master_intensity: 1.0,
            suppress_next_tick: false,
            default_universe: 1,
            event_tx,
        }
    }

    fn slot(&mut self, universe: u16) -> &mut UniverseSlot {
        self.universes.entry(universe).or_default()
    }

    fn emit(&self, event: ShowEvent) {
        let _ = self.event_tx.send(event);
    }

    /// Makes `universe` part of the flush set without writing to it.
    pub fn ensure_universe(&mut self, universe: u16) -> EngineResult<()> {
        validate_universe(universe)?;
        self.slot(universe);
        Ok(())
    }

    pub fn universes(&self) -> Vec<u16> {
        self.universes.keys().copied().collect()
    }

    /// Universe for timelines that name none, explicitly or through their
    /// first step.
    pub fn set_default_universe(&mut self, universe: u16) -> EngineResult<()> {
        self.default_universe = validate_universe(universe)?;
        Ok(())
    }

    pub fn default_universe(&self) -> u16 {
        self.default_universe
    }

    pub fn is_degraded(&self, universe: u16) -> bool {
        self.universes.get(&universe).is_some_and(|s| s.degraded)
    }

    // Faders

    pub fn register_scene(
        &mut self,
        scene: &DmxScene,
        cue_number: Option<u32>,
    ) -> EngineResult<Handle> {
        self.fade_scene(scene, scene.fade_time, cue_number)
    }

    /// Registers a fader for `scene` with `fade_time` in place of the
    /// scene's own.
    pub fn fade_scene(
        &mut self,
        scene: &DmxScene,
        fade_time: Duration,
        cue_number: Option<u32>,
    ) -> EngineResult<Handle> {
        validate_universe(scene.universe)?;
        let slot = self.slot(scene.universe);
        let fader = SceneFader::new(scene, fade_time, &slot.buffer);
        let id = slot.faders.insert(fader);
        log::debug!(
            "Registered fader '{}' on universe {} ({:?}, cue {:?})",
            scene.name,
            scene.universe,
            fade_time,
            cue_number
        );
        Ok(Handle {
            universe: scene.universe,
            id,
        })
    }

    pub fn remove_fader(&mut self, handle: Handle) -> bool {
        self.universes
            .get_mut(&handle.universe)
            .and_then(|slot| slot.faders.remove(handle.id))
            .is_some()
    }

    pub fn active_fader_count(&self) -> usize {
        self.universes.values().map(|s| s.faders.len()).sum()
    }

    // Players

    /// Starts `timeline`, replacing any running player with the same name.
    pub fn start_timeline(
        &mut self,
        timeline: Timeline,
        universe: Option<u16>,
        cue_number: Option<u32>,
    ) -> EngineResult<Handle> {
        let universe = universe
            .or_else(|| timeline.default_universe())
            .unwrap_or(self.default_universe);
        validate_universe(universe)?;

        if let Some(existing) = self.find_player(&timeline.name) {
            log::info!("Restarting timeline '{}'", timeline.name);
            self.remove_player(existing);
        }

        let player = TimelinePlayer::new(timeline, Some(universe), cue_number);
        let universe = player.universe();
        let name = player.name().to_string();
        let id = self.slot(universe).players.insert(player);

        self.emit(ShowEvent::TimelineStarted {
            name,
            universe,
        });
        Ok(Handle { universe, id })
    }

    pub fn remove_player(&mut self, handle: Handle) -> bool {
        self.universes
            .get_mut(&handle.universe)
            .and_then(|slot| slot.players.remove(handle.id))
            .is_some()
    }

    fn find_player(&self, name: &str) -> Option<Handle> {
        self.universes.iter().find_map(|(universe, slot)| {
            slot.players
                .iter()
                .find(|(_, p)| p.name() == name)
                .map(|(id, _)| Handle {
                    universe: *universe,
                    id,
                })
        })
    }

    fn player_mut(&mut self, name: &str) -> EngineResult<&mut TimelinePlayer> {
        let handle = self
            .find_player(name)
            .ok_or_else(|| EngineError::timeline_not_found(name))?;
        self.universes
            .get_mut(&handle.universe)
            .and_then(|slot| slot.players.get_mut(handle.id))
            .ok_or_else(|| EngineError::timeline_not_found(name))
    }

    pub fn pause_timeline(&mut self, name: &str) -> EngineResult<()> {
        self.player_mut(name)?.pause();
        Ok(())
    }

    pub fn resume_timeline(&mut self, name: &str) -> EngineResult<()> {
        self.player_mut(name)?.resume();
        Ok(())
    }

    pub fn stop_timeline(&mut self, name: &str) -> EngineResult<()> {
        let handle = self
            .find_player(name)
            .ok_or_else(|| EngineError::timeline_not_found(name))?;
        self.remove_player(handle);
        Ok(())
    }

    pub fn timeline_position(&self, name: &str) -> EngineResult<Duration> {
        self.universes
            .values()
            .flat_map(|slot| slot.players.iter())
            .find(|(_, p)| p.name() == name)
            .map(|(_, p)| p.position())
            .ok_or_else(|| EngineError::timeline_not_found(name))
    }

    /// Names of running timelines in universe then registration order.
    pub fn running_timelines(&self) -> Vec<String> {
        self.universes
            .values()
            .flat_map(|slot| slot.players.iter())
            .map(|(_, p)| p.name().to_string())
            .collect()
    }

    /// Removes every player and fader.
    pub fn clear_all(&mut self) {
        for slot in self.universes.values_mut() {
            slot.faders.clear();
            slot.players.clear();
        }
    }

    // Direct channel access

    pub fn set_channel(&mut self, universe: u16, channel: u16, value: u8) -> EngineResult<()> {
        validate_universe(universe)?;
        validate_channel(channel)?;
        self.slot(universe)
            .buffer
            .set(channel, value, SourceKind::Direct)
    }

    /// Writes every value or none of them.
    pub fn set_channels(&mut self, universe: u16, values: &BTreeMap<u16, u8>) -> EngineResult<()> {
        validate_universe(universe)?;
        for channel in values.keys() {
            validate_channel(*channel)?;
        }
        let slot = self.slot(universe);
        for (channel, value) in values {
            slot.buffer.set(*channel, *value, SourceKind::Direct)?;
        }
        Ok(())
    }

    /// Writes a scene's values straight into the held buffer.
    pub fn send_scene(&mut self, scene: &DmxScene) -> EngineResult<()> {
        self.set_channels(scene.universe, &scene.channel_values)
    }

    /// Held (unscaled) buffer of `universe`; all zeros for an unknown one.
    pub fn universe_data(&self, universe: u16) -> [u8; DMX_CHANNELS] {
        self.universes
            .get(&universe)
            .map(|slot| *slot.buffer.data())
            .unwrap_or([0; DMX_CHANNELS])
    }

    pub fn set_master_intensity(&mut self, intensity: f32) {
        let clamped = if intensity.is_nan() {
            0.0
        } else {
            intensity.clamp(0.0, 1.0)
        };
        if clamped != intensity {
            log::warn!("Master intensity {} clamped to {}", intensity, clamped);
        }
        self.master_intensity = clamped;
    }

    pub fn master_intensity(&self) -> f32 {
        self.master_intensity
    }

    // Connections

    pub fn connect_universe(&mut self, mut universe: DmxUniverse) -> EngineResult<()> {
        let number = validate_universe(universe.universe_number)?;
        if let Err(e) = self.transport.connect(&universe) {
            log::error!("Failed to connect universe {}: {}", number, e);
            return Err(EngineError::transport(format!("universe {}", number), e));
        }
        universe.is_connected = true;
        self.slot(number).info = Some(universe);
        log::info!("Universe {} connected", number);
        self.emit(ShowEvent::UniverseConnected { universe: number });
        Ok(())
    }

    pub fn disconnect_universe(&mut self, universe: u16) -> EngineResult<()> {
        let connected = self
            .universes
            .get(&universe)
            .and_then(|slot| slot.info.as_ref())
            .is_some_and(|info| info.is_connected);
        if !connected {
            return Err(EngineError::NotFound {
                kind: "connected universe",
                id: universe.to_string(),
            });
        }

        let result = self.transport.disconnect(universe);
        if let Some(info) = self.slot(universe).info.as_mut() {
            info.is_connected = false;
        }
        self.emit(ShowEvent::UniverseDisconnected { universe });
        result.map_err(|e| EngineError::transport(format!("universe {}", universe), e))
    }

    pub fn connected_universes(&self) -> Vec<DmxUniverse> {
        self.universes
            .values()
            .filter_map(|slot| slot.info.clone())
            .filter(|info| info.is_connected)
            .collect()
    }

    // Output

    /// Zeroes every universe and flushes immediately. Contributions are
    /// dropped for the following tick.
    pub fn blackout_all(&mut self) {
        log::info!("Blackout");
        let zero = [0u8; DMX_CHANNELS];
        let numbers: Vec<u16> = self.universes.keys().copied().collect();
        for number in numbers {
            if let Some(slot) = self.universes.get_mut(&number) {
                slot.buffer.zero();
            }
            self.flush_frame(number, &zero);
        }
        self.suppress_next_tick = true;
    }

    /// Advances every fader and player by `delta`, merges their output into
    /// the held buffers and flushes every universe.
    pub fn tick(&mut self, delta: Duration) {
        let suppress = std::mem::take(&mut self.suppress_next_tick);
        let mut events = Vec::new();
        let mut frames = Vec::with_capacity(self.universes.len());

        for (&number, slot) in self.universes.iter_mut() {
            slot.buffer.clear_marks();

            let mut finished = Vec::new();
            for (id, fader) in slot.faders.iter_mut() {
                let tick = fader.advance(delta);
                if !suppress {
                    for (channel, value) in tick.values {
                        // channels were validated when the fader was built
                        let _ = slot.buffer.set(channel, value, SourceKind::Fader);
                    }
                }
                if tick.completed {
                    finished.push(id);
                }
            }
            for id in finished.drain(..) {
                slot.faders.remove(id);
            }

            for (id, player) in slot.players.iter_mut() {
                let tick = player.advance(delta);
                for step_index in tick.started_steps {
                    let channel = player.timeline().steps[step_index].channel;
                    events.push(ShowEvent::StepExecuted {
                        timeline: player.name().to_string(),
                        step_index,
                        universe: number,
                        channel,
                    });
                }
                if !suppress {
                    for (channel, value) in tick.values {
                        if let Err(e) = slot.buffer.set(channel, value, SourceKind::Player) {
                            log::trace!("Timeline '{}': {}", player.name(), e);
                        }
                    }
                }
                if tick.completed {
                    finished.push(id);
                }
            }
            for id in finished {
                if let Some(player) = slot.players.remove(id) {
                    log::debug!("Timeline '{}' completed", player.name());
                    events.push(ShowEvent::TimelineCompleted {
                        name: player.name().to_string(),
                        universe: number,
                    });
                }
            }

            frames.push((number, slot.buffer.scaled(self.master_intensity)));
        }

        for (number, frame) in frames {
            self.flush_frame(number, &frame);
        }
        for event in events {
            self.emit(event);
        }
    }

    fn flush_frame(&mut self, universe: u16, frame: &[u8; DMX_CHANNELS]) {
        let result = self.transport.send(universe, frame);
        let Some(slot) = self.universes.get_mut(&universe) else {
            return;
        };

        match result {
            Ok(()) => {
                if slot.degraded {
                    slot.degraded = false;
                    log::info!("Universe {} recovered", universe);
                    let _ = self
                        .event_tx
                        .send(ShowEvent::UniverseRecovered { universe });
                }
            }
            Err(e) => {
                if !slot.degraded {
                    slot.degraded = true;
                    log::warn!("Universe {} output failed: {}", universe, e);
                    let _ = self.event_tx.send(ShowEvent::UniverseDegraded {
                        universe,
                        message: e.to_string(),
                    });
                }
            }
        }
    }
}
