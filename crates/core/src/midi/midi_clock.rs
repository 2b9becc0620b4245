use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::codec;
use super::output;
use crate::error::{EngineError, EngineResult};
use crate::messages::ShowEvent;
use crate::modules::traits::MidiTransport;

pub const MIN_BPM: f64 = 30.0;
pub const MAX_BPM: f64 = 300.0;
pub const PULSES_PER_QUARTER: f64 = 24.0;

/// Time between two clock pulses at `bpm`.
pub fn pulse_interval(bpm: f64) -> Duration {
    Duration::from_secs_f64(60.0 / bpm / PULSES_PER_QUARTER)
}

fn clamp_bpm(bpm: f64) -> EngineResult<f64> {
    if !bpm.is_finite() {
        return Err(EngineError::invalid_range("bpm", bpm));
    }
    let clamped = bpm.clamp(MIN_BPM, MAX_BPM);
    if clamped != bpm {
        log::warn!("MIDI clock bpm {} clamped to {}", bpm, clamped);
    }
    Ok(clamped)
}

struct ClockState {
    bpm: f64,
    running: bool,
    pulses: u64,
}

/// 24 PPQN MIDI clock sent to every connected output.
pub struct MidiClock {
    transport: Arc<dyn MidiTransport>,
    state: Arc<Mutex<ClockState>>,
    task: Mutex<Option<JoinHandle<()>>>,
    event_tx: Option<mpsc::UnboundedSender<ShowEvent>>,
}

impl MidiClock {
    pub fn new(transport: Arc<dyn MidiTransport>, bpm: f64) -> Self {
        Self {
            transport,
            state: Arc::new(Mutex::new(ClockState {
                bpm: bpm.clamp(MIN_BPM, MAX_BPM),
                running: false,
                pulses: 0,
            })),
            task: Mutex::new(None),
            event_tx: None,
        }
    }

    pub fn with_events(mut self, event_tx: mpsc::UnboundedSender<ShowEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    fn emit(&self, event: ShowEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }

    fn send_realtime(&self, byte: u8) {
        for (device, e) in output::send_all(self.transport.as_ref(), &[byte]) {
            log::warn!("MIDI clock message to '{}' failed: {}", device, e);
        }
    }

    /// Starts the clock from pulse zero. Calling it while running only
    /// changes the tempo.
    pub fn start(&self, bpm: f64) -> EngineResult<()> {
        let bpm = clamp_bpm(bpm)?;
        {
            let mut state = self.state.lock();
            state.bpm = bpm;
            if state.running {
                return Ok(());
            }
            state.running = true;
            state.pulses = 0;
        }

        self.send_realtime(codec::START);
        self.spawn_pulses();
        log::info!("MIDI clock started at {} bpm", bpm);
        self.emit(ShowEvent::MidiClockStarted { bpm });
        Ok(())
    }

    /// Resumes pulses without resetting the song position.
    pub fn continue_clock(&self) {
        {
            let mut state = self.state.lock();
            if state.running {
                return;
            }
            state.running = true;
        }
        self.send_realtime(codec::CONTINUE);
        self.spawn_pulses();
        let bpm = self.bpm();
        log::info!("MIDI clock continued at {} bpm", bpm);
        self.emit(ShowEvent::MidiClockStarted { bpm });
    }

    pub fn stop(&self) {
        {
            let mut state = self.state.lock();
            if !state.running {
                return;
            }
            state.running = false;
        }
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.send_realtime(codec::STOP);
        log::info!("MIDI clock stopped");
        self.emit(ShowEvent::MidiClockStopped);
    }

    /// Takes effect from the next pulse.
    pub fn set_bpm(&self, bpm: f64) -> EngineResult<()> {
        let bpm = clamp_bpm(bpm)?;
        self.state.lock().bpm = bpm;
        Ok(())
    }

    pub fn bpm(&self) -> f64 {
        self.state.lock().bpm
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn pulse_count(&self) -> u64 {
        self.state.lock().pulses
    }

    fn spawn_pulses(&self) {
        let state = self.state.clone();
        let transport = self.transport.clone();
        let task = tokio::spawn(async move {
            loop {
                let interval = pulse_interval(state.lock().bpm);
                tokio::time::sleep(interval).await;
                {
                    let mut state = state.lock();
                    if !state.running {
                        break;
                    }
                    state.pulses += 1;
                }
                for (device, e) in output::send_all(transport.as_ref(), &[codec::CLOCK]) {
                    log::trace!("Clock pulse to '{}' failed: {}", device, e);
                }
            }
        });
        if let Some(old) = self.task.lock().replace(task) {
            old.abort();
        }
    }
}

impl Drop for MidiClock {
    fn drop(&mut self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingMidi;

    #[test]
    fn test_pulse_interval() {
        let interval = pulse_interval(120.0);
        assert!((interval.as_secs_f64() - 0.020833).abs() < 1e-5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_pulses_and_stop() {
        let midi = RecordingMidi::new(&["a", "b"]);
        let clock = MidiClock::new(Arc::new(midi.clone()), 120.0);
        clock.start(120.0).unwrap();
        assert_eq!(midi.count(&[codec::START]), 2);

        tokio::time::sleep(Duration::from_secs(1)).await;
        let pulses = clock.pulse_count();
        // 48 per second at 120 bpm, timers round to the millisecond
        assert!((44..=49).contains(&pulses), "pulses {}", pulses);
        assert_eq!(midi.count(&[codec::CLOCK]) as u64, pulses * 2);

        clock.stop();
        assert!(!clock.is_running());
        assert_eq!(midi.count(&[codec::STOP]), 2);
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(clock.pulse_count(), pulses);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bpm_clamped_and_nan_rejected() {
        let clock = MidiClock::new(Arc::new(RecordingMidi::new(&[])), 120.0);
        clock.set_bpm(500.0).unwrap();
        assert_eq!(clock.bpm(), MAX_BPM);
        clock.set_bpm(1.0).unwrap();
        assert_eq!(clock.bpm(), MIN_BPM);
        assert!(clock.set_bpm(f64::NAN).is_err());
        assert!(clock.start(f64::INFINITY).is_err());
        assert!(!clock.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_while_running_changes_tempo_only() {
        let midi = RecordingMidi::new(&["a"]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let clock = MidiClock::new(Arc::new(midi.clone()), 120.0).with_events(tx);
        clock.start(120.0).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        clock.start(60.0).unwrap();

        assert_eq!(midi.count(&[codec::START]), 1);
        assert_eq!(clock.bpm(), 60.0);
        assert!(clock.pulse_count() > 0);
        assert_eq!(rx.try_recv().ok(), Some(ShowEvent::MidiClockStarted { bpm: 120.0 }));
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_continue_keeps_counter() {
        let midi = RecordingMidi::new(&["a"]);
        let clock = MidiClock::new(Arc::new(midi.clone()), 120.0);
        clock.start(120.0).unwrap();
        tokio::time::sleep(Duration::from_millis(500)).await;
        clock.stop();
        let before = clock.pulse_count();

        clock.continue_clock();
        assert_eq!(midi.count(&[codec::CONTINUE]), 1);
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(clock.pulse_count() > before);
    }
}
