use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::midi::MidiCommand;
use crate::error::{EngineError, EngineResult};

#[derive(Default)]
struct LearnSlot {
    generation: u64,
    armed: Option<(u64, oneshot::Sender<MidiCommand>)>,
}

/// Captures the next inbound MIDI message. One capture at a time.
#[derive(Default)]
pub struct MidiLearn {
    slot: Mutex<LearnSlot>,
}

impl MidiLearn {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits up to `timeout` for the next inbound message. `Ok(None)` on
    /// timeout or when [`MidiLearn::stop`] is called.
    pub async fn start(&self, timeout: Duration) -> EngineResult<Option<MidiCommand>> {
        let (tx, rx) = oneshot::channel();
        let generation = {
            let mut slot = self.slot.lock();
            if slot.armed.as_ref().is_some_and(|(_, tx)| !tx.is_closed()) {
                return Err(EngineError::AlreadyInProgress("MIDI learn"));
            }
            slot.generation += 1;
            let generation = slot.generation;
            slot.armed = Some((generation, tx));
            generation
        };
        log::info!("MIDI learn armed for {:?}", timeout);

        let learned = match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(command)) => Some(command),
            Ok(Err(_)) => None,
            Err(_) => {
                log::info!("MIDI learn timed out");
                None
            }
        };

        let mut slot = self.slot.lock();
        if slot.armed.as_ref().is_some_and(|(g, _)| *g == generation) {
            slot.armed = None;
        }
        Ok(learned)
    }

    pub fn stop(&self) {
        if self.slot.lock().armed.take().is_some() {
            log::info!("MIDI learn cancelled");
        }
    }

    /// Hands `command` to a waiting capture. Returns whether it was taken.
    pub fn offer(&self, command: &MidiCommand) -> bool {
        let Some((_, tx)) = self.slot.lock().armed.take() else {
            return false;
        };
        tx.send(command.clone()).is_ok()
    }

    pub fn is_learning(&self) -> bool {
        self.slot
            .lock()
            .armed
            .as_ref()
            .is_some_and(|(_, tx)| !tx.is_closed())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    async fn wait_armed(learn: &MidiLearn) {
        while !learn.is_learning() {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_then_rearm() {
        let learn = MidiLearn::new();
        let started = tokio::time::Instant::now();
        assert_eq!(learn.start(Duration::from_millis(200)).await, Ok(None));
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(!learn.is_learning());

        let learn = Arc::new(learn);
        let waiter = tokio::spawn({
            let learn = learn.clone();
            async move { learn.start(Duration::from_secs(5)).await }
        });
        wait_armed(&learn).await;
        let command = MidiCommand::control_change("pad", 2, 7, 100);
        assert!(learn.offer(&command));
        assert_eq!(waiter.await.unwrap(), Ok(Some(command)));
        assert!(!learn.offer(&MidiCommand::default()));
    }

    #[tokio::test]
    async fn test_second_start_rejected() {
        let learn = Arc::new(MidiLearn::new());
        let waiter = tokio::spawn({
            let learn = learn.clone();
            async move { learn.start(Duration::from_secs(5)).await }
        });
        wait_armed(&learn).await;

        assert_eq!(
            learn.start(Duration::from_millis(10)).await,
            Err(EngineError::AlreadyInProgress("MIDI learn"))
        );

        learn.stop();
        assert_eq!(waiter.await.unwrap(), Ok(None));
        assert!(!learn.is_learning());
    }
}
