use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::traits::{AudioTransport, ModuleId, VideoTransport};
use crate::cue::cue::{AudioOutput, VideoSettings};
use crate::error::TransportError;
use crate::messages::ShowEvent;

/// Audio/video work queued by the sequencer.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaRequest {
    AudioPlay {
        file: String,
        outputs: BTreeMap<u32, AudioOutput>,
    },
    AudioStop {
        file: String,
    },
    AudioPause {
        file: String,
    },
    AudioResume {
        file: String,
    },
    VideoPlay {
        file: String,
        settings: VideoSettings,
    },
    VideoStop {
        file: String,
    },
    VideoPause {
        file: String,
    },
    VideoResume {
        file: String,
    },
    VideoSeek {
        file: String,
        position: Duration,
    },
    Shutdown,
}

/// Runs media requests one at a time, in the order they were queued, so a
/// stop never overtakes the play it follows.
pub struct MediaWorker {
    audio: Arc<dyn AudioTransport>,
    video: Arc<dyn VideoTransport>,
    rx: mpsc::UnboundedReceiver<MediaRequest>,
    event_tx: mpsc::UnboundedSender<ShowEvent>,
}

impl MediaWorker {
    pub fn new(
        audio: Arc<dyn AudioTransport>,
        video: Arc<dyn VideoTransport>,
        rx: mpsc::UnboundedReceiver<MediaRequest>,
        event_tx: mpsc::UnboundedSender<ShowEvent>,
    ) -> Self {
        Self {
            audio,
            video,
            rx,
            event_tx,
        }
    }

    /// Spawns a worker and returns the queue feeding it.
    pub fn spawn(
        audio: Arc<dyn AudioTransport>,
        video: Arc<dyn VideoTransport>,
        event_tx: mpsc::UnboundedSender<ShowEvent>,
    ) -> (mpsc::UnboundedSender<MediaRequest>, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = Self::new(audio, video, rx, event_tx);
        (tx, tokio::spawn(worker.run()))
    }

    pub async fn run(mut self) {
        log::info!("Media worker started");
        while let Some(request) = self.rx.recv().await {
            if request == MediaRequest::Shutdown {
                break;
            }
            let (module, file, result) = self.handle(request).await;
            if let Err(e) = result {
                log::warn!("{} request for '{}' failed: {}", module.as_str(), file, e);
                let _ = self.event_tx.send(ShowEvent::TransportFailure {
                    target: format!("{}:{}", module.as_str(), file),
                    message: e.to_string(),
                });
            }
        }
        log::info!("Media worker stopped");
    }

    async fn handle(&self, request: MediaRequest) -> (ModuleId, String, Result<(), TransportError>) {
        match request {
            MediaRequest::AudioPlay { file, outputs } => {
                log::debug!("Audio play '{}'", file);
                let result = self.audio.play(&file, &outputs).await;
                (ModuleId::Audio, file, result)
            }
            MediaRequest::AudioStop { file } => {
                let result = self.audio.stop(&file).await;
                (ModuleId::Audio, file, result)
            }
            MediaRequest::AudioPause { file } => {
                let result = self.audio.pause(&file).await;
                (ModuleId::Audio, file, result)
            }
            MediaRequest::AudioResume { file } => {
                let result = self.audio.resume(&file).await;
                (ModuleId::Audio, file, result)
            }
            MediaRequest::VideoPlay { file, settings } => {
                log::debug!("Video play '{}' on '{}'", file, settings.output_display);
                let result = self.video.play(&file, &settings).await;
                (ModuleId::Video, file, result)
            }
            MediaRequest::VideoStop { file } => {
                let result = self.video.stop(&file).await;
                (ModuleId::Video, file, result)
            }
            MediaRequest::VideoPause { file } => {
                let result = self.video.pause(&file).await;
                (ModuleId::Video, file, result)
            }
            MediaRequest::VideoResume { file } => {
                let result = self.video.resume(&file).await;
                (ModuleId::Video, file, result)
            }
            MediaRequest::VideoSeek { file, position } => {
                let result = self.video.seek(&file, position).await;
                (ModuleId::Video, file, result)
            }
            MediaRequest::Shutdown => (ModuleId::Audio, String::new(), Ok(())),
        }
    }
}
