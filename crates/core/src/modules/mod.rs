pub mod media_worker;
pub mod traits;

// Re-export for convenience
pub use traits::{
    AudioTransport, DmxTransport, InboundMidi, MidiTransport, ModuleId, ProjectStore,
    VideoTransport,
};
