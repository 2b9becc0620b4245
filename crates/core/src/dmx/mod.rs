pub mod arena;
pub mod channel_buffer;
pub mod dmx_scheduler;
pub mod scene;
pub mod scene_fader;
