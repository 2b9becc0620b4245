pub mod codec;
pub mod midi;
pub mod midi_clock;
pub mod midi_device;
pub mod midi_learn;
pub mod output;
