pub mod cue;
pub mod cue_sequencer;
pub mod show_state;
pub mod validation;
