use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MidiMessageType {
    NoteOn,
    NoteOff,
    ControlChange,
    ProgramChange,
    PitchBend,
    SystemExclusive,
    Clock,
    Start,
    Stop,
    Continue,
}

impl MidiMessageType {
    /// Real-time messages have no channel or data bytes.
    pub fn is_realtime(&self) -> bool {
        matches!(
            self,
            MidiMessageType::Clock
                | MidiMessageType::Start
                | MidiMessageType::Stop
                | MidiMessageType::Continue
        )
    }
}

/// When a cue sends one of its MIDI commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MidiTriggerType {
    /// At cue start plus the command's delay.
    #[default]
    OnCueStart,
    /// When the cue's duration runs out, plus the delay.
    OnCueEnd,
    /// When the cue is stopped explicitly.
    OnCueStop,
    /// Repeatedly while the cue runs.
    Continuous,
    // Scheduled like OnCueStart; there is no beat or frame source.
    OnBeat,
    OnFrame,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiCommand {
    pub name: String,
    pub device_name: String,
    /// 1-16
    pub channel: u8,
    pub message_type: MidiMessageType,
    pub controller: u8,
    pub note: u8,
    /// Velocity, CC value, program, or 14-bit pitch bend (0..=16383).
    pub value: u16,
    #[serde(default)]
    pub sysex: Vec<u8>,
    #[serde(default)]
    pub delay: Duration,
    #[serde(default)]
    pub trigger_type: MidiTriggerType,
}

impl Default for MidiCommand {
    fn default() -> Self {
        Self {
            name: String::new(),
            device_name: String::new(),
            channel: 1,
            message_type: MidiMessageType::NoteOn,
            controller: 0,
            note: 60,
            value: 127,
            sysex: Vec::new(),
            delay: Duration::ZERO,
            trigger_type: MidiTriggerType::OnCueStart,
        }
    }
}

impl MidiCommand {
    pub fn note(device: &str, channel: u8, note: u8, velocity: u8, on: bool) -> Self {
        Self {
            device_name: device.to_string(),
            channel,
            message_type: if on {
                MidiMessageType::NoteOn
            } else {
                MidiMessageType::NoteOff
            },
            note: note.min(127),
            value: velocity.min(127) as u16,
            ..Self::default()
        }
    }

    pub fn control_change(device: &str, channel: u8, controller: u8, value: u8) -> Self {
        Self {
            device_name: device.to_string(),
            channel,
            message_type: MidiMessageType::ControlChange,
            controller: controller.min(127),
            value: value.min(127) as u16,
            ..Self::default()
        }
    }

    pub fn program_change(device: &str, channel: u8, program: u8) -> Self {
        Self {
            device_name: device.to_string(),
            channel,
            message_type: MidiMessageType::ProgramChange,
            value: program.min(127) as u16,
            ..Self::default()
        }
    }

    pub fn sysex(device: &str, payload: Vec<u8>) -> Self {
        Self {
            device_name: device.to_string(),
            message_type: MidiMessageType::SystemExclusive,
            sysex: payload,
            ..Self::default()
        }
    }

    pub fn with_trigger(mut self, trigger_type: MidiTriggerType, delay: Duration) -> Self {
        self.trigger_type = trigger_type;
        self.delay = delay;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

/// What an inbound MIDI binding does to the show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MidiAction {
    Go,
    GoBack,
    TriggerCue(u32),
    StopAll,
    Blackout,
    Pause,
    Resume,
}

/// Maps an inbound message pattern to a [`MidiAction`]. `None` fields match
/// anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MidiBinding {
    pub message_type: MidiMessageType,
    #[serde(default)]
    pub channel: Option<u8>,
    /// Note number for note messages, controller number for CC.
    #[serde(default)]
    pub number: Option<u8>,
    /// Inclusive lower bound on the message value, e.g. to fire a CC only
    /// above half travel.
    #[serde(default)]
    pub min_value: Option<u16>,
    pub action: MidiAction,
}

impl MidiBinding {
    pub fn new(message_type: MidiMessageType, number: Option<u8>, action: MidiAction) -> Self {
        Self {
            message_type,
            channel: None,
            number,
            min_value: None,
            action,
        }
    }

    pub fn matches(&self, command: &MidiCommand) -> bool {
        if command.message_type != self.message_type {
            return false;
        }
        if self.channel.is_some_and(|ch| ch != command.channel) {
            return false;
        }
        let number = match command.message_type {
            MidiMessageType::NoteOn | MidiMessageType::NoteOff => Some(command.note),
            MidiMessageType::ControlChange => Some(command.controller),
            _ => None,
        };
        if let (Some(wanted), Some(actual)) = (self.number, number) {
            if wanted != actual {
                return false;
            }
        }
        self.min_value.map_or(true, |min| command.value >= min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_clamp() {
        let cmd = MidiCommand::note("out", 1, 200, 255, true);
        assert_eq!(cmd.note, 127);
        assert_eq!(cmd.value, 127);
        let cmd = MidiCommand::control_change("out", 2, 130, 64);
        assert_eq!(cmd.controller, 127);
        assert_eq!(cmd.message_type, MidiMessageType::ControlChange);
    }

    #[test]
    fn test_binding_matches_cc_threshold() {
        let mut binding = MidiBinding::new(
            MidiMessageType::ControlChange,
            Some(116),
            MidiAction::Go,
        );
        binding.min_value = Some(65);

        assert!(binding.matches(&MidiCommand::control_change("in", 1, 116, 127)));
        assert!(!binding.matches(&MidiCommand::control_change("in", 1, 116, 10)));
        assert!(!binding.matches(&MidiCommand::control_change("in", 1, 22, 127)));
        assert!(!binding.matches(&MidiCommand::note("in", 1, 116, 127, true)));
    }

    #[test]
    fn test_binding_channel_filter() {
        let mut binding = MidiBinding::new(MidiMessageType::NoteOn, Some(60), MidiAction::Blackout);
        assert!(binding.matches(&MidiCommand::note("in", 9, 60, 100, true)));
        binding.channel = Some(10);
        assert!(!binding.matches(&MidiCommand::note("in", 9, 60, 100, true)));
        assert!(binding.matches(&MidiCommand::note("in", 10, 60, 100, true)));
    }
}
