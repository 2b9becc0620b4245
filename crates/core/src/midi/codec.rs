use super::midi::{MidiCommand, MidiMessageType};

pub const CLOCK: u8 = 0xF8;
pub const START: u8 = 0xFA;
pub const CONTINUE: u8 = 0xFB;
pub const STOP: u8 = 0xFC;

const SYSEX_START: u8 = 0xF0;
const SYSEX_END: u8 = 0xF7;
const PITCH_BEND_MAX: u16 = 16383;

fn clamp_channel(command: &MidiCommand) -> u8 {
    if !(1..=16).contains(&command.channel) {
        log::warn!(
            "MIDI command '{}' channel {} out of range, clamping to 1-16",
            command.name,
            command.channel
        );
    }
    command.channel.clamp(1, 16) - 1
}

fn data_byte(what: &str, value: u16) -> u8 {
    if value > 127 {
        log::warn!("MIDI {} {} out of range, clamping to 127", what, value);
    }
    value.min(127) as u8
}

/// Wire bytes for `command`.
pub fn encode(command: &MidiCommand) -> Vec<u8> {
    match command.message_type {
        MidiMessageType::Clock => return vec![CLOCK],
        MidiMessageType::Start => return vec![START],
        MidiMessageType::Stop => return vec![STOP],
        MidiMessageType::Continue => return vec![CONTINUE],
        MidiMessageType::SystemExclusive => {
            let payload = &command.sysex;
            if payload.first() == Some(&SYSEX_START) && payload.last() == Some(&SYSEX_END) {
                return payload.clone();
            }
            let mut bytes = Vec::with_capacity(payload.len() + 2);
            bytes.push(SYSEX_START);
            bytes.extend_from_slice(payload);
            bytes.push(SYSEX_END);
            return bytes;
        }
        _ => {}
    }

    let channel = clamp_channel(command);
    match command.message_type {
        MidiMessageType::NoteOn => vec![
            0x90 | channel,
            data_byte("note", command.note as u16),
            data_byte("velocity", command.value),
        ],
        MidiMessageType::NoteOff => vec![
            0x80 | channel,
            data_byte("note", command.note as u16),
            data_byte("velocity", command.value),
        ],
        MidiMessageType::ControlChange => vec![
            0xB0 | channel,
            data_byte("controller", command.controller as u16),
            data_byte("value", command.value),
        ],
        MidiMessageType::ProgramChange => vec![0xC0 | channel, data_byte("program", command.value)],
        MidiMessageType::PitchBend => {
            if command.value > PITCH_BEND_MAX {
                log::warn!(
                    "MIDI pitch bend {} out of range, clamping to {}",
                    command.value,
                    PITCH_BEND_MAX
                );
            }
            let value = command.value.min(PITCH_BEND_MAX);
            vec![
                0xE0 | channel,
                (value & 0x7F) as u8,
                ((value >> 7) & 0x7F) as u8,
            ]
        }
        // handled above
        _ => Vec::new(),
    }
}

/// Decodes one inbound channel message. Real-time and system messages are
/// not returned.
pub fn parse(device: &str, bytes: &[u8]) -> Option<MidiCommand> {
    let status = *bytes.first()?;
    if status >= 0xF0 || status < 0x80 {
        return None;
    }

    let channel = (status & 0x0F) + 1;
    let data = |i: usize| bytes.get(i).map(|b| b & 0x7F);
    let mut command = MidiCommand {
        device_name: device.to_string(),
        channel,
        ..MidiCommand::default()
    };

    match status & 0xF0 {
        0x90 => {
            command.note = data(1)?;
            let velocity = data(2)?;
            command.value = velocity as u16;
            command.message_type = if velocity == 0 {
                MidiMessageType::NoteOff
            } else {
                MidiMessageType::NoteOn
            };
        }
        0x80 => {
            command.message_type = MidiMessageType::NoteOff;
            command.note = data(1)?;
            command.value = data(2)? as u16;
        }
        0xB0 => {
            command.message_type = MidiMessageType::ControlChange;
            command.controller = data(1)?;
            command.value = data(2)? as u16;
        }
        0xC0 => {
            command.message_type = MidiMessageType::ProgramChange;
            command.value = data(1)? as u16;
        }
        0xE0 => {
            command.message_type = MidiMessageType::PitchBend;
            command.value = data(1)? as u16 | (data(2)? as u16) << 7;
        }
        _ => return None,
    }

    Some(command)
}
