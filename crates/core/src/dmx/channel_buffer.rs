use crate::error::{EngineError, EngineResult};

pub const DMX_CHANNELS: usize = 512;

/// Checks a 1-based DMX channel and returns its 0-based index.
pub fn validate_channel(channel: u16) -> EngineResult<usize> {
    if (1..=DMX_CHANNELS as u16).contains(&channel) {
        Ok(channel as usize - 1)
    } else {
        Err(EngineError::invalid_range("channel", channel))
    }
}

/// Highest universe number; Art-Net port addresses are 15 bits.
pub const MAX_UNIVERSE: u16 = 32_768;

/// Checks a 1-based universe number.
pub fn validate_universe(universe: u16) -> EngineResult<u16> {
    if (1..=MAX_UNIVERSE).contains(&universe) {
        Ok(universe)
    } else {
        Err(EngineError::invalid_range("universe", universe))
    }
}

/// What wrote a channel during the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    Direct,
    Fader,
    Player,
}

/// Held output state of one universe plus per-tick merge marks.
#[derive(Debug, Clone)]
pub struct ChannelBuffer {
    data: [u8; DMX_CHANNELS],
    written: [Option<SourceKind>; DMX_CHANNELS],
}

impl Default for ChannelBuffer {
    fn default() -> Self {
        Self {
            data: [0; DMX_CHANNELS],
            written: [None; DMX_CHANNELS],
        }
    }
}

impl ChannelBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, channel: u16) -> EngineResult<u8> {
        Ok(self.data[validate_channel(channel)?])
    }

    pub fn set(&mut self, channel: u16, value: u8, source: SourceKind) -> EngineResult<()> {
        let index = validate_channel(channel)?;
        self.write_index(index, value, source);
        Ok(())
    }

    pub(crate) fn write_index(&mut self, index: usize, value: u8, source: SourceKind) {
        self.data[index] = value;
        self.written[index] = Some(source);
    }

    pub fn written_by(&self, channel: u16) -> Option<SourceKind> {
        validate_channel(channel)
            .ok()
            .and_then(|index| self.written[index])
    }

    pub fn clear_marks(&mut self) {
        self.written = [None; DMX_CHANNELS];
    }

    pub fn zero(&mut self) {
        self.data = [0; DMX_CHANNELS];
        self.clear_marks();
    }

    pub fn data(&self) -> &[u8; DMX_CHANNELS] {
        &self.data
    }

    /// Frame to put on the wire: held values scaled by `intensity` (0..=1).
    pub fn scaled(&self, intensity: f32) -> [u8; DMX_CHANNELS] {
        if intensity >= 1.0 {
            return self.data;
        }
        let mut frame = self.data;
        for value in frame.iter_mut() {
            *value = (*value as f32 * intensity).round().clamp(0.0, 255.0) as u8;
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_bounds() {
        assert!(validate_channel(0).is_err());
        assert_eq!(validate_channel(1).unwrap(), 0);
        assert_eq!(validate_channel(512).unwrap(), 511);
        assert!(validate_channel(513).is_err());
    }

    #[test]
    fn test_set_marks_source() {
        let mut buffer = ChannelBuffer::new();
        buffer.set(10, 200, SourceKind::Fader).unwrap();
        assert_eq!(buffer.get(10).unwrap(), 200);
        assert_eq!(buffer.written_by(10), Some(SourceKind::Fader));

        buffer.clear_marks();
        assert_eq!(buffer.written_by(10), None);
        // value holds across ticks
        assert_eq!(buffer.get(10).unwrap(), 200);
    }

    #[test]
    fn test_scaled_leaves_held_values() {
        let mut buffer = ChannelBuffer::new();
        buffer.set(1, 255, SourceKind::Direct).unwrap();
        buffer.set(2, 100, SourceKind::Direct).unwrap();

        let frame = buffer.scaled(0.5);
        assert_eq!(frame[0], 128);
        assert_eq!(frame[1], 50);
        assert_eq!(buffer.get(1).unwrap(), 255);
        assert_eq!(buffer.scaled(0.0)[0], 0);
    }
}
