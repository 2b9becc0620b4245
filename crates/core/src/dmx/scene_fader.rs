use std::time::Duration;

use super::channel_buffer::{validate_channel, ChannelBuffer};
use super::scene::DmxScene;
use crate::timeline::easing::interpolate;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FaderTick {
    /// `(channel, value)` pairs, in channel order.
    pub values: Vec<(u16, u8)>,
    pub completed: bool,
}

/// Linear crossfade from the buffer's values at registration to a scene's
/// targets.
#[derive(Debug, Clone)]
pub struct SceneFader {
    fade_time: Duration,
    elapsed: Duration,
    // (channel, from, to)
    targets: Vec<(u16, u8, u8)>,
    completed: bool,
}

impl SceneFader {
    pub fn new(scene: &DmxScene, fade_time: Duration, buffer: &ChannelBuffer) -> Self {
        let mut targets = Vec::with_capacity(scene.channel_values.len());
        for (&channel, &target) in &scene.channel_values {
            match validate_channel(channel) {
                Ok(index) => targets.push((channel, buffer.data()[index], target)),
                Err(e) => log::warn!("Scene '{}' skipping channel: {}", scene.name, e),
            }
        }

        Self {
            fade_time,
            elapsed: Duration::ZERO,
            targets,
            completed: false,
        }
    }

    pub fn advance(&mut self, delta: Duration) -> FaderTick {
        if self.completed {
            return FaderTick {
                completed: true,
                ..FaderTick::default()
            };
        }

        self.elapsed += delta;
        let progress = if self.fade_time.is_zero() {
            1.0
        } else {
            (self.elapsed.as_secs_f64() / self.fade_time.as_secs_f64()).min(1.0)
        };
        self.completed = self.elapsed >= self.fade_time;

        let values = self
            .targets
            .iter()
            .map(|&(channel, from, to)| (channel, interpolate(from, to, progress)))
            .collect();

        FaderTick {
            values,
            completed: self.completed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dmx::channel_buffer::SourceKind;

    #[test]
    fn test_fade_from_captured_values() {
        let mut buffer = ChannelBuffer::new();
        buffer.set(1, 100, SourceKind::Direct).unwrap();
        let scene = DmxScene::new("warm", 1).with_value(1, 200).with_value(2, 50);

        let mut fader = SceneFader::new(&scene, Duration::from_secs(2), &buffer);
        // later buffer changes don't move the captured start
        buffer.set(1, 0, SourceKind::Direct).unwrap();

        let tick = fader.advance(Duration::from_secs(1));
        assert_eq!(tick.values, vec![(1, 150), (2, 25)]);
        assert!(!tick.completed);

        let tick = fader.advance(Duration::from_secs(1));
        assert_eq!(tick.values, vec![(1, 200), (2, 50)]);
        assert!(tick.completed);
    }

    #[test]
    fn test_zero_fade_applies_on_first_tick() {
        let buffer = ChannelBuffer::new();
        let scene = DmxScene::new("snap", 1).with_value(5, 255);
        let mut fader = SceneFader::new(&scene, Duration::ZERO, &buffer);
        let tick = fader.advance(Duration::from_millis(25));
        assert_eq!(tick.values, vec![(5, 255)]);
        assert!(tick.completed);
        assert!(fader.advance(Duration::from_millis(25)).values.is_empty());
    }

    #[test]
    fn test_invalid_channels_dropped() {
        let buffer = ChannelBuffer::new();
        let scene = DmxScene::new("bad", 1).with_value(0, 10).with_value(600, 10);
        let mut fader = SceneFader::new(&scene, Duration::ZERO, &buffer);
        assert!(fader.advance(Duration::ZERO).values.is_empty());
    }
}
