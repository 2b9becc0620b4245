use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::easing::EasingType;
use crate::dmx::channel_buffer::validate_channel;
use crate::error::{EngineError, EngineResult};

/// One channel ramp inside a [`Timeline`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineStep {
    pub start_time: Duration,
    pub duration: Duration,
    pub universe: u16,
    /// 1-based DMX channel (1..=512).
    pub channel: u16,
    pub start_value: u8,
    pub end_value: u8,
    #[serde(default)]
    pub easing: EasingType,
}

impl TimelineStep {
    pub fn new(universe: u16, channel: u16, start_value: u8, end_value: u8) -> Self {
        Self {
            start_time: Duration::ZERO,
            duration: Duration::ZERO,
            universe,
            channel,
            start_value,
            end_value,
            easing: EasingType::Linear,
        }
    }

    pub fn starting_at(mut self, start_time: Duration) -> Self {
        self.start_time = start_time;
        self
    }

    pub fn lasting(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_easing(mut self, easing: EasingType) -> Self {
        self.easing = easing;
        self
    }

    pub fn end_time(&self) -> Duration {
        self.start_time + self.duration
    }

    /// Whether `t` lies within the closed window `[start, start + duration]`.
    pub fn contains(&self, t: Duration) -> bool {
        t >= self.start_time && t <= self.end_time()
    }

    /// Value of this step at timeline time `t`. Only meaningful while
    /// [`TimelineStep::contains`] holds.
    pub fn value_at(&self, t: Duration) -> u8 {
        let progress = if self.duration.is_zero() {
            1.0
        } else {
            let into = t.saturating_sub(self.start_time).as_secs_f64();
            (into / self.duration.as_secs_f64()).clamp(0.0, 1.0)
        };
        let eased = self.easing.apply(progress);
        super::easing::interpolate(self.start_value, self.end_value, eased)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    pub name: String,
    pub duration: Duration,
    #[serde(rename = "loop", default)]
    pub looping: bool,
    pub steps: Vec<TimelineStep>,
}

impl Timeline {
    pub fn new(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            duration,
            looping: false,
            steps: Vec::new(),
        }
    }

    pub fn looped(mut self) -> Self {
        self.looping = true;
        self
    }

    pub fn with_step(mut self, step: TimelineStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn add_step(&mut self, step: TimelineStep) -> EngineResult<()> {
        validate_channel(step.channel)?;
        self.steps.push(step);
        Ok(())
    }

    pub fn remove_step(&mut self, index: usize) -> EngineResult<TimelineStep> {
        if index >= self.steps.len() {
            return Err(EngineError::NotFound {
                kind: "timeline step",
                id: format!("{}[{}]", self.name, index),
            });
        }
        Ok(self.steps.remove(index))
    }

    /// Copy of this timeline with every step moved by `channel_offset`
    /// channels and delayed by `time_offset`, e.g. to repeat a chase on the
    /// next fixture. The copy's duration grows to fit the shifted steps.
    pub fn copy_to_channel_offset(
        &self,
        name: impl Into<String>,
        channel_offset: i32,
        time_offset: Duration,
    ) -> EngineResult<Timeline> {
        let mut steps = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let channel = step.channel as i32 + channel_offset;
            if !(1..=512).contains(&channel) {
                return Err(EngineError::invalid_range("channel", channel));
            }
            steps.push(TimelineStep {
                channel: channel as u16,
                start_time: step.start_time + time_offset,
                ..step.clone()
            });
        }

        Ok(Timeline {
            name: name.into(),
            duration: self.duration + time_offset,
            looping: self.looping,
            steps,
        })
    }

    /// Universe a player for this timeline binds to when none is given.
    pub fn default_universe(&self) -> Option<u16> {
        self.steps.first().map(|s| s.universe)
    }

    /// Steps whose window runs past the end of the timeline.
    pub fn overrunning_steps(&self) -> impl Iterator<Item = (usize, &TimelineStep)> {
        self.steps
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.end_time() > self.duration)
    }
}
