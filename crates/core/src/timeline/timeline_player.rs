use std::collections::BTreeMap;
use std::time::Duration;

use super::timeline::Timeline;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerStatus {
    Running,
    Paused,
    Completed,
}

/// Output of one [`TimelinePlayer::advance`] call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimelineTick {
    /// `(channel, value)` pairs for the player's universe, sorted by channel.
    pub values: Vec<(u16, u8)>,
    /// Indices of steps that became active during this tick.
    pub started_steps: Vec<usize>,
    pub completed: bool,
}

/// A [`Timeline`] running against one universe.
#[derive(Debug, Clone)]
pub struct TimelinePlayer {
    timeline: Timeline,
    universe: u16,
    cue_number: Option<u32>,
    position: Duration,
    status: PlayerStatus,
    was_active: Vec<bool>,
    iteration: u64,
}

impl TimelinePlayer {
    /// Binds `timeline` to `universe`, or to its first step's universe when
    /// none is given. Steps addressing another universe never contribute.
    pub fn new(timeline: Timeline, universe: Option<u16>, cue_number: Option<u32>) -> Self {
        let universe = universe.or_else(|| timeline.default_universe()).unwrap_or(1);

        for (index, step) in timeline.steps.iter().enumerate() {
            if step.universe != universe {
                log::warn!(
                    "Timeline '{}' step {} targets universe {} but the player is bound to {}; skipping it",
                    timeline.name,
                    index,
                    step.universe,
                    universe
                );
            }
        }

        let step_count = timeline.steps.len();
        Self {
            timeline,
            universe,
            cue_number,
            position: Duration::ZERO,
            status: PlayerStatus::Running,
            was_active: vec![false; step_count],
            iteration: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.timeline.name
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn universe(&self) -> u16 {
        self.universe
    }

    pub fn cue_number(&self) -> Option<u32> {
        self.cue_number
    }

    /// Position within the current iteration.
    pub fn position(&self) -> Duration {
        self.position
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    pub fn status(&self) -> PlayerStatus {
        self.status
    }

    pub fn is_complete(&self) -> bool {
        self.status == PlayerStatus::Completed
    }

    pub fn pause(&mut self) {
        if self.status == PlayerStatus::Running {
            self.status = PlayerStatus::Paused;
        }
    }

    pub fn resume(&mut self) {
        if self.status == PlayerStatus::Paused {
            self.status = PlayerStatus::Running;
        }
    }

    pub fn stop(&mut self) {
        self.status = PlayerStatus::Completed;
    }

    /// Channel values of the bound universe at timeline time `t`.
    ///
    /// When active steps share a channel the step with the later start time
    /// wins; on equal start times the later declared step wins.
    pub fn sample(&self, t: Duration) -> Vec<(u16, u8)> {
        let mut active: Vec<(usize, &super::timeline::TimelineStep)> = self
            .timeline
            .steps
            .iter()
            .enumerate()
            .filter(|(_, step)| step.universe == self.universe && step.contains(t))
            .collect();
        // stable sort keeps declaration order among equal start times
        active.sort_by_key(|(_, step)| step.start_time);

        let mut merged = BTreeMap::new();
        for (_, step) in active {
            merged.insert(step.channel, step.value_at(t));
        }
        merged.into_iter().collect()
    }

    /// Moves the player forward by `delta` and returns its contributions.
    pub fn advance(&mut self, delta: Duration) -> TimelineTick {
        match self.status {
            PlayerStatus::Completed => {
                return TimelineTick {
                    completed: true,
                    ..TimelineTick::default()
                }
            }
            PlayerStatus::Paused => return TimelineTick::default(),
            PlayerStatus::Running => {}
        }

        let duration = self.timeline.duration;
        let mut completed = false;
        let mut t = self.position + delta;

        if duration.is_zero() {
            if self.timeline.looping {
                log::warn!(
                    "Timeline '{}' has zero duration and cannot loop",
                    self.timeline.name
                );
            }
            t = Duration::ZERO;
            completed = true;
        } else if t > duration {
            if self.timeline.looping {
                let wrapped = t.as_nanos() % duration.as_nanos();
                t = Duration::from_nanos(wrapped as u64);
                self.iteration += 1;
                self.was_active.iter_mut().for_each(|a| *a = false);
            } else {
                t = duration;
                completed = true;
            }
        }

        self.position = t;
        let started_steps = self.mark_active(t);
        let values = self.sample(t);

        if completed {
            self.status = PlayerStatus::Completed;
        }

        TimelineTick {
            values,
            started_steps,
            completed,
        }
    }

    fn mark_active(&mut self, t: Duration) -> Vec<usize> {
        let mut started = Vec::new();
        for (index, step) in self.timeline.steps.iter().enumerate() {
            if step.universe != self.universe {
                continue;
            }
            let active = step.contains(t);
            if active && !self.was_active[index] {
                started.push(index);
            }
            self.was_active[index] = active;
        }
        started
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timeline::timeline::TimelineStep;

    fn secs(s: f64) -> Duration {
        Duration::from_secs_f64(s)
    }

    fn ramp(looping: bool) -> Timeline {
        let mut timeline = Timeline::new("ramp", secs(10.0))
            .with_step(TimelineStep::new(1, 1, 0, 255).lasting(secs(10.0)));
        timeline.looping = looping;
        timeline
    }

    #[test]
    fn test_linear_ramp_samples() {
        let player = TimelinePlayer::new(ramp(false), None, None);
        assert_eq!(player.sample(secs(0.0)), vec![(1, 0)]);
        let mid = player.sample(secs(5.0))[0].1;
        assert!((127..=129).contains(&mid), "mid value was {}", mid);
        assert_eq!(player.sample(secs(10.0)), vec![(1, 255)]);
    }

    #[test]
    fn test_ramp_completes_after_duration() {
        let mut player = TimelinePlayer::new(ramp(false), None, None);
        let tick = player.advance(secs(10.0));
        assert_eq!(tick.values, vec![(1, 255)]);
        assert!(!tick.completed);

        let tick = player.advance(secs(0.025));
        assert_eq!(tick.values, vec![(1, 255)]);
        assert!(tick.completed);
        assert!(player.is_complete());
        assert_eq!(player.position(), secs(10.0));

        assert!(player.advance(secs(1.0)).values.is_empty());
    }

    #[test]
    fn test_later_start_wins_overlap() {
        let timeline = Timeline::new("overlap", secs(10.0))
            .with_step(TimelineStep::new(1, 1, 0, 0).lasting(secs(10.0)))
            .with_step(
                TimelineStep::new(1, 1, 200, 200)
                    .starting_at(secs(5.0))
                    .lasting(secs(5.0)),
            );
        let player = TimelinePlayer::new(timeline, None, None);
        assert_eq!(player.sample(secs(7.0)), vec![(1, 200)]);
        assert_eq!(player.sample(secs(3.0)), vec![(1, 0)]);
    }

    #[test]
    fn test_equal_start_later_declaration_wins() {
        // first declared step starts last
        let timeline = Timeline::new("ties", secs(4.0))
            .with_step(
                TimelineStep::new(1, 7, 90, 90)
                    .starting_at(secs(1.0))
                    .lasting(secs(2.0)),
            )
            .with_step(TimelineStep::new(1, 7, 10, 10).lasting(secs(4.0)))
            .with_step(TimelineStep::new(1, 7, 20, 20).lasting(secs(4.0)));
        let player = TimelinePlayer::new(timeline, None, None);
        assert_eq!(player.sample(secs(0.5)), vec![(7, 20)]);
        assert_eq!(player.sample(secs(2.0)), vec![(7, 90)]);
    }

    #[test]
    fn test_looping_wraps() {
        let mut player = TimelinePlayer::new(ramp(true), None, None);
        player.advance(secs(9.0));
        let tick = player.advance(secs(3.5));
        assert!(!tick.completed);
        assert_eq!(player.iteration(), 1);
        assert_eq!(player.position(), secs(2.5));
        assert_eq!(tick.values, player.sample(secs(2.5)));
    }

    #[test]
    fn test_zero_duration_completes_immediately() {
        let timeline =
            Timeline::new("snap", Duration::ZERO).with_step(TimelineStep::new(1, 3, 0, 180));
        let mut player = TimelinePlayer::new(timeline, None, None);
        let tick = player.advance(secs(0.025));
        assert!(tick.completed);
        assert_eq!(tick.values, vec![(3, 180)]);
    }

    #[test]
    fn test_step_started_once_per_iteration() {
        let timeline = Timeline::new("chase", secs(2.0))
            .looped()
            .with_step(TimelineStep::new(1, 1, 0, 255).lasting(secs(1.0)))
            .with_step(
                TimelineStep::new(1, 2, 0, 255)
                    .starting_at(secs(1.5))
                    .lasting(secs(0.5)),
            );
        let mut player = TimelinePlayer::new(timeline, None, None);

        assert_eq!(player.advance(secs(0.1)).started_steps, vec![0]);
        assert!(player.advance(secs(0.1)).started_steps.is_empty());
        assert_eq!(player.advance(secs(1.4)).started_steps, vec![1]);
        // wraps to 0.1 in the next iteration
        assert_eq!(player.advance(secs(0.5)).started_steps, vec![0]);
    }

    #[test]
    fn test_pause_freezes_position() {
        let mut player = TimelinePlayer::new(ramp(false), None, None);
        player.advance(secs(2.0));
        player.pause();
        assert!(player.advance(secs(5.0)).values.is_empty());
        assert_eq!(player.position(), secs(2.0));
        player.resume();
        player.advance(secs(1.0));
        assert_eq!(player.position(), secs(3.0));
    }

    #[test]
    fn test_other_universe_steps_skipped() {
        let timeline = Timeline::new("mixed", secs(1.0))
            .with_step(TimelineStep::new(2, 1, 50, 50).lasting(secs(1.0)))
            .with_step(TimelineStep::new(3, 1, 99, 99).lasting(secs(1.0)));
        let player = TimelinePlayer::new(timeline, None, None);
        assert_eq!(player.universe(), 2);
        assert_eq!(player.sample(secs(0.5)), vec![(1, 50)]);
    }
}
