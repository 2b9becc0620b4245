use std::collections::BTreeSet;
use std::fmt;

use crate::cue::cue::{Cue, CueAction};
use crate::dmx::channel_buffer::{validate_channel, validate_universe};
use crate::show::show::Project;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub cue: Option<u32>,
    pub message: String,
    pub duplicate_number: bool,
}

impl ValidationIssue {
    fn warning(cue: u32, message: String) -> Self {
        Self {
            severity: Severity::Warning,
            cue: Some(cue),
            message,
            duplicate_number: false,
        }
    }

    fn error(cue: u32, message: String) -> Self {
        Self {
            severity: Severity::Error,
            cue: Some(cue),
            message,
            duplicate_number: false,
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cue {
            Some(cue) => write!(f, "cue {}: {}", cue, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

/// Checks one cue against the set of cue numbers that exist in the show.
pub fn validate_cue(cue: &Cue, known: &BTreeSet<u32>) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let n = cue.number;

    if cue.action == CueAction::Release {
        for target in cue.release_targets() {
            if !known.contains(&target) {
                issues.push(ValidationIssue::error(
                    n,
                    format!("releases cue {} which does not exist", target),
                ));
            }
        }
    } else if !cue.cues_to_stop.is_empty() {
        issues.push(ValidationIssue::warning(
            n,
            "cues_to_stop is ignored unless the action is Release".to_string(),
        ));
    }

    for scene in &cue.dmx_scenes {
        if validate_universe(scene.universe).is_err() {
            issues.push(ValidationIssue::error(
                n,
                format!("scene '{}' targets universe {}", scene.name, scene.universe),
            ));
        }
        for channel in scene.channel_values.keys() {
            if validate_channel(*channel).is_err() {
                issues.push(ValidationIssue::error(
                    n,
                    format!("scene '{}' uses channel {}", scene.name, channel),
                ));
            }
        }
    }

    let mut timeline_names = BTreeSet::new();
    for timeline in &cue.timelines {
        if !timeline_names.insert(timeline.name.as_str()) {
            issues.push(ValidationIssue::warning(
                n,
                format!("timeline '{}' appears twice; the later one replaces the earlier", timeline.name),
            ));
        }

        let bound = timeline.default_universe();
        for (index, step) in timeline.steps.iter().enumerate() {
            if validate_channel(step.channel).is_err() {
                issues.push(ValidationIssue::error(
                    n,
                    format!("timeline '{}' step {} uses channel {}", timeline.name, index, step.channel),
                ));
            }
            if validate_universe(step.universe).is_err() {
                issues.push(ValidationIssue::error(
                    n,
                    format!(
                        "timeline '{}' step {} targets universe {}",
                        timeline.name, index, step.universe
                    ),
                ));
            } else if bound.is_some_and(|u| u != step.universe) {
                issues.push(ValidationIssue::warning(
                    n,
                    format!(
                        "timeline '{}' step {} targets universe {} and will be skipped",
                        timeline.name, index, step.universe
                    ),
                ));
            }
        }
        for (index, _) in timeline.overrunning_steps() {
            issues.push(ValidationIssue::warning(
                n,
                format!("timeline '{}' step {} runs past the timeline's end", timeline.name, index),
            ));
        }
    }

    for command in &cue.midi_commands {
        if !command.message_type.is_realtime() && !(1..=16).contains(&command.channel) {
            issues.push(ValidationIssue::warning(
                n,
                format!(
                    "MIDI command '{}' channel {} will be clamped to 1-16",
                    command.name, command.channel
                ),
            ));
        }
    }

    issues
}

pub fn validate_project(project: &Project) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    let mut known = BTreeSet::new();

    for cue in &project.cues {
        if !known.insert(cue.number) {
            issues.push(ValidationIssue {
                severity: Severity::Error,
                cue: Some(cue.number),
                message: "duplicate cue number".to_string(),
                duplicate_number: true,
            });
        }
    }

    for cue in &project.cues {
        issues.extend(validate_cue(cue, &known));
    }

    let mut universes = BTreeSet::new();
    for universe in &project.universes {
        if validate_universe(universe.universe_number).is_err() {
            issues.push(ValidationIssue {
                severity: Severity::Error,
                cue: None,
                message: format!("universe {} is out of range", universe.universe_number),
                duplicate_number: false,
            });
        }
        if !universes.insert(universe.universe_number) {
            issues.push(ValidationIssue {
                severity: Severity::Warning,
                cue: None,
                message: format!("universe {} is listed twice", universe.universe_number),
                duplicate_number: false,
            });
        }
    }

    issues
}

/// Logs each issue at a level matching its severity.
pub fn log_issues(issues: &[ValidationIssue]) {
    for issue in issues {
        match issue.severity {
            Severity::Error => log::error!("Validation error, {}", issue),
            Severity::Warning => log::warn!("Validation warning, {}", issue),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::dmx::scene::{DmxScene, DmxUniverse};
    use crate::midi::midi::MidiCommand;
    use crate::timeline::timeline::{Timeline, TimelineStep};

    #[test]
    fn test_dangling_release_is_error() {
        let mut cue = Cue::new(5, "Release");
        cue.action = CueAction::Release;
        cue.cues_to_stop = vec![1, 99];
        let known: BTreeSet<u32> = [1, 5].into_iter().collect();

        let issues = validate_cue(&cue, &known);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Error);
        assert!(issues[0].message.contains("99"));
    }

    #[test]
    fn test_step_overrun_and_universe_mismatch_are_warnings() {
        let mut cue = Cue::new(1, "Chase");
        cue.timelines.push(
            Timeline::new("chase", Duration::from_secs(2))
                .with_step(TimelineStep::new(1, 1, 0, 255).lasting(Duration::from_secs(3)))
                .with_step(TimelineStep::new(2, 1, 0, 255).lasting(Duration::from_secs(1))),
        );
        let issues = validate_cue(&cue, &BTreeSet::new());
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.severity == Severity::Warning));
    }

    #[test]
    fn test_bad_scene_channel_and_midi_channel() {
        let mut cue = Cue::new(2, "Bad");
        cue.dmx_scenes.push(DmxScene::new("s", 1).with_value(600, 1));
        cue.midi_commands.push(MidiCommand::note("out", 17, 60, 100, true));
        let issues = validate_cue(&cue, &BTreeSet::new());
        assert_eq!(issues.len(), 2);
        assert_eq!(issues[0].severity, Severity::Error);
        assert_eq!(issues[1].severity, Severity::Warning);
    }

    #[test]
    fn test_universe_zero_is_error() {
        let mut cue = Cue::new(3, "Zero");
        cue.dmx_scenes.push(DmxScene::new("s", 0).with_value(1, 1));
        cue.timelines.push(
            Timeline::new("t", Duration::from_secs(1))
                .with_step(TimelineStep::new(0, 1, 0, 255).lasting(Duration::from_secs(1))),
        );
        let mut project = Project::new("Zero").with_cue(cue);
        project.universes.push(DmxUniverse::new(0));

        let issues = validate_project(&project);
        assert_eq!(issues.len(), 3);
        assert!(issues.iter().all(|i| i.severity == Severity::Error));
        assert!(issues.iter().all(|i| i.message.contains("universe")));
    }

    #[test]
    fn test_duplicate_numbers_flagged() {
        let project = Project::new("Dupes")
            .with_cue(Cue::new(1, "a"))
            .with_cue(Cue::new(1, "b"));
        let issues = validate_project(&project);
        assert!(issues.iter().any(|i| i.duplicate_number));
    }
}
