//! Stage enumeration and transition table
//!
//! The sequence is strictly linear. Each transition is a pure function of
//! `(current stage, event)` so it can be exercised without timers.

use serde::{Deserialize, Serialize};

/// A named phase of the scripted sequence.
///
/// Exactly one stage is active at a time. Stages are only ever entered in
/// declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Locked splash screen.
    Intro,
    /// Biometric "scan" with typewriter lines.
    Scanning,
    /// Short access-granted banner.
    AccessGranted,
    /// Free-text query prompt.
    AwaitingInput,
    /// Scripted log playback.
    Processing,
    /// Terminal stage; navigation is issued after a delay.
    Redirecting,
}

impl Stage {
    /// All stages in the order they are visited.
    pub const ORDER: [Self; 6] = [
        Self::Intro,
        Self::Scanning,
        Self::AccessGranted,
        Self::AwaitingInput,
        Self::Processing,
        Self::Redirecting,
    ];

    /// Returns the stage reached by applying `event`, or `None` when the
    /// event is not valid in this stage.
    #[must_use]
    pub const fn next(self, event: StageEvent) -> Option<Self> {
        match (self, event) {
            (Self::Intro, StageEvent::IntroElapsed) => Some(Self::Scanning),
            (Self::Scanning, StageEvent::ScanComplete) => Some(Self::AccessGranted),
            (Self::AccessGranted, StageEvent::GrantElapsed) => Some(Self::AwaitingInput),
            (Self::AwaitingInput, StageEvent::QuerySubmitted) => Some(Self::Processing),
            (Self::Processing, StageEvent::ProcessingComplete) => Some(Self::Redirecting),
            _ => None,
        }
    }

    /// Returns whether no further transitions exist.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Redirecting)
    }

    /// Short machine-friendly name, used for metrics labels and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Intro => "intro",
            Self::Scanning => "scanning",
            Self::AccessGranted => "access_granted",
            Self::AwaitingInput => "awaiting_input",
            Self::Processing => "processing",
            Self::Redirecting => "redirecting",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inputs that drive the stage machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageEvent {
    /// The intro delay has elapsed.
    IntroElapsed,
    /// The emphasis typewriter line finished.
    ScanComplete,
    /// The access-granted delay has elapsed.
    GrantElapsed,
    /// A non-empty query was submitted.
    QuerySubmitted,
    /// The log player finished every segment.
    ProcessingComplete,
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVENTS: [StageEvent; 5] = [
        StageEvent::IntroElapsed,
        StageEvent::ScanComplete,
        StageEvent::GrantElapsed,
        StageEvent::QuerySubmitted,
        StageEvent::ProcessingComplete,
    ];

    #[test]
    fn happy_path_visits_every_stage_in_order() {
        let mut stage = Stage::Intro;
        let mut seen = vec![stage];
        for event in EVENTS {
            stage = stage.next(event).unwrap();
            seen.push(stage);
        }
        assert_eq!(seen, Stage::ORDER);
        assert!(stage.is_terminal());
    }

    #[test]
    fn only_one_event_is_valid_per_stage() {
        for (i, stage) in Stage::ORDER.iter().enumerate() {
            let accepted: Vec<_> = EVENTS
                .iter()
                .filter(|e| stage.next(**e).is_some())
                .collect();
            if stage.is_terminal() {
                assert!(accepted.is_empty());
            } else {
                assert_eq!(accepted, vec![&EVENTS[i]]);
            }
        }
    }

    #[test]
    fn transitions_only_move_forward() {
        for stage in Stage::ORDER {
            for event in EVENTS {
                if let Some(next) = stage.next(event) {
                    assert!(next > stage, "{stage} -> {next} is not forward");
                }
            }
        }
    }

    #[test]
    fn submit_outside_input_stage_is_rejected() {
        assert_eq!(Stage::Scanning.next(StageEvent::QuerySubmitted), None);
        assert_eq!(Stage::Processing.next(StageEvent::QuerySubmitted), None);
    }

    #[test]
    fn display_uses_snake_case() {
        assert_eq!(Stage::AccessGranted.to_string(), "access_granted");
        assert_eq!(
            serde_json::to_string(&Stage::AwaitingInput).unwrap(),
            "\"awaiting_input\""
        );
    }
}
