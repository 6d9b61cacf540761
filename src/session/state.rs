//! Recorder state machine

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a failed recording attempt stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FailureStage {
    Permission,
    Device,
    Configure,
    Encoder,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecorderState {
    Idle,
    Opening,
    Configuring,
    Recording,
    Stopping,
    Failed(FailureStage),
}

impl RecorderState {
    /// Whether `next` is a legal successor of this state
    pub fn can_transition_to(&self, next: RecorderState) -> bool {
        use RecorderState::*;
        match (*self, next) {
            (Idle, Opening) | (Idle, Failed(FailureStage::Device)) => true,
            (Opening, Idle) | (Opening, Configuring) | (Opening, Failed(_)) => true,
            (Configuring, Recording) | (Configuring, Failed(_)) => true,
            (Recording, Stopping) | (Recording, Failed(FailureStage::Device)) => true,
            (Stopping, Idle) | (Stopping, Failed(_)) => true,
            (Failed(_), Idle) | (Failed(_), Opening) => true,
            (Failed(_), Failed(FailureStage::Device)) => true,
            _ => false,
        }
    }

    pub fn is_recording(&self) -> bool {
        matches!(self, RecorderState::Recording)
    }

    /// Idle or failed: a new recording may be started
    pub fn can_start(&self) -> bool {
        matches!(self, RecorderState::Idle | RecorderState::Failed(_))
    }

    pub fn failure(&self) -> Option<FailureStage> {
        match self {
            RecorderState::Failed(stage) => Some(*stage),
            _ => None,
        }
    }
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureStage::Permission => "permission",
            FailureStage::Device => "device",
            FailureStage::Configure => "configure",
            FailureStage::Encoder => "encoder",
            FailureStage::Stop => "stop",
        };
        f.write_str(name)
    }
}

impl fmt::Display for RecorderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecorderState::Idle => f.write_str("idle"),
            RecorderState::Opening => f.write_str("opening"),
            RecorderState::Configuring => f.write_str("configuring"),
            RecorderState::Recording => f.write_str("recording"),
            RecorderState::Stopping => f.write_str("stopping"),
            RecorderState::Failed(stage) => write!(f, "failed({})", stage),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            RecorderState::Idle,
            RecorderState::Opening,
            RecorderState::Configuring,
            RecorderState::Recording,
            RecorderState::Stopping,
            RecorderState::Idle,
        ];
        for pair in path.windows(2) {
            assert!(pair[0].can_transition_to(pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_illegal_transitions() {
        assert!(!RecorderState::Idle.can_transition_to(RecorderState::Recording));
        assert!(!RecorderState::Recording.can_transition_to(RecorderState::Opening));
        assert!(!RecorderState::Recording.can_transition_to(RecorderState::Failed(FailureStage::Encoder)));
        assert!(!RecorderState::Stopping.can_transition_to(RecorderState::Recording));
    }

    #[test]
    fn test_failed_can_restart() {
        let failed = RecorderState::Failed(FailureStage::Configure);
        assert!(failed.can_start());
        assert!(failed.can_transition_to(RecorderState::Opening));
        assert_eq!(failed.failure(), Some(FailureStage::Configure));
        assert_eq!(failed.to_string(), "failed(configure)");
    }
}
