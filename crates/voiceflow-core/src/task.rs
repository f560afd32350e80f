use serde::{Deserialize, Serialize};
use std::fmt;

use crate::job::ObjectRef;

/// Client-visible status of a task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Success,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Success => write!(f, "success"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Successful output of a job, tagged by mode so callers pattern-match
/// exhaustively instead of probing optional fields.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobResult {
    /// Speech-to-text: the transcribed text.
    Transcript { text: String },
    /// Text-to-speech: where the synthesized audio landed.
    Audio { object: ObjectRef },
}

/// The mutable execution record for one job.
///
/// `Pending` is written once by the submission gateway before enqueue.
/// Terminal states are written by the dispatcher; once a task leaves
/// `Pending` it never changes again (the store enforces write-once, which is
/// also what makes redelivered work items idempotent).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TaskState {
    Pending,
    Success { result: JobResult },
    Failed { error: String },
}

impl TaskState {
    pub fn status(&self) -> TaskStatus {
        match self {
            Self::Pending => TaskStatus::Pending,
            Self::Success { .. } => TaskStatus::Success,
            Self::Failed { .. } => TaskStatus::Failed,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ids::JobId;

    #[test]
    fn status_wire_values() {
        assert_eq!(serde_json::to_string(&TaskStatus::Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&TaskStatus::Success).unwrap(), "\"success\"");
        assert_eq!(serde_json::to_string(&TaskStatus::Failed).unwrap(), "\"failed\"");
    }

    #[test]
    fn state_reports_status() {
        assert_eq!(TaskState::Pending.status(), TaskStatus::Pending);
        let success = TaskState::Success {
            result: JobResult::Transcript { text: "hi".into() },
        };
        assert_eq!(success.status(), TaskStatus::Success);
        let failed = TaskState::Failed { error: "boom".into() };
        assert_eq!(failed.status(), TaskStatus::Failed);
    }

    #[test]
    fn terminal_classification() {
        assert!(!TaskState::Pending.is_terminal());
        assert!(TaskState::Failed { error: "e".into() }.is_terminal());
        let id = JobId::new();
        let success = TaskState::Success {
            result: JobResult::Audio {
                object: ObjectRef::output_for(&id),
            },
        };
        assert!(success.is_terminal());
    }

    #[test]
    fn result_serde_roundtrip() {
        let id = JobId::new();
        for result in [
            JobResult::Transcript { text: "hello".into() },
            JobResult::Audio {
                object: ObjectRef::output_for(&id),
            },
        ] {
            let json = serde_json::to_string(&result).unwrap();
            let parsed: JobResult = serde_json::from_str(&json).unwrap();
            assert_eq!(parsed, result);
        }
    }
}
