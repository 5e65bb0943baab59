use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Normalized status vocabulary reported downstream.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CanonicalStatus {
    Created,
    Running,
    Stop,
    Failure,
    Success,
    /// Upper-cased raw action for everything without a dedicated status.
    Other(String),
}

impl CanonicalStatus {
    pub fn as_str(&self) -> &str {
        match self {
            CanonicalStatus::Created => "CREATED",
            CanonicalStatus::Running => "RUNNING",
            CanonicalStatus::Stop => "STOP",
            CanonicalStatus::Failure => "FAILURE",
            CanonicalStatus::Success => "SUCCESS",
            CanonicalStatus::Other(raw) => raw,
        }
    }
}

impl fmt::Display for CanonicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CanonicalStatus {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureReason {
    /// Killed for exceeding its memory limit.
    Oom,
}

/// Point-in-time run state of a container, as inspected from the runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunState {
    pub running: bool,
    pub paused: bool,
    pub restarting: bool,
    pub oom_killed: bool,
    pub exit_code: i64,
    pub started_at: String,
    pub finished_at: String,
}

/// Result of mapping one lifecycle action to what gets reported.
#[derive(Debug)]
pub struct Classification {
    pub status: CanonicalStatus,
    pub exit_code: Option<i64>,
    pub elapsed_secs: Option<u64>,
    pub failure_reason: Option<FailureReason>,
    /// Set when a timestamp could not be parsed; the rest is still valid.
    pub timestamp_error: Option<TimestampError>,
}

#[derive(Debug, Error)]
#[error("cannot parse {field} timestamp {value:?}: {source}")]
pub struct TimestampError {
    pub field: &'static str,
    pub value: String,
    #[source]
    pub source: chrono::ParseError,
}
