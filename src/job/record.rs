//! Job records: the manager's view of a job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Opaque job identifier, unique for the life of the process.
pub type JobId = Uuid;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Work is in progress.
    Running,
    /// Work finished successfully.
    Success,
    /// Work failed or was cut short.
    Failure,
}

impl JobState {
    /// Whether no further state transitions are allowed.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobState::Running)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobState::Running => write!(f, "running"),
            JobState::Success => write!(f, "success"),
            JobState::Failure => write!(f, "failure"),
        }
    }
}

/// Latest known state of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,

    /// Kind of work (e.g. `bootstrap`).
    #[serde(rename = "type")]
    pub kind: String,

    pub state: JobState,

    /// Free-form progress message; the latest update wins.
    pub status: String,

    /// Output of a successful job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,

    /// Failure description of a failed job.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    pub time_start: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// A freshly started record.
    pub fn new(id: JobId, kind: impl Into<String>) -> Self {
        Self {
            id,
            kind: kind.into(),
            state: JobState::Running,
            status: "Starting".to_string(),
            result: None,
            error: None,
            time_start: Utc::now(),
            time_end: None,
        }
    }

    pub(crate) fn succeed(&mut self, result: Option<Value>) {
        self.state = JobState::Success;
        self.result = result;
        self.time_end = Some(Utc::now());
    }

    pub(crate) fn fail(&mut self, error: String) {
        self.state = JobState::Failure;
        self.status = error.clone();
        self.error = Some(error);
        self.time_end = Some(Utc::now());
    }
}

impl fmt::Display for JobRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}: {}", self.id, self.kind, self.state, self.status)
    }
}
