//! Job record and status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::JobError;

/// Status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is waiting for a free execution slot.
    Pending,
    /// Job is currently being executed.
    Running,
    /// Job finished and produced a result.
    Completed,
    /// Job aborted with an error.
    Failed,
    /// Job exceeded its timeout; any late result was discarded.
    TimedOut,
}

impl JobStatus {
    /// Check if this status allows transitioning to another status.
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        use JobStatus::*;

        matches!(
            (self, target),
            (Pending, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, TimedOut)
        )
    }

    /// Check if this is a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::TimedOut)
    }

    /// Check if the job is still in flight (not terminal).
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        };
        write!(f, "{s}")
    }
}

/// One tracked agent execution, from submission to terminal outcome.
///
/// `result` is set only on completion, `error` only on failure or timeout;
/// the transition methods are the only way to move between states, so the
/// two can never be set together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    /// Unique execution ID, never reused.
    pub id: Uuid,
    /// The registered agent this job runs.
    pub agent_id: String,
    /// Caller-supplied parameters, immutable after creation.
    pub parameters: serde_json::Value,
    /// Current status.
    pub status: JobStatus,
    /// Agent output, present only when `status == Completed`.
    pub result: Option<String>,
    /// Failure cause, present only when `status` is `Failed` or `TimedOut`.
    pub error: Option<String>,
    /// When the execute request was accepted.
    pub created_at: DateTime<Utc>,
    /// When execution actually began.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Create a new pending record.
    pub fn new(agent_id: impl Into<String>, parameters: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_id: agent_id.into(),
            parameters,
            status: JobStatus::Pending,
            result: None,
            error: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    fn transition_to(&mut self, target: JobStatus) -> Result<(), JobError> {
        if !self.status.can_transition_to(target) {
            return Err(JobError::InvalidTransition {
                id: self.id,
                state: self.status.to_string(),
                target: target.to_string(),
            });
        }
        self.status = target;
        match target {
            JobStatus::Running => self.started_at = Some(Utc::now()),
            JobStatus::Completed | JobStatus::Failed | JobStatus::TimedOut => {
                self.completed_at = Some(Utc::now());
            }
            JobStatus::Pending => {}
        }
        Ok(())
    }

    /// Mark the job as running. Fails if it is not pending, which also makes
    /// the pending-to-running transition exclusive: a second executor cannot
    /// claim the same job.
    pub fn start(&mut self) -> Result<(), JobError> {
        self.transition_to(JobStatus::Running)
    }

    /// Mark the job completed with its result.
    pub fn complete(&mut self, result: String) -> Result<(), JobError> {
        self.transition_to(JobStatus::Completed)?;
        self.result = Some(result);
        Ok(())
    }

    /// Mark the job failed with a human-readable cause.
    pub fn fail(&mut self, error: String) -> Result<(), JobError> {
        self.transition_to(JobStatus::Failed)?;
        self.error = Some(error);
        Ok(())
    }

    /// Mark the job timed out. Any late result is discarded by the caller.
    pub fn time_out(&mut self, message: String) -> Result<(), JobError> {
        self.transition_to(JobStatus::TimedOut)?;
        self.error = Some(message);
        Ok(())
    }

    /// Wall-clock execution time, once the job has started.
    pub fn duration_seconds(&self) -> Option<f64> {
        let started = self.started_at?;
        let end = self.completed_at.unwrap_or_else(Utc::now);
        let millis = end.signed_duration_since(started).num_milliseconds();
        Some(millis.max(0) as f64 / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_transitions_valid() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Running.can_transition_to(JobStatus::TimedOut));
    }

    #[test]
    fn status_transitions_invalid() {
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Running));
        assert!(!JobStatus::Failed.can_transition_to(JobStatus::Running));
        assert!(!JobStatus::TimedOut.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Running.can_transition_to(JobStatus::Pending));
    }

    #[test]
    fn terminal_states() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
        assert!(JobStatus::TimedOut.is_terminal());
        assert!(JobStatus::Pending.is_active());
        assert!(JobStatus::Running.is_active());
    }

    #[test]
    fn record_lifecycle_success() {
        let mut record = JobRecord::new("echo", serde_json::json!({"topics": ["Bitcoin"]}));
        assert_eq!(record.status, JobStatus::Pending);
        assert!(record.started_at.is_none());

        record.start().unwrap();
        assert_eq!(record.status, JobStatus::Running);
        assert!(record.started_at.is_some());

        record.complete("done".to_string()).unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.result.as_deref(), Some("done"));
        assert!(record.error.is_none());
        assert!(record.completed_at.is_some());
        assert!(record.duration_seconds().is_some());
    }

    #[test]
    fn record_lifecycle_failure_sets_error_only() {
        let mut record = JobRecord::new("echo", serde_json::Value::Null);
        record.start().unwrap();
        record.fail("upstream exploded".to_string()).unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert!(record.result.is_none());
        assert_eq!(record.error.as_deref(), Some("upstream exploded"));
    }

    #[test]
    fn second_start_is_rejected() {
        let mut record = JobRecord::new("echo", serde_json::Value::Null);
        record.start().unwrap();
        let err = record.start().unwrap_err();
        assert!(matches!(err, JobError::InvalidTransition { .. }));
    }

    #[test]
    fn terminal_record_is_immutable() {
        let mut record = JobRecord::new("echo", serde_json::Value::Null);
        record.start().unwrap();
        record.complete("ok".to_string()).unwrap();

        assert!(record.fail("nope".to_string()).is_err());
        assert!(record.time_out("nope".to_string()).is_err());
        assert!(record.start().is_err());
        // Unchanged by the rejected transitions.
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.result.as_deref(), Some("ok"));
        assert!(record.error.is_none());
    }

    #[test]
    fn status_serde_uses_snake_case() {
        let json = serde_json::to_string(&JobStatus::TimedOut).unwrap();
        assert_eq!(json, "\"timed_out\"");
        let parsed: JobStatus = serde_json::from_str("\"pending\"").unwrap();
        assert_eq!(parsed, JobStatus::Pending);
    }
}
