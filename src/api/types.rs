//! Request and response shapes for the HTTP API.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::jobs::{ExecutionMetrics, JobRecord, JobStatus};

fn default_true() -> bool {
    true
}

/// Body of `POST /agents/execute`.
#[derive(Debug, Deserialize)]
pub struct ExecuteRequest {
    pub agent_id: String,
    /// Agent-specific parameters; the agent's defaults apply when omitted.
    #[serde(default)]
    pub parameters: Option<serde_json::Value>,
    /// When false, the request blocks until the job reaches a terminal state.
    #[serde(default = "default_true")]
    pub async_execution: bool,
}

/// Query string of `GET /agents`.
#[derive(Debug, Deserialize)]
pub struct ListAgentsQuery {
    #[serde(default = "default_true")]
    pub available_only: bool,
    pub category: Option<String>,
}

/// One execution, as returned by execute and status endpoints.
#[derive(Debug, Serialize)]
pub struct ExecutionResponse {
    pub execution_id: Uuid,
    pub agent_id: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    pub parameters: serde_json::Value,
}

impl From<JobRecord> for ExecutionResponse {
    fn from(record: JobRecord) -> Self {
        let duration_seconds = record.duration_seconds();
        Self {
            execution_id: record.id,
            agent_id: record.agent_id,
            status: record.status,
            created_at: record.created_at,
            started_at: record.started_at,
            completed_at: record.completed_at,
            result: record.result,
            error: record.error,
            duration_seconds,
            parameters: record.parameters,
        }
    }
}

/// Body of `GET /agents`.
#[derive(Debug, Serialize)]
pub struct AgentListResponse {
    pub agents: Vec<crate::agents::AgentDescriptor>,
    pub total_count: usize,
    pub available_count: usize,
}

/// Body of `GET /agents/metrics`.
#[derive(Debug, Serialize)]
pub struct MetricsResponse {
    #[serde(flatten)]
    pub metrics: ExecutionMetrics,
    pub recent_executions: Vec<ExecutionResponse>,
    pub uptime_seconds: f64,
}

/// Body of the health endpoints.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub version: String,
    pub uptime_seconds: f64,
    pub checks: BTreeMap<String, bool>,
}

/// Standard error body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn execute_request_defaults() {
        let request: ExecuteRequest =
            serde_json::from_value(json!({"agent_id": "echo"})).unwrap();
        assert_eq!(request.agent_id, "echo");
        assert!(request.parameters.is_none());
        assert!(request.async_execution);
    }

    #[test]
    fn execution_response_from_record_skips_absent_fields() {
        let record = JobRecord::new("echo", json!({}));
        let response = ExecutionResponse::from(record);
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(value["status"], "pending");
        assert!(value.get("result").is_none());
        assert!(value.get("error").is_none());
        assert!(value.get("started_at").is_none());
    }

    #[test]
    fn execution_response_carries_result_and_duration() {
        let mut record = JobRecord::new("echo", json!({}));
        record.start().unwrap();
        record.complete("done".to_string()).unwrap();

        let response = ExecutionResponse::from(record);
        assert_eq!(response.status, JobStatus::Completed);
        assert_eq!(response.result.as_deref(), Some("done"));
        assert!(response.duration_seconds.is_some());
    }
}
