//! In-process job registry.
//!
//! The store is the only mutable shared state in the job core. All mutations
//! go through the write lock, so concurrent updates to the same record are
//! serialized and reads always observe the latest committed state.

use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::JobError;
use crate::jobs::record::{JobRecord, JobStatus};

/// Aggregated execution statistics, computed over the live registry.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionMetrics {
    pub total_executions: usize,
    pub successful_executions: usize,
    pub failed_executions: usize,
    pub timed_out_executions: usize,
    pub average_duration_seconds: f64,
    pub executions_per_agent: HashMap<String, usize>,
}

/// Thread-safe storage for job records.
pub struct JobStore {
    jobs: RwLock<HashMap<Uuid, JobRecord>>,
}

impl JobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a new pending record and return its ID. Never blocks on agent
    /// execution.
    pub async fn create(&self, agent_id: &str, parameters: serde_json::Value) -> Uuid {
        let record = JobRecord::new(agent_id, parameters);
        let id = record.id;
        self.jobs.write().await.insert(id, record);
        tracing::debug!(job = %id, agent = %agent_id, "Job record created");
        id
    }

    /// Snapshot of a record by ID.
    pub async fn get(&self, id: Uuid) -> Result<JobRecord, JobError> {
        self.jobs
            .read()
            .await
            .get(&id)
            .cloned()
            .ok_or(JobError::NotFound { id })
    }

    /// Number of records currently held.
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Apply a transition under the write lock. A failed transition leaves the
    /// record untouched.
    async fn update<F>(&self, id: Uuid, apply: F) -> Result<(), JobError>
    where
        F: FnOnce(&mut JobRecord) -> Result<(), JobError>,
    {
        let mut jobs = self.jobs.write().await;
        let record = jobs.get_mut(&id).ok_or(JobError::NotFound { id })?;
        apply(record)
    }

    /// Transition `pending -> running`. Exclusive: a second claim fails.
    pub async fn start(&self, id: Uuid) -> Result<(), JobError> {
        self.update(id, |r| r.start()).await
    }

    /// Transition `running -> completed` and store the result.
    pub async fn complete(&self, id: Uuid, result: String) -> Result<(), JobError> {
        self.update(id, |r| r.complete(result)).await
    }

    /// Transition `running -> failed` and store the cause.
    pub async fn fail(&self, id: Uuid, error: String) -> Result<(), JobError> {
        self.update(id, |r| r.fail(error)).await
    }

    /// Transition `running -> timed_out` and store the cause.
    pub async fn time_out(&self, id: Uuid, message: String) -> Result<(), JobError> {
        self.update(id, |r| r.time_out(message)).await
    }

    /// The most recently created records, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<JobRecord> {
        let jobs = self.jobs.read().await;
        let mut records: Vec<JobRecord> = jobs.values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        records
    }

    /// Compute aggregate metrics over all held records.
    pub async fn metrics(&self) -> ExecutionMetrics {
        let jobs = self.jobs.read().await;

        let mut successful = 0;
        let mut failed = 0;
        let mut timed_out = 0;
        let mut per_agent: HashMap<String, usize> = HashMap::new();
        let mut durations: Vec<f64> = Vec::new();

        for record in jobs.values() {
            *per_agent.entry(record.agent_id.clone()).or_default() += 1;
            match record.status {
                JobStatus::Completed => successful += 1,
                JobStatus::Failed => failed += 1,
                JobStatus::TimedOut => timed_out += 1,
                _ => {}
            }
            if record.status.is_terminal()
                && let Some(duration) = record.duration_seconds()
            {
                durations.push(duration);
            }
        }

        let average = if durations.is_empty() {
            0.0
        } else {
            durations.iter().sum::<f64>() / durations.len() as f64
        };

        ExecutionMetrics {
            total_executions: jobs.len(),
            successful_executions: successful,
            failed_executions: failed,
            timed_out_executions: timed_out,
            average_duration_seconds: average,
            executions_per_agent: per_agent,
        }
    }

    /// Evict terminal records older than `max_age`. Returns how many were
    /// removed. In-flight records are never evicted.
    pub async fn cleanup_older_than(&self, max_age: chrono::Duration) -> usize {
        let cutoff = Utc::now() - max_age;
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, record| record.status.is_active() || record.created_at >= cutoff);
        let removed = before - jobs.len();
        if removed > 0 {
            tracing::info!(removed, "Evicted old job records");
        }
        removed
    }
}

impl Default for JobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn create_and_get() {
        let store = JobStore::new();
        let id = store.create("echo", json!({"topics": ["Bitcoin"]})).await;

        let record = store.get(id).await.unwrap();
        assert_eq!(record.agent_id, "echo");
        assert_eq!(record.status, JobStatus::Pending);
        assert_eq!(record.parameters["topics"][0], "Bitcoin");
    }

    #[tokio::test]
    async fn get_unknown_id_is_not_found() {
        let store = JobStore::new();
        let err = store.get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, JobError::NotFound { .. }));
    }

    #[tokio::test]
    async fn ids_are_unique_across_creates() {
        let store = JobStore::new();
        let a = store.create("echo", json!({})).await;
        let b = store.create("echo", json!({})).await;
        assert_ne!(a, b);
        assert_eq!(store.len().await, 2);
    }

    #[tokio::test]
    async fn concurrent_creates_get_distinct_independently_mutable_records() {
        let store = std::sync::Arc::new(JobStore::new());

        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = std::sync::Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.create("echo", json!({})).await
            }));
        }

        let mut ids = Vec::new();
        for handle in handles {
            ids.push(handle.await.unwrap());
        }
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 16);

        // Each record is independently mutable.
        store.start(ids[0]).await.unwrap();
        store.complete(ids[0], "ok".into()).await.unwrap();
        assert_eq!(store.get(ids[1]).await.unwrap().status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn terminal_update_fails_and_record_is_unchanged() {
        let store = JobStore::new();
        let id = store.create("echo", json!({})).await;
        store.start(id).await.unwrap();
        store.complete(id, "ok".into()).await.unwrap();

        let err = store.fail(id, "late error".into()).await.unwrap_err();
        assert!(matches!(err, JobError::InvalidTransition { .. }));

        let record = store.get(id).await.unwrap();
        assert_eq!(record.status, JobStatus::Completed);
        assert_eq!(record.result.as_deref(), Some("ok"));
        assert!(record.error.is_none());
    }

    #[tokio::test]
    async fn double_start_is_exclusive() {
        let store = JobStore::new();
        let id = store.create("echo", json!({})).await;
        store.start(id).await.unwrap();
        assert!(matches!(
            store.start(id).await.unwrap_err(),
            JobError::InvalidTransition { .. }
        ));
    }

    #[tokio::test]
    async fn metrics_count_outcomes() {
        let store = JobStore::new();

        let ok = store.create("echo", json!({})).await;
        store.start(ok).await.unwrap();
        store.complete(ok, "ok".into()).await.unwrap();

        let bad = store.create("daily-news", json!({})).await;
        store.start(bad).await.unwrap();
        store.fail(bad, "boom".into()).await.unwrap();

        let slow = store.create("daily-news", json!({})).await;
        store.start(slow).await.unwrap();
        store.time_out(slow, "too slow".into()).await.unwrap();

        let _pending = store.create("echo", json!({})).await;

        let metrics = store.metrics().await;
        assert_eq!(metrics.total_executions, 4);
        assert_eq!(metrics.successful_executions, 1);
        assert_eq!(metrics.failed_executions, 1);
        assert_eq!(metrics.timed_out_executions, 1);
        assert_eq!(metrics.executions_per_agent["echo"], 2);
        assert_eq!(metrics.executions_per_agent["daily-news"], 2);
    }

    #[tokio::test]
    async fn cleanup_evicts_only_old_terminal_records() {
        let store = JobStore::new();

        let done = store.create("echo", json!({})).await;
        store.start(done).await.unwrap();
        store.complete(done, "ok".into()).await.unwrap();

        let pending = store.create("echo", json!({})).await;

        // Zero max age: everything terminal is "old".
        let removed = store.cleanup_older_than(chrono::Duration::zero()).await;
        assert_eq!(removed, 1);
        assert!(store.get(done).await.is_err());
        assert!(store.get(pending).await.is_ok());
    }

    #[tokio::test]
    async fn recent_is_newest_first() {
        let store = JobStore::new();
        let _a = store.create("echo", json!({})).await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let b = store.create("echo", json!({})).await;

        let recent = store.recent(1).await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].id, b);
    }
}
