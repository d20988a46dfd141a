//! Background job execution.
//!
//! One tokio task per dispatched job, bounded by a semaphore sized from
//! `max_concurrent_jobs`. Under the `Queue` policy a job past the limit
//! simply stays `pending` until a permit frees; under `Reject` the API
//! refuses admission up front. Tasks are tracked so shutdown can drain
//! in-flight work instead of dropping it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{RwLock, Semaphore};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::agents::{AgentDeps, AgentRegistry};
use crate::config::{QueuePolicy, Settings};
use crate::error::JobError;
use crate::jobs::store::JobStore;

/// Runs dispatched jobs against the agent registry.
pub struct Executor {
    store: Arc<JobStore>,
    registry: Arc<AgentRegistry>,
    deps: Arc<AgentDeps>,
    permits: Arc<Semaphore>,
    max_concurrent: usize,
    default_timeout: Duration,
    queue_policy: QueuePolicy,
    /// In-flight task handles, for graceful drain at shutdown.
    running: RwLock<HashMap<Uuid, JoinHandle<()>>>,
}

impl Executor {
    pub fn new(
        store: Arc<JobStore>,
        registry: Arc<AgentRegistry>,
        deps: Arc<AgentDeps>,
        settings: &Settings,
    ) -> Self {
        Self {
            store,
            registry,
            deps,
            permits: Arc::new(Semaphore::new(settings.max_concurrent_jobs)),
            max_concurrent: settings.max_concurrent_jobs,
            default_timeout: settings.default_timeout,
            queue_policy: settings.queue_policy,
            running: RwLock::new(HashMap::new()),
        }
    }

    /// Admission check for new execute requests.
    ///
    /// Only the `Reject` policy ever refuses; `Queue` accepts everything and
    /// lets jobs wait on a permit.
    pub fn try_admit(&self) -> Result<(), JobError> {
        if self.queue_policy == QueuePolicy::Reject && self.permits.available_permits() == 0 {
            return Err(JobError::MaxJobsExceeded {
                max: self.max_concurrent,
            });
        }
        Ok(())
    }

    /// Schedule a job to run in the background. Returns immediately.
    pub async fn dispatch(self: &Arc<Self>, job_id: Uuid) {
        let executor = Arc::clone(self);
        let handle = tokio::spawn(async move {
            executor.run_job(job_id).await;
        });

        let mut running = self.running.write().await;
        running.retain(|_, h| !h.is_finished());
        running.insert(job_id, handle);
    }

    /// Run a job on the caller's task (synchronous execution mode). The same
    /// permit bound applies.
    pub async fn run_now(&self, job_id: Uuid) {
        self.run_job(job_id).await;
    }

    async fn run_job(&self, job_id: Uuid) {
        // Queued jobs wait here; acquire fails only once the semaphore is
        // closed for shutdown, in which case the job stays pending.
        let _permit = match self.permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                tracing::debug!(job = %job_id, "Executor shutting down, job left pending");
                return;
            }
        };

        let record = match self.store.get(job_id).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(job = %job_id, error = %e, "Dispatched job vanished before start");
                return;
            }
        };

        let agent = match self.registry.resolve(&record.agent_id) {
            Ok(agent) => agent,
            Err(e) => {
                // The API validates agent ids before creating records, so this
                // only happens if the registry and store disagree.
                self.mark_failed_from_pending(job_id, e.to_string()).await;
                return;
            }
        };

        // Exclusive claim: a second executor racing on the same record loses
        // here with InvalidTransition.
        if let Err(e) = self.store.start(job_id).await {
            tracing::warn!(job = %job_id, error = %e, "Could not claim job");
            return;
        }

        let timeout = agent.timeout().unwrap_or(self.default_timeout);
        tracing::info!(job = %job_id, agent = %record.agent_id, timeout_secs = timeout.as_secs(), "Job started");

        let outcome =
            tokio::time::timeout(timeout, agent.run(record.parameters.clone(), &self.deps)).await;

        let transition = match outcome {
            Ok(Ok(result)) => self.store.complete(job_id, result).await,
            Ok(Err(e)) => {
                tracing::warn!(job = %job_id, agent = %record.agent_id, error = %e, "Job failed");
                self.store.fail(job_id, e.to_string()).await
            }
            Err(_) => {
                // The future was dropped at the await point; any late result
                // from an uncancellable external call is discarded with it.
                tracing::warn!(job = %job_id, agent = %record.agent_id, "Job timed out");
                let cause = JobError::Timeout {
                    id: job_id,
                    timeout,
                };
                self.store.time_out(job_id, cause.to_string()).await
            }
        };

        match transition {
            Ok(()) => {
                tracing::info!(job = %job_id, "Job finished");
            }
            Err(e) => {
                tracing::warn!(job = %job_id, error = %e, "Could not record job outcome");
            }
        }
    }

    /// Walk a pending record to `failed` through the state machine.
    async fn mark_failed_from_pending(&self, job_id: Uuid, reason: String) {
        if let Err(e) = self.store.start(job_id).await {
            tracing::warn!(job = %job_id, error = %e, "Could not claim job to fail it");
            return;
        }
        if let Err(e) = self.store.fail(job_id, reason).await {
            tracing::warn!(job = %job_id, error = %e, "Could not record job failure");
        }
    }

    /// Stop admitting work and wait for in-flight jobs, aborting whatever
    /// outlives `deadline`.
    pub async fn drain(&self, deadline: Duration) {
        self.permits.close();

        let handles: Vec<(Uuid, JoinHandle<()>)> =
            self.running.write().await.drain().collect();
        if handles.is_empty() {
            return;
        }

        tracing::info!(in_flight = handles.len(), "Draining in-flight jobs");

        let aborts: Vec<_> = handles.iter().map(|(_, h)| h.abort_handle()).collect();
        let join_all = futures::future::join_all(handles.into_iter().map(|(_, h)| h));

        if tokio::time::timeout(deadline, join_all).await.is_err() {
            for abort in aborts {
                abort.abort();
            }
            tracing::warn!("Drain deadline reached, aborted remaining jobs");
        }
    }
}
