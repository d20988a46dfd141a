//! Cron-driven agent executions.
//!
//! A single ticker polls the configured entries and dispatches due ones
//! through the same store/executor path as the API, so scheduled runs show
//! up in status and metrics like any other job.

use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::agents::AgentRegistry;
use crate::error::ConfigError;
use crate::jobs::{Executor, JobStore};

/// One configured scheduled execution.
#[derive(Debug, Clone)]
pub struct ScheduleEntry {
    pub agent_id: String,
    /// Cron expression (seconds-resolution, `sec min hour dom mon dow`).
    pub cron: String,
    /// Parameters for the fired job; `Null` means the agent's defaults.
    pub parameters: serde_json::Value,
}

impl ScheduleEntry {
    /// Parse `agent-id=cron expression` entries separated by `;`.
    pub fn parse_list(spec: &str) -> Result<Vec<Self>, ConfigError> {
        let mut entries = Vec::new();
        for part in spec.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (agent_id, cron_expr) = part.split_once('=').ok_or_else(|| {
                ConfigError::ParseError(format!(
                    "schedule entry '{part}' is not 'agent-id=cron expression'"
                ))
            })?;
            let agent_id = agent_id.trim().to_string();
            let cron_expr = cron_expr.trim().to_string();
            if agent_id.is_empty() {
                return Err(ConfigError::ParseError(format!(
                    "schedule entry '{part}' has an empty agent id"
                )));
            }
            cron::Schedule::from_str(&cron_expr).map_err(|e| ConfigError::InvalidValue {
                key: "AGENT_HUB_SCHEDULE".to_string(),
                message: format!("invalid cron '{cron_expr}': {e}"),
            })?;
            entries.push(Self {
                agent_id,
                cron: cron_expr,
                parameters: serde_json::Value::Null,
            });
        }
        Ok(entries)
    }

    /// Next fire time strictly after `after`.
    pub fn next_fire(&self, after: DateTime<Utc>) -> Option<DateTime<Utc>> {
        cron::Schedule::from_str(&self.cron)
            .ok()?
            .after(&after)
            .next()
    }
}

/// Spawn the schedule ticker. Returns the task handle for shutdown.
pub fn spawn_schedule_ticker(
    entries: Vec<ScheduleEntry>,
    registry: Arc<AgentRegistry>,
    store: Arc<JobStore>,
    executor: Arc<Executor>,
    tick: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut next_fires: Vec<Option<DateTime<Utc>>> =
            entries.iter().map(|e| e.next_fire(Utc::now())).collect();

        let mut ticker = tokio::time::interval(tick);
        // Skip immediate first tick
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let now = Utc::now();
            for (entry, next) in entries.iter().zip(next_fires.iter_mut()) {
                let Some(due) = *next else { continue };
                if due > now {
                    continue;
                }
                *next = entry.next_fire(now);
                fire(entry, &registry, &store, &executor).await;
            }
        }
    })
}

async fn fire(
    entry: &ScheduleEntry,
    registry: &Arc<AgentRegistry>,
    store: &Arc<JobStore>,
    executor: &Arc<Executor>,
) {
    let agent = match registry.resolve(&entry.agent_id) {
        Ok(agent) => agent,
        Err(e) => {
            tracing::warn!(agent = %entry.agent_id, error = %e, "Scheduled agent unknown, skipping");
            return;
        }
    };

    if let Err(e) = executor.try_admit() {
        tracing::warn!(agent = %entry.agent_id, error = %e, "Skipping scheduled run, executor full");
        return;
    }

    let parameters = if entry.parameters.is_null() {
        agent.default_parameters()
    } else {
        entry.parameters.clone()
    };

    let job_id = store.create(&entry.agent_id, parameters).await;
    executor.dispatch(job_id).await;
    tracing::info!(job = %job_id, agent = %entry.agent_id, "Scheduled execution dispatched");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentDeps;
    use crate::config::Settings;

    #[test]
    fn parse_list_accepts_multiple_entries() {
        let entries =
            ScheduleEntry::parse_list("daily-news=0 0 9 * * *; github-trending=0 30 18 * * *")
                .unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].agent_id, "daily-news");
        assert_eq!(entries[0].cron, "0 0 9 * * *");
        assert_eq!(entries[1].agent_id, "github-trending");
    }

    #[test]
    fn parse_list_rejects_malformed_entries() {
        assert!(ScheduleEntry::parse_list("daily-news").is_err());
        assert!(ScheduleEntry::parse_list("daily-news=not a cron").is_err());
        assert!(ScheduleEntry::parse_list("=0 0 9 * * *").is_err());
    }

    #[test]
    fn parse_list_ignores_empty_segments() {
        let entries = ScheduleEntry::parse_list("daily-news=0 0 9 * * *;;").unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn next_fire_is_in_the_future() {
        let entry = &ScheduleEntry::parse_list("echo=0 0 9 * * *").unwrap()[0];
        let now = Utc::now();
        let next = entry.next_fire(now).unwrap();
        assert!(next > now);
    }

    #[tokio::test]
    async fn ticker_fires_due_entries() {
        let settings = Settings::default();
        let registry = Arc::new(AgentRegistry::builtin(&settings));
        let store = Arc::new(JobStore::new());
        let executor = Arc::new(Executor::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::new(AgentDeps::none()),
            &settings,
        ));

        // Every second.
        let entries = ScheduleEntry::parse_list("echo=* * * * * *").unwrap();
        let handle = spawn_schedule_ticker(
            entries,
            registry,
            Arc::clone(&store),
            executor,
            Duration::from_millis(100),
        );

        tokio::time::sleep(Duration::from_millis(1600)).await;
        handle.abort();

        assert!(store.len().await >= 1, "expected at least one scheduled job");
    }
}
