//! Axum router and handlers.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::agents::AgentRegistry;
use crate::api::types::{
    AgentListResponse, ErrorBody, ExecuteRequest, ExecutionResponse, HealthResponse,
    ListAgentsQuery, MetricsResponse,
};
use crate::config::Settings;
use crate::error::{AgentError, Error, JobError};
use crate::jobs::{Executor, JobStore};

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub registry: Arc<AgentRegistry>,
    pub store: Arc<JobStore>,
    pub executor: Arc<Executor>,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        settings: Arc<Settings>,
        registry: Arc<AgentRegistry>,
        store: Arc<JobStore>,
        executor: Arc<Executor>,
    ) -> Self {
        Self {
            settings,
            registry,
            store,
            executor,
            started_at: Instant::now(),
        }
    }

    fn uptime_seconds(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }
}

/// Error wrapper mapping domain errors to HTTP responses.
pub struct ApiError(Error);

impl<E: Into<Error>> From<E> for ApiError {
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind) = match &self.0 {
            Error::Agent(AgentError::NotFound { .. }) | Error::Job(JobError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            Error::Agent(AgentError::InvalidParameters { .. }) => {
                (StatusCode::UNPROCESSABLE_ENTITY, "validation_error")
            }
            Error::Agent(AgentError::RequirementsNotMet { .. }) => {
                (StatusCode::BAD_REQUEST, "requirements_not_met")
            }
            Error::Job(JobError::MaxJobsExceeded { .. }) => {
                (StatusCode::TOO_MANY_REQUESTS, "too_many_jobs")
            }
            Error::Job(JobError::InvalidTransition { .. }) => {
                (StatusCode::CONFLICT, "invalid_transition")
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };
        let body = ErrorBody {
            error: kind.to_string(),
            message: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Build the router with all API routes.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/agents", get(list_agents))
        .route("/agents/execute", post(execute_agent))
        .route("/agents/metrics", get(metrics))
        .route("/agents/executions/{id}", get(execution_status))
        .route("/agents/{id}", get(agent_detail))
        .route("/health", get(health))
        .route("/health/readiness", get(readiness))
        .route("/health/liveness", get(liveness))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ── Agents ──────────────────────────────────────────────────────────

async fn list_agents(
    State(state): State<AppState>,
    Query(query): Query<ListAgentsQuery>,
) -> Json<AgentListResponse> {
    let mut agents = state.registry.descriptors(&state.settings);

    if let Some(category) = &query.category {
        let category = category.to_lowercase();
        agents.retain(|a| a.category == category);
    }
    if query.available_only {
        agents.retain(|a| a.available);
    }

    let available_count = agents.iter().filter(|a| a.available).count();
    let total_count = agents.len();

    Json(AgentListResponse {
        agents,
        total_count,
        available_count,
    })
}

async fn agent_detail(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<crate::agents::AgentDescriptor>, ApiError> {
    state
        .registry
        .descriptors(&state.settings)
        .into_iter()
        .find(|a| a.id == id)
        .map(Json)
        .ok_or_else(|| AgentError::NotFound { id }.into())
}

async fn execute_agent(
    State(state): State<AppState>,
    Json(request): Json<ExecuteRequest>,
) -> Result<(StatusCode, Json<ExecutionResponse>), ApiError> {
    let agent_id = request.agent_id.trim().to_lowercase();
    let agent = state.registry.resolve(&agent_id)?;

    let missing = state.settings.missing_for(agent.required_capabilities());
    if !missing.is_empty() {
        return Err(AgentError::RequirementsNotMet {
            id: agent_id,
            missing,
        }
        .into());
    }

    // Validated at the boundary so no record is ever created for malformed
    // input.
    let parameters = request
        .parameters
        .unwrap_or_else(|| agent.default_parameters());
    agent.validate_parameters(&parameters)?;

    state.executor.try_admit()?;

    let job_id = state.store.create(&agent_id, parameters).await;
    tracing::info!(job = %job_id, agent = %agent_id, async_execution = request.async_execution, "Execution requested");

    if request.async_execution {
        // Snapshot before dispatch: the caller always sees `pending` and
        // polls for progress.
        let record = state.store.get(job_id).await?;
        state.executor.dispatch(job_id).await;
        Ok((StatusCode::ACCEPTED, Json(record.into())))
    } else {
        state.executor.run_now(job_id).await;
        let record = state.store.get(job_id).await?;
        Ok((StatusCode::OK, Json(record.into())))
    }
}

async fn execution_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ExecutionResponse>, ApiError> {
    let record = state.store.get(id).await?;
    Ok(Json(record.into()))
}

async fn metrics(State(state): State<AppState>) -> Json<MetricsResponse> {
    let metrics = state.store.metrics().await;
    let recent_executions = state
        .store
        .recent(10)
        .await
        .into_iter()
        .map(ExecutionResponse::from)
        .collect();

    Json(MetricsResponse {
        metrics,
        recent_executions,
        uptime_seconds: state.uptime_seconds(),
    })
}

// ── Health ──────────────────────────────────────────────────────────

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut checks = std::collections::BTreeMap::new();
    checks.insert("api".to_string(), true);
    checks.insert(
        "completion_configured".to_string(),
        state.settings.llm_api_key.is_some(),
    );
    checks.insert(
        "telegram_configured".to_string(),
        state.settings.telegram_bot_token.is_some() && state.settings.telegram_chat_id.is_some(),
    );
    checks.insert(
        "firecrawl_configured".to_string(),
        state.settings.firecrawl_api_key.is_some(),
    );

    let status = if checks["completion_configured"] {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        checks,
    })
}

async fn readiness(State(state): State<AppState>) -> Json<HealthResponse> {
    let mut checks = std::collections::BTreeMap::new();
    checks.insert("api".to_string(), true);
    checks.insert("agents_registered".to_string(), !state.registry.is_empty());
    checks.insert(
        "completion_configured".to_string(),
        state.settings.llm_api_key.is_some(),
    );

    let ready = checks["agents_registered"];

    Json(HealthResponse {
        status: if ready { "ready" } else { "not_ready" }.to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.uptime_seconds(),
        checks,
    })
}

async fn liveness(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "alive": true,
        "timestamp": chrono::Utc::now(),
        "uptime_seconds": state.uptime_seconds(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ApiError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn error_mapping_matches_contract() {
        assert_eq!(
            status_of(ApiError::from(AgentError::NotFound { id: "x".into() })),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ApiError::from(JobError::NotFound { id: Uuid::new_v4() })),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ApiError::from(AgentError::InvalidParameters {
                reason: "bad".into()
            })),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_of(ApiError::from(JobError::MaxJobsExceeded { max: 3 })),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            status_of(ApiError::from(AgentError::RequirementsNotMet {
                id: "daily-news".into(),
                missing: vec!["ANTHROPIC_API_KEY".into()],
            })),
            StatusCode::BAD_REQUEST
        );
    }
}
