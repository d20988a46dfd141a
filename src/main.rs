use std::sync::Arc;
use std::time::Duration;

use agent_hub::agents::{AgentDeps, AgentRegistry};
use agent_hub::api::{AppState, router};
use agent_hub::config::Settings;
use agent_hub::jobs::{Executor, JobStore};
use agent_hub::schedule;

/// Terminal job records older than this are swept from the store.
const RETENTION_HOURS: i64 = 24;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let settings = Settings::from_env().unwrap_or_else(|e| {
        eprintln!("Error: {e}");
        std::process::exit(1);
    });

    let registry = Arc::new(AgentRegistry::builtin(&settings));
    let deps = Arc::new(AgentDeps::from_settings(&settings)?);
    let store = Arc::new(JobStore::new());
    let executor = Arc::new(Executor::new(
        Arc::clone(&store),
        Arc::clone(&registry),
        deps,
        &settings,
    ));

    eprintln!("🛰  Agent Hub v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   API: http://{}:{}/agents", settings.host, settings.port);
    eprintln!("   Agents: {} registered", registry.len());
    eprintln!(
        "   Concurrency: {} jobs max ({:?} when full)",
        settings.max_concurrent_jobs, settings.queue_policy
    );
    eprintln!(
        "   Completion: {}",
        if settings.llm_api_key.is_some() {
            settings.llm_model.as_str()
        } else {
            "not configured"
        }
    );
    eprintln!(
        "   Telegram: {}",
        if settings.telegram_bot_token.is_some() && settings.telegram_chat_id.is_some() {
            "enabled"
        } else {
            "disabled"
        }
    );

    // Schedule ticker
    let schedule_handle = if settings.schedule.is_empty() {
        eprintln!("   Schedule: none");
        None
    } else {
        eprintln!("   Schedule: {} entries", settings.schedule.len());
        Some(schedule::spawn_schedule_ticker(
            settings.schedule.clone(),
            Arc::clone(&registry),
            Arc::clone(&store),
            Arc::clone(&executor),
            Duration::from_secs(30),
        ))
    };

    // Retention sweep for old terminal records (runs hourly)
    let sweep_handle = {
        let store = Arc::clone(&store);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(3600));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                store
                    .cleanup_older_than(chrono::Duration::hours(RETENTION_HOURS))
                    .await;
            }
        })
    };

    let state = AppState::new(
        Arc::new(settings.clone()),
        Arc::clone(&registry),
        Arc::clone(&store),
        Arc::clone(&executor),
    );
    let app = router(state);

    let listener =
        tokio::net::TcpListener::bind(format!("{}:{}", settings.host, settings.port)).await?;
    tracing::info!(host = %settings.host, port = settings.port, "Agent Hub listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Stop background tickers, then drain in-flight jobs.
    if let Some(handle) = schedule_handle {
        handle.abort();
    }
    sweep_handle.abort();
    executor.drain(Duration::from_secs(30)).await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
    tracing::info!("Shutdown signal received");
}
