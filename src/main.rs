use tasktimer::{db, jobs::MidnightProlongationJob, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "tasktimer=debug,sqlx=warn".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let state = AppState::init().await?;

    if let tasktimer::state::Backend::Postgres(pool) = &state.backend {
        if let Err(e) = db::migrate(pool).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }
    }

    let job = MidnightProlongationJob::new(state.engine.clone(), state.config.job.clone());
    let stores = {
        let state = state.clone();
        move || state.timer_store()
    };
    job.run(stores, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for shutdown signal");
        }
    })
    .await;

    tracing::info!("shut down");
    Ok(())
}
