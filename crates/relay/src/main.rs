use std::sync::Arc;

use anyhow::Context;
use assist_relay::{config::LogFormat, routes::create_router, AppState, Config};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_format);

    tracing::info!(
        bind_address = %config.bind_address,
        path_prefix = %config.path_prefix,
        project_key_length = ?config.project_key_length,
        authenticated = config.jwt_secret.is_some(),
        "Starting assist relay"
    );

    let state = AppState::new(config);
    let audit = Arc::clone(&state.ws_state.audit).spawn(state.config.room_audit_interval());

    let listener = tokio::net::TcpListener::bind(&state.config.bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", state.config.bind_address))?;
    tracing::info!("Assist relay listening on {}", listener.local_addr()?);

    let app = create_router(state);
    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("Shutdown signal received");
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Server error")?;

    audit.abort();
    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}
