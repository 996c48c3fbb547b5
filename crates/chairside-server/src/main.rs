use anyhow::Context;
use chairside_server::{app, build_state, ServerConfig};
use log::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::load().context("loading configuration")?;
    let state = build_state(&config).context("opening database")?;
    info!(
        "Database at {}, {} minute slots",
        state.db_path().display(),
        config.engine.slot_minutes
    );

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("binding {}", config.bind_addr))?;
    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::error!("Failed to listen for shutdown: {}", e);
    }
    info!("Shutting down");
}
