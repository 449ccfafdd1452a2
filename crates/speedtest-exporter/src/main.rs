//! Speedtest exporter
//!
//! - `GET /metrics` runs the Ookla CLI once and publishes the result
//! - `GET /` welcome page, `GET /healthz` liveness
//! - Config: optional YAML file (`SPEEDTEST_EXPORTER_CONFIG`) plus
//!   `SPEEDTEST_SERVER` / `SPEEDTEST_TIMEOUT` / `SPEEDTEST_PORT`

use speedtest_exporter::error::{ExporterError, Result};
use speedtest_exporter::{app_state, config, logging, router};

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let path = std::env::var(config::ENV_CONFIG_PATH).ok();
    let cfg = config::load(path.as_deref()).inspect_err(|e| tracing::error!("{e}"))?;
    let listen = cfg.listen_addr()?;

    tracing::info!(
        %listen,
        binary = %cfg.speedtest.binary,
        server_id = cfg.speedtest.server_id.as_deref().unwrap_or("auto"),
        timeout_secs = cfg.speedtest.timeout_secs,
        schema = ?cfg.metrics.schema,
        "speedtest-exporter starting"
    );

    let state = app_state::AppState::new(cfg);
    let app = router::build_router(state);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .map_err(|e| ExporterError::Io(format!("bind {listen} failed: {e}")))?;

    axum::serve(listener, app)
        .await
        .map_err(|e| ExporterError::Io(format!("server failed: {e}")))
}
