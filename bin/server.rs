// Simples Consulta - Web Server
// Upload a spreadsheet, poll the job, download the classified workbook.

use anyhow::{Context, Result};
use simples_consulta::web::{build_router, AppState};
use simples_consulta::Config;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,simples_consulta=debug")),
        )
        .init();

    let config = Config::from_env().context("Invalid configuration")?;
    let addr = config.server.bind_addr.clone();

    info!(
        gateway = config.registry.gateway_url.is_some(),
        start_year = config.batch.start_year,
        delay_ms = config.batch.request_delay.as_millis() as u64,
        "configuration loaded"
    );

    let app = build_router(AppState::new(config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("🚀 server running on http://{}", addr);
    info!("   upload: POST /api/upload (multipart field 'file')");

    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}
