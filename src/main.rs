mod api;
mod app;
mod auth;
mod config;
mod db;
mod domain;
mod error;
mod logging;
mod middleware;
mod routes;
mod services;

use anyhow::Result;

use services::{Storage, VisionClient};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let settings = config::Settings::from_env()?;

    logging::init_logging(&settings.env);

    tracing::info!(
        env = ?settings.env,
        server_addr = %settings.server_addr,
        "Starting lotworks backend"
    );

    let pool = db::create_pool(&settings).await?;
    db::run_migrations(&pool).await?;

    let vision = VisionClient::new(settings.vision_keys.clone(), settings.vision_timeout_seconds)?;
    if !vision.any_configured() {
        tracing::warn!("No vision API keys configured - document AI endpoints will reject requests");
    }

    let storage = Storage::new(&settings.upload_dir);
    storage.ensure_root().await?;

    let state = app::AppState::new(pool, settings.clone(), vision, storage);
    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(&settings.server_addr).await?;
    tracing::info!("Listening on {}", settings.server_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
