mod routes;
mod settings;
mod singleton;
mod state;
mod store;
mod wire;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::settings::Settings;
use crate::state::AppState;
use crate::store::JsonFileStorage;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("caldesk_server=info,tower_http=info")),
        )
        .init();

    let settings = Settings::load()?;
    let data_path = settings.data_path();

    // Ensure only one instance writes the event file
    let lock = singleton::acquire_lock(&data_path)?;
    tracing::debug!(lock = %lock.path().display(), "acquired lock");

    let storage = JsonFileStorage::open(&data_path)?;
    tracing::info!(path = %storage.path().display(), "loaded events");

    let state = AppState::new(Arc::new(storage), settings.scheduler());
    let app = routes::app(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], settings.port));
    tracing::info!("caldesk-server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
