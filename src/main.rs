mod error;
mod routes;
mod services;
mod state;

use std::sync::Arc;

use canvas_sync::config::env_parse;
use canvas_sync::store::{HttpProjectStore, ProjectStore};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let port: u16 = env_parse("PORT", 3000);

    let store: Option<Arc<dyn ProjectStore>> = match std::env::var("PROJECTS_API_URL") {
        Ok(url) if !url.trim().is_empty() => match HttpProjectStore::new(&url) {
            Ok(store) => {
                tracing::info!(%url, "channels hydrate from project store");
                Some(Arc::new(store))
            }
            Err(e) => {
                tracing::error!(error = %e, "project store client failed; channels start empty");
                None
            }
        },
        _ => None,
    };
    let state = state::AppState::new(store);

    let app = routes::app(state);
    let listener = match tokio::net::TcpListener::bind(format!("0.0.0.0:{port}")).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%port, error = %e, "failed to bind");
            std::process::exit(1);
        }
    };

    tracing::info!(%port, "canvas relay listening");
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!(error = %e, "server failed");
        std::process::exit(1);
    }
}
