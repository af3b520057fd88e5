// # Push / Inspection / Health Listener
//
// HTTP surface of a running node:
//
// - POST `/notify` (secret): merge pushed records, then apply deletions
// - GET  `/records?name=&type=` (secret): flat view of the cache
// - GET  `/health`: sync status and counters, `503` once degraded
//
// Push updates never change the version tag or the sync status; the next
// full sync remains authoritative.

pub mod auth;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod routes;
pub mod state;

pub use auth::SECRET_HEADER;
pub use health::{HealthStatus, classify};
pub use routes::create_routes;
pub use state::WebhookState;

use tokio::net::TcpListener;
use tokio::sync::oneshot;

/// Serve the listener until the shutdown signal fires (or its sender is dropped)
pub async fn serve(
    listener: TcpListener,
    state: WebhookState,
    shutdown_rx: oneshot::Receiver<()>,
) -> std::io::Result<()> {
    let app = create_routes(state);

    if let Ok(addr) = listener.local_addr() {
        tracing::info!(%addr, "webhook listener started");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        })
        .await?;

    tracing::info!("webhook listener stopped");
    Ok(())
}
