use crate::auth::require_secret;
use crate::handlers;
use crate::state::WebhookState;
use axum::{
    Router, middleware,
    routing::{get, post},
};

pub fn create_routes(state: WebhookState) -> Router {
    let protected = Router::new()
        .route("/notify", post(handlers::notify))
        .route("/records", get(handlers::list_records))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_secret));

    Router::new()
        .route("/health", get(handlers::health))
        .merge(protected)
        .with_state(state)
}
