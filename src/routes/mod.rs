use axum::Router;

use crate::state::SharedState;

/// Swagger UI and OpenAPI JSON.
pub mod docs;
/// Healthcheck route.
pub mod health;
/// Host routes.
pub mod host;
/// Caller identity extractors.
pub mod identity;
/// Player routes.
pub mod player;
/// Public session status and event stream.
pub mod sessions;

/// Compose all route trees, wiring in shared state and documentation routes.
pub fn router(state: SharedState) -> Router<()> {
    let api_router = health::router()
        .merge(host::router())
        .merge(player::router())
        .merge(sessions::router());

    let docs_router = docs::router(state.clone());

    api_router.merge(docs_router).with_state(state)
}
