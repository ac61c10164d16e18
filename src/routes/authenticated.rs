use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router
///
/// Self-service account endpoints. The layer added in `create_router`
/// rejects requests without a valid token before they reach a handler.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        .route("/api/auth/me", get(handlers::auth::get_me))
        // GET is an alias of /me; PUT edits the caller's own data.
        .route(
            "/api/auth/profile",
            get(handlers::auth::get_me).put(handlers::auth::update_profile),
        )
}
