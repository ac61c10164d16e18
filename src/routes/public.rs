use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router
///
/// Endpoints reachable without a token. Registration still inspects an
/// optional token to decide whether a staff role may be assigned.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::root))
        // Liveness for load balancers; both paths are in use.
        .route("/health", get(handlers::health))
        .route("/api/health", get(handlers::health))
        .route("/api/auth/register", post(handlers::auth::register_user))
        .route("/api/auth/login", post(handlers::auth::login))
        // GET /api/products?categoria=...&isActive=...&search=...
        .route("/api/products", get(handlers::products::list_products))
        .route("/api/products/{id}", get(handlers::products::get_product))
}
