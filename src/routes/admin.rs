use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch, post},
};

/// Staff Router
///
/// User administration and catalog management. Wrapped by the staff layer,
/// which admits `administrador` and `dueno`. Finer rules (who may manage
/// whom) are enforced by the handlers through `roles::check_management`.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /api/users?role=...&isActive=...&search=...
        .route("/api/users", get(handlers::users::list_users))
        .route(
            "/api/users/{id}",
            get(handlers::users::get_user)
                .put(handlers::users::update_user)
                .delete(handlers::users::delete_user),
        )
        .route("/api/products", post(handlers::products::create_product))
        .route(
            "/api/products/{id}",
            axum::routing::put(handlers::products::update_product)
                .delete(handlers::products::delete_product),
        )
        .route(
            "/api/products/{id}/toggle-visibility",
            patch(handlers::products::toggle_product_visibility),
        )
}
