use axum::{
    Router,
    extract::{FromRef, Request},
    http::{HeaderName, HeaderValue, Method, header},
    middleware::{self, Next},
    response::Response,
};
use utoipa::{
    Modify, OpenApi,
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Domain rules with no HTTP or storage dependency.
pub mod roles;
pub mod rut;

// Application services and components.
pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod validation;

// Routers segregated by access level (public, authenticated, staff).
pub mod routes;
use auth::AuthUser;
use routes::{admin, authenticated, public};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::ApiError;
pub use repository::{MemoryRepository, PostgresRepository, RepositoryState};

/// ApiDoc
///
/// OpenAPI document aggregated from every `#[utoipa::path]` handler and
/// `ToSchema` type. Served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::root, handlers::health,
        handlers::auth::register_user, handlers::auth::login,
        handlers::auth::get_me, handlers::auth::update_profile,
        handlers::users::list_users, handlers::users::get_user,
        handlers::users::update_user, handlers::users::delete_user,
        handlers::products::list_products, handlers::products::get_product,
        handlers::products::create_product, handlers::products::update_product,
        handlers::products::toggle_product_visibility, handlers::products::delete_product,
    ),
    components(
        schemas(
            roles::Role, models::UserResponse, models::Product,
            models::RegisterRequest, models::LoginRequest, models::UpdateProfileRequest,
            models::UpdateUserRequest, models::ProductRequest, models::MessageResponse,
            models::AuthData, models::UserData, models::UsersData,
            models::ProductData, models::ProductsData,
            error::ErrorResponse, error::FieldError,
            handlers::ServiceInfo, handlers::ServiceEndpoints, handlers::HealthResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Registration, login and self-service profile"),
        (name = "users", description = "Staff user administration"),
        (name = "products", description = "Product catalog"),
        (name = "system", description = "Banner and liveness")
    )
)]
pub struct ApiDoc;

/// Registers the `bearer_auth` scheme referenced by protected paths.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// AppState
///
/// The single, cloneable container of shared services. Handlers and
/// extractors pull the parts they need through `FromRef`.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub config: AppConfig,
}

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// auth_middleware
///
/// Gate for the authenticated routes. Extracting `AuthUser` is the whole
/// check: a failed extraction short-circuits with its 401.
async fn auth_middleware(_auth_user: AuthUser, request: Request, next: Next) -> Response {
    next.run(request).await
}

/// staff_middleware
///
/// Gate for the staff routes: 401 without a valid session, 403 unless the
/// stored role is `administrador` or higher.
async fn staff_middleware(
    auth_user: AuthUser,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    auth_user.require_any(&roles::STAFF_ROLES)?;
    Ok(next.run(request).await)
}

/// Credentialed CORS for the configured storefront origin.
fn cors_layer(config: &AppConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
        .allow_credentials(true);

    match HeaderValue::from_str(&config.frontend_url) {
        Ok(origin) => cors.allow_origin(origin),
        Err(e) => {
            tracing::warn!(frontend_url = %config.frontend_url, error = %e, "FRONTEND_URL is not a valid origin; cross-origin requests will be refused");
            cors
        }
    }
}

/// create_router
///
/// Assembles the routing tree, attaches the access-level layers and the
/// observability stack, and binds the shared state.
pub fn create_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        .merge(
            authenticated::authenticated_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)),
        )
        .merge(
            admin::admin_routes()
                .route_layer(middleware::from_fn_with_state(state.clone(), staff_middleware)),
        )
        .fallback(handlers::not_found)
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for `TraceLayer` carrying method, URI and the request id, so every
/// log line of a request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
