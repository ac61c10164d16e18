#![allow(dead_code)]

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use eduplay_api::{
    AppState,
    auth::{hash_password, issue_token},
    config::AppConfig,
    create_router,
    models::{Product, User},
    repository::{MemoryRepository, RepositoryState},
    roles::Role,
};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

pub const PASSWORD: &str = "secreto123";

/// State over a fresh in-memory store with fast bcrypt.
pub fn test_state() -> AppState {
    AppState {
        repo: Arc::new(MemoryRepository::new()) as RepositoryState,
        config: AppConfig::default(),
    }
}

pub fn test_app(state: &AppState) -> Router {
    create_router(state.clone())
}

/// Inserts an active account with password [`PASSWORD`]. `age_minutes`
/// back-dates `created_at` so ordering tests are deterministic.
pub async fn seed_user_aged(
    state: &AppState,
    role: Role,
    email: &str,
    rut: &str,
    age_minutes: i64,
) -> User {
    let created = Utc::now() - Duration::minutes(age_minutes);
    let user = User {
        id: Uuid::new_v4(),
        nombre: "Test".to_string(),
        apellido_paterno: role.display_name().to_string(),
        apellido_materno: None,
        rut: rut.to_string(),
        email: email.to_string(),
        password_hash: hash_password(PASSWORD.to_string(), 4)
            .await
            .expect("hash"),
        role,
        is_active: true,
        created_at: created,
        updated_at: created,
    };
    state.repo.create_user(user).await.expect("seed user")
}

pub async fn seed_user(state: &AppState, role: Role, email: &str, rut: &str) -> User {
    seed_user_aged(state, role, email, rut, 0).await
}

pub async fn seed_product(state: &AppState, sku: &str, categoria: &str, is_active: bool) -> Product {
    let now = Utc::now();
    state
        .repo
        .create_product(Product {
            id: Uuid::new_v4(),
            nombre: format!("Juego {sku}"),
            descripcion: "Juego educativo".to_string(),
            sku: sku.to_string(),
            precio: 9990.0,
            precio_oferta: None,
            stock: 5,
            imagen: None,
            categoria: categoria.to_string(),
            is_active,
            created_at: now,
            updated_at: now,
        })
        .await
        .expect("seed product")
}

pub fn token_for(state: &AppState, user: &User) -> String {
    issue_token(user, &state.config).expect("token")
}

/// Builds a request with an optional bearer token and JSON body.
pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .expect("request"),
        None => builder.body(Body::empty()).expect("request"),
    }
}

/// Runs one request through the router and decodes the JSON body
/// (`Value::Null` when the body is not JSON).
pub async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.expect("router is infallible");
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
