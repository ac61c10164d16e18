use eduplay_api::{
    AppConfig, AppState, create_router,
    repository::{MemoryRepository, RepositoryState},
};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;

#[derive(Debug)]
pub struct TestApp {
    pub address: String,
}

/// Serves the full router on an ephemeral port backed by the in-memory store.
async fn spawn_app() -> TestApp {
    let state = AppState {
        repo: Arc::new(MemoryRepository::new()) as RepositoryState,
        config: AppConfig::default(),
    };
    let router = create_router(state);

    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind port");
    let port = listener.local_addr().unwrap().port();
    let address = format!("http://127.0.0.1:{}", port);

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    TestApp { address }
}

#[tokio::test]
async fn test_health_check_carries_request_id() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .get(format!("{}/api/health", app.address))
        .send()
        .await
        .expect("req fail");

    assert!(response.status().is_success());
    assert!(response.headers().contains_key("x-request-id"));
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_cors_allows_configured_frontend() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .request(reqwest::Method::OPTIONS, format!("{}/api/products", app.address))
        .header("Origin", "http://localhost:3000")
        .header("Access-Control-Request-Method", "POST")
        .send()
        .await
        .expect("req fail");

    assert_eq!(
        response
            .headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("http://localhost:3000")
    );
    assert_eq!(
        response
            .headers()
            .get("access-control-allow-credentials")
            .and_then(|v| v.to_str().ok()),
        Some("true")
    );
}

#[tokio::test]
async fn test_register_login_profile_roundtrip() {
    let app = spawn_app().await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{}/api/auth/register", app.address))
        .json(&json!({
            "nombre": "Diego",
            "apellidoPaterno": "Muñoz",
            "rut": "24.965.885-5",
            "email": "diego@example.cl",
            "password": "clave-segura",
        }))
        .send()
        .await
        .expect("req fail");
    assert_eq!(response.status(), reqwest::StatusCode::CREATED);

    let response = client
        .post(format!("{}/api/auth/login", app.address))
        .json(&json!({ "email": "diego@example.cl", "password": "clave-segura" }))
        .send()
        .await
        .expect("req fail");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.expect("json");
    let token = body["data"]["token"].as_str().expect("token").to_string();

    let response = client
        .get(format!("{}/api/auth/me", app.address))
        .bearer_auth(&token)
        .send()
        .await
        .expect("req fail");
    assert_eq!(response.status(), reqwest::StatusCode::OK);
    let body: Value = response.json().await.expect("json");
    assert_eq!(body["data"]["user"]["rutFormateado"], "24.965.885-5");
    assert_eq!(body["data"]["user"]["nombreCompleto"], "Diego Muñoz");
}

#[tokio::test]
async fn test_openapi_document_is_served() {
    let app = spawn_app().await;

    let body: Value = reqwest::get(format!("{}/api-docs/openapi.json", app.address))
        .await
        .expect("req fail")
        .json()
        .await
        .expect("json");

    assert!(body["paths"]["/api/auth/register"].is_object());
    assert!(body["paths"]["/api/products/{id}/toggle-visibility"].is_object());
}
