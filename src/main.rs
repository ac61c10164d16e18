use eduplay_api::{
    AppState,
    config::{AppConfig, Env},
    create_router, repository,
};
use std::process::ExitCode;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global subscriber: pretty output locally, JSON in production.
fn init_tracing(env: Env) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "eduplay_api=debug,tower_http=info,axum=info".into());

    match env {
        Env::Local => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init(),
        Env::Production => tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("shutdown signal received, draining connections");
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let config = AppConfig::load();
    init_tracing(config.env);

    tracing::info!(env = ?config.env, port = config.port, "EduPlay API starting");

    let repo = match repository::connect(&config).await {
        Ok(repo) => repo,
        Err(e) => {
            tracing::error!(error = %e, "FATAL: could not open the database. Check DATABASE_URL.");
            return ExitCode::FAILURE;
        }
    };

    let addr = format!("0.0.0.0:{}", config.port);
    let port = config.port;
    let app = create_router(AppState { repo, config });

    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "FATAL: could not bind listener");
            return ExitCode::FAILURE;
        }
    };

    tracing::info!(%addr, "listening");
    tracing::info!("API documentation (Swagger UI) at http://localhost:{port}/swagger-ui");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server terminated with an error");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
