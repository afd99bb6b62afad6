mod handlers;
mod judge;
mod llm;
mod question;
mod routes;
mod runner;

use axum::Router;
use prepd_common::Config;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub struct AppState {
    pub config: Config,
    pub http: reqwest::Client,
}

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("prepd API booting...");

    let config = Config::from_env();
    info!(
        judge_url = config.judge_base_url.as_deref().unwrap_or("NOT CONFIGURED"),
        judge_key = if config.judge_api_key.is_some() { "configured" } else { "NOT CONFIGURED" },
        rapidapi_host = config.rapidapi_host.as_deref().unwrap_or("not using RapidAPI"),
        llm = if config.llm_api_key.is_some() { "configured" } else { "NOT CONFIGURED" },
        "relay configuration loaded"
    );

    let state = Arc::new(AppState {
        config: config.clone(),
        http: reqwest::Client::new(),
    });

    // The browser frontend is served from another origin.
    let app = Router::new()
        .merge(routes::routes())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .expect("Failed to bind to address");

    info!("HTTP server listening on {}", config.bind_addr);
    info!("Ready to relay submissions");

    axum::serve(listener, app).await.expect("Server error");
}
