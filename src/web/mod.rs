use std::sync::Arc;

use axum::{
    Json, Router,
    response::Html,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, TraceLayer},
};
use tracing::Level;

use crate::config::{AppConfig, ServerConfig};
use crate::monitor::MonitorEngine;
use crate::notifier::Notifier;
use crate::store::ProductStore;

pub mod handlers;
pub mod responses;

pub use handlers::{
    create_product, deactivate_product, get_status, list_products, monitoring_status,
    start_monitoring, stop_monitoring, test_email, test_product,
};
pub use responses::*;

#[derive(Clone)]
pub struct AppState {
    pub store: ProductStore,
    pub engine: Arc<MonitorEngine>,
    pub notifier: Arc<dyn Notifier>,
    pub config: AppConfig,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health_check))
        // API routes
        .nest("/api/v1", api_routes())
        // Dashboard
        .route("/", get(dashboard_page))
        .route("/dashboard", get(dashboard_page))
        // Add middleware
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(
                            tower_http::trace::DefaultOnResponse::new().level(Level::INFO),
                        ),
                )
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/status", get(get_status))
        // Product management
        .route("/products", get(list_products).post(create_product))
        .route("/products/:id", axum::routing::delete(deactivate_product))
        .route("/products/:id/test", post(test_product))
        // Monitoring control
        .route("/monitor/start", post(start_monitoring))
        .route("/monitor/stop", post(stop_monitoring))
        .route("/monitor/status", get(monitoring_status))
        // Mail configuration check
        .route("/test-email", post(test_email))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": "restock-watcher"
    }))
}

async fn dashboard_page() -> Html<&'static str> {
    Html(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Restock Watcher</title>
    <meta charset="utf-8">
    <style>
        body { font-family: Arial, sans-serif; margin: 40px; }
        code { background: #f8f9fa; padding: 2px 5px; border-radius: 3px; }
        li { margin: 6px 0; }
    </style>
</head>
<body>
    <h1>Restock Watcher</h1>
    <p>Back-in-stock monitoring and email notification service.</p>
    <ul>
        <li><code>GET /api/v1/status</code> - product counts and engine state</li>
        <li><code>GET /api/v1/products</code> - list monitored products</li>
        <li><code>POST /api/v1/products</code> - add a product</li>
        <li><code>DELETE /api/v1/products/:id</code> - stop monitoring a product</li>
        <li><code>POST /api/v1/products/:id/test</code> - check one product now</li>
        <li><code>POST /api/v1/monitor/start</code> - start the monitoring loop</li>
        <li><code>POST /api/v1/monitor/stop</code> - stop the monitoring loop</li>
        <li><code>POST /api/v1/test-email</code> - verify mail settings</li>
    </ul>
</body>
</html>"#,
    )
}

pub async fn serve(server: &ServerConfig, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", server.host, server.port)).await?;

    tracing::info!("Server starting on {}:{}", server.host, server.port);

    axum::serve(listener, app).await?;

    Ok(())
}
