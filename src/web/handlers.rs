use axum::{
    Json,
    extract::{Path, State},
};
use validator::Validate;

use super::AppState;
use super::responses::{ApiResponse, AppError, CheckResponse, MessageResponse, StatusResponse};
use crate::models::{NewProduct, Product};
use crate::monitor::{EngineStatus, StartOutcome, StopOutcome};
use crate::store::StoreError;

pub async fn get_status(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StatusResponse>>, AppError> {
    let products = state.store.list_all().await.map_err(store_failure)?;
    let notifications_sent = state
        .store
        .count_notifications()
        .await
        .map_err(store_failure)?;

    let active_products = products.iter().filter(|p| p.is_active).count() as i64;

    Ok(Json(ApiResponse::success(StatusResponse {
        total_products: products.len() as i64,
        active_products,
        monitoring: state.engine.status(),
        notifications_sent,
    })))
}

pub async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Product>>>, AppError> {
    let products = state.store.list_all().await.map_err(store_failure)?;
    Ok(Json(ApiResponse::success(products)))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<NewProduct>,
) -> Result<Json<ApiResponse<Product>>, AppError> {
    if let Err(e) = request.validate() {
        return Err(AppError::unprocessable(e.to_string()));
    }

    match state.store.insert(&request).await {
        Ok(product) => {
            tracing::info!(product_id = product.id, name = %product.name, "product added");
            Ok(Json(ApiResponse::success(product)))
        }
        Err(StoreError::DuplicateUrl { url }) => Err(AppError::conflict(format!(
            "Product with URL '{}' already exists",
            url
        ))),
        Err(e) => {
            tracing::error!(error = %e, "failed to create product");
            Err(AppError::internal("Failed to create product"))
        }
    }
}

/// "Removal" is permanent deactivation; rows are never deleted.
pub async fn deactivate_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, AppError> {
    let product = match state.store.get(id).await {
        Ok(product) => product,
        Err(StoreError::NotFound { .. }) => return Err(AppError::not_found("Product")),
        Err(e) => return Err(store_failure(e)),
    };

    state.store.deactivate(id).await.map_err(store_failure)?;
    tracing::info!(product_id = id, name = %product.name, "product deactivated");

    Ok(Json(ApiResponse::success(MessageResponse::new(format!(
        "Product '{}' deactivated",
        product.name
    )))))
}

/// Ad hoc availability probe; touches no product or notification state.
pub async fn test_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<CheckResponse>>, AppError> {
    let product = match state.store.get(id).await {
        Ok(product) => product,
        Err(StoreError::NotFound { .. }) => return Err(AppError::not_found("Product")),
        Err(e) => return Err(store_failure(e)),
    };

    let availability = match state.engine.check_one(id).await {
        Ok(availability) => availability,
        Err(StoreError::NotFound { .. }) => return Err(AppError::not_found("Product")),
        Err(e) => return Err(store_failure(e)),
    };

    Ok(Json(ApiResponse::success(CheckResponse {
        product_id: id,
        product_name: product.name,
        availability,
        checked_at: chrono::Utc::now(),
    })))
}

pub async fn start_monitoring(
    State(state): State<AppState>,
) -> Json<ApiResponse<MessageResponse>> {
    let message = match state.engine.start().await {
        StartOutcome::Started => "Monitoring started",
        StartOutcome::AlreadyRunning => "Monitoring is already running",
    };
    Json(ApiResponse::success(MessageResponse::new(message)))
}

pub async fn stop_monitoring(State(state): State<AppState>) -> Json<ApiResponse<MessageResponse>> {
    let message = match state.engine.stop().await {
        StopOutcome::Stopped => "Monitoring stopped",
        StopOutcome::NotRunning => "Monitoring is not running",
    };
    Json(ApiResponse::success(MessageResponse::new(message)))
}

pub async fn monitoring_status(State(state): State<AppState>) -> Json<ApiResponse<EngineStatus>> {
    Json(ApiResponse::success(state.engine.status()))
}

/// Send a fixture notification to the configured sender address to verify
/// mail settings.
pub async fn test_email(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<MessageResponse>>, AppError> {
    let recipient = state
        .config
        .smtp
        .username
        .clone()
        .or_else(|| state.config.smtp.from_address.clone())
        .ok_or_else(|| AppError::bad_request("No SMTP username or from_address configured"))?;

    let delivered = state
        .notifier
        .dispatch(&recipient, "Test Product", "https://example.com")
        .await;

    if delivered {
        Ok(Json(ApiResponse::success(MessageResponse::new(
            "Test email sent",
        ))))
    } else {
        Err(AppError::unavailable("Test email delivery failed"))
    }
}

fn store_failure(error: StoreError) -> AppError {
    tracing::error!(error = %error, "store operation failed");
    AppError::internal("Store operation failed")
}
