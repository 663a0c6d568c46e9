//! parc-api Library
//!
//! This crate provides the core functionality for the parc-api backend:
//! purchase orders, delivery reconciliation, the materials catalog,
//! serialized inventory, and quote extraction.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod services;

use axum::{extract::State, response::Json, routing::get, Router};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use utoipa::ToSchema;

use crate::auth::AuthRouterExt;

/// Role required for destructive endpoints
const ADMIN_ROLE: &str = "admin";

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

// Common response wrapper
#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    pub errors: Option<Vec<String>>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message),
            errors: None,
        }
    }

    pub fn validation_errors(errors: Vec<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some("Validation failed".to_string()),
            errors: Some(errors),
        }
    }
}

/// Standard API result type for JSON responses
pub type ApiResult<T> = Result<Json<ApiResponse<T>>, errors::ServiceError>;

// Versioned API routes
pub fn api_v1_routes() -> Router<AppState> {
    // Orders routes; reads and writes require authentication, deletion is
    // additionally role-gated
    let orders = Router::new()
        .route(
            "/orders",
            get(handlers::orders::list_orders).post(handlers::orders::create_order),
        )
        .route("/orders/:id", get(handlers::orders::get_order))
        .route("/orders/:id/lines", get(handlers::orders::get_order_lines))
        .route(
            "/orders/:id/status",
            axum::routing::put(handlers::orders::update_order_status),
        )
        .route(
            "/orders/:id/delivery",
            axum::routing::post(handlers::orders::confirm_delivery),
        )
        .with_auth();

    let orders_delete = Router::new()
        .route(
            "/orders/:id",
            axum::routing::delete(handlers::orders::delete_order),
        )
        .with_role(ADMIN_ROLE);

    // Materials catalog
    let materials = Router::new()
        .route(
            "/materials",
            get(handlers::materials::list_materials).post(handlers::materials::create_material),
        )
        .route(
            "/materials/:id",
            get(handlers::materials::get_material).put(handlers::materials::update_material),
        )
        .with_auth();

    let materials_delete = Router::new()
        .route(
            "/materials/:id",
            axum::routing::delete(handlers::materials::delete_material),
        )
        .with_role(ADMIN_ROLE);

    // Serialized inventory
    let serials = Router::new()
        .route(
            "/serials",
            get(handlers::serials::list_serials).post(handlers::serials::register_serial),
        )
        .route("/serials/:id", get(handlers::serials::get_serial))
        .route(
            "/serials/:id/status",
            axum::routing::put(handlers::serials::update_serial_status),
        )
        .with_auth();

    // Quote extraction
    let quotes = Router::new()
        .route(
            "/quotes/extract",
            axum::routing::post(handlers::quotes::extract_quote),
        )
        .with_auth();

    Router::new()
        // Status and health endpoints
        .route("/status", get(api_status))
        .route("/health", get(health_check))
        // Orders API
        .merge(orders)
        .merge(orders_delete)
        // Materials API
        .merge(materials)
        .merge(materials_delete)
        // Serials API
        .merge(serials)
        // Quotes API
        .merge(quotes)
}

async fn api_status() -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let version = env!("CARGO_PKG_VERSION");
    let git = option_env!("GIT_HASH").unwrap_or("unknown");
    let build_time = option_env!("BUILD_TIME").unwrap_or("unknown");
    let status_data = json!({
        "status": "ok",
        "version": version,
        "git": git,
        "build_time": build_time,
        "service": "parc-api",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "environment": std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
    });

    Ok(Json(ApiResponse::success(status_data)))
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, errors::ServiceError> {
    let db_status = match state.db.ping().await {
        Ok(_) => "healthy",
        Err(_) => "unhealthy",
    };

    let health_data = json!({
        "status": db_status,
        "checks": {
            "database": db_status,
        },
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    Ok(Json(ApiResponse::success(health_data)))
}

#[cfg(test)]
mod response_tests {
    use super::*;

    #[test]
    fn success_response_wraps_data() {
        let response = ApiResponse::success("ok");
        assert!(response.success);
        assert_eq!(response.data, Some("ok"));
        assert!(response.message.is_none());
    }

    #[test]
    fn error_response_carries_message() {
        let response = ApiResponse::<()>::error("oops".into());
        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("oops"));
    }

    #[test]
    fn validation_errors_response_lists_errors() {
        let response = ApiResponse::<()>::validation_errors(vec!["missing".into()]);
        assert!(!response.success);
        assert_eq!(
            response.errors.as_deref(),
            Some(&["missing".to_string()][..])
        );
    }
}
