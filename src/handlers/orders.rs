use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    entities::order::OrderStatus,
    errors::ServiceError,
    handlers::common::{validate_input, PaginationParams},
    services::delivery::{ConfirmDeliveryRequest, DeliveryOutcome},
    services::orders::{
        CreateOrderRequest, OrderLineResponse, OrderListFilter, OrderListResponse, OrderResponse,
        UpdateOrderStatusRequest,
    },
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListOrdersQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Filter on the order lifecycle status
    pub status: Option<String>,
    /// Search in order reference and supplier
    pub search: Option<String>,
}

impl ListOrdersQuery {
    fn pagination(&self) -> PaginationParams {
        PaginationParams {
            page: self.page.unwrap_or(1),
            per_page: self.per_page.unwrap_or(20),
        }
    }
}

/// List orders
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(ListOrdersQuery),
    responses(
        (status = 200, description = "Orders listed", body = crate::ApiResponse<OrderListResponse>),
        (status = 401, description = "Unauthenticated")
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<ApiResponse<OrderListResponse>>, ServiceError> {
    let (page, per_page) = query.pagination().normalized();

    let status = query
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<OrderStatus>()
                .map_err(|_| ServiceError::InvalidStatus(format!("Unknown order status: {}", s)))
        })
        .transpose()?;

    let filter = OrderListFilter {
        status,
        search: query.search,
    };

    let orders = state.services.orders.list_orders(page, per_page, filter).await?;
    Ok(Json(ApiResponse::success(orders)))
}

/// Get one order with its lines
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order found", body = crate::ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .orders
        .get_order(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;

    Ok(Json(ApiResponse::success(order)))
}

/// Lines of one order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/lines",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order lines", body = crate::ApiResponse<Vec<OrderLineResponse>>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn get_order_lines(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Vec<OrderLineResponse>>>, ServiceError> {
    // Surface a 404 for unknown orders instead of an empty list
    state
        .services
        .orders
        .get_order(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", id)))?;

    let lines = state.services.orders.get_order_lines(id).await?;
    Ok(Json(ApiResponse::success(lines)))
}

/// Create an order with its lines
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = crate::ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    validate_input(&payload)?;

    let order = state.services.orders.create_order(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

/// Explicit order status override (forward-only)
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = crate::ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    validate_input(&payload)?;

    let order = state.services.orders.update_order_status(id, payload).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Confirm a (possibly partial) delivery with serial numbers per line
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/delivery",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = ConfirmDeliveryRequest,
    responses(
        (status = 200, description = "Delivery processed", body = crate::ApiResponse<DeliveryOutcome>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn confirm_delivery(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConfirmDeliveryRequest>,
) -> Result<Json<ApiResponse<DeliveryOutcome>>, ServiceError> {
    let outcome = state
        .services
        .delivery
        .confirm_delivery(id, payload, &user.user_id)
        .await?;

    Ok(Json(ApiResponse::success(outcome)))
}

/// Delete an order and its lines
#[utoipa::path(
    delete,
    path = "/api/v1/orders/{id}",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 204, description = "Order deleted"),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn delete_order(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.orders.delete_order(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
