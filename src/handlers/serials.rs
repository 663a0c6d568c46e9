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
    entities::serial_unit::SerialStatus,
    errors::ServiceError,
    handlers::common::{validate_input, PaginationParams},
    services::serials::{
        RegisterSerialRequest, SerialListFilter, SerialListResponse, SerialResponse,
        UpdateSerialStatusRequest,
    },
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListSerialsQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Filter on the owning material
    pub material_id: Option<Uuid>,
    /// Filter on the unit lifecycle status
    pub status: Option<String>,
    /// Search in serial numbers
    pub search: Option<String>,
}

/// List serialized units
#[utoipa::path(
    get,
    path = "/api/v1/serials",
    params(ListSerialsQuery),
    responses(
        (status = 200, description = "Serial units listed", body = crate::ApiResponse<SerialListResponse>)
    ),
    tag = "serials"
)]
pub async fn list_serials(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ListSerialsQuery>,
) -> Result<Json<ApiResponse<SerialListResponse>>, ServiceError> {
    let (page, per_page) = PaginationParams {
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    }
    .normalized();

    let status = query
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<SerialStatus>()
                .map_err(|_| ServiceError::InvalidStatus(format!("Unknown serial status: {}", s)))
        })
        .transpose()?;

    let filter = SerialListFilter {
        material_id: query.material_id,
        status,
        search: query.search,
    };

    let serials = state
        .services
        .serials
        .list_serials(page, per_page, filter)
        .await?;

    Ok(Json(ApiResponse::success(serials)))
}

/// Get one serialized unit
#[utoipa::path(
    get,
    path = "/api/v1/serials/{id}",
    params(("id" = Uuid, Path, description = "Serial unit id")),
    responses(
        (status = 200, description = "Serial unit found", body = crate::ApiResponse<SerialResponse>),
        (status = 404, description = "Serial unit not found", body = crate::errors::ErrorResponse)
    ),
    tag = "serials"
)]
pub async fn get_serial(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<SerialResponse>>, ServiceError> {
    let serial = state
        .services
        .serials
        .get_serial(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Serial unit {} not found", id)))?;

    Ok(Json(ApiResponse::success(serial)))
}

/// Manually register a serialized unit
#[utoipa::path(
    post,
    path = "/api/v1/serials",
    request_body = RegisterSerialRequest,
    responses(
        (status = 201, description = "Serial registered", body = crate::ApiResponse<SerialResponse>),
        (status = 409, description = "Serial number already registered", body = crate::errors::ErrorResponse)
    ),
    tag = "serials"
)]
pub async fn register_serial(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<RegisterSerialRequest>,
) -> Result<(StatusCode, Json<ApiResponse<SerialResponse>>), ServiceError> {
    validate_input(&payload)?;

    let serial = state.services.serials.register_serial(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(serial))))
}

/// Move a serialized unit through its lifecycle
#[utoipa::path(
    put,
    path = "/api/v1/serials/{id}/status",
    params(("id" = Uuid, Path, description = "Serial unit id")),
    request_body = UpdateSerialStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = crate::ApiResponse<SerialResponse>),
        (status = 400, description = "Invalid transition", body = crate::errors::ErrorResponse),
        (status = 404, description = "Serial unit not found", body = crate::errors::ErrorResponse)
    ),
    tag = "serials"
)]
pub async fn update_serial_status(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateSerialStatusRequest>,
) -> Result<Json<ApiResponse<SerialResponse>>, ServiceError> {
    validate_input(&payload)?;

    let serial = state
        .services
        .serials
        .update_serial_status(id, payload)
        .await?;

    Ok(Json(ApiResponse::success(serial)))
}
