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
    errors::ServiceError,
    handlers::common::{validate_input, PaginationParams},
    services::materials::{
        CreateMaterialRequest, MaterialListResponse, MaterialResponse, UpdateMaterialRequest,
    },
    ApiResponse, AppState,
};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ListMaterialsQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
    /// Filter on the exact category
    pub category: Option<String>,
    /// Search in material names
    pub search: Option<String>,
}

/// List catalog materials
#[utoipa::path(
    get,
    path = "/api/v1/materials",
    params(ListMaterialsQuery),
    responses(
        (status = 200, description = "Materials listed", body = crate::ApiResponse<MaterialListResponse>)
    ),
    tag = "materials"
)]
pub async fn list_materials(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<ListMaterialsQuery>,
) -> Result<Json<ApiResponse<MaterialListResponse>>, ServiceError> {
    let (page, per_page) = PaginationParams {
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(20),
    }
    .normalized();

    let materials = state
        .services
        .materials
        .list_materials(page, per_page, query.category, query.search)
        .await?;

    Ok(Json(ApiResponse::success(materials)))
}

/// Get one material
#[utoipa::path(
    get,
    path = "/api/v1/materials/{id}",
    params(("id" = Uuid, Path, description = "Material id")),
    responses(
        (status = 200, description = "Material found", body = crate::ApiResponse<MaterialResponse>),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn get_material(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<MaterialResponse>>, ServiceError> {
    let material = state
        .services
        .materials
        .get_material(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Material {} not found", id)))?;

    Ok(Json(ApiResponse::success(material)))
}

/// Create a catalog material
#[utoipa::path(
    post,
    path = "/api/v1/materials",
    request_body = CreateMaterialRequest,
    responses(
        (status = 201, description = "Material created", body = crate::ApiResponse<MaterialResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn create_material(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<CreateMaterialRequest>,
) -> Result<(StatusCode, Json<ApiResponse<MaterialResponse>>), ServiceError> {
    validate_input(&payload)?;

    let material = state.services.materials.create_material(payload).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(material))))
}

/// Update a catalog material
#[utoipa::path(
    put,
    path = "/api/v1/materials/{id}",
    params(("id" = Uuid, Path, description = "Material id")),
    request_body = UpdateMaterialRequest,
    responses(
        (status = 200, description = "Material updated", body = crate::ApiResponse<MaterialResponse>),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn update_material(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMaterialRequest>,
) -> Result<Json<ApiResponse<MaterialResponse>>, ServiceError> {
    validate_input(&payload)?;

    let material = state.services.materials.update_material(id, payload).await?;
    Ok(Json(ApiResponse::success(material)))
}

/// Delete a material without serialized units
#[utoipa::path(
    delete,
    path = "/api/v1/materials/{id}",
    params(("id" = Uuid, Path, description = "Material id")),
    responses(
        (status = 204, description = "Material deleted"),
        (status = 404, description = "Material not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Material still has serial units", body = crate::errors::ErrorResponse)
    ),
    tag = "materials"
)]
pub async fn delete_material(
    State(state): State<AppState>,
    _user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ServiceError> {
    state.services.materials.delete_material(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
