use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::{
    auth::AuthUser,
    errors::ServiceError,
    handlers::common::validate_input,
    services::quotes::ExtractedQuote,
    ApiResponse, AppState,
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ExtractQuoteRequest {
    /// Raw text extracted from the quote PDF
    #[validate(length(min = 1, message = "pdf_text is required"))]
    pub pdf_text: String,
}

/// Extract a structured quote from PDF text
#[utoipa::path(
    post,
    path = "/api/v1/quotes/extract",
    request_body = ExtractQuoteRequest,
    responses(
        (status = 200, description = "Quote extracted", body = crate::ApiResponse<ExtractedQuote>),
        (status = 402, description = "Extraction credits exhausted", body = crate::errors::ErrorResponse),
        (status = 429, description = "Extraction rate limited", body = crate::errors::ErrorResponse),
        (status = 503, description = "Extraction service unavailable", body = crate::errors::ErrorResponse)
    ),
    tag = "quotes"
)]
pub async fn extract_quote(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(payload): Json<ExtractQuoteRequest>,
) -> Result<Json<ApiResponse<ExtractedQuote>>, ServiceError> {
    validate_input(&payload)?;

    let quotes = state.services.quotes.as_ref().ok_or_else(|| {
        ServiceError::ServiceUnavailable("quote extraction is not configured".to_string())
    })?;

    let quote = quotes.extract_quote(&payload.pdf_text).await?;
    Ok(Json(ApiResponse::success(quote)))
}
