use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "parc-api",
        version = "0.3.0",
        description = r#"
# parc-api

Backend API for IT-asset and purchase-order management.

## Features

- **Orders**: purchase orders with ordered lines and a forward-only lifecycle
- **Delivery reconciliation**: serial numbers in, delivery progress and terminal status out
- **Materials catalog**: kinds of equipment with a maintained stock counter
- **Serialized inventory**: physical units with unique serial numbers
- **Quote extraction**: structured quotes out of PDF text

## Authentication

All endpoints require a bearer token issued by the identity provider:

```
Authorization: Bearer <your-jwt-token>
```

## Pagination

List endpoints accept `page` and `per_page` query parameters (per_page is capped at 100).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "orders", description = "Order management and delivery reconciliation"),
        (name = "materials", description = "Materials catalog"),
        (name = "serials", description = "Serialized inventory"),
        (name = "quotes", description = "Quote extraction")
    ),
    paths(
        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::get_order_lines,
        crate::handlers::orders::create_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::confirm_delivery,
        crate::handlers::orders::delete_order,

        // Materials
        crate::handlers::materials::list_materials,
        crate::handlers::materials::get_material,
        crate::handlers::materials::create_material,
        crate::handlers::materials::update_material,
        crate::handlers::materials::delete_material,

        // Serials
        crate::handlers::serials::list_serials,
        crate::handlers::serials::get_serial,
        crate::handlers::serials::register_serial,
        crate::handlers::serials::update_serial_status,

        // Quotes
        crate::handlers::quotes::extract_quote,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,

            // Order types
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderLineResponse,
            crate::services::orders::OrderListResponse,
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::CreateOrderLineRequest,
            crate::services::orders::UpdateOrderStatusRequest,
            crate::entities::order::OrderStatus,

            // Delivery types
            crate::services::delivery::ConfirmDeliveryRequest,
            crate::services::delivery::DeliveryOutcome,
            crate::services::delivery::LineDeliveryOutcome,

            // Material types
            crate::services::materials::MaterialResponse,
            crate::services::materials::MaterialListResponse,
            crate::services::materials::CreateMaterialRequest,
            crate::services::materials::UpdateMaterialRequest,

            // Serial types
            crate::services::serials::SerialResponse,
            crate::services::serials::SerialListResponse,
            crate::services::serials::RegisterSerialRequest,
            crate::services::serials::UpdateSerialStatusRequest,
            crate::entities::serial_unit::SerialStatus,

            // Quote types
            crate::handlers::quotes::ExtractQuoteRequest,
            crate::services::quotes::ExtractedQuote,
            crate::services::quotes::ExtractedQuoteLine,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_core_paths() {
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("parc-api"));
        assert!(json.contains("/api/v1/orders"));
        assert!(json.contains("/api/v1/orders/{id}/delivery"));
        assert!(json.contains("/api/v1/quotes/extract"));
    }
}
