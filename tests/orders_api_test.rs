//! Router-level tests covering authentication, order CRUD, the status
//! lifecycle, and delivery confirmation through the HTTP surface.

mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use serde_json::json;

fn order_payload() -> serde_json::Value {
    json!({
        "reference": "CMD-2024-0042",
        "supplier": "Dell France",
        "lines": [
            {
                "material_name": "Latitude 5550",
                "quantity": 2,
                "unit_price": "899.00",
                "tax_rate": "0.20"
            }
        ]
    })
}

#[tokio::test]
async fn requests_without_token_are_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request_anonymous(Method::GET, "/api/v1/orders", None)
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn requests_with_garbage_token_are_rejected() {
    let app = TestApp::new().await;

    let response = app
        .request_with_token(Method::GET, "/api/v1/orders", None, "not-a-jwt")
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn create_and_fetch_an_order() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(Method::POST, "/api/v1/orders", Some(order_payload()))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let body = response_json(response).await;
    assert_eq!(body["success"], json!(true));
    assert_eq!(body["data"]["status"], json!("requested"));
    assert_eq!(body["data"]["currency"], json!("EUR"));
    // 2 * 899.00 * 1.20
    let total: rust_decimal::Decimal = body["data"]["total_amount"]
        .as_str()
        .expect("total_amount")
        .parse()
        .expect("decimal total");
    assert_eq!(total, rust_decimal_macros::dec!(2157.60));
    let order_id = body["data"]["id"].as_str().expect("order id").to_string();

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["data"]["reference"], json!("CMD-2024-0042"));
    assert_eq!(body["data"]["lines"].as_array().map(Vec::len), Some(1));
    assert_eq!(body["data"]["lines"][0]["delivered_quantity"], json!(0));
}

#[tokio::test]
async fn order_validation_errors_are_bad_requests() {
    let app = TestApp::new().await;

    let payload = json!({
        "reference": "CMD-2024-0042",
        "supplier": "Dell France",
        "lines": []
    });

    let response = app
        .request_authenticated(Method::POST, "/api/v1/orders", Some(payload))
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn status_lifecycle_is_forward_only() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(Method::POST, "/api/v1/orders", Some(order_payload()))
        .await;
    let body = response_json(response).await;
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    // Forward: requested -> supplier_ordered (skipping internal_circuit)
    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}/status"),
            Some(json!({ "status": "supplier_ordered" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], json!("supplier_ordered"));

    // Backward: supplier_ordered -> requested is rejected
    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}/status"),
            Some(json!({ "status": "requested" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Unknown status values are rejected
    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/orders/{order_id}/status"),
            Some(json!({ "status": "teleported" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delivery_endpoint_reports_progress_and_completion() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(Method::POST, "/api/v1/orders", Some(order_payload()))
        .await;
    let body = response_json(response).await;
    let order_id = body["data"]["id"].as_str().unwrap().to_string();
    let line_id = body["data"]["lines"][0]["id"].as_str().unwrap().to_string();

    // First serial: partial
    let response = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/delivery"),
            Some(json!({ "serials_by_line": { line_id.clone(): ["SN-001"] } })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["fully_delivered"], json!(false));
    assert_eq!(body["data"]["lines"][0]["serials_registered"], json!(1));

    // Second serial: complete
    let response = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/orders/{order_id}/delivery"),
            Some(json!({ "serials_by_line": { line_id: ["SN-002"] } })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["fully_delivered"], json!(true));

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["status"], json!("delivered"));

    // The delivered serials are now visible in the inventory
    let response = app
        .request_authenticated(Method::GET, "/api/v1/serials?search=SN-00", None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["total"], json!(2));
}

#[tokio::test]
async fn delivery_for_unknown_order_is_404() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            &format!("/api/v1/orders/{}/delivery", uuid::Uuid::new_v4()),
            Some(json!({ "serials_by_line": {} })),
        )
        .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn order_deletion_is_admin_gated() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(Method::POST, "/api/v1/orders", Some(order_payload()))
        .await;
    let body = response_json(response).await;
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    // A regular user cannot delete
    let response = app
        .request_authenticated(Method::DELETE, &format!("/api/v1/orders/{order_id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // An admin can
    let admin_token = app.token_with_roles(&["admin"]);
    let response = app
        .request_with_token(
            Method::DELETE,
            &format!("/api/v1/orders/{order_id}"),
            None,
            &admin_token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/orders/{order_id}"), None)
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn materials_crud_through_the_api() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/materials",
            Some(json!({
                "name": "UltraSharp U2724D",
                "category": "screens",
                "unit_price": "329.00"
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = response_json(response).await;
    let material_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["stock"], json!(0));

    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/materials/{material_id}"),
            Some(json!({ "category": "displays" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["data"]["category"], json!("displays"));

    // Register one unit; stock follows
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/serials",
            Some(json!({
                "serial_number": "SCR-001",
                "material_id": material_id
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/materials/{material_id}"), None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["stock"], json!(1));

    // Deleting a material with units is a conflict, even for admins
    let admin_token = app.token_with_roles(&["admin"]);
    let response = app
        .request_with_token(
            Method::DELETE,
            &format!("/api/v1/materials/{material_id}"),
            None,
            &admin_token,
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn serial_lifecycle_keeps_stock_consistent() {
    let app = TestApp::new().await;

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/materials",
            Some(json!({
                "name": "Latitude 5550",
                "category": "laptops",
                "unit_price": "899.00"
            })),
        )
        .await;
    let body = response_json(response).await;
    let material_id = body["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/serials",
            Some(json!({
                "serial_number": "LAT-001",
                "material_id": material_id
            })),
        )
        .await;
    let body = response_json(response).await;
    let serial_id = body["data"]["id"].as_str().unwrap().to_string();

    // Assign the unit: it leaves stock
    let response = app
        .request_authenticated(
            Method::PUT,
            &format!("/api/v1/serials/{serial_id}/status"),
            Some(json!({ "status": "assigned" })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request_authenticated(Method::GET, &format!("/api/v1/materials/{material_id}"), None)
        .await;
    let body = response_json(response).await;
    assert_eq!(body["data"]["stock"], json!(0));

    // Duplicate serial numbers are rejected by the manual path
    let response = app
        .request_authenticated(
            Method::POST,
            "/api/v1/serials",
            Some(json!({
                "serial_number": "LAT-001",
                "material_id": material_id
            })),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}
