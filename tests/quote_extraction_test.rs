//! Tests for the quote extraction adapter: response parsing, failure
//! classification, and the retry/backoff policy, against a mock endpoint.

use std::time::{Duration, Instant};

use assert_matches::assert_matches;
use parc_api::errors::ServiceError;
use parc_api::services::quotes::{QuoteExtractionService, QuoteExtractionSettings};
use rust_decimal_macros::dec;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings_for(server: &MockServer) -> QuoteExtractionSettings {
    QuoteExtractionSettings {
        endpoint: server.uri(),
        api_key: Some("test-key".to_string()),
        model: "quote-extractor-v1".to_string(),
        max_attempts: 3,
        // Scaled down from the production 2s so the retry tests stay fast
        initial_backoff: Duration::from_millis(50),
        request_timeout: Duration::from_secs(5),
    }
}

fn service_for(server: &MockServer) -> QuoteExtractionService {
    QuoteExtractionService::with_client(settings_for(server), reqwest::Client::new())
}

fn tool_call_body() -> serde_json::Value {
    json!({
        "content": [
            {
                "type": "tool_use",
                "name": "record_quote",
                "input": {
                    "supplier": "Dell France",
                    "reference": "DEVIS-2024-0042",
                    "lines": [
                        { "material_name": "Latitude 5550", "quantity": 3, "unit_price": 899.0 },
                        { "material_name": "Dock WD19", "quantity": 3, "unit_price": 199.0 }
                    ],
                    "total_amount": 3294.0
                }
            }
        ]
    })
}

#[tokio::test]
async fn successful_extraction_reads_the_tool_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_body()))
        .expect(1)
        .mount(&server)
        .await;

    let quote = service_for(&server)
        .extract_quote("DEVIS-2024-0042 Dell France ... 3x Latitude 5550 ...")
        .await
        .expect("extraction should succeed");

    assert_eq!(quote.supplier.as_deref(), Some("Dell France"));
    assert_eq!(quote.reference.as_deref(), Some("DEVIS-2024-0042"));
    assert_eq!(quote.lines.len(), 2);
    assert_eq!(quote.lines[0].quantity, 3);
    assert_eq!(quote.lines[0].unit_price, dec!(899.0));
    assert_eq!(quote.total_amount, Some(dec!(3294.0)));
}

#[tokio::test]
async fn falls_back_to_plain_json_content() {
    let server = MockServer::start().await;

    let body = json!({
        "content": [
            {
                "type": "text",
                "text": "```json\n{\"supplier\": \"HP\", \"lines\": [{\"material_name\": \"EliteBook 840\"}]}\n```"
            }
        ]
    });

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(&server)
        .await;

    let quote = service_for(&server)
        .extract_quote("some pdf text")
        .await
        .expect("fallback should succeed");

    assert_eq!(quote.supplier.as_deref(), Some("HP"));
    assert_eq!(quote.lines.len(), 1);
    assert_eq!(quote.lines[0].quantity, 1);
}

#[tokio::test]
async fn rate_limit_surfaces_immediately_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .expect(1)
        .mount(&server)
        .await;

    let result = service_for(&server).extract_quote("some pdf text").await;

    assert_matches!(result, Err(ServiceError::RateLimitExceeded));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn exhausted_credits_surface_immediately_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(402))
        .expect(1)
        .mount(&server)
        .await;

    let result = service_for(&server).extract_quote("some pdf text").await;

    assert_matches!(result, Err(ServiceError::InsufficientCredits(_)));
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn transient_failures_are_retried_with_backoff() {
    let server = MockServer::start().await;

    // Two failures, then success
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_body()))
        .mount(&server)
        .await;

    let start = Instant::now();
    let quote = service_for(&server)
        .extract_quote("some pdf text")
        .await
        .expect("third attempt should succeed");
    let elapsed = start.elapsed();

    assert_eq!(quote.lines.len(), 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    // Backoff doubles: first wait 50ms, second 100ms
    assert!(
        elapsed >= Duration::from_millis(150),
        "elapsed {:?} should include both backoff delays",
        elapsed
    );
}

#[tokio::test]
async fn persistent_failure_exhausts_attempts() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let result = service_for(&server).extract_quote("some pdf text").await;

    assert_matches!(result, Err(ServiceError::ServiceUnavailable(_)));
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn malformed_success_bodies_are_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json at all"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_body()))
        .mount(&server)
        .await;

    let quote = service_for(&server)
        .extract_quote("some pdf text")
        .await
        .expect("second attempt should succeed");

    assert_eq!(quote.supplier.as_deref(), Some("Dell France"));
    assert_eq!(server.received_requests().await.unwrap().len(), 2);
}

#[tokio::test]
async fn blank_input_is_rejected_before_any_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(tool_call_body()))
        .expect(0)
        .mount(&server)
        .await;

    let result = service_for(&server).extract_quote("   \n  ").await;

    assert_matches!(result, Err(ServiceError::ValidationError(_)));
    assert!(server.received_requests().await.unwrap().is_empty());
}
