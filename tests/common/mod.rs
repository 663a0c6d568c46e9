use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, Response},
    Router,
};
use rust_decimal::Decimal;
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use parc_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    db::{self, DbConfig},
    events::{self, EventSender},
    handlers::AppServices,
    services::orders::{CreateOrderLineRequest, CreateOrderRequest, OrderResponse},
    AppState,
};

const TEST_JWT_SECRET: &str =
    "an_unusually_long_testing_jwt_secret_value_with_plenty_of_entropy_0192837465";

/// Helper harness spinning up application state backed by an in-memory
/// SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    auth_service: Arc<AuthService>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            TEST_JWT_SECRET.to_string(),
            3600,
            "127.0.0.1".to_string(),
            18_080,
            "test".to_string(),
        );
        cfg.db_max_connections = 1;
        cfg.db_min_connections = 1;

        // An in-memory SQLite database lives and dies with its connection,
        // so the pool must stay at exactly one connection
        let db_cfg = DbConfig {
            url: cfg.database_url.clone(),
            max_connections: 1,
            min_connections: 1,
            ..Default::default()
        };

        let pool = db::establish_connection_with_config(&db_cfg)
            .await
            .expect("failed to create test database");

        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let db_arc = Arc::new(pool);

        let (event_tx, event_rx) = mpsc::channel(64);
        let event_sender = EventSender::new(event_tx);
        let event_task = tokio::spawn(events::process_events(event_rx));

        let auth_service = Arc::new(AuthService::new(AuthConfig::new(
            cfg.jwt_secret.clone(),
            Duration::from_secs(cfg.jwt_expiration as u64),
        )));

        let services = AppServices::new(db_arc.clone(), Arc::new(event_sender.clone()), &cfg)
            .expect("failed to build services");

        let state = AppState {
            db: db_arc,
            config: cfg,
            event_sender,
            services,
        };

        let auth_for_layer = auth_service.clone();
        let router = Router::new()
            .nest("/api/v1", parc_api::api_v1_routes())
            .layer(axum::middleware::from_fn_with_state(
                auth_for_layer,
                |axum::extract::State(auth): axum::extract::State<Arc<AuthService>>,
                 mut req: axum::extract::Request,
                 next: axum::middleware::Next| async move {
                    req.extensions_mut().insert(auth);
                    next.run(req).await
                },
            ))
            .with_state(state.clone());

        Self {
            router,
            state,
            auth_service,
            _event_task: event_task,
        }
    }

    /// Mint a bearer token for the given roles
    pub fn token_with_roles(&self, roles: &[&str]) -> String {
        self.auth_service
            .issue_token(
                "test-user",
                Some("Test User".to_string()),
                roles.iter().map(|r| r.to_string()).collect(),
            )
            .expect("failed to issue test token")
    }

    /// Issue a request without credentials
    pub async fn request_anonymous(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response<Body> {
        self.dispatch(method, uri, body, None).await
    }

    /// Issue a request authenticated as a regular user
    pub async fn request_authenticated(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response<Body> {
        let token = self.token_with_roles(&["inventory"]);
        self.dispatch(method, uri, body, Some(&token)).await
    }

    /// Issue a request authenticated with an explicit token
    pub async fn request_with_token(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: &str,
    ) -> Response<Body> {
        self.dispatch(method, uri, body, Some(token)).await
    }

    async fn dispatch(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response<Body> {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };

        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router response")
    }

    /// Seed an order directly through the order service
    pub async fn seed_order(&self, lines: Vec<(Option<uuid::Uuid>, &str, i32, Decimal)>) -> OrderResponse {
        let request = CreateOrderRequest {
            reference: format!("CMD-{}", &uuid::Uuid::new_v4().to_string()[..8]),
            supplier: "Dell France".to_string(),
            currency: None,
            total_amount: None,
            notes: None,
            lines: lines
                .into_iter()
                .map(
                    |(material_id, name, quantity, unit_price)| CreateOrderLineRequest {
                        material_id,
                        material_name: name.to_string(),
                        quantity,
                        unit_price,
                        tax_rate: Decimal::ZERO,
                    },
                )
                .collect(),
        };

        self.state
            .services
            .orders
            .create_order(request)
            .await
            .expect("failed to seed order")
    }
}

/// Decode a JSON response body
pub async fn response_json(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body bytes");
    serde_json::from_slice(&bytes).expect("json response")
}
