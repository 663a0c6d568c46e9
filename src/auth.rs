use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    extract::{Request, State},
    http::{header, request::Parts, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by tokens issued by the external identity provider.
/// This API only validates them; it never issues tokens outside tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub iat: i64,
    pub exp: i64,
    pub jti: String,
}

/// Authenticated principal extracted from a validated bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: String,
    pub name: Option<String>,
    pub roles: Vec<String>,
    pub token_id: String,
}

impl AuthUser {
    /// Check if the user has a specific role
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Check if the user is an admin
    pub fn is_admin(&self) -> bool {
        self.has_role("admin")
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    jwt_secret: String,
    token_lifetime: Duration,
}

impl AuthConfig {
    pub fn new(jwt_secret: String, token_lifetime: Duration) -> Self {
        Self {
            jwt_secret,
            token_lifetime,
        }
    }
}

/// Validates bearer tokens against the shared HS256 secret
pub struct AuthService {
    config: AuthConfig,
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Validate a JWT and return its claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            _ => AuthError::InvalidToken,
        })
    }

    /// Mint a token signed with the shared secret. Production token issuance
    /// belongs to the identity provider; this exists for tests and local
    /// development tooling.
    pub fn issue_token(
        &self,
        user_id: &str,
        name: Option<String>,
        roles: Vec<String>,
    ) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            name,
            roles,
            iat: now.timestamp(),
            exp: (now + chrono::Duration::seconds(self.config.token_lifetime.as_secs() as i64))
                .timestamp(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|_| AuthError::InternalError("Failed to sign token".to_string()))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    ExpiredToken,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Internal auth error: {0}")]
    InternalError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message) = match &self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                "Authentication is required".to_string(),
            ),
            Self::InvalidToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_INVALID_TOKEN",
                "The provided token is invalid".to_string(),
            ),
            Self::ExpiredToken => (
                StatusCode::UNAUTHORIZED,
                "AUTH_EXPIRED_TOKEN",
                "The provided token has expired".to_string(),
            ),
            Self::InsufficientPermissions => (
                StatusCode::FORBIDDEN,
                "AUTH_FORBIDDEN",
                "Insufficient permissions for this operation".to_string(),
            ),
            Self::InternalError(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

fn extract_auth_from_headers(
    headers: &axum::http::HeaderMap,
    auth_service: &AuthService,
) -> Result<AuthUser, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or(AuthError::MissingAuth)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .map(str::trim)
        .ok_or(AuthError::MissingAuth)?;

    let claims = auth_service.validate_token(token)?;

    Ok(AuthUser {
        user_id: claims.sub,
        name: claims.name,
        roles: claims.roles,
        token_id: claims.jti,
    })
}

/// Validates the bearer token and stores the authenticated user in the
/// request extensions for downstream extractors.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication service not available",
            )
                .into_response();
        }
    };

    match extract_auth_from_headers(request.headers(), &auth_service) {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Role middleware to check if the authenticated user has the required role
pub async fn role_middleware(
    State(required_role): State<String>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = match request.extensions().get::<AuthUser>() {
        Some(user) => user.clone(),
        None => return Err(AuthError::MissingAuth),
    };

    // Admins pass every role gate
    if user.is_admin() || user.has_role(&required_role) {
        return Ok(next.run(request).await);
    }

    Err(AuthError::InsufficientPermissions)
}

#[async_trait]
impl<S> axum::extract::FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_role(self, role: &str) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_role(self, role: &str) -> Self {
        self.layer(axum::middleware::from_fn_with_state(
            role.to_string(),
            role_middleware,
        ))
        .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_service() -> AuthService {
        AuthService::new(AuthConfig::new(
            "an_unusually_long_testing_jwt_secret_value_with_plenty_of_entropy_0192837465"
                .to_string(),
            Duration::from_secs(3600),
        ))
    }

    #[test]
    fn issued_tokens_validate() {
        let service = test_service();
        let token = service
            .issue_token("user-1", Some("Alice".into()), vec!["admin".into()])
            .unwrap();

        let claims = service.validate_token(&token).unwrap();
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.name.as_deref(), Some("Alice"));
        assert_eq!(claims.roles, vec!["admin".to_string()]);
    }

    #[test]
    fn tampered_tokens_are_rejected() {
        let service = test_service();
        let token = service.issue_token("user-1", None, vec![]).unwrap();

        let mut tampered = token.clone();
        tampered.push('x');
        assert!(matches!(
            service.validate_token(&tampered),
            Err(AuthError::InvalidToken)
        ));
    }

    #[test]
    fn tokens_signed_with_other_secret_are_rejected() {
        let service = test_service();
        let other = AuthService::new(AuthConfig::new(
            "another_completely_different_secret_that_is_also_long_enough_9384756102".to_string(),
            Duration::from_secs(3600),
        ));
        let token = other.issue_token("user-1", None, vec![]).unwrap();

        assert!(service.validate_token(&token).is_err());
    }

    #[test]
    fn role_checks() {
        let user = AuthUser {
            user_id: "u".into(),
            name: None,
            roles: vec!["inventory".into()],
            token_id: "t".into(),
        };
        assert!(user.has_role("inventory"));
        assert!(!user.has_role("admin"));
        assert!(!user.is_admin());
    }
}
