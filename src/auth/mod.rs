/*!
 * # Authentication and Authorization Module
 *
 * Stateless HS256 bearer tokens plus role checks for the two account roles:
 *
 * - `admin` may manage the catalog and record inbound stock
 * - `karyawan` (regular employee) may read and record outbound stock
 *
 * `auth_middleware` turns a valid `Authorization: Bearer` header into a [`Principal`]
 * stored in the request extensions; handlers take it as an extractor.
 */

pub mod password;

use async_trait::async_trait;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::entities::user::Role;
use crate::errors::ServiceError;

/// Claim structure for JWT tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // Subject (user ID)
    pub role: String, // admin | karyawan
    pub jti: String,  // JWT ID (unique identifier for this token)
    pub iat: i64,     // Issued at time
    pub exp: i64,     // Expiration time
    pub iss: String,  // Issuer
    pub aud: String,  // Audience
}

/// Authenticated caller: who is making the request and with which role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Principal {
    pub user_id: i32,
    pub role: Role,
}

impl Principal {
    pub fn new(user_id: i32, role: Role) -> Self {
        Self { user_id, role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    fn from_claims(claims: &Claims) -> Result<Self, AuthError> {
        let user_id = claims.sub.parse::<i32>().map_err(|_| AuthError::InvalidToken)?;
        let role = claims.role.parse::<Role>().map_err(|_| AuthError::InvalidToken)?;
        Ok(Self { user_id, role })
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub jwt_issuer: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_audience: String,
        jwt_issuer: String,
        access_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_audience,
            jwt_issuer,
            access_token_expiration,
        }
    }
}

impl From<&AppConfig> for AuthConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.jwt_secret.clone(),
            cfg.auth_audience.clone(),
            cfg.auth_issuer.clone(),
            Duration::from_secs(cfg.jwt_expiration),
        )
    }
}

/// Freshly issued access token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedToken {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

/// Issues and validates access tokens. The signing key never leaves this struct.
#[derive(Clone)]
pub struct AuthService {
    config: AuthConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("issuer", &self.config.jwt_issuer)
            .field("audience", &self.config.jwt_audience)
            .finish_non_exhaustive()
    }
}

impl AuthService {
    pub fn new(config: AuthConfig) -> Self {
        let encoding_key = EncodingKey::from_secret(config.jwt_secret.as_bytes());
        let decoding_key = DecodingKey::from_secret(config.jwt_secret.as_bytes());
        Self {
            config,
            encoding_key,
            decoding_key,
        }
    }

    /// Generate a JWT token for a user
    pub fn issue_token(&self, user_id: i32, role: Role) -> Result<IssuedToken, AuthError> {
        let now = Utc::now();
        let ttl = ChronoDuration::from_std(self.config.access_token_expiration)
            .map_err(|_| AuthError::TokenCreation("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user_id.to_string(),
            role: role.as_str().to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        let access_token = self.encode_claims(&claims)?;
        debug!(user_id, role = %role, jti = %claims.jti, "issued access token");

        Ok(IssuedToken {
            access_token,
            token_type: "Bearer".to_string(),
            expires_in: self.config.access_token_expiration.as_secs() as i64,
        })
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String, AuthError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding_key)
            .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[self.config.jwt_issuer.as_str()]);
        validation.set_audience(&[self.config.jwt_audience.as_str()]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken,
            })
    }

    /// Validates `token` and returns the caller it identifies.
    pub fn authenticate(&self, token: &str) -> Result<Principal, AuthError> {
        let claims = self.validate_token(token)?;
        Principal::from_claims(&claims)
    }
}

/// Authentication error types
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No authentication token provided")]
    MissingToken,

    #[error("Invalid authentication token")]
    InvalidToken,

    #[error("Token has expired")]
    TokenExpired,

    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Insufficient permissions")]
    InsufficientPermissions,

    #[error("Token creation failed: {0}")]
    TokenCreation(String),

    #[error("Authentication service not available")]
    ServiceUnavailable,
}

impl From<AuthError> for ServiceError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingToken
            | AuthError::InvalidToken
            | AuthError::TokenExpired
            | AuthError::InvalidCredentials => ServiceError::Unauthorized(err.to_string()),
            AuthError::InsufficientPermissions => ServiceError::Forbidden(err.to_string()),
            AuthError::TokenCreation(msg) => ServiceError::JwtError(msg),
            AuthError::ServiceUnavailable => ServiceError::InternalError(err.to_string()),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        ServiceError::from(self).into_response()
    }
}

/// Pulls the token out of `Authorization: Bearer <token>`.
fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidToken)?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .ok_or(AuthError::InvalidToken)?;

    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(token)
}

/// Authentication middleware that extracts and validates bearer tokens
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => return AuthError::ServiceUnavailable.into_response(),
    };

    let principal = match bearer_token(request.headers()).and_then(|t| auth_service.authenticate(t))
    {
        Ok(principal) => principal,
        Err(e) => {
            warn!(error = %e, path = %request.uri().path(), "rejected unauthenticated request");
            return e.into_response();
        }
    };

    request.extensions_mut().insert(principal);
    next.run(request).await
}

/// Role middleware to check if a user has the required role
pub async fn role_middleware(
    State(required_role): State<Role>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let principal = request
        .extensions()
        .get::<Principal>()
        .copied()
        .ok_or(AuthError::MissingToken)?;

    if principal.role != required_role {
        warn!(
            user_id = principal.user_id,
            role = %principal.role,
            required = %required_role,
            "role check failed"
        );
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .copied()
            .ok_or_else(|| AuthError::MissingToken.into())
    }
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_role(self, role: Role) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_role(self, role: Role) -> Self {
        self.layer(axum::middleware::from_fn_with_state(role, role_middleware))
            .with_auth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use axum::{
        body::Body,
        http::{Request as HttpRequest, StatusCode},
        routing::get,
        Extension, Router,
    };
    use tower::ServiceExt;

    const SECRET: &str = "unit-test-secret-abcdefghijklmnopqrstuvwxyz";

    fn service() -> AuthService {
        AuthService::new(AuthConfig::new(
            SECRET.to_string(),
            "bengkel-inventory-api".to_string(),
            "bengkel-inventory".to_string(),
            Duration::from_secs(3600),
        ))
    }

    #[test]
    fn issued_token_round_trips_to_principal() {
        let auth = service();
        let token = auth.issue_token(42, Role::Karyawan).unwrap();
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.expires_in, 3600);

        let principal = auth.authenticate(&token.access_token).unwrap();
        assert_eq!(principal, Principal::new(42, Role::Karyawan));
        assert!(!principal.is_admin());
    }

    #[test]
    fn expired_token_is_rejected() {
        let auth = service();
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "1".into(),
            role: "admin".into(),
            jti: "x".into(),
            iat: now - 7200,
            exp: now - 3600,
            iss: "bengkel-inventory".into(),
            aud: "bengkel-inventory-api".into(),
        };
        let token = auth.encode_claims(&claims).unwrap();
        assert_matches!(auth.validate_token(&token), Err(AuthError::TokenExpired));
    }

    #[test]
    fn foreign_signature_and_audience_are_rejected() {
        let auth = service();
        let other = AuthService::new(AuthConfig::new(
            "another-secret-0123456789-abcdefghijklmnop".into(),
            "bengkel-inventory-api".into(),
            "bengkel-inventory".into(),
            Duration::from_secs(3600),
        ));
        let token = other.issue_token(1, Role::Admin).unwrap();
        assert_matches!(auth.validate_token(&token.access_token), Err(AuthError::InvalidToken));

        let wrong_aud = AuthService::new(AuthConfig::new(
            SECRET.into(),
            "someone-else".into(),
            "bengkel-inventory".into(),
            Duration::from_secs(3600),
        ));
        let token = wrong_aud.issue_token(1, Role::Admin).unwrap();
        assert_matches!(auth.validate_token(&token.access_token), Err(AuthError::InvalidToken));
    }

    #[test]
    fn unknown_role_claim_is_invalid() {
        let auth = service();
        let now = Utc::now().timestamp();
        let token = auth
            .encode_claims(&Claims {
                sub: "1".into(),
                role: "owner".into(),
                jti: "x".into(),
                iat: now,
                exp: now + 60,
                iss: "bengkel-inventory".into(),
                aud: "bengkel-inventory-api".into(),
            })
            .unwrap();
        assert_matches!(auth.authenticate(&token), Err(AuthError::InvalidToken));
    }

    async fn whoami(principal: Principal) -> String {
        format!("{}:{}", principal.user_id, principal.role)
    }

    fn app(auth: Arc<AuthService>) -> Router {
        let user_routes = Router::new().route("/me", get(whoami)).with_auth();
        let admin_routes = Router::new()
            .route("/admin", get(whoami))
            .with_role(Role::Admin);
        user_routes.merge(admin_routes).layer(Extension(auth))
    }

    async fn call(app: Router, path: &str, token: Option<&str>) -> StatusCode {
        let mut builder = HttpRequest::builder().uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        app.oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    #[tokio::test]
    async fn middleware_enforces_authentication_and_role() {
        let auth = Arc::new(service());
        let karyawan = auth.issue_token(2, Role::Karyawan).unwrap().access_token;
        let admin = auth.issue_token(1, Role::Admin).unwrap().access_token;

        assert_eq!(call(app(auth.clone()), "/me", None).await, StatusCode::UNAUTHORIZED);
        assert_eq!(
            call(app(auth.clone()), "/me", Some("garbage")).await,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(call(app(auth.clone()), "/me", Some(&karyawan)).await, StatusCode::OK);
        assert_eq!(
            call(app(auth.clone()), "/admin", Some(&karyawan)).await,
            StatusCode::FORBIDDEN
        );
        assert_eq!(call(app(auth.clone()), "/admin", Some(&admin)).await, StatusCode::OK);
        assert_eq!(call(app(auth), "/admin", None).await, StatusCode::UNAUTHORIZED);
    }
}
