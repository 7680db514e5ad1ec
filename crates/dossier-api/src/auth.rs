//! # Authentication Middleware
//!
//! Bearer tokens carry the caller's role and actor id:
//!
//! ```text
//! Bearer {role}:{actor_uuid}:{secret}
//! Bearer {role}:{actor_uuid}:{expires_unix}:{secret}
//! ```
//!
//! `role` is `exporter`, `validator` or `admin`. The secret is compared in
//! constant time against `AUTH_TOKEN` and may not contain `:`. Every failure
//! here is a 401 (`Unauthorized`, or `SessionExpired` past the expiry);
//! ownership and role checks happen in the engine and surface as 403.
//!
//! When no secret is configured the token is still parsed for role and
//! actor, but the secret segment is not verified (local development).

use axum::extract::Request;
use axum::http::header;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, Utc};
use dossier_core::{Actor, ActorId, Role};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::error::AppError;

/// Identity of the authenticated caller, injected by [`auth_middleware`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallerIdentity {
    pub actor: Actor,
    /// Token expiry, when the token carries one.
    pub expires_at: Option<DateTime<Utc>>,
}

impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .copied()
            .ok_or_else(|| AppError::Unauthorized("no caller identity in request context".into()))
    }
}

/// Auth configuration injected into request extensions.
///
/// Custom `Debug` redacts the token value.
#[derive(Clone)]
pub struct AuthConfig {
    pub token: Option<String>,
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Constant-time comparison of bearer secrets.
fn constant_time_token_eq(provided: &str, expected: &str) -> bool {
    let provided = provided.as_bytes();
    let expected = expected.as_bytes();
    if provided.len() != expected.len() {
        // Keep timing independent of the length match.
        let _ = expected.ct_eq(expected);
        return false;
    }
    provided.ct_eq(expected).into()
}

/// Parse and verify a bearer token.
///
/// `expected_secret` of `None` skips secret verification.
pub fn parse_bearer_token(
    provided: &str,
    expected_secret: Option<&str>,
    now: DateTime<Utc>,
) -> Result<CallerIdentity, AppError> {
    let parts: Vec<&str> = provided.split(':').collect();
    let (role_str, actor_str, expires_str, secret) = match parts.as_slice() {
        [role, actor, secret] => (*role, *actor, None, *secret),
        [role, actor, expires, secret] => (*role, *actor, Some(*expires), *secret),
        _ => {
            return Err(AppError::Unauthorized(
                "invalid token format, expected {role}:{actor_id}[:{expires}]:{secret}".into(),
            ))
        }
    };

    if let Some(expected) = expected_secret {
        if !constant_time_token_eq(secret, expected) {
            return Err(AppError::Unauthorized("invalid bearer token".into()));
        }
    }

    let role = Role::from_str_loose(role_str)
        .ok_or_else(|| AppError::Unauthorized(format!("unknown role: {role_str}")))?;
    let actor_id = actor_str
        .parse::<Uuid>()
        .map(ActorId::from_uuid)
        .map_err(|e| AppError::Unauthorized(format!("invalid actor id: {e}")))?;

    let expires_at = match expires_str {
        None => None,
        Some(raw) => {
            let secs: i64 = raw
                .parse()
                .map_err(|_| AppError::Unauthorized(format!("invalid token expiry: {raw}")))?;
            let at = DateTime::<Utc>::from_timestamp(secs, 0)
                .ok_or_else(|| AppError::Unauthorized(format!("invalid token expiry: {raw}")))?;
            if at <= now {
                return Err(AppError::SessionExpired(format!("token expired at {at}")));
            }
            Some(at)
        }
    };

    Ok(CallerIdentity {
        actor: Actor { id: actor_id, role },
        expires_at,
    })
}

/// Validate the Bearer token and inject the [`CallerIdentity`].
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let expected = request
        .extensions()
        .get::<AuthConfig>()
        .and_then(|c| c.token.clone());

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    let provided = match auth_header {
        Some(value) => match value.strip_prefix("Bearer ") {
            Some(token) => token.trim(),
            None => {
                tracing::warn!("authentication failed: non-Bearer authorization scheme");
                return AppError::Unauthorized("authorization header must use Bearer scheme".into())
                    .into_response();
            }
        },
        None => {
            tracing::warn!("authentication failed: missing authorization header");
            return AppError::Unauthorized("missing authorization header".into()).into_response();
        }
    };

    match parse_bearer_token(provided, expected.as_deref(), Utc::now()) {
        Ok(identity) => {
            request.extensions_mut().insert(identity);
            next.run(request).await
        }
        Err(err) => {
            tracing::warn!(reason = %err, "authentication failed");
            err.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::middleware::from_fn;
    use axum::routing::get;
    use axum::Router;
    use chrono::Duration;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    const ACTOR: &str = "6f1c2a8e-3b7d-4c55-9a0e-2d4b8f7e1a90";

    fn test_app(token: Option<&str>) -> Router {
        let auth_config = AuthConfig {
            token: token.map(str::to_string),
        };
        Router::new()
            .route(
                "/whoami",
                get(|caller: CallerIdentity| async move { caller.actor.role.as_str() }),
            )
            .layer(from_fn(auth_middleware))
            .layer(axum::Extension(auth_config))
    }

    async fn call(app: Router, authorization: Option<&str>) -> (StatusCode, Vec<u8>) {
        let mut builder = Request::builder().uri("/whoami");
        if let Some(value) = authorization {
            builder = builder.header("Authorization", value);
        }
        let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    fn error_code(body: &[u8]) -> String {
        let value: serde_json::Value = serde_json::from_slice(body).unwrap();
        value["error"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn valid_token_injects_identity() {
        let header = format!("Bearer validator:{ACTOR}:s3cret");
        let (status, body) = call(test_app(Some("s3cret")), Some(&header)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"validator");
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let (status, body) = call(test_app(Some("s3cret")), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(&body), "Unauthorized");
    }

    #[tokio::test]
    async fn wrong_secret_is_unauthorized() {
        let header = format!("Bearer exporter:{ACTOR}:guess");
        let (status, body) = call(test_app(Some("s3cret")), Some(&header)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(&body), "Unauthorized");
    }

    #[tokio::test]
    async fn non_bearer_scheme_is_unauthorized() {
        let (status, _) = call(test_app(Some("s3cret")), Some("Basic dXNlcjpwYXNz")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn expired_token_is_session_expired() {
        let past = (Utc::now() - Duration::minutes(5)).timestamp();
        let header = format!("Bearer exporter:{ACTOR}:{past}:s3cret");
        let (status, body) = call(test_app(Some("s3cret")), Some(&header)).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(error_code(&body), "SessionExpired");
    }

    #[tokio::test]
    async fn disabled_auth_still_requires_an_identity() {
        let header = format!("Bearer admin:{ACTOR}:anything");
        let (status, body) = call(test_app(None), Some(&header)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"admin");

        let (status, _) = call(test_app(None), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn parses_token_with_future_expiry() {
        let now = Utc::now();
        let future = (now + Duration::hours(1)).timestamp();
        let token = format!("exporter:{ACTOR}:{future}:s3cret");
        let identity = parse_bearer_token(&token, Some("s3cret"), now).unwrap();
        assert_eq!(identity.actor.role, Role::Exporter);
        assert_eq!(identity.actor.id.to_string(), ACTOR);
        assert_eq!(identity.expires_at.map(|t| t.timestamp()), Some(future));
    }

    #[test]
    fn rejects_malformed_tokens() {
        let now = Utc::now();
        for token in [
            "s3cret",
            "exporter:s3cret",
            "superuser:6f1c2a8e-3b7d-4c55-9a0e-2d4b8f7e1a90:s3cret",
            "exporter:not-a-uuid:s3cret",
            "exporter:6f1c2a8e-3b7d-4c55-9a0e-2d4b8f7e1a90:tomorrow:s3cret",
            "a:b:c:d:e",
        ] {
            let err = parse_bearer_token(token, Some("s3cret"), now).unwrap_err();
            assert!(matches!(err, AppError::Unauthorized(_)), "{token}: {err:?}");
        }
    }

    #[test]
    fn constant_time_eq_works() {
        assert!(constant_time_token_eq("abc", "abc"));
        assert!(!constant_time_token_eq("abc", "abd"));
        assert!(!constant_time_token_eq("abc", "abcd"));
        assert!(!constant_time_token_eq("", "x"));
    }

    #[test]
    fn auth_config_debug_redacts_token() {
        let config = AuthConfig {
            token: Some("s3cret".into()),
        };
        assert!(!format!("{config:?}").contains("s3cret"));
    }
}
