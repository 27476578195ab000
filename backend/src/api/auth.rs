//! Caller context from bearer tokens
//!
//! Tokens are HS256 JWTs carrying the user id in `sub` and the caller's role
//! names in `roles`. A missing, malformed or expired token yields an
//! anonymous [`RequestContext`]; the read API never rejects a request here.

use std::convert::Infallible;

use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, request::Parts};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::app::AppState;
use crate::query::RequestContext;

#[derive(Debug, Serialize, Deserialize)]
pub struct AccessTokenClaims {
    pub sub: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: i64,
}

/// Extract bearer token from Authorization header
fn extract_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Verify a token and turn its claims into a caller context
pub fn verify_token(token: &str, secret: &str) -> Result<RequestContext, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    validation.validate_aud = false;

    let data = decode::<AccessTokenClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;

    match data.claims.sub.parse::<i64>() {
        Ok(user_id) => Ok(RequestContext::new(user_id, data.claims.roles)),
        Err(_) => {
            tracing::debug!(sub = %data.claims.sub, "token subject is not a user id");
            Ok(RequestContext::anonymous())
        }
    }
}

/// Sign a token for `user_id`, valid for `ttl_secs`
pub fn issue_token(
    user_id: i64,
    roles: &[&str],
    secret: &str,
    ttl_secs: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = AccessTokenClaims {
        sub: user_id.to_string(),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        exp: chrono::Utc::now().timestamp() + ttl_secs,
    };
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

impl FromRequestParts<AppState> for RequestContext {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let (Some(token), Some(secret)) = (
            extract_token(&parts.headers),
            state.config.jwt_secret.as_deref(),
        ) else {
            return Ok(RequestContext::anonymous());
        };

        match verify_token(token, secret) {
            Ok(ctx) => Ok(ctx),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring invalid bearer token");
                Ok(RequestContext::anonymous())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_token_round_trip() {
        let token = issue_token(3, &["student"], SECRET, 60).unwrap();
        let ctx = verify_token(&token, SECRET).unwrap();
        assert_eq!(ctx.user_id, Some(3));
        assert!(ctx.has_only_role("student"));
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let token = issue_token(3, &["student"], SECRET, 60).unwrap();
        assert!(verify_token(&token, "other").is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let token = issue_token(3, &["student"], SECRET, -3600).unwrap();
        assert!(verify_token(&token, SECRET).is_err());
    }

    #[test]
    fn test_extract_token() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc"));
        assert_eq!(extract_token(&headers), Some("abc"));
    }
}
