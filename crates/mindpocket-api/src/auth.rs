//! Bearer token authentication.
//!
//! Tokens are never stored in clear text: the repository is keyed by the
//! SHA-256 hex digest of the token.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::ApiError;
use crate::AppState;

/// Lowercase hex SHA-256 of a bearer token.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Id of the user who owns the request's bearer token.
#[derive(Debug, Clone)]
pub struct AuthUser(pub String);

fn bearer_token(parts: &Parts) -> Option<&str> {
    let value = parts.headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let unauthorized = || ApiError::Unauthorized("Unauthorized".to_string());

        let token = bearer_token(parts).ok_or_else(unauthorized)?;
        match state.tokens.resolve_user(&hash_token(token)).await? {
            Some(user_id) => Ok(AuthUser(user_id)),
            None => {
                debug!(subsystem = "api", component = "auth", "Unknown bearer token");
                Err(unauthorized())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(header: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_hash_token() {
        assert_eq!(
            hash_token("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_bearer_token_parsing() {
        assert_eq!(bearer_token(&parts(Some("Bearer tok"))), Some("tok"));
        assert_eq!(bearer_token(&parts(Some("bearer  tok "))), Some("tok"));
        assert_eq!(bearer_token(&parts(Some("Basic tok"))), None);
        assert_eq!(bearer_token(&parts(Some("Bearer "))), None);
        assert_eq!(bearer_token(&parts(None)), None);
    }
}
