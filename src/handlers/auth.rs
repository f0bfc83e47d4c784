use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::errors::AppError;
use crate::models::{Actor, Role};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// The caller identity is asserted by the gateway in front of this service.
#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Actor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| {
            parts
                .headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        };

        let user_id = header(USER_ID_HEADER).ok_or(AppError::Unauthorized)?;
        let role = header(USER_ROLE_HEADER)
            .and_then(Role::parse)
            .ok_or(AppError::Unauthorized)?;

        Ok(Actor::new(user_id, role))
    }
}

pub fn check_admin(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_admin_token_must_match() {
        let mut headers = HeaderMap::new();
        assert!(check_admin(&headers, "secret").is_err());

        headers.insert("authorization", HeaderValue::from_static("Bearer wrong"));
        assert!(check_admin(&headers, "secret").is_err());

        headers.insert("authorization", HeaderValue::from_static("Bearer secret"));
        assert!(check_admin(&headers, "secret").is_ok());
    }
}
