use axum::{extract::FromRequestParts, http::request::Parts};

use crate::error::AppError;

/// Header carrying the host identity set by the upstream identity service.
pub const OWNER_ID_HEADER: &str = "x-owner-id";
/// Header carrying the player identity set by the upstream identity service.
pub const PLAYER_ID_HEADER: &str = "x-player-id";

/// Authenticated host identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OwnerId(pub i64);

/// Authenticated player identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerId(pub i64);

impl<S: Send + Sync> FromRequestParts<S> for OwnerId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_header(parts, OWNER_ID_HEADER).map(OwnerId)
    }
}

impl<S: Send + Sync> FromRequestParts<S> for PlayerId {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        identity_header(parts, PLAYER_ID_HEADER).map(PlayerId)
    }
}

fn identity_header(parts: &Parts, name: &str) -> Result<i64, AppError> {
    let raw = parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized(format!("missing identity header `{name}`")))?;

    raw.trim()
        .parse()
        .map_err(|_| AppError::Unauthorized(format!("identity header `{name}` is not an integer")))
}

#[cfg(test)]
mod tests {
    use axum::http::Request;

    use super::*;

    fn parts(header: Option<(&str, &str)>) -> Parts {
        let mut builder = Request::builder().uri("/");
        if let Some((name, value)) = header {
            builder = builder.header(name, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[tokio::test]
    async fn parses_integer_identities() {
        let mut parts = parts(Some((OWNER_ID_HEADER, " 42 ")));
        let owner = OwnerId::from_request_parts(&mut parts, &()).await.unwrap();
        assert_eq!(owner, OwnerId(42));
    }

    #[tokio::test]
    async fn rejects_missing_or_malformed_identities() {
        let mut missing = parts(None);
        let err = PlayerId::from_request_parts(&mut missing, &()).await.unwrap_err();
        assert_eq!(err.code(), "unauthorized");

        let mut malformed = parts(Some((PLAYER_ID_HEADER, "alice")));
        let err = PlayerId::from_request_parts(&mut malformed, &()).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }
}
