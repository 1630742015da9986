use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::HeaderName;
use uuid::Uuid;

use crate::http::AppError;
use crate::AppState;

/// Caller identity. Sessions are terminated upstream; the gateway forwards the
/// authenticated user id in `x-user-id`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
}

pub const USER_ID_HEADER: HeaderName = HeaderName::from_static("x-user-id");

#[axum::async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::unauthorized("missing x-user-id header"))?;

        let user_id = Uuid::parse_str(value.trim())
            .map_err(|_| AppError::unauthorized("invalid x-user-id header"))?;

        Ok(AuthUser { user_id })
    }
}
