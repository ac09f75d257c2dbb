//! Bearer token authentication

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use chat_common::{AppError, JwtService};
use chat_core::UserId;

use super::{GatewayError, GatewayState};

/// Verify an access token and return the user it was issued to
pub fn authenticate(jwt: &JwtService, token: &str) -> Result<UserId, AppError> {
    let claims = jwt.validate_access_token(token).map_err(|e| {
        tracing::warn!(error = %e, "Invalid access token");
        e
    })?;
    claims.user_id()
}

/// Authenticated user extracted from the `Authorization` header
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: UserId,
}

#[async_trait]
impl FromRequestParts<GatewayState> for AuthUser {
    type Rejection = GatewayError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &GatewayState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::MissingAuth)?;

        let user_id = authenticate(state.jwt_service(), bearer.token())?;
        Ok(Self { user_id })
    }
}
