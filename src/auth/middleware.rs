//! Bearer token extraction and verification

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use axum_extra::TypedHeader;
use axum_extra::headers::{Authorization, authorization::Bearer};

use crate::AppState;
use crate::backend::AuthUser;
use crate::error::AppError;

/// Bearer token of the request, if any
///
/// Never rejects, so handlers can validate the body before deciding
/// whether the caller is authenticated.
#[derive(Debug, Clone)]
pub struct BearerToken(pub Option<String>);

#[async_trait]
impl<S> FromRequestParts<S> for BearerToken
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let token = TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .ok()
            .map(|TypedHeader(Authorization(bearer))| bearer.token().to_owned());

        Ok(BearerToken(token))
    }
}

/// Caller verified by the auth API
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: AuthUser,
    /// Forwarded to the data API so row-level policies see the caller
    pub access_token: String,
}

/// Verify a bearer token with the auth API
///
/// # Errors
/// `AppError::Unauthorized` when the token is missing or rejected
pub async fn authenticate(state: &AppState, token: BearerToken) -> Result<CurrentUser, AppError> {
    let access_token = token.0.ok_or(AppError::Unauthorized)?;

    match state.backend.get_user_for_token(&access_token).await {
        Ok(user) => Ok(CurrentUser { user, access_token }),
        Err(error) => {
            tracing::debug!(%error, "Rejected bearer token");
            Err(AppError::Unauthorized)
        }
    }
}
