use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::{error, warn};

use crate::{auth::jwt::JwtKeys, error::ApiError, store::{User, UserStore}};

/// Requires a valid bearer token and loads the referenced user; 401 otherwise.
pub struct AuthUser(pub User);

/// Like [`AuthUser`] but never rejects: any failure yields `None`.
pub struct MaybeAuthUser(pub Option<User>);

/// Returns the token from `Authorization: Bearer <token>`; scheme is case-insensitive.
pub fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".into()))?;

    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| ApiError::Unauthorized("Invalid Authorization header".into()))?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(ApiError::Unauthorized("Invalid Authorization header".into()));
    }
    Ok(token.trim())
}

async fn authenticate(
    parts: &Parts,
    keys: &JwtKeys,
    store: &dyn UserStore,
) -> Result<User, ApiError> {
    let token = bearer_token(parts)?;

    let claims = keys.verify(token).map_err(|e| {
        warn!(error = %e, "invalid or expired token");
        ApiError::Unauthorized("Invalid or expired token".into())
    })?;

    match store.find_by_id(claims.sub).await? {
        Some(user) => Ok(user),
        None => {
            warn!(user_id = %claims.sub, "token for unknown user");
            Err(ApiError::Unauthorized("User not found".into()))
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
    Arc<dyn UserStore>: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let store = <Arc<dyn UserStore> as FromRef<S>>::from_ref(state);
        authenticate(parts, &keys, store.as_ref()).await.map(AuthUser)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for MaybeAuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
    Arc<dyn UserStore>: FromRef<S>,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let store = <Arc<dyn UserStore> as FromRef<S>>::from_ref(state);
        match authenticate(parts, &keys, store.as_ref()).await {
            Ok(user) => Ok(MaybeAuthUser(Some(user))),
            Err(ApiError::Internal(detail)) => {
                error!(error = %detail, "session lookup failed; treating as anonymous");
                Ok(MaybeAuthUser(None))
            }
            Err(_) => Ok(MaybeAuthUser(None)),
        }
    }
}
