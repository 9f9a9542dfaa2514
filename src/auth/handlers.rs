use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{debug, instrument};

use crate::{
    auth::{
        dto::{AuthResponse, CurrentUserResponse, LoginRequest, ProtectedResponse, RegisterRequest},
        extractors::{AuthUser, MaybeAuthUser},
        services,
    },
    error::ApiError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/me", get(current_user))
        .route("/protected", get(protected))
}

#[instrument(skip(state, payload))]
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let Json(payload) = payload?;
    let res = services::register(state.store.as_ref(), &state.jwt, payload).await?;
    Ok((StatusCode::CREATED, Json(res)))
}

#[instrument(skip(state, payload))]
pub async fn login(
    State(state): State<AppState>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, ApiError> {
    let Json(payload) = payload?;
    let res = services::login(state.store.as_ref(), &state.jwt, payload).await?;
    Ok(Json(res))
}

/// Never fails on authentication; answers `{"user": null}` instead.
#[instrument(skip_all)]
pub async fn current_user(MaybeAuthUser(user): MaybeAuthUser) -> Json<CurrentUserResponse> {
    debug!(authenticated = user.is_some(), "current user");
    Json(CurrentUserResponse {
        user: user.map(Into::into),
    })
}

#[instrument(skip_all)]
pub async fn protected(AuthUser(user): AuthUser) -> Json<ProtectedResponse> {
    debug!(user_id = %user.id, "protected resource");
    Json(ProtectedResponse {
        message: format!("Welcome, {}", user.name),
        user: user.into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::dto::PublicUser;

    #[test]
    fn current_user_response_serializes_null() {
        let json = serde_json::to_value(CurrentUserResponse { user: None }).unwrap();
        assert_eq!(json, serde_json::json!({ "user": null }));
    }

    #[test]
    fn public_user_has_no_password_hash() {
        let user = PublicUser {
            id: uuid::Uuid::new_v4(),
            name: "Ada".into(),
            email: "test@example.com".into(),
            created_at: time::OffsetDateTime::now_utc(),
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(json.contains("test@example.com"));
        assert!(!json.contains("password"));
    }
}
