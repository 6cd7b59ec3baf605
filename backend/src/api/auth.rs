use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::accounts::password::authenticate;
use crate::accounts::token::TokenPair;
use crate::api::server::AppState;
use crate::error::{ApiError, ApiResult};

#[derive(Deserialize)]
pub struct LoginPayload {
    pub username: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct RefreshPayload {
    pub refresh: String,
}

#[derive(Serialize)]
pub struct AccessResponse {
    pub access: String,
}

/// Issues a token pair. `last_login` is left untouched.
pub async fn obtain_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginPayload>, JsonRejection>,
) -> ApiResult<Json<TokenPair>> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let user = authenticate(&state.db, &state.hasher, &payload.username, &payload.password).await?;
    let pair = state.tokens.obtain_pair(&user)?;

    info!(user_id = user.id, "token pair issued");
    Ok(Json(pair))
}

pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RefreshPayload>, JsonRejection>,
) -> ApiResult<Json<AccessResponse>> {
    let Json(payload) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let access = state.tokens.refresh(&payload.refresh)?;
    Ok(Json(AccessResponse { access }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::fixtures::create_jdoe;
    use crate::config::Config;
    use crate::db::{repo, test_pool};

    #[tokio::test]
    async fn test_obtain_token_leaves_last_login_unset() {
        let state = Arc::new(AppState::new(test_pool().await, &Config::for_tests()));
        let user = create_jdoe(&state.db, &state.hasher).await;

        let login = LoginPayload {
            username: "jdoe".into(),
            password: "secret".into(),
        };
        let Json(pair) = obtain_token(State(state.clone()), Ok(Json(login))).await.unwrap();
        assert!(!pair.access.is_empty());

        let stored = repo::get_user(&state.db, user.id).await.unwrap().unwrap();
        assert_eq!(stored.last_login, None);
    }
}
