use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use std::sync::Arc;
use tracing::info;

use crate::accounts::serializer::{self, UserOut, UserPayload};
use crate::api::server::AppState;
use crate::db::{models::User, repo};
use crate::error::{ApiError, ApiResult};

async fn find_user(state: &AppState, id: i64) -> ApiResult<User> {
    repo::get_user(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No user with id {id}")))
}

fn read_payload(payload: Result<Json<UserPayload>, JsonRejection>) -> ApiResult<UserPayload> {
    payload
        .map(|Json(payload)| payload)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

pub async fn list_users(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<UserOut>>> {
    let users = repo::list_users(&state.db).await?;
    Ok(Json(users.iter().map(UserOut::from).collect()))
}

pub async fn create_user(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<UserOut>)> {
    let payload = read_payload(payload)?;
    let user = serializer::create_user(&state.db, &state.hasher, payload).await?;
    Ok((StatusCode::CREATED, Json(UserOut::from(&user))))
}

pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<UserOut>> {
    let user = find_user(&state, id).await?;
    Ok(Json(UserOut::from(&user)))
}

pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    payload: Result<Json<UserPayload>, JsonRejection>,
) -> ApiResult<Json<UserOut>> {
    let payload = read_payload(payload)?;
    let user = find_user(&state, id).await?;
    let user = serializer::update_user(&state.db, &state.hasher, user, payload).await?;
    Ok(Json(UserOut::from(&user)))
}

pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    if !repo::delete_user(&state.db, id).await? {
        return Err(ApiError::NotFound(format!("No user with id {id}")));
    }
    info!(user_id = id, "user deleted");
    Ok(StatusCode::NO_CONTENT)
}
