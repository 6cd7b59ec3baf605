use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::accounts::password::PasswordError;
use crate::accounts::token::TokenError;
use crate::accounts::validators::{FieldError, ValidationErrors};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),
    #[error("malformed request: {0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error("database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for ApiError {
    /// Unique-constraint races that slipped past the pre-write checks come
    /// back as the same field errors the checks would have produced.
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err
            && db.is_unique_violation()
        {
            let mut errors = ValidationErrors::default();
            if db.message().contains("users.dni") {
                errors.add("dni", FieldError::invalid_document_number());
            } else if db.message().contains("users.username") {
                errors.add("username", FieldError::username_taken());
            }
            if !errors.is_empty() {
                return Self::Validation(errors);
            }
        }
        Self::Database(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "non_field_errors": [{ "code": "parse_error", "message": message }]
                })),
            )
                .into_response(),
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(json!({ "detail": message }))).into_response()
            }
            ApiError::Unauthorized(message) => {
                (StatusCode::UNAUTHORIZED, Json(json!({ "detail": message }))).into_response()
            }
            ApiError::Token(err) => {
                tracing::debug!(error = %err, "token rejected");
                (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({
                        "detail": "Token is invalid or expired",
                        "code": "token_not_valid",
                    })),
                )
                    .into_response()
            }
            ApiError::Password(err) => {
                tracing::error!(error = %err, "password handling failed");
                internal_error()
            }
            ApiError::Database(err) => {
                tracing::error!(error = ?err, "database operation failed");
                internal_error()
            }
        }
    }
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "detail": "Internal server error" })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::validators::ErrorCode;
    use axum::body::to_bytes;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_validation_error_is_field_keyed() {
        let mut errors = ValidationErrors::default();
        errors.add("phone_number", FieldError::invalid_phone_number());

        let response = ApiError::from(errors).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["phone_number"][0]["code"], "invalid_phonenumber");
        assert_eq!(body["phone_number"][0]["message"], "No es un número de teléfono válido");
    }

    #[tokio::test]
    async fn test_status_mapping() {
        assert_eq!(
            ApiError::NotFound("missing".into()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Token(TokenError::Expired).into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        let response = ApiError::Database(sqlx::Error::RowNotFound).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await["detail"], "Internal server error");
    }

    #[tokio::test]
    async fn test_unique_violation_maps_to_dni_error() {
        let pool = crate::db::test_pool().await;
        sqlx::query(
            "INSERT INTO users
                 (username, first_name, last_name, email, dni, phone_number, password, date_joined)
             VALUES ('a', 'A', 'A', 'a@x.com', 1234567, 3001234567, 'x', 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let err = sqlx::query(
            "INSERT INTO users
                 (username, first_name, last_name, email, dni, phone_number, password, date_joined)
             VALUES ('b', 'B', 'B', 'b@x.com', 1234567, 3001234567, 'x', 0)",
        )
        .execute(&pool)
        .await
        .unwrap_err();

        match ApiError::from(err) {
            ApiError::Validation(errors) => {
                assert!(errors.has_code("dni", ErrorCode::InvalidDocumentNumber));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }
}
