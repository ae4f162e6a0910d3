use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Value, json};
use tracing::error;

pub type HttpResult<T> = Result<T, HttpError>;

/// Handler-level error carrying the status plus the JSON envelope the
/// frontend expects (`{"success": false, "message": ..}`). Authorization
/// denials never pass through here; the gate answers those before any
/// handler runs.
#[derive(Debug)]
pub struct HttpError {
    status: StatusCode,
    message: String,
    errors: Option<Value>,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            errors: None,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    /// 422 with a per-field error map.
    pub fn validation(message: impl Into<String>, errors: Value) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
            errors: Some(errors),
        }
    }

    pub fn internal(err: anyhow::Error) -> Self {
        error!(error = %err, "internal server error");
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }
}

/// Shorthand for `.map_err(db_error)?` around sea-orm calls.
pub fn db_error(err: sea_orm::DbErr) -> HttpError {
    HttpError::internal(err.into())
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let mut body = json!({
            "success": false,
            "message": self.message,
        });
        if let Some(errors) = self.errors {
            body["errors"] = errors;
        }
        (self.status, Json(body)).into_response()
    }
}
