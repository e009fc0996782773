use crate::database::DbError;
use actix_web::{error::JsonPayloadError, http::StatusCode, HttpRequest, HttpResponse, ResponseError};
use log::{debug, error};
use serde::Serialize;
use serde_json::json;

/// One entry of a 422 response body.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct FieldError {
    pub location: &'static str,
    pub param: String,
    pub msg: String,
}

impl FieldError {
    pub fn body(param: impl Into<String>, msg: impl Into<String>) -> Self {
        FieldError {
            location: "body",
            param: param.into(),
            msg: msg.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("{0} already exists")]
    Conflict(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(&'static str),
}

impl ApiError {
    pub fn missing(key: &str) -> Self {
        ApiError::NotFound(format!("{} was not found", key))
    }
}

/// Logs the underlying error and hides it behind a fixed message.
pub fn log_error<E: std::fmt::Debug>(err: E, message: &'static str) -> ApiError {
    error!("{}: {:?}", message, err);
    ApiError::Internal(message)
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        log_error(err, "Database error")
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Conflict(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        match self {
            ApiError::Validation(errors) => builder.json(json!({ "errors": errors })),
            other => builder.json(json!({ "message": other.to_string() })),
        }
    }
}

/// Error handler for `web::JsonConfig`: body type mismatches become 422s.
pub fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    debug!("rejected json body: {}", err);
    match err {
        JsonPayloadError::Deserialize(err) => {
            ApiError::Validation(vec![FieldError::body("body", err.to_string())]).into()
        }
        other => ApiError::BadRequest(other.to_string()).into(),
    }
}
