use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use printframe_core::error::CoreError;
use printframe_db::StoreError;
use printframe_pipeline::ServiceError;
use printframe_storage::StorageError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce `{ "error", "code" }` bodies.
/// Internal failures are logged and their text is not returned.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An error raised by the enhancement service.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Service(service) => classify_service_error(service),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => internal(msg),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg.clone()),
        CoreError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        CoreError::Precondition(msg) => (
            StatusCode::PRECONDITION_FAILED,
            "PRECONDITION_FAILED",
            msg.clone(),
        ),
        CoreError::Internal(msg) => internal(msg),
    }
}

fn classify_service_error(err: &ServiceError) -> (StatusCode, &'static str, String) {
    match err {
        ServiceError::Core(core) => classify_core_error(core),
        ServiceError::Storage(StorageError::NotFound(key)) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("Asset {key} not found"),
        ),
        ServiceError::Storage(StorageError::AlreadyExists(key)) => (
            StatusCode::CONFLICT,
            "CONFLICT",
            format!("Asset {key} already exists"),
        ),
        ServiceError::Storage(StorageError::SigningUnavailable(reason)) => unavailable(reason),
        ServiceError::Unavailable(reason) => unavailable(reason),
        ServiceError::Store(StoreError::Database(e)) => {
            tracing::error!(error = %e, "Database error");
            internal_response()
        }
        other => internal(&other.to_string()),
    }
}

fn unavailable(reason: &str) -> (StatusCode, &'static str, String) {
    tracing::warn!(reason, "Dependency unavailable");
    (
        StatusCode::SERVICE_UNAVAILABLE,
        "SERVICE_UNAVAILABLE",
        "The service is temporarily unavailable, please retry".to_string(),
    )
}

fn internal(msg: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %msg, "Internal error");
    internal_response()
}

fn internal_response() -> (StatusCode, &'static str, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn precondition_maps_to_412() {
        let err = AppError::Service(ServiceError::Core(CoreError::Precondition("upscale first".into())));
        assert_eq!(status_of(err), StatusCode::PRECONDITION_FAILED);
    }

    #[test]
    fn signing_outage_maps_to_503() {
        assert_eq!(
            status_of(ServiceError::Unavailable("signer down".into()).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(ServiceError::Storage(StorageError::SigningUnavailable("x".into())).into()),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn authorization_errors_keep_their_codes() {
        assert_eq!(
            status_of(CoreError::Forbidden("no".into()).into()),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            status_of(CoreError::NotFound { entity: "photo", id: 1 }.into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(ServiceError::Storage(StorageError::NotFound("u1/a.jpg".into())).into()),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn backend_failures_are_hidden() {
        assert_eq!(
            status_of(ServiceError::Storage(StorageError::Backend("s3 exploded".into())).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
