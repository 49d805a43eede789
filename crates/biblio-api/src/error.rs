//! Maps domain errors onto HTTP statuses and the response envelope.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use biblio_types::{BaseResponse, LifecycleError, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Lifecycle(e) => match e {
                LifecycleError::NotFound(_) => StatusCode::NOT_FOUND,
                LifecycleError::Conflict(_) => StatusCode::CONFLICT,
                LifecycleError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
                LifecycleError::InvalidState(_)
                | LifecycleError::DuplicateRequest
                | LifecycleError::AlreadyCheckedOut
                | LifecycleError::AlreadyResolved
                | LifecycleError::AlreadyReturned
                | LifecycleError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            },
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Lifecycle(e.into())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        ApiError::BadRequest(e.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = BaseResponse::<()>::error(i32::from(status.as_u16()), self.to_string());
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_errors_map_to_statuses() {
        let cases = [
            (LifecycleError::NotFound("book b1".into()), StatusCode::NOT_FOUND),
            (LifecycleError::Conflict("stale".into()), StatusCode::CONFLICT),
            (LifecycleError::DuplicateRequest, StatusCode::BAD_REQUEST),
            (LifecycleError::AlreadyReturned, StatusCode::BAD_REQUEST),
            (
                LifecycleError::Store(StoreError::Other("disk".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status(), status);
        }
        assert_eq!(
            ApiError::Forbidden("staff only".into()).status(),
            StatusCode::FORBIDDEN
        );
    }
}
