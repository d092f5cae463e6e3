use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde::Serialize;
use tracing::error;

use crate::jobs::JobBoardError;
use crate::repo::RepoError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: String,
}

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("{0} not found")] NotFound(&'static str),
    #[error("conflict")] Conflict,
    #[error("authorization required")] Unauthorized,
    #[error("forbidden")] Forbidden,
    #[error("{0}")] BadRequest(String),
    #[error("validation failed: {0}")] Validation(String),
    #[error("{0}")] ServiceUnavailable(&'static str),
    #[error("internal error")] Internal,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<RepoError> for ApiError {
    fn from(e: RepoError) -> Self {
        match e {
            RepoError::NotFound => ApiError::NotFound("record"),
            RepoError::Conflict => ApiError::Conflict,
            RepoError::Internal(msg) => {
                error!(error = %msg, "store failure");
                ApiError::Internal
            }
        }
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(e: validator::ValidationErrors) -> Self {
        ApiError::Validation(e.to_string())
    }
}

impl From<JobBoardError> for ApiError {
    fn from(e: JobBoardError) -> Self {
        error!(error = %e, "job board content unavailable");
        ApiError::Internal
    }
}

/// Maps a store miss to a named 404 ("question not found").
pub fn missing(what: &'static str) -> impl FnOnce(RepoError) -> ApiError {
    move |e| match e {
        RepoError::NotFound => ApiError::NotFound(what),
        other => other.into(),
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiErrorBody { error: self.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_names_the_record() {
        let e = missing("question")(RepoError::NotFound);
        assert_eq!(e.to_string(), "question not found");
        assert_eq!(e.status_code(), StatusCode::NOT_FOUND);
        assert!(matches!(missing("tag")(RepoError::Conflict), ApiError::Conflict));
    }
}
