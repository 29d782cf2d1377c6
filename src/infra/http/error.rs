use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use commentary_api_types::{ApiErrorBody, ApiErrorMessage};

use crate::application::comments::CommentError;
use crate::application::error::ErrorReport;
use crate::domain::error::DomainError;

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const INVALID_CURSOR: &str = "invalid_cursor";
    pub const PAYLOAD_TOO_LARGE: &str = "payload_too_large";
    pub const STORAGE_UNAVAILABLE: &str = "storage_unavailable";
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    report: Option<ErrorReport>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            report: None,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    fn with_report(mut self, report: ErrorReport) -> Self {
        self.report = Some(report);
        self
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = self.report.unwrap_or_else(|| {
            ErrorReport::from_message(
                "infra::http",
                self.status,
                format!(
                    "{}: {}",
                    self.code,
                    self.hint.as_deref().unwrap_or(self.message)
                ),
            )
        });
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        report.attach(&mut response);
        response
    }
}

impl From<CommentError> for ApiError {
    fn from(err: CommentError) -> Self {
        const SOURCE: &str = "infra::http::comment_error";
        match &err {
            CommentError::NotFound => ApiError::not_found("Comment not found"),
            CommentError::PermissionDenied => ApiError::new(
                StatusCode::FORBIDDEN,
                codes::FORBIDDEN,
                "Only the author may modify this comment",
                None,
            ),
            CommentError::MalformedCursor(inner) => ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_CURSOR,
                "Invalid cursor",
                Some(inner.to_string()),
            ),
            CommentError::StorageUnavailable(_) => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::STORAGE_UNAVAILABLE,
                "Storage temporarily unavailable",
                None,
            )
            .with_report(ErrorReport::from_error(
                SOURCE,
                StatusCode::SERVICE_UNAVAILABLE,
                &err,
            )),
        }
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::bad_request("Invalid request", Some(err.to_string()))
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            return ApiError::new(
                StatusCode::PAYLOAD_TOO_LARGE,
                codes::PAYLOAD_TOO_LARGE,
                "Request body too large",
                None,
            );
        }
        ApiError::bad_request("Invalid request body", Some(rejection.body_text()))
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::bad_request("Invalid path parameter", Some(rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::bad_request("Invalid query string", Some(rejection.body_text()))
    }
}
