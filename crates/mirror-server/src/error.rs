//! HTTP mapping of mirror errors.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use mirror_core::Error;

/// Status used when the client went away before an answer was ready.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// A mirror error rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            Error::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Error::Forbidden(_) => StatusCode::FORBIDDEN,
            err if err.is_not_found() => StatusCode::NOT_FOUND,
            Error::Canceled => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match status {
            StatusCode::METHOD_NOT_ALLOWED => "Method Not Allowed".to_string(),
            StatusCode::FORBIDDEN => "Forbidden".to_string(),
            _ => self.0.to_string(),
        };
        (status, body).into_response()
    }
}
