//! Maps the shared [`flowline_domain::Error`] onto HTTP responses. Kept
//! as a thin newtype rather than a blanket `From` on the domain error
//! itself, since only the gateway knows about status codes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json};
use flowline_domain::Error;

pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self.0 {
            Error::Compile(_) | Error::InvalidTransition(_) | Error::Config(_) => StatusCode::BAD_REQUEST,
            Error::SchemaViolation(_) | Error::ToolExecution(_) | Error::ExternalAction(_) => StatusCode::BAD_GATEWAY,
            Error::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::Io(_) | Error::Json(_) | Error::Http(_) | Error::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}
