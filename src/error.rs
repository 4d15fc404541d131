use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::Display;
use std::fmt::Formatter;
use std::result::Result as StdResult;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use colored::Colorize;
use serde_json::Value;
use serde_json::json;
use tracing::error;
use tracing::warn;

use crate::models::FormError;
use crate::views::layout;

pub type Result<T, E = InternalError> = StdResult<T, E>;

/// Trait for all errors that can be returned by casebook
pub trait CasebookError: Error + Send + Sync {
    fn get_status(&self) -> StatusCode;

    fn get_type(&self) -> &str;

    fn context(&self) -> HashMap<String, Value> {
        Default::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InternalError {
    pub status: StatusCode,
    pub error_type: String,
    pub context: HashMap<String, Value>,
    pub message: String,
}

impl InternalError {
    /// Logs the error at a level matching its status
    pub fn log(&self) {
        if self.status.is_server_error() {
            error!(
                "[{}] {}: {}",
                self.error_type.bold(),
                self.message,
                Backtrace::capture() // won't log unless RUST_BACKTRACE=1
            );
        } else {
            warn!(error_type = %self.error_type, context = ?self.context, "{}", self.message);
        }
    }
}

impl Error for InternalError {}

impl Display for InternalError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl<T: CasebookError> From<T> for InternalError {
    fn from(err: T) -> Self {
        InternalError {
            status: err.get_status(),
            error_type: err.get_type().to_owned(),
            context: err.context(),
            message: err.to_string(),
        }
    }
}

impl IntoResponse for InternalError {
    fn into_response(self) -> Response {
        self.log();
        (self.status, layout::error_page(self.status, &self.message)).into_response()
    }
}

/// Handle all backend errors
impl CasebookError for backend_client::Error {
    fn get_status(&self) -> StatusCode {
        if self.is_unique_violation() {
            StatusCode::CONFLICT
        } else {
            StatusCode::BAD_GATEWAY
        }
    }

    fn get_type(&self) -> &str {
        match self {
            _ if self.is_unique_violation() => "casebook:backend:UniqueViolation",
            backend_client::Error::Request(_) => "casebook:backend:RequestFailure",
            backend_client::Error::Api { .. } => "casebook:backend:ApiError",
            backend_client::Error::ResponseFormat(_) => "casebook:backend:ResponseFormat",
            backend_client::Error::InvalidBaseUrl(_) => "casebook:backend:InvalidBaseUrl",
        }
    }

    fn context(&self) -> HashMap<String, Value> {
        match self {
            backend_client::Error::Api { status, code, .. } => HashMap::from([
                ("backend_status".to_owned(), json!(status.as_u16())),
                ("code".to_owned(), json!(code)),
            ]),
            _ => Default::default(),
        }
    }
}

impl CasebookError for FormError {
    fn get_status(&self) -> StatusCode {
        StatusCode::UNPROCESSABLE_ENTITY
    }

    fn get_type(&self) -> &str {
        match self {
            FormError::MissingField { .. } => "casebook:form:MissingField",
            FormError::InvalidDate { .. } => "casebook:form:InvalidDate",
        }
    }

    fn context(&self) -> HashMap<String, Value> {
        match self {
            FormError::MissingField { field } => HashMap::from([("field".to_owned(), json!(field))]),
            FormError::InvalidDate { value } => HashMap::from([("value".to_owned(), json!(value))]),
        }
    }
}
