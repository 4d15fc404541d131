use reqwest::StatusCode;
use serde::Deserialize;

/// Postgres error code reported on a unique constraint violation
pub const UNIQUE_VIOLATION: &str = "23505";

#[derive(Debug, thiserror::Error)]
#[error("HTTP request to the backend failed: {0}")]
pub struct RequestFailure(#[source] reqwest::Error);

impl From<reqwest::Error> for RequestFailure {
    fn from(error: reqwest::Error) -> Self {
        #[cfg(any(debug_assertions, test))]
        let err = RequestFailure(error);
        #[cfg(all(not(debug_assertions), not(test)))]
        let err = RequestFailure(error.without_url());
        err
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Request(#[from] RequestFailure),
    /// The backend answered with an error payload
    #[error("{message}")]
    Api {
        status: StatusCode,
        code: Option<String>,
        message: String,
    },
    #[error("Unexpected response from the backend: {0}")]
    ResponseFormat(String),
    #[error("Backend URL '{0}' cannot be used as a base URL")]
    InvalidBaseUrl(String),
}

impl From<reqwest::Error> for Error {
    fn from(error: reqwest::Error) -> Self {
        if error.is_decode() {
            return Error::ResponseFormat(error.to_string());
        }
        Error::Request(error.into())
    }
}

impl Error {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, Error::Api { code: Some(code), .. } if code == UNIQUE_VIOLATION)
    }

    /// Builds an [Error::Api] from an error response
    ///
    /// The table gateway, the storage service and the auth service each have their own
    /// error payload shape. The first non-empty message field wins, falling back on the
    /// canonical reason of the status code.
    pub fn from_response(status: StatusCode, body: &[u8]) -> Self {
        #[derive(Debug, Default, Deserialize)]
        struct ErrorPayload {
            code: Option<serde_json::Value>,
            error_code: Option<String>,
            message: Option<String>,
            msg: Option<String>,
            error_description: Option<String>,
            error: Option<String>,
        }

        let payload: ErrorPayload = serde_json::from_slice(body).unwrap_or_default();
        let code = match payload.code {
            Some(serde_json::Value::String(code)) => Some(code),
            _ => payload.error_code,
        };
        let message = [
            payload.message,
            payload.msg,
            payload.error_description,
            payload.error,
        ]
        .into_iter()
        .flatten()
        .find(|message| !message.trim().is_empty())
        .or_else(|| {
            let text = String::from_utf8_lossy(body).trim().to_owned();
            (!text.is_empty() && !text.starts_with('{')).then_some(text)
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("Unknown error")
                .to_owned()
        });
        Error::Api {
            status,
            code,
            message,
        }
    }
}
