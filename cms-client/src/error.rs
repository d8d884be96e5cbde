use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CmsClientError {
    #[error("Request error: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Token storage error: {0}")]
    TokenStorage(#[from] std::io::Error),
    #[error("Not found")]
    NotFound,
    #[error("Unauthorized")]
    Unauthorized,
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Conflict(String),
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

impl CmsClientError {
    /// Maps a non-success response onto an error, keeping the server's
    /// `{"error": ...}` message when the body carries one.
    pub fn from_status(status: u16, body: &str) -> Self {
        let message = serde_json::from_str::<ErrorBody>(body)
            .map(|b| b.error)
            .unwrap_or_else(|_| body.trim().to_string());

        match status {
            401 => CmsClientError::Unauthorized,
            // the session gate answers protected pages with a sign-in redirect
            300..=399 => CmsClientError::Unauthorized,
            404 => CmsClientError::NotFound,
            400 | 422 => CmsClientError::Validation(message),
            409 => CmsClientError::Conflict(message),
            _ => CmsClientError::Http { status, message },
        }
    }

    pub(crate) async fn from_http_response(resp: reqwest::Response) -> Self {
        let status = resp.status().as_u16();
        match resp.text().await {
            Ok(body) => Self::from_status(status, &body),
            Err(err) => CmsClientError::RequestError(err),
        }
    }

    /// Message reported by the other side, suitable for showing to a user.
    /// Transport failures carry none.
    pub fn message(&self) -> Option<String> {
        match self {
            CmsClientError::RequestError(_) | CmsClientError::TokenStorage(_) => None,
            CmsClientError::Http { message, .. } if message.is_empty() => None,
            CmsClientError::Http { message, .. } => Some(message.clone()),
            other => Some(other.to_string()),
        }
    }
}
