use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("user not found: {0}")]
    UserNotFound(Uuid),
    #[error("user already exists: {0}")]
    UserAlreadyExists(String),
    #[error("username already taken: {0}")]
    UsernameTaken(String),
    #[error("post not found: {0}")]
    PostNotFound(Uuid),
    #[error("{0}")]
    Validation(String),
    #[error("forbidden")]
    Forbidden,
    #[error("unauthorized")]
    Unauthorized,
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl ResponseError for DomainError {
    fn status_code(&self) -> StatusCode {
        match self {
            DomainError::UserNotFound(_) | DomainError::PostNotFound(_) => StatusCode::NOT_FOUND,
            DomainError::Unauthorized => StatusCode::UNAUTHORIZED,
            DomainError::Forbidden => StatusCode::FORBIDDEN,
            DomainError::UserAlreadyExists(_) | DomainError::UsernameTaken(_) => {
                StatusCode::CONFLICT
            }
            DomainError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            DomainError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        // internal details stay in the logs
        let message = match self {
            DomainError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        };
        let details = match self {
            DomainError::PostNotFound(resource) | DomainError::UserNotFound(resource) => {
                Some(json!({ "resource": resource }))
            }
            DomainError::Forbidden => Some(json!({ "message": "you do not own this post" })),
            _ => None,
        };
        let body = ErrorBody {
            error: message.as_str(),
            details,
        };
        HttpResponse::build(self.status_code()).json(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn validation_maps_to_422_with_plain_message() {
        let err = DomainError::Validation("Title is required".into());
        assert_eq!(err.status_code(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "Title is required");
        assert!(json.get("details").is_none());
    }

    #[actix_web::test]
    async fn internal_errors_are_not_leaked() {
        let err = DomainError::Internal("connection refused at 10.0.0.3".into());
        let body = to_bytes(err.error_response().into_body()).await.unwrap();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["error"], "internal error");
    }
}
