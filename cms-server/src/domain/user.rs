use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::DomainError;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: Option<String>,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(username: Option<String>, email: String, password_hash: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            username,
            email,
            password_hash,
            created_at: Utc::now(),
        }
    }
}

pub fn validate_username(username: &str) -> Result<(), DomainError> {
    let len = username.chars().count();
    if len < 3 {
        return Err(DomainError::Validation(
            "Username must be at least 3 characters".into(),
        ));
    }
    if len > 20 {
        return Err(DomainError::Validation(
            "Username must be less than 20 characters".into(),
        ));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(DomainError::Validation(
            "Username can only contain letters, numbers, underscores, and hyphens".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_rules() {
        assert!(validate_username("ab").is_err());
        assert!(validate_username("abc").is_ok());
        assert!(validate_username("a_b-c_123").is_ok());
        assert!(validate_username(&"x".repeat(20)).is_ok());
        assert!(validate_username(&"x".repeat(21)).is_err());
        assert!(validate_username("with space").is_err());
        assert!(validate_username("ünï").is_err());
    }
}
