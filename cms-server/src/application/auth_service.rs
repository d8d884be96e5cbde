use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use crate::data::user_repository::UserRepository;
use crate::domain::user::validate_username;
use crate::domain::{error::DomainError, user::User};
use crate::infrastructure::security::{JwtKeys, hash_password, verify_password};

#[derive(Clone)]
pub struct AuthService {
    repo: Arc<dyn UserRepository>,
    keys: JwtKeys,
}

impl AuthService {
    pub fn new(repo: Arc<dyn UserRepository>, keys: JwtKeys) -> Self {
        Self { repo, keys }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User, DomainError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(DomainError::UserNotFound(id))
    }

    #[instrument(skip(self, password))]
    pub async fn register(
        &self,
        username: Option<String>,
        email: String,
        password: String,
    ) -> Result<User, DomainError> {
        if !email.contains('@') {
            return Err(DomainError::Validation("Wrong email".into()));
        }
        if password.len() < 8 {
            return Err(DomainError::Validation(
                "Passwords must be at least 8 chars long".into(),
            ));
        }
        let username = username.filter(|u| !u.is_empty());
        if let Some(name) = &username {
            validate_username(name)?;
        }

        let hash =
            hash_password(&password).map_err(|err| DomainError::Internal(err.to_string()))?;
        let user = User::new(username, email.to_lowercase(), hash);
        self.repo.create(user).await
    }

    #[instrument(skip(self, password))]
    pub async fn login(&self, email: &str, password: &str) -> Result<String, DomainError> {
        let user = self
            .repo
            .find_by_email(&email.to_lowercase())
            .await?
            .ok_or(DomainError::Unauthorized)?;

        let valid = verify_password(password, &user.password_hash)
            .map_err(|_| DomainError::Unauthorized)?;
        if !valid {
            return Err(DomainError::Unauthorized);
        }

        self.issue_token(user.id)
    }

    pub fn issue_token(&self, user_id: Uuid) -> Result<String, DomainError> {
        self.keys
            .generate_token(user_id)
            .map_err(|err| DomainError::Internal(err.to_string()))
    }

    #[instrument(skip(self))]
    pub async fn update_username(&self, id: Uuid, username: &str) -> Result<User, DomainError> {
        validate_username(username)?;
        if let Some(existing) = self.repo.find_by_username(username).await? {
            if existing.id != id {
                return Err(DomainError::UsernameTaken(username.to_string()));
            }
        }
        self.repo.set_username(id, username).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::memory::InMemoryUserRepository;
    use chrono::Duration;

    fn service() -> AuthService {
        AuthService::new(
            Arc::new(InMemoryUserRepository::default()),
            JwtKeys::new("secret".into(), Duration::hours(1)),
        )
    }

    #[tokio::test]
    async fn register_then_login_issues_token_for_user() {
        let auth = service();
        let user = auth
            .register(None, "Ann@Example.com".into(), "password123".into())
            .await
            .unwrap();
        assert_eq!(user.email, "ann@example.com");

        let token = auth.login("ANN@example.com", "password123").await.unwrap();
        let claims = auth.keys().verify_token(&token).unwrap();
        assert_eq!(claims.subject(), Some(user.id));

        let err = auth.login("ann@example.com", "nope").await.unwrap_err();
        assert!(matches!(err, DomainError::Unauthorized));
    }

    #[tokio::test]
    async fn duplicate_username_is_rejected() {
        let auth = service();
        let a = auth
            .register(Some("writer".into()), "a@x.io".into(), "password123".into())
            .await
            .unwrap();
        let b = auth
            .register(None, "b@x.io".into(), "password123".into())
            .await
            .unwrap();

        let err = auth.update_username(b.id, "writer").await.unwrap_err();
        assert!(matches!(err, DomainError::UsernameTaken(_)));

        // renaming to your own name is a no-op, not a conflict
        let same = auth.update_username(a.id, "writer").await.unwrap();
        assert_eq!(same.username.as_deref(), Some("writer"));
    }

    #[tokio::test]
    async fn invalid_username_never_reaches_the_store() {
        let auth = service();
        let user = auth
            .register(None, "c@x.io".into(), "password123".into())
            .await
            .unwrap();
        let err = auth.update_username(user.id, "no").await.unwrap_err();
        assert_eq!(err.to_string(), "Username must be at least 3 characters");
        assert!(auth.get_user(user.id).await.unwrap().username.is_none());
    }
}
