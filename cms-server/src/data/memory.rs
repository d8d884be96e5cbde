//! In-memory repositories backing the service and HTTP tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::data::post_repository::PostRepository;
use crate::data::user_repository::UserRepository;
use crate::domain::error::DomainError;
use crate::domain::post::Post;
use crate::domain::user::User;

#[derive(Default)]
pub struct InMemoryPostRepository {
    store: RwLock<HashMap<Uuid, Post>>,
}

#[async_trait]
impl PostRepository for InMemoryPostRepository {
    async fn create(&self, post: Post) -> Result<Post, DomainError> {
        self.store.write().await.insert(post.id, post.clone());
        Ok(post)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, DomainError> {
        Ok(self.store.read().await.get(&id).cloned())
    }

    async fn save(&self, post: Post) -> Result<Option<Post>, DomainError> {
        let mut store = self.store.write().await;
        match store.get_mut(&post.id) {
            Some(existing) if existing.author_id == post.author_id => {
                *existing = post.clone();
                Ok(Some(post))
            }
            _ => Ok(None),
        }
    }

    async fn delete_post(&self, id: Uuid, author_id: Uuid) -> Result<(), DomainError> {
        let mut store = self.store.write().await;
        match store.get(&id) {
            None => Err(DomainError::PostNotFound(id)),
            Some(post) if post.author_id != author_id => Err(DomainError::Forbidden),
            Some(_) => {
                store.remove(&id);
                Ok(())
            }
        }
    }

    async fn get_published(
        &self,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<Post>, DomainError> {
        let mut posts: Vec<Post> = self
            .store
            .read()
            .await
            .values()
            .filter(|p| p.is_public())
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(posts
            .into_iter()
            .skip(offset.unwrap_or(0))
            .take(limit.unwrap_or(10).min(100))
            .collect())
    }

    async fn get_by_author(&self, author_id: Uuid) -> Result<Vec<Post>, DomainError> {
        let mut posts: Vec<Post> = self
            .store
            .read()
            .await
            .values()
            .filter(|p| p.author_id == author_id)
            .cloned()
            .collect();
        posts.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(posts)
    }
}

/// `unavailable` makes every lookup fail the way a lost database connection would.
#[derive(Default)]
pub struct InMemoryUserRepository {
    store: RwLock<HashMap<Uuid, User>>,
    unavailable: AtomicBool,
}

impl InMemoryUserRepository {
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), DomainError> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(DomainError::Internal("database unavailable".into()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn create(&self, user: User) -> Result<User, DomainError> {
        self.check()?;
        let mut store = self.store.write().await;
        if store.values().any(|u| u.email == user.email) {
            return Err(DomainError::UserAlreadyExists(
                "email already registered".to_string(),
            ));
        }
        if let Some(name) = &user.username {
            if store.values().any(|u| u.username.as_ref() == Some(name)) {
                return Err(DomainError::UsernameTaken(name.clone()));
            }
        }
        store.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, DomainError> {
        self.check()?;
        Ok(self
            .store
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, DomainError> {
        self.check()?;
        Ok(self
            .store
            .read()
            .await
            .values()
            .find(|u| u.username.as_deref() == Some(username))
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, DomainError> {
        self.check()?;
        Ok(self.store.read().await.get(&id).cloned())
    }

    async fn set_username(&self, id: Uuid, username: &str) -> Result<User, DomainError> {
        self.check()?;
        let mut store = self.store.write().await;
        if store
            .values()
            .any(|u| u.id != id && u.username.as_deref() == Some(username))
        {
            return Err(DomainError::UsernameTaken(username.to_string()));
        }
        let user = store.get_mut(&id).ok_or(DomainError::UserNotFound(id))?;
        user.username = Some(username.to_string());
        Ok(user.clone())
    }
}
