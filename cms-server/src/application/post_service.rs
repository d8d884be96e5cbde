use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;
use uuid::Uuid;

use crate::data::post_repository::PostRepository;
use crate::domain::post::PostPayload;
use crate::domain::{error::DomainError, post::Post};

#[derive(Clone)]
pub struct PostService {
    repo: Arc<dyn PostRepository>,
}

impl PostService {
    pub fn new(repo: Arc<dyn PostRepository>) -> Self {
        Self { repo }
    }

    pub async fn get_post(&self, id: Uuid) -> Result<Post, DomainError> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or(DomainError::PostNotFound(id))
    }

    /// Unpublished posts are invisible to everyone but their author.
    pub async fn get_visible_post(
        &self,
        id: Uuid,
        viewer: Option<Uuid>,
    ) -> Result<Post, DomainError> {
        let post = self.get_post(id).await?;
        if post.is_public() || viewer == Some(post.author_id) {
            Ok(post)
        } else {
            Err(DomainError::PostNotFound(id))
        }
    }

    pub async fn get_posts(
        &self,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<Post>, DomainError> {
        self.repo.get_published(limit, offset).await
    }

    pub async fn get_author_posts(&self, author_id: Uuid) -> Result<Vec<Post>, DomainError> {
        self.repo.get_by_author(author_id).await
    }

    #[instrument(skip(self, payload), fields(status = payload.status.as_str()))]
    pub async fn create_post(
        &self,
        author_id: Uuid,
        payload: PostPayload,
    ) -> Result<Post, DomainError> {
        payload.validate(Utc::now())?;
        self.repo.create(Post::new(author_id, payload)).await
    }

    #[instrument(skip(self, payload), fields(status = payload.status.as_str()))]
    pub async fn update_post(
        &self,
        author_id: Uuid,
        post_id: Uuid,
        payload: PostPayload,
    ) -> Result<Post, DomainError> {
        payload.validate(Utc::now())?;
        let mut post = self.get_post(post_id).await?;
        if post.author_id != author_id {
            return Err(DomainError::Forbidden);
        }
        post.apply(payload)?;

        self.repo
            .save(post)
            .await?
            .ok_or(DomainError::PostNotFound(post_id))
    }

    #[instrument(skip(self))]
    pub async fn delete_post(&self, author_id: Uuid, post_id: Uuid) -> Result<(), DomainError> {
        self.repo.delete_post(post_id, author_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::memory::InMemoryPostRepository;
    use crate::domain::post::PostStatus;
    use chrono::Duration;

    fn payload(status: PostStatus) -> PostPayload {
        PostPayload {
            title: "First".into(),
            content: "body".into(),
            category: None,
            tags: vec![],
            featured_image: None,
            status,
            scheduled_for: None,
        }
    }

    fn service() -> PostService {
        PostService::new(Arc::new(InMemoryPostRepository::default()))
    }

    #[tokio::test]
    async fn update_keeps_identity_and_changes_status() {
        let posts = service();
        let author = Uuid::new_v4();
        let created = posts
            .create_post(author, payload(PostStatus::Draft))
            .await
            .unwrap();

        let mut next = payload(PostStatus::Published);
        next.title = "Second".into();
        let updated = posts.update_post(author, created.id, next).await.unwrap();

        assert_eq!(updated.id, created.id);
        assert_eq!(updated.title, "Second");
        assert_eq!(updated.status, PostStatus::Published);
        assert_eq!(posts.get_posts(None, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn only_the_author_may_update() {
        let posts = service();
        let created = posts
            .create_post(Uuid::new_v4(), payload(PostStatus::Draft))
            .await
            .unwrap();
        let err = posts
            .update_post(Uuid::new_v4(), created.id, payload(PostStatus::Draft))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Forbidden));
    }

    #[tokio::test]
    async fn updating_a_missing_post_is_not_found() {
        let err = service()
            .update_post(Uuid::new_v4(), Uuid::new_v4(), payload(PostStatus::Draft))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::PostNotFound(_)));
    }

    #[tokio::test]
    async fn drafts_are_hidden_from_other_viewers() {
        let posts = service();
        let author = Uuid::new_v4();
        let mut scheduled = payload(PostStatus::Scheduled);
        scheduled.scheduled_for = Some(Utc::now() + Duration::days(1));
        let post = posts.create_post(author, scheduled).await.unwrap();

        assert!(posts.get_visible_post(post.id, None).await.is_err());
        assert!(posts.get_visible_post(post.id, Some(author)).await.is_ok());
        assert!(posts.get_posts(None, None).await.unwrap().is_empty());
        assert_eq!(posts.get_author_posts(author).await.unwrap().len(), 1);
    }
}
