use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::DomainError;

pub const MAX_TITLE_CHARS: usize = 200;
pub const MAX_TAGS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Draft,
    Published,
    Scheduled,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Draft => "draft",
            PostStatus::Published => "published",
            PostStatus::Scheduled => "scheduled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(PostStatus::Draft),
            "published" => Some(PostStatus::Published),
            "scheduled" => Some(PostStatus::Scheduled),
            _ => None,
        }
    }

    /// A published post stays published.
    pub fn can_become(&self, next: PostStatus) -> bool {
        !matches!(
            (self, next),
            (PostStatus::Published, PostStatus::Draft | PostStatus::Scheduled)
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub featured_image: Option<String>,
    pub status: PostStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a client sends on both create and update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostPayload {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub featured_image: Option<String>,
    pub status: PostStatus,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl PostPayload {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), DomainError> {
        if self.title.is_empty() {
            return Err(DomainError::Validation("Title is required".into()));
        }
        if self.title.chars().count() > MAX_TITLE_CHARS {
            return Err(DomainError::Validation("Title too long".into()));
        }
        if self.content.is_empty() {
            return Err(DomainError::Validation("Content is required".into()));
        }
        if self.tags.len() > MAX_TAGS {
            return Err(DomainError::Validation("Maximum 10 tags allowed".into()));
        }
        if self.status == PostStatus::Scheduled {
            match self.scheduled_for {
                None => {
                    return Err(DomainError::Validation(
                        "scheduled posts need a scheduled_for time".into(),
                    ));
                }
                Some(at) if at <= now => {
                    return Err(DomainError::Validation(
                        "scheduled_for must be in the future".into(),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Empty optional strings are stored as absent.
    pub fn normalized(mut self) -> Self {
        self.category = self.category.filter(|c| !c.is_empty());
        self.featured_image = self.featured_image.filter(|i| !i.is_empty());
        self
    }
}

impl Post {
    pub fn new(author_id: Uuid, payload: PostPayload) -> Self {
        let now = Utc::now();
        let payload = payload.normalized();
        Self {
            id: Uuid::new_v4(),
            author_id,
            title: payload.title,
            content: payload.content,
            category: payload.category,
            tags: payload.tags,
            featured_image: payload.featured_image,
            status: payload.status,
            scheduled_for: payload.scheduled_for,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, payload: PostPayload) -> Result<(), DomainError> {
        if !self.status.can_become(payload.status) {
            return Err(DomainError::Validation(format!(
                "a {} post cannot become {}",
                self.status.as_str(),
                payload.status.as_str()
            )));
        }
        let payload = payload.normalized();
        self.title = payload.title;
        self.content = payload.content;
        self.category = payload.category;
        self.tags = payload.tags;
        self.featured_image = payload.featured_image;
        self.status = payload.status;
        self.scheduled_for = payload.scheduled_for;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn is_public(&self) -> bool {
        self.status == PostStatus::Published
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn payload() -> PostPayload {
        PostPayload {
            title: "Hello".into(),
            content: "<p>body</p>".into(),
            category: Some(String::new()),
            tags: vec!["rust".into()],
            featured_image: None,
            status: PostStatus::Draft,
            scheduled_for: None,
        }
    }

    #[test]
    fn rejects_too_many_tags() {
        let mut p = payload();
        p.tags = (0..11).map(|i| format!("t{i}")).collect();
        let err = p.validate(Utc::now()).unwrap_err();
        assert_eq!(err.to_string(), "Maximum 10 tags allowed");
    }

    #[test]
    fn title_length_counts_chars() {
        let mut p = payload();
        p.title = "é".repeat(200);
        assert!(p.validate(Utc::now()).is_ok());
        p.title.push('é');
        assert!(p.validate(Utc::now()).is_err());
    }

    #[test]
    fn scheduled_requires_future_time() {
        let now = Utc::now();
        let mut p = payload();
        p.status = PostStatus::Scheduled;
        assert!(p.validate(now).is_err());
        p.scheduled_for = Some(now - Duration::minutes(1));
        assert!(p.validate(now).is_err());
        p.scheduled_for = Some(now + Duration::hours(1));
        assert!(p.validate(now).is_ok());
    }

    #[test]
    fn published_post_never_returns_to_draft() {
        let mut p = payload();
        p.status = PostStatus::Published;
        let mut post = Post::new(Uuid::new_v4(), p);
        assert!(post.category.is_none());

        let err = post.apply(payload()).unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
        assert_eq!(post.status, PostStatus::Published);
    }
}
