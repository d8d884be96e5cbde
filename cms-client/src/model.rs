use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    #[display("draft")]
    Draft,
    #[display("published")]
    Published,
    #[display("scheduled")]
    Scheduled,
}

#[derive(Debug, Clone, Serialize, Deserialize, Display)]
#[display("Post {{ id: {}, title: {}, status: {} }}", id, title, status)]
pub struct Post {
    pub id: Uuid,
    pub author_id: Uuid,
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
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Body of both create and update requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PostPayload {
    pub title: String,
    pub content: String,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub featured_image: Option<String>,
    pub status: PostStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Display)]
#[display("{} ({})", email, username.as_deref().unwrap_or("no username"))]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub username: Option<String>,
}
