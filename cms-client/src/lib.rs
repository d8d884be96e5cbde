//! Client side of the CMS: the HTTP transport, the post editor workflow and
//! the account settings form.

use async_trait::async_trait;
use uuid::Uuid;

pub mod editor;
pub mod error;
pub mod http_client;
pub mod model;
pub mod settings;
pub mod ui;

pub use error::CmsClientError;
pub use http_client::CmsClientHttp;
pub use model::{CurrentUser, Post, PostPayload, PostStatus};

/// Writes the editor needs from the post store.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn create_post(&self, payload: &PostPayload) -> Result<Post, CmsClientError>;
    async fn update_post(&self, id: Uuid, payload: &PostPayload) -> Result<Post, CmsClientError>;
}

/// The signed-in user's own account.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn current_user(&self) -> Result<CurrentUser, CmsClientError>;
    async fn update_username(&self, username: &str) -> Result<CurrentUser, CmsClientError>;
}
