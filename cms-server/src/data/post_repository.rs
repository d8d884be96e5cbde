use crate::domain::error::DomainError;
use crate::domain::post::{Post, PostStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

#[async_trait]
pub trait PostRepository: Send + Sync {
    async fn create(&self, post: Post) -> Result<Post, DomainError>;
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, DomainError>;
    async fn save(&self, post: Post) -> Result<Option<Post>, DomainError>;
    async fn delete_post(&self, id: Uuid, author_id: Uuid) -> Result<(), DomainError>;
    async fn get_published(
        &self,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<Post>, DomainError>;
    async fn get_by_author(&self, author_id: Uuid) -> Result<Vec<Post>, DomainError>;
}

const POST_COLUMNS: &str = "id, author_id, title, content, category, tags, featured_image, \
                            status, scheduled_for, created_at, updated_at";

#[derive(sqlx::FromRow)]
struct PostRow {
    id: Uuid,
    author_id: Uuid,
    title: String,
    content: String,
    category: Option<String>,
    tags: Vec<String>,
    featured_image: Option<String>,
    status: String,
    scheduled_for: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PostRow> for Post {
    type Error = DomainError;

    fn try_from(row: PostRow) -> Result<Self, Self::Error> {
        let status = PostStatus::parse(&row.status).ok_or_else(|| {
            DomainError::Internal(format!("unknown post status in db: {}", row.status))
        })?;
        Ok(Post {
            id: row.id,
            author_id: row.author_id,
            title: row.title,
            content: row.content,
            category: row.category,
            tags: row.tags,
            featured_image: row.featured_image,
            status,
            scheduled_for: row.scheduled_for,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_posts(rows: Vec<PostRow>) -> Result<Vec<Post>, DomainError> {
    rows.into_iter().map(Post::try_from).collect()
}

#[derive(Clone)]
pub struct PostgresPostRepository {
    pool: PgPool,
}

impl PostgresPostRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PostRepository for PostgresPostRepository {
    async fn create(&self, post: Post) -> Result<Post, DomainError> {
        sqlx::query(
            r#"
            INSERT INTO posts (id, author_id, title, content, category, tags, featured_image,
                               status, scheduled_for, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(post.id)
        .bind(post.author_id)
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.category)
        .bind(&post.tags)
        .bind(&post.featured_image)
        .bind(post.status.as_str())
        .bind(post.scheduled_for)
        .bind(post.created_at)
        .bind(post.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to create post: {}", e);
            DomainError::Internal(format!("database error: {}", e))
        })?;

        info!(post_id = %post.id, author_id = %post.author_id, status = post.status.as_str(), "post created");
        Ok(post)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Post>, DomainError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("db error find_by_id {}: {}", id, e);
            DomainError::Internal(e.to_string())
        })?;

        row.map(Post::try_from).transpose()
    }

    async fn save(&self, post: Post) -> Result<Option<Post>, DomainError> {
        let row = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            UPDATE posts
            SET
                title = $1,
                content = $2,
                category = $3,
                tags = $4,
                featured_image = $5,
                status = $6,
                scheduled_for = $7,
                updated_at = $8
            WHERE id = $9 AND author_id = $10
            RETURNING {POST_COLUMNS}
            "#
        ))
        .bind(&post.title)
        .bind(&post.content)
        .bind(&post.category)
        .bind(&post.tags)
        .bind(&post.featured_image)
        .bind(post.status.as_str())
        .bind(post.scheduled_for)
        .bind(post.updated_at)
        .bind(post.id)
        .bind(post.author_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("failed to update post {}: {}", post.id, e);
            DomainError::Internal(e.to_string())
        })?;

        if row.is_some() {
            info!(post_id = %post.id, status = post.status.as_str(), "post updated");
        }

        row.map(Post::try_from).transpose()
    }

    async fn delete_post(&self, id: Uuid, author_id: Uuid) -> Result<(), DomainError> {
        let deleted = sqlx::query("DELETE FROM posts WHERE id = $1 AND author_id = $2")
            .bind(id)
            .bind(author_id)
            .execute(&self.pool)
            .await
            .map_err(|e| DomainError::Internal(e.to_string()))?;

        if deleted.rows_affected() == 0 {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM posts WHERE id = $1)")
                    .bind(id)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(|e| DomainError::Internal(e.to_string()))?;

            return if exists {
                Err(DomainError::Forbidden)
            } else {
                Err(DomainError::PostNotFound(id))
            };
        }

        info!(post_id = %id, "post deleted");
        Ok(())
    }

    async fn get_published(
        &self,
        limit: Option<usize>,
        offset: Option<usize>,
    ) -> Result<Vec<Post>, DomainError> {
        let limit = limit.unwrap_or(10).min(100) as i64;
        let offset = offset.unwrap_or(0) as i64;

        let rows = sqlx::query_as::<_, PostRow>(&format!(
            r#"
            SELECT {POST_COLUMNS}
            FROM posts
            WHERE status = 'published'
            ORDER BY created_at DESC
            LIMIT $1 OFFSET $2
            "#
        ))
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while fetching posts: {}", e);
            DomainError::Internal(e.to_string())
        })?;

        into_posts(rows)
    }

    async fn get_by_author(&self, author_id: Uuid) -> Result<Vec<Post>, DomainError> {
        let rows = sqlx::query_as::<_, PostRow>(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE author_id = $1 ORDER BY updated_at DESC"
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            error!("db error while fetching posts of {}: {}", author_id, e);
            DomainError::Internal(e.to_string())
        })?;

        into_posts(rows)
    }
}
