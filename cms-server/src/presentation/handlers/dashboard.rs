//! Author-facing routes behind the session gate.

use crate::application::post_service::PostService;
use crate::domain::error::DomainError;
use crate::presentation::dto::ListPostsResponse;
use crate::presentation::utils::AuthenticatedUser;
use actix_web::{HttpResponse, get, web};
use uuid::Uuid;

#[get("/posts")]
async fn my_posts(
    user: AuthenticatedUser,
    posts: web::Data<PostService>,
) -> Result<HttpResponse, DomainError> {
    let posts = posts.get_author_posts(user.id).await?;
    Ok(HttpResponse::Ok().json(ListPostsResponse {
        total: posts.len(),
        posts,
        limit: None,
        offset: None,
    }))
}

#[get("/posts/{id}")]
async fn my_post(
    user: AuthenticatedUser,
    posts: web::Data<PostService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, DomainError> {
    let post = posts
        .get_visible_post(path.into_inner(), Some(user.id))
        .await?;
    if post.author_id != user.id {
        return Err(DomainError::Forbidden);
    }
    Ok(HttpResponse::Ok().json(post))
}
