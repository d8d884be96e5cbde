use crate::application::post_service::PostService;
use crate::domain::error::DomainError;
use crate::domain::post::PostPayload;
use crate::presentation::dto::{ListPostsQuery, ListPostsResponse};
use crate::presentation::session_gate::{SessionGate, session_tokens};
use crate::presentation::utils::{AuthenticatedUser, request_id};
use actix_web::{HttpRequest, HttpResponse, delete, get, post, put, web};
use tracing::{info, warn};
use uuid::Uuid;

#[post("/posts")]
async fn create_post(
    req: HttpRequest,
    user: AuthenticatedUser,
    posts: web::Data<PostService>,
    payload: web::Json<PostPayload>,
) -> Result<HttpResponse, DomainError> {
    let post = posts.create_post(user.id, payload.into_inner()).await?;

    info!(
        request_id = %request_id(&req),
        user_id = %user.id,
        post_id = %post.id,
        status = post.status.as_str(),
        "post created"
    );

    Ok(HttpResponse::Created().json(post))
}

#[put("/posts/{id}")]
async fn update_post(
    req: HttpRequest,
    user: AuthenticatedUser,
    posts: web::Data<PostService>,
    payload: web::Json<PostPayload>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, DomainError> {
    let post_id = path.into_inner();
    let post = posts
        .update_post(user.id, post_id, payload.into_inner())
        .await?;

    info!(
        request_id = %request_id(&req),
        user_id = %user.id,
        post_id = %post.id,
        status = post.status.as_str(),
        "post updated"
    );

    Ok(HttpResponse::Ok().json(post))
}

#[delete("/posts/{id}")]
async fn delete_post(
    req: HttpRequest,
    user: AuthenticatedUser,
    posts: web::Data<PostService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, DomainError> {
    let post_id = path.into_inner();
    posts.delete_post(user.id, post_id).await?;

    info!(
        request_id = %request_id(&req),
        user_id = %user.id,
        post_id = %post_id,
        "post deleted"
    );

    Ok(HttpResponse::NoContent().finish())
}

#[get("/posts")]
async fn get_posts(
    req: HttpRequest,
    posts: web::Data<PostService>,
    query: web::Query<ListPostsQuery>,
) -> Result<HttpResponse, DomainError> {
    let ListPostsQuery { limit, offset } = query.into_inner();
    let posts = posts.get_posts(limit, offset).await?;

    info!(
        request_id = %request_id(&req),
        count = posts.len(),
        "posts retrieved"
    );

    Ok(HttpResponse::Ok().json(ListPostsResponse {
        total: posts.len(),
        posts,
        limit,
        offset,
    }))
}

/// Public read; a signed-in author also sees their own unpublished posts.
#[get("/posts/{id}")]
async fn get_post(
    req: HttpRequest,
    posts: web::Data<PostService>,
    gate: web::Data<SessionGate>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, DomainError> {
    let tokens = session_tokens(req.headers(), req.cookie(gate.cookie_name()));
    let viewer = gate.subject(&tokens).await.unwrap_or_else(|err| {
        warn!(error = %err, "viewer lookup failed, serving public view");
        None
    });

    let post = posts.get_visible_post(path.into_inner(), viewer).await?;
    Ok(HttpResponse::Ok().json(post))
}
