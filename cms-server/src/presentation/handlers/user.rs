use crate::application::auth_service::AuthService;
use crate::domain::error::DomainError;
use crate::presentation::dto::{CurrentUserResponse, UpdateUsernameRequest};
use crate::presentation::utils::AuthenticatedUser;
use actix_web::{HttpResponse, get, put, web};
use tracing::info;

#[get("/users/me")]
async fn current_user(
    user: AuthenticatedUser,
    auth: web::Data<AuthService>,
) -> Result<HttpResponse, DomainError> {
    let user = auth.get_user(user.id).await?;
    Ok(HttpResponse::Ok().json(CurrentUserResponse::from(user)))
}

#[put("/users/me/username")]
async fn update_username(
    user: AuthenticatedUser,
    auth: web::Data<AuthService>,
    payload: web::Json<UpdateUsernameRequest>,
) -> Result<HttpResponse, DomainError> {
    let updated = auth.update_username(user.id, &payload.username).await?;

    info!(user_id = %user.id, username = %payload.username, "username changed");

    Ok(HttpResponse::Ok().json(CurrentUserResponse::from(updated)))
}
