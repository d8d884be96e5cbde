use crate::application::auth_service::AuthService;
use crate::domain::error::DomainError;
use crate::presentation::dto::{AuthResponse, LoginRequest, RegisterRequest};
use crate::presentation::session_gate::SessionGate;
use actix_web::{HttpResponse, Responder, Scope, post, web};
use tracing::info;

pub fn scope() -> Scope {
    web::scope("/auth")
        .service(register)
        .service(login)
        .service(logout)
}

fn signed_in(
    status: actix_web::http::StatusCode,
    auth: &AuthService,
    gate: &SessionGate,
    token: String,
) -> HttpResponse {
    let ttl = auth.keys().ttl();
    HttpResponse::build(status)
        .cookie(gate.session_cookie(token.clone(), ttl))
        .json(AuthResponse::bearer(token, ttl.num_seconds()))
}

#[post("/register")]
async fn register(
    auth: web::Data<AuthService>,
    gate: web::Data<SessionGate>,
    payload: web::Json<RegisterRequest>,
) -> Result<impl Responder, DomainError> {
    let RegisterRequest {
        username,
        email,
        password,
    } = payload.into_inner();
    let user = auth.register(username, email, password).await?;

    info!(user_id = %user.id, email = %user.email, "user registered");

    let token = auth.issue_token(user.id)?;
    Ok(signed_in(
        actix_web::http::StatusCode::CREATED,
        &auth,
        &gate,
        token,
    ))
}

#[post("/login")]
async fn login(
    auth: web::Data<AuthService>,
    gate: web::Data<SessionGate>,
    payload: web::Json<LoginRequest>,
) -> Result<impl Responder, DomainError> {
    let token = auth.login(&payload.email, &payload.password).await?;

    info!(email = %payload.email, "user logged in");

    Ok(signed_in(actix_web::http::StatusCode::OK, &auth, &gate, token))
}

#[post("/logout")]
async fn logout(gate: web::Data<SessionGate>) -> impl Responder {
    HttpResponse::NoContent()
        .cookie(gate.expired_cookie())
        .finish()
}
