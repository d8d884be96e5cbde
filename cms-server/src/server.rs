use crate::application::auth_service::AuthService;
use crate::application::post_service::PostService;
use crate::infrastructure::config::AppConfig;
use crate::presentation::handlers;
use crate::presentation::middleware::{ApiAuthMiddleware, RequestIdMiddleware, TimingMiddleware};
use crate::presentation::session_gate::{SessionGate, SessionGateMiddleware, SessionProvider};
use actix_cors::Cors;
use actix_web::middleware::{DefaultHeaders, Logger};
use actix_web::{App, HttpResponse, HttpServer, Responder, Scope, web};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// Public reads, auth endpoints and the bearer-protected write API.
pub fn api_scope(provider: Arc<dyn SessionProvider>) -> Scope {
    web::scope("/api")
        .route("/health", web::get().to(health))
        .service(handlers::auth::scope())
        .service(handlers::post::get_posts)
        .service(handlers::post::get_post)
        .service(
            web::scope("")
                .wrap(ApiAuthMiddleware::new(provider))
                .service(handlers::post::create_post)
                .service(handlers::post::update_post)
                .service(handlers::post::delete_post)
                .service(handlers::user::current_user)
                .service(handlers::user::update_username),
        )
}

/// Routes under the protected area; the session gate wrapping the whole app
/// guarantees an `AuthenticatedUser` here.
pub fn dashboard_scope() -> Scope {
    web::scope("/dashboard")
        .service(handlers::dashboard::my_posts)
        .service(handlers::dashboard::my_post)
}

pub async fn start_rest_server(
    config: AppConfig,
    auth_service: AuthService,
    post_service: PostService,
    gate: Arc<SessionGate>,
) -> anyhow::Result<()> {
    let bind_address = (config.host.clone(), config.port);

    info!(host = %bind_address.0, port = bind_address.1, "HTTP server starting");

    let auth_data = web::Data::new(auth_service);
    let post_data = web::Data::new(post_service);
    let gate_data = web::Data::from(Arc::clone(&gate));

    HttpServer::new(move || {
        let cors = build_cors(&config);

        App::new()
            .wrap(SessionGateMiddleware::new(Arc::clone(&gate)))
            .wrap(Logger::default())
            .wrap(TimingMiddleware)
            .wrap(RequestIdMiddleware)
            .wrap(
                DefaultHeaders::new()
                    .add(("X-Content-Type-Options", "nosniff"))
                    .add(("Referrer-Policy", "no-referrer"))
                    .add(("Permissions-Policy", "geolocation=()"))
                    .add(("Cross-Origin-Opener-Policy", "same-origin")),
            )
            .wrap(cors)
            .app_data(post_data.clone())
            .app_data(auth_data.clone())
            .app_data(gate_data.clone())
            .service(api_scope(Arc::clone(gate.provider())))
            .service(dashboard_scope())
    })
    .bind(bind_address)?
    .run()
    .await
    .map_err(anyhow::Error::new)?;

    Ok(())
}

fn build_cors(config: &AppConfig) -> Cors {
    let mut cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "PUT", "DELETE"])
        .allowed_headers(vec![
            actix_web::http::header::CONTENT_TYPE,
            actix_web::http::header::AUTHORIZATION,
        ])
        .supports_credentials()
        .max_age(3600);

    for origin in &config.cors_origins {
        if origin == "*" {
            cors = cors.allow_any_origin();
        } else {
            cors = cors.allowed_origin(origin);
        }
    }

    cors
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
    })
}
