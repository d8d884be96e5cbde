mod application;
mod data;
mod domain;
mod infrastructure;
mod presentation;
mod server;

use std::sync::Arc;

use application::auth_service::AuthService;
use application::post_service::PostService;
use data::post_repository::PostgresPostRepository;
use data::user_repository::PostgresUserRepository;
use infrastructure::config::AppConfig;
use infrastructure::database::connect_and_migrate;
use infrastructure::logging::init_logging;
use infrastructure::security::JwtKeys;
use presentation::session_gate::{JwtSessionProvider, RouteMatcher, SessionGate};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    let config = AppConfig::from_env()?;
    let pool = connect_and_migrate(&config.database_url).await?;

    let user_repo = Arc::new(PostgresUserRepository::new(pool.clone()));
    let post_repo = Arc::new(PostgresPostRepository::new(pool));

    let keys = JwtKeys::new(
        config.jwt_secret.clone(),
        chrono::Duration::hours(config.token_ttl_hours),
    );
    let auth_service = AuthService::new(user_repo.clone(), keys.clone());
    let post_service = PostService::new(post_repo);

    let provider = Arc::new(JwtSessionProvider::new(keys, user_repo));
    let gate = Arc::new(SessionGate::new(
        RouteMatcher::new(&config.protected_routes),
        provider,
        config.sign_in_url.clone(),
        config.session_cookie.clone(),
    ));

    server::start_rest_server(config, auth_service, post_service, gate).await
}
