use serde::Deserialize;

pub const DEFAULT_PROTECTED_ROUTES: &str = "/dashboard(.*)";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    #[serde(default)]
    pub cors_origins: Vec<String>,
    pub sign_in_url: String,
    pub protected_routes: Vec<String>,
    pub session_cookie: String,
    pub token_ttl_hours: i64,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let host = std::env::var("HOST").unwrap_or_else(|_| "127.0.0.1".into());
        let port = std::env::var("PORT")
            .unwrap_or_else(|_| "8080".into())
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid PORT: {}", e))?;
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let jwt_secret =
            std::env::var("JWT_SECRET").map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?;
        let cors_origins = split_list(&std::env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".into()));
        let sign_in_url = std::env::var("SIGN_IN_URL").unwrap_or_else(|_| "/sign-in".into());
        let protected_routes = split_list(
            &std::env::var("PROTECTED_ROUTES").unwrap_or_else(|_| DEFAULT_PROTECTED_ROUTES.into()),
        );
        let session_cookie =
            std::env::var("SESSION_COOKIE").unwrap_or_else(|_| "cms_session".into());
        let token_ttl_hours = std::env::var("TOKEN_TTL_HOURS")
            .unwrap_or_else(|_| "24".into())
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid TOKEN_TTL_HOURS: {}", e))?;

        if protected_routes.is_empty() {
            anyhow::bail!("PROTECTED_ROUTES must name at least one pattern");
        }

        Ok(Self {
            host,
            port,
            database_url,
            jwt_secret,
            cors_origins,
            sign_in_url,
            protected_routes,
            session_cookie,
            token_ttl_hours,
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
