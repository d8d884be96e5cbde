//! Request filter in front of the protected dashboard area.
//!
//! Every request whose path matches a protected pattern must carry a session
//! the identity provider vouches for; otherwise the client is sent to the
//! sign-in surface with a `redirect_url` pointing back at the original
//! destination. Provider failures deny access.

use std::future::{Ready, ready};
use std::rc::Rc;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_service::{Service, Transform};
use actix_web::body::EitherBody;
use actix_web::cookie::{Cookie, SameSite};
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::http::header::{self, HeaderMap};
use actix_web::{Error, HttpMessage, HttpResponse};
use async_trait::async_trait;
use futures_util::future::LocalBoxFuture;
use thiserror::Error;
use tracing::{debug, warn};
use url::form_urlencoded;
use uuid::Uuid;

use crate::data::user_repository::UserRepository;
use crate::infrastructure::security::JwtKeys;
use crate::presentation::utils::AuthenticatedUser;

#[derive(Debug, Clone, PartialEq, Eq)]
enum RoutePattern {
    Exact(String),
    Prefix(String),
}

/// Classifies paths as protected or public.
///
/// A pattern is a literal path, optionally ending in `(.*)` to also match
/// anything that follows it: `/dashboard(.*)` covers `/dashboard`,
/// `/dashboard/posts` and also `/dashboards`.
#[derive(Debug, Clone)]
pub struct RouteMatcher {
    patterns: Vec<RoutePattern>,
}

impl RouteMatcher {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| {
                let p = p.as_ref();
                match p.strip_suffix("(.*)") {
                    Some(prefix) => RoutePattern::Prefix(prefix.to_string()),
                    None => RoutePattern::Exact(p.to_string()),
                }
            })
            .collect();
        Self { patterns }
    }

    pub fn is_protected(&self, path: &str) -> bool {
        self.patterns.iter().any(|pattern| match pattern {
            RoutePattern::Exact(p) => path == p,
            RoutePattern::Prefix(p) => path.starts_with(p.as_str()),
        })
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// The identity collaborator: who, if anyone, does this session token belong to.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn session_subject(&self, token: Option<&str>) -> Result<Option<Uuid>, SessionError>;
}

/// Verifies JWT session tokens and confirms the subject still exists.
pub struct JwtSessionProvider {
    keys: JwtKeys,
    users: Arc<dyn UserRepository>,
}

impl JwtSessionProvider {
    pub fn new(keys: JwtKeys, users: Arc<dyn UserRepository>) -> Self {
        Self { keys, users }
    }
}

#[async_trait]
impl SessionProvider for JwtSessionProvider {
    async fn session_subject(&self, token: Option<&str>) -> Result<Option<Uuid>, SessionError> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(None);
        };
        let subject = match self.keys.verify_token(token) {
            Ok(claims) => claims.subject(),
            Err(err) => {
                debug!(error = %err, "rejected session token");
                return Ok(None);
            }
        };
        let Some(id) = subject else {
            return Ok(None);
        };

        let user = self
            .users
            .find_by_id(id)
            .await
            .map_err(|e| SessionError::Unavailable(e.to_string()))?;
        Ok(user.map(|u| u.id))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Allow(Option<Uuid>),
    Redirect(String),
}

pub struct SessionGate {
    matcher: RouteMatcher,
    provider: Arc<dyn SessionProvider>,
    sign_in_url: String,
    cookie_name: String,
}

impl SessionGate {
    pub fn new(
        matcher: RouteMatcher,
        provider: Arc<dyn SessionProvider>,
        sign_in_url: impl Into<String>,
        cookie_name: impl Into<String>,
    ) -> Self {
        Self {
            matcher,
            provider,
            sign_in_url: sign_in_url.into(),
            cookie_name: cookie_name.into(),
        }
    }

    pub fn provider(&self) -> &Arc<dyn SessionProvider> {
        &self.provider
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Tries each candidate token in turn; the first one the provider vouches
    /// for wins. A provider error only counts when no candidate succeeds.
    pub async fn subject(&self, tokens: &[String]) -> Result<Option<Uuid>, SessionError> {
        let mut failure = None;
        for token in tokens {
            match self.provider.session_subject(Some(token)).await {
                Ok(Some(subject)) => return Ok(Some(subject)),
                Ok(None) => {}
                Err(err) => failure = Some(err),
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(None),
        }
    }

    /// `target` is the path and query of the request being filtered.
    pub async fn check(&self, path: &str, target: &str, tokens: &[String]) -> GateDecision {
        if !self.matcher.is_protected(path) {
            return GateDecision::Allow(None);
        }
        match self.subject(tokens).await {
            Ok(Some(subject)) => GateDecision::Allow(Some(subject)),
            Ok(None) => GateDecision::Redirect(self.sign_in_location(target)),
            Err(err) => {
                warn!(error = %err, path, "session check failed, denying access");
                GateDecision::Redirect(self.sign_in_location(target))
            }
        }
    }

    pub fn sign_in_location(&self, return_to: &str) -> String {
        let encoded: String = form_urlencoded::byte_serialize(return_to.as_bytes()).collect();
        let separator = if self.sign_in_url.contains('?') { '&' } else { '?' };
        format!("{}{}redirect_url={}", self.sign_in_url, separator, encoded)
    }

    pub fn session_cookie(&self, token: String, max_age: chrono::Duration) -> Cookie<'static> {
        Cookie::build(self.cookie_name.clone(), token)
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .max_age(actix_web::cookie::time::Duration::seconds(
                max_age.num_seconds(),
            ))
            .finish()
    }

    pub fn expired_cookie(&self) -> Cookie<'static> {
        let mut cookie = Cookie::build(self.cookie_name.clone(), "").path("/").finish();
        cookie.make_removal();
        cookie
    }
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Candidate session tokens for a page request: the session cookie first,
/// then a bearer header.
pub fn session_tokens(headers: &HeaderMap, cookie: Option<Cookie<'_>>) -> Vec<String> {
    cookie
        .map(|c| c.value().to_string())
        .filter(|t| !t.is_empty())
        .into_iter()
        .chain(bearer_token(headers))
        .collect()
}

pub struct SessionGateMiddleware {
    gate: Arc<SessionGate>,
}

impl SessionGateMiddleware {
    pub fn new(gate: Arc<SessionGate>) -> Self {
        Self { gate }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SessionGateMiddleware
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type InitError = ();
    type Transform = SessionGateService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SessionGateService {
            service: Rc::new(service),
            gate: Arc::clone(&self.gate),
        }))
    }
}

pub struct SessionGateService<S> {
    service: Rc<S>,
    gate: Arc<SessionGate>,
}

impl<S, B> Service<ServiceRequest> for SessionGateService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let gate = Arc::clone(&self.gate);

        Box::pin(async move {
            let path = req.path().to_owned();
            let target = req
                .uri()
                .path_and_query()
                .map(|pq| pq.as_str().to_owned())
                .unwrap_or_else(|| path.clone());
            let tokens = session_tokens(req.headers(), req.cookie(gate.cookie_name()));

            match gate.check(&path, &target, &tokens).await {
                GateDecision::Allow(subject) => {
                    if let Some(id) = subject {
                        req.extensions_mut().insert(AuthenticatedUser { id });
                    }
                    let res = service.call(req).await?;
                    Ok(res.map_into_left_body())
                }
                GateDecision::Redirect(location) => {
                    debug!(path = %path, "redirecting to sign-in");
                    let response = HttpResponse::TemporaryRedirect()
                        .insert_header((header::LOCATION, location))
                        .finish();
                    Ok(req.into_response(response).map_into_right_body())
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::memory::InMemoryUserRepository;
    use crate::domain::user::User;
    use actix_web::{App, HttpResponse, http::StatusCode, test, web};
    use chrono::Duration;

    struct FailingProvider;

    #[async_trait]
    impl SessionProvider for FailingProvider {
        async fn session_subject(
            &self,
            _token: Option<&str>,
        ) -> Result<Option<Uuid>, SessionError> {
            Err(SessionError::Unavailable("provider timeout".into()))
        }
    }

    fn keys() -> JwtKeys {
        JwtKeys::new("gate-secret".into(), Duration::hours(1))
    }

    async fn jwt_gate() -> (Arc<SessionGate>, Arc<InMemoryUserRepository>, Uuid) {
        let users = Arc::new(InMemoryUserRepository::default());
        let user = users
            .create(User::new(None, "gate@x.io".into(), "hash".into()))
            .await
            .unwrap();
        let provider = Arc::new(JwtSessionProvider::new(keys(), users.clone()));
        let gate = SessionGate::new(
            RouteMatcher::new(["/dashboard(.*)"]),
            provider,
            "/sign-in",
            "cms_session",
        );
        (Arc::new(gate), users, user.id)
    }

    #[::core::prelude::v1::test]
    fn matcher_handles_prefix_and_exact_patterns() {
        let matcher = RouteMatcher::new(["/dashboard(.*)", "/settings"]);
        assert!(matcher.is_protected("/dashboard"));
        assert!(matcher.is_protected("/dashboard/posts/1"));
        assert!(matcher.is_protected("/settings"));
        assert!(!matcher.is_protected("/settings/other"));
        assert!(!matcher.is_protected("/"));
        assert!(!matcher.is_protected("/api/posts"));
    }

    #[actix_web::test]
    async fn sign_in_location_encodes_the_destination() {
        let (gate, _, _) = jwt_gate().await;
        assert_eq!(
            gate.sign_in_location("/dashboard/posts?tab=drafts"),
            "/sign-in?redirect_url=%2Fdashboard%2Fposts%3Ftab%3Ddrafts"
        );
    }

    #[actix_web::test]
    async fn public_paths_never_consult_the_provider() {
        let gate = SessionGate::new(
            RouteMatcher::new(["/dashboard(.*)"]),
            Arc::new(FailingProvider),
            "/sign-in",
            "cms_session",
        );
        assert_eq!(
            gate.check("/api/posts", "/api/posts", &[]).await,
            GateDecision::Allow(None)
        );
    }

    #[actix_web::test]
    async fn provider_failure_fails_closed() {
        let gate = SessionGate::new(
            RouteMatcher::new(["/dashboard(.*)"]),
            Arc::new(FailingProvider),
            "https://auth.example.com/sign-in?app=cms",
            "cms_session",
        );
        let decision = gate
            .check("/dashboard", "/dashboard", &["anything".to_string()])
            .await;
        assert_eq!(
            decision,
            GateDecision::Redirect(
                "https://auth.example.com/sign-in?app=cms&redirect_url=%2Fdashboard".into()
            )
        );
    }

    #[actix_web::test]
    async fn token_for_deleted_user_is_no_session() {
        let (gate, _, _) = jwt_gate().await;
        let stranger = keys().generate_token(Uuid::new_v4()).unwrap();
        assert!(matches!(
            gate.check("/dashboard", "/dashboard", &[stranger]).await,
            GateDecision::Redirect(_)
        ));
    }

    #[actix_web::test]
    async fn store_outage_denies_a_valid_token() {
        let (gate, users, user_id) = jwt_gate().await;
        let token = keys().generate_token(user_id).unwrap();
        users.set_unavailable(true);
        assert!(matches!(
            gate.check("/dashboard", "/dashboard", &[token]).await,
            GateDecision::Redirect(_)
        ));
    }

    async fn whoami(user: AuthenticatedUser) -> HttpResponse {
        HttpResponse::Ok().body(user.id.to_string())
    }

    #[actix_web::test]
    async fn middleware_redirects_or_forwards() {
        let (gate, _, user_id) = jwt_gate().await;
        let app = test::init_service(
            App::new()
                .wrap(SessionGateMiddleware::new(gate))
                .route("/dashboard/me", web::get().to(whoami))
                .route("/", web::get().to(|| async { HttpResponse::Ok().finish() })),
        )
        .await;

        let resp =
            test::call_service(&app, test::TestRequest::get().uri("/").to_request()).await;
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = test::call_service(
            &app,
            test::TestRequest::get().uri("/dashboard/me?x=1").to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(
            resp.headers().get(header::LOCATION).unwrap(),
            "/sign-in?redirect_url=%2Fdashboard%2Fme%3Fx%3D1"
        );

        let token = keys().generate_token(user_id).unwrap();
        let req = test::TestRequest::get()
            .uri("/dashboard/me")
            .cookie(Cookie::new("cms_session", token))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, user_id.to_string().as_bytes());
    }

    #[actix_web::test]
    async fn stale_bearer_does_not_shadow_a_valid_cookie() {
        let (gate, _, user_id) = jwt_gate().await;
        let app = test::init_service(
            App::new()
                .wrap(SessionGateMiddleware::new(gate))
                .route("/dashboard/me", web::get().to(whoami)),
        )
        .await;

        let token = keys().generate_token(user_id).unwrap();
        let req = test::TestRequest::get()
            .uri("/dashboard/me")
            .insert_header((header::AUTHORIZATION, "Bearer expired.or.bogus"))
            .cookie(Cookie::new("cms_session", token.clone()))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, user_id.to_string().as_bytes());

        // and a good bearer still works behind a stale cookie
        let req = test::TestRequest::get()
            .uri("/dashboard/me")
            .insert_header((header::AUTHORIZATION, format!("Bearer {token}")))
            .cookie(Cookie::new("cms_session", "stale"))
            .to_request();
        let body = test::call_and_read_body(&app, req).await;
        assert_eq!(body, user_id.to_string().as_bytes());
    }

    #[actix_web::test]
    async fn cookie_is_tried_before_bearer() {
        let req = test::TestRequest::get()
            .insert_header((header::AUTHORIZATION, "Bearer from-header"))
            .to_http_request();
        let tokens = session_tokens(req.headers(), Some(Cookie::new("cms_session", "from-cookie")));
        assert_eq!(tokens, vec!["from-cookie".to_string(), "from-header".to_string()]);
        assert_eq!(
            session_tokens(req.headers(), Some(Cookie::new("cms_session", ""))),
            vec!["from-header".to_string()]
        );
    }
}
