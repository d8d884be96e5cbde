use crate::error::CmsClientError;
use crate::model::{CurrentUser, Post, PostPayload};
use crate::{PostStore, UserStore};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, redirect};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;
use uuid::Uuid;

pub const DEFAULT_TOKEN_FILE: &str = ".cms_token";

/// REST transport. Cheap to clone; clones share the session token.
#[derive(Clone)]
pub struct CmsClientHttp {
    client: Client,
    base_url: String,
    token: Arc<RwLock<Option<String>>>,
    token_file: PathBuf,
}

#[derive(Debug, Deserialize)]
struct PostsResponse {
    posts: Vec<Post>,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    access_token: String,
    expires_in: i64,
    token_type: String,
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct UsernameBody<'a> {
    username: &'a str,
}

impl CmsClientHttp {
    pub async fn connect(endpoint: &str) -> Result<Self, CmsClientError> {
        Self::connect_with_token_file(endpoint, DEFAULT_TOKEN_FILE).await
    }

    /// Connects and picks up a token saved by an earlier login, if any.
    pub async fn connect_with_token_file(
        endpoint: &str,
        token_file: impl AsRef<Path>,
    ) -> Result<Self, CmsClientError> {
        let base_url = endpoint.trim_end_matches('/').to_string();
        let token_file = token_file.as_ref().to_path_buf();
        let token = match tokio::fs::read_to_string(&token_file).await {
            Ok(t) => Some(t.trim().to_string()).filter(|t| !t.is_empty()),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(err) => return Err(err.into()),
        };
        let client = Client::builder().redirect(redirect::Policy::none()).build()?;

        Ok(Self {
            client,
            base_url,
            token: Arc::new(RwLock::new(token)),
            token_file,
        })
    }

    pub fn token(&self) -> Option<String> {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn set_token(&self, token: String) -> Result<(), CmsClientError> {
        tokio::fs::write(&self.token_file, &token).await?;
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn with_auth(&self, req: RequestBuilder) -> Result<RequestBuilder, CmsClientError> {
        let token = self.token().ok_or(CmsClientError::Unauthorized)?;
        Ok(req.bearer_auth(token))
    }

    fn with_optional_auth(&self, req: RequestBuilder) -> RequestBuilder {
        match self.token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T, CmsClientError> {
        if resp.status().is_success() {
            Ok(resp.json().await?)
        } else {
            Err(CmsClientError::from_http_response(resp).await)
        }
    }

    pub async fn register(
        &self,
        username: Option<&str>,
        email: &str,
        password: &str,
    ) -> Result<(), CmsClientError> {
        let resp = self
            .client
            .post(self.url("/api/auth/register"))
            .json(&RegisterBody {
                username,
                email,
                password,
            })
            .send()
            .await?;

        let auth: AuthResponse = Self::read_json(resp).await?;
        debug!(expires_in = auth.expires_in, token_type = %auth.token_type, "registered");
        self.set_token(auth.access_token).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<(), CmsClientError> {
        let resp = self
            .client
            .post(self.url("/api/auth/login"))
            .json(&LoginBody { email, password })
            .send()
            .await?;

        let auth: AuthResponse = Self::read_json(resp).await?;
        debug!(expires_in = auth.expires_in, token_type = %auth.token_type, "logged in");
        self.set_token(auth.access_token).await
    }

    /// Forgets the local session. The server call only clears its cookie, so
    /// a failure there is not fatal.
    pub async fn logout(&self) -> Result<(), CmsClientError> {
        if let Err(err) = self.client.post(self.url("/api/auth/logout")).send().await {
            debug!(error = %err, "logout request failed");
        }
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
        match tokio::fs::remove_file(&self.token_file).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub async fn list_posts(
        &self,
        limit: Option<u32>,
        offset: Option<u32>,
    ) -> Result<Vec<Post>, CmsClientError> {
        let limit = limit.unwrap_or(10).min(100);
        let offset = offset.unwrap_or(0);
        let resp = self
            .client
            .get(self.url("/api/posts"))
            .query(&[("limit", limit), ("offset", offset)])
            .send()
            .await?;

        let posts: PostsResponse = Self::read_json(resp).await?;
        Ok(posts.posts)
    }

    pub async fn get_post(&self, id: Uuid) -> Result<Post, CmsClientError> {
        let req = self.client.get(self.url(&format!("/api/posts/{id}")));
        let resp = self.with_optional_auth(req).send().await?;
        Self::read_json(resp).await
    }

    /// Everything the signed-in author wrote, drafts included.
    pub async fn my_posts(&self) -> Result<Vec<Post>, CmsClientError> {
        let req = self.with_auth(self.client.get(self.url("/dashboard/posts")))?;
        let posts: PostsResponse = Self::read_json(req.send().await?).await?;
        Ok(posts.posts)
    }

    pub async fn my_post(&self, id: Uuid) -> Result<Post, CmsClientError> {
        let req = self.with_auth(self.client.get(self.url(&format!("/dashboard/posts/{id}"))))?;
        Self::read_json(req.send().await?).await
    }

    pub async fn delete_post(&self, id: Uuid) -> Result<(), CmsClientError> {
        let req = self.with_auth(self.client.delete(self.url(&format!("/api/posts/{id}"))))?;
        let resp = req.send().await?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(CmsClientError::from_http_response(resp).await)
        }
    }
}

#[async_trait]
impl PostStore for CmsClientHttp {
    async fn create_post(&self, payload: &PostPayload) -> Result<Post, CmsClientError> {
        let req = self.with_auth(self.client.post(self.url("/api/posts")))?;
        let resp = req.json(payload).send().await?;
        Self::read_json(resp).await
    }

    async fn update_post(&self, id: Uuid, payload: &PostPayload) -> Result<Post, CmsClientError> {
        let req = self.with_auth(self.client.put(self.url(&format!("/api/posts/{id}"))))?;
        let resp = req.json(payload).send().await?;
        Self::read_json(resp).await
    }
}

#[async_trait]
impl UserStore for CmsClientHttp {
    async fn current_user(&self) -> Result<CurrentUser, CmsClientError> {
        let req = self.with_auth(self.client.get(self.url("/api/users/me")))?;
        Self::read_json(req.send().await?).await
    }

    async fn update_username(&self, username: &str) -> Result<CurrentUser, CmsClientError> {
        let req = self.with_auth(self.client.put(self.url("/api/users/me/username")))?;
        let resp = req.json(&UsernameBody { username }).send().await?;
        Self::read_json(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("cms-client-{name}-{}", Uuid::new_v4()))
    }

    #[tokio::test]
    async fn saved_token_is_picked_up_on_connect() {
        let path = token_path("saved");
        tokio::fs::write(&path, "abc.def.ghi\n").await.unwrap();

        let client = CmsClientHttp::connect_with_token_file("http://localhost:1/", &path)
            .await
            .unwrap();
        assert_eq!(client.token().as_deref(), Some("abc.def.ghi"));
        assert_eq!(client.url("/api/posts"), "http://localhost:1/api/posts");

        // server is unreachable; the local session is still cleared
        client.logout().await.unwrap();
        assert!(client.token().is_none());
        assert!(!path.exists());
    }

    #[test]
    fn auth_response_matches_the_server_shape() {
        let auth: AuthResponse = serde_json::from_str(
            r#"{"access_token":"t.o.k","expires_in":86400,"token_type":"Bearer"}"#,
        )
        .unwrap();
        assert_eq!(auth.access_token, "t.o.k");
        assert_eq!(auth.expires_in, 86400);
        assert_eq!(auth.token_type, "Bearer");
    }

    #[tokio::test]
    async fn protected_calls_without_token_fail_before_sending() {
        let client = CmsClientHttp::connect_with_token_file("http://localhost:1", token_path("none"))
            .await
            .unwrap();
        assert!(client.token().is_none());
        assert!(matches!(
            client.my_posts().await,
            Err(CmsClientError::Unauthorized)
        ));
        assert!(matches!(
            client.current_user().await,
            Err(CmsClientError::Unauthorized)
        ));
    }
}
