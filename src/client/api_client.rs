use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

use super::resource::Resource;
use crate::models::{AuthResponse, ErrorBody, LoginRequest, RegisterRequest, User};

#[derive(Error, Debug)]
pub enum ClientError {
    /// The request never produced a usable response
    #[error("{0}")]
    Http(#[from] reqwest::Error),
    /// The server answered with a non-2xx status
    #[error("{message}")]
    Api { status: u16, message: String },
    /// The base URL cannot address a resource
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            ClientError::Api { status, .. } => Some(*status),
            ClientError::InvalidUrl(_) => None,
        }
    }
}

pub type ClientResult<T> = Result<T, ClientError>;

/// HTTP access to the persons/interactions API for one signed-in session.
///
/// The bearer token can be swapped at runtime; every request reads the
/// current value.
pub struct ApiClient {
    http: Client,
    base_url: String,
    token: Mutex<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_http(Client::new(), base_url)
    }

    pub fn with_http(http: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http,
            base_url,
            token: Mutex::new(None),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn token(&self) -> Option<String> {
        self.token.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }

    pub fn is_authenticated(&self) -> bool {
        self.token().is_some()
    }

    // ==================== Auth ====================

    /// Create an account and keep its token for subsequent requests
    pub async fn register(&self, request: &RegisterRequest) -> ClientResult<User> {
        let req = self.http.post(self.url("/api/auth/register")).json(request);
        let auth: AuthResponse = self.execute_json(req, "Failed to register").await?;
        self.set_token(Some(auth.token));
        Ok(auth.user)
    }

    /// Sign in and keep the token for subsequent requests
    pub async fn login(&self, username: &str, password: &str) -> ClientResult<User> {
        let body = LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        };
        let req = self.http.post(self.url("/api/auth/login")).json(&body);
        let auth: AuthResponse = self.execute_json(req, "Failed to sign in").await?;
        self.set_token(Some(auth.token));
        Ok(auth.user)
    }

    pub async fn me(&self) -> ClientResult<User> {
        let req = self.http.get(self.url("/api/auth/me"));
        self.execute_json(req, "Failed to load user").await
    }

    // ==================== Resources ====================

    pub async fn list<R: Resource>(&self, filter: Option<&str>) -> ClientResult<Vec<R>> {
        let mut req = self.http.get(self.url(R::PATH));
        if let (Some(param), Some(value)) = (R::FILTER_PARAM, filter) {
            req = req.query(&[(param, value)]);
        }
        self.execute_json(req, &format!("Failed to fetch {}", R::PLURAL))
            .await
    }

    pub async fn create<R: Resource>(&self, draft: &R::Draft) -> ClientResult<R> {
        let req = self.http.post(self.url(R::PATH)).json(draft);
        self.execute_json(req, &format!("Failed to create {}", R::SINGULAR))
            .await
    }

    pub async fn update<R: Resource>(&self, id: &str, patch: &R::Patch) -> ClientResult<R> {
        let req = self.http.patch(self.item_url::<R>(id)?).json(patch);
        self.execute_json(req, &format!("Failed to update {}", R::SINGULAR))
            .await
    }

    pub async fn delete<R: Resource>(&self, id: &str) -> ClientResult<()> {
        let req = self.http.delete(self.item_url::<R>(id)?);
        self.execute(req, &format!("Failed to delete {}", R::SINGULAR))
            .await?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `<base><PATH>/<id>` with `id` as one encoded path segment.
    fn item_url<R: Resource>(&self, id: &str) -> ClientResult<Url> {
        let mut url = Url::parse(&self.url(R::PATH))
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| ClientError::InvalidUrl(self.base_url.clone()))?
            .push(id);
        Ok(url)
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        fallback: &str,
    ) -> ClientResult<T> {
        let resp = self.execute(req, fallback).await?;
        Ok(resp.json::<T>().await?)
    }

    /// Send with the current token. Non-2xx answers become `ClientError::Api`
    /// carrying the server's `error` text, or `fallback` when there is none.
    async fn execute(&self, req: RequestBuilder, fallback: &str) -> ClientResult<Response> {
        let req = match self.token() {
            Some(token) => req.bearer_auth(token),
            None => req,
        };

        let resp = req.send().await?;
        if resp.status().is_success() {
            return Ok(resp);
        }

        let status = resp.status().as_u16();
        let message = resp
            .json::<ErrorBody>()
            .await
            .ok()
            .map(|body| body.error)
            .filter(|msg| !msg.is_empty())
            .unwrap_or_else(|| fallback.to_string());

        Err(ClientError::Api { status, message })
    }
}
