//! HTTP client that holds the session token and reconciles it on start-up.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::auth::dto::{AuthResponse, CurrentUserResponse, ProtectedResponse, PublicUser};

mod token_store;

pub use token_store::{FileTokenStore, MemoryTokenStore, TokenStore};

/// Tracing target for client operations.
pub const TRACING_TARGET: &str = "tokenauth::client";

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("response decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("token storage error: {0}")]
    Storage(#[from] std::io::Error),
    /// Non-success status; `message` is the server's `error` field when present.
    #[error("server returned {status}: {message}")]
    Api { status: u16, message: String },
    #[error("no stored session")]
    NoSession,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct LoginBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Clone)]
pub struct SessionClient {
    http: Client,
    base_url: String,
    tokens: Arc<dyn TokenStore>,
}

impl std::fmt::Debug for SessionClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl SessionClient {
    pub fn new(base_url: impl Into<String>, tokens: Arc<dyn TokenStore>) -> Result<Self> {
        let http = Client::builder().timeout(Duration::from_secs(10)).build()?;
        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Reads the stored token and asks the server who it belongs to.
    ///
    /// Keeps the token when the server recognizes it, discards it when the
    /// server answers `{"user": null}`. Transport failures leave the stored
    /// token untouched.
    pub async fn bootstrap(&self) -> Result<Option<PublicUser>> {
        let Some(token) = self.tokens.load().await? else {
            tracing::debug!(target: TRACING_TARGET, "no stored token");
            return Ok(None);
        };

        let res: CurrentUserResponse = self
            .send_json(self.http.get(self.url("/me")).bearer_auth(&token))
            .await?;

        match res.user {
            Some(user) => {
                tracing::info!(target: TRACING_TARGET, user_id = %user.id, "session restored");
                Ok(Some(user))
            }
            None => {
                tracing::info!(target: TRACING_TARGET, "stored token rejected; discarding");
                self.tokens.clear().await?;
                Ok(None)
            }
        }
    }

    pub async fn register(&self, name: &str, email: &str, password: &str) -> Result<PublicUser> {
        let body = RegisterBody {
            name,
            email,
            password,
        };
        let res: AuthResponse = self
            .send_json(self.http.post(self.url("/register")).json(&body))
            .await?;
        self.tokens.save(&res.token).await?;
        Ok(res.user)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<PublicUser> {
        let body = LoginBody { email, password };
        let res: AuthResponse = self
            .send_json(self.http.post(self.url("/login")).json(&body))
            .await?;
        self.tokens.save(&res.token).await?;
        Ok(res.user)
    }

    /// Tokens are stateless, so logging out only forgets the local copy.
    pub async fn logout(&self) -> Result<()> {
        self.tokens.clear().await?;
        Ok(())
    }

    pub async fn protected(&self) -> Result<ProtectedResponse> {
        let token = self.tokens.load().await?.ok_or(ClientError::NoSession)?;
        self.send_json(self.http.get(self.url("/protected")).bearer_auth(&token))
            .await
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let res = req.send().await?;
        let bytes = check_status(res).await?.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

async fn check_status(res: Response) -> Result<Response> {
    let status = res.status();
    if status.is_success() {
        return Ok(res);
    }
    let text = res.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or(text);
    tracing::warn!(target: TRACING_TARGET, status = status.as_u16(), %message, "request failed");
    Err(ClientError::Api {
        status: status.as_u16(),
        message,
    })
}
