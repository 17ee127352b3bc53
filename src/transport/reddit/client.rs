//! Reddit OAuth client
//!
//! Script-app authentication (password grant) against `www.reddit.com`,
//! API calls against `oauth.reddit.com`. The access token is cached and
//! refreshed a minute before it expires, or after a 401.

use super::listing::{
    ratelimit_wait, Account, ApiError, CommentResponse, Listing, TokenResponse,
};
use crate::bot::item::{DiscussionItem, Reply};
use crate::config::{RedditCredentials, RedditSection};
use crate::transport::{Transport, TransportError};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

pub const AUTH_BASE_URL: &str = "https://www.reddit.com";
pub const API_BASE_URL: &str = "https://oauth.reddit.com";

const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Authenticated Reddit API client
pub struct RedditClient {
    http: Client,
    credentials: RedditCredentials,
    auth_base_url: String,
    api_base_url: String,
    token: Mutex<Option<AccessToken>>,
}

impl RedditClient {
    pub fn new(
        credentials: RedditCredentials,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let http = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| TransportError::Connection(e.to_string()))?;

        Ok(Self {
            http,
            credentials,
            auth_base_url: AUTH_BASE_URL.to_string(),
            api_base_url: API_BASE_URL.to_string(),
            token: Mutex::new(None),
        })
    }

    pub fn from_config(
        credentials: RedditCredentials,
        section: &RedditSection,
    ) -> Result<Self, TransportError> {
        Self::new(
            credentials,
            &section.user_agent,
            Duration::from_secs(section.request_timeout_secs),
        )
    }

    /// Point the client at other hosts (a mock server in tests)
    pub fn with_base_urls<A: Into<String>, B: Into<String>>(mut self, auth: A, api: B) -> Self {
        self.auth_base_url = auth.into().trim_end_matches('/').to_string();
        self.api_base_url = api.into().trim_end_matches('/').to_string();
        self
    }

    /// Fetch a token and confirm it by asking who we are
    pub async fn authenticate(&self) -> Result<String, TransportError> {
        let request = self.authorized(self.http.get(self.api_url("/api/v1/me"))).await?;
        let account: Account = decode(self.send(request).await?).await?;
        info!(username = %account.name, "Successfully authenticated with Reddit");
        Ok(account.name)
    }

    /// Newest-first items from a listing path such as `/r/python/comments`
    pub async fn listing(
        &self,
        path: &str,
        limit: u32,
    ) -> Result<Vec<DiscussionItem>, TransportError> {
        let request = self
            .http
            .get(self.api_url(path))
            .query(&[("limit", limit.to_string()), ("raw_json", "1".to_string())]);
        let request = self.authorized(request).await?;

        let listing: Listing = decode(self.send(request).await?).await?;
        let mut items = Vec::with_capacity(listing.data.children.len());
        for thing in listing.data.children {
            if let Some(item) = thing
                .into_item()
                .map_err(|e| TransportError::Decode(e.to_string()))?
            {
                items.push(item);
            }
        }
        debug!(path, count = items.len(), "Fetched listing");
        Ok(items)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.api_base_url, path)
    }

    async fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder, TransportError> {
        let token = self.access_token().await?;
        Ok(request.bearer_auth(token))
    }

    async fn access_token(&self) -> Result<String, TransportError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if Instant::now() + TOKEN_REFRESH_MARGIN < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        let token = self.fetch_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn fetch_token(&self) -> Result<AccessToken, TransportError> {
        debug!("Requesting Reddit access token");
        let request = self
            .http
            .post(format!("{}/api/v1/access_token", self.auth_base_url))
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&[
                ("grant_type", "password"),
                ("username", self.credentials.username.as_str()),
                ("password", self.credentials.password.as_str()),
            ]);

        let body: TokenResponse = decode(execute(request).await?).await?;
        match (body.access_token, body.error) {
            (Some(value), None) => Ok(AccessToken {
                value,
                expires_at: Instant::now()
                    + Duration::from_secs(body.expires_in.unwrap_or(3600)),
            }),
            (_, Some(error)) => Err(TransportError::Auth(error)),
            (None, None) => Err(TransportError::Auth(
                "token response carried no access token".to_string(),
            )),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, TransportError> {
        let result = execute(request).await;
        if matches!(result, Err(TransportError::Auth(_))) {
            // Force a fresh token on the next call
            *self.token.lock().await = None;
        }
        result
    }
}

#[async_trait]
impl Transport for RedditClient {
    async fn reply(&self, item: &DiscussionItem, text: &str) -> Result<Reply, TransportError> {
        let fullname = item.fullname();
        let request = self.http.post(self.api_url("/api/comment")).form(&[
            ("api_type", "json"),
            ("raw_json", "1"),
            ("thing_id", fullname.as_str()),
            ("text", text),
        ]);
        let request = self.authorized(request).await?;

        let response: CommentResponse = decode(self.send(request).await?).await?;
        let errors = response.json.api_errors();
        if !errors.is_empty() {
            warn!(item_id = %item.id, errors = ?errors, "Reddit refused the reply");
            return Err(classify_api_errors(&errors));
        }

        let posted = response
            .json
            .data
            .and_then(|data| data.things.into_iter().next())
            .ok_or_else(|| TransportError::Decode("comment response had no things".into()))?;
        Ok(Reply {
            id: posted.data.id,
            fullname: posted.data.name,
        })
    }
}

async fn execute(request: RequestBuilder) -> Result<Response, TransportError> {
    let response = request.send().await.map_err(map_reqwest_error)?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();
    Err(classify_status(status, retry_after, &body))
}

async fn decode<T: serde::de::DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    response
        .json::<T>()
        .await
        .map_err(|e| TransportError::Decode(e.to_string()))
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else if error.is_decode() {
        TransportError::Decode(error.to_string())
    } else {
        TransportError::Connection(error.to_string())
    }
}

/// Map a non-success HTTP status to a transport error (pure)
pub fn classify_status(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &str,
) -> TransportError {
    let message: String = body.chars().take(200).collect();
    match status {
        StatusCode::TOO_MANY_REQUESTS => TransportError::RateLimited { retry_after },
        StatusCode::UNAUTHORIZED => TransportError::Auth(message),
        StatusCode::FORBIDDEN => TransportError::PermissionDenied(message),
        StatusCode::REQUEST_TIMEOUT => TransportError::Timeout(message),
        s if s.is_server_error() => TransportError::Server {
            status: s.as_u16(),
            message,
        },
        s => TransportError::Rejected(format!("{}: {}", s.as_u16(), message)),
    }
}

/// Map the `errors` array of a comment response to a transport error (pure)
pub fn classify_api_errors(errors: &[ApiError]) -> TransportError {
    let Some(first) = errors.first() else {
        return TransportError::Decode("empty error list".to_string());
    };
    let summary = format!("{}: {}", first.code, first.message);

    match first.code.as_str() {
        "RATELIMIT" => TransportError::RateLimited {
            retry_after: ratelimit_wait(&first.message),
        },
        "USER_REQUIRED" => TransportError::Auth(summary),
        code if code.contains("BANNED") || code.contains("NOT_ALLOWED") || code.contains("NOTALLOWED") => {
            TransportError::PermissionDenied(summary)
        }
        _ => TransportError::Rejected(summary),
    }
}
