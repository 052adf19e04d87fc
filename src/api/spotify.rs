//! Spotify Web API: OAuth authorization-code flow with a token cache, and
//! the personal top tracks / top artists endpoints.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use colored::*;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::Mutex;

use super::{send_with_backoff, ApiError, Backoff};

const ACCOUNTS_BASE: &str = "https://accounts.spotify.com";
const API_BASE: &str = "https://api.spotify.com/v1";

/// Largest page the top-items endpoints accept.
pub const MAX_TOP_ITEMS: u32 = 50;

pub const SCOPES: &[&str] = &[
    "user-library-read",
    "user-top-read",
    "playlist-read-private",
    "user-read-recently-played",
    "user-read-playback-state",
    "user-read-currently-playing",
];

// Refresh slightly before the advertised expiry.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no authorization code found in the redirect URL")]
    MissingCode,

    #[error("access token expired and no refresh token is available")]
    NoRefreshToken,

    #[error("authorization denied: {0}")]
    Denied(String),

    #[error("token endpoint answered HTTP {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("token cache {path}: {reason}")]
    Cache { path: PathBuf, reason: String },

    #[error("token request failed: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// Ranking window for the top-items endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum TimeRange {
    /// About the last 4 weeks
    Short,
    /// About the last 6 months
    Medium,
    /// All-time
    #[default]
    Long,
}

impl TimeRange {
    pub fn as_param(&self) -> &'static str {
        match self {
            Self::Short => "short_term",
            Self::Medium => "medium_term",
            Self::Long => "long_term",
        }
    }
}

/// The streaming service as seen by the sync job.
#[async_trait]
pub trait StreamingApi: Send + Sync {
    /// Make sure a usable access token is available.
    async fn authenticate(&self) -> Result<(), AuthError>;

    /// Raw track objects, most listened first.
    async fn top_tracks(&self, limit: u32, range: TimeRange) -> Result<Vec<Value>, ApiError>;

    /// Raw artist objects, most listened first.
    async fn top_artists(&self, limit: u32, range: TimeRange) -> Result<Vec<Value>, ApiError>;
}

// ---------------------------------------------------------------------------
// Token cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedToken {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Unix timestamp, seconds.
    pub expires_at: i64,
    #[serde(default)]
    pub scope: Option<String>,
}

impl CachedToken {
    pub fn is_fresh(&self, now: i64) -> bool {
        self.expires_at - EXPIRY_MARGIN_SECS > now
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
    refresh_token: Option<String>,
    scope: Option<String>,
}

impl TokenResponse {
    /// Spotify omits the refresh token on refresh grants; keep the old one.
    fn into_cached(self, previous_refresh: Option<String>, now: i64) -> CachedToken {
        CachedToken {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or(previous_refresh),
            expires_at: now + self.expires_in,
            scope: self.scope,
        }
    }
}

pub fn load_cached_token(path: &Path) -> Result<Option<CachedToken>, AuthError> {
    if !path.exists() {
        return Ok(None);
    }
    let cache_err = |reason: String| AuthError::Cache {
        path: path.to_path_buf(),
        reason,
    };
    let raw = std::fs::read_to_string(path).map_err(|e| cache_err(e.to_string()))?;
    match serde_json::from_str(&raw) {
        Ok(token) => Ok(Some(token)),
        Err(e) => {
            // A corrupt cache only costs a re-authorization.
            tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable token cache");
            Ok(None)
        }
    }
}

pub fn save_cached_token(path: &Path, token: &CachedToken) -> Result<(), AuthError> {
    let cache_err = |reason: String| AuthError::Cache {
        path: path.to_path_buf(),
        reason,
    };
    let raw = serde_json::to_string_pretty(token).map_err(|e| cache_err(e.to_string()))?;
    std::fs::write(path, raw).map_err(|e| cache_err(e.to_string()))
}

// ---------------------------------------------------------------------------
// Authorization code flow helpers
// ---------------------------------------------------------------------------

pub fn authorize_url(accounts_base: &str, client_id: &str, redirect_uri: &str) -> String {
    format!(
        "{}/authorize?client_id={}&response_type=code&redirect_uri={}&scope={}",
        accounts_base,
        urlencoding::encode(client_id),
        urlencoding::encode(redirect_uri),
        urlencoding::encode(&SCOPES.join(" ")),
    )
}

/// Pull the `code` parameter out of the URL the browser was redirected to.
pub fn extract_code(redirected: &str) -> Result<String, AuthError> {
    let url = Url::parse(redirected.trim()).map_err(|_| AuthError::MissingCode)?;
    let mut code = None;
    for (name, value) in url.query_pairs() {
        match name.as_ref() {
            "code" if !value.is_empty() => code = Some(value.into_owned()),
            "error" => return Err(AuthError::Denied(value.into_owned())),
            _ => {}
        }
    }
    code.ok_or(AuthError::MissingCode)
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SpotifyCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub refresh_token: Option<String>,
}

pub struct SpotifyClient {
    http: Client,
    credentials: SpotifyCredentials,
    cache_path: PathBuf,
    accounts_base: String,
    api_base: String,
    backoff: Backoff,
    token: Mutex<Option<CachedToken>>,
}

impl SpotifyClient {
    pub fn new(
        http: Client,
        credentials: SpotifyCredentials,
        cache_path: PathBuf,
        backoff: Backoff,
    ) -> Self {
        Self {
            http,
            credentials,
            cache_path,
            accounts_base: ACCOUNTS_BASE.to_string(),
            api_base: API_BASE.to_string(),
            backoff,
            token: Mutex::new(None),
        }
    }

    async fn request_token(
        &self,
        form: &[(&str, &str)],
        previous_refresh: Option<String>,
    ) -> Result<CachedToken, AuthError> {
        let resp = self
            .http
            .post(format!("{}/api/token", self.accounts_base))
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(form)
            .send()
            .await?;

        let status = resp.status().as_u16();
        let body = resp.text().await?;
        if status != 200 {
            return Err(AuthError::Rejected { status, body });
        }
        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| AuthError::Rejected {
            status,
            body: format!("unexpected token payload: {}", e),
        })?;

        let token = parsed.into_cached(previous_refresh, Utc::now().timestamp());
        save_cached_token(&self.cache_path, &token)?;
        Ok(token)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<CachedToken, AuthError> {
        tracing::info!("refreshing spotify access token");
        self.request_token(
            &[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
            ],
            Some(refresh_token.to_string()),
        )
        .await
    }

    async fn authorize_interactively(&self) -> Result<CachedToken, AuthError> {
        let url = authorize_url(
            &self.accounts_base,
            &self.credentials.client_id,
            &self.credentials.redirect_uri,
        );
        println!("{}", "Spotify authorization required.".yellow().bold());
        println!("  Open this URL and approve access:");
        println!("  {}", url.bright_cyan());
        print!("  Paste the URL you were redirected to: ");
        io::stdout().flush().ok();

        let mut line = String::new();
        io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| AuthError::Transport(e.to_string()))?;
        let code = extract_code(&line)?;

        self.request_token(
            &[
                ("grant_type", "authorization_code"),
                ("code", code.as_str()),
                ("redirect_uri", self.credentials.redirect_uri.as_str()),
            ],
            None,
        )
        .await
    }

    /// A fresh access token, refreshing the cached one when it has expired.
    async fn access_token(&self) -> Result<String, ApiError> {
        let mut guard = self.token.lock().await;
        let now = Utc::now().timestamp();
        match guard.as_ref() {
            Some(token) if token.is_fresh(now) => return Ok(token.access_token.clone()),
            _ => {}
        }

        let refresh_token = guard
            .as_ref()
            .and_then(|t| t.refresh_token.clone())
            .or_else(|| self.credentials.refresh_token.clone())
            .ok_or(AuthError::NoRefreshToken)?;
        let token = self.refresh(&refresh_token).await?;
        let access = token.access_token.clone();
        *guard = Some(token);
        Ok(access)
    }

    async fn top_items(
        &self,
        kind: &str,
        limit: u32,
        range: TimeRange,
    ) -> Result<Vec<Value>, ApiError> {
        let token = self.access_token().await?;
        let url = format!("{}/me/top/{}", self.api_base, kind);
        let limit = limit.clamp(1, MAX_TOP_ITEMS).to_string();
        let request = || {
            self.http
                .get(&url)
                .bearer_auth(&token)
                .query(&[("limit", limit.as_str()), ("time_range", range.as_param())])
        };

        let resp = send_with_backoff(request, &self.backoff).await?;
        let status = resp.status().as_u16();
        if status != 200 {
            return Err(ApiError::Status {
                service: "spotify",
                status,
            });
        }
        let body: Value = resp.json().await?;
        take_items(body)
    }
}

fn take_items(mut body: Value) -> Result<Vec<Value>, ApiError> {
    match body.get_mut("items").map(Value::take) {
        Some(Value::Array(items)) => Ok(items),
        _ => Err(ApiError::Decode {
            service: "spotify",
            reason: "response has no items array".to_string(),
        }),
    }
}

#[async_trait]
impl StreamingApi for SpotifyClient {
    async fn authenticate(&self) -> Result<(), AuthError> {
        let mut guard = self.token.lock().await;
        let now = Utc::now().timestamp();
        let cached = load_cached_token(&self.cache_path)?;

        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh(now)) {
            tracing::debug!(path = %self.cache_path.display(), "using cached spotify token");
            *guard = Some(token.clone());
            return Ok(());
        }

        let refresh_token = cached
            .and_then(|t| t.refresh_token)
            .or_else(|| self.credentials.refresh_token.clone());

        let token = match refresh_token {
            Some(ref refresh_token) => self.refresh(refresh_token).await?,
            None => self.authorize_interactively().await?,
        };
        *guard = Some(token);
        Ok(())
    }

    async fn top_tracks(&self, limit: u32, range: TimeRange) -> Result<Vec<Value>, ApiError> {
        self.top_items("tracks", limit, range).await
    }

    async fn top_artists(&self, limit: u32, range: TimeRange) -> Result<Vec<Value>, ApiError> {
        self.top_items("artists", limit, range).await
    }
}
