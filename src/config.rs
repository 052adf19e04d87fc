//! Environment and command-line configuration shared by both jobs.
//!
//! Every setting can come from a flag, an environment variable, or a `.env`
//! file. Call [`load_env`] before parsing arguments so that `.env` values are
//! visible to clap's `env` fallbacks.

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use sqlx::postgres::PgConnectOptions;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),

    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Load the first `.env` found, returning its path.
///
/// Candidates are `$TASTELOG_ENV`, `./.env` and `../.env`. Variables already
/// present in the process environment win over file values.
pub fn load_env() -> Option<PathBuf> {
    let mut candidates = Vec::new();
    if let Ok(explicit) = std::env::var("TASTELOG_ENV") {
        candidates.push(PathBuf::from(explicit));
    }
    candidates.push(PathBuf::from(".env"));
    candidates.push(PathBuf::from("../.env"));

    for path in candidates {
        if path.exists() && dotenvy::from_path(&path).is_ok() {
            return Some(path);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

#[derive(Args, Debug, Clone, Default)]
pub struct DatabaseArgs {
    /// Full connection URL; takes precedence over the discrete settings
    #[arg(long, env = "DATABASE_URL", hide_env_values = true)]
    pub database_url: Option<String>,

    #[arg(long, env = "POSTGRES_HOST")]
    pub db_host: Option<String>,

    #[arg(long, env = "POSTGRES_PORT", default_value = "5432")]
    pub db_port: u16,

    #[arg(long, env = "POSTGRES_DB")]
    pub db_name: Option<String>,

    #[arg(long, env = "POSTGRES_USER")]
    pub db_user: Option<String>,

    #[arg(long, env = "POSTGRES_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,
}

impl DatabaseArgs {
    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        if let Some(url) = self.database_url.as_deref().filter(|u| !u.is_empty()) {
            return url
                .parse::<PgConnectOptions>()
                .map_err(|e| ConfigError::Invalid {
                    name: "DATABASE_URL",
                    reason: e.to_string(),
                });
        }

        let host = self
            .db_host
            .as_deref()
            .ok_or(ConfigError::Missing("DATABASE_URL or POSTGRES_HOST"))?;
        let database = self
            .db_name
            .as_deref()
            .ok_or(ConfigError::Missing("POSTGRES_DB"))?;
        let user = self
            .db_user
            .as_deref()
            .ok_or(ConfigError::Missing("POSTGRES_USER"))?;

        let mut options = PgConnectOptions::new()
            .host(host)
            .port(self.db_port)
            .database(database)
            .username(user);
        if let Some(ref password) = self.db_password {
            options = options.password(password);
        }
        Ok(options)
    }

    /// Host/database pair for the banner; never includes credentials.
    pub fn describe(&self) -> String {
        match self.connect_options() {
            Ok(opts) => format!(
                "{}/{}",
                opts.get_host(),
                opts.get_database().unwrap_or("(default)")
            ),
            Err(_) => "(unconfigured)".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

#[derive(Args, Debug, Clone)]
pub struct HttpArgs {
    /// Timeout applied to every outbound HTTP call
    #[arg(long, env = "TASTELOG_HTTP_TIMEOUT_SECS", default_value = "30")]
    pub http_timeout_secs: u64,

    /// Pause after each metadata/lyrics lookup, in milliseconds
    #[arg(long, env = "TASTELOG_PACE_MS", default_value = "1000")]
    pub pace_ms: u64,

    /// Retries for 429/503 responses before the lookup counts as a miss
    #[arg(long, default_value = "3")]
    pub max_retries: u32,
}

impl HttpArgs {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pace_ms)
    }
}

// ---------------------------------------------------------------------------
// API credentials
// ---------------------------------------------------------------------------

#[derive(Args, Debug, Clone)]
pub struct SpotifyArgs {
    #[arg(long, env = "SPOTIFY_CLIENT_ID")]
    pub spotify_client_id: Option<String>,

    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub spotify_client_secret: Option<String>,

    #[arg(long, env = "SPOTIFY_REDIRECT_URI", default_value = "http://127.0.0.1:8888/callback")]
    pub spotify_redirect_uri: String,

    /// Skips the interactive authorization when no cached token exists
    #[arg(long, env = "SPOTIFY_REFRESH_TOKEN", hide_env_values = true)]
    pub spotify_refresh_token: Option<String>,

    #[arg(long, env = "SPOTIFY_TOKEN_CACHE", default_value = ".spotify_token_cache.json")]
    pub spotify_token_cache: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct LastFmArgs {
    #[arg(long, env = "LASTFM_API_KEY", hide_env_values = true)]
    pub lastfm_api_key: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct LyricsApiArgs {
    #[arg(long, env = "RAPIDAPI_KEY", hide_env_values = true)]
    pub rapidapi_key: Option<String>,

    #[arg(long, env = "RAPIDAPI_HOST", default_value = "musixmatch-lyrics-songs.p.rapidapi.com")]
    pub rapidapi_host: String,
}

/// Unwrap an optional credential or report which variable is missing.
pub fn required(value: &Option<String>, name: &'static str) -> Result<String, ConfigError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(ConfigError::Missing(name))
}
