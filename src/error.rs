use std::process::ExitCode;

use thiserror::Error;

use crate::api::spotify::AuthError;
use crate::api::ApiError;
use crate::config::ConfigError;
use crate::store::StoreError;

/// Top-level failure of a job run.
///
/// Each variant maps to a fixed process exit code:
///
/// | code | meaning |
/// |------|---------|
/// | 0 | success (per-item lookup misses are allowed) |
/// | 1 | configuration or authentication failure, including a token refresh that fails mid-run |
/// | 2 | upstream failure (transport error, streaming API error status) |
/// | 3 | storage failure |
/// | 4 | another run holds the run lock |
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("upstream failure: {0}")]
    Upstream(#[from] ApiError),

    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    #[error("another sync run is in progress (run lock held)")]
    AlreadyRunning,
}

impl SyncError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) | Self::Auth(_) | Self::Upstream(ApiError::Auth(_)) => 1,
            Self::Upstream(_) => 2,
            Self::Storage(_) => 3,
            Self::AlreadyRunning => 4,
        }
    }
}

impl From<&SyncError> for ExitCode {
    fn from(err: &SyncError) -> Self {
        ExitCode::from(err.exit_code())
    }
}

pub type SyncResult<T> = Result<T, SyncError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_follow_taxonomy() {
        let cases = [
            (SyncError::Config(ConfigError::Missing("LASTFM_API_KEY")), 1),
            (SyncError::Auth(AuthError::MissingCode), 1),
            (SyncError::Upstream(ApiError::Transport("dns".into())), 2),
            (SyncError::Upstream(ApiError::Auth(AuthError::NoRefreshToken)), 1),
            (
                SyncError::Upstream(ApiError::Auth(AuthError::Rejected {
                    status: 400,
                    body: "invalid_grant".into(),
                })),
                1,
            ),
            (SyncError::Storage(StoreError::Conflict("tracks".into())), 3),
            (SyncError::AlreadyRunning, 4),
        ];
        for (err, code) in cases {
            assert_eq!(err.exit_code(), code, "{err}");
        }
    }
}
