use std::time::Duration;

use crate::domain::EmoteSetId;

/// Core error type.
///
/// Adapter crates map their specific errors into this type (or into
/// [`FetchError`] / [`EmoteFailure`]) so the copier can handle failures
/// consistently.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("token error: {0}")]
    Token(#[from] TokenError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Listing an emote set failed. Fatal for a copy run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("emote set {0} was not found")]
    NotFound(EmoteSetId),

    #[error("the token was rejected while fetching an emote set")]
    Unauthorized,

    #[error("network error while fetching an emote set: {0}")]
    Network(String),

    #[error("unexpected response while fetching an emote set: {0}")]
    InvalidResponse(String),
}

/// Permanent, per-emote failure recorded in the copy report.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EmoteFailure {
    #[error("emote not found")]
    EmoteNotFound,

    #[error("conflicting emote in the destination set: {0}")]
    Conflict(String),

    #[error("not allowed to modify the destination set")]
    Unprivileged,

    #[error("the token was rejected")]
    Unauthorized,

    #[error("the destination set is full")]
    CapacityReached,

    #[error("http status {0}")]
    Http(u16),

    #[error("network error: {0}")]
    Network(String),

    #[error("{0}")]
    Other(String),
}

impl EmoteFailure {
    /// Failures that mean the credential itself can no longer write to the set.
    pub fn is_authorization(&self) -> bool {
        matches!(self, Self::Unprivileged | Self::Unauthorized)
    }
}

/// Reasons a session token cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token is empty")]
    Empty,

    #[error("invalid token format")]
    Malformed,

    #[error("invalid token payload")]
    MissingClaims,

    #[error("token has expired")]
    Expired,
}

/// Transient rejection: the caller should wait and retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimited {
    pub retry_after: Option<Duration>,
}
