use std::time::Duration;

use async_trait::async_trait;

use crate::{
    domain::{EmoteId, EmoteRef, EmoteSet, EmoteSetId},
    errors::{EmoteFailure, FetchError, RateLimited},
};

/// Hexagonal port for listing emote sets.
///
/// Implementations carry their own credential; the core never reads one from
/// ambient state.
#[async_trait]
pub trait EmoteSetReader: Send + Sync {
    async fn fetch_emote_set(&self, id: &EmoteSetId) -> Result<EmoteSet, FetchError>;

    /// Ordered emote references currently in the set.
    async fn read_emotes(&self, id: &EmoteSetId) -> Result<Vec<EmoteRef>, FetchError> {
        Ok(self.fetch_emote_set(id).await?.emote_refs())
    }
}

/// Classified result of a single write attempt against an emote set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WriteResponse {
    Done,
    AlreadyPresent,
    RateLimited(RateLimited),
    Rejected(EmoteFailure),
}

/// Hexagonal port for modifying emote sets.
///
/// Every outcome, transport failures included, is classified into a
/// [`WriteResponse`] so the copier owns all retry decisions.
#[async_trait]
pub trait EmoteSetWriter: Send + Sync {
    async fn add_emote(&self, set: &EmoteSetId, emote: &EmoteRef) -> WriteResponse;

    async fn remove_emote(&self, set: &EmoteSetId, emote: &EmoteId) -> WriteResponse;
}

/// Injectable wait, so tests can simulate backoff without wall-clock delay.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        if duration > Duration::ZERO {
            tokio::time::sleep(duration).await;
        }
    }
}
