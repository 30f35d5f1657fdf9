//! Sequential, rate-limit aware copy of emotes into a destination set.

use std::{future::Future, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{
    domain::{EmoteId, EmoteRef, EmoteSetId},
    errors::{EmoteFailure, FetchError, RateLimited},
    plan::{CopyPlan, PlanEntry, SkipReason},
    ports::{EmoteSetReader, EmoteSetWriter, Sleeper, WriteResponse},
};

#[derive(Clone, Copy, Debug)]
pub struct CopyPolicy {
    /// Wait applied when a rate-limit response carries no retry-after hint.
    pub fallback_backoff: Duration,
    /// Upper bound for a single wait, whatever the server asks for.
    pub max_backoff: Duration,
    /// Stop after this many authorization failures in a row (0 = never).
    pub max_consecutive_auth_failures: u32,
}

impl Default for CopyPolicy {
    fn default() -> Self {
        Self {
            fallback_backoff: Duration::from_secs(45),
            max_backoff: Duration::from_secs(300),
            max_consecutive_auth_failures: 3,
        }
    }
}

impl CopyPolicy {
    /// Wait before retrying after `signal`.
    ///
    /// A server hint is honored up to `max_backoff`; longer hints are clamped
    /// so a single wait stays bounded. If the limiter is still active after a
    /// clamped wait, the next rate-limit response simply waits again.
    pub fn backoff_for(&self, signal: RateLimited) -> Duration {
        match signal.retry_after {
            Some(d) => d.min(self.max_backoff),
            None => self.fallback_backoff,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CopyOutcome {
    Added,
    AlreadyPresent,
    Failed(EmoteFailure),
    Skipped(SkipReason),
}

/// Per-emote results in plan order, plus backoff bookkeeping.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CopyReport {
    pub entries: Vec<(EmoteRef, CopyOutcome)>,
    pub rate_limit_waits: u32,
    pub waited: Duration,
}

impl CopyReport {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &CopyOutcome> {
        self.entries.iter().map(|(_, o)| o)
    }

    pub fn added(&self) -> usize {
        self.outcomes()
            .filter(|o| matches!(o, CopyOutcome::Added))
            .count()
    }

    pub fn already_present(&self) -> usize {
        self.outcomes()
            .filter(|o| matches!(o, CopyOutcome::AlreadyPresent))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes()
            .filter(|o| matches!(o, CopyOutcome::Failed(_)))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes()
            .filter(|o| matches!(o, CopyOutcome::Skipped(_)))
            .count()
    }

    pub fn has_failures(&self) -> bool {
        self.failed() > 0
    }

    pub fn was_cancelled(&self) -> bool {
        self.outcomes()
            .any(|o| matches!(o, CopyOutcome::Skipped(SkipReason::Cancelled)))
    }
}

/// Progress notifications emitted while a plan executes.
#[derive(Clone, Debug)]
pub enum CopyEvent<'a> {
    Removing {
        index: usize,
        emote: &'a EmoteRef,
        replaces: &'a EmoteId,
    },
    Attempting {
        index: usize,
        total: usize,
        emote: &'a EmoteRef,
        attempt: u32,
    },
    RateLimited {
        index: usize,
        emote: &'a EmoteRef,
        wait: Duration,
    },
    Finished {
        index: usize,
        total: usize,
        emote: &'a EmoteRef,
        outcome: &'a CopyOutcome,
    },
}

#[derive(Clone, Debug)]
enum Phase {
    Remove(EmoteId),
    Add,
}

/// States of a single emote. `RateLimited` always leads back to `Attempting`
/// for the same emote.
#[derive(Debug)]
enum AttemptState {
    Pending,
    Attempting(Phase),
    RateLimited { wait: Duration, resume: Phase },
    Done(CopyOutcome),
}

pub struct EmoteSetCopier {
    writer: Arc<dyn EmoteSetWriter>,
    sleeper: Arc<dyn Sleeper>,
    policy: CopyPolicy,
    cancel: CancellationToken,
}

impl EmoteSetCopier {
    pub fn new(
        writer: Arc<dyn EmoteSetWriter>,
        sleeper: Arc<dyn Sleeper>,
        policy: CopyPolicy,
    ) -> Self {
        Self {
            writer,
            sleeper,
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Abandon the run when `cancel` fires; untouched entries are reported as
    /// `Skipped(Cancelled)`.
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn policy(&self) -> CopyPolicy {
        self.policy
    }

    /// Attempt every emote, in order.
    pub async fn copy(&self, destination: &EmoteSetId, emotes: &[EmoteRef]) -> CopyReport {
        self.execute(destination, &CopyPlan::copy_all(emotes), &mut |_| {})
            .await
    }

    pub async fn execute(
        &self,
        destination: &EmoteSetId,
        plan: &CopyPlan,
        on_event: &mut (dyn FnMut(CopyEvent<'_>) + Send),
    ) -> CopyReport {
        let total = plan.len();
        let mut report = CopyReport {
            entries: Vec::with_capacity(total),
            ..CopyReport::default()
        };
        let mut halted: Option<SkipReason> = None;
        let mut auth_failures = 0u32;

        for (index, entry) in plan.entries.iter().enumerate() {
            let emote = entry.emote();

            let outcome = match (halted, entry) {
                (Some(reason), _) => CopyOutcome::Skipped(reason),
                (None, _) if self.cancel.is_cancelled() => {
                    halted = Some(SkipReason::Cancelled);
                    CopyOutcome::Skipped(SkipReason::Cancelled)
                }
                // Nothing to write, but the emote is present in the destination.
                (None, PlanEntry::Skip {
                    reason: SkipReason::AlreadyInDestination,
                    ..
                }) => CopyOutcome::AlreadyPresent,
                (None, PlanEntry::Skip { reason, .. }) => CopyOutcome::Skipped(*reason),
                (None, PlanEntry::Copy { emote, replaces }) => {
                    match self
                        .copy_one(destination, index, total, emote, replaces.as_ref(), &mut report, on_event)
                        .await
                    {
                        Some(outcome) => outcome,
                        None => {
                            tracing::warn!(emote = %emote, "copy cancelled");
                            halted = Some(SkipReason::Cancelled);
                            CopyOutcome::Skipped(SkipReason::Cancelled)
                        }
                    }
                }
            };

            if halted.is_none() {
                match &outcome {
                    CopyOutcome::Failed(f) if f.is_authorization() => {
                        auth_failures += 1;
                        let max = self.policy.max_consecutive_auth_failures;
                        if max > 0 && auth_failures >= max {
                            tracing::error!(
                                failures = auth_failures,
                                "authorization keeps failing; skipping the remaining emotes"
                            );
                            halted = Some(SkipReason::Aborted);
                        }
                    }
                    CopyOutcome::Failed(EmoteFailure::CapacityReached) => {
                        tracing::error!("destination set is full; skipping the remaining emotes");
                        halted = Some(SkipReason::DestinationFull);
                    }
                    // Only a server answer breaks an authorization failure streak.
                    _ if matches!(entry, PlanEntry::Skip { .. }) => {}
                    CopyOutcome::Added | CopyOutcome::AlreadyPresent | CopyOutcome::Failed(_) => {
                        auth_failures = 0;
                    }
                    CopyOutcome::Skipped(_) => {}
                }
            }

            match &outcome {
                CopyOutcome::Added => tracing::info!(emote = %emote, "added"),
                CopyOutcome::AlreadyPresent => tracing::info!(emote = %emote, "already present"),
                CopyOutcome::Failed(reason) => tracing::warn!(emote = %emote, %reason, "failed"),
                CopyOutcome::Skipped(reason) => tracing::debug!(emote = %emote, %reason, "skipped"),
            }

            on_event(CopyEvent::Finished {
                index,
                total,
                emote,
                outcome: &outcome,
            });
            report.entries.push((emote.clone(), outcome));
        }

        report
    }

    /// Drive one emote to a terminal state. `None` means the run was cancelled.
    #[allow(clippy::too_many_arguments)]
    async fn copy_one(
        &self,
        destination: &EmoteSetId,
        index: usize,
        total: usize,
        emote: &EmoteRef,
        replaces: Option<&EmoteId>,
        report: &mut CopyReport,
        on_event: &mut (dyn FnMut(CopyEvent<'_>) + Send),
    ) -> Option<CopyOutcome> {
        let mut state = AttemptState::Pending;
        let mut attempt = 0u32;
        let mut add_was_rate_limited = false;

        loop {
            state = match state {
                AttemptState::Pending => AttemptState::Attempting(match replaces {
                    Some(id) => Phase::Remove(id.clone()),
                    None => Phase::Add,
                }),

                AttemptState::Attempting(Phase::Remove(id)) => {
                    on_event(CopyEvent::Removing {
                        index,
                        emote,
                        replaces: &id,
                    });
                    match self
                        .cancellable(self.writer.remove_emote(destination, &id))
                        .await?
                    {
                        WriteResponse::Done | WriteResponse::AlreadyPresent => {
                            AttemptState::Attempting(Phase::Add)
                        }
                        WriteResponse::Rejected(EmoteFailure::EmoteNotFound) => {
                            tracing::warn!(emote = %emote, conflicting = %id, "conflicting emote already gone; skipping removal");
                            AttemptState::Attempting(Phase::Add)
                        }
                        WriteResponse::RateLimited(signal) => AttemptState::RateLimited {
                            wait: self.policy.backoff_for(signal),
                            resume: Phase::Remove(id),
                        },
                        WriteResponse::Rejected(failure) => {
                            AttemptState::Done(CopyOutcome::Failed(failure))
                        }
                    }
                }

                AttemptState::Attempting(Phase::Add) => {
                    attempt += 1;
                    on_event(CopyEvent::Attempting {
                        index,
                        total,
                        emote,
                        attempt,
                    });
                    match self
                        .cancellable(self.writer.add_emote(destination, emote))
                        .await?
                    {
                        WriteResponse::Done => AttemptState::Done(CopyOutcome::Added),
                        // An earlier rate-limited attempt most likely landed.
                        WriteResponse::AlreadyPresent if add_was_rate_limited => {
                            AttemptState::Done(CopyOutcome::Added)
                        }
                        WriteResponse::AlreadyPresent => {
                            AttemptState::Done(CopyOutcome::AlreadyPresent)
                        }
                        WriteResponse::RateLimited(signal) => {
                            add_was_rate_limited = true;
                            AttemptState::RateLimited {
                                wait: self.policy.backoff_for(signal),
                                resume: Phase::Add,
                            }
                        }
                        WriteResponse::Rejected(failure) => {
                            AttemptState::Done(CopyOutcome::Failed(failure))
                        }
                    }
                }

                AttemptState::RateLimited { wait, resume } => {
                    tracing::warn!(emote = %emote, wait_secs = wait.as_secs_f64(), "rate limited; retrying after wait");
                    on_event(CopyEvent::RateLimited { index, emote, wait });
                    report.rate_limit_waits += 1;
                    report.waited += wait;
                    self.cancellable(self.sleeper.sleep(wait)).await?;
                    AttemptState::Attempting(resume)
                }

                AttemptState::Done(outcome) => return Some(outcome),
            };
        }
    }

    async fn cancellable<T>(&self, fut: impl Future<Output = T>) -> Option<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            v = fut => Some(v),
        }
    }
}

/// Read the source set and copy every emote into `destination`.
///
/// A failed listing aborts before any write.
pub async fn copy_emote_set(
    reader: &dyn EmoteSetReader,
    copier: &EmoteSetCopier,
    source: &EmoteSetId,
    destination: &EmoteSetId,
) -> Result<CopyReport, FetchError> {
    let emotes = reader.read_emotes(source).await?;
    tracing::info!(source = %source, destination = %destination, count = emotes.len(), "copying emotes");
    Ok(copier.copy(destination, &emotes).await)
}
