//! Decide, before any write, what to do with each emote of the source set.

use std::fmt;

use crate::domain::{EmoteId, EmoteRef, EmoteSet};

/// Why an emote is not attempted.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// Private emotes cannot be added to other sets.
    Private,
    /// Same emote under the same alias is already in the destination.
    AlreadyInDestination,
    /// A different emote uses this alias in the destination.
    NameConflict,
    /// No free slot left in the destination.
    OverCapacity,
    /// The run stopped early after repeated authorization failures.
    Aborted,
    /// The destination reported it is full.
    DestinationFull,
    Cancelled,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Private => "private emote",
            Self::AlreadyInDestination => "already in the destination set",
            Self::NameConflict => "name conflicts with an existing emote",
            Self::OverCapacity => "exceeds the destination capacity",
            Self::Aborted => "aborted after repeated authorization failures",
            Self::DestinationFull => "destination set is full",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlanEntry {
    Copy {
        emote: EmoteRef,
        /// Destination emote to remove first (same alias, different emote).
        replaces: Option<EmoteId>,
    },
    Skip {
        emote: EmoteRef,
        reason: SkipReason,
    },
}

impl PlanEntry {
    pub fn emote(&self) -> &EmoteRef {
        match self {
            Self::Copy { emote, .. } | Self::Skip { emote, .. } => emote,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PlanOptions {
    pub replace_conflicts: bool,
    pub only_fitting: bool,
}

/// Ordered plan, one entry per source emote.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CopyPlan {
    pub entries: Vec<PlanEntry>,
}

impl CopyPlan {
    /// Attempt every emote, in order, with no filtering.
    pub fn copy_all(emotes: &[EmoteRef]) -> Self {
        Self {
            entries: emotes
                .iter()
                .map(|e| PlanEntry::Copy {
                    emote: e.clone(),
                    replaces: None,
                })
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_copy(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, PlanEntry::Copy { .. }))
            .count()
    }

    pub fn count_skipped(&self, reason: SkipReason) -> usize {
        self.entries
            .iter()
            .filter(|e| matches!(e, PlanEntry::Skip { reason: r, .. } if *r == reason))
            .count()
    }
}

pub fn plan_copy(source: &EmoteSet, destination: &EmoteSet, options: PlanOptions) -> CopyPlan {
    let mut entries = Vec::with_capacity(source.len());
    // Replacing a conflict frees the slot it takes.
    let mut slots = destination.free_slots();

    for entry in &source.emotes {
        let emote = entry.emote.clone();

        let skip = |reason| PlanEntry::Skip {
            emote: emote.clone(),
            reason,
        };

        if entry.private {
            entries.push(skip(SkipReason::Private));
            continue;
        }
        if destination.contains_exact(&emote) {
            entries.push(skip(SkipReason::AlreadyInDestination));
            continue;
        }

        let conflict = destination.find_by_alias(&emote.name).map(|e| e.id.clone());
        if conflict.is_some() && !options.replace_conflicts {
            entries.push(skip(SkipReason::NameConflict));
            continue;
        }

        if conflict.is_none() {
            if slots == 0 && options.only_fitting {
                entries.push(skip(SkipReason::OverCapacity));
                continue;
            }
            slots = slots.saturating_sub(1);
        }

        entries.push(PlanEntry::Copy {
            emote,
            replaces: conflict,
        });
    }

    CopyPlan { entries }
}
