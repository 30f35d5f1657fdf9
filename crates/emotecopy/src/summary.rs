//! Human-readable output for plans, progress, and the final report.

use std::fmt::Write as _;

use emotecopy_core::{
    copier::{CopyEvent, CopyOutcome, CopyReport},
    plan::{CopyPlan, SkipReason},
};

fn plural(n: usize) -> &'static str {
    if n == 1 {
        ""
    } else {
        "s"
    }
}

pub fn render_plan(plan: &CopyPlan) -> String {
    let mut out = String::new();
    for reason in [
        SkipReason::Private,
        SkipReason::AlreadyInDestination,
        SkipReason::NameConflict,
        SkipReason::OverCapacity,
    ] {
        let n = plan.count_skipped(reason);
        if n > 0 {
            let _ = writeln!(out, "Ignoring {n} emote{} ({reason}).", plural(n));
        }
    }

    let n = plan.to_copy();
    if n == 0 {
        let _ = writeln!(out, "There are no emotes left to copy.");
    } else {
        let _ = writeln!(out, "Copying {n} emote{}...", plural(n));
    }
    out
}

pub fn render_event(ev: &CopyEvent<'_>) -> Option<String> {
    match ev {
        CopyEvent::RateLimited { emote, wait, .. } => Some(format!(
            "Rate limited while copying {emote}. Retrying in {}s...",
            wait.as_secs()
        )),
        CopyEvent::Finished {
            index,
            total,
            emote,
            outcome,
        } => {
            let status = match outcome {
                CopyOutcome::Added => "added".to_string(),
                CopyOutcome::AlreadyPresent => "already present".to_string(),
                CopyOutcome::Failed(reason) => format!("failed: {reason}"),
                // Plan-level skips were already summarized up front.
                CopyOutcome::Skipped(_) => return None,
            };
            Some(format!("[{}/{total}] {emote}: {status}", index + 1))
        }
        CopyEvent::Removing { .. } | CopyEvent::Attempting { .. } => None,
    }
}

pub fn render_report(report: &CopyReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Done: {} added, {} already present, {} failed, {} skipped.",
        report.added(),
        report.already_present(),
        report.failed(),
        report.skipped()
    );
    if report.rate_limit_waits > 0 {
        let _ = writeln!(
            out,
            "Waited {}s across {} rate limit{}.",
            report.waited.as_secs(),
            report.rate_limit_waits,
            plural(report.rate_limit_waits as usize)
        );
    }
    for (emote, outcome) in &report.entries {
        if let CopyOutcome::Failed(reason) = outcome {
            let _ = writeln!(out, "  failed {emote}: {reason}");
        }
    }
    if report.was_cancelled() {
        let _ = writeln!(out, "Cancelled; emotes copied so far were kept.");
    }
    out
}
