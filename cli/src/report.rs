//! Human-readable plan previews and run summaries.

use marksync_engine::{FlagReason, SyncPlan, SyncSummary};
use std::fmt::Write;

/// List every planned action, flagged identity and excluded file.
pub fn render_plan(plan: &SyncPlan) -> String {
    let mut out = String::new();
    let scope = if plan.full_sync { "full" } else { "incremental" };

    if plan.is_empty() {
        let _ = writeln!(out, "Nothing to do ({scope} sync since {}).", plan.watermark);
    } else {
        let _ = writeln!(
            out,
            "{} planned action(s), {scope} sync since {}:",
            plan.len(),
            plan.watermark
        );
        for planned in &plan.actions {
            let _ = writeln!(
                out,
                "  {:<14} {}  {}",
                planned.action.kind().name(),
                planned.identity,
                planned.action.label()
            );
        }
    }

    for flagged in &plan.flagged {
        let side = match flagged.reason {
            FlagReason::DuplicateLocal => "local files",
            FlagReason::DuplicateRemote => "remote records",
        };
        let _ = writeln!(
            out,
            "  ! {} is shared by {} {side}, left alone: {}",
            flagged.identity,
            flagged.candidates.len(),
            flagged.candidates.join(", ")
        );
    }
    for excluded in &plan.excluded {
        let _ = writeln!(out, "  ? {} skipped: {}", excluded.handle, excluded.reason);
    }
    out
}

/// The counters of a finished run.
pub fn render_summary(summary: &SyncSummary) -> String {
    let report = &summary.report;
    let mut out = String::new();

    let _ = writeln!(
        out,
        "{} of {} action(s) succeeded: {} uploaded, {} downloaded, {} updated, {} deleted locally, {} deleted remotely",
        report.succeeded,
        report.attempted,
        report.uploaded,
        report.downloaded,
        report.updated,
        report.deleted_local,
        report.deleted_remote
    );
    if report.suppressed > 0 {
        let _ = writeln!(out, "{} remote change(s) held back by --safe", report.suppressed);
    }
    if !summary.plan.excluded.is_empty() || !summary.plan.flagged.is_empty() {
        let _ = writeln!(
            out,
            "{} file(s) excluded, {} identity(ies) flagged",
            summary.plan.excluded.len(),
            summary.plan.flagged.len()
        );
    }
    for failure in &report.failures {
        let _ = writeln!(out, "  failed {} {}: {}", failure.kind, failure.identity, failure.message);
    }
    match summary.watermark {
        Some(watermark) => {
            let _ = writeln!(out, "Watermark advanced to {watermark}.");
        }
        None => {
            let _ = writeln!(out, "Watermark unchanged.");
        }
    }
    out
}
