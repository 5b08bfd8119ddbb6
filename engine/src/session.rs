//! One sync run, from fetch to watermark.
//!
//! A run is batch-oriented: fetch everything, decide everything, then apply
//! everything. [`SyncSession::prepare`] covers the first two phases and
//! touches no store mutably; [`SyncSession::apply`] executes the plan and
//! advances the watermark only when every action succeeded.

use crate::{
    error::Result, ConflictPolicy, ExecutionReport, Executor, LocalRecord, LocalStore,
    Reconciler, RemoteStore, SyncMode, SyncOptions, SyncPlan, Timestamp, Watermark,
    WatermarkStore,
};
use serde::Serialize;
use tracing::{error, info};

/// The outcome of the fetch and decide phases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparedSync {
    /// The watermark as stored before this run
    pub stored: Option<Watermark>,
    pub plan: SyncPlan,
    /// Remote records seen
    pub fetched: usize,
    /// Local records listed
    pub listed: usize,
}

/// What a completed run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub plan: SyncPlan,
    pub report: ExecutionReport,
    /// The new watermark, if it was written
    pub watermark: Option<Watermark>,
}

/// Drives one run over a pair of stores.
pub struct SyncSession<'s, L: ?Sized, R: ?Sized, W: ?Sized> {
    local: &'s mut L,
    remote: &'s mut R,
    watermarks: &'s mut W,
    options: SyncOptions,
}

impl<'s, L, R, W> SyncSession<'s, L, R, W>
where
    L: LocalStore + ?Sized,
    R: RemoteStore + ?Sized,
    W: WatermarkStore + ?Sized,
{
    pub fn new(
        local: &'s mut L,
        remote: &'s mut R,
        watermarks: &'s mut W,
        options: SyncOptions,
    ) -> Self {
        Self {
            local,
            remote,
            watermarks,
            options,
        }
    }

    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Fetch both snapshots and decide every record.
    ///
    /// A fetch failure or an aborted conflict ends the run here, before any
    /// store is modified.
    pub fn prepare<P>(&mut self, policy: &mut P) -> Result<PreparedSync>
    where
        P: ConflictPolicy + ?Sized,
    {
        let stored = self.watermarks.load()?;
        let watermark = match self.options.mode {
            SyncMode::Reset => Watermark::ORIGIN,
            _ => stored.unwrap_or(Watermark::ORIGIN),
        };
        info!(mode = ?self.options.mode, %watermark, first_sync = stored.is_none(), "starting sync");

        let snapshot = self
            .remote
            .fetch_all(self.options.mode, watermark)
            .inspect_err(|err| error!(error = %err, "remote fetch failed, nothing applied"))?;
        info!(records = snapshot.records.len(), complete = snapshot.complete, "fetched remote records");

        let listing = self.local.list_all()?;
        info!(records = listing.entries.len(), rejected = listing.rejected.len(), "listed local records");

        let fetched = snapshot.records.len();
        let listed = listing.entries.len();
        let mut local: Vec<LocalRecord> = listing.entries.into_iter().map(LocalRecord::new).collect();

        let mut plan = if self.options.mode == SyncMode::Reset {
            Reconciler::plan_reset(&local, &snapshot.records)
        } else {
            Reconciler::new(watermark, snapshot.complete)
                .with_tag_normalization(self.options.tag_normalization_only)
                .plan(&mut local, &snapshot.records, &*self.local, policy)?
        };
        plan.excluded.extend(listing.rejected);
        plan.ensure_unique()?;

        info!(actions = plan.len(), flagged = plan.flagged.len(), excluded = plan.excluded.len(), "planned sync");

        Ok(PreparedSync {
            stored,
            plan,
            fetched,
            listed,
        })
    }

    /// Execute a prepared plan and advance the watermark on a clean run.
    ///
    /// `finished_at` is called after the last action so the watermark lands
    /// past every write this run made.
    pub fn apply<F>(&mut self, prepared: PreparedSync, finished_at: F) -> Result<SyncSummary>
    where
        F: FnOnce() -> Timestamp,
    {
        let PreparedSync { stored, plan, .. } = prepared;
        let report = Executor::new(self.options.safe).apply(&plan, &mut *self.local, &mut *self.remote);

        let watermark = if self.options.safe {
            info!("safe run, watermark left unchanged");
            None
        } else if !report.is_clean() {
            info!(failures = report.failures.len(), "run had failures, watermark left unchanged");
            None
        } else {
            let next = stored.unwrap_or(Watermark::ORIGIN).advance(finished_at());
            self.watermarks.save(next)?;
            info!(watermark = %next, "sync complete");
            Some(next)
        };

        Ok(SyncSummary {
            plan,
            report,
            watermark,
        })
    }

    /// Prepare and apply in one go, without confirmation.
    pub fn run<P, F>(&mut self, policy: &mut P, finished_at: F) -> Result<SyncSummary>
    where
        P: ConflictPolicy + ?Sized,
        F: FnOnce() -> Timestamp,
    {
        let prepared = self.prepare(policy)?;
        self.apply(prepared, finished_at)
    }
}
