//! Applying a plan to the two stores.
//!
//! Every action is attempted exactly once. A failing action is recorded and
//! the batch carries on; the report tells attempted from succeeded.

use crate::{
    error::Result, Action, ActionKind, Identity, LocalStore, Pass, PlannedAction, RemoteStore,
    SyncPlan,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One action that did not complete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionFailure {
    pub identity: Identity,
    pub kind: ActionKind,
    pub message: String,
}

/// Counters for one execution, accumulated per action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub uploaded: usize,
    pub downloaded: usize,
    pub updated: usize,
    pub deleted_local: usize,
    pub deleted_remote: usize,
    /// Remote mutations skipped because the run was safe
    pub suppressed: usize,
    pub failures: Vec<ActionFailure>,
}

impl ExecutionReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record_success(&mut self, kind: ActionKind) {
        self.succeeded += 1;
        match kind {
            ActionKind::Upload => self.uploaded += 1,
            ActionKind::Download => self.downloaded += 1,
            ActionKind::UpdateLocal => self.updated += 1,
            ActionKind::DeleteLocal => self.deleted_local += 1,
            ActionKind::DeleteRemote => self.deleted_remote += 1,
        }
    }
}

/// Applies planned actions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Executor {
    safe: bool,
}

impl Executor {
    /// Create an executor. A safe executor never calls remote mutations.
    pub fn new(safe: bool) -> Self {
        Self { safe }
    }

    /// Apply every action of the plan: local-pass actions first, then
    /// remote-pass actions.
    pub fn apply<L, R>(&self, plan: &SyncPlan, local: &mut L, remote: &mut R) -> ExecutionReport
    where
        L: LocalStore + ?Sized,
        R: RemoteStore + ?Sized,
    {
        let mut report = ExecutionReport::default();

        for pass in [Pass::Local, Pass::Remote] {
            for planned in plan.actions.iter().filter(|planned| planned.pass == pass) {
                if self.safe && planned.action.mutates_remote() {
                    info!(identity = %planned.identity, kind = %planned.action.kind(), "safe run, not calling the remote store");
                    report.suppressed += 1;
                    continue;
                }

                report.attempted += 1;
                match apply_one(planned, local, remote) {
                    Ok(()) => report.record_success(planned.action.kind()),
                    Err(err) => {
                        warn!(identity = %planned.identity, kind = %planned.action.kind(), error = %err, "action failed");
                        report.failures.push(ActionFailure {
                            identity: planned.identity.clone(),
                            kind: planned.action.kind(),
                            message: err.to_string(),
                        });
                    }
                }
            }
        }

        report
    }
}

fn apply_one<L, R>(planned: &PlannedAction, local: &mut L, remote: &mut R) -> Result<()>
where
    L: LocalStore + ?Sized,
    R: RemoteStore + ?Sized,
{
    match &planned.action {
        Action::Upload { handle, reason } => {
            let bookmark = local.read(handle)?;
            info!(identity = %planned.identity, ?reason, title = %bookmark.title, "uploading");
            // The server assigns creation time, so a new record's identity is
            // only known from the echo; re-key the local copy to match it
            if let Some(stored) = remote.save(&bookmark)? {
                if stored.identity != planned.identity {
                    let renamed = local.write(handle, &stored)?;
                    info!(identity = %stored.identity, handle = %renamed, "re-keyed local copy");
                }
            }
        }
        Action::Download { record, replaces } => {
            if let Some(old) = replaces {
                local.delete(old)?;
            }
            let handle = local.create(record)?;
            info!(identity = %planned.identity, %handle, "downloaded");
        }
        Action::UpdateLocal { handle, record } => {
            let written = local.write(handle, record)?;
            info!(identity = %planned.identity, handle = %written, "updated local copy");
        }
        Action::DeleteLocal { handle } => {
            local.delete(handle)?;
            info!(identity = %planned.identity, %handle, "deleted local copy");
        }
        Action::DeleteRemote { record } => {
            remote.delete(record)?;
            info!(identity = %planned.identity, title = %record.bookmark.title, "deleted remote record");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::{MemoryLocalStore, MemoryRemoteStore};
    use crate::{Bookmark, LocalHandle, RemoteRecord, UploadReason, Watermark};

    fn plan_of(actions: Vec<(Identity, Pass, Action)>) -> SyncPlan {
        let mut plan = SyncPlan::new(Watermark::ORIGIN, true);
        plan.actions = actions
            .into_iter()
            .map(|(identity, pass, action)| PlannedAction {
                identity,
                pass,
                action,
            })
            .collect();
        plan
    }

    #[test]
    fn applies_every_kind() {
        let mut local = MemoryLocalStore::new(100);
        let mut remote = MemoryRemoteStore::new(100);

        let upload = local.insert("up", 90, Bookmark::new("http://up", "Up"));
        let doomed = local.insert("gone", 90, Bookmark::new("http://gone", "Gone"));
        let stale = local.insert("stale", 90, Bookmark::new("http://stale", "Stale"));
        let remote_only = remote.insert(10, 10, Bookmark::new("http://r", "R"));
        let remote_only = remote.get(&remote_only).unwrap().clone();

        let plan = plan_of(vec![
            (
                "up".into(),
                Pass::Local,
                Action::Upload {
                    handle: upload,
                    reason: UploadReason::New,
                },
            ),
            ("gone".into(), Pass::Local, Action::DeleteLocal { handle: doomed }),
            (
                "fresh".into(),
                Pass::Remote,
                Action::Download {
                    record: RemoteRecord::new(50, 50, Bookmark::new("http://f", "Fresh")),
                    replaces: None,
                },
            ),
            (
                "stale".into(),
                Pass::Remote,
                Action::UpdateLocal {
                    handle: stale.clone(),
                    record: RemoteRecord::new(10, 60, Bookmark::new("http://stale", "Fixed")),
                },
            ),
            (
                remote_only.identity.clone(),
                Pass::Remote,
                Action::DeleteRemote {
                    record: remote_only,
                },
            ),
        ]);

        let report = Executor::new(false).apply(&plan, &mut local, &mut remote);

        assert!(report.is_clean());
        assert_eq!(report.attempted, 5);
        assert_eq!(report.succeeded, 5);
        assert_eq!(report.uploaded, 1);
        assert_eq!(report.downloaded, 1);
        assert_eq!(report.updated, 1);
        assert_eq!(report.deleted_local, 1);
        assert_eq!(report.deleted_remote, 1);

        assert_eq!(remote.len(), 1);
        assert!(remote.find_by_url("http://up").is_some());
        assert_eq!(local.len(), 3);
        assert_eq!(local.read(&stale).unwrap().title, "Fixed");
    }

    #[test]
    fn failure_does_not_stop_the_batch() {
        let mut local = MemoryLocalStore::new(100);
        let mut remote = MemoryRemoteStore::new(100);

        let plan = plan_of(vec![
            (
                "missing".into(),
                Pass::Local,
                Action::DeleteLocal {
                    handle: LocalHandle::new("missing.org"),
                },
            ),
            (
                "fresh".into(),
                Pass::Remote,
                Action::Download {
                    record: RemoteRecord::new(50, 50, Bookmark::new("http://f", "Fresh")),
                    replaces: None,
                },
            ),
        ]);

        let report = Executor::new(false).apply(&plan, &mut local, &mut remote);

        assert_eq!(report.attempted, 2);
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].identity, "missing");
        assert_eq!(report.failures[0].kind, ActionKind::DeleteLocal);
        assert_eq!(local.len(), 1);
    }

    #[test]
    fn safe_run_suppresses_remote_mutations() {
        let mut local = MemoryLocalStore::new(100);
        let mut remote = MemoryRemoteStore::new(100);
        let upload = local.insert("up", 90, Bookmark::new("http://up", "Up"));

        let plan = plan_of(vec![
            (
                "up".into(),
                Pass::Local,
                Action::Upload {
                    handle: upload,
                    reason: UploadReason::New,
                },
            ),
            (
                "fresh".into(),
                Pass::Remote,
                Action::Download {
                    record: RemoteRecord::new(50, 50, Bookmark::new("http://f", "Fresh")),
                    replaces: None,
                },
            ),
        ]);

        let report = Executor::new(true).apply(&plan, &mut local, &mut remote);

        assert_eq!(report.suppressed, 1);
        assert_eq!(report.attempted, 1);
        assert_eq!(report.downloaded, 1);
        assert_eq!(remote.saves(), 0);
        assert!(remote.is_empty());
    }

    #[test]
    fn local_pass_runs_first() {
        let mut local = MemoryLocalStore::new(100);
        let mut remote = MemoryRemoteStore::new(100);
        let old = local.insert("a", 90, Bookmark::new("http://a", "A"));

        // Listed remote-first on purpose
        let plan = plan_of(vec![
            (
                "b".into(),
                Pass::Remote,
                Action::Download {
                    record: RemoteRecord::new(50, 50, Bookmark::new("http://b", "B")),
                    replaces: None,
                },
            ),
            ("a".into(), Pass::Local, Action::DeleteLocal { handle: old }),
        ]);

        Executor::new(false).apply(&plan, &mut local, &mut remote);
        assert_eq!(local.operations(), vec!["delete", "create"]);
    }
}
