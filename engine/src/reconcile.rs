//! Reconciliation logic for syncing the local and remote stores.
//!
//! This is the decision table. Given both snapshots and the watermark read
//! at the start of the run, it produces a [`SyncPlan`] with at most one
//! action per identity. Nothing here touches a store except to hydrate
//! local records that a decision needs to compare.
//!
//! # Algorithm
//!
//! 1. Index both snapshots by identity; identities held by more than one
//!    record on either side are flagged and left alone
//! 2. Local pass: classify every local record against the watermark and its
//!    remote match, asking the conflict policy when both sides differ
//! 3. Remote pass: classify every remote record the local pass did not claim
//! 4. Return the plan for the executor

use crate::{
    change::ChangeState,
    diff::{self, Field},
    error::Result,
    matcher::{IdentityIndex, Keyed},
    Conflict, ConflictKind, ConflictPolicy, Error, Excluded, FieldDiff, Identity, LocalHandle,
    LocalRecord, LocalStore, RemoteRecord, Resolution, Watermark,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use tracing::{debug, warn};

/// Which pass scheduled an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Pass {
    Local,
    Remote,
}

/// Why a local record is uploaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UploadReason {
    /// No remote counterpart exists
    New,
    /// Local changed, remote did not
    LocalNewer,
    /// Local changed and a partial fetch saw no remote counterpart, which
    /// may be missing or merely unchanged
    NotFetched,
    /// Both touched but identical; pushes the newer timestamp
    TimestampRefresh,
    /// Conflict settled in favour of the local copy
    KeptLocal,
    /// Only the tag spelling differed
    TagNormalization,
}

/// One thing to do to one record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    Upload {
        handle: LocalHandle,
        reason: UploadReason,
    },
    /// Write a fresh local record, replacing an existing file in reset runs
    Download {
        record: RemoteRecord,
        replaces: Option<LocalHandle>,
    },
    /// Rewrite the synced region of a local record
    UpdateLocal {
        handle: LocalHandle,
        record: RemoteRecord,
    },
    DeleteLocal {
        handle: LocalHandle,
    },
    /// The local copy was deleted since the last sync
    DeleteRemote {
        record: RemoteRecord,
    },
}

/// The kind of an [`Action`], without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionKind {
    Upload,
    Download,
    UpdateLocal,
    DeleteLocal,
    DeleteRemote,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Upload => "upload",
            ActionKind::Download => "download",
            ActionKind::UpdateLocal => "update-local",
            ActionKind::DeleteLocal => "delete-local",
            ActionKind::DeleteRemote => "delete-remote",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Upload { .. } => ActionKind::Upload,
            Action::Download { .. } => ActionKind::Download,
            Action::UpdateLocal { .. } => ActionKind::UpdateLocal,
            Action::DeleteLocal { .. } => ActionKind::DeleteLocal,
            Action::DeleteRemote { .. } => ActionKind::DeleteRemote,
        }
    }

    /// Whether applying this action calls a mutating remote operation.
    pub fn mutates_remote(&self) -> bool {
        matches!(self, Action::Upload { .. } | Action::DeleteRemote { .. })
    }

    /// Whether this action removes data from either store.
    pub fn is_destructive(&self) -> bool {
        match self {
            Action::DeleteLocal { .. } | Action::DeleteRemote { .. } => true,
            Action::Download { replaces, .. } => replaces.is_some(),
            Action::Upload { .. } | Action::UpdateLocal { .. } => false,
        }
    }

    /// A short human label: the remote title or the local handle.
    pub fn label(&self) -> &str {
        match self {
            Action::Download { record, .. }
            | Action::UpdateLocal { record, .. }
            | Action::DeleteRemote { record } => &record.bookmark.title,
            Action::Upload { handle, .. } | Action::DeleteLocal { handle } => handle.as_str(),
        }
    }
}

/// An action with the identity it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannedAction {
    pub identity: Identity,
    pub pass: Pass,
    pub action: Action,
}

/// Why an identity was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlagReason {
    DuplicateLocal,
    DuplicateRemote,
}

/// An identity that needs manual inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flagged {
    pub identity: Identity,
    pub reason: FlagReason,
    /// Local handles or remote URLs of every record sharing the identity
    pub candidates: Vec<String>,
}

/// Everything a run decided.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPlan {
    /// The watermark the decisions were made against
    pub watermark: Watermark,
    /// Whether the complete remote set was seen
    pub full_sync: bool,
    /// Local-pass actions first, then remote-pass actions
    pub actions: Vec<PlannedAction>,
    pub flagged: Vec<Flagged>,
    pub excluded: Vec<Excluded>,
}

impl SyncPlan {
    pub fn new(watermark: Watermark, full_sync: bool) -> Self {
        Self {
            watermark,
            full_sync,
            actions: Vec::new(),
            flagged: Vec::new(),
            excluded: Vec::new(),
        }
    }

    fn push(&mut self, identity: Identity, pass: Pass, action: Action) {
        self.actions.push(PlannedAction {
            identity,
            pass,
            action,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Number of planned actions of one kind.
    pub fn count(&self, kind: ActionKind) -> usize {
        self.actions
            .iter()
            .filter(|planned| planned.action.kind() == kind)
            .count()
    }

    pub fn has_destructive(&self) -> bool {
        self.actions
            .iter()
            .any(|planned| planned.action.is_destructive())
    }

    /// The action planned for an identity, if any.
    pub fn action_for(&self, identity: &str) -> Option<&Action> {
        self.actions
            .iter()
            .find(|planned| planned.identity == identity)
            .map(|planned| &planned.action)
    }

    /// Fail if any identity was scheduled twice.
    pub fn ensure_unique(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.actions.len());
        for planned in &self.actions {
            if !seen.insert(planned.identity.as_str()) {
                return Err(Error::DuplicateAction(planned.identity.clone()));
            }
        }
        Ok(())
    }
}

/// The decision-table engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciler {
    watermark: Watermark,
    full_sync: bool,
    tag_normalization: bool,
}

impl Reconciler {
    /// Create a reconciler. `full_sync` must only be true when the remote
    /// snapshot is complete.
    pub fn new(watermark: Watermark, full_sync: bool) -> Self {
        Self {
            watermark,
            full_sync,
            tag_normalization: false,
        }
    }

    /// Settle tag-only conflicts by uploading, without asking the policy.
    pub fn with_tag_normalization(mut self, enabled: bool) -> Self {
        self.tag_normalization = enabled;
        self
    }

    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    /// Decide every record of both snapshots.
    ///
    /// Local records are hydrated through `store` only when a comparison is
    /// needed. A record that fails to parse is excluded from the plan. The
    /// policy is consulted for each true conflict; [`Resolution::Abort`]
    /// ends planning with [`Error::Aborted`].
    pub fn plan<S, P>(
        &self,
        local: &mut [LocalRecord],
        remote: &[RemoteRecord],
        store: &S,
        policy: &mut P,
    ) -> Result<SyncPlan>
    where
        S: LocalStore + ?Sized,
        P: ConflictPolicy + ?Sized,
    {
        let local_index = IdentityIndex::build(local);
        let remote_index = IdentityIndex::build(remote);

        let mut plan = SyncPlan::new(self.watermark, self.full_sync);
        // Identities no later decision may touch
        let mut claimed = flag_duplicates(local, remote, &local_index, &remote_index, &mut plan);

        for record in local.iter_mut() {
            let identity = record.identity().clone();
            if claimed.contains(&identity) {
                continue;
            }

            let matched = remote_index
                .lookup(&identity)
                .position()
                .map(|index| &remote[index]);

            match self.decide_local(record, matched, store, policy) {
                Ok(Some(action)) => {
                    claimed.insert(identity.clone());
                    plan.push(identity, Pass::Local, action);
                }
                Ok(None) => {}
                Err(Error::Parse { handle, reason }) => {
                    warn!(identity = %identity, handle = %handle, %reason, "excluding unreadable local record");
                    claimed.insert(identity);
                    plan.excluded.push(Excluded { handle, reason });
                }
                Err(err) => return Err(err),
            }
        }

        for record in remote {
            if claimed.contains(&record.identity) {
                continue;
            }

            let matched = local_index
                .lookup(&record.identity)
                .position()
                .map(|index| &local[index]);

            if let Some(action) = self.decide_remote(record, matched) {
                plan.push(record.identity.clone(), Pass::Remote, action);
            }
        }

        Ok(plan)
    }

    /// Plan a reset: every remote record is written fresh and local records
    /// without a remote counterpart are deleted.
    pub fn plan_reset(local: &[LocalRecord], remote: &[RemoteRecord]) -> SyncPlan {
        let local_index = IdentityIndex::build(local);
        let remote_index = IdentityIndex::build(remote);

        let mut plan = SyncPlan::new(Watermark::ORIGIN, true);
        let claimed = flag_duplicates(local, remote, &local_index, &remote_index, &mut plan);

        for record in local {
            if claimed.contains(record.identity()) {
                continue;
            }
            if remote_index.lookup(record.identity()).position().is_none() {
                plan.push(
                    record.identity().clone(),
                    Pass::Local,
                    Action::DeleteLocal {
                        handle: record.handle().clone(),
                    },
                );
            }
        }

        for record in remote {
            if claimed.contains(&record.identity) {
                continue;
            }
            let replaces = local_index
                .lookup(&record.identity)
                .position()
                .map(|index| local[index].handle().clone());
            plan.push(
                record.identity.clone(),
                Pass::Remote,
                Action::Download {
                    record: record.clone(),
                    replaces,
                },
            );
        }

        plan
    }

    fn decide_local<S, P>(
        &self,
        record: &mut LocalRecord,
        matched: Option<&RemoteRecord>,
        store: &S,
        policy: &mut P,
    ) -> Result<Option<Action>>
    where
        S: LocalStore + ?Sized,
        P: ConflictPolicy + ?Sized,
    {
        let local_changed = ChangeState::of_local(record.entry(), self.watermark).changed;
        let handle = record.handle().clone();
        let identity = record.identity().clone();

        let Some(remote) = matched else {
            if local_changed {
                let reason = if self.full_sync {
                    UploadReason::New
                } else {
                    UploadReason::NotFetched
                };
                debug!(identity = %identity, ?reason, "no remote counterpart, uploading");
                return Ok(Some(Action::Upload { handle, reason }));
            }
            if self.full_sync {
                debug!(identity = %identity, "local record is gone from the remote store, deleting");
                return Ok(Some(Action::DeleteLocal { handle }));
            }
            // A partial fetch proves nothing about absence
            return Ok(None);
        };

        let remote_changed = ChangeState::of_remote(remote, self.watermark).changed;

        match (local_changed, remote_changed) {
            // The remote pass rewrites it
            (false, true) => Ok(None),
            (false, false) => {
                if !self.full_sync {
                    return Ok(None);
                }
                let diffs = compare(record, remote, store)?;
                if diffs.is_empty() {
                    return Ok(None);
                }
                debug!(identity = %identity, "unchanged on both sides but fields differ");
                self.settle(ConflictKind::Unexplained, record, remote, diffs, policy)
                    .map(Some)
            }
            (true, false) => {
                debug!(identity = %identity, "local changed, remote unchanged, uploading");
                Ok(Some(Action::Upload {
                    handle,
                    reason: UploadReason::LocalNewer,
                }))
            }
            (true, true) => {
                let diffs = compare(record, remote, store)?;
                if diffs.is_empty() {
                    debug!(identity = %identity, "touched but identical, refreshing remote timestamp");
                    return Ok(Some(Action::Upload {
                        handle,
                        reason: UploadReason::TimestampRefresh,
                    }));
                }
                debug!(identity = %identity, "both sides changed, resolving");
                self.settle(ConflictKind::BothChanged, record, remote, diffs, policy)
                    .map(Some)
            }
        }
    }

    fn settle<P>(
        &self,
        kind: ConflictKind,
        record: &LocalRecord,
        remote: &RemoteRecord,
        diffs: Vec<FieldDiff>,
        policy: &mut P,
    ) -> Result<Action>
    where
        P: ConflictPolicy + ?Sized,
    {
        let handle = record.handle().clone();

        if self.tag_normalization && diff::is_tags_only(&diffs) {
            debug!(identity = %record.identity(), "tag-only difference, uploading local spelling");
            return Ok(Action::Upload {
                handle,
                reason: UploadReason::TagNormalization,
            });
        }

        let conflict = Conflict {
            identity: record.identity().clone(),
            kind,
            title: record
                .bookmark()
                .map(|bookmark| bookmark.title.clone())
                .unwrap_or_else(|| remote.bookmark.title.clone()),
            diffs,
        };

        match policy.resolve(&conflict) {
            Resolution::KeepLocal => Ok(Action::Upload {
                handle,
                reason: UploadReason::KeptLocal,
            }),
            Resolution::KeepRemote => Ok(Action::UpdateLocal {
                handle,
                record: remote.clone(),
            }),
            Resolution::Abort => Err(Error::Aborted(conflict.identity)),
        }
    }

    fn decide_remote(&self, record: &RemoteRecord, matched: Option<&LocalRecord>) -> Option<Action> {
        let state = ChangeState::of_remote(record, self.watermark);
        let touched = state.new || state.changed;

        match (matched, touched) {
            (Some(_), false) => None,
            (Some(local), true) => {
                debug!(identity = %record.identity, new = state.new, "remote changed, updating local copy");
                Some(Action::UpdateLocal {
                    handle: local.handle().clone(),
                    record: record.clone(),
                })
            }
            (None, true) => {
                debug!(identity = %record.identity, new = state.new, "downloading remote record");
                Some(Action::Download {
                    record: record.clone(),
                    replaces: None,
                })
            }
            (None, false) => {
                debug!(identity = %record.identity, "local copy was deleted, deleting remote record");
                Some(Action::DeleteRemote {
                    record: record.clone(),
                })
            }
        }
    }
}

fn compare<S>(record: &mut LocalRecord, remote: &RemoteRecord, store: &S) -> Result<Vec<FieldDiff>>
where
    S: LocalStore + ?Sized,
{
    let bookmark = record.hydrate(store)?;
    Ok(diff::diff(bookmark, &remote.bookmark, &Field::SYNCED))
}

fn flag_duplicates<L: Keyed, R: Keyed>(
    local: &[L],
    remote: &[R],
    local_index: &IdentityIndex,
    remote_index: &IdentityIndex,
    plan: &mut SyncPlan,
) -> HashSet<Identity> {
    let mut flagged = HashSet::new();
    flag_side(local, local_index, FlagReason::DuplicateLocal, plan, &mut flagged);
    flag_side(remote, remote_index, FlagReason::DuplicateRemote, plan, &mut flagged);
    flagged
}

fn flag_side<T: Keyed>(
    set: &[T],
    index: &IdentityIndex,
    reason: FlagReason,
    plan: &mut SyncPlan,
    flagged: &mut HashSet<Identity>,
) {
    for (identity, positions) in index.duplicates() {
        let candidates: Vec<String> = positions
            .iter()
            .map(|&position| set[position].label().to_string())
            .collect();
        warn!(
            identity = %identity,
            ?reason,
            ?candidates,
            "ambiguous identity, leaving it for manual inspection"
        );
        flagged.insert(identity.clone());
        plan.flagged.push(Flagged {
            identity: identity.clone(),
            reason,
            candidates,
        });
    }
}
