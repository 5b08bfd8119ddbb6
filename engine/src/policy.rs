//! Conflict resolution policies.
//!
//! The reconciler never merges conflicting edits itself. It describes the
//! conflict and asks a [`ConflictPolicy`] which side to keep.

use crate::{FieldDiff, Identity};
use serde::{Deserialize, Serialize};

/// How a conflict was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Resolution {
    /// Upload the local record over the remote one
    KeepLocal,
    /// Rewrite the local record from the remote one
    KeepRemote,
    /// Stop the run; nothing is applied and the watermark stays put
    Abort,
}

/// Why a record needs resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictKind {
    /// Both sides changed since the watermark and their fields differ
    BothChanged,
    /// Neither side's timestamp moved, but a full sync found differing
    /// fields (typically remote metadata edited without a timestamp bump)
    Unexplained,
}

/// A conflict presented to a policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub identity: Identity,
    pub kind: ConflictKind,
    /// Local title, for display
    pub title: String,
    /// Differences over major and minor fields, local first
    pub diffs: Vec<FieldDiff>,
}

/// Decides true conflicts.
pub trait ConflictPolicy {
    fn resolve(&mut self, conflict: &Conflict) -> Resolution;
}

/// Always answers the same way; used for unattended runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedPolicy {
    resolution: Resolution,
}

impl FixedPolicy {
    pub fn new(resolution: Resolution) -> Self {
        Self { resolution }
    }

    pub fn keep_local() -> Self {
        Self::new(Resolution::KeepLocal)
    }

    pub fn keep_remote() -> Self {
        Self::new(Resolution::KeepRemote)
    }
}

impl ConflictPolicy for FixedPolicy {
    fn resolve(&mut self, _conflict: &Conflict) -> Resolution {
        self.resolution
    }
}

impl<F> ConflictPolicy for F
where
    F: FnMut(&Conflict) -> Resolution,
{
    fn resolve(&mut self, conflict: &Conflict) -> Resolution {
        self(conflict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Field;

    fn conflict() -> Conflict {
        Conflict {
            identity: "abc".into(),
            kind: ConflictKind::BothChanged,
            title: "A".into(),
            diffs: vec![FieldDiff {
                field: Field::Title,
                local: "A".into(),
                remote: "B".into(),
            }],
        }
    }

    #[test]
    fn fixed_policy() {
        assert_eq!(
            FixedPolicy::keep_local().resolve(&conflict()),
            Resolution::KeepLocal
        );
        assert_eq!(
            FixedPolicy::keep_remote().resolve(&conflict()),
            Resolution::KeepRemote
        );
    }

    #[test]
    fn closure_policy_sees_conflict() {
        let mut seen = Vec::new();
        let mut policy = |c: &Conflict| {
            seen.push(c.identity.clone());
            Resolution::Abort
        };
        assert_eq!(policy.resolve(&conflict()), Resolution::Abort);
        assert_eq!(seen, vec!["abc".to_string()]);
    }
}
