//! # Marksync Engine
//!
//! A deterministic reconciliation engine that keeps a remote bookmark
//! service and a local directory of text records convergent.
//!
//! The engine decides, for every record on either side, whether to leave it
//! alone, push it outward, pull it inward, delete it, or flag it for conflict
//! resolution. It works only from modification timestamps, a stable
//! cross-store identity and the watermark of the last clean sync.
//!
//! ## Design Principles
//!
//! - **No IO**: stores are reached through the [`LocalStore`], [`RemoteStore`]
//!   and [`WatermarkStore`] traits; adapters live outside the engine
//! - **Deterministic**: the same snapshots and watermark always produce the
//!   same [`SyncPlan`]
//! - **Plan, then apply**: deciding never mutates a store, so a safe run
//!   produces exactly the plan a live run would
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A [`Bookmark`] carries the synced fields. On the remote side it is wrapped
//! in a [`RemoteRecord`] with server timestamps; on the local side a
//! [`LocalRecord`] starts as a cheap listing entry and is hydrated on demand.
//!
//! ### Identity
//!
//! [`identity::identity`] derives a short key from creation time and URL.
//! Records are matched across stores by this key alone.
//!
//! ### Reconciliation
//!
//! The [`Reconciler`] runs a local pass and a remote pass over the two
//! snapshots and emits at most one [`Action`] per identity. True conflicts
//! are handed to a [`ConflictPolicy`].
//!
//! ## Quick Start
//!
//! ```rust
//! use marksync_engine::{
//!     memory::{MemoryLocalStore, MemoryRemoteStore, MemoryWatermarkStore},
//!     Bookmark, FixedPolicy, Resolution, SyncMode, SyncOptions, SyncSession,
//! };
//!
//! let mut remote = MemoryRemoteStore::new(1_000);
//! remote.insert(1_000, 1_000, Bookmark::new("http://a", "Foo"));
//!
//! let mut local = MemoryLocalStore::new(2_000);
//! let mut watermarks = MemoryWatermarkStore::default();
//! let mut policy = FixedPolicy::new(Resolution::Abort);
//!
//! let mut session = SyncSession::new(
//!     &mut local,
//!     &mut remote,
//!     &mut watermarks,
//!     SyncOptions::new(SyncMode::Full),
//! );
//! let summary = session.run(&mut policy, || 2_000).unwrap();
//!
//! assert_eq!(summary.report.downloaded, 1);
//! assert_eq!(local.len(), 1);
//! ```

pub mod change;
pub mod diff;
pub mod error;
pub mod executor;
pub mod identity;
pub mod matcher;
pub mod memory;
pub mod options;
pub mod policy;
pub mod reconcile;
pub mod record;
pub mod session;
pub mod store;
pub mod watermark;

// Re-export main types at crate root
pub use change::ChangeState;
pub use diff::{diff, Field, FieldDiff};
pub use error::Error;
pub use executor::{ActionFailure, ExecutionReport, Executor};
pub use matcher::{IdentityIndex, MatchOutcome};
pub use options::{SyncMode, SyncOptions};
pub use policy::{Conflict, ConflictKind, ConflictPolicy, FixedPolicy, Resolution};
pub use reconcile::{
    Action, ActionKind, FlagReason, Flagged, Pass, PlannedAction, Reconciler, SyncPlan,
    UploadReason,
};
pub use record::{
    Annotation, Bookmark, Comment, LocalEntry, LocalHandle, LocalRecord, RemoteRecord, TagSet,
};
pub use session::{PreparedSync, SyncSession, SyncSummary};
pub use store::{Excluded, LocalListing, LocalStore, RemoteSnapshot, RemoteStore};
pub use watermark::{Watermark, WatermarkStore};

/// Type aliases for clarity
pub type Identity = String;
/// Seconds since the Unix epoch.
pub type Timestamp = i64;
