//! Run modes.

use serde::{Deserialize, Serialize};

/// How much of the remote store a run fetches, and what it may infer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncMode {
    /// Stop fetching at the first record older than the watermark
    #[default]
    Incremental,
    /// Fetch everything; enables deletion inference and minor-field diffing
    Full,
    /// Discard local state and download everything
    Reset,
}

impl SyncMode {
    /// Whether the remote store is asked for its complete listing.
    pub fn fetches_everything(&self) -> bool {
        !matches!(self, SyncMode::Incremental)
    }
}

/// The run modes exposed to the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncOptions {
    pub mode: SyncMode,
    /// Plan and apply local actions, but never call remote mutations
    pub safe: bool,
    /// Skip the interactive confirmation before applying
    pub auto_confirm: bool,
    /// Settle tag-only conflicts by uploading without asking
    pub tag_normalization_only: bool,
}

impl SyncOptions {
    pub fn new(mode: SyncMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    pub fn with_safe(mut self, safe: bool) -> Self {
        self.safe = safe;
        self
    }

    pub fn with_auto_confirm(mut self, auto_confirm: bool) -> Self {
        self.auto_confirm = auto_confirm;
        self
    }

    pub fn with_tag_normalization(mut self, enabled: bool) -> Self {
        self.tag_normalization_only = enabled;
        self
    }
}
