//! Change detection relative to the watermark.

use crate::{LocalEntry, RemoteRecord, Timestamp, Watermark};

/// Whether a record was modified after the watermark.
pub fn is_changed(modified_at: Timestamp, watermark: Watermark) -> bool {
    modified_at > watermark.as_secs()
}

/// Whether a record was created after the watermark.
///
/// Only meaningful for remote records: local file creation time is not a
/// reliable signal.
pub fn is_new(created_at: Timestamp, watermark: Watermark) -> bool {
    created_at > watermark.as_secs()
}

/// Classification of one record against the watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChangeState {
    pub changed: bool,
    pub new: bool,
}

impl ChangeState {
    pub fn of_remote(record: &RemoteRecord, watermark: Watermark) -> Self {
        Self {
            changed: is_changed(record.modified_at, watermark),
            new: is_new(record.created_at, watermark),
        }
    }

    /// Local records are never classified as new.
    pub fn of_local(entry: &LocalEntry, watermark: Watermark) -> Self {
        Self {
            changed: is_changed(entry.modified_at, watermark),
            new: false,
        }
    }
}
