//! The contracts the engine requires of its two stores.

use crate::{
    error::Result, Bookmark, LocalEntry, LocalHandle, RemoteRecord, SyncMode, Watermark,
};
use serde::{Deserialize, Serialize};

/// A local record left out of the sync set because it could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Excluded {
    pub handle: String,
    pub reason: String,
}

/// The result of listing the local store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalListing {
    pub entries: Vec<LocalEntry>,
    /// Items that look like records but carry no usable identity
    pub rejected: Vec<Excluded>,
}

/// The local collection of text records.
pub trait LocalStore {
    /// List every record without parsing it.
    fn list_all(&self) -> Result<LocalListing>;

    /// Parse one record. Expensive; only called once a decision needs it.
    fn read(&self, handle: &LocalHandle) -> Result<Bookmark>;

    /// Write a fresh record and return where it was stored.
    fn create(&mut self, record: &RemoteRecord) -> Result<LocalHandle>;

    /// Rewrite the synced region of an existing record, preserving anything
    /// a human added below it. Returns the (possibly renamed) handle.
    fn write(&mut self, handle: &LocalHandle, record: &RemoteRecord) -> Result<LocalHandle>;

    fn delete(&mut self, handle: &LocalHandle) -> Result<()>;
}

/// What one fetch returned.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteSnapshot {
    pub records: Vec<RemoteRecord>,
    /// True only when the complete remote set was listed; deletion
    /// inference and minor-field diffing depend on it
    pub complete: bool,
}

impl RemoteSnapshot {
    pub fn complete(records: Vec<RemoteRecord>) -> Self {
        Self {
            records,
            complete: true,
        }
    }

    pub fn partial(records: Vec<RemoteRecord>) -> Self {
        Self {
            records,
            complete: false,
        }
    }
}

/// The remote bookmark service.
pub trait RemoteStore {
    /// Fetch records, most recently updated first.
    ///
    /// In [`SyncMode::Incremental`] the store may stop once it has seen a
    /// record not modified after `watermark`. Any non-success response is an
    /// [`Error::Fetch`](crate::Error::Fetch).
    fn fetch_all(&mut self, mode: SyncMode, watermark: Watermark) -> Result<RemoteSnapshot>;

    /// Create or overwrite a bookmark. Returns the stored record when the
    /// service echoes it.
    fn save(&mut self, bookmark: &Bookmark) -> Result<Option<RemoteRecord>>;

    fn delete(&mut self, record: &RemoteRecord) -> Result<()>;
}
