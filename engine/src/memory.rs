//! In-memory stores.
//!
//! Used by the test suites and benchmarks, and handy for planning against a
//! captured snapshot. Each store carries its own notion of "now", which it
//! stamps on every record it writes.

use crate::{
    error::Result, Bookmark, Error, Identity, LocalEntry, LocalHandle, LocalListing, LocalStore,
    RemoteRecord, RemoteSnapshot, RemoteStore, SyncMode, Timestamp, Watermark, WatermarkStore,
};
use std::cell::Cell;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Clone)]
struct MemoryFile {
    identity: Identity,
    modified_at: Timestamp,
    /// `None` models a file that does not parse
    content: Option<Bookmark>,
    /// Freeform text below the synced region
    tail: String,
}

/// A local store holding records in a map keyed by handle.
#[derive(Debug, Default)]
pub struct MemoryLocalStore {
    files: BTreeMap<LocalHandle, MemoryFile>,
    now: Timestamp,
    reads: Cell<usize>,
    operations: Vec<&'static str>,
    failing: HashSet<LocalHandle>,
}

impl MemoryLocalStore {
    pub fn new(now: Timestamp) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }

    pub fn set_now(&mut self, now: Timestamp) {
        self.now = now;
    }

    fn handle_for(&self, identity: &str) -> LocalHandle {
        let mut handle = LocalHandle::new(format!("{identity}.org"));
        let mut n = 2;
        while self.files.contains_key(&handle) {
            handle = LocalHandle::new(format!("{identity}~{n}.org"));
            n += 1;
        }
        handle
    }

    fn add(&mut self, identity: &str, modified_at: Timestamp, content: Option<Bookmark>) -> LocalHandle {
        let handle = self.handle_for(identity);
        self.files.insert(
            handle.clone(),
            MemoryFile {
                identity: identity.to_string(),
                modified_at,
                content,
                tail: String::new(),
            },
        );
        handle
    }

    /// Seed a record with an explicit modification time.
    pub fn insert(&mut self, identity: &str, modified_at: Timestamp, bookmark: Bookmark) -> LocalHandle {
        self.add(identity, modified_at, Some(bookmark))
    }

    /// Seed a record whose content cannot be parsed.
    pub fn insert_unparseable(&mut self, identity: &str, modified_at: Timestamp) -> LocalHandle {
        self.add(identity, modified_at, None)
    }

    /// Edit a record as a user would, stamping it with the current time.
    pub fn edit(&mut self, handle: &LocalHandle, f: impl FnOnce(&mut Bookmark)) -> bool {
        let now = self.now;
        match self.files.get_mut(handle) {
            Some(MemoryFile {
                content: Some(bookmark),
                modified_at,
                ..
            }) => {
                f(bookmark);
                *modified_at = now;
                true
            }
            _ => false,
        }
    }

    /// Remove a record behind the engine's back.
    pub fn remove(&mut self, handle: &LocalHandle) -> bool {
        self.files.remove(handle).is_some()
    }

    pub fn set_tail(&mut self, handle: &LocalHandle, tail: impl Into<String>) {
        if let Some(file) = self.files.get_mut(handle) {
            file.tail = tail.into();
        }
    }

    pub fn tail(&self, handle: &LocalHandle) -> Option<&str> {
        self.files.get(handle).map(|file| file.tail.as_str())
    }

    pub fn get(&self, handle: &LocalHandle) -> Option<&Bookmark> {
        self.files.get(handle)?.content.as_ref()
    }

    /// The handle of the first record with this identity.
    pub fn handle_of(&self, identity: &str) -> Option<LocalHandle> {
        self.files
            .iter()
            .find(|(_, file)| file.identity == identity)
            .map(|(handle, _)| handle.clone())
    }

    /// Make every later mutation or read of this handle fail.
    pub fn fail_on(&mut self, handle: &LocalHandle) {
        self.failing.insert(handle.clone());
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Number of `read` calls so far.
    pub fn reads(&self) -> usize {
        self.reads.get()
    }

    /// Names of the mutating calls made so far, in order.
    pub fn operations(&self) -> Vec<&'static str> {
        self.operations.clone()
    }

    fn check(&self, operation: &str, handle: &LocalHandle) -> Result<()> {
        if self.failing.contains(handle) {
            return Err(Error::store(operation, handle.as_str(), "injected failure"));
        }
        if !self.files.contains_key(handle) {
            return Err(Error::store(operation, handle.as_str(), "no such record"));
        }
        Ok(())
    }
}

impl LocalStore for MemoryLocalStore {
    fn list_all(&self) -> Result<LocalListing> {
        Ok(LocalListing {
            entries: self
                .files
                .iter()
                .map(|(handle, file)| {
                    LocalEntry::new(file.identity.clone(), file.modified_at, handle.clone())
                })
                .collect(),
            rejected: Vec::new(),
        })
    }

    fn read(&self, handle: &LocalHandle) -> Result<Bookmark> {
        self.reads.set(self.reads.get() + 1);
        self.check("read", handle)?;
        self.files
            .get(handle)
            .and_then(|file| file.content.clone())
            .ok_or_else(|| Error::Parse {
                handle: handle.to_string(),
                reason: "unparseable content".into(),
            })
    }

    fn create(&mut self, record: &RemoteRecord) -> Result<LocalHandle> {
        self.operations.push("create");
        Ok(self.add(&record.identity, self.now, Some(record.bookmark.clone())))
    }

    fn write(&mut self, handle: &LocalHandle, record: &RemoteRecord) -> Result<LocalHandle> {
        self.operations.push("write");
        self.check("write", handle)?;

        let Some(mut file) = self.files.remove(handle) else {
            return Err(Error::store("write", handle.as_str(), "no such record"));
        };
        file.content = Some(record.bookmark.clone());
        file.modified_at = self.now;

        let target = if file.identity == record.identity {
            handle.clone()
        } else {
            file.identity = record.identity.clone();
            self.handle_for(&record.identity)
        };
        self.files.insert(target.clone(), file);
        Ok(target)
    }

    fn delete(&mut self, handle: &LocalHandle) -> Result<()> {
        self.operations.push("delete");
        self.check("delete", handle)?;
        self.files.remove(handle);
        Ok(())
    }
}

/// A remote store keyed, like the real service, by URL on upload.
#[derive(Debug, Default)]
pub struct MemoryRemoteStore {
    records: Vec<RemoteRecord>,
    now: Timestamp,
    saves: usize,
    deletes: usize,
    fetches: usize,
    fail_fetches: bool,
}

impl MemoryRemoteStore {
    pub fn new(now: Timestamp) -> Self {
        Self {
            now,
            ..Self::default()
        }
    }

    pub fn set_now(&mut self, now: Timestamp) {
        self.now = now;
    }

    /// Seed a record with explicit timestamps.
    pub fn insert(&mut self, created_at: Timestamp, modified_at: Timestamp, bookmark: Bookmark) -> Identity {
        let record = RemoteRecord::new(created_at, modified_at, bookmark);
        let identity = record.identity.clone();
        self.records.push(record);
        identity
    }

    /// Edit a record as another client would, stamping it with "now".
    pub fn edit(&mut self, identity: &str, f: impl FnOnce(&mut Bookmark)) -> bool {
        let now = self.now;
        match self.records.iter_mut().find(|r| r.identity == identity) {
            Some(record) => {
                f(&mut record.bookmark);
                record.modified_at = now;
                true
            }
            None => false,
        }
    }

    /// Remove a record behind the engine's back.
    pub fn remove(&mut self, identity: &str) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.identity != identity);
        self.records.len() != before
    }

    pub fn get(&self, identity: &str) -> Option<&RemoteRecord> {
        self.records.iter().find(|r| r.identity == identity)
    }

    pub fn find_by_url(&self, url: &str) -> Option<&RemoteRecord> {
        self.records.iter().find(|r| r.bookmark.url == url)
    }

    /// Make every later fetch fail.
    pub fn fail_fetches(&mut self, fail: bool) {
        self.fail_fetches = fail;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn saves(&self) -> usize {
        self.saves
    }

    pub fn deletes(&self) -> usize {
        self.deletes
    }

    pub fn fetches(&self) -> usize {
        self.fetches
    }
}

impl RemoteStore for MemoryRemoteStore {
    fn fetch_all(&mut self, mode: SyncMode, watermark: Watermark) -> Result<RemoteSnapshot> {
        self.fetches += 1;
        if self.fail_fetches {
            return Err(Error::Fetch("service unavailable".into()));
        }

        let mut records = self.records.clone();
        records.sort_by(|a, b| b.modified_at.cmp(&a.modified_at));

        if mode.fetches_everything() {
            return Ok(RemoteSnapshot::complete(records));
        }
        records.retain(|r| r.modified_at > watermark.as_secs());
        Ok(RemoteSnapshot::partial(records))
    }

    fn save(&mut self, bookmark: &Bookmark) -> Result<Option<RemoteRecord>> {
        self.saves += 1;
        let now = self.now;

        if let Some(existing) = self
            .records
            .iter_mut()
            .find(|r| r.bookmark.url == bookmark.url)
        {
            let annotations = std::mem::take(&mut existing.bookmark.annotations);
            existing.bookmark = Bookmark {
                annotations,
                ..bookmark.clone()
            };
            existing.modified_at = now;
            return Ok(Some(existing.clone()));
        }

        let record = RemoteRecord::new(now, now, bookmark.clone());
        self.records.push(record.clone());
        Ok(Some(record))
    }

    fn delete(&mut self, record: &RemoteRecord) -> Result<()> {
        if !self.remove(&record.identity) {
            return Err(Error::store("delete", record.identity.as_str(), "no such record"));
        }
        self.deletes += 1;
        Ok(())
    }
}

/// A watermark held in memory.
#[derive(Debug, Default)]
pub struct MemoryWatermarkStore {
    value: Option<Watermark>,
    saves: usize,
}

impl MemoryWatermarkStore {
    pub fn new(value: Option<Watermark>) -> Self {
        Self { value, saves: 0 }
    }

    pub fn value(&self) -> Option<Watermark> {
        self.value
    }

    pub fn saves(&self) -> usize {
        self.saves
    }
}

impl WatermarkStore for MemoryWatermarkStore {
    fn load(&self) -> Result<Option<Watermark>> {
        Ok(self.value)
    }

    fn save(&mut self, watermark: Watermark) -> Result<()> {
        self.value = Some(watermark);
        self.saves += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_write_preserves_tail_and_rekeys() {
        let mut store = MemoryLocalStore::new(50);
        let handle = store.insert("old", 10, Bookmark::new("http://a", "A"));
        store.set_tail(&handle, "my notes");

        let record = RemoteRecord::new(1, 2, Bookmark::new("http://a", "B"));
        let renamed = store.write(&handle, &record).unwrap();

        assert_ne!(renamed, handle);
        assert_eq!(store.tail(&renamed), Some("my notes"));
        assert_eq!(store.get(&renamed).unwrap().title, "B");
        let listing = store.list_all().unwrap();
        assert_eq!(listing.entries[0].identity, record.identity);
        assert_eq!(listing.entries[0].modified_at, 50);
    }

    #[test]
    fn duplicate_identities_get_distinct_handles() {
        let mut store = MemoryLocalStore::new(0);
        let a = store.insert("x", 0, Bookmark::new("http://a", "A"));
        let b = store.insert("x", 0, Bookmark::new("http://a", "A"));
        assert_ne!(a, b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn remote_save_upserts_by_url() {
        let mut store = MemoryRemoteStore::new(100);
        let id = store.insert(10, 10, Bookmark::new("http://a", "A"));

        let echo = store
            .save(&Bookmark::new("http://a", "A2"))
            .unwrap()
            .unwrap();
        assert_eq!(echo.identity, id);
        assert_eq!(echo.modified_at, 100);
        assert_eq!(store.len(), 1);

        let created = store
            .save(&Bookmark::new("http://b", "B"))
            .unwrap()
            .unwrap();
        assert_eq!(created.created_at, 100);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn incremental_fetch_is_partial() {
        let mut store = MemoryRemoteStore::new(100);
        store.insert(10, 10, Bookmark::new("http://a", "A"));
        store.insert(10, 90, Bookmark::new("http://b", "B"));

        let partial = store
            .fetch_all(SyncMode::Incremental, Watermark::at(50))
            .unwrap();
        assert!(!partial.complete);
        assert_eq!(partial.records.len(), 1);

        let full = store.fetch_all(SyncMode::Full, Watermark::at(50)).unwrap();
        assert!(full.complete);
        assert_eq!(full.records[0].modified_at, 90);
    }

    #[test]
    fn failing_fetch() {
        let mut store = MemoryRemoteStore::new(0);
        store.fail_fetches(true);
        assert!(matches!(
            store.fetch_all(SyncMode::Full, Watermark::ORIGIN),
            Err(Error::Fetch(_))
        ));
    }
}
