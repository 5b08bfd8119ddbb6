//! A directory of org files as the local store.

use super::format::{self, EXTENSION};
use marksync_engine::{
    Bookmark, Error, Excluded, LocalEntry, LocalHandle, LocalListing, LocalStore, RemoteRecord,
    Timestamp,
};
use std::ffi::OsStr;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Org files in one flat directory, one bookmark per file.
///
/// Handles are file names relative to the root. Hidden files and files
/// without the `.org` extension are ignored.
#[derive(Debug, Clone)]
pub struct OrgStore {
    root: PathBuf,
}

impl OrgStore {
    /// Open an existing directory.
    pub fn open(root: impl Into<PathBuf>) -> io::Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("{} is not a directory", root.display()),
            ));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path(&self, handle: &LocalHandle) -> PathBuf {
        self.root.join(handle.as_str())
    }

    /// Write through a temporary file so a crash never leaves half a file.
    fn write_file(&self, name: &str, contents: &str) -> io::Result<()> {
        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.persist(self.root.join(name)).map_err(|err| err.error)?;
        Ok(())
    }

    fn entry(&self, dir_entry: fs::DirEntry) -> io::Result<Option<Result<LocalEntry, Excluded>>> {
        if !dir_entry.file_type()?.is_file() {
            return Ok(None);
        }
        let Some(name) = dir_entry.file_name().to_str().map(str::to_string) else {
            return Ok(Some(Err(Excluded {
                handle: dir_entry.file_name().to_string_lossy().into_owned(),
                reason: "file name is not valid UTF-8".into(),
            })));
        };
        if name.starts_with('.') || Path::new(&name).extension() != Some(OsStr::new(EXTENSION)) {
            debug!(file = %name, "skipping");
            return Ok(None);
        }

        let Some(identity) = format::identity_of(&name) else {
            return Ok(Some(Err(Excluded {
                handle: name,
                reason: "file name has no identity prefix".into(),
            })));
        };
        let modified_at = mtime(dir_entry.metadata()?.modified()?);
        Ok(Some(Ok(LocalEntry::new(
            identity.to_string(),
            modified_at,
            LocalHandle::new(name.as_str()),
        ))))
    }
}

fn mtime(modified: SystemTime) -> Timestamp {
    modified
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() as Timestamp)
        .unwrap_or(0)
}

impl LocalStore for OrgStore {
    fn list_all(&self) -> Result<LocalListing, Error> {
        let target = self.root.display().to_string();
        let mut listing = LocalListing::default();

        let dir = fs::read_dir(&self.root).map_err(|err| Error::store("list", &target, err))?;
        for dir_entry in dir {
            let dir_entry = dir_entry.map_err(|err| Error::store("list", &target, err))?;
            match self.entry(dir_entry).map_err(|err| Error::store("list", &target, err))? {
                Some(Ok(entry)) => listing.entries.push(entry),
                Some(Err(excluded)) => listing.rejected.push(excluded),
                None => {}
            }
        }

        listing.entries.sort_by(|a, b| a.handle.cmp(&b.handle));
        listing.rejected.sort_by(|a, b| a.handle.cmp(&b.handle));
        Ok(listing)
    }

    fn read(&self, handle: &LocalHandle) -> Result<Bookmark, Error> {
        let text = fs::read_to_string(self.path(handle))
            .map_err(|err| Error::store("read", handle.as_str(), err))?;
        format::parse(&text).map_err(|err| Error::Parse {
            handle: handle.to_string(),
            reason: err.to_string(),
        })
    }

    fn create(&mut self, record: &RemoteRecord) -> Result<LocalHandle, Error> {
        let name = format::file_name_for(record);
        self.write_file(&name, &format::render(record))
            .map_err(|err| Error::store("create", &name, err))?;
        Ok(LocalHandle::new(name))
    }

    fn write(&mut self, handle: &LocalHandle, record: &RemoteRecord) -> Result<LocalHandle, Error> {
        let existing = fs::read_to_string(self.path(handle))
            .map_err(|err| Error::store("write", handle.as_str(), err))?;

        let name = format::file_name_for(record);
        self.write_file(&name, &format::splice(&existing, record))
            .map_err(|err| Error::store("write", &name, err))?;

        if name != handle.as_str() {
            fs::remove_file(self.path(handle))
                .map_err(|err| Error::store("rename", handle.as_str(), err))?;
            info!(from = %handle, to = %name, "renamed");
        }
        Ok(LocalHandle::new(name))
    }

    fn delete(&mut self, handle: &LocalHandle) -> Result<(), Error> {
        fs::remove_file(self.path(handle)).map_err(|err| Error::store("delete", handle.as_str(), err))
    }
}
