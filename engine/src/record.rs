//! Record types shared by both stores.

use crate::{error::Result, identity, Error, Identity, LocalStore, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Sentinel the remote service reports for an untagged bookmark.
pub const NO_TAG: &str = "no_tag";

/// A set of short tag tokens.
///
/// Order is irrelevant and duplicates collapse. Empty tokens and the
/// [`NO_TAG`] sentinel normalize away, so "no tag" is the empty set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    /// Create an empty tag set.
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Parse a delimited tag string such as `"rust,sync"`.
    pub fn parse_delimited(raw: &str, delimiter: char) -> Self {
        raw.split(delimiter).collect()
    }

    /// Join the tags with a separator, in sorted order.
    pub fn join(&self, separator: &str) -> String {
        self.0
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(separator)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|tag| tag.as_ref().trim().to_string())
                .filter(|tag| !tag.is_empty() && tag != NO_TAG)
                .collect(),
        )
    }
}

impl fmt::Display for TagSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join(","))
    }
}

/// A comment attached to an annotation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub content: String,
    pub user: String,
    /// Creation time as the service reports it
    pub created_at: String,
}

/// A highlighted passage with its comments.
///
/// Annotations are rendered locally but never uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Annotation {
    pub content: String,
    pub comments: Vec<Comment>,
}

/// The synced fields of one bookmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bookmark {
    pub url: String,
    pub title: String,
    pub description: String,
    pub tags: TagSet,
    /// Normalized polarity: the remote service speaks of "shared", which is
    /// the negation of this flag
    pub private: bool,
    pub read_later: bool,
    pub annotations: Vec<Annotation>,
}

impl Bookmark {
    /// Create a public bookmark with no description, tags or annotations.
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            description: String::new(),
            tags: TagSet::new(),
            private: false,
            read_later: false,
            annotations: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_tags<S: AsRef<str>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = tags.into_iter().collect();
        self
    }

    pub fn with_private(mut self, private: bool) -> Self {
        self.private = private;
        self
    }

    pub fn with_read_later(mut self, read_later: bool) -> Self {
        self.read_later = read_later;
        self
    }

    /// The remote service's polarity of the privacy flag.
    pub fn is_shared(&self) -> bool {
        !self.private
    }
}

/// A bookmark as held by the remote store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRecord {
    /// Derived from `created_at` and the bookmark URL
    pub identity: Identity,
    pub created_at: Timestamp,
    /// Server-reported update time
    pub modified_at: Timestamp,
    pub bookmark: Bookmark,
}

impl RemoteRecord {
    /// Wrap a bookmark, deriving its identity.
    pub fn new(created_at: Timestamp, modified_at: Timestamp, bookmark: Bookmark) -> Self {
        Self {
            identity: identity::identity(created_at, &bookmark.url),
            created_at,
            modified_at,
            bookmark,
        }
    }
}

/// Opaque reference to a record in the local store (a file name for the
/// org directory).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalHandle(String);

impl LocalHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocalHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What listing the local store yields without parsing a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalEntry {
    pub identity: Identity,
    /// File modification time
    pub modified_at: Timestamp,
    pub handle: LocalHandle,
}

impl LocalEntry {
    pub fn new(identity: impl Into<Identity>, modified_at: Timestamp, handle: LocalHandle) -> Self {
        Self {
            identity: identity.into(),
            modified_at,
            handle,
        }
    }
}

/// Parse state of a local record.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Hydration {
    Unhydrated,
    Hydrated(Bookmark),
    Failed(String),
}

/// A local record: a listing entry plus its content, parsed at most once.
///
/// Comparison code only ever sees a fully hydrated [`Bookmark`] or an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalRecord {
    entry: LocalEntry,
    state: Hydration,
}

impl LocalRecord {
    /// Create an unhydrated record from a listing entry.
    pub fn new(entry: LocalEntry) -> Self {
        Self {
            entry,
            state: Hydration::Unhydrated,
        }
    }

    pub fn entry(&self) -> &LocalEntry {
        &self.entry
    }

    pub fn identity(&self) -> &Identity {
        &self.entry.identity
    }

    pub fn handle(&self) -> &LocalHandle {
        &self.entry.handle
    }

    pub fn modified_at(&self) -> Timestamp {
        self.entry.modified_at
    }

    /// The parsed content, if hydration already succeeded.
    pub fn bookmark(&self) -> Option<&Bookmark> {
        match &self.state {
            Hydration::Hydrated(bookmark) => Some(bookmark),
            _ => None,
        }
    }

    /// Parse the record through its store, caching the outcome.
    ///
    /// A failed parse is cached too; later calls return the same error
    /// without touching the store again.
    pub fn hydrate<S: LocalStore + ?Sized>(&mut self, store: &S) -> Result<&Bookmark> {
        if self.state == Hydration::Unhydrated {
            self.state = match store.read(&self.entry.handle) {
                Ok(bookmark) => Hydration::Hydrated(bookmark),
                Err(Error::Parse { reason, .. }) => Hydration::Failed(reason),
                Err(err) => Hydration::Failed(err.to_string()),
            };
        }

        match &self.state {
            Hydration::Hydrated(bookmark) => Ok(bookmark),
            Hydration::Failed(reason) => Err(Error::Parse {
                handle: self.entry.handle.to_string(),
                reason: reason.clone(),
            }),
            Hydration::Unhydrated => Err(Error::Parse {
                handle: self.entry.handle.to_string(),
                reason: "record was not read".into(),
            }),
        }
    }
}
