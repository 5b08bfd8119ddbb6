//! Field-by-field comparison of two bookmarks.

use crate::Bookmark;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A comparable bookmark field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Field {
    Title,
    Url,
    Description,
    Annotations,
    Tags,
    Private,
    ReadLater,
}

impl Field {
    /// Fields whose difference implies a substantive edit.
    pub const MAJOR: [Field; 3] = [Field::Title, Field::Url, Field::Description];

    /// Metadata fields. A remote change to these is only visible to a full
    /// sync.
    pub const MINOR: [Field; 3] = [Field::Tags, Field::Private, Field::ReadLater];

    /// Every field that is uploaded: major followed by minor.
    pub const SYNCED: [Field; 6] = [
        Field::Title,
        Field::Url,
        Field::Description,
        Field::Tags,
        Field::Private,
        Field::ReadLater,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Field::Title => "title",
            Field::Url => "url",
            Field::Description => "description",
            Field::Annotations => "annotations",
            Field::Tags => "tags",
            Field::Private => "private",
            Field::ReadLater => "readLater",
        }
    }

    /// Render this field of a bookmark for display.
    pub fn value_of(&self, bookmark: &Bookmark) -> String {
        match self {
            Field::Title => bookmark.title.clone(),
            Field::Url => bookmark.url.clone(),
            Field::Description => bookmark.description.trim_end().to_string(),
            Field::Annotations => format!("{} annotation(s)", bookmark.annotations.len()),
            Field::Tags => bookmark.tags.join(" "),
            Field::Private => bookmark.private.to_string(),
            Field::ReadLater => bookmark.read_later.to_string(),
        }
    }

    fn equal(&self, a: &Bookmark, b: &Bookmark) -> bool {
        match self {
            Field::Title => a.title == b.title,
            Field::Url => a.url == b.url,
            Field::Description => same_text(&a.description, &b.description),
            Field::Annotations => a.annotations == b.annotations,
            Field::Tags => a.tags == b.tags,
            Field::Private => a.private == b.private,
            Field::ReadLater => a.read_later == b.read_later,
        }
    }
}

/// Text equality that ignores line endings and trailing whitespace, both of
/// which are storage artefacts rather than edits.
fn same_text(a: &str, b: &str) -> bool {
    a.trim_end().lines().eq(b.trim_end().lines())
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One differing field, with the value on each side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDiff {
    pub field: Field,
    pub local: String,
    pub remote: String,
}

/// Compare `local` against `remote` over `fields`, in the order given.
pub fn diff(local: &Bookmark, remote: &Bookmark, fields: &[Field]) -> Vec<FieldDiff> {
    fields
        .iter()
        .filter(|field| !field.equal(local, remote))
        .map(|field| FieldDiff {
            field: *field,
            local: field.value_of(local),
            remote: field.value_of(remote),
        })
        .collect()
}

/// Whether the only difference is the tag set.
pub fn is_tags_only(diffs: &[FieldDiff]) -> bool {
    !diffs.is_empty() && diffs.iter().all(|d| d.field == Field::Tags)
}
