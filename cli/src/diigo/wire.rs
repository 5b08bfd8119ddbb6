//! The Diigo v2 bookmark JSON.
//!
//! The service speaks strings throughout: tags are comma-joined with a
//! `no_tag` sentinel, flags are `"yes"`/`"no"`, and timestamps carry their
//! own UTC offset.

use chrono::DateTime;
use marksync_engine::{Annotation, Bookmark, Comment, RemoteRecord, TagSet, Timestamp};
use serde::{Deserialize, Serialize};

/// Timestamp layout of `created_at`/`updated_at`, e.g. `2008/04/30 06:28:54 +0800`.
pub const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S %z";

/// A malformed record in a fetched page.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("bad {field} {value:?} on {url}: {source}")]
    Timestamp {
        url: String,
        field: &'static str,
        value: String,
        source: chrono::ParseError,
    },
}

/// One bookmark as the service returns it.
#[derive(Debug, Clone, Deserialize)]
pub struct WireBookmark {
    pub title: String,
    pub url: String,
    pub desc: Option<String>,
    pub tags: Option<String>,
    pub shared: Option<String>,
    pub readlater: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub annotations: Vec<WireAnnotation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireAnnotation {
    pub content: Option<String>,
    #[serde(default)]
    pub comments: Vec<WireComment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WireComment {
    pub content: Option<String>,
    pub user: Option<String>,
    pub created_at: Option<String>,
}

impl WireBookmark {
    pub fn into_record(self) -> Result<RemoteRecord, WireError> {
        let created_at = parse_timestamp(&self.url, "created_at", &self.created_at)?;
        let modified_at = parse_timestamp(&self.url, "updated_at", &self.updated_at)?;

        let bookmark = Bookmark {
            tags: TagSet::parse_delimited(self.tags.as_deref().unwrap_or_default(), ','),
            // Missing means public, as the service defaults
            private: self.shared.as_deref().is_some_and(|shared| !is_yes(shared)),
            read_later: self.readlater.as_deref().is_some_and(is_yes),
            description: unix_newlines(self.desc.unwrap_or_default()),
            annotations: self.annotations.into_iter().map(Annotation::from).collect(),
            url: self.url,
            title: self.title,
        };

        Ok(RemoteRecord::new(created_at, modified_at, bookmark))
    }
}

impl From<WireAnnotation> for Annotation {
    fn from(wire: WireAnnotation) -> Self {
        Annotation {
            content: unix_newlines(wire.content.unwrap_or_default()),
            comments: wire
                .comments
                .into_iter()
                .map(|comment| Comment {
                    content: unix_newlines(comment.content.unwrap_or_default()),
                    user: comment.user.unwrap_or_default(),
                    created_at: comment.created_at.unwrap_or_default(),
                })
                .collect(),
        }
    }
}

/// Body of an upload. The service overwrites by URL when `merge=no`.
#[derive(Debug, Serialize)]
pub struct UploadBody<'a> {
    pub title: &'a str,
    pub url: &'a str,
    pub desc: &'a str,
    pub tags: String,
    pub shared: &'static str,
    #[serde(rename = "readLater")]
    pub read_later: &'static str,
}

impl<'a> From<&'a Bookmark> for UploadBody<'a> {
    fn from(bookmark: &'a Bookmark) -> Self {
        Self {
            title: &bookmark.title,
            url: &bookmark.url,
            desc: &bookmark.description,
            tags: bookmark.tags.join(","),
            shared: yes_no(bookmark.is_shared()),
            read_later: yes_no(bookmark.read_later),
        }
    }
}

/// Body of a delete; the service keys on the URL.
#[derive(Debug, Serialize)]
pub struct DeleteBody<'a> {
    pub url: &'a str,
    pub title: &'a str,
}

impl<'a> From<&'a Bookmark> for DeleteBody<'a> {
    fn from(bookmark: &'a Bookmark) -> Self {
        Self {
            url: &bookmark.url,
            title: &bookmark.title,
        }
    }
}

fn parse_timestamp(url: &str, field: &'static str, value: &str) -> Result<Timestamp, WireError> {
    DateTime::parse_from_str(value, TIMESTAMP_FORMAT)
        .map(|instant| instant.timestamp())
        .map_err(|source| WireError::Timestamp {
            url: url.to_string(),
            field,
            value: value.to_string(),
            source,
        })
}

/// The service passes through whatever line endings the author typed.
fn unix_newlines(text: String) -> String {
    if text.contains('\r') {
        text.replace("\r\n", "\n").replace('\r', "\n")
    } else {
        text
    }
}

fn is_yes(flag: &str) -> bool {
    flag.trim().eq_ignore_ascii_case("yes")
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marksync_engine::identity::identity;
    use serde_json::json;

    fn sample() -> serde_json::Value {
        json!({
            "title": "Diigo API Help",
            "url": "http://www.diigo.com/help/api.html",
            "user": "foo",
            "desc": "",
            "tags": "test,diigo,help",
            "shared": "yes",
            "readlater": "no",
            "created_at": "2008/04/30 06:28:54 +0800",
            "updated_at": "2008/04/30 06:28:54 +0800",
            "comments": [],
            "annotations": []
        })
    }

    #[test]
    fn decodes_service_record() {
        let wire: WireBookmark = serde_json::from_value(sample()).unwrap();
        let record = wire.into_record().unwrap();

        assert_eq!(record.created_at, 1_209_508_134);
        assert_eq!(record.modified_at, 1_209_508_134);
        assert_eq!(
            record.identity,
            identity(1_209_508_134, "http://www.diigo.com/help/api.html")
        );
        assert_eq!(record.bookmark.tags.join(" "), "diigo help test");
        assert!(!record.bookmark.private);
        assert!(!record.bookmark.read_later);
    }

    #[test]
    fn sentinel_and_flags() {
        let mut value = sample();
        value["tags"] = json!("no_tag");
        value["shared"] = json!("no");
        value["readlater"] = json!("yes");
        value["desc"] = serde_json::Value::Null;

        let record = serde_json::from_value::<WireBookmark>(value)
            .unwrap()
            .into_record()
            .unwrap();
        assert!(record.bookmark.tags.is_empty());
        assert!(record.bookmark.private);
        assert!(record.bookmark.read_later);
        assert_eq!(record.bookmark.description, "");
    }

    #[test]
    fn line_endings_are_canonical() {
        let mut value = sample();
        value["desc"] = json!("line one\r\nline two\rline three");
        value["annotations"] = json!([{"content": "quote\r\nmore", "comments": []}]);

        let record = serde_json::from_value::<WireBookmark>(value)
            .unwrap()
            .into_record()
            .unwrap();
        assert_eq!(record.bookmark.description, "line one\nline two\nline three");
        assert_eq!(record.bookmark.annotations[0].content, "quote\nmore");
    }

    #[test]
    fn annotations_are_kept() {
        let mut value = sample();
        value["annotations"] = json!([{
            "content": "highlighted",
            "comments": [{"content": "nice", "user": "bob", "created_at": "2020/01/01 10:00:00 +0000"}]
        }]);

        let record = serde_json::from_value::<WireBookmark>(value)
            .unwrap()
            .into_record()
            .unwrap();
        let annotation = &record.bookmark.annotations[0];
        assert_eq!(annotation.content, "highlighted");
        assert_eq!(annotation.comments[0].user, "bob");
    }

    #[test]
    fn malformed_timestamp_is_an_error() {
        let mut value = sample();
        value["updated_at"] = json!("yesterday");
        let err = serde_json::from_value::<WireBookmark>(value)
            .unwrap()
            .into_record()
            .unwrap_err();
        assert!(err.to_string().contains("updated_at"));
    }

    #[test]
    fn upload_body_uses_service_spelling() {
        let bookmark = Bookmark::new("http://a", "A")
            .with_description("notes")
            .with_tags(["rust", "cli"])
            .with_private(true)
            .with_read_later(true);

        let body = serde_json::to_value(UploadBody::from(&bookmark)).unwrap();
        assert_eq!(
            body,
            json!({
                "title": "A",
                "url": "http://a",
                "desc": "notes",
                "tags": "cli,rust",
                "shared": "no",
                "readLater": "yes"
            })
        );
    }
}
