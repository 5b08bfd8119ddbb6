//! The org-mode layout of one bookmark file.
//!
//! ```text
//! * NEXT [[https://example.com][Example]]	:rust:cli:
//! :PROPERTIES:
//! :CREATED: [2024-01-02 Tue 10:00:00]
//! :UPDATED: [2024-01-03 Wed 11:30:00]
//! :SHARED: yes
//! :END:
//! The description.
//!
//! ** Annotation
//! A highlighted passage.
//! *** Comments
//! #+BEGIN_QUOTE
//! A comment.
//! -- bob, 2024/01/03 11:30:00 +0000
//! #+END_QUOTE
//!
//! * Anything from here on belongs to the user
//! ```
//!
//! Everything before the second top-level heading is the synced region and
//! is regenerated on every write. `NEXT` marks read-later.

use chrono::DateTime;
use marksync_engine::{Annotation, Bookmark, Comment, RemoteRecord, TagSet, Timestamp};
use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap};

pub const READ_LATER_KEYWORD: &str = "NEXT";
pub const FILENAME_DELIMITER: &str = " - ";
pub const EXTENSION: &str = "org";

const ORG_TIMESTAMP_FORMAT: &str = "[%Y-%m-%d %a %H:%M:%S]";
const SLUG_LEN: usize = 80;
const ANNOTATION_HEADING: &str = "** Annotation";
const COMMENTS_HEADING: &str = "*** Comments";
const BEGIN_QUOTE: &str = "#+BEGIN_QUOTE";
const END_QUOTE: &str = "#+END_QUOTE";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("no top-level heading")]
    MissingHeading,

    #[error("heading has no [[url][title]] link")]
    MissingLink,

    #[error("property drawer is never closed")]
    UnclosedDrawer,
}

/// Lower-cased title with every run of other characters collapsed to one
/// space, cut to 80 characters.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_space = false;
    for c in title.chars() {
        if c.is_alphanumeric() {
            if pending_space && !slug.is_empty() {
                slug.push(' ');
            }
            pending_space = false;
            slug.extend(c.to_lowercase());
        } else {
            pending_space = true;
        }
    }

    let slug: String = slug.chars().take(SLUG_LEN).collect();
    match slug.trim_end() {
        "" => "untitled".to_string(),
        trimmed => trimmed.to_string(),
    }
}

/// `<identity> - <slug>.org`
pub fn file_name(identity: &str, title: &str) -> String {
    format!("{identity}{FILENAME_DELIMITER}{}.{EXTENSION}", slugify(title))
}

/// The identity prefix of a file name, if it has one.
pub fn identity_of(file_name: &str) -> Option<&str> {
    let (prefix, _) = file_name.split_once(FILENAME_DELIMITER)?;
    let valid = !prefix.is_empty() && !prefix.contains(char::is_whitespace);
    valid.then_some(prefix)
}

/// Org tags cannot hold whitespace or colons, so those are percent-encoded,
/// along with `%` itself so the spelling reads back exactly.
pub fn org_tag(tag: &str) -> String {
    let mut out = String::with_capacity(tag.len());
    let mut buf = [0u8; 4];
    for c in tag.chars() {
        if c.is_whitespace() || c == ':' || c == '%' {
            out.push_str(&urlencoding::encode(c.encode_utf8(&mut buf)));
        } else {
            out.push(c);
        }
    }
    out
}

/// Reverse [`org_tag`]. A tag that does not decode is taken as written.
pub fn tag_from_org(tag: &str) -> String {
    urlencoding::decode(tag)
        .map(Cow::into_owned)
        .unwrap_or_else(|_| tag.to_string())
}

fn org_timestamp(timestamp: Timestamp) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|instant| instant.format(ORG_TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}

/// Prefix lines that would read as headings with a comma.
fn escape(text: &str, out: &mut String) {
    for line in text.lines() {
        if line.trim_start_matches(',').starts_with('*') {
            out.push(',');
        }
        out.push_str(line);
        out.push('\n');
    }
}

fn unescape(line: &str) -> &str {
    match line.strip_prefix(',') {
        Some(rest) if rest.trim_start_matches(',').starts_with('*') => rest,
        _ => line,
    }
}

/// Render the synced region of a record.
pub fn render(record: &RemoteRecord) -> String {
    let bookmark = &record.bookmark;
    let mut out = String::new();

    out.push_str("* ");
    if bookmark.read_later {
        out.push_str(READ_LATER_KEYWORD);
        out.push(' ');
    }
    out.push_str(&format!("[[{}][{}]]", bookmark.url, bookmark.title));

    let tags: BTreeSet<String> = bookmark.tags.iter().map(org_tag).collect();
    if !tags.is_empty() {
        out.push_str("\t:");
        for tag in &tags {
            out.push_str(tag);
            out.push(':');
        }
    }
    out.push('\n');

    out.push_str(":PROPERTIES:\n");
    out.push_str(&format!(":CREATED: {}\n", org_timestamp(record.created_at)));
    out.push_str(&format!(":UPDATED: {}\n", org_timestamp(record.modified_at)));
    out.push_str(&format!(
        ":SHARED: {}\n",
        if bookmark.is_shared() { "yes" } else { "no" }
    ));
    out.push_str(":END:\n");

    escape(&bookmark.description, &mut out);

    if !bookmark.annotations.is_empty() {
        out.push('\n');
    }
    for annotation in &bookmark.annotations {
        out.push_str(ANNOTATION_HEADING);
        out.push('\n');
        escape(&annotation.content, &mut out);

        if !annotation.comments.is_empty() {
            out.push_str(COMMENTS_HEADING);
            out.push('\n');
        }
        for comment in &annotation.comments {
            out.push_str(BEGIN_QUOTE);
            out.push('\n');
            escape(&comment.content, &mut out);
            out.push_str(&format!("-- {}, {}\n", comment.user, comment.created_at));
            out.push_str(END_QUOTE);
            out.push('\n');
        }
    }

    out
}

/// Render a record into an existing file, keeping the user's content below
/// the synced region.
pub fn splice(existing: &str, record: &RemoteRecord) -> String {
    let mut out = render(record);
    let tail = tail(existing);
    if !tail.is_empty() {
        out.push('\n');
        out.push_str(tail);
    }
    out
}

fn is_top_level(line: &str) -> bool {
    line == "*" || line.starts_with("* ")
}

/// Everything from the second top-level heading on.
pub fn tail(text: &str) -> &str {
    let mut offset = 0;
    let mut headings = 0;
    for line in text.split_inclusive('\n') {
        if is_top_level(line.trim_end_matches(['\r', '\n'])) {
            headings += 1;
            if headings == 2 {
                return &text[offset..];
            }
        }
        offset += line.len();
    }
    ""
}

/// Parse the synced region of a file.
pub fn parse(text: &str) -> Result<Bookmark, FormatError> {
    let lines: Vec<&str> = text.lines().collect();
    let start = lines
        .iter()
        .position(|line| is_top_level(line))
        .ok_or(FormatError::MissingHeading)?;

    let (url, title, read_later, tags) = parse_heading(&lines[start][1..])?;

    let mut i = start + 1;
    let mut properties = HashMap::new();
    if lines.get(i).map(|line| line.trim()) == Some(":PROPERTIES:") {
        i += 1;
        loop {
            let line = lines.get(i).ok_or(FormatError::UnclosedDrawer)?.trim();
            i += 1;
            if line == ":END:" {
                break;
            }
            if let Some((key, value)) = line.strip_prefix(':').and_then(|rest| rest.split_once(':')) {
                properties.insert(key.to_ascii_uppercase(), value.trim().to_string());
            }
        }
    }

    let body_end = lines[i..]
        .iter()
        .position(|line| line.starts_with('*'))
        .map_or(lines.len(), |n| i + n);
    let description = join(&lines[i..body_end]);
    i = body_end;

    let mut annotations = Vec::new();
    while let Some(line) = lines.get(i) {
        if is_top_level(line) {
            break;
        }
        i += 1;
        if line.trim_end() == ANNOTATION_HEADING {
            let (annotation, next) = parse_annotation(&lines, i);
            annotations.push(annotation);
            i = next;
        }
    }

    Ok(Bookmark {
        url,
        title,
        description,
        tags,
        private: properties
            .get("SHARED")
            .is_some_and(|shared| !shared.eq_ignore_ascii_case("yes")),
        read_later,
        annotations,
    })
}

fn parse_heading(heading: &str) -> Result<(String, String, bool, TagSet), FormatError> {
    let heading = heading.trim_start();
    let (read_later, rest) = match heading.strip_prefix(READ_LATER_KEYWORD) {
        Some(rest) if rest.starts_with(' ') || rest.is_empty() => (true, rest.trim_start()),
        _ => (false, heading),
    };

    let link = rest
        .find("[[")
        .map(|open| &rest[open + 2..])
        .ok_or(FormatError::MissingLink)?;
    let (url, rest) = link.split_once("][").ok_or(FormatError::MissingLink)?;
    let close = rest.rfind("]]").ok_or(FormatError::MissingLink)?;
    let title = &rest[..close];
    let trailing = rest[close + 2..].trim();

    let tags = match trailing.strip_prefix(':').and_then(|t| t.strip_suffix(':')) {
        Some(inner) => inner.split(':').map(tag_from_org).collect(),
        None => TagSet::new(),
    };

    Ok((url.to_string(), title.to_string(), read_later, tags))
}

/// Parse one annotation subtree starting at line `i`; returns it with the
/// index of the first line after it.
fn parse_annotation(lines: &[&str], mut i: usize) -> (Annotation, usize) {
    let content_end = lines[i..]
        .iter()
        .position(|line| line.starts_with('*'))
        .map_or(lines.len(), |n| i + n);
    let content = join(&lines[i..content_end]);
    i = content_end;

    let mut comments = Vec::new();
    if lines.get(i).map(|line| line.trim_end()) == Some(COMMENTS_HEADING) {
        i += 1;
        while let Some(line) = lines.get(i) {
            if line.starts_with('*') {
                break;
            }
            i += 1;
            if line.trim() != BEGIN_QUOTE {
                continue;
            }

            let mut body = Vec::new();
            while let Some(line) = lines.get(i) {
                i += 1;
                if line.trim() == END_QUOTE {
                    break;
                }
                body.push(*line);
            }
            comments.push(parse_comment(&body));
        }
    }

    (Annotation { content, comments }, i)
}

fn parse_comment(body: &[&str]) -> Comment {
    let (text, attribution) = match body.split_last() {
        Some((last, rest)) if last.starts_with("-- ") => (rest, &last[3..]),
        _ => (body, ""),
    };
    let (user, created_at) = attribution.split_once(", ").unwrap_or((attribution, ""));

    Comment {
        content: join(text),
        user: user.to_string(),
        created_at: created_at.to_string(),
    }
}

fn join(lines: &[&str]) -> String {
    lines
        .iter()
        .map(|line| unescape(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}

/// The file name a record lives under.
pub fn file_name_for(record: &RemoteRecord) -> String {
    file_name(&record.identity, &record.bookmark.title)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> RemoteRecord {
        RemoteRecord::new(
            1_704_189_600,
            1_704_281_400,
            Bookmark::new("https://example.com", "Example: A Page!")
                .with_description("First line\n* not a heading\nlast")
                .with_tags(["rust", "machine learning"])
                .with_read_later(true),
        )
    }

    #[test]
    fn slugs() {
        assert_eq!(slugify("Example: A Page!"), "example a page");
        assert_eq!(slugify("  --Rust--  "), "rust");
        assert_eq!(slugify("???"), "untitled");
        assert_eq!(slugify(&"ab ".repeat(50)).chars().count(), 80);
    }

    #[test]
    fn file_names_carry_identity() {
        let name = file_name("0123456789", "Hello, World");
        assert_eq!(name, "0123456789 - hello world.org");
        assert_eq!(identity_of(&name), Some("0123456789"));
        assert_eq!(identity_of("notes.org"), None);
        assert_eq!(identity_of(" - untitled.org"), None);
        assert_eq!(identity_of("my notes - x.org"), None);
    }

    #[test]
    fn renders_layout() {
        let text = render(&record());
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("* NEXT [[https://example.com][Example: A Page!]]\t:machine%20learning:rust:")
        );
        assert_eq!(lines.next(), Some(":PROPERTIES:"));
        assert_eq!(lines.next(), Some(":CREATED: [2024-01-02 Tue 10:00:00]"));
        assert_eq!(lines.next(), Some(":UPDATED: [2024-01-03 Wed 11:30:00]"));
        assert_eq!(lines.next(), Some(":SHARED: yes"));
        assert_eq!(lines.next(), Some(":END:"));
        assert_eq!(lines.next(), Some("First line"));
        assert_eq!(lines.next(), Some(",* not a heading"));
    }

    #[test]
    fn parses_what_it_renders() {
        let mut expected = record();
        expected.bookmark.annotations = vec![Annotation {
            content: "quoted".into(),
            comments: vec![Comment {
                content: "agreed".into(),
                user: "bob".into(),
                created_at: "2024/01/03 11:30:00 +0000".into(),
            }],
        }];

        let parsed = parse(&render(&expected)).unwrap();
        assert_eq!(parsed, expected.bookmark);
    }

    #[test]
    fn tags_read_back_exactly() {
        assert_eq!(org_tag("machine learning"), "machine%20learning");
        assert_eq!(org_tag("a:b"), "a%3Ab");
        assert_eq!(org_tag("100%"), "100%25");
        assert_eq!(org_tag("rust"), "rust");

        for tag in ["machine learning", "a:b", "100%", "c++", "tab\there", "déjà vu"] {
            assert_eq!(tag_from_org(&org_tag(tag)), tag);
        }
        // Hand-written tags with a stray percent survive
        assert_eq!(tag_from_org("50%off"), "50%off");
    }

    #[test]
    fn parses_plain_heading() {
        let text = "\n* [[http://a][A]]\n:PROPERTIES:\n:SHARED: no\n:END:\n";
        let bookmark = parse(text).unwrap();
        assert_eq!(bookmark.url, "http://a");
        assert_eq!(bookmark.title, "A");
        assert!(bookmark.private);
        assert!(!bookmark.read_later);
        assert!(bookmark.tags.is_empty());
        assert_eq!(bookmark.description, "");
    }

    #[test]
    fn description_stops_at_user_heading() {
        let text = "* [[http://a][A]]\nnotes\n\n* My own heading\nprivate";
        let bookmark = parse(text).unwrap();
        assert_eq!(bookmark.description, "notes");
        assert_eq!(tail(text), "* My own heading\nprivate");
    }

    #[test]
    fn malformed_files() {
        assert_eq!(parse("just text"), Err(FormatError::MissingHeading));
        assert_eq!(parse("* no link here"), Err(FormatError::MissingLink));
        assert_eq!(
            parse("* [[http://a][A]]\n:PROPERTIES:\n:SHARED: yes\n"),
            Err(FormatError::UnclosedDrawer)
        );
    }

    #[test]
    fn splice_keeps_tail() {
        let existing = "* [[http://a][Old]]\nold notes\n\n* Reading log\n- finished chapter 2\n";
        let spliced = splice(existing, &record());

        assert!(spliced.starts_with("* NEXT [[https://example.com]"));
        assert!(spliced.ends_with("\n* Reading log\n- finished chapter 2\n"));
        assert!(!spliced.contains("old notes"));
        assert_eq!(splice(&spliced, &record()), spliced);
    }

    #[test]
    fn record_file_name_uses_identity() {
        let record = record();
        let name = file_name_for(&record);
        assert_eq!(identity_of(&name), Some(record.identity.as_str()));
        assert!(name.ends_with(" - example a page.org"));
    }
}
