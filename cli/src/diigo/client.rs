//! Blocking client for the Diigo v2 bookmarks endpoint.

use super::wire::{DeleteBody, UploadBody, WireBookmark};
use crate::config::Config;
use marksync_engine::{
    Bookmark, Error, RemoteRecord, RemoteSnapshot, RemoteStore, SyncMode, Watermark,
};
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Method;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Records fetched after an upload to find the server's copy.
const ECHO_WINDOW: usize = 10;

const TIMEOUT: Duration = Duration::from_secs(30);

/// The remote store backed by a Diigo account.
pub struct DiigoClient {
    http: Client,
    endpoint: String,
    api_key: String,
    user: String,
    password: String,
    page_size: usize,
    limit: Option<usize>,
}

impl DiigoClient {
    pub fn new(config: &Config) -> reqwest::Result<Self> {
        let http = Client::builder()
            .timeout(TIMEOUT)
            .user_agent(concat!("marksync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            endpoint: format!("{}/bookmarks", config.base_url),
            api_key: config.api_key.clone(),
            user: config.user.clone(),
            password: config.password.clone(),
            page_size: config.page_size,
            limit: None,
        })
    }

    /// Stop fetching after `limit` records. A limited fetch is never
    /// complete.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn request(&self, method: Method) -> RequestBuilder {
        self.http
            .request(method, &self.endpoint)
            .basic_auth(&self.user, Some(&self.password))
            .query(&[("key", self.api_key.as_str()), ("user", self.user.as_str())])
    }

    /// One page, most recently updated first.
    fn fetch_page(&self, start: usize, count: usize) -> Result<Vec<RemoteRecord>, Error> {
        debug!(start, count, "fetching page");
        let page: Vec<WireBookmark> = self
            .request(Method::GET)
            .query(&[("filter", "all"), ("sort", "1")])
            .query(&[("count", count), ("start", start)])
            .send()
            .and_then(|response| response.error_for_status())
            .and_then(|response| response.json())
            .map_err(|err| Error::Fetch(err.to_string()))?;

        page.into_iter()
            .map(|wire| wire.into_record().map_err(|err| Error::Fetch(err.to_string())))
            .collect()
    }
}

impl RemoteStore for DiigoClient {
    fn fetch_all(&mut self, mode: SyncMode, watermark: Watermark) -> Result<RemoteSnapshot, Error> {
        let mut pager = Pager::new(mode, watermark, self.page_size, self.limit);
        while let Some(start) = pager.next_start() {
            let page = self.fetch_page(start, self.page_size)?;
            pager.accept(page);
        }
        let snapshot = pager.finish();
        info!(records = snapshot.records.len(), complete = snapshot.complete, "fetched bookmarks");
        Ok(snapshot)
    }

    fn save(&mut self, bookmark: &Bookmark) -> Result<Option<RemoteRecord>, Error> {
        self.request(Method::POST)
            .query(&[("merge", "no")])
            .json(&UploadBody::from(bookmark))
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|err| Error::store("upload", &bookmark.url, err.to_string()))?;

        // The service answers with a status only; its stored copy carries
        // the timestamps the identity derives from
        let recent = self.fetch_page(0, ECHO_WINDOW)?;
        match recent.into_iter().find(|record| record.bookmark.url == bookmark.url) {
            Some(stored) => Ok(Some(stored)),
            None => {
                warn!(url = %bookmark.url, "uploaded bookmark not among the most recent records");
                Err(Error::store(
                    "upload",
                    &bookmark.url,
                    "uploaded, but the stored copy could not be found",
                ))
            }
        }
    }

    fn delete(&mut self, record: &RemoteRecord) -> Result<(), Error> {
        self.request(Method::DELETE)
            .json(&DeleteBody::from(&record.bookmark))
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|err| Error::store("delete", &record.bookmark.url, err.to_string()))?;
        Ok(())
    }
}

/// Paging state of one fetch.
///
/// Pages arrive most recently updated first. An incremental fetch keeps only
/// records updated after the watermark and stops after the first page that
/// reaches one at or before it. Any fetch stops on a short page or at the
/// record limit.
#[derive(Debug)]
struct Pager {
    mode: SyncMode,
    watermark: Watermark,
    page_size: usize,
    limit: Option<usize>,
    records: Vec<RemoteRecord>,
    seen: usize,
    truncated: bool,
    done: bool,
}

impl Pager {
    fn new(mode: SyncMode, watermark: Watermark, page_size: usize, limit: Option<usize>) -> Self {
        Self {
            mode,
            watermark,
            page_size,
            limit,
            records: Vec::new(),
            seen: 0,
            truncated: false,
            done: limit == Some(0),
        }
    }

    /// Offset of the next page to request, if any.
    fn next_start(&self) -> Option<usize> {
        (!self.done).then_some(self.seen)
    }

    fn accept(&mut self, mut page: Vec<RemoteRecord>) {
        let len = page.len();
        self.seen += len;

        let incremental = !self.mode.fetches_everything();
        let reached_watermark = page
            .iter()
            .any(|record| record.modified_at <= self.watermark.as_secs());
        if incremental {
            page.retain(|record| record.modified_at > self.watermark.as_secs());
        }
        self.records.extend(page);

        if let Some(limit) = self.limit {
            if self.records.len() >= limit {
                self.records.truncate(limit);
                self.truncated = true;
                self.done = true;
            }
        }
        if len < self.page_size || (incremental && reached_watermark) {
            self.done = true;
        }
    }

    fn finish(self) -> RemoteSnapshot {
        if self.mode.fetches_everything() && !self.truncated {
            RemoteSnapshot::complete(self.records)
        } else {
            RemoteSnapshot::partial(self.records)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(modified: &[i64]) -> Vec<RemoteRecord> {
        modified
            .iter()
            .enumerate()
            .map(|(i, &m)| RemoteRecord::new(m, m, Bookmark::new(format!("http://{m}/{i}"), "t")))
            .collect()
    }

    fn drain(mut pager: Pager, pages: Vec<Vec<RemoteRecord>>) -> (RemoteSnapshot, Vec<usize>) {
        let mut starts = Vec::new();
        let mut pages = pages.into_iter();
        while let Some(start) = pager.next_start() {
            starts.push(start);
            pager.accept(pages.next().unwrap_or_default());
        }
        (pager.finish(), starts)
    }

    #[test]
    fn full_fetch_pages_until_short_page() {
        let pager = Pager::new(SyncMode::Full, Watermark::at(50), 2, None);
        let (snapshot, starts) = drain(pager, vec![page(&[90, 80]), page(&[40, 30]), page(&[20])]);

        assert_eq!(starts, vec![0, 2, 4]);
        assert!(snapshot.complete);
        assert_eq!(snapshot.records.len(), 5);
    }

    #[test]
    fn full_fetch_stops_on_empty_page() {
        let pager = Pager::new(SyncMode::Full, Watermark::ORIGIN, 2, None);
        let (snapshot, starts) = drain(pager, vec![page(&[90, 80]), vec![]]);
        assert_eq!(starts, vec![0, 2]);
        assert!(snapshot.complete);
    }

    #[test]
    fn incremental_stops_at_watermark() {
        let pager = Pager::new(SyncMode::Incremental, Watermark::at(50), 2, None);
        let (snapshot, starts) = drain(pager, vec![page(&[90, 80]), page(&[60, 40]), page(&[30, 20])]);

        assert_eq!(starts, vec![0, 2]);
        assert!(!snapshot.complete);
        let modified: Vec<i64> = snapshot.records.iter().map(|r| r.modified_at).collect();
        assert_eq!(modified, vec![90, 80, 60]);
    }

    #[test]
    fn limit_truncates_and_marks_partial() {
        let pager = Pager::new(SyncMode::Full, Watermark::ORIGIN, 2, Some(3));
        let (snapshot, starts) = drain(pager, vec![page(&[90, 80]), page(&[70, 60]), page(&[50, 40])]);

        assert_eq!(starts, vec![0, 2]);
        assert!(!snapshot.complete);
        assert_eq!(snapshot.records.len(), 3);
    }

    #[test]
    fn zero_limit_fetches_nothing() {
        let pager = Pager::new(SyncMode::Full, Watermark::ORIGIN, 2, Some(0));
        assert_eq!(pager.next_start(), None);
        assert!(!pager.finish().complete);
    }

    #[test]
    fn endpoint_is_built_from_config() {
        let config = Config {
            api_key: "k".into(),
            user: "u".into(),
            password: "p".into(),
            base_url: "https://example.test/api/v2".into(),
            dir: ".".into(),
            page_size: 100,
        };
        let client = DiigoClient::new(&config).unwrap().with_limit(Some(5));
        assert_eq!(client.endpoint(), "https://example.test/api/v2/bookmarks");
    }
}
