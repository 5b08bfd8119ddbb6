//! The instant the last clean sync finished.

use crate::{error::Result, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Records modified strictly after the watermark count as changed.
///
/// Read once when a run starts and written once when it ends cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Watermark(Timestamp);

impl Watermark {
    /// Watermark of a directory that has never been synced: everything is
    /// new.
    pub const ORIGIN: Watermark = Watermark(0);

    pub fn at(timestamp: Timestamp) -> Self {
        Self(timestamp)
    }

    pub fn as_secs(&self) -> Timestamp {
        self.0
    }

    /// The watermark to store after a run that finished at `finished_at`.
    ///
    /// One second past the finish so records written during the run (whose
    /// modification time may round down to `finished_at`) are not seen as
    /// changed next time. Never moves backwards.
    pub fn advance(self, finished_at: Timestamp) -> Self {
        self.max(Watermark(finished_at.saturating_add(1)))
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::ORIGIN
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Persistence for the watermark.
pub trait WatermarkStore {
    /// Read the stored watermark; `None` if no sync has completed yet.
    fn load(&self) -> Result<Option<Watermark>>;

    /// Store a new watermark. Implementations must make the write atomic.
    fn save(&mut self, watermark: Watermark) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_moves_past_finish() {
        assert_eq!(Watermark::at(10).advance(20), Watermark::at(21));
    }

    #[test]
    fn advance_never_regresses() {
        assert_eq!(Watermark::at(50).advance(20), Watermark::at(50));
        assert_eq!(Watermark::ORIGIN.advance(0), Watermark::at(1));
    }

    #[test]
    fn serializes_as_number() {
        assert_eq!(serde_json::to_string(&Watermark::at(42)).unwrap(), "42");
        assert_eq!(Watermark::at(42).to_string(), "42");
    }
}
