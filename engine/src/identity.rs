//! Stable cross-store identity.
//!
//! An identity is derived once from a record's creation time and URL, both
//! treated as immutable. Changing a bookmark's URL therefore yields a new
//! identity: the edit looks like one record deleted and another created.

use crate::{Identity, Timestamp};
use uuid::Uuid;

/// Length of an identity in hex characters (40 bits).
pub const IDENTITY_LEN: usize = 10;

/// Derive the identity for a record.
///
/// Deterministic: a name-based (v5) UUID over the seed, truncated to
/// [`IDENTITY_LEN`] hex characters so it fits in a file name prefix.
pub fn identity(created_at: Timestamp, url: &str) -> Identity {
    let seed = format!("{created_at}{url}");
    let uuid = Uuid::new_v5(&Uuid::NAMESPACE_URL, seed.as_bytes());
    let mut hex = uuid.simple().to_string();
    hex.truncate(IDENTITY_LEN);
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(identity(1000, "http://a"), identity(1000, "http://a"));
    }

    #[test]
    fn seed_parts_matter() {
        let base = identity(1000, "http://a");
        assert_ne!(base, identity(1001, "http://a"));
        assert_ne!(base, identity(1000, "http://b"));
    }

    #[test]
    fn shape() {
        let id = identity(1_209_508_134, "http://www.diigo.com/help/api.html");
        assert_eq!(id.len(), IDENTITY_LEN);
        assert!(id.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)));
    }
}
