//! Pairing records across stores by identity.
//!
//! A match is only ever unique. When an identity occurs more than once in a
//! set the lookup is ambiguous and callers treat it as no match.

use crate::{Identity, LocalEntry, LocalRecord, RemoteRecord};
use std::collections::HashMap;

/// Anything that can be looked up by identity.
pub trait Keyed {
    fn key(&self) -> &str;

    /// What a user would recognise the record by: a file or a URL.
    fn label(&self) -> &str;
}

impl Keyed for RemoteRecord {
    fn key(&self) -> &str {
        &self.identity
    }

    fn label(&self) -> &str {
        &self.bookmark.url
    }
}

impl Keyed for LocalEntry {
    fn key(&self) -> &str {
        &self.identity
    }

    fn label(&self) -> &str {
        self.handle.as_str()
    }
}

impl Keyed for LocalRecord {
    fn key(&self) -> &str {
        self.identity()
    }

    fn label(&self) -> &str {
        self.handle().as_str()
    }
}

/// Result of looking an identity up in a set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    /// Exactly one record, at this position
    Unique(usize),
    Absent,
    /// This many records share the identity
    Ambiguous(usize),
}

impl MatchOutcome {
    pub fn position(&self) -> Option<usize> {
        match self {
            MatchOutcome::Unique(index) => Some(*index),
            _ => None,
        }
    }
}

/// Return the unique record in `set` with the given identity.
///
/// Absent and ambiguous lookups both yield `None`.
pub fn find<'a, T: Keyed>(set: &'a [T], identity: &str) -> Option<&'a T> {
    let mut found = set.iter().filter(|record| record.key() == identity);
    match (found.next(), found.next()) {
        (Some(record), None) => Some(record),
        _ => None,
    }
}

/// Identity lookup table over one snapshot.
#[derive(Debug, Clone, Default)]
pub struct IdentityIndex {
    positions: HashMap<Identity, Vec<usize>>,
}

impl IdentityIndex {
    pub fn build<T: Keyed>(set: &[T]) -> Self {
        let mut positions: HashMap<Identity, Vec<usize>> = HashMap::with_capacity(set.len());
        for (index, record) in set.iter().enumerate() {
            positions
                .entry(record.key().to_string())
                .or_default()
                .push(index);
        }
        Self { positions }
    }

    pub fn lookup(&self, identity: &str) -> MatchOutcome {
        match self.positions.get(identity).map(Vec::as_slice) {
            None | Some([]) => MatchOutcome::Absent,
            Some([index]) => MatchOutcome::Unique(*index),
            Some(many) => MatchOutcome::Ambiguous(many.len()),
        }
    }

    /// Identities held by more than one record, with the positions of those
    /// records, sorted by identity.
    pub fn duplicates(&self) -> Vec<(&Identity, &[usize])> {
        let mut duplicates: Vec<_> = self
            .positions
            .iter()
            .filter(|(_, positions)| positions.len() > 1)
            .map(|(identity, positions)| (identity, positions.as_slice()))
            .collect();
        duplicates.sort();
        duplicates
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LocalHandle;

    fn entries(ids: &[&str]) -> Vec<LocalEntry> {
        ids.iter()
            .map(|id| LocalEntry::new(*id, 0, LocalHandle::new(format!("{id}.org"))))
            .collect()
    }

    #[test]
    fn find_unique() {
        let set = entries(&["a", "b"]);
        assert_eq!(find(&set, "b").unwrap().handle.as_str(), "b.org");
        assert!(find(&set, "c").is_none());
    }

    #[test]
    fn find_ambiguous_is_none() {
        let set = entries(&["a", "b", "a"]);
        assert!(find(&set, "a").is_none());
        assert!(find(&set, "b").is_some());
    }

    #[test]
    fn index_lookup() {
        let set = entries(&["a", "b", "a"]);
        let index = IdentityIndex::build(&set);

        assert_eq!(index.lookup("b"), MatchOutcome::Unique(1));
        assert_eq!(index.lookup("a"), MatchOutcome::Ambiguous(2));
        assert_eq!(index.lookup("z"), MatchOutcome::Absent);
        assert_eq!(index.lookup("a").position(), None);
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn duplicates_listed() {
        let set = entries(&["c", "a", "c", "b", "a", "a"]);
        let index = IdentityIndex::build(&set);
        let duplicates: Vec<_> = index
            .duplicates()
            .into_iter()
            .map(|(id, positions)| (id.as_str(), positions.to_vec()))
            .collect();
        assert_eq!(duplicates, vec![("a", vec![1, 4, 5]), ("c", vec![0, 2])]);
        assert_eq!(set[2].label(), "c.org");
    }
}
