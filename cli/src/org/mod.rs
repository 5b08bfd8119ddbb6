//! The org-file local store.

pub mod format;
pub mod store;

pub use store::OrgStore;
