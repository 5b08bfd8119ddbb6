//! The Diigo remote store.

pub mod client;
pub mod wire;

pub use client::DiigoClient;
