//! Firestore REST API client and typed repositories.
//!
//! The accounts and materials repositories sit on top of a small REST
//! client with token caching and bounded retry. The one strongly
//! consistent primitive the gateway relies on is [`FirestoreClient::commit`]:
//! an atomic multi-write with per-write preconditions.

pub mod accounts;
pub mod client;
pub mod error;
pub mod materials;
mod metrics;
pub mod retry;
pub mod token_cache;
pub mod types;

pub use accounts::AccountRepository;
pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use materials::MaterialRepository;
pub use types::{
    Document, DocumentMask, FromFirestoreValue, Precondition, ToFirestoreValue, Value, Write,
};
