//! Gateway services: admission control, caching, fetching and the ledger.

pub mod abuse;
pub mod ingest;
pub mod preview_cache;
pub mod rate_limit;
pub mod sweeper;
pub mod youtube;
