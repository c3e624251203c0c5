//! External data-source adapters.
//!
//! Each adapter implements the row/event contract of one upstream feed and
//! hands validated rows to the shared ingest path. Fetch plumbing uses the
//! shared retry utility with a per-provider delay vector.

pub mod aishub;
pub mod crea;
pub mod digitraffic;
pub mod emsa;
pub mod gfw;
pub mod kystverket;
pub mod noaa;

use async_trait::async_trait;

use crate::net::FetchError;
use crate::store::FleetStore;

/// A pollable external feed.
#[async_trait]
pub trait FeedAdapter: Send + Sync {
    fn name(&self) -> &'static str;

    /// Fetch and ingest one batch. Returns feed-specific counts.
    async fn fetch(&self, store: &FleetStore) -> Result<serde_json::Value, FetchError>;
}
