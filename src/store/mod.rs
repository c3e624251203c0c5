//! Embedded persistence layer.
//!
//! One sled tree per entity, JSON-serialized values, big-endian integer keys
//! so iteration order is id/time order. AIS points use a composite
//! `(vessel_id, timestamp)` key, which makes per-vessel chronological scans a
//! prefix iteration.
//!
//! The store owns referential rules: vessel cascade deletes, merge FK
//! rewrites, the no-self-merge check, and the 72 h observation purge.

mod admin;
mod events;
mod points;
mod reference;
mod vessels;

pub use admin::AffectedRecords;
pub use points::PointInsertOutcome;

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Storage errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sled::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("constraint violated: {0}")]
    Constraint(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Handle to the embedded fleet database.
#[derive(Clone)]
pub struct FleetStore {
    db: sled::Db,
    pub(crate) vessels: sled::Tree,
    pub(crate) vessels_by_mmsi: sled::Tree,
    pub(crate) ais_points: sled::Tree,
    pub(crate) observations: sled::Tree,
    pub(crate) gap_events: sled::Tree,
    pub(crate) spoofing: sled::Tree,
    pub(crate) sts_events: sled::Tree,
    pub(crate) loitering: sled::Tree,
    pub(crate) envelopes: sled::Tree,
    pub(crate) draught_events: sled::Tree,
    pub(crate) port_calls: sled::Tree,
    pub(crate) ports: sled::Tree,
    pub(crate) corridors: sled::Tree,
    pub(crate) baselines: sled::Tree,
    pub(crate) history: sled::Tree,
    pub(crate) watchlist: sled::Tree,
    pub(crate) merge_candidates: sled::Tree,
    pub(crate) merge_ops: sled::Tree,
    pub(crate) dark_detections: sled::Tree,
    pub(crate) satellite_checks: sled::Tree,
    pub(crate) fleet_alerts: sled::Tree,
    pub(crate) audit_log: sled::Tree,
    pub(crate) verification_log: sled::Tree,
    pub(crate) crea_voyages: sled::Tree,
    pub(crate) pipeline_runs: sled::Tree,
}

impl FleetStore {
    /// Open or create the database at the given directory.
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        let db = sled::open(path.as_ref())?;
        tracing::info!(path = %path.as_ref().display(), "fleet store opened");
        Self::from_db(db)
    }

    /// Open an in-memory store (tests, one-shot runs).
    pub fn temporary() -> StoreResult<Self> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(db)
    }

    fn from_db(db: sled::Db) -> StoreResult<Self> {
        Ok(Self {
            vessels: db.open_tree("vessels")?,
            vessels_by_mmsi: db.open_tree("vessels_by_mmsi")?,
            ais_points: db.open_tree("ais_points")?,
            observations: db.open_tree("ais_observations")?,
            gap_events: db.open_tree("ais_gap_events")?,
            spoofing: db.open_tree("spoofing_anomalies")?,
            sts_events: db.open_tree("sts_transfer_events")?,
            loitering: db.open_tree("loitering_events")?,
            envelopes: db.open_tree("movement_envelopes")?,
            draught_events: db.open_tree("draught_events")?,
            port_calls: db.open_tree("port_calls")?,
            ports: db.open_tree("ports")?,
            corridors: db.open_tree("corridors")?,
            baselines: db.open_tree("corridor_gap_baselines")?,
            history: db.open_tree("vessel_history")?,
            watchlist: db.open_tree("vessel_watchlist")?,
            merge_candidates: db.open_tree("merge_candidates")?,
            merge_ops: db.open_tree("merge_operations")?,
            dark_detections: db.open_tree("dark_vessel_detections")?,
            satellite_checks: db.open_tree("satellite_checks")?,
            fleet_alerts: db.open_tree("fleet_alerts")?,
            audit_log: db.open_tree("audit_log")?,
            verification_log: db.open_tree("verification_log")?,
            crea_voyages: db.open_tree("crea_voyages")?,
            pipeline_runs: db.open_tree("pipeline_runs")?,
            db,
        })
    }

    /// Allocate a fresh id (monotonic across the database).
    pub fn next_id(&self) -> StoreResult<u64> {
        // sled's counter starts at 0; entity ids start at 1.
        Ok(self.db.generate_id()? + 1)
    }

    /// Flush all trees to disk. Called by the orchestrator between steps.
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

// ============================================================================
// Key and value helpers
// ============================================================================

/// Big-endian id key.
pub(crate) fn be(id: u64) -> [u8; 8] {
    id.to_be_bytes()
}

/// Composite `(vessel_id, timestamp_millis)` key for AIS point trees.
pub(crate) fn point_key(vessel_id: u64, ts_millis: i64) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&vessel_id.to_be_bytes());
    // Timestamps are bounded below by the 2010 ingest floor, so the sign
    // bit never flips ordering.
    key[8..].copy_from_slice(&(ts_millis as u64).to_be_bytes());
    key
}

pub(crate) fn encode<T: Serialize>(value: &T) -> StoreResult<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
}

pub(crate) fn decode<T: DeserializeOwned>(bytes: &[u8]) -> StoreResult<T> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Decode every value in a tree, skipping corrupt rows with a warning.
pub(crate) fn decode_all<T: DeserializeOwned>(tree: &sled::Tree) -> StoreResult<Vec<T>> {
    let mut out = Vec::new();
    for item in tree.iter() {
        let (_key, value) = item?;
        match serde_json::from_slice::<T>(&value) {
            Ok(v) => out.push(v),
            Err(e) => tracing::warn!(error = %e, tree = ?tree.name(), "skipping undecodable row"),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_temporary() {
        let store = FleetStore::temporary().unwrap();
        assert_eq!(store.vessels.len(), 0);
    }

    #[test]
    fn test_ids_are_monotonic() {
        let store = FleetStore::temporary().unwrap();
        let a = store.next_id().unwrap();
        let b = store.next_id().unwrap();
        assert!(b > a);
        assert!(a >= 1);
    }

    #[test]
    fn test_point_key_orders_by_vessel_then_time() {
        let k1 = point_key(1, 1_000);
        let k2 = point_key(1, 2_000);
        let k3 = point_key(2, 0);
        assert!(k1 < k2);
        assert!(k2 < k3);
    }

    #[test]
    fn test_open_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = FleetStore::open(dir.path()).unwrap();
        store.flush().unwrap();
    }
}
