//! AIS point and rolling-observation operations.

use chrono::{DateTime, Duration, Utc};

use crate::types::{source_quality, AisObservation, AisPoint, VesselId, OBSERVATION_RETENTION_HOURS};

use super::{be, decode, encode, point_key, FleetStore, StoreResult};

/// Outcome of an AIS point insert under the dedup policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointInsertOutcome {
    Created,
    /// Existing row replaced by a higher-quality source.
    Replaced,
    /// Duplicate ignored (existing source equal or better).
    Ignored,
}

impl FleetStore {
    // ========================================================================
    // AIS points
    // ========================================================================

    /// Insert a point under the `(vessel_id, timestamp)` dedup policy.
    ///
    /// A duplicate from a higher-quality source replaces the stored row;
    /// otherwise the new row is ignored.
    pub fn insert_point(&self, point: &AisPoint) -> StoreResult<PointInsertOutcome> {
        let key = point_key(point.vessel_id, point.timestamp_utc.timestamp_millis());
        if let Some(existing_bytes) = self.ais_points.get(key)? {
            let existing: AisPoint = decode(&existing_bytes)?;
            if source_quality(&point.source) > source_quality(&existing.source) {
                self.ais_points.insert(key, encode(point)?)?;
                tracing::debug!(
                    vessel_id = point.vessel_id,
                    ts = %point.timestamp_utc,
                    new_source = %point.source,
                    old_source = %existing.source,
                    "replaced AIS point with higher-quality source"
                );
                return Ok(PointInsertOutcome::Replaced);
            }
            return Ok(PointInsertOutcome::Ignored);
        }
        self.ais_points.insert(key, encode(point)?)?;
        Ok(PointInsertOutcome::Created)
    }

    /// All points for a vessel in ascending timestamp order.
    pub fn points_for_vessel(&self, vessel_id: VesselId) -> StoreResult<Vec<AisPoint>> {
        let mut points = Vec::new();
        for item in self.ais_points.scan_prefix(be(vessel_id)) {
            let (_key, value) = item?;
            points.push(decode(&value)?);
        }
        Ok(points)
    }

    /// Points for a vessel within `[from, to]`, ascending.
    pub fn points_for_vessel_between(
        &self,
        vessel_id: VesselId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<AisPoint>> {
        let start = point_key(vessel_id, from.timestamp_millis());
        let end = point_key(vessel_id, to.timestamp_millis());
        let mut points = Vec::new();
        for item in self.ais_points.range(start..=end) {
            let (_key, value) = item?;
            points.push(decode(&value)?);
        }
        Ok(points)
    }

    /// Last point at or before `at` for a vessel.
    pub fn last_point_before(
        &self,
        vessel_id: VesselId,
        at: DateTime<Utc>,
    ) -> StoreResult<Option<AisPoint>> {
        let start = point_key(vessel_id, 0);
        let end = point_key(vessel_id, at.timestamp_millis());
        match self.ais_points.range(start..=end).last() {
            Some(item) => {
                let (_key, value) = item?;
                Ok(Some(decode(&value)?))
            }
            None => Ok(None),
        }
    }

    /// Most recent point for a vessel.
    pub fn last_point(&self, vessel_id: VesselId) -> StoreResult<Option<AisPoint>> {
        match self.ais_points.scan_prefix(be(vessel_id)).last() {
            Some(item) => {
                let (_key, value) = item?;
                Ok(Some(decode(&value)?))
            }
            None => Ok(None),
        }
    }

    /// First point for a vessel.
    pub fn first_point(&self, vessel_id: VesselId) -> StoreResult<Option<AisPoint>> {
        match self.ais_points.scan_prefix(be(vessel_id)).next() {
            Some(item) => {
                let (_key, value) = item?;
                Ok(Some(decode(&value)?))
            }
            None => Ok(None),
        }
    }

    /// All points across vessels within a time window (GFW correlation).
    pub fn points_in_window(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<AisPoint>> {
        let mut points = Vec::new();
        for item in self.ais_points.iter() {
            let (_key, value) = item?;
            let point: AisPoint = decode(&value)?;
            if point.timestamp_utc >= from && point.timestamp_utc <= to {
                points.push(point);
            }
        }
        Ok(points)
    }

    pub fn delete_points_for_vessel(&self, vessel_id: VesselId) -> StoreResult<usize> {
        let mut keys = Vec::new();
        for item in self.ais_points.scan_prefix(be(vessel_id)) {
            let (key, _value) = item?;
            keys.push(key);
        }
        let count = keys.len();
        for key in keys {
            self.ais_points.remove(key)?;
        }
        Ok(count)
    }

    /// Move all points from one vessel to another (merge FK rewrite).
    ///
    /// A point colliding with an existing `(vessel, timestamp)` on the target
    /// falls under the normal dedup policy.
    pub fn reassign_points(
        &self,
        from_vessel: VesselId,
        to_vessel: VesselId,
    ) -> StoreResult<usize> {
        let points = self.points_for_vessel(from_vessel)?;
        let count = points.len();
        for mut point in points {
            let old_key = point_key(from_vessel, point.timestamp_utc.timestamp_millis());
            self.ais_points.remove(old_key)?;
            point.vessel_id = to_vessel;
            self.insert_point(&point)?;
        }
        Ok(count)
    }

    // ========================================================================
    // Rolling observations
    // ========================================================================

    /// Append a raw observation (not deduplicated).
    pub fn append_observation(&self, observation: &AisObservation) -> StoreResult<()> {
        let mut key = [0u8; 16];
        key[..8].copy_from_slice(&(observation.timestamp_utc.timestamp_millis() as u64).to_be_bytes());
        key[8..].copy_from_slice(&observation.observation_id.to_be_bytes());
        self.observations.insert(key, encode(observation)?)?;
        Ok(())
    }

    pub fn observations_for_vessel(&self, vessel_id: VesselId) -> StoreResult<Vec<AisObservation>> {
        let mut out = Vec::new();
        for item in self.observations.iter() {
            let (_key, value) = item?;
            let obs: AisObservation = decode(&value)?;
            if obs.vessel_id == vessel_id {
                out.push(obs);
            }
        }
        Ok(out)
    }

    /// Purge observations older than the 72 h rolling window.
    pub fn purge_stale_observations(&self, now: DateTime<Utc>) -> StoreResult<usize> {
        let cutoff = now - Duration::hours(OBSERVATION_RETENTION_HOURS);
        let cutoff_millis = (cutoff.timestamp_millis() as u64).to_be_bytes();
        let mut keys = Vec::new();
        for item in self.observations.iter() {
            let (key, _value) = item?;
            if key.len() >= 8 && key[..8] < cutoff_millis[..] {
                keys.push(key);
            } else {
                // Keys are time-ordered; everything past the cutoff stays.
                break;
            }
        }
        let count = keys.len();
        for key in keys {
            self.observations.remove(key)?;
        }
        if count > 0 {
            tracing::info!(purged = count, "purged stale AIS observations");
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AisClass;
    use chrono::TimeZone;

    fn point(vessel_id: u64, h: u32, source: &str) -> AisPoint {
        AisPoint {
            vessel_id,
            timestamp_utc: Utc.with_ymd_and_hms(2025, 6, 1, h, 0, 0).unwrap(),
            lat: 55.0,
            lon: 12.0,
            sog: Some(10.0),
            cog: Some(180.0),
            heading: None,
            nav_status: None,
            ais_class: AisClass::A,
            source: source.to_string(),
        }
    }

    #[test]
    fn test_dedup_ignores_equal_quality() {
        let store = FleetStore::temporary().unwrap();
        assert_eq!(
            store.insert_point(&point(1, 0, "csv_import")).unwrap(),
            PointInsertOutcome::Created
        );
        assert_eq!(
            store.insert_point(&point(1, 0, "csv_import")).unwrap(),
            PointInsertOutcome::Ignored
        );
        assert_eq!(store.points_for_vessel(1).unwrap().len(), 1);
    }

    #[test]
    fn test_dedup_replaces_with_higher_quality() {
        let store = FleetStore::temporary().unwrap();
        store.insert_point(&point(1, 0, "terrestrial")).unwrap();
        assert_eq!(
            store.insert_point(&point(1, 0, "satellite")).unwrap(),
            PointInsertOutcome::Replaced
        );
        let stored = store.points_for_vessel(1).unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].source, "satellite");
        // And never downgrades.
        assert_eq!(
            store.insert_point(&point(1, 0, "terrestrial")).unwrap(),
            PointInsertOutcome::Ignored
        );
    }

    #[test]
    fn test_points_are_time_ordered() {
        let store = FleetStore::temporary().unwrap();
        store.insert_point(&point(1, 5, "csv_import")).unwrap();
        store.insert_point(&point(1, 1, "csv_import")).unwrap();
        store.insert_point(&point(1, 3, "csv_import")).unwrap();
        let points = store.points_for_vessel(1).unwrap();
        let hours: Vec<u32> = points
            .iter()
            .map(|p| {
                use chrono::Timelike;
                p.timestamp_utc.hour()
            })
            .collect();
        assert_eq!(hours, vec![1, 3, 5]);
    }

    #[test]
    fn test_last_point_before() {
        let store = FleetStore::temporary().unwrap();
        store.insert_point(&point(1, 1, "csv_import")).unwrap();
        store.insert_point(&point(1, 5, "csv_import")).unwrap();
        let at = Utc.with_ymd_and_hms(2025, 6, 1, 3, 0, 0).unwrap();
        let found = store.last_point_before(1, at).unwrap().unwrap();
        use chrono::Timelike;
        assert_eq!(found.timestamp_utc.hour(), 1);
    }

    #[test]
    fn test_reassign_points() {
        let store = FleetStore::temporary().unwrap();
        store.insert_point(&point(1, 1, "csv_import")).unwrap();
        store.insert_point(&point(1, 2, "csv_import")).unwrap();
        store.insert_point(&point(2, 3, "csv_import")).unwrap();
        let moved = store.reassign_points(1, 2).unwrap();
        assert_eq!(moved, 2);
        assert_eq!(store.points_for_vessel(1).unwrap().len(), 0);
        assert_eq!(store.points_for_vessel(2).unwrap().len(), 3);
    }

    #[test]
    fn test_observation_purge() {
        let store = FleetStore::temporary().unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 10, 0, 0, 0).unwrap();
        let old = AisObservation {
            observation_id: 1,
            vessel_id: 1,
            timestamp_utc: now - Duration::hours(100),
            lat: 55.0,
            lon: 12.0,
            sog: None,
            cog: None,
            source: "terrestrial".into(),
            received_at_utc: now - Duration::hours(100),
        };
        let fresh = AisObservation {
            observation_id: 2,
            timestamp_utc: now - Duration::hours(10),
            received_at_utc: now - Duration::hours(10),
            ..old.clone()
        };
        store.append_observation(&old).unwrap();
        store.append_observation(&fresh).unwrap();
        let purged = store.purge_stale_observations(now).unwrap();
        assert_eq!(purged, 1);
        assert_eq!(store.observations_for_vessel(1).unwrap().len(), 1);
    }
}
