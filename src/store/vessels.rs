//! Vessel, history, and watchlist operations.

use chrono::{DateTime, Duration, Utc};

use crate::types::{Vessel, VesselHistory, VesselId, VesselWatchlist};

use super::{be, decode, decode_all, encode, FleetStore, StoreError, StoreResult};

impl FleetStore {
    // ========================================================================
    // Vessels
    // ========================================================================

    /// Insert a new vessel, enforcing MMSI uniqueness among non-absorbed rows.
    pub fn insert_vessel(&self, vessel: &Vessel) -> StoreResult<()> {
        if let Some(existing) = self.vessel_by_mmsi(&vessel.mmsi)? {
            if !existing.is_absorbed() && existing.vessel_id != vessel.vessel_id {
                return Err(StoreError::Constraint(format!(
                    "MMSI {} already belongs to vessel {}",
                    vessel.mmsi, existing.vessel_id
                )));
            }
        }
        self.vessels.insert(be(vessel.vessel_id), encode(vessel)?)?;
        self.vessels_by_mmsi
            .insert(vessel.mmsi.as_bytes(), &be(vessel.vessel_id))?;
        Ok(())
    }

    /// Update an existing vessel in place.
    ///
    /// Enforces the no-self-merge invariant and the immutability of
    /// `mmsi_first_seen_utc` once set.
    pub fn update_vessel(&self, vessel: &Vessel) -> StoreResult<()> {
        if vessel.merged_into_vessel_id == Some(vessel.vessel_id) {
            return Err(StoreError::Constraint(format!(
                "vessel {} cannot be its own merge target",
                vessel.vessel_id
            )));
        }
        let current = self.vessel(vessel.vessel_id)?;
        let mut updated = vessel.clone();
        if let Some(first_seen) = current.mmsi_first_seen_utc {
            updated.mmsi_first_seen_utc = Some(first_seen);
        }
        self.vessels.insert(be(vessel.vessel_id), encode(&updated)?)?;
        Ok(())
    }

    pub fn vessel(&self, vessel_id: VesselId) -> StoreResult<Vessel> {
        self.vessels
            .get(be(vessel_id))?
            .map(|v| decode(&v))
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(format!("vessel {vessel_id}")))
    }

    pub fn vessel_by_mmsi(&self, mmsi: &str) -> StoreResult<Option<Vessel>> {
        let Some(id_bytes) = self.vessels_by_mmsi.get(mmsi.as_bytes())? else {
            return Ok(None);
        };
        let mut id = [0u8; 8];
        id.copy_from_slice(&id_bytes);
        match self.vessels.get(id)? {
            Some(v) => Ok(Some(decode(&v)?)),
            None => Ok(None),
        }
    }

    pub fn all_vessels(&self) -> StoreResult<Vec<Vessel>> {
        decode_all(&self.vessels)
    }

    /// All vessels that have not been absorbed by a merge.
    pub fn active_vessels(&self) -> StoreResult<Vec<Vessel>> {
        Ok(self
            .all_vessels()?
            .into_iter()
            .filter(|v| !v.is_absorbed())
            .collect())
    }

    /// Delete a vessel and cascade to its owned rows (points, events,
    /// history, watchlist).
    ///
    /// Vessels are never deleted by the pipeline; this exists for operator
    /// cleanup of test imports.
    pub fn delete_vessel(&self, vessel_id: VesselId) -> StoreResult<()> {
        let vessel = self.vessel(vessel_id)?;
        self.delete_points_for_vessel(vessel_id)?;
        for gap in self.gap_events_for_vessel(vessel_id)? {
            self.gap_events.remove(be(gap.gap_event_id))?;
        }
        for anomaly in self.anomalies_for_vessel(vessel_id)? {
            self.spoofing.remove(be(anomaly.anomaly_id))?;
        }
        for row in self.history_for_vessel(vessel_id)? {
            self.history.remove(be(row.history_id))?;
        }
        for entry in self.watchlist_for_vessel(vessel_id)? {
            self.watchlist.remove(be(entry.watchlist_id))?;
        }
        for event in self.loitering_for_vessel(vessel_id)? {
            self.loitering.remove(be(event.loitering_id))?;
        }
        for call in self.port_calls_for_vessel(vessel_id)? {
            self.port_calls.remove(be(call.port_call_id))?;
        }
        self.vessels_by_mmsi.remove(vessel.mmsi.as_bytes())?;
        self.vessels.remove(be(vessel_id))?;
        Ok(())
    }

    /// Resolve an identity to its canonical vessel by walking
    /// `merged_into_vessel_id` (bounded depth 10).
    pub fn canonical_vessel(&self, vessel_id: VesselId) -> StoreResult<Vessel> {
        let mut current = self.vessel(vessel_id)?;
        for _ in 0..10 {
            match current.merged_into_vessel_id {
                Some(next) => current = self.vessel(next)?,
                None => return Ok(current),
            }
        }
        // A chain this deep means corrupted merge records; surface the last
        // resolved identity rather than looping.
        tracing::warn!(vessel_id, "merge chain exceeded depth 10");
        Ok(current)
    }

    // ========================================================================
    // Vessel history
    // ========================================================================

    /// Record an identity-field change, deduplicating identical rows within
    /// ±24 h of `observed_at`.
    ///
    /// Returns the new row id, or `None` when deduplicated away.
    pub fn record_history(
        &self,
        vessel_id: VesselId,
        field: &str,
        old_value: &str,
        new_value: &str,
        observed_at: DateTime<Utc>,
        source: &str,
    ) -> StoreResult<Option<u64>> {
        let window = Duration::hours(24);
        let duplicate = self.history_for_vessel(vessel_id)?.into_iter().any(|h| {
            h.field_changed == field
                && h.old_value == old_value
                && h.new_value == new_value
                && (h.observed_at - observed_at).abs() <= window
        });
        if duplicate {
            return Ok(None);
        }
        let history_id = self.next_id()?;
        let row = VesselHistory {
            history_id,
            vessel_id,
            field_changed: field.to_string(),
            old_value: old_value.to_string(),
            new_value: new_value.to_string(),
            observed_at,
            source: source.to_string(),
        };
        self.history.insert(be(history_id), encode(&row)?)?;
        Ok(Some(history_id))
    }

    pub fn history_for_vessel(&self, vessel_id: VesselId) -> StoreResult<Vec<VesselHistory>> {
        let mut rows: Vec<VesselHistory> = decode_all::<VesselHistory>(&self.history)?
            .into_iter()
            .filter(|h| h.vessel_id == vessel_id)
            .collect();
        rows.sort_by_key(|h| h.observed_at);
        Ok(rows)
    }

    /// All history rows with the given `field_changed`, ordered by vessel
    /// then observation time.
    pub fn history_by_field(&self, field: &str) -> StoreResult<Vec<VesselHistory>> {
        let mut rows: Vec<VesselHistory> = decode_all::<VesselHistory>(&self.history)?
            .into_iter()
            .filter(|h| h.field_changed == field)
            .collect();
        rows.sort_by_key(|h| (h.vessel_id, h.observed_at));
        Ok(rows)
    }

    // ========================================================================
    // Watchlist
    // ========================================================================

    pub fn insert_watchlist_entry(&self, entry: &VesselWatchlist) -> StoreResult<()> {
        self.watchlist
            .insert(be(entry.watchlist_id), encode(entry)?)?;
        Ok(())
    }

    pub fn watchlist_for_vessel(&self, vessel_id: VesselId) -> StoreResult<Vec<VesselWatchlist>> {
        Ok(decode_all::<VesselWatchlist>(&self.watchlist)?
            .into_iter()
            .filter(|w| w.vessel_id == vessel_id)
            .collect())
    }

    /// Active (non-soft-deleted) watchlist entries for a vessel.
    pub fn active_watchlist_for_vessel(
        &self,
        vessel_id: VesselId,
    ) -> StoreResult<Vec<VesselWatchlist>> {
        Ok(self
            .watchlist_for_vessel(vessel_id)?
            .into_iter()
            .filter(|w| w.is_active)
            .collect())
    }

    /// Soft-delete a watchlist entry.
    pub fn deactivate_watchlist_entry(&self, watchlist_id: u64) -> StoreResult<()> {
        let mut entry: VesselWatchlist = self
            .watchlist
            .get(be(watchlist_id))?
            .map(|v| decode(&v))
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(format!("watchlist entry {watchlist_id}")))?;
        entry.is_active = false;
        self.watchlist.insert(be(watchlist_id), encode(&entry)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn test_insert_and_lookup_by_mmsi() {
        let store = FleetStore::temporary().unwrap();
        let v = Vessel::new(1, "636017000", ts(0));
        store.insert_vessel(&v).unwrap();
        let found = store.vessel_by_mmsi("636017000").unwrap().unwrap();
        assert_eq!(found.vessel_id, 1);
        assert!(store.vessel_by_mmsi("999999999").unwrap().is_none());
    }

    #[test]
    fn test_duplicate_mmsi_rejected() {
        let store = FleetStore::temporary().unwrap();
        store.insert_vessel(&Vessel::new(1, "636017000", ts(0))).unwrap();
        let err = store.insert_vessel(&Vessel::new(2, "636017000", ts(1)));
        assert!(matches!(err, Err(StoreError::Constraint(_))));
    }

    #[test]
    fn test_self_merge_rejected() {
        let store = FleetStore::temporary().unwrap();
        let mut v = Vessel::new(1, "636017000", ts(0));
        store.insert_vessel(&v).unwrap();
        v.merged_into_vessel_id = Some(1);
        assert!(matches!(
            store.update_vessel(&v),
            Err(StoreError::Constraint(_))
        ));
    }

    #[test]
    fn test_first_seen_is_immutable() {
        let store = FleetStore::temporary().unwrap();
        let v = Vessel::new(1, "636017000", ts(0));
        store.insert_vessel(&v).unwrap();
        let mut changed = v.clone();
        changed.mmsi_first_seen_utc = Some(ts(5));
        store.update_vessel(&changed).unwrap();
        assert_eq!(store.vessel(1).unwrap().mmsi_first_seen_utc, Some(ts(0)));
    }

    #[test]
    fn test_history_dedup_within_24h() {
        let store = FleetStore::temporary().unwrap();
        store.insert_vessel(&Vessel::new(1, "636017000", ts(0))).unwrap();
        let first = store
            .record_history(1, "flag", "LR", "PW", ts(1), "ais_csv")
            .unwrap();
        assert!(first.is_some());
        // Identical change 2 h later is deduplicated.
        let second = store
            .record_history(1, "flag", "LR", "PW", ts(3), "ais_csv")
            .unwrap();
        assert!(second.is_none());
        // Different values are recorded.
        let third = store
            .record_history(1, "flag", "PW", "KM", ts(4), "ais_csv")
            .unwrap();
        assert!(third.is_some());
        assert_eq!(store.history_for_vessel(1).unwrap().len(), 2);
    }

    #[test]
    fn test_canonical_resolution_walks_chain() {
        let store = FleetStore::temporary().unwrap();
        let a = Vessel::new(1, "111111111", ts(0));
        let mut b = Vessel::new(2, "222222222", ts(0));
        let mut c = Vessel::new(3, "333333333", ts(0));
        store.insert_vessel(&a).unwrap();
        store.insert_vessel(&b).unwrap();
        store.insert_vessel(&c).unwrap();
        b.merged_into_vessel_id = Some(1);
        c.merged_into_vessel_id = Some(2);
        store.update_vessel(&b).unwrap();
        store.update_vessel(&c).unwrap();
        assert_eq!(store.canonical_vessel(3).unwrap().vessel_id, 1);
    }

    #[test]
    fn test_watchlist_soft_delete() {
        let store = FleetStore::temporary().unwrap();
        store.insert_vessel(&Vessel::new(1, "636017000", ts(0))).unwrap();
        let entry = VesselWatchlist {
            watchlist_id: 7,
            vessel_id: 1,
            source_list: "OFAC".into(),
            reason: None,
            added_at_utc: ts(0),
            is_active: true,
        };
        store.insert_watchlist_entry(&entry).unwrap();
        assert_eq!(store.active_watchlist_for_vessel(1).unwrap().len(), 1);
        store.deactivate_watchlist_entry(7).unwrap();
        assert_eq!(store.active_watchlist_for_vessel(1).unwrap().len(), 0);
        assert_eq!(store.watchlist_for_vessel(1).unwrap().len(), 1);
    }
}
