//! Detector event storage: gaps, spoofing anomalies, STS, loitering,
//! movement envelopes, and draught changes.

use chrono::{DateTime, Utc};

use crate::types::{
    AisGapEvent, AnomalyId, DraughtChangeEvent, GapEventId, LoiteringEvent, MovementEnvelope,
    SpoofingAnomaly, SpoofingType, StsId, StsTransferEvent, VesselId,
};

use super::{be, decode, decode_all, encode, FleetStore, StoreError, StoreResult};

impl FleetStore {
    // ========================================================================
    // Gap events
    // ========================================================================

    pub fn insert_gap_event(&self, gap: &AisGapEvent) -> StoreResult<()> {
        self.gap_events.insert(be(gap.gap_event_id), encode(gap)?)?;
        Ok(())
    }

    pub fn update_gap_event(&self, gap: &AisGapEvent) -> StoreResult<()> {
        if self.gap_events.get(be(gap.gap_event_id))?.is_none() {
            return Err(StoreError::NotFound(format!(
                "gap event {}",
                gap.gap_event_id
            )));
        }
        self.gap_events.insert(be(gap.gap_event_id), encode(gap)?)?;
        Ok(())
    }

    pub fn gap_event(&self, gap_event_id: GapEventId) -> StoreResult<AisGapEvent> {
        self.gap_events
            .get(be(gap_event_id))?
            .map(|v| decode(&v))
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(format!("gap event {gap_event_id}")))
    }

    pub fn all_gap_events(&self) -> StoreResult<Vec<AisGapEvent>> {
        decode_all(&self.gap_events)
    }

    pub fn gap_events_for_vessel(&self, vessel_id: VesselId) -> StoreResult<Vec<AisGapEvent>> {
        let mut gaps: Vec<AisGapEvent> = decode_all::<AisGapEvent>(&self.gap_events)?
            .into_iter()
            .filter(|g| g.vessel_id == vessel_id)
            .collect();
        gaps.sort_by_key(|g| g.gap_start_utc);
        Ok(gaps)
    }

    /// Gaps pending scoring: `risk_score = 0` and not flagged as feed outage.
    pub fn unscored_gap_events(&self) -> StoreResult<Vec<AisGapEvent>> {
        Ok(self
            .all_gap_events()?
            .into_iter()
            .filter(|g| g.risk_score == 0 && !g.is_feed_outage)
            .collect())
    }

    /// Does a gap with the same vessel and start time already exist?
    /// Keeps detection idempotent across pipeline re-runs.
    pub fn gap_exists(&self, vessel_id: VesselId, start: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self
            .all_gap_events()?
            .iter()
            .any(|g| g.vessel_id == vessel_id && g.gap_start_utc == start))
    }

    /// Gaps generated by the given identity (by `original_vessel_id`) with
    /// start time at or after `since`.
    pub fn gaps_by_identity_since(
        &self,
        original_vessel_id: VesselId,
        since: DateTime<Utc>,
    ) -> StoreResult<Vec<AisGapEvent>> {
        Ok(self
            .all_gap_events()?
            .into_iter()
            .filter(|g| g.original_vessel_id == original_vessel_id && g.gap_start_utc >= since)
            .collect())
    }

    // ========================================================================
    // Spoofing anomalies
    // ========================================================================

    pub fn insert_anomaly(&self, anomaly: &SpoofingAnomaly) -> StoreResult<()> {
        self.spoofing
            .insert(be(anomaly.anomaly_id), encode(anomaly)?)?;
        Ok(())
    }

    pub fn anomaly(&self, anomaly_id: AnomalyId) -> StoreResult<SpoofingAnomaly> {
        self.spoofing
            .get(be(anomaly_id))?
            .map(|v| decode(&v))
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(format!("anomaly {anomaly_id}")))
    }

    pub fn all_anomalies(&self) -> StoreResult<Vec<SpoofingAnomaly>> {
        decode_all(&self.spoofing)
    }

    pub fn anomalies_for_vessel(&self, vessel_id: VesselId) -> StoreResult<Vec<SpoofingAnomaly>> {
        Ok(decode_all::<SpoofingAnomaly>(&self.spoofing)?
            .into_iter()
            .filter(|a| a.vessel_id == vessel_id)
            .collect())
    }

    /// Detector idempotence check: does the vessel already carry an anomaly
    /// of this type?
    pub fn has_anomaly_of_type(
        &self,
        vessel_id: VesselId,
        anomaly_type: SpoofingType,
    ) -> StoreResult<bool> {
        Ok(self
            .anomalies_for_vessel(vessel_id)?
            .iter()
            .any(|a| a.anomaly_type == anomaly_type))
    }

    /// Anomalies for a vessel starting within `[from, to]`.
    pub fn anomalies_for_vessel_between(
        &self,
        vessel_id: VesselId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<SpoofingAnomaly>> {
        Ok(self
            .anomalies_for_vessel(vessel_id)?
            .into_iter()
            .filter(|a| a.start_time_utc >= from && a.start_time_utc <= to)
            .collect())
    }

    // ========================================================================
    // STS transfers
    // ========================================================================

    /// Insert an STS event, enforcing `(v1, v2, start_time)` uniqueness.
    ///
    /// Returns `false` when an identical event already exists.
    pub fn insert_sts_event(&self, sts: &StsTransferEvent) -> StoreResult<bool> {
        let duplicate = self.all_sts_events()?.iter().any(|e| {
            e.vessel_1_id == sts.vessel_1_id
                && e.vessel_2_id == sts.vessel_2_id
                && e.start_time_utc == sts.start_time_utc
        });
        if duplicate {
            return Ok(false);
        }
        self.sts_events.insert(be(sts.sts_id), encode(sts)?)?;
        Ok(true)
    }

    pub fn all_sts_events(&self) -> StoreResult<Vec<StsTransferEvent>> {
        decode_all(&self.sts_events)
    }

    pub fn sts_events_for_vessel(&self, vessel_id: VesselId) -> StoreResult<Vec<StsTransferEvent>> {
        Ok(decode_all::<StsTransferEvent>(&self.sts_events)?
            .into_iter()
            .filter(|e| e.involves(vessel_id))
            .collect())
    }

    /// STS events involving a vessel that overlap `[from, to]`.
    pub fn sts_events_for_vessel_between(
        &self,
        vessel_id: VesselId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> StoreResult<Vec<StsTransferEvent>> {
        Ok(self
            .sts_events_for_vessel(vessel_id)?
            .into_iter()
            .filter(|e| e.start_time_utc <= to && e.end_time_utc >= from)
            .collect())
    }

    pub fn sts_event(&self, sts_id: StsId) -> StoreResult<StsTransferEvent> {
        self.sts_events
            .get(be(sts_id))?
            .map(|v| decode(&v))
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(format!("sts event {sts_id}")))
    }

    pub fn update_sts_event(&self, sts: &StsTransferEvent) -> StoreResult<()> {
        self.sts_events.insert(be(sts.sts_id), encode(sts)?)?;
        Ok(())
    }

    // ========================================================================
    // Loitering
    // ========================================================================

    pub fn insert_loitering_event(&self, event: &LoiteringEvent) -> StoreResult<()> {
        self.loitering
            .insert(be(event.loitering_id), encode(event)?)?;
        Ok(())
    }

    pub fn all_loitering_events(&self) -> StoreResult<Vec<LoiteringEvent>> {
        decode_all(&self.loitering)
    }

    pub fn loitering_for_vessel(&self, vessel_id: VesselId) -> StoreResult<Vec<LoiteringEvent>> {
        Ok(decode_all::<LoiteringEvent>(&self.loitering)?
            .into_iter()
            .filter(|e| e.vessel_id == vessel_id)
            .collect())
    }

    /// Loitering-run idempotence check by vessel and start time.
    pub fn loitering_exists(
        &self,
        vessel_id: VesselId,
        start: DateTime<Utc>,
    ) -> StoreResult<bool> {
        Ok(self
            .loitering_for_vessel(vessel_id)?
            .iter()
            .any(|e| e.start_time_utc == start))
    }

    // ========================================================================
    // Movement envelopes
    // ========================================================================

    pub fn insert_envelope(&self, envelope: &MovementEnvelope) -> StoreResult<()> {
        self.envelopes
            .insert(be(envelope.envelope_id), encode(envelope)?)?;
        Ok(())
    }

    pub fn envelope_for_gap(&self, gap_event_id: GapEventId) -> StoreResult<Option<MovementEnvelope>> {
        Ok(decode_all::<MovementEnvelope>(&self.envelopes)?
            .into_iter()
            .find(|e| e.gap_event_id == gap_event_id))
    }

    // ========================================================================
    // Draught changes
    // ========================================================================

    pub fn insert_draught_event(&self, event: &DraughtChangeEvent) -> StoreResult<()> {
        self.draught_events
            .insert(be(event.draught_event_id), encode(event)?)?;
        Ok(())
    }

    pub fn draught_events_for_vessel(
        &self,
        vessel_id: VesselId,
    ) -> StoreResult<Vec<DraughtChangeEvent>> {
        Ok(decode_all::<DraughtChangeEvent>(&self.draught_events)?
            .into_iter()
            .filter(|e| e.vessel_id == vessel_id)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertStatus, StsDetectionType};
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, 0, 0).unwrap()
    }

    fn gap(id: u64, vessel: u64, start_h: u32, score: i64) -> AisGapEvent {
        AisGapEvent {
            gap_event_id: id,
            vessel_id: vessel,
            gap_start_utc: ts(start_h),
            gap_end_utc: ts(start_h + 4),
            duration_minutes: 240,
            corridor_id: None,
            risk_score: score,
            risk_breakdown_json: None,
            status: AlertStatus::New,
            analyst_notes: None,
            impossible_speed_flag: false,
            velocity_plausibility_ratio: None,
            max_plausible_distance_nm: None,
            actual_gap_distance_nm: None,
            in_dark_zone: false,
            dark_zone_id: None,
            pre_gap_sog: None,
            gap_off_lat: None,
            gap_off_lon: None,
            gap_on_lat: None,
            gap_on_lon: None,
            source: "local".into(),
            original_vessel_id: vessel,
            is_feed_outage: false,
            coverage_quality: None,
        }
    }

    #[test]
    fn test_unscored_excludes_feed_outage() {
        let store = FleetStore::temporary().unwrap();
        store.insert_gap_event(&gap(1, 1, 0, 0)).unwrap();
        store.insert_gap_event(&gap(2, 1, 6, 55)).unwrap();
        let mut outage = gap(3, 2, 0, 0);
        outage.is_feed_outage = true;
        store.insert_gap_event(&outage).unwrap();
        let unscored = store.unscored_gap_events().unwrap();
        assert_eq!(unscored.len(), 1);
        assert_eq!(unscored[0].gap_event_id, 1);
    }

    #[test]
    fn test_sts_uniqueness_on_pair_and_start() {
        let store = FleetStore::temporary().unwrap();
        let sts = StsTransferEvent {
            sts_id: 1,
            vessel_1_id: Some(1),
            vessel_2_id: Some(2),
            dark_detection_id: None,
            dark_detection_id_2: None,
            detection_type: StsDetectionType::VisibleVisible,
            start_time_utc: ts(0),
            end_time_utc: ts(2),
            duration_minutes: 120,
            mean_proximity_meters: Some(150.0),
            mean_lat: None,
            mean_lon: None,
            corridor_id: None,
            eta_minutes: None,
            risk_score_component: 0,
        };
        assert!(store.insert_sts_event(&sts).unwrap());
        let dup = StsTransferEvent { sts_id: 2, ..sts.clone() };
        assert!(!store.insert_sts_event(&dup).unwrap());
        assert_eq!(store.all_sts_events().unwrap().len(), 1);
    }

    #[test]
    fn test_anomaly_type_idempotence_check() {
        let store = FleetStore::temporary().unwrap();
        let anomaly = SpoofingAnomaly {
            anomaly_id: 1,
            vessel_id: 1,
            anomaly_type: SpoofingType::MmsiReuse,
            start_time_utc: ts(0),
            end_time_utc: None,
            implied_speed_kn: Some(120.0),
            plausibility_score: None,
            risk_score_component: 55,
            evidence_json: serde_json::json!({}),
            gap_event_id: None,
        };
        store.insert_anomaly(&anomaly).unwrap();
        assert!(store.has_anomaly_of_type(1, SpoofingType::MmsiReuse).unwrap());
        assert!(!store.has_anomaly_of_type(1, SpoofingType::ImoFraud).unwrap());
        assert!(!store.has_anomaly_of_type(2, SpoofingType::MmsiReuse).unwrap());
    }

    #[test]
    fn test_draught_events_by_vessel() {
        let store = FleetStore::temporary().unwrap();
        let event = DraughtChangeEvent {
            draught_event_id: 1,
            vessel_id: 4,
            observed_at_utc: ts(2),
            draught_before_m: 8.2,
            draught_after_m: 14.6,
            delta_m: 6.4,
            near_port: false,
            linked_sts_id: Some(9),
        };
        store.insert_draught_event(&event).unwrap();
        let found = store.draught_events_for_vessel(4).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].linked_sts_id, Some(9));
        assert!(store.draught_events_for_vessel(5).unwrap().is_empty());
    }

    #[test]
    fn test_gaps_by_identity_survive_vessel_reassignment() {
        let store = FleetStore::temporary().unwrap();
        let mut g = gap(1, 5, 0, 0);
        g.original_vessel_id = 5;
        store.insert_gap_event(&g).unwrap();
        // Merge rewrites vessel_id but preserves original_vessel_id.
        g.vessel_id = 9;
        store.update_gap_event(&g).unwrap();
        let by_identity = store.gaps_by_identity_since(5, ts(0)).unwrap();
        assert_eq!(by_identity.len(), 1);
        assert_eq!(by_identity[0].vessel_id, 9);
    }
}
