//! Merge execution, reversal, and timeline queries.
//!
//! `execute_merge` rewrites every FK on the absorbed identity's rows to the
//! canonical vessel, marks the absorbed row, and records a `MergeOperation`
//! whose snapshot is sufficient to reverse the whole thing.

use chrono::Utc;

use crate::store::{FleetStore, StoreError, StoreResult};
use crate::types::{AisGapEvent, LoiteringEvent, MergeOperation, SpoofingAnomaly, VesselId};

/// Execute a merge: `canonical` keeps its identity, `absorbed` is folded in.
pub fn execute_merge(
    store: &FleetStore,
    canonical: VesselId,
    absorbed: VesselId,
    candidate_id: Option<u64>,
    executed_by: &str,
) -> StoreResult<MergeOperation> {
    if canonical == absorbed {
        return Err(StoreError::Constraint(
            "cannot merge a vessel into itself".to_string(),
        ));
    }
    let canonical_vessel = store.vessel(canonical)?;
    let mut absorbed_vessel = store.vessel(absorbed)?;
    if absorbed_vessel.is_absorbed() {
        return Err(StoreError::Constraint(format!(
            "vessel {absorbed} is already absorbed"
        )));
    }

    let affected = store.reassign_vessel_refs(absorbed, canonical)?;

    absorbed_vessel.merged_into_vessel_id = Some(canonical_vessel.vessel_id);
    absorbed_vessel.updated_at = Utc::now();
    store.update_vessel(&absorbed_vessel)?;

    let op = MergeOperation {
        merge_op_id: store.next_id()?,
        canonical_vessel_id: canonical,
        absorbed_vessel_id: absorbed,
        candidate_id,
        executed_at: Utc::now(),
        executed_by: executed_by.to_string(),
        affected_records_json: serde_json::to_value(&affected)
            .map_err(StoreError::Serialization)?,
        reversed_at: None,
    };
    store.insert_merge_operation(&op)?;
    store.audit(executed_by, "merge", "vessel", absorbed);

    tracing::info!(
        canonical,
        absorbed,
        points_moved = affected.ais_points_moved,
        gaps_moved = affected.gap_event_ids.len(),
        "merge executed"
    );
    Ok(op)
}

/// Reverse a merge from its snapshot: restore FKs and clear the absorbed
/// marker.
pub fn reverse_merge(store: &FleetStore, merge_op_id: u64) -> StoreResult<()> {
    let mut op = store.merge_operation(merge_op_id)?;
    if op.reversed_at.is_some() {
        return Err(StoreError::Constraint(format!(
            "merge operation {merge_op_id} already reversed"
        )));
    }

    let affected: crate::store::AffectedRecords =
        serde_json::from_value(op.affected_records_json.clone())
            .map_err(StoreError::Serialization)?;

    store.restore_vessel_refs(op.canonical_vessel_id, op.absorbed_vessel_id, &affected)?;

    let mut absorbed = store.vessel(op.absorbed_vessel_id)?;
    absorbed.merged_into_vessel_id = None;
    absorbed.updated_at = Utc::now();
    store.update_vessel(&absorbed)?;

    op.reversed_at = Some(Utc::now());
    store.update_merge_operation(&op)?;
    store.audit("analyst", "reverse_merge", "vessel", op.absorbed_vessel_id);

    tracing::info!(
        merge_op_id,
        canonical = op.canonical_vessel_id,
        absorbed = op.absorbed_vessel_id,
        "merge reversed"
    );
    Ok(())
}

// ============================================================================
// Timeline
// ============================================================================

/// One timeline event, annotated with the identity that generated it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TimelineEntry {
    pub at_utc: chrono::DateTime<Utc>,
    pub kind: String,
    pub original_vessel_id: VesselId,
    pub detail: serde_json::Value,
}

/// Chronological event timeline for a vessel (resolved to its canonical
/// identity), with each gap annotated by the identity that generated it.
pub fn vessel_timeline(store: &FleetStore, vessel_id: VesselId) -> StoreResult<Vec<TimelineEntry>> {
    let canonical = store.canonical_vessel(vessel_id)?;
    let mut entries = Vec::new();

    for gap in store.gap_events_for_vessel(canonical.vessel_id)? {
        entries.push(gap_entry(&gap));
    }
    for anomaly in store.anomalies_for_vessel(canonical.vessel_id)? {
        entries.push(anomaly_entry(&anomaly));
    }
    for event in store.loitering_for_vessel(canonical.vessel_id)? {
        entries.push(loiter_entry(&event));
    }
    for history in store.history_for_vessel(canonical.vessel_id)? {
        entries.push(TimelineEntry {
            at_utc: history.observed_at,
            kind: "identity_change".to_string(),
            original_vessel_id: history.vessel_id,
            detail: serde_json::json!({
                "field": history.field_changed,
                "old": history.old_value,
                "new": history.new_value,
            }),
        });
    }

    entries.sort_by_key(|e| e.at_utc);
    Ok(entries)
}

fn gap_entry(gap: &AisGapEvent) -> TimelineEntry {
    TimelineEntry {
        at_utc: gap.gap_start_utc,
        kind: "ais_gap".to_string(),
        original_vessel_id: gap.original_vessel_id,
        detail: serde_json::json!({
            "gap_event_id": gap.gap_event_id,
            "duration_minutes": gap.duration_minutes,
            "risk_score": gap.risk_score,
        }),
    }
}

fn anomaly_entry(anomaly: &SpoofingAnomaly) -> TimelineEntry {
    TimelineEntry {
        at_utc: anomaly.start_time_utc,
        kind: "spoofing_anomaly".to_string(),
        original_vessel_id: anomaly.vessel_id,
        detail: serde_json::json!({
            "anomaly_id": anomaly.anomaly_id,
            "anomaly_type": anomaly.anomaly_type,
            "risk_score_component": anomaly.risk_score_component,
        }),
    }
}

fn loiter_entry(event: &LoiteringEvent) -> TimelineEntry {
    TimelineEntry {
        at_utc: event.start_time_utc,
        kind: "loitering".to_string(),
        original_vessel_id: event.vessel_id,
        detail: serde_json::json!({
            "loitering_id": event.loitering_id,
            "duration_hours": event.duration_hours,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AisClass, AisPoint, AlertStatus, Vessel};
    use chrono::{DateTime, TimeZone};

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, 0, 0, 0).unwrap()
    }

    fn seed(store: &FleetStore) {
        store.insert_vessel(&Vessel::new(1, "636017000", ts(1))).unwrap();
        store.insert_vessel(&Vessel::new(2, "511987654", ts(3))).unwrap();
        for (vessel, day) in [(1u64, 1u32), (1, 2), (2, 3), (2, 4)] {
            store
                .insert_point(&AisPoint {
                    vessel_id: vessel,
                    timestamp_utc: ts(day),
                    lat: 36.0 + f64::from(day) * 0.1,
                    lon: 23.0,
                    sog: Some(8.0),
                    cog: None,
                    heading: None,
                    nav_status: None,
                    ais_class: AisClass::A,
                    source: "terrestrial".into(),
                })
                .unwrap();
        }
        store
            .insert_gap_event(&AisGapEvent {
                gap_event_id: 77,
                vessel_id: 2,
                gap_start_utc: ts(3),
                gap_end_utc: ts(4),
                duration_minutes: 1440,
                corridor_id: None,
                risk_score: 0,
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
                original_vessel_id: 2,
                is_feed_outage: false,
                coverage_quality: None,
            })
            .unwrap();
    }

    #[test]
    fn test_merge_and_reverse_round_trip() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);

        let op = execute_merge(&store, 1, 2, None, "analyst").unwrap();
        assert_eq!(store.vessel(2).unwrap().merged_into_vessel_id, Some(1));
        assert_eq!(store.points_for_vessel(1).unwrap().len(), 4);
        // The gap moved to the canonical vessel but keeps its provenance.
        let gap = store.gap_event(77).unwrap();
        assert_eq!(gap.vessel_id, 1);
        assert_eq!(gap.original_vessel_id, 2);

        reverse_merge(&store, op.merge_op_id).unwrap();
        assert_eq!(store.vessel(2).unwrap().merged_into_vessel_id, None);
        assert_eq!(store.points_for_vessel(1).unwrap().len(), 2);
        assert_eq!(store.points_for_vessel(2).unwrap().len(), 2);
        assert_eq!(store.gap_event(77).unwrap().vessel_id, 2);

        // Reversing twice is rejected.
        assert!(reverse_merge(&store, op.merge_op_id).is_err());
    }

    #[test]
    fn test_self_merge_rejected() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        assert!(execute_merge(&store, 1, 1, None, "analyst").is_err());
    }

    #[test]
    fn test_double_absorb_rejected() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        store.insert_vessel(&Vessel::new(3, "273000111", ts(5))).unwrap();
        execute_merge(&store, 1, 2, None, "analyst").unwrap();
        assert!(execute_merge(&store, 3, 2, None, "analyst").is_err());
    }

    #[test]
    fn test_timeline_annotates_original_identity() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        execute_merge(&store, 1, 2, None, "analyst").unwrap();

        // Query via the absorbed id resolves to the canonical timeline.
        let timeline = vessel_timeline(&store, 2).unwrap();
        let gap_entry = timeline.iter().find(|e| e.kind == "ais_gap").unwrap();
        assert_eq!(gap_entry.original_vessel_id, 2);
        // Sorted chronologically.
        for pair in timeline.windows(2) {
            assert!(pair[0].at_utc <= pair[1].at_utc);
        }
    }
}
