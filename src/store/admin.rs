//! Administrative storage: merge bookkeeping and FK rewrites, fleet alerts,
//! audit log, verification log, pipeline runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{
    AuditLog, FleetAlert, MergeCandidate, MergeOperation, PipelineRun, VerificationLog, VesselId,
};

use super::{be, decode, decode_all, encode, FleetStore, StoreError, StoreResult};

/// Per-entity record ids rewritten by a merge. Serialized into
/// `MergeOperation.affected_records_json`; sufficient to reverse the merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AffectedRecords {
    pub ais_points_moved: usize,
    /// Timestamps (millis) of the moved points, for exact reversal.
    pub ais_point_ts_millis: Vec<i64>,
    pub gap_event_ids: Vec<u64>,
    pub anomaly_ids: Vec<u64>,
    pub sts_ids_as_v1: Vec<u64>,
    pub sts_ids_as_v2: Vec<u64>,
    pub loitering_ids: Vec<u64>,
    pub history_ids: Vec<u64>,
    pub watchlist_ids: Vec<u64>,
    pub port_call_ids: Vec<u64>,
}

impl FleetStore {
    // ========================================================================
    // Merge FK rewrites
    // ========================================================================

    /// Rewrite every FK on rows owned by `absorbed` to point at `canonical`.
    ///
    /// `AisGapEvent.original_vessel_id` is intentionally left untouched: it
    /// records which identity generated the gap.
    pub fn reassign_vessel_refs(
        &self,
        absorbed: VesselId,
        canonical: VesselId,
    ) -> StoreResult<AffectedRecords> {
        if absorbed == canonical {
            return Err(StoreError::Constraint(
                "cannot merge a vessel into itself".to_string(),
            ));
        }
        let mut affected = AffectedRecords::default();

        affected.ais_point_ts_millis = self
            .points_for_vessel(absorbed)?
            .iter()
            .map(|p| p.timestamp_utc.timestamp_millis())
            .collect();
        affected.ais_points_moved = self.reassign_points(absorbed, canonical)?;

        for mut gap in self.gap_events_for_vessel(absorbed)? {
            gap.vessel_id = canonical;
            self.update_gap_event(&gap)?;
            affected.gap_event_ids.push(gap.gap_event_id);
        }

        for mut anomaly in self.anomalies_for_vessel(absorbed)? {
            anomaly.vessel_id = canonical;
            self.spoofing
                .insert(be(anomaly.anomaly_id), encode(&anomaly)?)?;
            affected.anomaly_ids.push(anomaly.anomaly_id);
        }

        for mut sts in self.sts_events_for_vessel(absorbed)? {
            if sts.vessel_1_id == Some(absorbed) {
                sts.vessel_1_id = Some(canonical);
                affected.sts_ids_as_v1.push(sts.sts_id);
            }
            if sts.vessel_2_id == Some(absorbed) {
                sts.vessel_2_id = Some(canonical);
                affected.sts_ids_as_v2.push(sts.sts_id);
            }
            self.update_sts_event(&sts)?;
        }

        for mut event in self.loitering_for_vessel(absorbed)? {
            event.vessel_id = canonical;
            self.loitering
                .insert(be(event.loitering_id), encode(&event)?)?;
            affected.loitering_ids.push(event.loitering_id);
        }

        for mut row in self.history_for_vessel(absorbed)? {
            row.vessel_id = canonical;
            self.history.insert(be(row.history_id), encode(&row)?)?;
            affected.history_ids.push(row.history_id);
        }

        for mut entry in self.watchlist_for_vessel(absorbed)? {
            entry.vessel_id = canonical;
            self.watchlist
                .insert(be(entry.watchlist_id), encode(&entry)?)?;
            affected.watchlist_ids.push(entry.watchlist_id);
        }

        for mut call in self.port_calls_for_vessel(absorbed)? {
            call.vessel_id = canonical;
            self.port_calls
                .insert(be(call.port_call_id), encode(&call)?)?;
            affected.port_call_ids.push(call.port_call_id);
        }

        Ok(affected)
    }

    /// Restore FKs from a merge snapshot (the reverse of
    /// [`Self::reassign_vessel_refs`]). Event rows are restored from the
    /// recorded id lists; points move back via the recorded timestamps.
    pub fn restore_vessel_refs(
        &self,
        canonical: VesselId,
        absorbed: VesselId,
        affected: &AffectedRecords,
    ) -> StoreResult<()> {
        for &gap_id in &affected.gap_event_ids {
            let mut gap = self.gap_event(gap_id)?;
            gap.vessel_id = absorbed;
            self.update_gap_event(&gap)?;
        }
        for &anomaly_id in &affected.anomaly_ids {
            let mut anomaly = self.anomaly(anomaly_id)?;
            anomaly.vessel_id = absorbed;
            self.spoofing.insert(be(anomaly_id), encode(&anomaly)?)?;
        }
        for &sts_id in &affected.sts_ids_as_v1 {
            let mut sts = self.sts_event(sts_id)?;
            sts.vessel_1_id = Some(absorbed);
            self.update_sts_event(&sts)?;
        }
        for &sts_id in &affected.sts_ids_as_v2 {
            let mut sts = self.sts_event(sts_id)?;
            sts.vessel_2_id = Some(absorbed);
            self.update_sts_event(&sts)?;
        }
        for &loitering_id in &affected.loitering_ids {
            if let Some(bytes) = self.loitering.get(be(loitering_id))? {
                let mut event: crate::types::LoiteringEvent = decode(&bytes)?;
                event.vessel_id = absorbed;
                self.loitering.insert(be(loitering_id), encode(&event)?)?;
            }
        }
        for &history_id in &affected.history_ids {
            if let Some(bytes) = self.history.get(be(history_id))? {
                let mut row: crate::types::VesselHistory = decode(&bytes)?;
                row.vessel_id = absorbed;
                self.history.insert(be(history_id), encode(&row)?)?;
            }
        }
        for &watchlist_id in &affected.watchlist_ids {
            if let Some(bytes) = self.watchlist.get(be(watchlist_id))? {
                let mut entry: crate::types::VesselWatchlist = decode(&bytes)?;
                entry.vessel_id = absorbed;
                self.watchlist.insert(be(watchlist_id), encode(&entry)?)?;
            }
        }
        for &port_call_id in &affected.port_call_ids {
            if let Some(bytes) = self.port_calls.get(be(port_call_id))? {
                let mut call: crate::types::PortCall = decode(&bytes)?;
                call.vessel_id = absorbed;
                self.port_calls.insert(be(port_call_id), encode(&call)?)?;
            }
        }
        // Move back exactly the points recorded in the snapshot.
        for &ts_millis in &affected.ais_point_ts_millis {
            let key = super::point_key(canonical, ts_millis);
            if let Some(bytes) = self.ais_points.remove(key)? {
                let mut point: crate::types::AisPoint = decode(&bytes)?;
                point.vessel_id = absorbed;
                self.insert_point(&point)?;
            }
        }
        Ok(())
    }

    // ========================================================================
    // Merge candidates and operations
    // ========================================================================

    /// Insert a candidate, enforcing `(vessel_a, vessel_b)` uniqueness.
    /// Returns `false` when the pair is already tracked.
    pub fn insert_merge_candidate(&self, candidate: &MergeCandidate) -> StoreResult<bool> {
        let exists = self.all_merge_candidates()?.iter().any(|c| {
            c.vessel_a_id == candidate.vessel_a_id && c.vessel_b_id == candidate.vessel_b_id
        });
        if exists {
            return Ok(false);
        }
        self.merge_candidates
            .insert(be(candidate.candidate_id), encode(candidate)?)?;
        Ok(true)
    }

    pub fn all_merge_candidates(&self) -> StoreResult<Vec<MergeCandidate>> {
        decode_all(&self.merge_candidates)
    }

    pub fn update_merge_candidate(&self, candidate: &MergeCandidate) -> StoreResult<()> {
        self.merge_candidates
            .insert(be(candidate.candidate_id), encode(candidate)?)?;
        Ok(())
    }

    pub fn insert_merge_operation(&self, op: &MergeOperation) -> StoreResult<()> {
        self.merge_ops.insert(be(op.merge_op_id), encode(op)?)?;
        Ok(())
    }

    pub fn merge_operation(&self, merge_op_id: u64) -> StoreResult<MergeOperation> {
        self.merge_ops
            .get(be(merge_op_id))?
            .map(|v| decode(&v))
            .transpose()?
            .ok_or_else(|| StoreError::NotFound(format!("merge operation {merge_op_id}")))
    }

    pub fn update_merge_operation(&self, op: &MergeOperation) -> StoreResult<()> {
        self.merge_ops.insert(be(op.merge_op_id), encode(op)?)?;
        Ok(())
    }

    pub fn all_merge_operations(&self) -> StoreResult<Vec<MergeOperation>> {
        decode_all(&self.merge_ops)
    }

    // ========================================================================
    // Fleet alerts
    // ========================================================================

    /// Insert a fleet alert, deduplicating on `(owner_cluster_id, alert_type)`
    /// or, for clusterless alerts, on `(alert_type, sorted vessel set)`.
    pub fn insert_fleet_alert(&self, alert: &FleetAlert) -> StoreResult<bool> {
        let mut sorted_new = alert.vessel_ids.clone();
        sorted_new.sort_unstable();
        let duplicate = self.all_fleet_alerts()?.iter().any(|existing| {
            if existing.alert_type != alert.alert_type {
                return false;
            }
            match (existing.owner_cluster_id, alert.owner_cluster_id) {
                (Some(a), Some(b)) => a == b,
                (None, None) => {
                    let mut sorted_existing = existing.vessel_ids.clone();
                    sorted_existing.sort_unstable();
                    sorted_existing == sorted_new
                }
                _ => false,
            }
        });
        if duplicate {
            return Ok(false);
        }
        self.fleet_alerts
            .insert(be(alert.alert_id), encode(alert)?)?;
        Ok(true)
    }

    pub fn all_fleet_alerts(&self) -> StoreResult<Vec<FleetAlert>> {
        decode_all(&self.fleet_alerts)
    }

    // ========================================================================
    // Audit log
    // ========================================================================

    /// Best-effort audit append: failures are logged, never propagated.
    pub fn audit(&self, actor: &str, action: &str, entity_type: &str, entity_id: u64) {
        let result = (|| -> StoreResult<()> {
            let audit_id = self.next_id()?;
            let row = AuditLog {
                audit_id,
                actor: actor.to_string(),
                action: action.to_string(),
                entity_type: entity_type.to_string(),
                entity_id,
                detail: None,
                at_utc: Utc::now(),
            };
            self.audit_log.insert(be(audit_id), encode(&row)?)?;
            Ok(())
        })();
        if let Err(e) = result {
            tracing::warn!(error = %e, action, entity_type, "audit write failed");
        }
    }

    pub fn all_audit_rows(&self) -> StoreResult<Vec<AuditLog>> {
        decode_all(&self.audit_log)
    }

    // ========================================================================
    // Verification log
    // ========================================================================

    pub fn insert_verification_log(&self, log: &VerificationLog) -> StoreResult<()> {
        self.verification_log
            .insert(be(log.log_id), encode(log)?)?;
        Ok(())
    }

    /// Total USD spent on successful verifications since `month_start`.
    pub fn verification_spend_since(&self, month_start: DateTime<Utc>) -> StoreResult<f64> {
        Ok(decode_all::<VerificationLog>(&self.verification_log)?
            .iter()
            .filter(|l| l.request_time_utc >= month_start && l.response_status == "success")
            .map(|l| l.cost_usd)
            .sum())
    }

    pub fn all_verification_logs(&self) -> StoreResult<Vec<VerificationLog>> {
        decode_all(&self.verification_log)
    }

    // ========================================================================
    // Pipeline runs
    // ========================================================================

    pub fn insert_pipeline_run(&self, run: &PipelineRun) -> StoreResult<()> {
        self.pipeline_runs.insert(be(run.run_id), encode(run)?)?;
        Ok(())
    }

    pub fn all_pipeline_runs(&self) -> StoreResult<Vec<PipelineRun>> {
        decode_all(&self.pipeline_runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vessel;
    use chrono::TimeZone;

    fn ts(h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, 0, 0).unwrap()
    }

    #[test]
    fn test_fleet_alert_dedup_by_vessel_set() {
        let store = FleetStore::temporary().unwrap();
        let alert = FleetAlert {
            alert_id: 1,
            owner_cluster_id: None,
            alert_type: "sts_relay_chain".into(),
            vessel_ids: vec![3, 1, 2],
            evidence_json: serde_json::json!({}),
            risk_score_component: 20,
            created_at: ts(0),
        };
        assert!(store.insert_fleet_alert(&alert).unwrap());
        let same_set = FleetAlert {
            alert_id: 2,
            vessel_ids: vec![1, 2, 3],
            ..alert.clone()
        };
        assert!(!store.insert_fleet_alert(&same_set).unwrap());
        let other_type = FleetAlert {
            alert_id: 3,
            alert_type: "dark_coordination".into(),
            ..alert
        };
        assert!(store.insert_fleet_alert(&other_type).unwrap());
    }

    #[test]
    fn test_merge_candidate_pair_uniqueness() {
        let store = FleetStore::temporary().unwrap();
        let candidate = MergeCandidate {
            candidate_id: 1,
            vessel_a_id: 1,
            vessel_b_id: 2,
            vessel_a_last_lat: None,
            vessel_a_last_lon: None,
            vessel_a_last_time: None,
            vessel_b_first_lat: None,
            vessel_b_first_lon: None,
            vessel_b_first_time: None,
            distance_nm: None,
            time_delta_hours: None,
            confidence_score: 70,
            match_reasons_json: serde_json::json!({}),
            status: crate::types::MergeCandidateStatus::Pending,
            created_at: ts(0),
            resolved_at: None,
            resolved_by: None,
        };
        assert!(store.insert_merge_candidate(&candidate).unwrap());
        let dup = MergeCandidate {
            candidate_id: 2,
            ..candidate
        };
        assert!(!store.insert_merge_candidate(&dup).unwrap());
    }

    #[test]
    fn test_audit_is_best_effort_and_recorded() {
        let store = FleetStore::temporary().unwrap();
        store.audit("pipeline", "score", "gap_event", 42);
        let rows = store.all_audit_rows().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].action, "score");
    }

    #[test]
    fn test_verification_spend_counts_success_only() {
        let store = FleetStore::temporary().unwrap();
        store.insert_vessel(&Vessel::new(1, "636017000", ts(0))).unwrap();
        let success = VerificationLog {
            log_id: 1,
            vessel_id: 1,
            provider: "spire".into(),
            response_status: "success".into(),
            cost_usd: 0.5,
            result_summary: None,
            request_time_utc: ts(1),
        };
        let refused = VerificationLog {
            log_id: 2,
            response_status: "budget_exceeded".into(),
            cost_usd: 0.0,
            request_time_utc: ts(2),
            ..success.clone()
        };
        store.insert_verification_log(&success).unwrap();
        store.insert_verification_log(&refused).unwrap();
        let spend = store.verification_spend_since(ts(0)).unwrap();
        assert!((spend - 0.5).abs() < 1e-9);
    }
}
