//! Merge-candidate discovery and fuzzy scoring.
//!
//! A candidate pair is one vessel whose track ends and another whose track
//! begins within the pairing window. Contributions: endpoint proximity
//! inside the drift envelope, identity anchors (IMO, callsign, fuzzy name),
//! hull similarity (type + DWT), and an optional behavioral fingerprint
//! bonus. Auto-merges above threshold bypass review.

use chrono::Utc;
use serde_json::json;

use crate::config::{self, IdentityMergeConfig};
use crate::detect::max_speed_kn;
use crate::geo::haversine_nm;
use crate::store::{FleetStore, StoreResult};
use crate::types::{MergeCandidate, MergeCandidateStatus, Vessel};
use crate::util::textmatch;

/// Pluggable behavioral fingerprint comparison.
///
/// The production feature vector (10 features, diagonal covariance under
/// sparse data) plugs in here; the default scorer contributes nothing.
pub trait FingerprintScorer: Send + Sync {
    /// Bonus points in `[0, fingerprint_bonus_max]`, or `None` when the
    /// vessels lack enough track for a comparison.
    fn score(&self, store: &FleetStore, a: &Vessel, b: &Vessel) -> Option<i64>;
}

/// Default scorer: no fingerprint data, no bonus.
pub struct NullFingerprintScorer;

impl FingerprintScorer for NullFingerprintScorer {
    fn score(&self, _store: &FleetStore, _a: &Vessel, _b: &Vessel) -> Option<i64> {
        None
    }
}

/// Identity-resolution step summary.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IdentityResolutionReport {
    pub pairs_considered: usize,
    pub candidates_created: usize,
    pub auto_merged: usize,
    pub errors: usize,
}

pub fn discover_merge_candidates(
    store: &FleetStore,
    fingerprint: &dyn FingerprintScorer,
) -> IdentityResolutionReport {
    let config = config::get();
    let merge_config = &config.risk.identity_merge;
    let mut report = IdentityResolutionReport::default();

    let vessels = match store.active_vessels() {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "identity resolution could not list vessels");
            report.errors += 1;
            return report;
        }
    };

    for ended in &vessels {
        for began in &vessels {
            if ended.vessel_id == began.vessel_id {
                continue;
            }
            report.pairs_considered += 1;
            if let Err(e) =
                consider_pair(store, merge_config, fingerprint, ended, began, &mut report)
            {
                tracing::warn!(
                    vessel_a = ended.vessel_id,
                    vessel_b = began.vessel_id,
                    error = %e,
                    "merge candidate evaluation failed"
                );
                report.errors += 1;
            }
        }
    }

    tracing::info!(
        pairs = report.pairs_considered,
        candidates = report.candidates_created,
        auto_merged = report.auto_merged,
        "identity resolution complete"
    );
    report
}

fn consider_pair(
    store: &FleetStore,
    merge_config: &IdentityMergeConfig,
    fingerprint: &dyn FingerprintScorer,
    ended: &Vessel,
    began: &Vessel,
    report: &mut IdentityResolutionReport,
) -> StoreResult<()> {
    let Some(last_a) = store.last_point(ended.vessel_id)? else {
        return Ok(());
    };
    let Some(first_b) = store.first_point(began.vessel_id)? else {
        return Ok(());
    };

    // B must begin after A ends, within the pairing window.
    let delta = first_b.timestamp_utc - last_a.timestamp_utc;
    if delta <= chrono::Duration::zero() || delta.num_days() > merge_config.window_days {
        return Ok(());
    }
    let delta_hours = delta.num_seconds() as f64 / 3600.0;

    let mut score = 0i64;
    let mut reasons = Vec::new();

    // Proximity inside the drift envelope.
    let distance_nm = haversine_nm(last_a.lat, last_a.lon, first_b.lat, first_b.lon);
    let drift_envelope_nm = max_speed_kn(ended.deadweight) * delta_hours;
    if distance_nm <= drift_envelope_nm {
        score += merge_config.proximity_points;
        reasons.push(json!({
            "anchor": "proximity",
            "points": merge_config.proximity_points,
            "distance_nm": (distance_nm * 10.0).round() / 10.0,
            "drift_envelope_nm": (drift_envelope_nm * 10.0).round() / 10.0,
        }));
    }

    // Identity anchors.
    let mut has_anchor = false;
    if let (Some(imo_a), Some(imo_b)) = (&ended.imo, &began.imo) {
        if imo_a == imo_b {
            score += merge_config.imo_match_points;
            has_anchor = true;
            reasons.push(json!({"anchor": "imo_match", "points": merge_config.imo_match_points}));
        }
    }
    if let (Some(cs_a), Some(cs_b)) = (&ended.callsign, &began.callsign) {
        if cs_a.eq_ignore_ascii_case(cs_b) {
            score += merge_config.callsign_match_points;
            has_anchor = true;
            reasons.push(json!({
                "anchor": "callsign_match",
                "points": merge_config.callsign_match_points,
            }));
        }
    }
    if let (Some(name_a), Some(name_b)) = (&ended.name, &began.name) {
        let similarity = textmatch::token_sort_ratio(
            &textmatch::normalize_name(name_a),
            &textmatch::normalize_name(name_b),
        );
        if similarity >= merge_config.name_similarity_threshold {
            score += merge_config.name_similarity_points;
            has_anchor = true;
            reasons.push(json!({
                "anchor": "name_similarity",
                "points": merge_config.name_similarity_points,
                "similarity": (similarity * 10.0).round() / 10.0,
            }));
        }
    }

    // Weak hull anchor: same type plus DWT within tolerance.
    if let (Some(type_a), Some(type_b)) = (&ended.vessel_type, &began.vessel_type) {
        if type_a.eq_ignore_ascii_case(type_b) {
            if let (Some(dwt_a), Some(dwt_b)) = (ended.deadweight, began.deadweight) {
                if dwt_a > 0.0 {
                    let tolerance = merge_config.dwt_tolerance_pct / 100.0;
                    let ratio = dwt_b / dwt_a;
                    if ratio >= 1.0 - tolerance && ratio <= 1.0 + tolerance {
                        score += merge_config.type_dwt_points;
                        reasons.push(json!({
                            "anchor": "type_dwt",
                            "points": merge_config.type_dwt_points,
                        }));
                    }
                }
            }
        }
    }

    if let Some(bonus) = fingerprint.score(store, ended, began) {
        let bonus = bonus.clamp(0, merge_config.fingerprint_bonus_max);
        if bonus > 0 {
            score += bonus;
            reasons.push(json!({"anchor": "behavioral_fingerprint", "points": bonus}));
        }
    }

    if merge_config.require_identity_anchor && !has_anchor {
        return Ok(());
    }
    if score < merge_config.review_threshold {
        return Ok(());
    }

    let auto = score >= merge_config.auto_merge_threshold;
    // vessel_a is the long-lived identity whose track ended (canonical);
    // vessel_b is the identity that appeared under a new MMSI (absorbed).
    let candidate = MergeCandidate {
        candidate_id: store.next_id()?,
        vessel_a_id: ended.vessel_id,
        vessel_b_id: began.vessel_id,
        vessel_a_last_lat: Some(last_a.lat),
        vessel_a_last_lon: Some(last_a.lon),
        vessel_a_last_time: Some(last_a.timestamp_utc),
        vessel_b_first_lat: Some(first_b.lat),
        vessel_b_first_lon: Some(first_b.lon),
        vessel_b_first_time: Some(first_b.timestamp_utc),
        distance_nm: Some(distance_nm),
        time_delta_hours: Some(delta_hours),
        confidence_score: score,
        match_reasons_json: json!({ "reasons": reasons }),
        status: MergeCandidateStatus::Pending,
        created_at: Utc::now(),
        resolved_at: None,
        resolved_by: None,
    };

    if !store.insert_merge_candidate(&candidate)? {
        return Ok(()); // pair already tracked
    }
    report.candidates_created += 1;

    if auto {
        super::merge::execute_merge(
            store,
            ended.vessel_id,
            began.vessel_id,
            Some(candidate.candidate_id),
            "auto_merge",
        )?;
        let mut resolved = candidate;
        resolved.status = MergeCandidateStatus::AutoMerged;
        resolved.resolved_at = Some(Utc::now());
        resolved.resolved_by = Some("auto_merge".to_string());
        store.update_merge_candidate(&resolved)?;
        report.auto_merged += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AisClass, AisPoint};
    use chrono::{DateTime, Duration, TimeZone};

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, hour, 0, 0).unwrap()
    }

    fn point(vessel_id: u64, at: DateTime<Utc>, lat: f64, lon: f64) -> AisPoint {
        AisPoint {
            vessel_id,
            timestamp_utc: at,
            lat,
            lon,
            sog: Some(8.0),
            cog: Some(90.0),
            heading: None,
            nav_status: None,
            ais_class: AisClass::A,
            source: "terrestrial".into(),
        }
    }

    /// Vessel A goes dark; a "new" vessel B appears nearby a day later with
    /// the same IMO and a near-identical name.
    fn seed_swap_pair(store: &FleetStore) -> (Vessel, Vessel) {
        let mut a = Vessel::new(1, "636017000", ts(1, 0));
        a.imo = Some("9074729".into());
        a.name = Some("OCEAN STAR".into());
        a.vessel_type = Some("Crude Oil Tanker".into());
        a.deadweight = Some(115_000.0);
        store.insert_vessel(&a).unwrap();

        let mut b = Vessel::new(2, "511987654", ts(3, 0));
        b.imo = Some("9074729".into());
        b.name = Some("OCEA STAR".into());
        b.vessel_type = Some("Crude Oil Tanker".into());
        b.deadweight = Some(114_000.0);
        store.insert_vessel(&b).unwrap();

        store.insert_point(&point(1, ts(1, 0), 36.0, 23.0)).unwrap();
        store.insert_point(&point(1, ts(2, 0), 36.2, 23.1)).unwrap();
        store.insert_point(&point(2, ts(3, 0), 36.4, 23.2)).unwrap();
        store.insert_point(&point(2, ts(3, 6), 36.5, 23.3)).unwrap();
        (a, b)
    }

    #[test]
    fn test_strong_pair_auto_merges() {
        let store = FleetStore::temporary().unwrap();
        seed_swap_pair(&store);
        let report = discover_merge_candidates(&store, &NullFingerprintScorer);
        // proximity 30 + imo 40 + name 20 + type/dwt 10 = 100 >= 85.
        assert_eq!(report.candidates_created, 1);
        assert_eq!(report.auto_merged, 1);

        // The new alias (vessel 2) is absorbed into the long-lived identity.
        let absorbed = store.vessel(2).unwrap();
        assert_eq!(absorbed.merged_into_vessel_id, Some(1));
        // All points now belong to the canonical identity.
        assert_eq!(store.points_for_vessel(1).unwrap().len(), 4);
        assert_eq!(store.points_for_vessel(2).unwrap().len(), 0);
    }

    #[test]
    fn test_pair_without_anchor_skipped() {
        let store = FleetStore::temporary().unwrap();
        let a = Vessel::new(1, "636017000", ts(1, 0));
        let b = Vessel::new(2, "511987654", ts(3, 0));
        store.insert_vessel(&a).unwrap();
        store.insert_vessel(&b).unwrap();
        store.insert_point(&point(1, ts(2, 0), 36.2, 23.1)).unwrap();
        store.insert_point(&point(2, ts(3, 0), 36.4, 23.2)).unwrap();

        let report = discover_merge_candidates(&store, &NullFingerprintScorer);
        // Proximity alone, no identity anchor: no candidate.
        assert_eq!(report.candidates_created, 0);
    }

    #[test]
    fn test_pair_outside_window_skipped() {
        let store = FleetStore::temporary().unwrap();
        let mut a = Vessel::new(1, "636017000", ts(1, 0));
        a.imo = Some("9074729".into());
        store.insert_vessel(&a).unwrap();
        let mut b = Vessel::new(2, "511987654", ts(1, 0));
        b.imo = Some("9074729".into());
        store.insert_vessel(&b).unwrap();
        store.insert_point(&point(1, ts(1, 0), 36.0, 23.0)).unwrap();
        // B first appears 200 days later (outside the 180-day window).
        store
            .insert_point(&point(2, ts(1, 0) + Duration::days(200), 36.2, 23.1))
            .unwrap();

        let report = discover_merge_candidates(&store, &NullFingerprintScorer);
        assert_eq!(report.candidates_created, 0);
    }

    #[test]
    fn test_rerun_does_not_duplicate_candidates() {
        let store = FleetStore::temporary().unwrap();
        seed_swap_pair(&store);
        discover_merge_candidates(&store, &NullFingerprintScorer);
        let report = discover_merge_candidates(&store, &NullFingerprintScorer);
        assert_eq!(report.candidates_created, 0);
        assert_eq!(store.all_merge_candidates().unwrap().len(), 1);
    }
}
