//! Flag hopping detection: registries changed with suspicious frequency or
//! toward shadow-fleet convenience flags.
//!
//! Base score from change counts (2+ in 90 d → 20; 3+ in 90 d → 40; 5+ in
//! 365 d → 50). An ownership handoff within ±7 d of a flag change is benign
//! and halves the score; a high-risk latest registry doubles it; a low-risk
//! one halves it. Flag changes overlapping an AIS gap (±6 h) raise a
//! `dark_period_flag_change` sub-anomaly worth +20.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde_json::json;

use crate::config;
use crate::registry::flag_to_risk_category;
use crate::store::{FleetStore, StoreResult};
use crate::types::{FlagRisk, SpoofingAnomaly, SpoofingType, VesselHistory, VesselId};

use super::SpoofingRunReport;

const DARK_PERIOD_WINDOW_HOURS: i64 = 6;
const OWNERSHIP_HANDOFF_DAYS: i64 = 7;

pub fn detect_flag_hopping(store: &FleetStore) -> SpoofingRunReport {
    if !config::get().settings.flag_hopping_detection_enabled {
        return SpoofingRunReport::disabled();
    }

    let mut report = SpoofingRunReport::ok();

    let flag_changes = match store.history_by_field("flag") {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, "flag hopping could not read history");
            report.errors += 1;
            return report;
        }
    };
    if flag_changes.is_empty() {
        return report;
    }

    let owner_changes = store.history_by_field("owner_name").unwrap_or_default();
    let mut owner_dates: HashMap<VesselId, Vec<DateTime<Utc>>> = HashMap::new();
    for oc in owner_changes {
        owner_dates.entry(oc.vessel_id).or_default().push(oc.observed_at);
    }

    let mut by_vessel: HashMap<VesselId, Vec<VesselHistory>> = HashMap::new();
    for change in flag_changes {
        by_vessel.entry(change.vessel_id).or_default().push(change);
    }

    let now = Utc::now();
    for (vessel_id, changes) in &by_vessel {
        report.vessels_checked += 1;
        if changes.len() < 2 {
            continue;
        }
        if let Err(e) = evaluate_vessel(store, *vessel_id, changes, &owner_dates, now, &mut report)
        {
            tracing::warn!(vessel_id, error = %e, "flag hopping evaluation failed");
            report.errors += 1;
        }
    }

    tracing::info!(
        anomalies = report.anomalies_created,
        vessels = report.vessels_checked,
        "flag hopping detection complete"
    );
    report
}

fn evaluate_vessel(
    store: &FleetStore,
    vessel_id: VesselId,
    changes: &[VesselHistory],
    owner_dates: &HashMap<VesselId, Vec<DateTime<Utc>>>,
    now: DateTime<Utc>,
    report: &mut SpoofingRunReport,
) -> StoreResult<()> {
    let changes_90d = changes
        .iter()
        .filter(|c| (now - c.observed_at).num_days() <= 90)
        .count();
    let changes_365d = changes
        .iter()
        .filter(|c| (now - c.observed_at).num_days() <= 365)
        .count();

    let mut score: i64 = if changes_90d >= 3 {
        40
    } else if changes_90d >= 2 {
        20
    } else {
        0
    };
    if changes_365d >= 5 {
        score = score.max(50);
    }
    if score == 0 {
        return Ok(());
    }

    // Ownership handoff within ±7 d of any flag change is legitimate churn.
    let ownership_discount = changes.iter().any(|fc| {
        owner_dates
            .get(&vessel_id)
            .is_some_and(|dates| {
                dates
                    .iter()
                    .any(|od| (fc.observed_at - *od).num_days().abs() <= OWNERSHIP_HANDOFF_DAYS)
            })
    });
    if ownership_discount {
        score /= 2;
    }

    // Registry modifier from the most recent flag.
    let latest = changes.last().map(|c| c.new_value.trim()).unwrap_or("");
    match flag_to_risk_category(Some(latest)) {
        FlagRisk::HighRisk => score *= 2,
        FlagRisk::LowRisk => score /= 2,
        _ => {}
    }
    if score <= 0 {
        return Ok(());
    }

    if !store.has_anomaly_of_type(vessel_id, SpoofingType::FlagHopping)? {
        let flag_history: Vec<serde_json::Value> = changes
            .iter()
            .map(|c| {
                json!({
                    "old_flag": c.old_value,
                    "new_flag": c.new_value,
                    "date": c.observed_at.to_rfc3339(),
                })
            })
            .collect();

        store.insert_anomaly(&SpoofingAnomaly {
            anomaly_id: store.next_id()?,
            vessel_id,
            anomaly_type: SpoofingType::FlagHopping,
            start_time_utc: changes[0].observed_at,
            end_time_utc: changes.last().map(|c| c.observed_at),
            implied_speed_kn: None,
            plausibility_score: None,
            risk_score_component: score,
            evidence_json: json!({
                "flag_changes": flag_history,
                "changes_90d": changes_90d,
                "changes_365d": changes_365d,
                "ownership_discount": ownership_discount,
                "latest_flag": latest,
            }),
            gap_event_id: None,
        })?;
        report.anomalies_created += 1;
    }

    // Dark-period sub-anomaly: a flag change inside an AIS gap (±6 h).
    // One per vessel is sufficient.
    let gaps = store.gap_events_for_vessel(vessel_id)?;
    for fc in changes {
        let window = Duration::hours(DARK_PERIOD_WINDOW_HOURS);
        let overlapping = gaps.iter().find(|g| {
            g.gap_start_utc <= fc.observed_at + window && g.gap_end_utc >= fc.observed_at - window
        });
        let Some(gap) = overlapping else { continue };

        let already = store.anomalies_for_vessel(vessel_id)?.iter().any(|a| {
            a.anomaly_type == SpoofingType::FlagHopping
                && a.evidence_json["sub_type"] == "dark_period_flag_change"
        });
        if !already {
            store.insert_anomaly(&SpoofingAnomaly {
                anomaly_id: store.next_id()?,
                vessel_id,
                anomaly_type: SpoofingType::FlagHopping,
                start_time_utc: fc.observed_at,
                end_time_utc: Some(fc.observed_at),
                implied_speed_kn: None,
                plausibility_score: None,
                risk_score_component: 20,
                evidence_json: json!({
                    "sub_type": "dark_period_flag_change",
                    "flag_change_date": fc.observed_at.to_rfc3339(),
                    "old_flag": fc.old_value,
                    "new_flag": fc.new_value,
                    "gap_event_id": gap.gap_event_id,
                    "gap_start": gap.gap_start_utc.to_rfc3339(),
                    "gap_end": gap.gap_end_utc.to_rfc3339(),
                }),
                gap_event_id: Some(gap.gap_event_id),
            })?;
            report.anomalies_created += 1;
        }
        break;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AisGapEvent, AlertStatus, Vessel};
    use chrono::TimeZone;

    fn seed_vessel(store: &FleetStore, id: u64, mmsi: &str) {
        store
            .insert_vessel(&Vessel::new(
                id,
                mmsi,
                Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            ))
            .unwrap();
    }

    fn record_flag_change(store: &FleetStore, vessel: u64, old: &str, new: &str, days_ago: i64) {
        store
            .record_history(vessel, "flag", old, new, Utc::now() - Duration::days(days_ago), "test")
            .unwrap();
    }

    #[test]
    fn test_two_changes_in_90d_base_20() {
        let store = FleetStore::temporary().unwrap();
        seed_vessel(&store, 1, "636017000");
        record_flag_change(&store, 1, "LR", "PA", 40);
        record_flag_change(&store, 1, "PA", "MT", 10);
        let report = detect_flag_hopping(&store);
        assert_eq!(report.anomalies_created, 1);
        // MT is medium risk: no modifier.
        assert_eq!(
            store.anomalies_for_vessel(1).unwrap()[0].risk_score_component,
            20
        );
    }

    #[test]
    fn test_high_risk_latest_flag_doubles() {
        let store = FleetStore::temporary().unwrap();
        seed_vessel(&store, 1, "636017000");
        record_flag_change(&store, 1, "LR", "PA", 40);
        record_flag_change(&store, 1, "PA", "PW", 10); // Palau: high risk
        detect_flag_hopping(&store);
        assert_eq!(
            store.anomalies_for_vessel(1).unwrap()[0].risk_score_component,
            40
        );
    }

    #[test]
    fn test_ownership_handoff_halves() {
        let store = FleetStore::temporary().unwrap();
        seed_vessel(&store, 1, "636017000");
        record_flag_change(&store, 1, "LR", "PA", 40);
        record_flag_change(&store, 1, "PA", "MT", 10);
        store
            .record_history(1, "owner_name", "Alpha", "Beta", Utc::now() - Duration::days(12), "test")
            .unwrap();
        detect_flag_hopping(&store);
        assert_eq!(
            store.anomalies_for_vessel(1).unwrap()[0].risk_score_component,
            10
        );
    }

    #[test]
    fn test_single_change_is_clean() {
        let store = FleetStore::temporary().unwrap();
        seed_vessel(&store, 1, "636017000");
        record_flag_change(&store, 1, "LR", "PA", 10);
        let report = detect_flag_hopping(&store);
        assert_eq!(report.anomalies_created, 0);
    }

    #[test]
    fn test_dark_period_flag_change_sub_anomaly() {
        let store = FleetStore::temporary().unwrap();
        seed_vessel(&store, 1, "636017000");
        let change_time = Utc::now() - Duration::days(10);
        store
            .insert_gap_event(&AisGapEvent {
                gap_event_id: 500,
                vessel_id: 1,
                gap_start_utc: change_time - Duration::hours(3),
                gap_end_utc: change_time + Duration::hours(3),
                duration_minutes: 360,
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
                original_vessel_id: 1,
                is_feed_outage: false,
                coverage_quality: None,
            })
            .unwrap();
        record_flag_change(&store, 1, "LR", "PA", 40);
        store
            .record_history(1, "flag", "PA", "MT", change_time, "test")
            .unwrap();

        let report = detect_flag_hopping(&store);
        // Base anomaly + dark-period sub-anomaly.
        assert_eq!(report.anomalies_created, 2);
        let anomalies = store.anomalies_for_vessel(1).unwrap();
        let sub = anomalies
            .iter()
            .find(|a| a.evidence_json["sub_type"] == "dark_period_flag_change")
            .unwrap();
        assert_eq!(sub.risk_score_component, 20);
        assert_eq!(sub.gap_event_id, Some(500));
    }
}
