//! P&I club cycling detection.
//!
//! Legitimate vessels hold long-term coverage with IG-group clubs. Two or
//! more club changes inside 90 days is churn typical of delisted sanctioned
//! tonnage (+20); landing on a non-IG club raises it to +30.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::json;

use crate::config;
use crate::store::{FleetStore, StoreResult};
use crate::types::{SpoofingAnomaly, SpoofingType, VesselHistory, VesselId};

use super::SpoofingRunReport;

/// International Group P&I clubs (normalized names). These cover ~90% of
/// world tonnage; coverage elsewhere is a risk signal.
static IG_PI_CLUBS: &[&str] = &[
    "american steamship owners mutual protection and indemnity association",
    "american club",
    "assuranceforeningen skuld",
    "skuld",
    "britannia steam ship insurance association",
    "britannia",
    "gard p&i",
    "gard",
    "japan ship owners' mutual protection & indemnity association",
    "japan p&i club",
    "the london steam-ship owners' mutual insurance association",
    "london p&i club",
    "north of england protecting & indemnity association",
    "north p&i",
    "the shipowners' mutual protection and indemnity association",
    "shipowners club",
    "the standard club",
    "standard club",
    "steamship mutual underwriting association",
    "steamship mutual",
    "the swedish club",
    "swedish club",
    "united kingdom mutual steam ship assurance association",
    "uk p&i club",
    "west of england ship owners mutual insurance association",
    "west of england",
];

/// Check if a P&I club name matches an IG group member.
pub fn is_ig_club(club_name: Option<&str>) -> bool {
    club_name.is_some_and(|name| {
        let normalized = name.trim().to_ascii_lowercase();
        IG_PI_CLUBS.contains(&normalized.as_str())
    })
}

pub fn detect_pi_cycling(store: &FleetStore) -> SpoofingRunReport {
    if !config::get().settings.pi_cycling_detection_enabled {
        return SpoofingRunReport::disabled();
    }

    let mut report = SpoofingRunReport::ok();
    let changes = match store.history_by_field("pi_club_name") {
        Ok(rows) => rows,
        Err(e) => {
            tracing::error!(error = %e, "P&I cycling could not read history");
            report.errors += 1;
            return report;
        }
    };
    if changes.is_empty() {
        return report;
    }

    let mut by_vessel: HashMap<VesselId, Vec<VesselHistory>> = HashMap::new();
    for change in changes {
        by_vessel.entry(change.vessel_id).or_default().push(change);
    }

    let now = Utc::now();
    for (vessel_id, changes) in &by_vessel {
        report.vessels_checked += 1;
        if changes.len() < 2 {
            continue;
        }
        let changes_90d = changes
            .iter()
            .filter(|c| (now - c.observed_at).num_days() <= 90)
            .count();
        if changes_90d < 2 {
            continue;
        }

        let latest_club = changes.last().map(|c| c.new_value.as_str());
        let non_ig = !is_ig_club(latest_club);
        let score = if non_ig { 30 } else { 20 };

        let result = (|| -> StoreResult<bool> {
            if store.has_anomaly_of_type(*vessel_id, SpoofingType::PiCycling)? {
                return Ok(false);
            }
            let change_history: Vec<serde_json::Value> = changes
                .iter()
                .map(|c| {
                    json!({
                        "old_club": c.old_value,
                        "new_club": c.new_value,
                        "date": c.observed_at.to_rfc3339(),
                    })
                })
                .collect();
            store.insert_anomaly(&SpoofingAnomaly {
                anomaly_id: store.next_id()?,
                vessel_id: *vessel_id,
                anomaly_type: SpoofingType::PiCycling,
                start_time_utc: changes[0].observed_at,
                end_time_utc: changes.last().map(|c| c.observed_at),
                implied_speed_kn: None,
                plausibility_score: None,
                risk_score_component: score,
                evidence_json: json!({
                    "changes_90d": changes_90d,
                    "total_changes": changes.len(),
                    "non_ig_club": non_ig,
                    "latest_club": latest_club,
                    "change_history": change_history,
                }),
                gap_event_id: None,
            })?;
            Ok(true)
        })();

        match result {
            Ok(true) => report.anomalies_created += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(vessel_id, error = %e, "P&I cycling write failed");
                report.errors += 1;
            }
        }
    }

    tracing::info!(
        anomalies = report.anomalies_created,
        vessels = report.vessels_checked,
        "P&I cycling detection complete"
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vessel;
    use chrono::{Duration, TimeZone};

    fn seed(store: &FleetStore) {
        store
            .insert_vessel(&Vessel::new(
                1,
                "636017000",
                Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            ))
            .unwrap();
    }

    fn club_change(store: &FleetStore, old: &str, new: &str, days_ago: i64) {
        store
            .record_history(1, "pi_club_name", old, new, Utc::now() - Duration::days(days_ago), "test")
            .unwrap();
    }

    #[test]
    fn test_ig_club_matcher() {
        assert!(is_ig_club(Some("Gard")));
        assert!(is_ig_club(Some("UK P&I Club")));
        assert!(!is_ig_club(Some("Ingosstrakh")));
        assert!(!is_ig_club(None));
    }

    #[test]
    fn test_cycling_to_non_ig_scores_30() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        club_change(&store, "Gard", "Skuld", 60);
        club_change(&store, "Skuld", "Ingosstrakh", 10);
        let report = detect_pi_cycling(&store);
        assert_eq!(report.anomalies_created, 1);
        let a = &store.anomalies_for_vessel(1).unwrap()[0];
        assert_eq!(a.risk_score_component, 30);
        assert_eq!(a.evidence_json["non_ig_club"], true);
    }

    #[test]
    fn test_cycling_within_ig_scores_20() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        club_change(&store, "Gard", "Skuld", 60);
        club_change(&store, "Skuld", "Britannia", 10);
        let report = detect_pi_cycling(&store);
        assert_eq!(report.anomalies_created, 1);
        assert_eq!(
            store.anomalies_for_vessel(1).unwrap()[0].risk_score_component,
            20
        );
    }

    #[test]
    fn test_old_changes_not_counted() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        club_change(&store, "Gard", "Skuld", 200);
        club_change(&store, "Skuld", "Britannia", 150);
        let report = detect_pi_cycling(&store);
        assert_eq!(report.anomalies_created, 0);
    }
}
