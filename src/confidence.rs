//! Multi-signal confidence classification.
//!
//! Aggregates each vessel's risk breakdown across evidence categories and
//! maps the result to CONFIRMED / HIGH / MEDIUM / LOW / NONE. Positive
//! contributions only — deductions never build evidence — and `_`-prefixed
//! bookkeeping keys are skipped.

use std::collections::BTreeMap;

use crate::scoring::Breakdown;
use crate::store::{FleetStore, StoreResult};
use crate::types::{ConfidenceLevel, EvidenceCategory, Vessel};

// ============================================================================
// Category mapping (prefix-based)
// ============================================================================

static WATCHLIST_PREFIXES: &[&str] = &["watchlist_", "owner_or_manager_on_sanctions"];
static SPOOFING_PREFIXES: &[&str] = &[
    "spoofing_",
    "track_naturalness",
    "stale_ais",
    "stateless_mmsi",
    "imo_fraud",
    "cross_receiver",
    "identity_swap",
    "fake_",
    "circle_spoof",
];
static STS_PREFIXES: &[&str] = &[
    "sts_",
    "gap_in_sts_tagged_corridor",
    "repeat_sts",
    "dark_dark_sts",
    "draught_",
];
static IDENTITY_PREFIXES: &[&str] = &[
    "flag_change",
    "flag_AND_name",
    "callsign_change",
    "class_switching",
    "flag_hopping",
    "rename_velocity",
    "invalid_metadata",
    "ais_class_mismatch",
];
static LOITERING_PREFIXES: &[&str] = &["loiter_", "vessel_laid_up"];
static FLEET_PREFIXES: &[&str] = &[
    "fleet_",
    "owner_cluster",
    "shared_manager",
    "shared_pi",
    "convoy_",
    "ownership_",
];
/// Map a risk breakdown key to its evidence category.
///
/// Gap signals (gap_duration, gap_frequency, impossible_reappear,
/// dark_zone, dark_vessel, movement_envelope, speed_spike, ...) and any
/// contextual modifier without a matching prefix (vessel_age, flag_state,
/// pi_coverage, psc, russian_port_call) land in AIS_GAP: they modify the
/// gap score rather than forming standalone evidence categories.
pub fn categorize_key(key: &str) -> EvidenceCategory {
    let matches = |prefixes: &[&str]| prefixes.iter().any(|p| key.starts_with(p));
    if matches(WATCHLIST_PREFIXES) {
        EvidenceCategory::Watchlist
    } else if matches(SPOOFING_PREFIXES) {
        EvidenceCategory::Spoofing
    } else if matches(STS_PREFIXES) {
        EvidenceCategory::StsTransfer
    } else if matches(IDENTITY_PREFIXES) {
        EvidenceCategory::IdentityChange
    } else if matches(LOITERING_PREFIXES) {
        EvidenceCategory::Loitering
    } else if matches(FLEET_PREFIXES) {
        EvidenceCategory::FleetPattern
    } else {
        EvidenceCategory::AisGap
    }
}

// ============================================================================
// Classification
// ============================================================================

/// Classify one vessel from its best gap breakdown.
///
/// `total_score` is the maximum gap score across the vessel's events;
/// `breakdown` the breakdown of that gap.
pub fn classify_vessel_confidence(
    total_score: i64,
    breakdown: &Breakdown,
    has_watchlist_match: bool,
    analyst_verified: bool,
) -> (ConfidenceLevel, BTreeMap<EvidenceCategory, i64>) {
    let mut category_points: BTreeMap<EvidenceCategory, i64> = BTreeMap::new();
    for (key, points) in breakdown.signals() {
        if points <= 0 {
            continue; // deductions don't build evidence
        }
        *category_points.entry(categorize_key(key)).or_default() += points;
    }

    let categories_with_signal = category_points.values().filter(|p| **p > 0).count();
    let any_category = |floor: i64| category_points.values().any(|p| *p >= floor);

    let level = if analyst_verified || has_watchlist_match {
        ConfidenceLevel::Confirmed
    } else if total_score >= 76 && (categories_with_signal >= 2 || any_category(80)) {
        ConfidenceLevel::High
    } else if total_score >= 51 && any_category(30) {
        ConfidenceLevel::Medium
    } else if total_score >= 21 {
        ConfidenceLevel::Low
    } else {
        ConfidenceLevel::None
    };

    (level, category_points)
}

/// Classification step summary.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ConfidenceReport {
    pub classified: usize,
    pub by_level: BTreeMap<String, usize>,
    pub errors: usize,
}

/// Classify every non-absorbed vessel with scored gaps, writing
/// `dark_fleet_confidence` and the evidence map back onto the vessel.
pub fn classify_all_vessels(store: &FleetStore) -> ConfidenceReport {
    let mut report = ConfidenceReport::default();
    let vessels = match store.active_vessels() {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "confidence classification could not list vessels");
            report.errors += 1;
            return report;
        }
    };

    for vessel in vessels {
        match classify_one(store, &vessel) {
            Ok(Some(level)) => {
                report.classified += 1;
                *report.by_level.entry(level.to_string()).or_default() += 1;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(mmsi = %vessel.mmsi, error = %e, "confidence classification failed");
                report.errors += 1;
            }
        }
    }

    tracing::info!(
        classified = report.classified,
        by_level = ?report.by_level,
        "confidence classification complete"
    );
    report
}

fn classify_one(store: &FleetStore, vessel: &Vessel) -> StoreResult<Option<ConfidenceLevel>> {
    let gaps = store.gap_events_for_vessel(vessel.vessel_id)?;
    let best = gaps
        .iter()
        .filter(|g| g.risk_score > 0)
        .max_by_key(|g| g.risk_score);
    let Some(best) = best else {
        return Ok(None);
    };

    let breakdown = best
        .risk_breakdown_json
        .as_ref()
        .and_then(Breakdown::from_value)
        .unwrap_or_default();
    let has_watchlist = !store.active_watchlist_for_vessel(vessel.vessel_id)?.is_empty();

    let (level, evidence) = classify_vessel_confidence(
        best.risk_score,
        &breakdown,
        has_watchlist,
        vessel.analyst_verified,
    );

    let mut updated = store.vessel(vessel.vessel_id)?;
    updated.dark_fleet_confidence = Some(level);
    let evidence_json: BTreeMap<String, i64> = evidence
        .iter()
        .map(|(category, points)| (category.to_string(), *points))
        .collect();
    updated.confidence_evidence_json =
        Some(serde_json::to_value(evidence_json).unwrap_or(serde_json::Value::Null));
    store.update_vessel(&updated)?;
    Ok(Some(level))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breakdown(entries: &[(&str, i64)]) -> Breakdown {
        let mut b = Breakdown::new();
        for (key, points) in entries {
            b.add(key, *points);
        }
        b.note("_final_score", 0);
        b
    }

    #[test]
    fn test_category_mapping() {
        assert_eq!(categorize_key("gap_duration_24h_plus"), EvidenceCategory::AisGap);
        assert_eq!(categorize_key("spoofing_linked_anomalies"), EvidenceCategory::Spoofing);
        assert_eq!(categorize_key("sts_event_linked"), EvidenceCategory::StsTransfer);
        assert_eq!(categorize_key("flag_hopping_pattern"), EvidenceCategory::IdentityChange);
        assert_eq!(categorize_key("vessel_laid_up_30d"), EvidenceCategory::Loitering);
        assert_eq!(categorize_key("watchlist_active_entry"), EvidenceCategory::Watchlist);
        assert_eq!(categorize_key("fleet_dark_coordination"), EvidenceCategory::FleetPattern);
        // Contextual modifiers default to AIS_GAP.
        assert_eq!(categorize_key("vessel_age_15_20y"), EvidenceCategory::AisGap);
        assert_eq!(categorize_key("flag_state_high_risk"), EvidenceCategory::AisGap);
    }

    #[test]
    fn test_watchlist_always_confirmed() {
        let b = breakdown(&[("gap_duration_under_4h", 5)]);
        let (level, _) = classify_vessel_confidence(10, &b, true, false);
        assert_eq!(level, ConfidenceLevel::Confirmed);
    }

    #[test]
    fn test_high_needs_two_categories_or_heavy_single() {
        // Two categories with signal at a critical score.
        let b = breakdown(&[("gap_duration_24h_plus", 45), ("sts_event_linked", 25)]);
        let (level, evidence) = classify_vessel_confidence(80, &b, false, false);
        assert_eq!(level, ConfidenceLevel::High);
        assert_eq!(evidence.len(), 2);

        // Single category below 80 points: not HIGH despite the score.
        let b = breakdown(&[("gap_duration_24h_plus", 45)]);
        let (level, _) = classify_vessel_confidence(80, &b, false, false);
        assert_eq!(level, ConfidenceLevel::Medium);

        // Single category at 80+ points qualifies alone.
        let b = breakdown(&[("gap_duration_24h_plus", 45), ("gap_frequency_recent", 40)]);
        let (level, _) = classify_vessel_confidence(80, &b, false, false);
        assert_eq!(level, ConfidenceLevel::High);
    }

    #[test]
    fn test_medium_low_none_bands() {
        let b = breakdown(&[("gap_duration_16_24h", 35)]);
        let (level, _) = classify_vessel_confidence(60, &b, false, false);
        assert_eq!(level, ConfidenceLevel::Medium);

        let b = breakdown(&[("gap_duration_4_8h", 15)]);
        let (level, _) = classify_vessel_confidence(35, &b, false, false);
        assert_eq!(level, ConfidenceLevel::Low);

        let (level, _) = classify_vessel_confidence(12, &b, false, false);
        assert_eq!(level, ConfidenceLevel::None);
    }

    #[test]
    fn test_deductions_do_not_build_evidence() {
        let b = breakdown(&[
            ("gap_duration_24h_plus", 45),
            ("dark_zone_expected_loss", -10),
            ("legitimacy_clean_history", -10),
        ]);
        let (_, evidence) = classify_vessel_confidence(40, &b, false, false);
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[&EvidenceCategory::AisGap], 45);
    }
}
