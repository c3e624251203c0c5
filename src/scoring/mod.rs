//! Risk scoring engine.
//!
//! Scores one gap at a time: additive signals accumulate into an ordered
//! breakdown, then corridor and vessel-size multipliers apply and the result
//! is capped at 100 and banded. Every coefficient comes from the loaded
//! `risk_scoring.yaml`; scoring is deterministic given (gap, config, store
//! snapshot) and mutates nothing but the scored gap's `risk_score` and
//! `risk_breakdown_json`.
//!
//! Cross-signal lookups that fail degrade to conservative values — a score
//! is never elevated on failed evidence.

mod breakdown;

pub use breakdown::Breakdown;

use chrono::{DateTime, Duration, Utc};

use crate::config::{self, RiskScoringConfig, ScoreBand};
use crate::store::{FleetStore, StoreResult};
use crate::types::{AisClass, AisGapEvent, CorridorType, FlagRisk, PiStatus, Vessel};

/// Result of scoring one gap.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreOutcome {
    pub score: i64,
    pub band: ScoreBand,
    pub breakdown: Breakdown,
}

/// Scoring step summary.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct ScoringReport {
    pub scored: usize,
    pub skipped_feed_outage: usize,
    pub errors: usize,
}

/// Window around a gap for linked-anomaly association, hours.
const ANOMALY_LINK_WINDOW_H: i64 = 6;
/// Same-position threshold for the identity-swap check, nm.
const SAME_POSITION_NM: f64 = 1.0;
/// Cap on combined loitering-pattern additions.
const LOITER_PATHWAY_CAP: i64 = 30;

/// EU member flags for the verified-EU-port-call legitimacy deduction.
static EU_COUNTRIES: &[&str] = &[
    "AT", "BE", "BG", "HR", "CY", "CZ", "DK", "EE", "FI", "FR", "DE", "GR", "HU", "IE", "IT",
    "LV", "LT", "LU", "MT", "NL", "PL", "PT", "RO", "SK", "SI", "ES", "SE",
];

// ============================================================================
// Batch entry point
// ============================================================================

/// Score all unscored gap events. Feed-outage gaps are skipped.
pub fn score_all_alerts(store: &FleetStore) -> ScoringReport {
    let config = config::get();
    let mut report = ScoringReport::default();

    let gaps = match store.unscored_gap_events() {
        Ok(g) => g,
        Err(e) => {
            tracing::error!(error = %e, "scoring could not list unscored gaps");
            report.errors += 1;
            return report;
        }
    };

    for gap in gaps {
        match compute_gap_score(store, &gap, &config.risk) {
            Ok(Some(outcome)) => {
                let mut scored = gap.clone();
                scored.risk_score = outcome.score;
                scored.risk_breakdown_json = Some(outcome.breakdown.to_value());
                if let Err(e) = store.update_gap_event(&scored) {
                    tracing::warn!(gap_event_id = gap.gap_event_id, error = %e, "failed to persist score");
                    report.errors += 1;
                    continue;
                }
                store.audit("scoring", "score", "gap_event", gap.gap_event_id);
                report.scored += 1;
            }
            Ok(None) => report.skipped_feed_outage += 1,
            Err(e) => {
                tracing::warn!(gap_event_id = gap.gap_event_id, error = %e, "scoring failed for gap");
                report.errors += 1;
            }
        }
    }

    tracing::info!(
        scored = report.scored,
        skipped = report.skipped_feed_outage,
        errors = report.errors,
        "scoring complete"
    );
    report
}

// ============================================================================
// Single-gap evaluator
// ============================================================================

/// Score one gap. Returns `None` for feed-outage gaps (they are never
/// scored).
pub fn compute_gap_score(
    store: &FleetStore,
    gap: &AisGapEvent,
    config: &RiskScoringConfig,
) -> StoreResult<Option<ScoreOutcome>> {
    if gap.is_feed_outage {
        return Ok(None);
    }

    let vessel = store.vessel(gap.vessel_id)?;
    let mut breakdown = Breakdown::new();

    apply_gap_duration(gap, &vessel, config, &mut breakdown);
    apply_movement_envelope(gap, config, &mut breakdown);

    // Cross-signal lookups are individually guarded: a failed query logs,
    // contributes nothing, and never aborts the evaluation.
    if let Err(e) = apply_gap_frequency(store, gap, config, &mut breakdown) {
        tracing::warn!(error = %e, "gap frequency lookup failed - contributing 0");
    }
    if let Err(e) = apply_dark_vessel(store, gap, config, &mut breakdown) {
        tracing::warn!(error = %e, "dark vessel lookup failed - contributing 0");
    }
    apply_dark_zone(gap, config, &mut breakdown);
    apply_vessel_metadata(gap, &vessel, config, &mut breakdown);
    if let Err(e) = apply_behavioral(store, gap, &vessel, config, &mut breakdown) {
        tracing::warn!(error = %e, "behavioral lookup failed - contributing 0");
    }
    if let Err(e) = apply_watchlist(store, gap, config, &mut breakdown) {
        tracing::warn!(error = %e, "watchlist lookup failed - contributing 0");
    }
    if let Err(e) = apply_linked_anomalies(store, gap, config, &mut breakdown) {
        tracing::warn!(error = %e, "linked anomaly lookup failed - contributing 0");
    }
    if let Err(e) = apply_sts_pathway(store, gap, config, &mut breakdown) {
        tracing::warn!(error = %e, "STS pathway lookup failed - contributing 0");
    }
    if let Err(e) = apply_sanctions_network(store, gap, config, &mut breakdown) {
        tracing::warn!(error = %e, "sanctions network lookup failed - contributing 0");
    }
    apply_identity_swap_check(store, gap, &vessel, config, &mut breakdown);
    if let Err(e) = apply_legitimacy(store, gap, &vessel, config, &mut breakdown) {
        tracing::warn!(error = %e, "legitimacy lookup failed - contributing 0");
    }

    let additive = breakdown.additive_total();

    let corridor_mult = match gap.corridor_id {
        Some(corridor_id) => match store.corridor(corridor_id) {
            Ok(corridor) => config.corridor.for_type(corridor.corridor_type),
            Err(e) => {
                // A missing corridor row must not inflate the score.
                tracing::warn!(corridor_id, error = %e, "corridor lookup failed - using default multiplier");
                config.corridor.default
            }
        },
        None => config.corridor.default,
    };
    let size_mult = config.vessel_size_multiplier.for_deadweight(vessel.deadweight);

    let raw = (additive as f64 * corridor_mult * size_mult).round() as i64;
    let final_score = raw.clamp(0, 100);

    breakdown.note("_additive_subtotal", additive);
    breakdown.note("_corridor_multiplier", corridor_mult);
    breakdown.note("_vessel_size_multiplier", size_mult);
    breakdown.note("_final_score", final_score);

    Ok(Some(ScoreOutcome {
        score: final_score,
        band: config.score_bands.classify(final_score),
        breakdown,
    }))
}

// ============================================================================
// Additive signals
// ============================================================================

fn apply_gap_duration(
    gap: &AisGapEvent,
    vessel: &Vessel,
    config: &RiskScoringConfig,
    breakdown: &mut Breakdown,
) {
    let hours = gap.duration_hours();
    let (key, points) = if hours >= 24.0 {
        ("gap_duration_24h_plus", config.gap_duration.over_24h)
    } else if hours >= 16.0 {
        ("gap_duration_16_24h", config.gap_duration.h16_to_24h)
    } else if hours >= 8.0 {
        ("gap_duration_8_16h", config.gap_duration.h8_to_16h)
    } else if hours >= 4.0 {
        ("gap_duration_4_8h", config.gap_duration.h4_to_8h)
    } else {
        ("gap_duration_under_4h", config.gap_duration.under_4h)
    };
    breakdown.add(key, points);

    // A sprint right before going dark is the classic run-for-it signature.
    let spike_threshold = spike_threshold_kn(vessel.deadweight, config);
    if gap.pre_gap_sog.is_some_and(|sog| sog > spike_threshold) {
        let bonus =
            points * config.gap_duration.pre_gap_speed_spike_bonus_pct / 100;
        breakdown.add("speed_spike_before_gap", bonus);
    }
}

fn spike_threshold_kn(deadweight: Option<f64>, config: &RiskScoringConfig) -> f64 {
    match deadweight {
        Some(dwt) if dwt >= 200_000.0 => config.speed_anomaly.spike_threshold_vlcc_kn,
        Some(dwt) if dwt >= 120_000.0 => config.speed_anomaly.spike_threshold_suezmax_kn,
        Some(dwt) if dwt >= 80_000.0 => config.speed_anomaly.spike_threshold_aframax_kn,
        Some(dwt) if dwt >= 60_000.0 => config.speed_anomaly.spike_threshold_panamax_kn,
        _ => config.speed_anomaly.spike_threshold_default_kn,
    }
}

fn apply_movement_envelope(
    gap: &AisGapEvent,
    config: &RiskScoringConfig,
    breakdown: &mut Breakdown,
) {
    let Some(ratio) = gap.velocity_plausibility_ratio else {
        return;
    };
    if ratio > 1.1 && gap.impossible_speed_flag {
        breakdown.add("impossible_reappear", config.movement_envelope.impossible_reappear);
    } else if ratio > 1.05 {
        breakdown.add(
            "movement_envelope_ratio_high",
            config.movement_envelope.ratio_above_1_05,
        );
    } else if ratio > 1.0 {
        breakdown.add(
            "movement_envelope_ratio_elevated",
            config.movement_envelope.ratio_above_1_0,
        );
    }
}

/// Per-identity gap frequency: counted by `original_vessel_id` so merged
/// vessels cannot inflate the signal by accumulating identities.
fn apply_gap_frequency(
    store: &FleetStore,
    gap: &AisGapEvent,
    config: &RiskScoringConfig,
    breakdown: &mut Breakdown,
) -> StoreResult<()> {
    let since = gap.gap_start_utc - Duration::days(config.gap_frequency.window_days);
    let recent = store.gaps_by_identity_since(gap.original_vessel_id, since)?;
    let count = recent
        .iter()
        .filter(|g| g.gap_start_utc <= gap.gap_start_utc)
        .count() as u32;

    if count > 1 {
        let points = (i64::from(count) - 1) * config.gap_frequency.per_gap_points;
        breakdown.add(
            "gap_frequency_recent",
            points.min(config.gap_frequency.max_points),
        );
    }
    if count >= config.gap_frequency.multi_gap_threshold {
        breakdown.add("gap_frequency_multi_gap", config.gap_frequency.multi_gap_bonus);
    }
    Ok(())
}

/// Unmatched satellite detection near the gap's off/on position inside its
/// window.
fn apply_dark_vessel(
    store: &FleetStore,
    gap: &AisGapEvent,
    config: &RiskScoringConfig,
    breakdown: &mut Breakdown,
) -> StoreResult<()> {
    let positions = [
        (gap.gap_off_lat, gap.gap_off_lon),
        (gap.gap_on_lat, gap.gap_on_lon),
    ];
    for (lat, lon) in positions.into_iter().flat_map(|(lat, lon)| lat.zip(lon)) {
        let matches = store.unmatched_dark_detections_near(
            lat,
            lon,
            config.dark_vessel.match_radius_nm,
            gap.gap_start_utc,
            gap.gap_end_utc,
        )?;
        if !matches.is_empty() {
            let points = if gap.corridor_id.is_some() {
                config.dark_vessel.in_corridor
            } else {
                config.dark_vessel.outside_corridor
            };
            breakdown.add("dark_vessel_detection_match", points);
            return Ok(());
        }
    }
    Ok(())
}

/// Dark zones are expected signal loss; they reduce maliciousness unless an
/// evasion signal (impossible reappear) overrides.
fn apply_dark_zone(gap: &AisGapEvent, config: &RiskScoringConfig, breakdown: &mut Breakdown) {
    if gap.in_dark_zone && !gap.impossible_speed_flag {
        breakdown.add("dark_zone_expected_loss", config.dark_zone.jamming_zone_deduction);
    }
}

fn apply_vessel_metadata(
    gap: &AisGapEvent,
    vessel: &Vessel,
    config: &RiskScoringConfig,
    breakdown: &mut Breakdown,
) {
    // Age brackets follow the KSE calibration: 10-15 y is unremarkable,
    // 15 y and beyond is shadow-fleet territory.
    if let Some(age) = vessel.age_years(gap.gap_start_utc) {
        if age >= 15 {
            breakdown.add("vessel_age_15_20y", config.vessel_age.age_15_20y);
        } else if age >= 10 {
            breakdown.add("vessel_age_10_15y", config.vessel_age.age_10_15y);
        }
    }

    if let Some(first_seen) = vessel.mmsi_first_seen_utc {
        if (gap.gap_start_utc - first_seen).num_days() < config.metadata.new_mmsi_days
            && gap.gap_start_utc >= first_seen
        {
            breakdown.add("new_mmsi_identity", config.metadata.new_mmsi);
        }
    }

    match vessel.flag_risk_category {
        FlagRisk::HighRisk => breakdown.add("flag_state_high_risk", config.flag_state.high_risk),
        FlagRisk::MediumRisk => {
            breakdown.add("flag_state_medium_risk", config.flag_state.medium_risk);
        }
        FlagRisk::LowRisk => breakdown.add("flag_state_low_risk", config.flag_state.low_risk),
        FlagRisk::Unknown => {}
    }

    if vessel.ais_class == AisClass::B && vessel.deadweight.is_some_and(|d| d >= 20_000.0) {
        breakdown.add("ais_class_b_on_tanker", config.ais_class.class_b_on_tanker);
    }

    if vessel.psc_detained_last_12m {
        breakdown.add("psc_detained_12m", config.psc_detention.detained_last_12m);
    }
    if vessel.psc_major_deficiencies_last_12m > 0 {
        let points = i64::from(vessel.psc_major_deficiencies_last_12m)
            * config.psc_detention.major_deficiency_each;
        breakdown.add(
            "psc_major_deficiencies",
            points.min(config.psc_detention.max_points),
        );
    }

    if vessel.vessel_laid_up_in_sts_zone {
        breakdown.add("vessel_laid_up_in_sts_zone", config.metadata.laid_up_in_sts_zone);
    } else if vessel.vessel_laid_up_60d {
        breakdown.add("vessel_laid_up_60d", config.metadata.laid_up_60d);
    } else if vessel.vessel_laid_up_30d {
        breakdown.add("vessel_laid_up_30d", config.metadata.laid_up_30d);
    }

    if vessel.pi_coverage_status == PiStatus::Lapsed {
        breakdown.add("pi_coverage_lapsed", config.pi_insurance.lapsed);
    }
}

/// Russian port call inside the voyage window before the gap. The window is
/// derived from the current voyage; a failed derivation falls back to 30
/// days with an explicit breakdown note.
fn apply_behavioral(
    store: &FleetStore,
    gap: &AisGapEvent,
    vessel: &Vessel,
    config: &RiskScoringConfig,
    breakdown: &mut Breakdown,
) -> StoreResult<()> {
    let window_days = match derive_voyage_window_days(store, vessel, gap.gap_start_utc) {
        Ok(days) => days,
        Err(e) => {
            tracing::warn!(error = %e, "voyage window derivation failed - using 30d default");
            breakdown.note("_voyage_window_fallback", "default_30d_used");
            30
        }
    };

    let since = gap.gap_start_utc - Duration::days(window_days);
    let calls = store.port_calls_for_vessel_since(vessel.vessel_id, since)?;
    let russian_call = calls.iter().any(|call| {
        call.arrival_utc <= gap.gap_start_utc
            && call.port_id.is_some_and(|port_id| {
                store.port(port_id).is_ok_and(|p| {
                    p.is_russian_oil_terminal || p.country.as_deref() == Some("RU")
                })
            })
    });
    if !russian_call {
        return Ok(());
    }

    let in_sts_corridor = match gap.corridor_id {
        Some(corridor_id) => store
            .corridor(corridor_id)
            .is_ok_and(|c| c.corridor_type == CorridorType::StsZone),
        None => false,
    };
    if in_sts_corridor {
        breakdown.add(
            "russian_port_call_sts_composite",
            config.behavioral.russian_port_call_sts_composite,
        );
    } else {
        breakdown.add("russian_port_call_voyage", config.behavioral.russian_port_call);
    }
    Ok(())
}

/// Voyage window: time since the departure that started the current voyage,
/// bounded to [the configured default, 90 d].
fn derive_voyage_window_days(
    store: &FleetStore,
    vessel: &Vessel,
    gap_start: DateTime<Utc>,
) -> StoreResult<i64> {
    let config = config::get();
    let default_days = config.risk.behavioral.voyage_window_days;
    let calls = store.port_calls_for_vessel(vessel.vessel_id)?;
    let last_departure = calls
        .iter()
        .filter_map(|c| c.departure_utc)
        .filter(|d| *d <= gap_start)
        .max();
    Ok(match last_departure {
        Some(departure) => (gap_start - departure).num_days().clamp(default_days, 90),
        None => default_days,
    })
}

fn apply_watchlist(
    store: &FleetStore,
    gap: &AisGapEvent,
    config: &RiskScoringConfig,
    breakdown: &mut Breakdown,
) -> StoreResult<()> {
    let entries = store.active_watchlist_for_vessel(gap.vessel_id)?;
    if let Some(entry) = entries.first() {
        breakdown.add("watchlist_active_entry", config.watchlist.active_entry);
        breakdown.note("_watchlist_source", entry.source_list.clone());
    }
    Ok(())
}

/// One-shot additions from linked spoofing anomalies, capped so the pathway
/// cannot double count.
fn apply_linked_anomalies(
    store: &FleetStore,
    gap: &AisGapEvent,
    config: &RiskScoringConfig,
    breakdown: &mut Breakdown,
) -> StoreResult<()> {
    let window = Duration::hours(ANOMALY_LINK_WINDOW_H);
    let anomalies = store.anomalies_for_vessel(gap.vessel_id)?;
    let linked: i64 = anomalies
        .iter()
        .filter(|a| {
            a.gap_event_id == Some(gap.gap_event_id)
                || (a.gap_event_id.is_none()
                    && a.start_time_utc >= gap.gap_start_utc - window
                    && a.start_time_utc <= gap.gap_end_utc + window)
        })
        .map(|a| a.risk_score_component)
        .sum();
    if linked > 0 {
        breakdown.add(
            "spoofing_linked_anomalies",
            linked.min(config.spoofing.linked_anomaly_cap),
        );
    }
    Ok(())
}

/// STS pathway: a linked transfer event and/or a gap inside an STS-tagged
/// corridor, capped as one pathway.
fn apply_sts_pathway(
    store: &FleetStore,
    gap: &AisGapEvent,
    config: &RiskScoringConfig,
    breakdown: &mut Breakdown,
) -> StoreResult<()> {
    let window = Duration::hours(ANOMALY_LINK_WINDOW_H);
    let mut pathway = 0i64;

    let sts_events = store.sts_events_for_vessel_between(
        gap.vessel_id,
        gap.gap_start_utc - window,
        gap.gap_end_utc + window,
    )?;
    let mut linked_sts = false;
    if !sts_events.is_empty() {
        pathway += config.sts.linked_event;
        linked_sts = true;
    }

    let in_sts_corridor = match gap.corridor_id {
        Some(corridor_id) => store
            .corridor(corridor_id)
            .is_ok_and(|c| c.corridor_type == CorridorType::StsZone),
        None => false,
    };
    if in_sts_corridor {
        pathway += config.sts.gap_in_sts_corridor;
    }
    if pathway > 0 {
        let key = if linked_sts {
            "sts_event_linked"
        } else {
            "gap_in_sts_tagged_corridor"
        };
        breakdown.add(key, pathway.min(config.sts.max_points));
    }

    // Loitering bracketing the gap (loiter-dark-loiter) is its own pathway.
    let loiter: i64 = store
        .loitering_for_vessel(gap.vessel_id)?
        .iter()
        .filter(|e| {
            e.preceding_gap_id == Some(gap.gap_event_id)
                || e.following_gap_id == Some(gap.gap_event_id)
        })
        .map(|e| e.risk_score_component)
        .sum();
    if loiter > 0 {
        breakdown.add("loiter_gap_pattern", loiter.min(LOITER_PATHWAY_CAP));
    }
    Ok(())
}

/// STS counterpart on a sanctions list.
fn apply_sanctions_network(
    store: &FleetStore,
    gap: &AisGapEvent,
    config: &RiskScoringConfig,
    breakdown: &mut Breakdown,
) -> StoreResult<()> {
    let window = Duration::hours(ANOMALY_LINK_WINDOW_H);
    let sts_events = store.sts_events_for_vessel_between(
        gap.vessel_id,
        gap.gap_start_utc - window,
        gap.gap_end_utc + window,
    )?;
    for event in sts_events {
        let Some(partner) = event.counterpart(gap.vessel_id) else {
            continue;
        };
        let listed = store
            .active_watchlist_for_vessel(partner)?
            .iter()
            .any(|w| matches!(w.source_list.as_str(), "OFAC" | "EU" | "KSE"));
        if listed {
            breakdown.add(
                "watchlist_sts_association",
                config.watchlist.sanctions_sts_association,
            );
            return Ok(());
        }
    }
    Ok(())
}

/// Dark-zone identity-swap check: a merged-in identity last seen at the
/// same position as this gap's start suggests a swap under jamming cover.
/// Any lookup failure falls back to `same_position = false` — never
/// elevated on failed evidence.
fn apply_identity_swap_check(
    store: &FleetStore,
    gap: &AisGapEvent,
    vessel: &Vessel,
    config: &RiskScoringConfig,
    breakdown: &mut Breakdown,
) {
    if !gap.in_dark_zone {
        return;
    }
    let same_position = check_absorbed_identity_position(store, gap, vessel).unwrap_or_else(|e| {
        tracing::warn!(error = %e, "MMSI position check failed - defaulting same_position=false");
        breakdown.note("_identity_position_check", "failed_default_false");
        false
    });
    if same_position {
        breakdown.add("identity_swap_dark_zone", config.spoofing.identity_swap_dark_zone);
    }
}

fn check_absorbed_identity_position(
    store: &FleetStore,
    gap: &AisGapEvent,
    vessel: &Vessel,
) -> StoreResult<bool> {
    let (Some(off_lat), Some(off_lon)) = (gap.gap_off_lat, gap.gap_off_lon) else {
        return Ok(false);
    };
    for op in store.all_merge_operations()? {
        if op.canonical_vessel_id != vessel.vessel_id || op.reversed_at.is_some() {
            continue;
        }
        let absorbed = store.vessel(op.absorbed_vessel_id)?;
        let Some(last_seen) = absorbed.last_ais_received_utc else {
            continue;
        };
        if last_seen > gap.gap_end_utc {
            continue;
        }
        if let Some(point) = store.last_point_before(vessel.vessel_id, gap.gap_start_utc)? {
            if crate::geo::haversine_nm(point.lat, point.lon, off_lat, off_lon)
                <= SAME_POSITION_NM
            {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Negative signals: a clean recent history and verified EU trade reduce
/// the score.
fn apply_legitimacy(
    store: &FleetStore,
    gap: &AisGapEvent,
    vessel: &Vessel,
    config: &RiskScoringConfig,
    breakdown: &mut Breakdown,
) -> StoreResult<()> {
    let clean_window = Duration::days(config.legitimacy.clean_history_days);
    let prior_gaps = store
        .gap_events_for_vessel(gap.vessel_id)?
        .into_iter()
        .filter(|g| g.gap_event_id != gap.gap_event_id && g.gap_end_utc <= gap.gap_start_utc)
        .any(|g| g.gap_end_utc >= gap.gap_start_utc - clean_window);
    let track_old_enough = store
        .first_point(gap.vessel_id)?
        .is_some_and(|p| p.timestamp_utc <= gap.gap_start_utc - clean_window);
    if !prior_gaps && track_old_enough {
        breakdown.add(
            "legitimacy_clean_history",
            config.legitimacy.clean_history_deduction,
        );
    }

    let since = gap.gap_start_utc - Duration::days(config.behavioral.voyage_window_days);
    let eu_call = store
        .port_calls_for_vessel_since(gap.vessel_id, since)?
        .iter()
        .any(|call| {
            call.departure_utc.is_some()
                && call.port_id.is_some_and(|port_id| {
                    store.port(port_id).is_ok_and(|p| {
                        p.country
                            .as_deref()
                            .is_some_and(|c| EU_COUNTRIES.contains(&c))
                    })
                })
        });
    if eu_call {
        breakdown.add(
            "legitimacy_eu_port_call",
            config.legitimacy.verified_eu_port_call_deduction,
        );
    }

    if vessel.pi_coverage_status == PiStatus::Active
        && crate::detect::spoofing::is_ig_club(vessel.pi_club_name.as_deref())
    {
        breakdown.add("legitimacy_ig_pi_club", config.pi_insurance.ig_club_deduction);
    }
    Ok(())
}
