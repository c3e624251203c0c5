//! Feed-outage detection and corridor gap-rate baselines.
//!
//! When a terrestrial receiver goes offline, every vessel in range loses
//! coverage at once, producing a burst of gaps that looks like coordinated
//! darkness. Clusters of unscored gaps per (corridor, 2 h window) above the
//! adaptive threshold (3 × the corridor's P95 baseline, floor 5 unrelated
//! vessels) are marked `is_feed_outage` and skipped by scoring, with two
//! guards:
//!   E2: a gap whose vessel shows spoofing or STS activity within ±6 h is
//!       never suppressed (suspected cover-using behavior).
//!   E7: a cluster with > 30% previously-high-risk vessels is not
//!       suppressed (coordinated decoy abuse).

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::config;
use crate::geo::parse_wkt_bbox;
use crate::store::{FleetStore, StoreResult};
use crate::types::{AisGapEvent, CorridorGapBaseline, CorridorId, CoverageQuality, VesselId};
use crate::util::percentile_linear;

/// Gaps within this window are grouped for outage detection, hours.
const WINDOW_HOURS: u32 = 2;
/// Multiplier applied to the P95 baseline for the adaptive threshold.
const P95_MULTIPLIER: f64 = 3.0;
/// Fallback vessel count when no baseline exists.
const FALLBACK_VESSEL_COUNT: usize = 5;
/// Minimum vessels for outage classification.
const MIN_VESSELS_FOR_OUTAGE: usize = 5;
/// Window for evasion-signal checks around a gap, hours (E2).
const EVASION_CHECK_HOURS: i64 = 6;
/// Maximum fraction of high-risk vessels in a suppressible cluster (E7).
const MAX_HIGH_RISK_RATIO: f64 = 0.3;
/// Rolling baseline window, days.
const BASELINE_WINDOW_DAYS: i64 = 7;
/// Windows needed before mean/P95 are meaningful.
const MIN_WINDOWS_FOR_STATS: usize = 2;

/// Feed-outage step summary.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct FeedOutageReport {
    pub gaps_checked: usize,
    pub outages_detected: usize,
    pub gaps_marked: usize,
    pub evasion_excluded: usize,
    pub decoy_rejected: usize,
}

/// Baseline maintenance step summary.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct BaselineReport {
    pub corridors_processed: usize,
    pub baselines_created: usize,
}

// ============================================================================
// Feed outage detection
// ============================================================================

pub fn detect_feed_outages(store: &FleetStore) -> StoreResult<FeedOutageReport> {
    if !config::get().settings.feed_outage_detection_enabled {
        tracing::debug!("feed outage detection disabled - skipping");
        return Ok(FeedOutageReport::default());
    }

    let mut report = FeedOutageReport::default();
    let gaps = store.unscored_gap_events()?;
    report.gaps_checked = gaps.len();
    if gaps.is_empty() {
        return Ok(report);
    }

    let clusters = cluster_gaps(&gaps);
    let high_risk = high_risk_vessel_ids(store)?;

    for ((corridor_id, window_start), cluster) in clusters {
        let vessels: HashSet<VesselId> = cluster.iter().map(|g| g.vessel_id).collect();
        if vessels.len() < MIN_VESSELS_FOR_OUTAGE {
            continue;
        }

        let threshold = adaptive_threshold(store, corridor_id, window_start)?;
        if vessels.len() < threshold {
            continue;
        }

        // E7: too many previously-high-risk vessels looks like a
        // coordinated decoy, not an outage.
        let high_risk_count = vessels.iter().filter(|v| high_risk.contains(v)).count();
        if high_risk_count as f64 / vessels.len() as f64 > MAX_HIGH_RISK_RATIO {
            report.decoy_rejected += 1;
            tracing::info!(
                ?corridor_id,
                %window_start,
                high_risk_count,
                vessel_count = vessels.len(),
                "feed outage cluster rejected (decoy abuse guard)"
            );
            continue;
        }

        report.outages_detected += 1;
        for gap in cluster {
            // E2: keep scoring gaps whose vessel shows evasion activity.
            if has_evasion_signals(store, gap)? {
                report.evasion_excluded += 1;
                continue;
            }
            let mut marked = gap.clone();
            marked.is_feed_outage = true;
            store.update_gap_event(&marked)?;
            report.gaps_marked += 1;
        }
    }

    tracing::info!(
        checked = report.gaps_checked,
        outages = report.outages_detected,
        marked = report.gaps_marked,
        evasion_excluded = report.evasion_excluded,
        decoy_rejected = report.decoy_rejected,
        "feed outage detection complete"
    );
    Ok(report)
}

type ClusterKey = (Option<CorridorId>, DateTime<Utc>);

fn cluster_gaps(gaps: &[AisGapEvent]) -> HashMap<ClusterKey, Vec<&AisGapEvent>> {
    let window_secs = i64::from(WINDOW_HOURS) * 3600;
    let mut buckets: HashMap<ClusterKey, Vec<&AisGapEvent>> = HashMap::new();
    for gap in gaps {
        let secs = gap.gap_start_utc.timestamp();
        let floored = secs - secs.rem_euclid(window_secs);
        let window_start = Utc
            .timestamp_opt(floored, 0)
            .single()
            .unwrap_or(gap.gap_start_utc);
        buckets
            .entry((gap.corridor_id, window_start))
            .or_default()
            .push(gap);
    }
    buckets
}

/// Vessels scored above 50 in any previous run (E7 input).
fn high_risk_vessel_ids(store: &FleetStore) -> StoreResult<HashSet<VesselId>> {
    Ok(store
        .all_gap_events()?
        .iter()
        .filter(|g| g.risk_score > 50)
        .map(|g| g.vessel_id)
        .collect())
}

/// `3 × corridor P95` with a floor of 3 when a baseline exists; the global
/// fallback count otherwise.
fn adaptive_threshold(
    store: &FleetStore,
    corridor_id: Option<CorridorId>,
    reference: DateTime<Utc>,
) -> StoreResult<usize> {
    let Some(corridor_id) = corridor_id else {
        return Ok(FALLBACK_VESSEL_COUNT);
    };
    match store.baseline_at(corridor_id, reference)? {
        Some(baseline) => match baseline.p95_threshold {
            Some(p95) => Ok(((p95 * P95_MULTIPLIER) as usize).max(3)),
            None => Ok(FALLBACK_VESSEL_COUNT),
        },
        None => Ok(FALLBACK_VESSEL_COUNT),
    }
}

fn has_evasion_signals(store: &FleetStore, gap: &AisGapEvent) -> StoreResult<bool> {
    let window = Duration::hours(EVASION_CHECK_HOURS);
    let lo = gap.gap_start_utc - window;
    let hi = gap.gap_end_utc + window;

    if !store
        .anomalies_for_vessel_between(gap.vessel_id, lo, hi)?
        .is_empty()
    {
        return Ok(true);
    }
    if !store
        .sts_events_for_vessel_between(gap.vessel_id, lo, hi)?
        .is_empty()
    {
        return Ok(true);
    }
    Ok(false)
}

// ============================================================================
// Corridor gap-rate baselines
// ============================================================================

/// Walk all gaps into rolling 7-day windows per corridor and store
/// mean / P95 counts. Recomputation replaces prior baselines.
pub fn compute_gap_rate_baseline(store: &FleetStore) -> StoreResult<BaselineReport> {
    if !config::get().settings.dark_sts_detection_enabled {
        tracing::debug!("gap rate baseline disabled - skipping");
        return Ok(BaselineReport::default());
    }

    let mut report = BaselineReport::default();
    let corridors = store.all_corridors()?;
    let all_gaps = store.all_gap_events()?;
    if all_gaps.is_empty() {
        return Ok(report);
    }

    let min_time = all_gaps
        .iter()
        .map(|g| g.gap_start_utc)
        .min()
        .unwrap_or_default();
    let max_time = all_gaps
        .iter()
        .map(|g| g.gap_end_utc)
        .max()
        .unwrap_or_default();

    for corridor in corridors {
        let Some(bbox) = parse_wkt_bbox(&corridor.geometry) else {
            continue;
        };

        let corridor_gaps: Vec<&AisGapEvent> = all_gaps
            .iter()
            .filter(|gap| {
                gap.corridor_id == Some(corridor.corridor_id)
                    || gap
                        .gap_off_lat
                        .zip(gap.gap_off_lon)
                        .is_some_and(|(lat, lon)| bbox.contains(lat, lon, 0.0))
                    || gap
                        .gap_on_lat
                        .zip(gap.gap_on_lon)
                        .is_some_and(|(lat, lon)| bbox.contains(lat, lon, 0.0))
            })
            .collect();
        if corridor_gaps.is_empty() {
            continue;
        }
        report.corridors_processed += 1;
        store.clear_baselines_for_corridor(corridor.corridor_id)?;

        let mut window_counts: Vec<(DateTime<Utc>, DateTime<Utc>, u32)> = Vec::new();
        let mut window_start = min_time;
        while window_start < max_time {
            let window_end = window_start + Duration::days(BASELINE_WINDOW_DAYS);
            let count = corridor_gaps
                .iter()
                .filter(|g| g.gap_start_utc < window_end && g.gap_end_utc > window_start)
                .count() as u32;
            window_counts.push((window_start, window_end, count));
            window_start = window_end;
        }

        let counts: Vec<f64> = window_counts.iter().map(|(_, _, c)| f64::from(*c)).collect();
        let (mean, p95) = if counts.len() >= MIN_WINDOWS_FOR_STATS {
            (
                Some(counts.iter().sum::<f64>() / counts.len() as f64),
                Some(percentile_linear(&counts, 95.0)),
            )
        } else {
            (None, None)
        };

        for (start, end, count) in window_counts {
            store.insert_baseline(&CorridorGapBaseline {
                baseline_id: store.next_id()?,
                corridor_id: corridor.corridor_id,
                window_start: start,
                window_end: end,
                gap_count: count,
                mean_gap_count: mean,
                p95_threshold: p95,
            })?;
            report.baselines_created += 1;
        }
    }

    tracing::info!(
        corridors = report.corridors_processed,
        baselines = report.baselines_created,
        "gap rate baseline complete"
    );
    Ok(report)
}

// ============================================================================
// Coverage quality tagging
// ============================================================================

/// Fill `coverage_quality` on untagged unscored gaps from corridor-name
/// keywords. Metadata only — never an input to scoring.
pub fn tag_coverage_quality(store: &FleetStore) -> StoreResult<usize> {
    if !config::get().settings.coverage_quality_tagging_enabled {
        tracing::debug!("coverage quality tagging disabled - skipping");
        return Ok(0);
    }

    let gaps: Vec<AisGapEvent> = store
        .all_gap_events()?
        .into_iter()
        .filter(|g| g.risk_score == 0 && g.coverage_quality.is_none())
        .collect();

    let mut tagged = 0usize;
    for gap in gaps {
        let quality = match gap.corridor_id {
            Some(corridor_id) => match store.corridor(corridor_id) {
                Ok(corridor) => quality_for_corridor(&corridor.name, corridor.is_jamming_zone),
                Err(_) => CoverageQuality::Unknown,
            },
            None => CoverageQuality::Unknown,
        };
        let mut updated = gap;
        updated.coverage_quality = Some(quality);
        store.update_gap_event(&updated)?;
        tagged += 1;
    }

    if tagged > 0 {
        tracing::info!(tagged, "coverage quality tagging complete");
    }
    Ok(tagged)
}

fn quality_for_corridor(name: &str, is_jamming_zone: bool) -> CoverageQuality {
    let lower = name.to_ascii_lowercase();
    if is_jamming_zone || lower.contains("kerch") || lower.contains("crimea") {
        return CoverageQuality::Poor;
    }
    if lower.contains("baltic") || lower.contains("north sea") || lower.contains("danish") {
        return CoverageQuality::Good;
    }
    if lower.contains("black sea") || lower.contains("aegean") || lower.contains("laconian") {
        return CoverageQuality::Moderate;
    }
    if lower.contains("barents") || lower.contains("murmansk") {
        return CoverageQuality::Partial;
    }
    CoverageQuality::Moderate
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AlertStatus, Corridor, CorridorType, SpoofingAnomaly, SpoofingType, Vessel};

    fn gap(id: u64, vessel: u64, corridor: Option<u64>, start: DateTime<Utc>) -> AisGapEvent {
        AisGapEvent {
            gap_event_id: id,
            vessel_id: vessel,
            gap_start_utc: start,
            gap_end_utc: start + Duration::hours(6),
            duration_minutes: 360,
            corridor_id: corridor,
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
            gap_off_lat: Some(57.0),
            gap_off_lon: Some(25.0),
            gap_on_lat: Some(57.1),
            gap_on_lon: Some(25.1),
            source: "local".into(),
            original_vessel_id: vessel,
            is_feed_outage: false,
            coverage_quality: None,
        }
    }

    fn seed_vessels(store: &FleetStore, count: u64) {
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        for id in 1..=count {
            store
                .insert_vessel(&Vessel::new(id, format!("63601{id:04}"), ts))
                .unwrap();
        }
    }

    fn seed_baseline(store: &FleetStore, corridor_id: u64, p95: f64) {
        store
            .insert_baseline(&CorridorGapBaseline {
                baseline_id: 999,
                corridor_id,
                window_start: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
                window_end: Utc.with_ymd_and_hms(2025, 6, 30, 0, 0, 0).unwrap(),
                gap_count: 2,
                mean_gap_count: Some(1.5),
                p95_threshold: Some(p95),
            })
            .unwrap();
    }

    #[test]
    fn test_broad_outage_suppressed() {
        let store = FleetStore::temporary().unwrap();
        seed_vessels(&store, 8);
        seed_baseline(&store, 1, 2.0); // threshold = 3×2 = 6
        let base = Utc.with_ymd_and_hms(2025, 6, 10, 8, 10, 0).unwrap();
        for v in 1..=8u64 {
            store
                .insert_gap_event(&gap(v, v, Some(1), base + Duration::minutes(v as i64 * 5)))
                .unwrap();
        }

        let report = detect_feed_outages(&store).unwrap();
        assert_eq!(report.outages_detected, 1);
        assert_eq!(report.gaps_marked, 8);
        for id in 1..=8u64 {
            assert!(store.gap_event(id).unwrap().is_feed_outage);
        }
        // And scoring skips every one of them.
        let scoring = crate::scoring::score_all_alerts(&store);
        assert_eq!(scoring.scored, 0);
    }

    #[test]
    fn test_small_cluster_not_suppressed() {
        let store = FleetStore::temporary().unwrap();
        seed_vessels(&store, 3);
        let base = Utc.with_ymd_and_hms(2025, 6, 10, 8, 10, 0).unwrap();
        for v in 1..=3u64 {
            store.insert_gap_event(&gap(v, v, Some(1), base)).unwrap();
        }
        let report = detect_feed_outages(&store).unwrap();
        assert_eq!(report.outages_detected, 0);
        assert_eq!(report.gaps_marked, 0);
    }

    #[test]
    fn test_evasion_vessel_excluded_from_suppression() {
        let store = FleetStore::temporary().unwrap();
        seed_vessels(&store, 8);
        seed_baseline(&store, 1, 2.0);
        let base = Utc.with_ymd_and_hms(2025, 6, 10, 8, 10, 0).unwrap();
        for v in 1..=8u64 {
            store.insert_gap_event(&gap(v, v, Some(1), base)).unwrap();
        }
        // Vessel 3 has a spoofing anomaly in the window: cover-using.
        store
            .insert_anomaly(&SpoofingAnomaly {
                anomaly_id: 100,
                vessel_id: 3,
                anomaly_type: SpoofingType::FakePortCall,
                start_time_utc: base + Duration::hours(1),
                end_time_utc: None,
                implied_speed_kn: None,
                plausibility_score: None,
                risk_score_component: 40,
                evidence_json: serde_json::json!({}),
                gap_event_id: None,
            })
            .unwrap();

        let report = detect_feed_outages(&store).unwrap();
        assert_eq!(report.gaps_marked, 7);
        assert_eq!(report.evasion_excluded, 1);
        assert!(!store.gap_event(3).unwrap().is_feed_outage);
    }

    #[test]
    fn test_decoy_cluster_rejected() {
        let store = FleetStore::temporary().unwrap();
        seed_vessels(&store, 8);
        seed_baseline(&store, 1, 2.0);
        let base = Utc.with_ymd_and_hms(2025, 6, 10, 8, 10, 0).unwrap();
        // 4 of 8 vessels carry prior high-risk scores (50%).
        for v in 1..=4u64 {
            let mut scored = gap(100 + v, v, Some(1), base - Duration::days(10));
            scored.risk_score = 80;
            store.insert_gap_event(&scored).unwrap();
        }
        for v in 1..=8u64 {
            store.insert_gap_event(&gap(v, v, Some(1), base)).unwrap();
        }

        let report = detect_feed_outages(&store).unwrap();
        assert_eq!(report.decoy_rejected, 1);
        assert_eq!(report.gaps_marked, 0);
    }

    #[test]
    fn test_baseline_computation() {
        let store = FleetStore::temporary().unwrap();
        seed_vessels(&store, 2);
        store
            .insert_corridor(&Corridor {
                corridor_id: 1,
                name: "Baltic Export Corridor".into(),
                corridor_type: CorridorType::ExportRoute,
                geometry: "POLYGON((20.0 54.0, 30.0 54.0, 30.0 60.0, 20.0 60.0, 20.0 54.0))"
                    .into(),
                risk_weight: 1.5,
                is_jamming_zone: false,
            })
            .unwrap();
        // Gaps spread over 3 weeks.
        let base = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        for (id, day) in [(1u64, 0i64), (2, 2), (3, 8), (4, 16)] {
            store
                .insert_gap_event(&gap(id, 1, Some(1), base + Duration::days(day)))
                .unwrap();
        }

        let report = compute_gap_rate_baseline(&store).unwrap();
        assert_eq!(report.corridors_processed, 1);
        assert!(report.baselines_created >= 3);
        let baselines = store.baselines_for_corridor(1).unwrap();
        assert!(baselines.iter().all(|b| b.p95_threshold.is_some()));
        // Recomputation replaces rather than accumulates.
        let report2 = compute_gap_rate_baseline(&store).unwrap();
        assert_eq!(report2.baselines_created, report.baselines_created);
        assert_eq!(
            store.baselines_for_corridor(1).unwrap().len(),
            report.baselines_created
        );
    }

    #[test]
    fn test_coverage_quality_tagging_is_metadata_only() {
        let store = FleetStore::temporary().unwrap();
        seed_vessels(&store, 1);
        store
            .insert_corridor(&Corridor {
                corridor_id: 1,
                name: "Baltic Export Corridor".into(),
                corridor_type: CorridorType::ExportRoute,
                geometry: "POLYGON((20.0 54.0, 30.0 54.0, 30.0 60.0, 20.0 60.0, 20.0 54.0))"
                    .into(),
                risk_weight: 1.5,
                is_jamming_zone: false,
            })
            .unwrap();
        let base = Utc.with_ymd_and_hms(2025, 6, 10, 8, 0, 0).unwrap();
        store.insert_gap_event(&gap(1, 1, Some(1), base)).unwrap();

        let tagged = tag_coverage_quality(&store).unwrap();
        assert_eq!(tagged, 1);
        let updated = store.gap_event(1).unwrap();
        assert_eq!(updated.coverage_quality, Some(CoverageQuality::Good));
        // Score unchanged by tagging.
        assert_eq!(updated.risk_score, 0);
    }
}
