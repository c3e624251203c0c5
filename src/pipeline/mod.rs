//! Discovery pipeline orchestrator.
//!
//! An ordered step graph with HARD/SOFT failure semantics: a HARD step
//! failure aborts the run (`run_status = failed`); SOFT failures record
//! status and continue (`run_status = partial`). The store flushes between
//! steps so partial failures leave consistent state at step boundaries.
//!
//! ```text
//! fetch feeds (SOFT) → gap detection (HARD) → spoofing suite (SOFT each)
//!   → STS (SOFT) → loitering (SOFT) → port calls (SOFT)
//!   → baselines + feed-outage + coverage tagging (SOFT)
//!   → scoring (HARD) → identity resolution (SOFT)
//!   → confidence classification (SOFT) → fleet analysis (SOFT)
//!   → observation purge (SOFT)
//! ```

use chrono::Utc;
use serde_json::json;

use crate::adapters::FeedAdapter;
use crate::identity::NullFingerprintScorer;
use crate::store::FleetStore;
use crate::types::PipelineRun;

/// Step outcome status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Ok,
    Failed,
    Skipped,
}

/// One completed step.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StepResult {
    pub name: &'static str,
    pub status: StepStatus,
    pub counts: serde_json::Value,
}

/// Overall run outcome.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RunOutcome {
    pub run_id: u64,
    /// "ok" | "partial" | "failed".
    pub run_status: String,
    pub steps: Vec<StepResult>,
}

/// Failure class of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StepKind {
    Hard,
    Soft,
}

/// Run the full discovery pipeline.
///
/// `feeds` are fetched first (each SOFT); pass an empty slice to run over
/// already-ingested data only.
pub async fn run_discovery(
    store: &FleetStore,
    feeds: &[Box<dyn FeedAdapter>],
) -> RunOutcome {
    let started_at = Utc::now();
    let mut steps: Vec<StepResult> = Vec::new();
    let mut hard_failure = false;

    // SOFT: external feeds, fetched concurrently. A failing feed records
    // its status; in-progress fetches always complete.
    let fetches = feeds.iter().map(|feed| async move {
        let name = feed.name();
        match feed.fetch(store).await {
            Ok(counts) => StepResult {
                name: "fetch_feed",
                status: StepStatus::Ok,
                counts: json!({ "feed": name, "detail": counts }),
            },
            Err(e) => {
                tracing::warn!(feed = name, error = %e, "feed fetch failed (SOFT)");
                StepResult {
                    name: "fetch_feed",
                    status: StepStatus::Failed,
                    counts: json!({ "feed": name, "error": e.to_string() }),
                }
            }
        }
    });
    steps.extend(futures::future::join_all(fetches).await);
    flush_between_steps(store);

    // The detector sequence. Closures defer execution so a HARD abort stops
    // the walk.
    type StepFn<'a> = Box<dyn FnOnce() -> (StepStatus, serde_json::Value) + 'a>;
    let sequence: Vec<(&'static str, StepKind, StepFn<'_>)> = vec![
        (
            "gap_detection",
            StepKind::Hard,
            Box::new(|| {
                let report = crate::detect::detect_gaps(store);
                let status = if report.errors > 0 && report.gaps_created == 0 {
                    StepStatus::Failed
                } else {
                    StepStatus::Ok
                };
                (status, json!(report))
            }),
        ),
        (
            "mmsi_cloning",
            StepKind::Soft,
            Box::new(|| spoofing_step(crate::detect::detect_mmsi_cloning(store))),
        ),
        (
            "stateless_mmsi",
            StepKind::Soft,
            Box::new(|| spoofing_step(crate::detect::detect_stateless_mmsi(store))),
        ),
        (
            "flag_hopping",
            StepKind::Soft,
            Box::new(|| spoofing_step(crate::detect::detect_flag_hopping(store))),
        ),
        (
            "imo_fraud",
            StepKind::Soft,
            Box::new(|| spoofing_step(crate::detect::detect_imo_fraud(store))),
        ),
        (
            "fake_positions",
            StepKind::Soft,
            Box::new(|| spoofing_step(crate::detect::detect_fake_positions(store))),
        ),
        (
            "sparse_transmission",
            StepKind::Soft,
            Box::new(|| spoofing_step(crate::detect::detect_sparse_transmission(store))),
        ),
        (
            "type_dwt_mismatch",
            StepKind::Soft,
            Box::new(|| spoofing_step(crate::detect::detect_type_dwt_mismatch(store))),
        ),
        (
            "pi_cycling",
            StepKind::Soft,
            Box::new(|| spoofing_step(crate::detect::detect_pi_cycling(store))),
        ),
        (
            "route_laundering",
            StepKind::Soft,
            Box::new(|| spoofing_step(crate::detect::detect_route_laundering(store))),
        ),
        (
            "circle_spoof",
            StepKind::Soft,
            Box::new(|| spoofing_step(crate::detect::detect_circle_spoofing(store))),
        ),
        (
            "sts_detection",
            StepKind::Soft,
            Box::new(|| {
                let report = crate::detect::detect_sts_transfers(store);
                (ok_unless_only_errors(report.errors, report.events_created), json!(report))
            }),
        ),
        (
            "sts_chains",
            StepKind::Soft,
            Box::new(|| match crate::detect::detect_sts_chains(store) {
                Ok(alerts) => (StepStatus::Ok, json!({ "alerts_created": alerts })),
                Err(e) => (StepStatus::Failed, json!({ "error": e.to_string() })),
            }),
        ),
        (
            "loitering",
            StepKind::Soft,
            Box::new(|| {
                let report = crate::detect::detect_loitering(store);
                (ok_unless_only_errors(report.errors, report.events_created), json!(report))
            }),
        ),
        (
            "port_calls",
            StepKind::Soft,
            Box::new(|| {
                let report = crate::detect::detect_port_calls(store);
                (
                    ok_unless_only_errors(report.errors, report.port_calls_detected),
                    json!(report),
                )
            }),
        ),
        (
            "gap_rate_baseline",
            StepKind::Soft,
            Box::new(|| match crate::outage::compute_gap_rate_baseline(store) {
                Ok(report) => (StepStatus::Ok, json!(report)),
                Err(e) => (StepStatus::Failed, json!({ "error": e.to_string() })),
            }),
        ),
        (
            "feed_outage_detection",
            StepKind::Soft,
            Box::new(|| match crate::outage::detect_feed_outages(store) {
                Ok(report) => (StepStatus::Ok, json!(report)),
                Err(e) => (StepStatus::Failed, json!({ "error": e.to_string() })),
            }),
        ),
        (
            "coverage_quality_tagging",
            StepKind::Soft,
            Box::new(|| match crate::outage::tag_coverage_quality(store) {
                Ok(tagged) => (StepStatus::Ok, json!({ "gaps_tagged": tagged })),
                Err(e) => (StepStatus::Failed, json!({ "error": e.to_string() })),
            }),
        ),
        (
            "risk_scoring",
            StepKind::Hard,
            Box::new(|| {
                let report = crate::scoring::score_all_alerts(store);
                let status = if report.errors > 0 && report.scored == 0 {
                    StepStatus::Failed
                } else {
                    StepStatus::Ok
                };
                (status, json!(report))
            }),
        ),
        (
            "identity_resolution",
            StepKind::Soft,
            Box::new(|| {
                let report =
                    crate::identity::discover_merge_candidates(store, &NullFingerprintScorer);
                (
                    ok_unless_only_errors(report.errors, report.candidates_created),
                    json!(report),
                )
            }),
        ),
        (
            "confidence_classification",
            StepKind::Soft,
            Box::new(|| {
                let report = crate::confidence::classify_all_vessels(store);
                (ok_unless_only_errors(report.errors, report.classified), json!(report))
            }),
        ),
        (
            "fleet_analysis",
            StepKind::Soft,
            Box::new(|| {
                let report = crate::fleet::analyze_fleets(store);
                (ok_unless_only_errors(report.errors, report.clusters), json!(report))
            }),
        ),
        (
            "observation_purge",
            StepKind::Soft,
            Box::new(|| match store.purge_stale_observations(Utc::now()) {
                Ok(purged) => (StepStatus::Ok, json!({ "purged": purged })),
                Err(e) => (StepStatus::Failed, json!({ "error": e.to_string() })),
            }),
        ),
    ];

    for (name, kind, step) in sequence {
        let (status, counts) = step();
        let failed = status == StepStatus::Failed;
        steps.push(StepResult {
            name,
            status,
            counts,
        });
        flush_between_steps(store);

        if failed && kind == StepKind::Hard {
            tracing::error!(step = name, "HARD step failed - aborting run");
            hard_failure = true;
            break;
        }
        if failed {
            tracing::warn!(step = name, "SOFT step failed - continuing");
        }
    }

    let any_failed = steps.iter().any(|s| s.status == StepStatus::Failed);
    let run_status = if hard_failure {
        "failed"
    } else if any_failed {
        "partial"
    } else {
        "ok"
    };

    let run_id = store.next_id().unwrap_or(0);
    let run = PipelineRun {
        run_id,
        started_at,
        finished_at: Some(Utc::now()),
        run_status: run_status.to_string(),
        step_results_json: json!(steps),
    };
    if let Err(e) = store.insert_pipeline_run(&run) {
        tracing::warn!(error = %e, "failed to persist pipeline run");
    }
    store.audit("pipeline", "run", "pipeline_run", run_id);

    tracing::info!(run_id, run_status, steps = steps.len(), "discovery pipeline finished");
    RunOutcome {
        run_id,
        run_status: run_status.to_string(),
        steps,
    }
}

fn spoofing_step(report: crate::detect::SpoofingRunReport) -> (StepStatus, serde_json::Value) {
    let status = if report.status == "disabled" {
        StepStatus::Skipped
    } else {
        ok_unless_only_errors(report.errors, report.anomalies_created + report.vessels_checked)
    };
    (status, json!(report))
}

/// A step that produced nothing but errors failed; partial progress is Ok.
fn ok_unless_only_errors(errors: usize, produced: usize) -> StepStatus {
    if errors > 0 && produced == 0 {
        StepStatus::Failed
    } else {
        StepStatus::Ok
    }
}

fn flush_between_steps(store: &FleetStore) {
    if let Err(e) = store.flush() {
        tracing::warn!(error = %e, "store flush between steps failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AisClass, AisPoint, Vessel};
    use chrono::{Duration, TimeZone};

    fn seed_track(store: &FleetStore) {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let mut vessel = Vessel::new(1, "636017000", start);
        vessel.deadweight = Some(308_000.0);
        vessel.year_built = Some(2001);
        store.insert_vessel(&vessel).unwrap();
        for (h, lat, lon) in [(0i64, 56.0, 19.0), (16, 56.5, 20.0), (42, 57.0, 21.0)] {
            store
                .insert_point(&AisPoint {
                    vessel_id: 1,
                    timestamp_utc: start + Duration::hours(h),
                    lat,
                    lon,
                    sog: Some(11.0),
                    cog: Some(45.0),
                    heading: None,
                    nav_status: None,
                    ais_class: AisClass::A,
                    source: "csv_import".into(),
                })
                .unwrap();
        }
    }

    #[test]
    fn test_full_pipeline_runs_clean() {
        let store = FleetStore::temporary().unwrap();
        seed_track(&store);

        let outcome = tokio_test::block_on(run_discovery(&store, &[]));
        assert_eq!(outcome.run_status, "ok");
        // Both silences became gaps and were scored.
        let gaps = store.gap_events_for_vessel(1).unwrap();
        assert_eq!(gaps.len(), 2);
        assert!(gaps.iter().all(|g| g.risk_score > 0));
        // The run was persisted with step results.
        let runs = store.all_pipeline_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].run_status, "ok");
        let steps = runs[0].step_results_json.as_array().unwrap();
        assert!(steps.iter().any(|s| s["name"] == "gap_detection"));
        assert!(steps.iter().any(|s| s["name"] == "risk_scoring"));
    }

    #[test]
    fn test_pipeline_is_rerunnable() {
        let store = FleetStore::temporary().unwrap();
        seed_track(&store);
        tokio_test::block_on(run_discovery(&store, &[]));
        let outcome = tokio_test::block_on(run_discovery(&store, &[]));
        assert_eq!(outcome.run_status, "ok");
        // No duplicate events from the second run.
        assert_eq!(store.gap_events_for_vessel(1).unwrap().len(), 2);
        assert_eq!(store.all_pipeline_runs().unwrap().len(), 2);
    }
}
