//! Identity-resolution, watchlist, audit, and pipeline bookkeeping entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::MergeCandidateStatus;
use super::vessel::VesselId;

// ============================================================================
// Watchlist
// ============================================================================

/// Sanctions / analyst watchlist entry. Soft-deleted via `is_active`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VesselWatchlist {
    pub watchlist_id: u64,
    pub vessel_id: VesselId,
    /// Originating list: "OFAC", "EU", "KSE", "analyst", ...
    pub source_list: String,
    pub reason: Option<String>,
    pub added_at_utc: DateTime<Utc>,
    pub is_active: bool,
}

// ============================================================================
// Merge candidates and operations
// ============================================================================

/// A suspected same-hull pair across MMSI changes.
///
/// Unique on `(vessel_a_id, vessel_b_id)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergeCandidate {
    pub candidate_id: u64,
    /// Identity whose track ends first.
    pub vessel_a_id: VesselId,
    /// Identity whose track begins after.
    pub vessel_b_id: VesselId,
    pub vessel_a_last_lat: Option<f64>,
    pub vessel_a_last_lon: Option<f64>,
    pub vessel_a_last_time: Option<DateTime<Utc>>,
    pub vessel_b_first_lat: Option<f64>,
    pub vessel_b_first_lon: Option<f64>,
    pub vessel_b_first_time: Option<DateTime<Utc>>,
    pub distance_nm: Option<f64>,
    pub time_delta_hours: Option<f64>,
    pub confidence_score: i64,
    /// Which anchors matched and their contributions.
    pub match_reasons_json: serde_json::Value,
    pub status: MergeCandidateStatus,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub resolved_by: Option<String>,
}

/// Executed merge with a snapshot sufficient to reverse it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MergeOperation {
    pub merge_op_id: u64,
    pub canonical_vessel_id: VesselId,
    pub absorbed_vessel_id: VesselId,
    pub candidate_id: Option<u64>,
    pub executed_at: DateTime<Utc>,
    pub executed_by: String,
    /// Per-entity lists of record ids whose FKs were rewritten.
    pub affected_records_json: serde_json::Value,
    pub reversed_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Fleet alerts
// ============================================================================

/// Cluster-level fleet pattern alert, deduplicated on
/// `(owner_cluster_id, alert_type)` (or on the sorted vessel-id set for
/// clusterless alerts like STS relay chains).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FleetAlert {
    pub alert_id: u64,
    pub owner_cluster_id: Option<u64>,
    pub alert_type: String,
    pub vessel_ids: Vec<VesselId>,
    pub evidence_json: serde_json::Value,
    pub risk_score_component: i64,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Audit log
// ============================================================================

/// Actor/action/entity record for every mutation of alerts, corridors,
/// watchlist, merges, and ingest. Best-effort: writing an audit row never
/// blocks the primary action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditLog {
    pub audit_id: u64,
    pub actor: String,
    pub action: String,
    pub entity_type: String,
    pub entity_id: u64,
    pub detail: Option<String>,
    pub at_utc: DateTime<Utc>,
}

// ============================================================================
// Verification log
// ============================================================================

/// One paid-verification attempt, including budget refusals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerificationLog {
    pub log_id: u64,
    pub vessel_id: VesselId,
    pub provider: String,
    /// "success" | "error" | "budget_exceeded".
    pub response_status: String,
    pub cost_usd: f64,
    pub result_summary: Option<String>,
    pub request_time_utc: DateTime<Utc>,
}

// ============================================================================
// CREA voyages
// ============================================================================

/// Imported CREA voyage row (Russian fossil-fuel shipment tracking).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreaVoyage {
    pub voyage_id: u64,
    pub imo: Option<String>,
    pub vessel_name: Option<String>,
    pub origin_port: Option<String>,
    pub destination_port: Option<String>,
    pub departure_utc: Option<DateTime<Utc>>,
    pub arrival_utc: Option<DateTime<Utc>>,
    pub commodity: Option<String>,
    pub value_usd: Option<f64>,
}

// ============================================================================
// Pipeline runs
// ============================================================================

/// Persisted discovery-pipeline run with per-step results.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineRun {
    pub run_id: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// "ok" | "partial" | "failed".
    pub run_status: String,
    /// Step name → `{status, counts...}`.
    pub step_results_json: serde_json::Value,
}
