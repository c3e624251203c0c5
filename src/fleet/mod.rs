//! Fleet-level analysis: owner deduplication and cluster pattern alerts.
//!
//! Owners are normalized, bucketed by first letter (O(N²/26) comparisons),
//! fuzzy-matched with token-sort ratio, and clustered with union-find. The
//! partition is deterministic, so re-running yields identical clusters.
//! Cluster-level alerts (STS concentration, dark coordination, flag
//! diversity, high-risk average, shared manager across different owners,
//! shared P&I club) deduplicate on `(cluster_id, alert_type)`.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::Utc;
use serde_json::json;

use crate::config;
use crate::store::{FleetStore, StoreResult};
use crate::types::{Vessel, VesselId};
use crate::util::textmatch;

// ============================================================================
// Union-find
// ============================================================================

/// Disjoint-set with path compression and union by rank.
struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u32>,
}

impl UnionFind {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            self.parent[x] = self.find(self.parent[x]);
        }
        self.parent[x]
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.rank[ra] < self.rank[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        if self.rank[ra] == self.rank[rb] {
            self.rank[ra] += 1;
        }
    }
}

// ============================================================================
// Owner clustering
// ============================================================================

/// One owner cluster: vessels sharing a (fuzzy) owner identity.
#[derive(Debug, Clone)]
pub struct OwnerCluster {
    /// Deterministic id: the smallest member vessel id.
    pub cluster_id: u64,
    /// Most common raw owner-name variant.
    pub canonical_name: String,
    pub vessel_ids: Vec<VesselId>,
}

/// Cluster vessels by fuzzy owner-name similarity.
///
/// Deterministic given the store snapshot: buckets, comparisons, and
/// cluster ids are all derived from sorted vessel ids.
pub fn cluster_owners(vessels: &[Vessel], similarity_threshold: f64) -> Vec<OwnerCluster> {
    let named: Vec<(&Vessel, String)> = {
        let mut v: Vec<(&Vessel, String)> = vessels
            .iter()
            .filter_map(|vessel| {
                let owner = vessel.owner_name.as_deref()?;
                let normalized = textmatch::normalize_name(owner);
                if normalized.is_empty() {
                    None
                } else {
                    Some((vessel, normalized))
                }
            })
            .collect();
        v.sort_by_key(|(vessel, _)| vessel.vessel_id);
        v
    };
    if named.is_empty() {
        return Vec::new();
    }

    // First-letter buckets keep comparisons tractable.
    let mut buckets: BTreeMap<char, Vec<usize>> = BTreeMap::new();
    for (i, (_, normalized)) in named.iter().enumerate() {
        if let Some(first) = normalized.chars().next() {
            buckets.entry(first).or_default().push(i);
        }
    }

    let mut uf = UnionFind::new(named.len());
    for indices in buckets.values() {
        for (a_pos, &a) in indices.iter().enumerate() {
            for &b in &indices[a_pos + 1..] {
                let score = textmatch::token_sort_ratio(&named[a].1, &named[b].1);
                if score >= similarity_threshold {
                    uf.union(a, b);
                }
            }
        }
    }

    let mut grouped: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for i in 0..named.len() {
        grouped.entry(uf.find(i)).or_default().push(i);
    }

    grouped
        .into_values()
        .map(|members| {
            let mut vessel_ids: Vec<VesselId> =
                members.iter().map(|&i| named[i].0.vessel_id).collect();
            vessel_ids.sort_unstable();

            let mut name_counts: BTreeMap<&str, usize> = BTreeMap::new();
            for &i in &members {
                if let Some(owner) = named[i].0.owner_name.as_deref() {
                    *name_counts.entry(owner).or_default() += 1;
                }
            }
            let canonical_name = name_counts
                .iter()
                .max_by_key(|(_, count)| **count)
                .map(|(name, _)| (*name).to_string())
                .unwrap_or_default();

            OwnerCluster {
                cluster_id: vessel_ids[0],
                canonical_name,
                vessel_ids,
            }
        })
        .collect()
}

// ============================================================================
// Fleet alerts
// ============================================================================

/// Fleet-analysis step summary.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct FleetAnalysisReport {
    pub clusters: usize,
    pub alerts_created: usize,
    pub errors: usize,
}

pub fn analyze_fleets(store: &FleetStore) -> FleetAnalysisReport {
    let config = config::get();
    if !config.settings.fleet_analysis_enabled {
        return FleetAnalysisReport::default();
    }
    let fleet_config = &config.risk.fleet_analysis;

    let mut report = FleetAnalysisReport::default();
    let vessels = match store.active_vessels() {
        Ok(v) => v,
        Err(e) => {
            tracing::error!(error = %e, "fleet analysis could not list vessels");
            report.errors += 1;
            return report;
        }
    };

    let clusters = cluster_owners(&vessels, fleet_config.similarity_threshold);
    let by_id: HashMap<VesselId, &Vessel> =
        vessels.iter().map(|v| (v.vessel_id, v)).collect();

    for cluster in &clusters {
        if cluster.vessel_ids.len() < fleet_config.min_cluster_size {
            continue;
        }
        report.clusters += 1;
        if let Err(e) = evaluate_cluster(store, cluster, &by_id, fleet_config, &mut report) {
            tracing::warn!(cluster_id = cluster.cluster_id, error = %e, "cluster evaluation failed");
            report.errors += 1;
        }
    }

    // Shared-manager and shared-P&I patterns cut across owner clusters.
    if let Err(e) = evaluate_shared_manager(store, &vessels, fleet_config, &mut report) {
        tracing::warn!(error = %e, "shared-manager analysis failed");
        report.errors += 1;
    }
    if let Err(e) = evaluate_shared_pi_club(store, &vessels, fleet_config, &mut report) {
        tracing::warn!(error = %e, "shared-P&I analysis failed");
        report.errors += 1;
    }

    tracing::info!(
        clusters = report.clusters,
        alerts = report.alerts_created,
        "fleet analysis complete"
    );
    report
}

fn evaluate_cluster(
    store: &FleetStore,
    cluster: &OwnerCluster,
    by_id: &HashMap<VesselId, &Vessel>,
    fleet_config: &config::FleetAnalysisConfig,
    report: &mut FleetAnalysisReport,
) -> StoreResult<()> {
    let member_set: HashSet<VesselId> = cluster.vessel_ids.iter().copied().collect();

    // STS concentration: transfers between cluster members.
    let mut intra_cluster_sts = 0usize;
    for &vessel_id in &cluster.vessel_ids {
        for event in store.sts_events_for_vessel(vessel_id)? {
            if let Some(partner) = event.counterpart(vessel_id) {
                if partner > vessel_id && member_set.contains(&partner) {
                    intra_cluster_sts += 1;
                }
            }
        }
    }
    if intra_cluster_sts >= fleet_config.sts_concentration_threshold {
        emit(
            store,
            cluster,
            "sts_concentration",
            json!({ "intra_cluster_sts_events": intra_cluster_sts }),
            25,
            report,
        )?;
    }

    // Dark coordination: several members with gaps in the same 2 h window.
    let mut window_vessels: HashMap<i64, HashSet<VesselId>> = HashMap::new();
    for &vessel_id in &cluster.vessel_ids {
        for gap in store.gap_events_for_vessel(vessel_id)? {
            let bucket = gap.gap_start_utc.timestamp() / 7200;
            window_vessels.entry(bucket).or_default().insert(vessel_id);
        }
    }
    if let Some((bucket, coordinated)) = window_vessels
        .iter()
        .filter(|(_, vessels)| vessels.len() >= fleet_config.min_cluster_size)
        .max_by_key(|(_, vessels)| vessels.len())
    {
        emit(
            store,
            cluster,
            "dark_coordination",
            json!({
                "window_start_epoch": bucket * 7200,
                "vessels_dark_together": coordinated.len(),
            }),
            30,
            report,
        )?;
    }

    // Flag diversity within one beneficial owner.
    let flags: HashSet<&str> = cluster
        .vessel_ids
        .iter()
        .filter_map(|id| by_id.get(id).and_then(|v| v.flag.as_deref()))
        .collect();
    if flags.len() >= fleet_config.flag_diversity_threshold {
        emit(
            store,
            cluster,
            "flag_diversity",
            json!({ "distinct_flags": flags.len() }),
            15,
            report,
        )?;
    }

    // High-risk average across the cluster's best gap scores.
    let mut scores = Vec::new();
    for &vessel_id in &cluster.vessel_ids {
        let best = store
            .gap_events_for_vessel(vessel_id)?
            .iter()
            .map(|g| g.risk_score)
            .max()
            .unwrap_or(0);
        scores.push(best as f64);
    }
    let avg = scores.iter().sum::<f64>() / scores.len().max(1) as f64;
    if avg >= fleet_config.high_risk_avg_threshold {
        emit(
            store,
            cluster,
            "high_risk_average",
            json!({ "average_best_gap_score": (avg * 10.0).round() / 10.0 }),
            20,
            report,
        )?;
    }

    Ok(())
}

/// Same manager operating vessels for different owners.
fn evaluate_shared_manager(
    store: &FleetStore,
    vessels: &[Vessel],
    fleet_config: &config::FleetAnalysisConfig,
    report: &mut FleetAnalysisReport,
) -> StoreResult<()> {
    let mut by_manager: BTreeMap<String, Vec<&Vessel>> = BTreeMap::new();
    for vessel in vessels {
        if let Some(manager) = vessel.manager_name.as_deref() {
            let normalized = textmatch::normalize_name(manager);
            if !normalized.is_empty() {
                by_manager.entry(normalized).or_default().push(vessel);
            }
        }
    }

    for (manager, managed) in by_manager {
        if managed.len() < fleet_config.min_cluster_size {
            continue;
        }
        let owners: HashSet<String> = managed
            .iter()
            .filter_map(|v| v.owner_name.as_deref().map(textmatch::normalize_name))
            .collect();
        if owners.len() < 2 {
            continue;
        }
        let mut vessel_ids: Vec<VesselId> = managed.iter().map(|v| v.vessel_id).collect();
        vessel_ids.sort_unstable();
        let cluster = OwnerCluster {
            cluster_id: vessel_ids[0],
            canonical_name: manager.clone(),
            vessel_ids,
        };
        emit(
            store,
            &cluster,
            "shared_manager_different_owners",
            json!({
                "manager": manager,
                "distinct_owners": owners.len(),
            }),
            20,
            report,
        )?;
    }
    Ok(())
}

/// One non-IG P&I club covering a whole group. IG clubs insure most of the
/// world fleet, so sharing one means nothing.
fn evaluate_shared_pi_club(
    store: &FleetStore,
    vessels: &[Vessel],
    fleet_config: &config::FleetAnalysisConfig,
    report: &mut FleetAnalysisReport,
) -> StoreResult<()> {
    let mut by_club: BTreeMap<String, Vec<&Vessel>> = BTreeMap::new();
    for vessel in vessels {
        if let Some(club) = vessel.pi_club_name.as_deref() {
            if crate::detect::spoofing::is_ig_club(Some(club)) {
                continue;
            }
            let normalized = textmatch::normalize_name(club);
            if !normalized.is_empty() {
                by_club.entry(normalized).or_default().push(vessel);
            }
        }
    }

    for (club, insured) in by_club {
        if insured.len() < fleet_config.min_cluster_size {
            continue;
        }
        let mut vessel_ids: Vec<VesselId> = insured.iter().map(|v| v.vessel_id).collect();
        vessel_ids.sort_unstable();
        let cluster = OwnerCluster {
            cluster_id: vessel_ids[0],
            canonical_name: club.clone(),
            vessel_ids,
        };
        emit(
            store,
            &cluster,
            "shared_non_ig_pi_club",
            json!({
                "pi_club": club,
                "vessel_count": cluster.vessel_ids.len(),
            }),
            15,
            report,
        )?;
    }
    Ok(())
}

fn emit(
    store: &FleetStore,
    cluster: &OwnerCluster,
    alert_type: &str,
    evidence: serde_json::Value,
    score: i64,
    report: &mut FleetAnalysisReport,
) -> StoreResult<()> {
    let inserted = store.insert_fleet_alert(&crate::types::FleetAlert {
        alert_id: store.next_id()?,
        owner_cluster_id: Some(cluster.cluster_id),
        alert_type: alert_type.to_string(),
        vessel_ids: cluster.vessel_ids.clone(),
        evidence_json: json!({
            "canonical_name": cluster.canonical_name,
            "detail": evidence,
        }),
        risk_score_component: score,
        created_at: Utc::now(),
    })?;
    if inserted {
        report.alerts_created += 1;
    }
    Ok(())
}
