//! Pay-per-verification gating for commercial data sources.
//!
//! Paid lookups run only for vessels the free pipeline already flags at
//! critical score, and only while the projected monthly spend stays inside
//! the configured budget. Every attempt — including refusals — lands in the
//! verification log.

use chrono::{Datelike, TimeZone, Utc};
use serde_json::json;

use crate::config;
use crate::store::{FleetStore, StoreResult};
use crate::types::{VerificationLog, Vessel, VesselId};

/// Result of one verification attempt.
#[derive(Debug, Clone)]
pub struct VerificationResult {
    pub provider: &'static str,
    pub success: bool,
    pub data: serde_json::Value,
    pub cost_usd: f64,
    pub error: Option<String>,
}

/// A paid verification provider.
pub trait VerificationProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Estimated cost per query, USD. Checked against the budget before
    /// any request is issued.
    fn estimated_cost(&self) -> f64;

    fn verify_vessel(&self, vessel: &Vessel) -> VerificationResult;
}

// ============================================================================
// Providers
// ============================================================================

/// Skylight (satellite-AIS correlation). Free for qualifying NGOs.
pub struct SkylightProvider;

impl VerificationProvider for SkylightProvider {
    fn name(&self) -> &'static str {
        "skylight"
    }

    fn estimated_cost(&self) -> f64 {
        0.0
    }

    fn verify_vessel(&self, vessel: &Vessel) -> VerificationResult {
        tracing::info!(mmsi = %vessel.mmsi, "Skylight verification requested");
        VerificationResult {
            provider: self.name(),
            success: false,
            data: json!({}),
            cost_usd: 0.0,
            error: Some("Skylight API integration pending NGO access approval".to_string()),
        }
    }
}

/// Spire Maritime satellite AIS position verification.
pub struct SpireProvider;

impl VerificationProvider for SpireProvider {
    fn name(&self) -> &'static str {
        "spire"
    }

    fn estimated_cost(&self) -> f64 {
        0.50
    }

    fn verify_vessel(&self, vessel: &Vessel) -> VerificationResult {
        tracing::info!(mmsi = %vessel.mmsi, "Spire verification requested");
        VerificationResult {
            provider: self.name(),
            success: false,
            data: json!({}),
            cost_usd: self.estimated_cost(),
            error: Some("Spire API integration requires paid access".to_string()),
        }
    }
}

/// S&P Sea-web beneficial ownership + P&I lookup.
pub struct SeaWebProvider;

impl VerificationProvider for SeaWebProvider {
    fn name(&self) -> &'static str {
        "seaweb"
    }

    fn estimated_cost(&self) -> f64 {
        2.00
    }

    fn verify_vessel(&self, vessel: &Vessel) -> VerificationResult {
        tracing::info!(mmsi = %vessel.mmsi, "Sea-web verification requested");
        VerificationResult {
            provider: self.name(),
            success: false,
            data: json!({}),
            cost_usd: self.estimated_cost(),
            error: Some("Sea-web API integration requires subscription".to_string()),
        }
    }
}

pub fn provider_by_name(name: &str) -> Option<Box<dyn VerificationProvider>> {
    match name {
        "skylight" => Some(Box::new(SkylightProvider)),
        "spire" => Some(Box::new(SpireProvider)),
        "seaweb" => Some(Box::new(SeaWebProvider)),
        _ => None,
    }
}

// ============================================================================
// Budget gate
// ============================================================================

/// USD spent on successful verifications this calendar month.
pub fn monthly_spend(store: &FleetStore) -> StoreResult<f64> {
    let now = Utc::now();
    let month_start = Utc
        .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
        .single()
        .unwrap_or(now);
    store.verification_spend_since(month_start)
}

/// Run a paid verification, refusing with a logged `budget_exceeded` when
/// the projected spend crosses the monthly budget.
pub fn verify_vessel(
    store: &FleetStore,
    vessel_id: VesselId,
    provider_name: &str,
) -> StoreResult<VerificationResult> {
    let vessel = store.vessel(vessel_id)?;

    // Paid lookups are reserved for vessels the free pipeline already
    // flags at critical score.
    let min_score = config::get().risk.hunt_scoring.min_score_for_hunt;
    let best_score = store
        .gap_events_for_vessel(vessel_id)?
        .iter()
        .map(|g| g.risk_score)
        .max()
        .unwrap_or(0);
    if best_score < min_score {
        return Ok(VerificationResult {
            provider: "none",
            success: false,
            data: json!({}),
            cost_usd: 0.0,
            error: Some(format!(
                "vessel score {best_score} below hunt threshold {min_score}"
            )),
        });
    }

    let Some(provider) = provider_by_name(provider_name) else {
        return Ok(VerificationResult {
            provider: "unknown",
            success: false,
            data: json!({}),
            cost_usd: 0.0,
            error: Some(format!(
                "unknown provider {provider_name}; available: skylight, spire, seaweb"
            )),
        });
    };

    let budget = config::get().settings.verification_monthly_budget_usd;
    let spent = monthly_spend(store)?;
    if spent + provider.estimated_cost() > budget {
        let log_id = store.next_id()?;
        store.insert_verification_log(&VerificationLog {
            log_id,
            vessel_id,
            provider: provider.name().to_string(),
            response_status: "budget_exceeded".to_string(),
            cost_usd: 0.0,
            result_summary: Some(format!(
                "monthly budget ${budget:.2} exceeded (current: ${spent:.2})"
            )),
            request_time_utc: Utc::now(),
        })?;
        tracing::warn!(
            provider = provider.name(),
            spent,
            budget,
            "verification refused: budget exceeded"
        );
        return Ok(VerificationResult {
            provider: provider.name(),
            success: false,
            data: json!({}),
            cost_usd: 0.0,
            error: Some(format!("monthly budget exceeded: ${spent:.2} / ${budget:.2}")),
        });
    }

    let result = provider.verify_vessel(&vessel);
    let log_id = store.next_id()?;
    store.insert_verification_log(&VerificationLog {
        log_id,
        vessel_id,
        provider: provider.name().to_string(),
        response_status: if result.success { "success" } else { "error" }.to_string(),
        cost_usd: result.cost_usd,
        result_summary: result
            .error
            .clone()
            .or_else(|| Some(result.data.to_string())),
        request_time_utc: Utc::now(),
    })?;
    store.audit("verification", "verify", "vessel", vessel_id);
    Ok(result)
}

/// Current budget status for operator display.
pub fn budget_status(store: &FleetStore) -> StoreResult<serde_json::Value> {
    let budget = config::get().settings.verification_monthly_budget_usd;
    let spent = monthly_spend(store)?;
    Ok(json!({
        "monthly_budget_usd": budget,
        "spent_usd": (spent * 100.0).round() / 100.0,
        "remaining_usd": ((budget - spent).max(0.0) * 100.0).round() / 100.0,
        "providers": ["skylight", "spire", "seaweb"],
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn seed(store: &FleetStore) {
        let start = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        store
            .insert_vessel(&Vessel::new(1, "636017000", start))
            .unwrap();
        // Critical gap: clears the hunt threshold for paid lookups.
        store
            .insert_gap_event(&crate::types::AisGapEvent {
                gap_event_id: 10,
                vessel_id: 1,
                gap_start_utc: start,
                gap_end_utc: start + chrono::Duration::hours(26),
                duration_minutes: 1560,
                corridor_id: None,
                risk_score: 82,
                risk_breakdown_json: None,
                status: crate::types::AlertStatus::New,
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
    }

    #[test]
    fn test_below_hunt_threshold_refused_without_logging() {
        let store = FleetStore::temporary().unwrap();
        store
            .insert_vessel(&Vessel::new(
                2,
                "273456789",
                Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            ))
            .unwrap();
        let result = verify_vessel(&store, 2, "skylight").unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("below hunt threshold"));
        assert!(store.all_verification_logs().unwrap().is_empty());
    }

    #[test]
    fn test_unknown_provider() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        let result = verify_vessel(&store, 1, "nonexistent").unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("unknown provider"));
    }

    #[test]
    fn test_budget_refusal_logged() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        // Exhaust the month's budget with a prior success.
        store
            .insert_verification_log(&VerificationLog {
                log_id: 1,
                vessel_id: 1,
                provider: "seaweb".into(),
                response_status: "success".into(),
                cost_usd: 1_000.0,
                result_summary: None,
                request_time_utc: Utc::now(),
            })
            .unwrap();

        let result = verify_vessel(&store, 1, "seaweb").unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("budget exceeded"));

        let logs = store.all_verification_logs().unwrap();
        assert!(logs.iter().any(|l| l.response_status == "budget_exceeded"));
    }

    #[test]
    fn test_attempt_is_logged() {
        let store = FleetStore::temporary().unwrap();
        seed(&store);
        let result = verify_vessel(&store, 1, "skylight").unwrap();
        assert_eq!(result.provider, "skylight");
        let logs = store.all_verification_logs().unwrap();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].response_status, "error");
    }
}
