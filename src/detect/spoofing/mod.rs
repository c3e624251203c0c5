//! Spoofing / identity-fraud detector suite.
//!
//! Ten independent analyzers producing `SpoofingAnomaly` records. Every
//! detector is idempotent per vessel: before creating a new anomaly of a
//! given type it checks that no active one exists for that vessel. Per-vessel
//! failures are counted in the run report and never abort a run.

mod circle_spoof;
mod cloning;
mod fake_position;
mod flag_hopping;
mod imo_fraud;
mod pi_cycling;
mod route_laundering;
mod sparse;
mod stateless;
mod type_mismatch;

pub use circle_spoof::detect_circle_spoofing;
pub use cloning::detect_mmsi_cloning;
pub use fake_position::detect_fake_positions;
pub use flag_hopping::detect_flag_hopping;
pub use imo_fraud::detect_imo_fraud;
pub use pi_cycling::{detect_pi_cycling, is_ig_club};
pub use route_laundering::detect_route_laundering;
pub use sparse::detect_sparse_transmission;
pub use stateless::detect_stateless_mmsi;
pub use type_mismatch::detect_type_dwt_mismatch;

/// Common run summary for the suite.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct SpoofingRunReport {
    /// "ok" or "disabled" (feature flag off).
    pub status: String,
    pub anomalies_created: usize,
    pub vessels_checked: usize,
    pub errors: usize,
}

impl SpoofingRunReport {
    pub fn disabled() -> Self {
        Self {
            status: "disabled".to_string(),
            ..Self::default()
        }
    }

    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
            ..Self::default()
        }
    }
}
