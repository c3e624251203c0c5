//! Detector suite: gaps, spoofing / identity fraud, STS transfers,
//! loitering, and port calls.
//!
//! Detectors scan the store and emit event records; they never score. All of
//! them are idempotent across pipeline re-runs and contain per-vessel
//! failures inside their own loops.

pub mod envelope;
pub mod gaps;
pub mod loitering;
pub mod port_calls;
pub mod spoofing;
pub mod sts;

pub use envelope::{build_envelope, GapEndpoints};
pub use gaps::{detect_gaps, max_speed_kn, GapDetectionReport};
pub use loitering::{detect_loitering, LoiteringReport};
pub use port_calls::{detect_port_calls, resolve_port, PortCallReport};
pub use spoofing::{
    detect_circle_spoofing, detect_fake_positions, detect_flag_hopping, detect_imo_fraud,
    detect_mmsi_cloning, detect_pi_cycling, detect_route_laundering, detect_sparse_transmission,
    detect_stateless_mmsi, detect_type_dwt_mismatch, SpoofingRunReport,
};
pub use sts::{detect_sts_chains, detect_sts_transfers, StsDetectionReport};
