//! RadianceFleet: Maritime Shadow-Fleet Anomaly Detection
//!
//! Analytical core for detecting sanctions-evading vessel behavior from AIS
//! position broadcasts and auxiliary registries.
//!
//! ## Architecture
//!
//! - **Ingest**: validated AIS normalization with identity-change tracking
//! - **Detectors**: AIS gaps, spoofing / identity fraud, STS transfers,
//!   loitering, port calls
//! - **Risk Scoring**: additive signals × corridor × size multipliers from a
//!   YAML rule set
//! - **Identity Resolver**: MMSI-alias merging with reversible operations
//! - **Feed-Outage Suppression**: corridor baselines guard against receiver
//!   failures scoring as evasion

pub mod adapters;
pub mod config;
pub mod confidence;
pub mod detect;
pub mod fleet;
pub mod geo;
pub mod identity;
pub mod ingest;
pub mod net;
pub mod outage;
pub mod pipeline;
pub mod registry;
pub mod satellite;
pub mod scoring;
pub mod store;
pub mod types;
pub mod util;
pub mod verification;

// Re-export the configuration entry points
pub use config::{FleetConfig, RiskScoringConfig, Settings};

// Re-export commonly used types
pub use types::{
    AisGapEvent, AisPoint, AlertStatus, ConfidenceLevel, Corridor, CorridorType, LoiteringEvent,
    SpoofingAnomaly, SpoofingType, StsTransferEvent, Vessel, VesselId,
};

// Re-export the store handle
pub use store::FleetStore;

// Re-export the scoring entry points
pub use scoring::{compute_gap_score, Breakdown};
