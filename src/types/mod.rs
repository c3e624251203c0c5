//! Data model: entities, enums, and invariants.
//!
//! Every entity is a plain serde struct with an explicit integer id; the
//! store owns id assignment and referential rules (cascade deletes, merge
//! FK rewrites, the no-self-merge check).

mod ais;
mod corridor;
mod enums;
mod events;
mod identity;
mod vessel;

pub use ais::{source_quality, AisObservation, AisPoint, OBSERVATION_RETENTION_HOURS};
pub use corridor::{
    Corridor, CorridorGapBaseline, DarkVesselDetection, Port, PortCall, PortId, SatelliteCheck,
};
pub use enums::{
    AisClass, AlertStatus, ConfidenceLevel, CorridorType, CoverageQuality, EnvelopeMethod,
    EvidenceCategory, FlagRisk, MergeCandidateStatus, PiStatus, SpoofingType, StsDetectionType,
};
pub use events::{
    AisGapEvent, AnomalyId, CorridorId, DraughtChangeEvent, EnvelopePosition, GapEventId,
    LoiteringEvent, LoiteringId, MovementEnvelope, SpoofingAnomaly, StsId, StsTransferEvent,
};
pub use identity::{
    AuditLog, CreaVoyage, FleetAlert, MergeCandidate, MergeOperation, PipelineRun,
    VerificationLog, VesselWatchlist,
};
pub use vessel::{Vessel, VesselHistory, VesselId};
