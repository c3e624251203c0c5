//! Identity resolution: discovering likely-same-vessel pairs across MMSI
//! changes and managing reversible merges.

mod candidates;
mod merge;

pub use candidates::{
    discover_merge_candidates, FingerprintScorer, IdentityResolutionReport, NullFingerprintScorer,
};
pub use merge::{execute_merge, reverse_merge, vessel_timeline, TimelineEntry};
