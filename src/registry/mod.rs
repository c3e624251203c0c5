//! Static maritime registries: ITU MID allocations and flag risk lists.

pub mod flags;
pub mod mid;

pub use flags::{flag_to_risk_category, mmsi_to_flag};
pub use mid::{
    extract_ship_mid, is_landlocked_mid, is_micro_territory_mid, is_unallocated_mid, mid_country,
};
