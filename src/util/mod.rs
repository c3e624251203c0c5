//! Small shared utilities.

pub mod csv;
pub mod stats;
pub mod textmatch;

pub use csv::csv_split;
pub use stats::percentile_linear;
