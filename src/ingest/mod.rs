//! AIS CSV ingestion.
//!
//! Validates, normalizes, and persists AIS records. Invalid rows are
//! rejected with a logged reason; they never abort a batch. Vessel upserts
//! track identity-field changes into `VesselHistory`, and point inserts run
//! under the source-quality dedup policy.

pub mod normalize;

use std::io::BufRead;

use chrono::{DateTime, Utc};

use crate::registry::{flag_to_risk_category, mmsi_to_flag};
use crate::store::{FleetStore, PointInsertOutcome, StoreResult};
use crate::types::{AisClass, AisObservation, AisPoint, Vessel};

pub use normalize::{
    canonical_column, parse_timestamp, validate_row, RawAisRow, ValidAisRow, ValidationFailure,
    REQUIRED_COLUMNS,
};

use crate::util::csv_split;

// ============================================================================
// Class-specific SOG warnings
// ============================================================================

/// `(min_dwt, max_dwt, limit_kn, label)` — warn-only thresholds.
const CLASS_SOG_LIMITS: [(f64, Option<f64>, f64, &str); 4] = [
    (200_000.0, None, 18.0, "VLCC"),
    (120_000.0, Some(200_000.0), 19.0, "Suezmax"),
    (80_000.0, Some(120_000.0), 20.0, "Aframax"),
    (60_000.0, Some(80_000.0), 20.0, "Panamax"),
];

/// Log a warning when SOG exceeds the vessel's class limit. Never rejects.
fn check_sog_class_limit(vessel: &Vessel, sog: Option<f64>) {
    let (Some(sog), Some(dwt)) = (sog, vessel.deadweight) else {
        return;
    };
    for (min_dwt, max_dwt, limit, label) in CLASS_SOG_LIMITS {
        let in_bracket = match max_dwt {
            None => dwt >= min_dwt,
            Some(max) => dwt >= min_dwt && dwt < max,
        };
        if in_bracket {
            if sog > limit {
                tracing::warn!(
                    mmsi = %vessel.mmsi,
                    sog,
                    limit,
                    class = label,
                    dwt,
                    "SOG exceeds class limit"
                );
            }
            return;
        }
    }
}

// ============================================================================
// Report
// ============================================================================

/// Ingestion summary returned to the caller.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct IngestReport {
    pub accepted: usize,
    pub rejected: usize,
    pub replaced: usize,
    pub ignored: usize,
    pub vessels_created: usize,
    /// First 50 rejection reasons; the rest are counted only.
    pub errors: Vec<String>,
    pub errors_truncated: bool,
    pub total_errors: usize,
}

impl IngestReport {
    pub fn duplicates(&self) -> usize {
        self.replaced + self.ignored
    }

    fn push_error(&mut self, error: &ValidationFailure) {
        self.total_errors += 1;
        if self.errors.len() < 50 {
            self.errors.push(error.to_string());
        } else {
            self.errors_truncated = true;
        }
    }
}

/// Missing-column error for CSV uploads.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("CSV missing required columns: {0:?}")]
    MissingColumns(Vec<String>),
    #[error("empty CSV input")]
    EmptyInput,
    #[error("I/O error reading CSV: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Store(#[from] crate::store::StoreError),
}

// ============================================================================
// CSV entry point
// ============================================================================

/// Ingest AIS records from CSV. `default_source` labels rows without a
/// `source` column (e.g. "csv_import", "terrestrial").
pub fn ingest_ais_csv<R: BufRead>(
    store: &FleetStore,
    reader: R,
    default_source: &str,
) -> Result<IngestReport, IngestError> {
    ingest_ais_csv_at(store, reader, default_source, Utc::now())
}

/// Ingestion with an explicit "now" for the timestamp ceiling (tests,
/// archive replays).
pub fn ingest_ais_csv_at<R: BufRead>(
    store: &FleetStore,
    reader: R,
    default_source: &str,
    now: DateTime<Utc>,
) -> Result<IngestReport, IngestError> {
    let mut lines = reader.lines();
    let header_line = lines.next().ok_or(IngestError::EmptyInput)??;
    let headers: Vec<String> = csv_split(&header_line)
        .iter()
        .map(|h| canonical_column(h))
        .collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !headers.iter().any(|h| h == *c))
        .map(|c| (*c).to_string())
        .collect();
    if !missing.is_empty() {
        return Err(IngestError::MissingColumns(missing));
    }

    let mut report = IngestReport::default();

    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let fields = csv_split(&line);
        let raw = row_from_fields(&headers, &fields, default_source);

        match validate_row(&raw, now) {
            Ok(valid) => {
                ingest_valid_row(store, &valid, &mut report)?;
            }
            Err(e) => {
                tracing::warn!(mmsi = %raw.mmsi, error = %e, "rejected AIS record");
                report.rejected += 1;
                report.push_error(&e);
            }
        }
    }

    store.flush()?;
    tracing::info!(
        accepted = report.accepted,
        rejected = report.rejected,
        duplicates = report.duplicates(),
        replaced = report.replaced,
        ignored = report.ignored,
        vessels_created = report.vessels_created,
        "ingestion complete"
    );
    Ok(report)
}

/// Ingest one already-validated row (streaming adapters enter here).
pub fn ingest_valid_row(
    store: &FleetStore,
    row: &ValidAisRow,
    report: &mut IngestReport,
) -> StoreResult<()> {
    let (vessel, created) = upsert_vessel(store, row)?;
    if created {
        report.vessels_created += 1;
    }
    check_sog_class_limit(&vessel, row.sog);

    let point = AisPoint {
        vessel_id: vessel.vessel_id,
        timestamp_utc: row.timestamp_utc,
        lat: row.lat,
        lon: row.lon,
        sog: row.sog,
        cog: row.cog,
        heading: row.heading,
        nav_status: row.nav_status,
        ais_class: parse_ais_class(row.ais_class.as_deref()),
        source: row.source.clone(),
    };
    match store.insert_point(&point)? {
        PointInsertOutcome::Created => report.accepted += 1,
        PointInsertOutcome::Replaced => report.replaced += 1,
        PointInsertOutcome::Ignored => report.ignored += 1,
    }

    // Dual-write the raw observation for cross-receiver comparison.
    // Best-effort: a failure is logged and never blocks the point insert.
    let observation_write = store.next_id().and_then(|observation_id| {
        store.append_observation(&AisObservation {
            observation_id,
            vessel_id: vessel.vessel_id,
            timestamp_utc: row.timestamp_utc,
            lat: row.lat,
            lon: row.lon,
            sog: row.sog,
            cog: row.cog,
            source: row.source.clone(),
            received_at_utc: Utc::now(),
        })
    });
    if let Err(e) = observation_write {
        tracing::warn!(mmsi = %row.mmsi, error = %e, "failed to write AIS observation");
    }

    Ok(())
}

// ============================================================================
// Vessel upsert
// ============================================================================

fn parse_ais_class(raw: Option<&str>) -> AisClass {
    match raw.map(str::to_ascii_uppercase).as_deref() {
        Some("A") => AisClass::A,
        Some("B") => AisClass::B,
        _ => AisClass::Unknown,
    }
}

/// Get or create the vessel for a row. Returns `(vessel, created)`.
///
/// New vessels derive their flag from the row or the MID table and set
/// `mmsi_first_seen_utc` once. Known vessels get identity changes tracked
/// into history before mutable fields are overwritten. Absorbed identities
/// resolve to their canonical vessel.
fn upsert_vessel(store: &FleetStore, row: &ValidAisRow) -> StoreResult<(Vessel, bool)> {
    let existing = store.vessel_by_mmsi(&row.mmsi)?;

    let Some(found) = existing else {
        let vessel_id = store.next_id()?;
        let mut vessel = Vessel::new(vessel_id, row.mmsi.clone(), row.timestamp_utc);
        vessel.imo = row.imo.clone();
        vessel.name = row.vessel_name.clone();
        vessel.flag = row
            .flag
            .clone()
            .or_else(|| mmsi_to_flag(&row.mmsi).map(String::from));
        vessel.flag_risk_category = flag_to_risk_category(vessel.flag.as_deref());
        vessel.vessel_type = row.vessel_type.clone();
        vessel.deadweight = row.deadweight;
        vessel.ais_class = parse_ais_class(row.ais_class.as_deref());
        vessel.callsign = row.callsign.clone();
        vessel.ais_source = Some(row.source.clone());
        vessel.last_ais_received_utc = Some(row.timestamp_utc);
        store.insert_vessel(&vessel)?;
        store.audit("ingest", "create", "vessel", vessel_id);
        return Ok((vessel, true));
    };

    let mut vessel = if found.is_absorbed() {
        store.canonical_vessel(found.vessel_id)?
    } else {
        found
    };

    track_change(store, &vessel, "name", vessel.name.as_deref(), row.vessel_name.as_deref(), row)?;
    track_change(store, &vessel, "flag", vessel.flag.as_deref(), row.flag.as_deref(), row)?;
    track_change(
        store,
        &vessel,
        "vessel_type",
        vessel.vessel_type.as_deref(),
        row.vessel_type.as_deref(),
        row,
    )?;
    let existing_class = vessel.ais_class.to_string();
    let new_class = row.ais_class.as_deref().map(str::to_ascii_lowercase);
    if let Some(new_class) = &new_class {
        if vessel.ais_class != AisClass::Unknown
            && !existing_class.eq_ignore_ascii_case(new_class)
        {
            store.record_history(
                vessel.vessel_id,
                "ais_class",
                &existing_class,
                new_class,
                row.timestamp_utc,
                &row.source,
            )?;
        }
    }

    // Overwrite mutable fields with fresher values.
    if let Some(name) = &row.vessel_name {
        vessel.name = Some(name.clone());
    }
    if let Some(flag) = &row.flag {
        vessel.flag = Some(flag.clone());
        vessel.flag_risk_category = flag_to_risk_category(Some(flag));
    }
    if let Some(vtype) = &row.vessel_type {
        vessel.vessel_type = Some(vtype.clone());
    }
    if row.ais_class.is_some() {
        vessel.ais_class = parse_ais_class(row.ais_class.as_deref());
    }
    if row.deadweight.is_some() {
        vessel.deadweight = row.deadweight;
    }
    if row.imo.is_some() && vessel.imo.is_none() {
        vessel.imo = row.imo.clone();
    }
    if vessel.last_ais_received_utc.is_none_or(|t| t < row.timestamp_utc) {
        vessel.last_ais_received_utc = Some(row.timestamp_utc);
    }
    vessel.updated_at = Utc::now();
    store.update_vessel(&vessel)?;
    Ok((vessel, false))
}

/// Record a history row when an identity field changes (both values present
/// and different, case-insensitively). Rapid changes inside 24 h of the last
/// point get an extra warning.
fn track_change(
    store: &FleetStore,
    vessel: &Vessel,
    field: &str,
    old: Option<&str>,
    new: Option<&str>,
    row: &ValidAisRow,
) -> StoreResult<()> {
    let (Some(old), Some(new)) = (old, new) else {
        return Ok(());
    };
    let old = old.trim();
    let new = new.trim();
    if old.is_empty() || new.is_empty() || old.eq_ignore_ascii_case(new) {
        return Ok(());
    }

    if let Some(last_point) = store.last_point(vessel.vessel_id)? {
        let window_h =
            (row.timestamp_utc - last_point.timestamp_utc).num_seconds() as f64 / 3600.0;
        if (0.0..24.0).contains(&window_h) {
            tracing::warn!(
                mmsi = %vessel.mmsi,
                field,
                window_h,
                old,
                new,
                "identity field changed within 24h of last position"
            );
        }
    }

    store.record_history(vessel.vessel_id, field, old, new, row.timestamp_utc, &row.source)?;
    Ok(())
}

// ============================================================================
// Row assembly
// ============================================================================

fn row_from_fields(headers: &[String], fields: &[String], default_source: &str) -> RawAisRow {
    let mut row = RawAisRow {
        source: Some(default_source.to_string()),
        ..RawAisRow::default()
    };
    for (header, field) in headers.iter().zip(fields.iter()) {
        let value = field.trim();
        if value.is_empty() {
            continue;
        }
        match header.as_str() {
            "mmsi" => row.mmsi = value.to_string(),
            "timestamp" => row.timestamp = value.to_string(),
            "lat" => row.lat = value.parse().ok(),
            "lon" => row.lon = value.parse().ok(),
            "sog" => row.sog = value.parse().ok(),
            "cog" => row.cog = value.parse().ok(),
            "heading" => row.heading = value.parse().ok(),
            "nav_status" => row.nav_status = value.parse().ok(),
            "imo" => row.imo = Some(value.to_string()),
            "vessel_name" => row.vessel_name = Some(value.to_string()),
            "flag" => row.flag = Some(value.to_string()),
            "vessel_type" => row.vessel_type = Some(value.to_string()),
            "deadweight" | "dwt" => row.deadweight = value.parse().ok(),
            "ais_class" => row.ais_class = Some(value.to_string()),
            "callsign" => row.callsign = Some(value.to_string()),
            "source" => row.source = Some(value.to_string()),
            _ => {}
        }
    }
    row
}
