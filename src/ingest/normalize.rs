//! AIS row normalization and validation.
//!
//! Column aliases are folded to canonical names, sentinel values resolve to
//! `None`, and every row passes the validation gate before touching the
//! store. Rejections carry a typed reason and never abort a batch.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};

// ============================================================================
// Column aliases
// ============================================================================

/// Fold a raw (case-insensitive) CSV header to its canonical field name.
pub fn canonical_column(raw: &str) -> String {
    let lower = raw.trim().to_ascii_lowercase();
    match lower.as_str() {
        "shipname" | "ship_name" | "vesselname" => "vessel_name".to_string(),
        "ship_type" | "vesseltype" => "vessel_type".to_string(),
        "latitude" => "lat".to_string(),
        "longitude" => "lon".to_string(),
        "speed" => "sog".to_string(),
        "course" => "cog".to_string(),
        "status" | "navigational_status" => "nav_status".to_string(),
        "time" | "datetime" | "basedatetime" => "timestamp".to_string(),
        "callsign" | "call_sign" => "callsign".to_string(),
        "country" => "flag".to_string(),
        other => other.to_string(),
    }
}

/// Columns that must be present after normalization.
pub const REQUIRED_COLUMNS: [&str; 4] = ["mmsi", "timestamp", "lat", "lon"];

// ============================================================================
// Sentinels
// ============================================================================

/// SOG sentinel meaning "not available" (102.3 kn per ITU-R M.1371).
const SOG_SENTINEL: f64 = 102.3;
/// COG sentinel meaning "not available".
const COG_SENTINEL: f64 = 360.0;
/// Heading sentinel meaning "not available".
const HEADING_SENTINEL: f64 = 511.0;

pub fn resolve_sog(raw: Option<f64>) -> Option<f64> {
    raw.filter(|&s| (s - SOG_SENTINEL).abs() > 1e-9)
}

pub fn resolve_cog(raw: Option<f64>) -> Option<f64> {
    raw.filter(|&c| (c - COG_SENTINEL).abs() > 1e-9)
}

pub fn resolve_heading(raw: Option<f64>) -> Option<f64> {
    raw.filter(|&h| (h - HEADING_SENTINEL).abs() > 1e-9)
}

// ============================================================================
// Raw and validated rows
// ============================================================================

/// One normalized-but-unvalidated CSV row.
#[derive(Debug, Clone, Default)]
pub struct RawAisRow {
    pub mmsi: String,
    pub timestamp: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub sog: Option<f64>,
    pub cog: Option<f64>,
    pub heading: Option<f64>,
    pub nav_status: Option<u8>,
    pub imo: Option<String>,
    pub vessel_name: Option<String>,
    pub flag: Option<String>,
    pub vessel_type: Option<String>,
    pub deadweight: Option<f64>,
    pub ais_class: Option<String>,
    pub callsign: Option<String>,
    pub source: Option<String>,
}

/// A validated AIS row ready for upsert.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidAisRow {
    pub mmsi: String,
    pub timestamp_utc: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub sog: Option<f64>,
    pub cog: Option<f64>,
    pub heading: Option<f64>,
    pub nav_status: Option<u8>,
    /// 7-digit IMO with any "IMO" prefix stripped.
    pub imo: Option<String>,
    pub vessel_name: Option<String>,
    pub flag: Option<String>,
    pub vessel_type: Option<String>,
    pub deadweight: Option<f64>,
    pub ais_class: Option<String>,
    pub callsign: Option<String>,
    pub source: String,
    /// Anchored (`nav_status = 1`) while reporting SOG > 3 kn. Accepted,
    /// but logged as a data-quality warning.
    pub anchored_high_sog: bool,
}

/// Typed rejection reasons.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum ValidationFailure {
    #[error("invalid MMSI {0:?} (must be 9 digits)")]
    InvalidMmsi(String),
    #[error("invalid IMO {0:?} (must be 7 digits)")]
    InvalidImo(String),
    #[error("missing coordinates")]
    MissingCoordinates,
    #[error("latitude out of range: {0}")]
    LatitudeOutOfRange(f64),
    #[error("longitude out of range: {0}")]
    LongitudeOutOfRange(f64),
    #[error("negative SOG: {0}")]
    NegativeSog(f64),
    #[error("SOG exceeds physical limit: {sog} kn (suspicious_sog={suspicious_sog})")]
    SogExceedsLimit { sog: f64, suspicious_sog: bool },
    #[error("missing timestamp")]
    MissingTimestamp,
    #[error("unparseable timestamp {0:?}")]
    UnparseableTimestamp(String),
    #[error("timestamp too old (pre-2010): {0}")]
    TimestampTooOld(DateTime<Utc>),
    #[error("future timestamp beyond skew ceiling: {0}")]
    TimestampBeyondCeiling(DateTime<Utc>),
}

/// Clock-skew allowance on future timestamps, days.
const FUTURE_CEILING_DAYS: i64 = 7;

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

/// Parse a timestamp string: RFC 3339 (with `Z` or offset) or naive
/// `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS`, treated as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }
    None
}

/// Validate a normalized row against the ingestion rules.
///
/// The future ceiling (`now + 7 d`) admits minor clock skew while rejecting
/// absurd values; the 2010 floor rejects pre-AIS-mandate garbage.
pub fn validate_row(row: &RawAisRow, now: DateTime<Utc>) -> Result<ValidAisRow, ValidationFailure> {
    if !is_digits(&row.mmsi, 9) {
        return Err(ValidationFailure::InvalidMmsi(row.mmsi.clone()));
    }

    let imo = match &row.imo {
        Some(raw) if !raw.trim().is_empty() => {
            let stripped = raw
                .trim()
                .strip_prefix("IMO")
                .map_or_else(|| raw.trim().to_string(), |s| s.trim().to_string());
            if !is_digits(&stripped, 7) {
                return Err(ValidationFailure::InvalidImo(raw.clone()));
            }
            Some(stripped)
        }
        _ => None,
    };

    let (Some(lat), Some(lon)) = (row.lat, row.lon) else {
        return Err(ValidationFailure::MissingCoordinates);
    };
    if !(-90.0..=90.0).contains(&lat) {
        return Err(ValidationFailure::LatitudeOutOfRange(lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(ValidationFailure::LongitudeOutOfRange(lon));
    }

    let sog = resolve_sog(row.sog);
    if let Some(s) = sog {
        if s < 0.0 {
            return Err(ValidationFailure::NegativeSog(s));
        }
        if s > 35.0 {
            return Err(ValidationFailure::SogExceedsLimit {
                sog: s,
                suspicious_sog: s > 50.0,
            });
        }
    }

    if row.timestamp.trim().is_empty() {
        return Err(ValidationFailure::MissingTimestamp);
    }
    let timestamp_utc = parse_timestamp(&row.timestamp)
        .ok_or_else(|| ValidationFailure::UnparseableTimestamp(row.timestamp.clone()))?;
    if timestamp_utc < DateTime::<Utc>::from_naive_utc_and_offset(
        chrono::NaiveDate::from_ymd_opt(2010, 1, 1)
            .unwrap_or_default()
            .and_hms_opt(0, 0, 0)
            .unwrap_or_default(),
        Utc,
    ) {
        return Err(ValidationFailure::TimestampTooOld(timestamp_utc));
    }
    if timestamp_utc > now + Duration::days(FUTURE_CEILING_DAYS) {
        return Err(ValidationFailure::TimestampBeyondCeiling(timestamp_utc));
    }

    let anchored_high_sog = row.nav_status == Some(1) && sog.is_some_and(|s| s > 3.0);
    if anchored_high_sog {
        tracing::warn!(
            mmsi = %row.mmsi,
            sog = ?sog,
            "anchored vessel reporting SOG > 3 kn (anchored_high_sog)"
        );
    }

    Ok(ValidAisRow {
        mmsi: row.mmsi.clone(),
        timestamp_utc,
        lat,
        lon,
        sog,
        cog: resolve_cog(row.cog),
        heading: resolve_heading(row.heading),
        nav_status: row.nav_status,
        imo,
        vessel_name: row.vessel_name.clone().filter(|s| !s.trim().is_empty()),
        flag: row.flag.clone().filter(|s| !s.trim().is_empty()),
        vessel_type: row.vessel_type.clone().filter(|s| !s.trim().is_empty()),
        deadweight: row.deadweight,
        ais_class: row.ais_class.clone().filter(|s| !s.trim().is_empty()),
        callsign: row.callsign.clone().filter(|s| !s.trim().is_empty()),
        source: row
            .source
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "csv_import".to_string()),
        anchored_high_sog,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 15, 0, 0, 0).unwrap()
    }

    fn valid_raw() -> RawAisRow {
        RawAisRow {
            mmsi: "636017000".into(),
            timestamp: "2025-06-01T00:00:00Z".into(),
            lat: Some(55.0),
            lon: Some(12.0),
            sog: Some(10.0),
            ..RawAisRow::default()
        }
    }

    #[test]
    fn test_column_aliases() {
        assert_eq!(canonical_column("BaseDateTime"), "timestamp");
        assert_eq!(canonical_column("LATITUDE"), "lat");
        assert_eq!(canonical_column("ShipName"), "vessel_name");
        assert_eq!(canonical_column("MMSI"), "mmsi");
        assert_eq!(canonical_column("Speed"), "sog");
    }

    #[test]
    fn test_valid_row_passes() {
        let row = validate_row(&valid_raw(), now()).unwrap();
        assert_eq!(row.mmsi, "636017000");
        assert_eq!(row.source, "csv_import");
        assert!(!row.anchored_high_sog);
    }

    #[test]
    fn test_mmsi_must_be_nine_digits() {
        let mut raw = valid_raw();
        raw.mmsi = "12345678".into();
        assert!(matches!(
            validate_row(&raw, now()),
            Err(ValidationFailure::InvalidMmsi(_))
        ));
        raw.mmsi = "63601700a".into();
        assert!(validate_row(&raw, now()).is_err());
    }

    #[test]
    fn test_latitude_bounds() {
        let mut raw = valid_raw();
        raw.lat = Some(90.5);
        assert!(matches!(
            validate_row(&raw, now()),
            Err(ValidationFailure::LatitudeOutOfRange(_))
        ));
    }

    #[test]
    fn test_sog_rejections() {
        let mut raw = valid_raw();
        raw.sog = Some(-1.0);
        assert!(matches!(
            validate_row(&raw, now()),
            Err(ValidationFailure::NegativeSog(_))
        ));
        raw.sog = Some(40.0);
        match validate_row(&raw, now()) {
            Err(ValidationFailure::SogExceedsLimit { suspicious_sog, .. }) => {
                assert!(!suspicious_sog);
            }
            other => panic!("expected SOG rejection, got {other:?}"),
        }
        raw.sog = Some(60.0);
        match validate_row(&raw, now()) {
            Err(ValidationFailure::SogExceedsLimit { suspicious_sog, .. }) => {
                assert!(suspicious_sog);
            }
            other => panic!("expected SOG rejection, got {other:?}"),
        }
    }

    #[test]
    fn test_sog_sentinel_is_absent_not_rejected() {
        let mut raw = valid_raw();
        raw.sog = Some(102.3);
        let row = validate_row(&raw, now()).unwrap();
        assert_eq!(row.sog, None);
    }

    #[test]
    fn test_timestamp_window() {
        let mut raw = valid_raw();
        raw.timestamp = "2009-12-31T23:59:59Z".into();
        assert!(matches!(
            validate_row(&raw, now()),
            Err(ValidationFailure::TimestampTooOld(_))
        ));
        // Within the 7-day skew ceiling: accepted.
        raw.timestamp = "2025-06-20T00:00:00Z".into();
        assert!(validate_row(&raw, now()).is_ok());
        // Beyond it: rejected.
        raw.timestamp = "2025-07-01T00:00:00Z".into();
        assert!(matches!(
            validate_row(&raw, now()),
            Err(ValidationFailure::TimestampBeyondCeiling(_))
        ));
    }

    #[test]
    fn test_naive_timestamp_parses_as_utc() {
        let mut raw = valid_raw();
        raw.timestamp = "2025-06-01 12:30:00".into();
        let row = validate_row(&raw, now()).unwrap();
        assert_eq!(
            row.timestamp_utc,
            Utc.with_ymd_and_hms(2025, 6, 1, 12, 30, 0).unwrap()
        );
    }

    #[test]
    fn test_imo_prefix_stripped() {
        let mut raw = valid_raw();
        raw.imo = Some("IMO 9231268".into());
        let row = validate_row(&raw, now()).unwrap();
        assert_eq!(row.imo.as_deref(), Some("9231268"));
        raw.imo = Some("12345".into());
        assert!(matches!(
            validate_row(&raw, now()),
            Err(ValidationFailure::InvalidImo(_))
        ));
    }

    #[test]
    fn test_anchored_high_sog_accepted_with_flag() {
        let mut raw = valid_raw();
        raw.nav_status = Some(1);
        raw.sog = Some(5.0);
        let row = validate_row(&raw, now()).unwrap();
        assert!(row.anchored_high_sog);
    }
}
