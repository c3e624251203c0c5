//! AISHub community feed.
//!
//! JSON row contract: `[{"MMSI": ..., "TIME": "...", "LATITUDE": ...,
//! "LONGITUDE": ..., "SOG": ..., "COG": ..., "HEADING": ...,
//! "NAVSTAT": ...}, ...]`. The service allows one request per minute, so
//! the retry vector is [60, 120, 180].

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;

use crate::config;
use crate::ingest::{self, IngestReport, RawAisRow};
use crate::net::{retry_request, FetchError, RetryPolicy};
use crate::store::FleetStore;

const AISHUB_URL: &str = "https://data.aishub.net/ws.php";

#[derive(Debug, Deserialize)]
pub struct AishubRow {
    #[serde(rename = "MMSI")]
    pub mmsi: serde_json::Value,
    #[serde(rename = "TIME")]
    pub time: String,
    #[serde(rename = "LATITUDE")]
    pub latitude: f64,
    #[serde(rename = "LONGITUDE")]
    pub longitude: f64,
    #[serde(rename = "SOG")]
    pub sog: Option<f64>,
    #[serde(rename = "COG")]
    pub cog: Option<f64>,
    #[serde(rename = "HEADING")]
    pub heading: Option<f64>,
    #[serde(rename = "NAVSTAT")]
    pub navstat: Option<u8>,
    #[serde(rename = "NAME")]
    pub name: Option<String>,
}

/// Parse an AISHub payload. The service wraps rows in a two-element array:
/// `[ {status...}, [rows...] ]`.
pub fn parse_rows(payload: &str) -> Result<Vec<AishubRow>, FetchError> {
    let outer: Vec<serde_json::Value> =
        serde_json::from_str(payload).map_err(|e| FetchError::Body(e.to_string()))?;
    let Some(rows_value) = outer.get(1) else {
        return Ok(Vec::new());
    };
    serde_json::from_value(rows_value.clone()).map_err(|e| FetchError::Body(e.to_string()))
}

/// Ingest parsed rows through validation.
pub fn ingest_rows(store: &FleetStore, rows: &[AishubRow]) -> IngestReport {
    let mut report = IngestReport::default();
    for row in rows {
        let raw = RawAisRow {
            mmsi: match &row.mmsi {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            },
            timestamp: row.time.clone(),
            lat: Some(row.latitude),
            lon: Some(row.longitude),
            sog: row.sog,
            cog: row.cog,
            heading: row.heading,
            nav_status: row.navstat,
            vessel_name: row.name.clone(),
            source: Some("aisstream".to_string()),
            ..RawAisRow::default()
        };
        match ingest::validate_row(&raw, Utc::now()) {
            Ok(valid) => {
                if let Err(e) = ingest::ingest_valid_row(store, &valid, &mut report) {
                    tracing::warn!(mmsi = %raw.mmsi, error = %e, "AISHub row insert failed");
                }
            }
            Err(e) => {
                tracing::debug!(mmsi = %raw.mmsi, error = %e, "AISHub row rejected");
                report.rejected += 1;
            }
        }
    }
    report
}

/// Live adapter. Requires `AISHUB_USERNAME`.
pub struct AishubAdapter {
    client: reqwest::Client,
}

impl AishubAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for AishubAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl super::FeedAdapter for AishubAdapter {
    fn name(&self) -> &'static str {
        "aishub"
    }

    async fn fetch(&self, store: &FleetStore) -> Result<serde_json::Value, FetchError> {
        let config = config::get();
        let Some(username) = config.settings.aishub_username.clone() else {
            tracing::info!("AISHUB_USERNAME not configured - skipping AISHub fetch");
            return Ok(serde_json::json!({ "skipped": "no username" }));
        };

        let response = retry_request(
            || {
                self.client.get(AISHUB_URL).query(&[
                    ("username", username.as_str()),
                    ("format", "1"),
                    ("output", "json"),
                    ("compress", "0"),
                ])
            },
            // The service is 1 request/minute.
            &RetryPolicy::rate_limited(),
        )
        .await?;
        let payload = response
            .text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;
        let rows = parse_rows(&payload)?;
        let report = ingest_rows(store, &rows);
        store.flush().map_err(|e| FetchError::Body(e.to_string()))?;
        Ok(serde_json::json!({
            "rows": rows.len(),
            "accepted": report.accepted,
            "rejected": report.rejected,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_ingest_rows() {
        let payload = r#"[
            {"ERROR": false, "RECORDS": 1},
            [{"MMSI": 636017000, "TIME": "2025-06-01 00:00:00", "LATITUDE": 55.0,
              "LONGITUDE": 12.0, "SOG": 10.2, "COG": 180.0, "HEADING": 181.0,
              "NAVSTAT": 0, "NAME": "OCEAN STAR"}]
        ]"#;
        let rows = parse_rows(payload).unwrap();
        assert_eq!(rows.len(), 1);

        let store = FleetStore::temporary().unwrap();
        let report = ingest_rows(&store, &rows);
        assert_eq!(report.accepted, 1);
        let vessel = store.vessel_by_mmsi("636017000").unwrap().unwrap();
        assert_eq!(vessel.name.as_deref(), Some("OCEAN STAR"));
        let points = store.points_for_vessel(vessel.vessel_id).unwrap();
        assert_eq!(points[0].source, "aisstream");
    }

    #[test]
    fn test_empty_payload() {
        assert!(parse_rows("[]").unwrap().is_empty());
        assert!(parse_rows("[{\"ERROR\": true}]").unwrap().is_empty());
    }
}
