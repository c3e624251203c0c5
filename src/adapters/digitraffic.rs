//! Fintraffic Digitraffic marine AIS feed (Baltic coverage).
//!
//! REST contract: `GET /api/ais/v1/locations` returns GeoJSON-style
//! features with an `mmsi`, a `[lon, lat]` geometry, and `sog`/`cog`/
//! `heading`/`navStat`/`timestampExternal` properties.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;

use crate::ingest::{self, IngestReport, RawAisRow};
use crate::net::{retry_request, FetchError, RetryPolicy};
use crate::store::FleetStore;

const DIGITRAFFIC_URL: &str = "https://meri.digitraffic.fi/api/ais/v1/locations";

#[derive(Debug, Deserialize)]
pub struct DigitrafficFeature {
    pub mmsi: u64,
    pub geometry: Geometry,
    pub properties: Properties,
}

#[derive(Debug, Deserialize)]
pub struct Geometry {
    /// `[lon, lat]`.
    pub coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Properties {
    pub sog: Option<f64>,
    pub cog: Option<f64>,
    pub heading: Option<f64>,
    pub nav_stat: Option<u8>,
    /// Epoch milliseconds.
    pub timestamp_external: i64,
}

#[derive(Debug, Deserialize)]
struct FeatureCollection {
    features: Vec<DigitrafficFeature>,
}

pub fn parse_features(payload: &str) -> Result<Vec<DigitrafficFeature>, FetchError> {
    let collection: FeatureCollection =
        serde_json::from_str(payload).map_err(|e| FetchError::Body(e.to_string()))?;
    Ok(collection.features)
}

pub fn ingest_features(store: &FleetStore, features: &[DigitrafficFeature]) -> IngestReport {
    let mut report = IngestReport::default();
    for feature in features {
        let timestamp = Utc
            .timestamp_millis_opt(feature.properties.timestamp_external)
            .single()
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_default();
        let raw = RawAisRow {
            mmsi: format!("{:09}", feature.mmsi),
            timestamp,
            lon: feature.geometry.coordinates.first().copied(),
            lat: feature.geometry.coordinates.get(1).copied(),
            sog: feature.properties.sog,
            cog: feature.properties.cog,
            heading: feature.properties.heading,
            nav_status: feature.properties.nav_stat,
            source: Some("terrestrial".to_string()),
            ..RawAisRow::default()
        };
        match ingest::validate_row(&raw, Utc::now()) {
            Ok(valid) => {
                if let Err(e) = ingest::ingest_valid_row(store, &valid, &mut report) {
                    tracing::warn!(mmsi = %raw.mmsi, error = %e, "Digitraffic row insert failed");
                }
            }
            Err(e) => {
                tracing::debug!(mmsi = %raw.mmsi, error = %e, "Digitraffic row rejected");
                report.rejected += 1;
            }
        }
    }
    report
}

/// Live adapter; no authentication required.
pub struct DigitrafficAdapter {
    client: reqwest::Client,
}

impl DigitrafficAdapter {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for DigitrafficAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl super::FeedAdapter for DigitrafficAdapter {
    fn name(&self) -> &'static str {
        "digitraffic"
    }

    async fn fetch(&self, store: &FleetStore) -> Result<serde_json::Value, FetchError> {
        let response =
            retry_request(|| self.client.get(DIGITRAFFIC_URL), &RetryPolicy::default()).await?;
        let payload = response
            .text()
            .await
            .map_err(|e| FetchError::Body(e.to_string()))?;
        let features = parse_features(&payload)?;
        let report = ingest_features(store, &features);
        store.flush().map_err(|e| FetchError::Body(e.to_string()))?;
        Ok(serde_json::json!({
            "features": features.len(),
            "accepted": report.accepted,
            "rejected": report.rejected,
        }))
    }
}
