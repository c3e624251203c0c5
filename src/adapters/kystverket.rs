//! Kystverket (Norwegian Coastal Administration) live NMEA AIS feed.
//!
//! Public TCP stream covering the Barents and Norwegian Seas — the Murmansk
//! export corridor. Sentences are standard `!AIVDM` six-bit armored
//! payloads; position reports (types 1-3) are decoded and fed through the
//! normal ingest validation. Sentinel values (lat 91, lon 181, SOG 102.3,
//! COG 360, heading 511) drop to `None` before validation.

use async_trait::async_trait;
use chrono::Utc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpStream;

use crate::config;
use crate::ingest::{self, IngestReport, RawAisRow};
use crate::net::FetchError;
use crate::store::FleetStore;

/// Decoded class-A position report (message types 1-3).
#[derive(Debug, Clone, PartialEq)]
pub struct AisPositionReport {
    pub message_type: u8,
    pub mmsi: String,
    pub nav_status: Option<u8>,
    pub sog: Option<f64>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub cog: Option<f64>,
    pub heading: Option<f64>,
}

// ============================================================================
// Sentence decoding
// ============================================================================

/// Verify the `*hh` NMEA checksum (XOR of everything between `!` and `*`).
fn checksum_ok(sentence: &str) -> bool {
    let Some(body) = sentence.strip_prefix('!') else {
        return false;
    };
    let Some((payload, checksum)) = body.rsplit_once('*') else {
        return false;
    };
    let Ok(expected) = u8::from_str_radix(checksum.trim(), 16) else {
        return false;
    };
    let actual = payload.bytes().fold(0u8, |acc, b| acc ^ b);
    actual == expected
}

/// De-armor a six-bit ASCII payload into a bit vector.
fn six_bit_decode(payload: &str) -> Vec<u8> {
    let mut bits = Vec::with_capacity(payload.len() * 6);
    for byte in payload.bytes() {
        let mut value = byte.wrapping_sub(48);
        if value > 40 {
            value -= 8;
        }
        for shift in (0..6).rev() {
            bits.push((value >> shift) & 1);
        }
    }
    bits
}

fn take_u32(bits: &[u8], start: usize, len: usize) -> Option<u32> {
    if start + len > bits.len() || len > 32 {
        return None;
    }
    let mut value = 0u32;
    for &bit in &bits[start..start + len] {
        value = (value << 1) | u32::from(bit);
    }
    Some(value)
}

fn take_i32(bits: &[u8], start: usize, len: usize) -> Option<i32> {
    let raw = take_u32(bits, start, len)?;
    // Sign-extend a two's-complement field of `len` bits.
    let shift = 32 - len;
    Some(((raw << shift) as i32) >> shift)
}

/// Decode one `!AIVDM` sentence into a position report.
///
/// Returns `None` for non-position messages, multi-fragment sentences,
/// checksum failures, and short payloads.
pub fn decode_sentence(line: &str) -> Option<AisPositionReport> {
    let sentence = line.trim();
    if !sentence.starts_with("!AIVDM") && !sentence.starts_with("!AIVDO") {
        return None;
    }
    if !checksum_ok(sentence) {
        return None;
    }

    let fields: Vec<&str> = sentence.split(',').collect();
    if fields.len() < 7 {
        return None;
    }
    // Position reports fit one fragment; anything longer is another type.
    if fields[1] != "1" {
        return None;
    }
    let payload = fields[5];

    let bits = six_bit_decode(payload);
    let message_type = take_u32(&bits, 0, 6)? as u8;
    if !(1..=3).contains(&message_type) {
        return None;
    }

    let mmsi = take_u32(&bits, 8, 30)?;
    let nav_status = take_u32(&bits, 38, 4)? as u8;
    let sog_raw = take_u32(&bits, 50, 10)?;
    let lon_raw = take_i32(&bits, 61, 28)?;
    let lat_raw = take_i32(&bits, 89, 27)?;
    let cog_raw = take_u32(&bits, 116, 12)?;
    let heading_raw = take_u32(&bits, 128, 9)?;

    let lon = f64::from(lon_raw) / 600_000.0;
    let lat = f64::from(lat_raw) / 600_000.0;

    Some(AisPositionReport {
        message_type,
        mmsi: format!("{mmsi:09}"),
        nav_status: (nav_status != 15).then_some(nav_status),
        // 1023 = not available; stored in 0.1 kn units.
        sog: (sog_raw != 1023).then(|| f64::from(sog_raw) / 10.0),
        // Sentinels: lat 91, lon 181 mean "not available".
        lat: (lat.abs() <= 90.0).then_some(lat),
        lon: (lon.abs() <= 180.0).then_some(lon),
        // 3600 = not available; 0.1 degree units.
        cog: (cog_raw != 3600).then(|| f64::from(cog_raw) / 10.0),
        // 511 = not available.
        heading: (heading_raw != 511).then(|| f64::from(heading_raw)),
    })
}

// ============================================================================
// Streaming adapter
// ============================================================================

/// Live TCP adapter; reads for a bounded duration per fetch.
pub struct KystverketAdapter {
    pub duration_secs: u64,
}

impl Default for KystverketAdapter {
    fn default() -> Self {
        Self { duration_secs: 300 }
    }
}

#[async_trait]
impl super::FeedAdapter for KystverketAdapter {
    fn name(&self) -> &'static str {
        "kystverket"
    }

    async fn fetch(&self, store: &FleetStore) -> Result<serde_json::Value, FetchError> {
        let config = config::get();
        if !config.settings.kystverket_enabled {
            tracing::info!("Kystverket streaming disabled");
            return Ok(serde_json::json!({ "skipped": "disabled" }));
        }
        let address = format!(
            "{}:{}",
            config.settings.kystverket_host, config.settings.kystverket_port
        );

        let stream = TcpStream::connect(&address)
            .await
            .map_err(|e| FetchError::Body(format!("connect {address}: {e}")))?;
        tracing::info!(%address, duration_secs = self.duration_secs, "Kystverket stream connected");

        let mut lines = BufReader::new(stream).lines();
        let deadline = tokio::time::Instant::now()
            + tokio::time::Duration::from_secs(self.duration_secs);

        let mut report = IngestReport::default();
        let mut decoded = 0usize;
        let mut undecodable = 0usize;

        loop {
            let line = tokio::select! {
                () = tokio::time::sleep_until(deadline) => break,
                line = lines.next_line() => match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(error = %e, "Kystverket read error - ending batch");
                        break;
                    }
                },
            };

            let Some(position) = decode_sentence(&line) else {
                if line.trim().starts_with('!') {
                    undecodable += 1;
                }
                continue;
            };
            decoded += 1;
            ingest_report(store, &position, &mut report);
        }

        store.flush().map_err(|e| FetchError::Body(e.to_string()))?;
        tracing::info!(
            decoded,
            undecodable,
            accepted = report.accepted,
            rejected = report.rejected,
            "Kystverket batch complete"
        );
        Ok(serde_json::json!({
            "decoded": decoded,
            "undecodable": undecodable,
            "accepted": report.accepted,
            "rejected": report.rejected,
        }))
    }
}

/// Push one decoded report through row validation and ingest.
fn ingest_report(store: &FleetStore, position: &AisPositionReport, report: &mut IngestReport) {
    let raw = RawAisRow {
        mmsi: position.mmsi.clone(),
        timestamp: Utc::now().to_rfc3339(),
        lat: position.lat,
        lon: position.lon,
        sog: position.sog,
        cog: position.cog,
        heading: position.heading,
        nav_status: position.nav_status,
        source: Some("terrestrial".to_string()),
        ..RawAisRow::default()
    };
    match ingest::validate_row(&raw, Utc::now()) {
        Ok(valid) => {
            if let Err(e) = ingest::ingest_valid_row(store, &valid, report) {
                tracing::warn!(mmsi = %position.mmsi, error = %e, "Kystverket row insert failed");
            }
        }
        Err(e) => {
            tracing::debug!(mmsi = %position.mmsi, error = %e, "Kystverket row rejected");
            report.rejected += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A canonical AIVDM type-1 position report (from the public AIS test
    // corpus): MMSI 371798000, SOG 12.3 kn, position ~(-123.395, 48.381).
    const SENTENCE: &str = "!AIVDM,1,1,,A,15RTgt0PAso;90TKcjM8h6g208CQ,0*4A";

    #[test]
    fn test_decode_position_report() {
        let report = decode_sentence(SENTENCE).unwrap();
        assert_eq!(report.message_type, 1);
        assert_eq!(report.mmsi, "371798000");
        assert!((report.sog.unwrap() - 12.3).abs() < 0.05);
        assert!((report.lat.unwrap() - 48.38).abs() < 0.05);
        assert!((report.lon.unwrap() + 123.39).abs() < 0.05);
    }

    #[test]
    fn test_bad_checksum_rejected() {
        let tampered = SENTENCE.replace("*4A", "*4B");
        assert!(decode_sentence(&tampered).is_none());
    }

    #[test]
    fn test_non_aivdm_ignored() {
        assert!(decode_sentence("$GPGGA,123519,4807.038,N,...").is_none());
        assert!(decode_sentence("").is_none());
    }

    #[test]
    fn test_six_bit_decode_roundtrip() {
        // '0' => 0b000000, 'w' => 111111.
        assert_eq!(six_bit_decode("0"), vec![0, 0, 0, 0, 0, 0]);
        assert_eq!(six_bit_decode("w"), vec![1, 1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_sign_extension() {
        // Two-bit field "11" = -1.
        let bits = vec![1u8, 1];
        assert_eq!(take_i32(&bits, 0, 2), Some(-1));
        let bits = vec![0u8, 1];
        assert_eq!(take_i32(&bits, 0, 2), Some(1));
    }
}
