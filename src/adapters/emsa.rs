//! EMSA / FTM banned-vessel list parsing.
//!
//! The published ban JSON carries vessels refused entry to EU ports; the
//! contract here extracts the IMO and the most recent detention date, which
//! feed the vessel PSC fields at enrichment time.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;

use crate::net::FetchError;
use crate::store::{FleetStore, StoreResult};

/// One parsed ban entry.
#[derive(Debug, Clone, PartialEq)]
pub struct BanEntry {
    pub imo: String,
    pub vessel_name: Option<String>,
    pub most_recent_detention: Option<NaiveDate>,
}

#[derive(Debug, Deserialize)]
struct RawBanRecord {
    #[serde(alias = "imo_number", alias = "IMO")]
    imo: Option<String>,
    #[serde(alias = "ship_name", alias = "name")]
    vessel_name: Option<String>,
    #[serde(default, alias = "detentions", alias = "detention_dates")]
    detention_history: Vec<String>,
    #[serde(alias = "last_detention")]
    most_recent_detention: Option<String>,
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .ok()
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw.trim())
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// Parse a ban-list JSON payload (an array of records).
pub fn parse_ban_list(payload: &str) -> Result<Vec<BanEntry>, FetchError> {
    let records: Vec<RawBanRecord> =
        serde_json::from_str(payload).map_err(|e| FetchError::Body(e.to_string()))?;

    let mut entries = Vec::new();
    for record in records {
        let Some(imo_raw) = record.imo else { continue };
        let imo = imo_raw
            .trim()
            .strip_prefix("IMO")
            .map_or_else(|| imo_raw.trim().to_string(), |s| s.trim().to_string());
        if imo.len() != 7 || !imo.bytes().all(|b| b.is_ascii_digit()) {
            tracing::warn!(imo = %imo_raw, "skipping ban entry with invalid IMO");
            continue;
        }

        let most_recent = record
            .most_recent_detention
            .as_deref()
            .and_then(parse_date)
            .into_iter()
            .chain(record.detention_history.iter().filter_map(|d| parse_date(d)))
            .max();

        entries.push(BanEntry {
            imo,
            vessel_name: record.vessel_name,
            most_recent_detention: most_recent,
        });
    }
    Ok(entries)
}

/// Apply ban entries to known vessels: set the PSC detention flag when the
/// most recent detention falls inside the last 12 months.
pub fn apply_ban_entries(
    store: &FleetStore,
    entries: &[BanEntry],
    now: DateTime<Utc>,
) -> StoreResult<usize> {
    let cutoff = now.date_naive() - chrono::Duration::days(365);
    let vessels = store.all_vessels()?;
    let mut updated = 0usize;

    for entry in entries {
        let Some(vessel) = vessels
            .iter()
            .find(|v| v.imo.as_deref() == Some(entry.imo.as_str()))
        else {
            continue;
        };
        let detained_recently = entry
            .most_recent_detention
            .is_some_and(|date| date >= cutoff);
        if detained_recently && !vessel.psc_detained_last_12m {
            let mut changed = vessel.clone();
            changed.psc_detained_last_12m = true;
            store.update_vessel(&changed)?;
            updated += 1;
        }
    }
    tracing::info!(entries = entries.len(), updated, "ban list applied");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Vessel;
    use chrono::TimeZone;

    #[test]
    fn test_parse_ban_list_strips_imo_prefix() {
        let payload = r#"[
            {"imo_number": "IMO 9074729", "ship_name": "OCEAN STAR",
             "detentions": ["2025-01-10", "2025-05-02"]},
            {"imo_number": "12345", "ship_name": "BAD"},
            {"ship_name": "NO IMO AT ALL"}
        ]"#;
        let entries = parse_ban_list(payload).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].imo, "9074729");
        assert_eq!(
            entries[0].most_recent_detention,
            NaiveDate::from_ymd_opt(2025, 5, 2)
        );
    }

    #[test]
    fn test_apply_sets_recent_detention_flag() {
        let store = FleetStore::temporary().unwrap();
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let mut vessel = Vessel::new(1, "636017000", now);
        vessel.imo = Some("9074729".into());
        store.insert_vessel(&vessel).unwrap();

        let entries = vec![BanEntry {
            imo: "9074729".into(),
            vessel_name: None,
            most_recent_detention: NaiveDate::from_ymd_opt(2025, 5, 2),
        }];
        let updated = apply_ban_entries(&store, &entries, now).unwrap();
        assert_eq!(updated, 1);
        assert!(store.vessel(1).unwrap().psc_detained_last_12m);

        // Old detentions do not flag.
        let mut old_vessel = Vessel::new(2, "273456789", now);
        old_vessel.imo = Some("9074731".into());
        store.insert_vessel(&old_vessel).unwrap();
        let stale = vec![BanEntry {
            imo: "9074731".into(),
            vessel_name: None,
            most_recent_detention: NaiveDate::from_ymd_opt(2020, 1, 1),
        }];
        assert_eq!(apply_ban_entries(&store, &stale, now).unwrap(), 0);
    }
}
