//! CREA voyage data import (Russian fossil-fuel shipment tracking).
//!
//! CSV contract: `imo, vessel_name, origin_port, destination_port,
//! departure, arrival, commodity, value_usd`. Voyages are matched to
//! vessels by IMO at scoring/enrichment time.

use std::io::BufRead;

use crate::ingest::parse_timestamp;
use crate::store::{FleetStore, StoreResult};
use crate::types::CreaVoyage;
use crate::util::csv_split;

/// Import CREA voyage rows. Returns `(imported, rejected)`.
pub fn import_voyages_csv<R: BufRead>(
    store: &FleetStore,
    reader: R,
) -> StoreResult<(usize, usize)> {
    let mut lines = reader.lines();
    let Some(Ok(header_line)) = lines.next() else {
        return Ok((0, 0));
    };
    let headers: Vec<String> = csv_split(&header_line)
        .iter()
        .map(|h| h.trim().to_ascii_lowercase())
        .collect();
    let column = |name: &str| headers.iter().position(|h| h == name);

    let mut imported = 0usize;
    let mut rejected = 0usize;

    for line in lines {
        let Ok(line) = line else { continue };
        if line.trim().is_empty() {
            continue;
        }
        let fields = csv_split(&line);
        let get = |name: &str| {
            column(name)
                .and_then(|i| fields.get(i))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        };

        let imo = get("imo").map(|raw| {
            raw.strip_prefix("IMO")
                .map_or_else(|| raw.clone(), |s| s.trim().to_string())
        });
        if imo
            .as_deref()
            .is_none_or(|s| s.len() != 7 || !s.bytes().all(|b| b.is_ascii_digit()))
        {
            tracing::warn!(row = %line, "rejected CREA voyage: bad IMO");
            rejected += 1;
            continue;
        }

        store.insert_crea_voyage(&CreaVoyage {
            voyage_id: store.next_id()?,
            imo,
            vessel_name: get("vessel_name"),
            origin_port: get("origin_port"),
            destination_port: get("destination_port"),
            departure_utc: get("departure").as_deref().and_then(parse_timestamp),
            arrival_utc: get("arrival").as_deref().and_then(parse_timestamp),
            commodity: get("commodity"),
            value_usd: get("value_usd").and_then(|v| v.parse().ok()),
        })?;
        imported += 1;
    }

    tracing::info!(imported, rejected, "CREA voyage import complete");
    Ok((imported, rejected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_import_voyages() {
        let store = FleetStore::temporary().unwrap();
        let csv = "\
imo,vessel_name,origin_port,destination_port,departure,arrival,commodity,value_usd\n\
9074729,OCEAN STAR,Primorsk,Fujairah,2025-05-01T00:00:00Z,2025-05-20T00:00:00Z,crude_oil,42000000\n\
badimo,BAD,,,,,,\n";
        let (imported, rejected) = import_voyages_csv(&store, Cursor::new(csv)).unwrap();
        assert_eq!(imported, 1);
        assert_eq!(rejected, 1);
        let voyages = store.crea_voyages_for_imo("9074729").unwrap();
        assert_eq!(voyages.len(), 1);
        assert_eq!(voyages[0].commodity.as_deref(), Some("crude_oil"));
        assert_eq!(voyages[0].value_usd, Some(42_000_000.0));
    }
}
