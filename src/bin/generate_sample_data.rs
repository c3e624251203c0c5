//! Synthetic AIS sample-data generator.
//!
//! Produces a CSV of AIS broadcasts covering the scenarios the detectors
//! look for: a clean Baltic transit, a VLCC with a 26-hour export-corridor
//! gap, an STS pair holding 150 m apart for two hours, and a circle-spoofed
//! track. Useful for demos and for exercising the pipeline end to end.
//!
//! ```bash
//! cargo run --bin generate-sample-data -- --out sample_ais.csv --seed 7
//! ```

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

#[derive(Parser, Debug)]
#[command(name = "generate-sample-data")]
#[command(about = "Generate synthetic AIS sample data")]
struct CliArgs {
    /// Output CSV path
    #[arg(long, default_value = "sample_ais.csv")]
    out: PathBuf,

    /// RNG seed for reproducible output
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// First timestamp of the generated day (RFC 3339)
    #[arg(long, default_value = "2025-06-01T00:00:00Z")]
    start: DateTime<Utc>,
}

struct Row {
    mmsi: &'static str,
    ts: DateTime<Utc>,
    lat: f64,
    lon: f64,
    sog: f64,
    cog: f64,
    name: &'static str,
    vessel_type: &'static str,
    dwt: f64,
    flag: &'static str,
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    let mut rng = StdRng::seed_from_u64(args.seed);
    let jitter = Normal::new(0.0, 0.0005).context("jitter distribution")?;

    let mut rows: Vec<Row> = Vec::new();
    clean_transit(&mut rows, args.start, &mut rng, &jitter);
    vlcc_with_gap(&mut rows, args.start, &mut rng, &jitter);
    sts_pair(&mut rows, args.start, &mut rng, &jitter);
    circle_spoof(&mut rows, args.start, &mut rng);

    rows.sort_by_key(|r| r.ts);

    let mut file = std::fs::File::create(&args.out)
        .with_context(|| format!("failed to create {}", args.out.display()))?;
    writeln!(
        file,
        "MMSI,BaseDateTime,LATITUDE,LONGITUDE,Speed,Course,ShipName,vessel_type,deadweight,flag"
    )?;
    for row in &rows {
        writeln!(
            file,
            "{},{},{:.5},{:.5},{:.1},{:.1},{},{},{},{}",
            row.mmsi,
            row.ts.to_rfc3339(),
            row.lat,
            row.lon,
            row.sog,
            row.cog,
            row.name,
            row.vessel_type,
            row.dwt,
            row.flag,
        )?;
    }

    println!("wrote {} rows to {}", rows.len(), args.out.display());
    Ok(())
}

/// Aframax on a steady Danish Straits transit: no alerts expected.
fn clean_transit(
    rows: &mut Vec<Row>,
    start: DateTime<Utc>,
    rng: &mut StdRng,
    jitter: &Normal<f64>,
) {
    for i in 0..96i64 {
        let t = i as f64 / 95.0;
        rows.push(Row {
            mmsi: "219012345",
            ts: start + Duration::minutes(i * 15),
            lat: 55.0 + t * 1.8 + jitter.sample(rng),
            lon: 12.5 + t * 1.2 + jitter.sample(rng),
            sog: 11.0 + rng.gen_range(-0.5..0.5),
            cog: 32.0 + rng.gen_range(-3.0..3.0),
            name: "NORDIC TRADER",
            vessel_type: "Crude Oil Tanker",
            dwt: 105_000.0,
            flag: "DK",
        });
    }
}

/// 2001-built VLCC that goes dark for 26 hours inside the Baltic export
/// corridor: points at T+0, T+16h, then T+42h.
fn vlcc_with_gap(
    rows: &mut Vec<Row>,
    start: DateTime<Utc>,
    rng: &mut StdRng,
    jitter: &Normal<f64>,
) {
    let track = [
        (0i64, 59.6, 24.0),
        (16 * 60, 58.2, 21.5),
        (42 * 60, 56.2, 17.0),
    ];
    for (minutes, lat, lon) in track {
        rows.push(Row {
            mmsi: "636017000",
            ts: start + Duration::minutes(minutes),
            lat: lat + jitter.sample(rng),
            lon: lon + jitter.sample(rng),
            sog: 12.5 + rng.gen_range(-0.5..0.5),
            cog: 225.0,
            name: "AURORA GLORY",
            vessel_type: "Crude Oil Tanker",
            dwt: 308_000.0,
            flag: "LR",
        });
    }
}

/// Two tankers holding ~150 m apart for 2.5 hours in the Laconian Gulf.
fn sts_pair(rows: &mut Vec<Row>, start: DateTime<Utc>, rng: &mut StdRng, jitter: &Normal<f64>) {
    let anchor = start + Duration::hours(6);
    for window in 0..10i64 {
        let drift = jitter.sample(rng) * 0.1;
        rows.push(Row {
            mmsi: "273456789",
            ts: anchor + Duration::minutes(window * 15),
            lat: 36.45 + drift,
            lon: 22.85 + drift,
            sog: 0.3,
            cog: rng.gen_range(0.0..360.0),
            name: "VOLNA",
            vessel_type: "Crude Oil Tanker",
            dwt: 115_000.0,
            flag: "RU",
        });
        rows.push(Row {
            mmsi: "511234567",
            ts: anchor + Duration::minutes(window * 15) + Duration::minutes(2),
            lat: 36.4514 + drift, // ~150 m north
            lon: 22.85 + drift,
            sog: 0.2,
            cog: rng.gen_range(0.0..360.0),
            name: "SEA HARMONY",
            vessel_type: "Crude Oil Tanker",
            dwt: 112_000.0,
            flag: "PW",
        });
    }
}

/// Twelve points in a 0.01-degree cluster reporting 4 kn with random COG.
fn circle_spoof(rows: &mut Vec<Row>, start: DateTime<Utc>, rng: &mut StdRng) {
    let anchor = start + Duration::hours(2);
    for i in 0..12i64 {
        rows.push(Row {
            mmsi: "667890123",
            ts: anchor + Duration::minutes(i * 33),
            lat: 44.62 + rng.gen_range(-0.004..0.004),
            lon: 37.79 + rng.gen_range(-0.004..0.004),
            sog: 4.0 + rng.gen_range(-0.3..0.3),
            cog: rng.gen_range(0.0..360.0),
            name: "PHANTOM",
            vessel_type: "Crude Oil Tanker",
            dwt: 80_000.0,
            flag: "SL",
        });
    }
}
