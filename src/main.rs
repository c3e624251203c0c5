//! RadianceFleet - Maritime Shadow-Fleet Anomaly Detection
//!
//! Command-line entry point for the analytical core: ingest AIS data, run
//! the discovery pipeline, and inspect results.
//!
//! # Usage
//!
//! ```bash
//! # Ingest a CSV of AIS broadcasts
//! radiance-fleet ingest data/ais_2025_06_01.csv
//!
//! # Run the full discovery pipeline over ingested data
//! radiance-fleet pipeline
//!
//! # Import a GFW detections CSV
//! radiance-fleet import-gfw-detections data/gfw_detections.csv
//!
//! # Show alert and confidence summary
//! radiance-fleet summary
//! ```
//!
//! # Environment Variables
//!
//! - `RADIANCEFLEET_DB_PATH`: database directory (default: data/radiancefleet.db)
//! - `RISK_SCORING_CONFIG`: scoring YAML path (default: config/risk_scoring.yaml)
//! - `CORRIDORS_CONFIG`: corridors YAML path (default: config/corridors.yaml)
//! - `RUST_LOG`: logging level (default: info)

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use radiance_fleet::adapters::FeedAdapter;
use radiance_fleet::config::{self, FleetConfig};
use radiance_fleet::store::FleetStore;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "radiance-fleet")]
#[command(about = "RadianceFleet maritime shadow-fleet anomaly detection")]
#[command(version)]
struct CliArgs {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest AIS broadcasts from a CSV file
    Ingest {
        /// Path to the CSV file
        path: PathBuf,
        /// Source label for dedup ranking (csv_import, terrestrial, satellite, ...)
        #[arg(long, default_value = "csv_import")]
        source: String,
    },
    /// Run the discovery pipeline over ingested data
    Pipeline {
        /// Also poll configured live feeds (GFW, AISHub, Digitraffic,
        /// Kystverket) before detection
        #[arg(long)]
        with_feeds: bool,
    },
    /// Import a GFW vessel-detections CSV (dark vessel candidates)
    ImportGfwDetections { path: PathBuf },
    /// Import a CREA voyages CSV
    ImportCreaVoyages { path: PathBuf },
    /// Ingest a downloaded NOAA daily archive (.zip or .csv.zst)
    IngestNoaaArchive { path: PathBuf },
    /// Seed corridors from the corridors YAML
    SeedCorridors,
    /// Prepare a Sentinel-1 query package for a gap event
    SatelliteCheck { gap_event_id: u64 },
    /// Show alert and confidence summary
    Summary,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = CliArgs::parse();

    let fleet_config = FleetConfig::load().context("failed to load configuration")?;
    config::init(fleet_config);
    let config = config::get();

    let store = FleetStore::open(&config.settings.database_path)
        .with_context(|| format!("failed to open store at {}", config.settings.database_path.display()))?;

    match args.command {
        Command::Ingest { path, source } => {
            let file = std::fs::File::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            let report =
                radiance_fleet::ingest::ingest_ais_csv(&store, std::io::BufReader::new(file), &source)
                    .context("ingestion failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Pipeline { with_feeds } => {
            seed_corridors(&store)?;
            let feeds: Vec<Box<dyn FeedAdapter>> = if with_feeds {
                vec![
                    Box::new(radiance_fleet::adapters::gfw::GfwGapsAdapter::new()),
                    Box::new(radiance_fleet::adapters::aishub::AishubAdapter::new()),
                    Box::new(radiance_fleet::adapters::digitraffic::DigitrafficAdapter::new()),
                    Box::new(radiance_fleet::adapters::kystverket::KystverketAdapter::default()),
                ]
            } else {
                Vec::new()
            };
            let outcome = radiance_fleet::pipeline::run_discovery(&store, &feeds).await;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
        }
        Command::ImportGfwDetections { path } => {
            let file = std::fs::File::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            let counts = radiance_fleet::adapters::gfw::import_detections_csv(
                &store,
                std::io::BufReader::new(file),
            )
            .context("GFW detections import failed")?;
            println!("{}", serde_json::to_string_pretty(&counts)?);
        }
        Command::ImportCreaVoyages { path } => {
            let file = std::fs::File::open(&path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            let (imported, rejected) = radiance_fleet::adapters::crea::import_voyages_csv(
                &store,
                std::io::BufReader::new(file),
            )
            .context("CREA import failed")?;
            println!("imported {imported}, rejected {rejected}");
        }
        Command::IngestNoaaArchive { path } => {
            let report = radiance_fleet::adapters::noaa::ingest_archive(&store, &path)
                .context("NOAA archive ingest failed")?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::SeedCorridors => {
            let seeded = seed_corridors(&store)?;
            println!("seeded {seeded} corridors");
        }
        Command::SatelliteCheck { gap_event_id } => {
            let package = radiance_fleet::satellite::prepare_satellite_check(&store, gap_event_id)
                .context("satellite check preparation failed")?;
            println!("{}", serde_json::to_string_pretty(&package)?);
        }
        Command::Summary => print_summary(&store)?,
    }

    store.flush().context("final flush failed")?;
    Ok(())
}

/// Idempotently seed corridors from the configured YAML.
fn seed_corridors(store: &FleetStore) -> Result<usize> {
    let config = config::get();
    let definitions = config::load_corridor_definitions(&config.settings.corridors_config)
        .context("failed to load corridor definitions")?;
    let mut seeded = 0usize;
    for definition in definitions {
        if store
            .corridor_by_name(&definition.name)
            .context("corridor lookup failed")?
            .is_some()
        {
            continue;
        }
        let corridor = radiance_fleet::types::Corridor {
            corridor_id: store.next_id().context("id allocation failed")?,
            name: definition.name,
            corridor_type: definition.corridor_type,
            geometry: definition.geometry,
            risk_weight: definition.risk_weight,
            is_jamming_zone: definition.is_jamming_zone,
        };
        store.insert_corridor(&corridor).context("corridor insert failed")?;
        seeded += 1;
    }
    if seeded > 0 {
        info!(seeded, "corridors seeded");
    }
    Ok(seeded)
}

fn print_summary(store: &FleetStore) -> Result<()> {
    let vessels = store.active_vessels().context("vessel listing failed")?;
    let gaps = store.all_gap_events().context("gap listing failed")?;
    let scored = gaps.iter().filter(|g| g.risk_score > 0).count();
    let critical = gaps.iter().filter(|g| g.risk_score >= 76).count();
    let outages = gaps.iter().filter(|g| g.is_feed_outage).count();
    let anomalies = store.all_anomalies().context("anomaly listing failed")?.len();
    let sts = store.all_sts_events().context("STS listing failed")?.len();
    let alerts = store.all_fleet_alerts().context("alert listing failed")?.len();

    let mut by_confidence: std::collections::BTreeMap<String, usize> = Default::default();
    for vessel in &vessels {
        if let Some(level) = vessel.dark_fleet_confidence {
            *by_confidence.entry(level.to_string()).or_default() += 1;
        }
    }

    println!("vessels:            {}", vessels.len());
    println!("gap events:         {} ({scored} scored, {critical} critical, {outages} feed-outage)", gaps.len());
    println!("spoofing anomalies: {anomalies}");
    println!("sts events:         {sts}");
    println!("fleet alerts:       {alerts}");
    println!("confidence:         {by_confidence:?}");
    Ok(())
}
