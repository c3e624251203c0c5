//! NOAA daily AIS archive client.
//!
//! Pre-2025 days ship as ZIP-compressed CSV
//! (`…/{YYYY}/AIS_{YYYY}_{MM}_{DD}.zip`); 2025 onward as
//! Zstandard-compressed CSV (`…/{YYYY}/ais-{YYYY}-{MM}-{DD}.csv.zst`).
//! Downloads stream to a temp file, are validated (ZIP central directory /
//! zstd magic), then atomically renamed so a crash never leaves a partial
//! archive in place. Multi-day imports are resumable through a `last_date`
//! cursor.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::ingest::IngestReport;
use crate::net::{retry_request, FetchError, RetryPolicy};
use crate::store::FleetStore;

const NOAA_BASE_URL: &str = "https://coast.noaa.gov/htdata/CMSP/AISDataHandler";
/// First year distributed as zstd instead of zip.
const ZSTD_CUTOVER_YEAR: i32 = 2025;
/// Zstandard frame magic number.
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Archive URL for a day, following the format cutover.
pub fn archive_url(date: NaiveDate) -> String {
    use chrono::Datelike;
    let (year, month, day) = (date.year(), date.month(), date.day());
    if year >= ZSTD_CUTOVER_YEAR {
        format!("{NOAA_BASE_URL}/{year}/ais-{year}-{month:02}-{day:02}.csv.zst")
    } else {
        format!("{NOAA_BASE_URL}/{year}/AIS_{year}_{month:02}_{day:02}.zip")
    }
}

/// Validate a downloaded archive before it is accepted.
///
/// ZIP archives must open and enumerate cleanly; zstd files must carry the
/// frame magic.
pub fn validate_archive(path: &Path) -> Result<(), FetchError> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match extension {
        "zip" => {
            let file = std::fs::File::open(path)
                .map_err(|e| FetchError::Body(format!("open {}: {e}", path.display())))?;
            let mut archive = zip::ZipArchive::new(file)
                .map_err(|e| FetchError::Body(format!("corrupt zip: {e}")))?;
            for i in 0..archive.len() {
                archive
                    .by_index(i)
                    .map_err(|e| FetchError::Body(format!("corrupt zip entry {i}: {e}")))?;
            }
            Ok(())
        }
        "zst" => {
            let mut file = std::fs::File::open(path)
                .map_err(|e| FetchError::Body(format!("open {}: {e}", path.display())))?;
            let mut magic = [0u8; 4];
            file.read_exact(&mut magic)
                .map_err(|e| FetchError::Body(format!("short zstd file: {e}")))?;
            if magic == ZSTD_MAGIC {
                Ok(())
            } else {
                Err(FetchError::Body("missing zstd magic".to_string()))
            }
        }
        other => Err(FetchError::Body(format!("unsupported archive type: {other}"))),
    }
}

/// Download one day's archive into `target_dir`, validated and atomically
/// renamed into place. Returns the final path.
pub async fn download_archive(
    client: &reqwest::Client,
    date: NaiveDate,
    target_dir: &Path,
) -> Result<PathBuf, FetchError> {
    let url = archive_url(date);
    let filename = url.rsplit('/').next().unwrap_or("archive.bin").to_string();
    let final_path = target_dir.join(&filename);
    let temp_path = target_dir.join(format!(".{filename}.partial"));

    let response = retry_request(|| client.get(&url), &RetryPolicy::default()).await?;
    let bytes = response
        .bytes()
        .await
        .map_err(|e| FetchError::Body(e.to_string()))?;

    std::fs::write(&temp_path, &bytes)
        .map_err(|e| FetchError::Body(format!("write {}: {e}", temp_path.display())))?;

    if let Err(e) = validate_archive(&temp_path) {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    std::fs::rename(&temp_path, &final_path)
        .map_err(|e| FetchError::Body(format!("rename into place: {e}")))?;
    tracing::info!(url = %url, path = %final_path.display(), "NOAA archive downloaded");
    Ok(final_path)
}

/// Ingest a validated local archive (zip or zst) through the CSV path.
pub fn ingest_archive(store: &FleetStore, path: &Path) -> Result<IngestReport, FetchError> {
    validate_archive(path)?;
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    match extension {
        "zip" => {
            let file = std::fs::File::open(path)
                .map_err(|e| FetchError::Body(e.to_string()))?;
            let mut archive =
                zip::ZipArchive::new(file).map_err(|e| FetchError::Body(e.to_string()))?;
            let mut combined = IngestReport::default();
            for i in 0..archive.len() {
                let entry = archive
                    .by_index(i)
                    .map_err(|e| FetchError::Body(e.to_string()))?;
                if !entry.name().to_ascii_lowercase().ends_with(".csv") {
                    continue;
                }
                let reader = std::io::BufReader::new(entry);
                let report = crate::ingest::ingest_ais_csv(store, reader, "csv_import")
                    .map_err(|e| FetchError::Body(e.to_string()))?;
                combined.accepted += report.accepted;
                combined.rejected += report.rejected;
                combined.replaced += report.replaced;
                combined.ignored += report.ignored;
                combined.vessels_created += report.vessels_created;
                combined.total_errors += report.total_errors;
            }
            Ok(combined)
        }
        "zst" => {
            let file = std::fs::File::open(path)
                .map_err(|e| FetchError::Body(e.to_string()))?;
            let decoder =
                zstd::Decoder::new(file).map_err(|e| FetchError::Body(e.to_string()))?;
            let reader = std::io::BufReader::new(decoder);
            crate::ingest::ingest_ais_csv(store, reader, "csv_import")
                .map_err(|e| FetchError::Body(e.to_string()))
        }
        other => Err(FetchError::Body(format!("unsupported archive type: {other}"))),
    }
}

/// Resumable multi-day import state.
///
/// Interrupted imports return `partial = true` with the cursor set to the
/// last completed day; the next invocation continues from there.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ArchiveImportCursor {
    pub last_date: Option<NaiveDate>,
    pub partial: bool,
}

impl ArchiveImportCursor {
    /// Next date to fetch within `[from, to]`, honoring the cursor.
    pub fn next_date(&self, from: NaiveDate, to: NaiveDate) -> Option<NaiveDate> {
        let candidate = match self.last_date {
            Some(last) => last.succ_opt()?,
            None => from,
        };
        (candidate <= to).then_some(candidate)
    }

    pub fn advance(&mut self, completed: NaiveDate) {
        self.last_date = Some(completed);
    }
}
