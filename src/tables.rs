//! Tabular File Exchange
//!
//! CSV tables in and out of the pipeline, plus the JSON fit snapshot.
//! Reads and writes go through tokio's filesystem API; parsing is in-memory.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::error::{PipelineError, Result};
use crate::etl::{missing_columns, NormalizedObservation, Observation};
use crate::latent::{CoverageRow, LatentRow, ScoreRow};

pub const NORMALIZED_TABLE: &str = "indicators_normalized.csv";
pub const LATENTS_TABLE: &str = "latents.csv";
pub const SCORES_TABLE: &str = "M_timeseries.csv";
pub const COVERAGE_TABLE: &str = "coverage_latents_by_region.csv";
pub const WEIGHTS_FILE: &str = "weights_sigma.json";

/// A row type with a fixed column layout.
pub trait Tabular: Serialize + DeserializeOwned {
    const COLUMNS: &'static [&'static str];
}

impl Tabular for NormalizedObservation {
    const COLUMNS: &'static [&'static str] = &["region", "year", "value", "id", "norm"];
}

impl Tabular for LatentRow {
    const COLUMNS: &'static [&'static str] = &["region", "year", "kappa", "sigma", "rho", "phi"];
}

impl Tabular for ScoreRow {
    const COLUMNS: &'static [&'static str] = &["region", "year", "M_raw", "M"];
}

impl Tabular for CoverageRow {
    const COLUMNS: &'static [&'static str] = &["region", "cov_kappa", "cov_sigma", "cov_rho", "cov_phi"];
}

fn not_found_as_missing(path: &Path, e: std::io::Error) -> PipelineError {
    if e.kind() == std::io::ErrorKind::NotFound {
        PipelineError::MissingInput(path.display().to_string())
    } else {
        PipelineError::io(path, e)
    }
}

async fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| PipelineError::io(parent, e))?;
        }
    }
    Ok(())
}

/// CSV files directly under `dir`, sorted by name, README placeholders skipped.
pub async fn list_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| not_found_as_missing(dir, e))?;

    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| PipelineError::io(dir, e))? {
        let path = entry.path();
        let is_csv = path.extension().and_then(|s| s.to_str()) == Some("csv");
        let is_readme = path
            .file_name()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase().contains("README"))
            .unwrap_or(false);
        if path.is_file() && is_csv && !is_readme {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn parse_year(raw: &str) -> Option<i32> {
    if let Ok(y) = raw.parse::<i32>() {
        return Some(y);
    }
    // Some exporters write integral years as floats ("2001.0").
    let y = raw.parse::<f64>().ok()?;
    if y.is_finite() && y.fract() == 0.0 && y.abs() <= i32::MAX as f64 {
        Some(y as i32)
    } else {
        None
    }
}

/// Raw observations parsed from one file, with the count of rows dropped.
#[derive(Debug, Clone, Default)]
pub struct ParsedRaw {
    pub observations: Vec<Observation>,
    pub dropped: usize,
}

/// Parse a raw indicator table. Rows that do not parse in all four required
/// columns are dropped; a missing column is fatal.
pub fn parse_raw_indicators(content: &str, source: &str) -> Result<ParsedRaw> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers = rdr.headers()?.clone();
    let missing = missing_columns(&headers);
    if !missing.is_empty() {
        return Err(PipelineError::MissingInput(format!(
            "{}: column(s) {}",
            source,
            missing.join(", ")
        )));
    }
    let position = |name: &str| headers.iter().position(|h| h == name).unwrap_or(usize::MAX);
    let (region_col, year_col, value_col, id_col) =
        (position("region"), position("year"), position("value"), position("id"));

    let mut parsed = ParsedRaw::default();
    for record in rdr.records() {
        let Ok(record) = record else {
            parsed.dropped += 1;
            continue;
        };
        let region = record.get(region_col).filter(|s| !s.is_empty());
        let year = record.get(year_col).and_then(parse_year);
        let value = record
            .get(value_col)
            .and_then(|s| s.parse::<f64>().ok())
            .filter(|v| v.is_finite());
        let id = record.get(id_col).filter(|s| !s.is_empty());

        match (region, year, value, id) {
            (Some(region), Some(year), Some(value), Some(id)) => {
                parsed.observations.push(Observation::new(region, year, id, value));
            }
            _ => parsed.dropped += 1,
        }
    }

    debug!(
        "Parsed {} observations from {} ({} dropped)",
        parsed.observations.len(),
        source,
        parsed.dropped
    );
    Ok(parsed)
}

/// Concatenate every raw indicator file under `dir`.
///
/// Files that cannot be read are skipped with a warning; having no usable
/// file at all is fatal.
pub async fn load_raw_dir(dir: impl AsRef<Path>) -> Result<Vec<Observation>> {
    let dir = dir.as_ref();
    let files = list_csv_files(dir).await?;

    let mut observations = Vec::new();
    let mut used = 0usize;
    for path in &files {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) => {
                warn!("Skipping unreadable raw file {:?}: {}", path, e);
                continue;
            }
        };
        match parse_raw_indicators(&content, &path.display().to_string()) {
            Ok(parsed) => {
                used += 1;
                observations.extend(parsed.observations);
            }
            Err(e) => warn!("Skipping raw file {:?}: {}", path, e),
        }
    }

    if used == 0 {
        return Err(PipelineError::MissingInput(format!(
            "raw indicator files in {}",
            dir.display()
        )));
    }

    info!("Loaded {} raw observations from {} files", observations.len(), used);
    Ok(observations)
}

pub async fn write_table<T: Tabular>(path: impl AsRef<Path>, rows: &[T]) -> Result<()> {
    let path = path.as_ref();
    let mut wtr = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
    wtr.write_record(T::COLUMNS)?;
    for row in rows {
        wtr.serialize(row)?;
    }
    let bytes = wtr.into_inner().map_err(|e| PipelineError::io(path, e.into_error()))?;

    ensure_parent(path).await?;
    tokio::fs::write(path, bytes)
        .await
        .map_err(|e| PipelineError::io(path, e))?;
    info!("Wrote {} rows to {:?}", rows.len(), path);
    Ok(())
}

/// Read a table, failing with `MissingInput` when the file or any of the
/// row type's columns is absent.
pub async fn read_table<T: Tabular>(path: impl AsRef<Path>) -> Result<Vec<T>> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| not_found_as_missing(path, e))?;

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());
    let headers = rdr.headers()?.clone();
    for col in T::COLUMNS {
        if !headers.iter().any(|h| h == *col) {
            return Err(PipelineError::MissingInput(format!(
                "column '{}' in {}",
                col,
                path.display()
            )));
        }
    }

    let rows = rdr.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
    debug!("Read {} rows from {:?}", rows.len(), path);
    Ok(rows)
}

pub async fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let path = path.as_ref();
    let content = serde_json::to_string_pretty(value)?;
    ensure_parent(path).await?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| PipelineError::io(path, e))?;
    info!("Wrote {:?}", path);
    Ok(())
}

pub async fn read_json<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| not_found_as_missing(path, e))?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_drops_unparsable_rows() {
        let content = "\
region,year,value,id,source
USA,2000,1.5,GDP,wb
USA,2001.0,2.5,GDP,wb
USA,,3.5,GDP,wb
FRA,2000,n/a,GDP,wb
FRA,2000,nan,GDP,wb
,2000,1.0,GDP,wb
DEU,2000,4.0,,wb
";
        let parsed = parse_raw_indicators(content, "test.csv").unwrap();
        assert_eq!(parsed.observations.len(), 2);
        assert_eq!(parsed.observations[1].year, 2001);
        assert_eq!(parsed.dropped, 5);
    }

    #[test]
    fn test_parse_missing_column_is_fatal() {
        let err = parse_raw_indicators("region,year,value\nUSA,2000,1\n", "x.csv").unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(ref m) if m.contains("id")));
    }

    #[test]
    fn test_parse_year_forms() {
        assert_eq!(parse_year("1999"), Some(1999));
        assert_eq!(parse_year("1999.0"), Some(1999));
        assert_eq!(parse_year("1999.5"), None);
        assert_eq!(parse_year("abc"), None);
    }

    #[tokio::test]
    async fn test_latent_table_round_trip_keeps_missing_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(LATENTS_TABLE);
        let rows = vec![
            LatentRow { region: "A".into(), year: 2000, kappa: Some(0.5), sigma: None, rho: Some(1.0), phi: None },
            LatentRow { region: "B".into(), year: 2001, kappa: None, sigma: Some(0.25), rho: None, phi: Some(0.0) },
        ];
        write_table(&path, &rows).await.unwrap();

        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert!(text.starts_with("region,year,kappa,sigma,rho,phi\n"));
        assert!(text.contains("A,2000,0.5,,1.0,\n"));

        let back: Vec<LatentRow> = read_table(&path).await.unwrap();
        assert_eq!(back, rows);
    }

    #[tokio::test]
    async fn test_empty_table_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SCORES_TABLE);
        write_table::<ScoreRow>(&path, &[]).await.unwrap();
        let text = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(text.trim(), "region,year,M_raw,M");
    }

    #[tokio::test]
    async fn test_read_table_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LATENTS_TABLE);
        tokio::fs::write(&path, "region,year,kappa,sigma,rho\nA,2000,0.1,0.2,0.3\n").await.unwrap();
        let err = read_table::<LatentRow>(&path).await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(ref m) if m.contains("phi")));
    }

    #[tokio::test]
    async fn test_read_absent_file_is_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_table::<LatentRow>(dir.path().join("nope.csv")).await.unwrap_err();
        assert!(matches!(err, PipelineError::MissingInput(_)));
    }

    #[tokio::test]
    async fn test_load_raw_dir_requires_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_raw_dir(dir.path()).await,
            Err(PipelineError::MissingInput(_))
        ));
    }
}
