//! Raw file schema check.

use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::Result;
use crate::tables;

/// Columns every raw indicator file must carry.
pub const REQUIRED_COLUMNS: [&str; 4] = ["region", "year", "value", "id"];

pub fn missing_columns(headers: &csv::StringRecord) -> Vec<&'static str> {
    REQUIRED_COLUMNS
        .into_iter()
        .filter(|col| !headers.iter().any(|h| h.trim() == *col))
        .collect()
}

#[derive(Debug, Clone, Default)]
pub struct SchemaReport {
    pub checked: usize,
    pub bad: Vec<(PathBuf, String)>,
}

impl SchemaReport {
    pub fn is_ok(&self) -> bool {
        self.bad.is_empty()
    }
}

fn check_content(content: &str) -> std::result::Result<(), String> {
    let mut rdr = csv::ReaderBuilder::new().from_reader(content.as_bytes());
    let headers = rdr.headers().map_err(|e| format!("unreadable header: {}", e))?;
    let missing = missing_columns(headers);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("missing columns: {}", missing.join(", ")))
    }
}

/// Check every raw CSV under `dir`. Unreadable files count as bad.
pub async fn validate_dir(dir: impl AsRef<Path>) -> Result<SchemaReport> {
    let files = tables::list_csv_files(dir.as_ref()).await?;
    let mut report = SchemaReport::default();

    for path in files {
        report.checked += 1;
        let outcome = match tokio::fs::read_to_string(&path).await {
            Ok(content) => check_content(&content),
            Err(e) => Err(format!("failed to read: {}", e)),
        };
        if let Err(reason) = outcome {
            warn!("Schema invalid: {:?} ({})", path, reason);
            report.bad.push((path, reason));
        }
    }

    info!("Checked {} files; bad: {}", report.checked, report.bad.len());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_header_passes() {
        assert!(check_content("region,year,value,id,source\nUSA,2000,1.0,GDP,wb\n").is_ok());
    }

    #[test]
    fn test_missing_columns_named() {
        let err = check_content("region,year,val\n").unwrap_err();
        assert!(err.contains("value"));
        assert!(err.contains("id"));
        assert!(!err.contains("region"));
    }

    #[tokio::test]
    async fn test_validate_dir_skips_readme() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("good.csv"), "region,year,value,id\n").await.unwrap();
        tokio::fs::write(dir.path().join("bad.csv"), "country,year\n").await.unwrap();
        tokio::fs::write(dir.path().join("README.csv"), "notes\n").await.unwrap();

        let report = validate_dir(dir.path()).await.unwrap();
        assert_eq!(report.checked, 2);
        assert_eq!(report.bad.len(), 1);
        assert!(report.bad[0].0.ends_with("bad.csv"));
        assert!(!report.is_ok());
    }
}
