#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Export sinks for the combined per-district table and the dataset
//! summary.
//!
//! Tables are written as delimited text (no geometry), `GeoJSON` (district
//! polygons retained) or Parquet (geometry as a `GeoJSON` text column,
//! written through an in-memory `DuckDB` connection). Summaries are written
//! as pretty-printed JSON.

pub mod features;
pub mod parquet;
pub mod summary;
pub mod tabular;

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use fire_atlas_aggregate_models::StatTable;
use fire_atlas_spatial::GeometryIndex;
use strum_macros::{Display, EnumString};
use thiserror::Error;

pub use features::export_geojson;
pub use parquet::export_parquet;
pub use summary::write_summary;
pub use tabular::export_csv;

/// Errors raised by the export sinks.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The target directory does not exist or is not a directory.
    #[error("Invalid output directory: {}", path.display())]
    InvalidDirectory {
        /// Offending path.
        path: PathBuf,
    },

    /// Filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Delimited-text writer error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `DuckDB` error while writing Parquet.
    #[error("Parquet error: {0}")]
    Parquet(#[from] duckdb::Error),

    /// The requested format name is not recognised.
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),
}

/// Output formats for the combined table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ExportFormat {
    /// Comma-separated values, geometry dropped.
    Csv,
    /// `GeoJSON` feature collection with district polygons.
    Geojson,
    /// Apache Parquet with geometry as `GeoJSON` text.
    Parquet,
}

impl ExportFormat {
    /// File extension for the format.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Geojson => "geojson",
            Self::Parquet => "parquet",
        }
    }

    /// Parses a comma-separated list such as `"csv,geojson"`, dropping
    /// duplicates and keeping first-seen order.
    ///
    /// # Errors
    ///
    /// Returns [`ExportError::UnsupportedFormat`] for an unknown name.
    pub fn parse_list(list: &str) -> Result<Vec<Self>, ExportError> {
        let mut seen = BTreeSet::new();
        let mut formats = Vec::new();
        for name in list.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let format: Self = name
                .to_lowercase()
                .parse()
                .map_err(|_| ExportError::UnsupportedFormat(name.to_string()))?;
            if seen.insert(format) {
                formats.push(format);
            }
        }
        Ok(formats)
    }
}

/// Fails with [`ExportError::InvalidDirectory`] unless `dir` is an
/// existing directory.
///
/// # Errors
///
/// See above.
pub fn check_directory(dir: &Path) -> Result<(), ExportError> {
    if dir.is_dir() {
        Ok(())
    } else {
        Err(ExportError::InvalidDirectory {
            path: dir.to_path_buf(),
        })
    }
}

/// Checks that the directory a file will be written into exists.
pub(crate) fn check_parent(path: &Path) -> Result<(), ExportError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => check_directory(parent),
        _ => Ok(()),
    }
}

/// Outcome of a multi-format export.
#[derive(Debug, Default)]
pub struct ExportReport {
    /// Files written, in the order requested.
    pub written: Vec<(ExportFormat, PathBuf)>,
    /// The format that failed, if any. Files already written are kept.
    pub failed: Option<(ExportFormat, ExportError)>,
    /// Formats not attempted because an earlier one failed.
    pub skipped: Vec<ExportFormat>,
}

impl ExportReport {
    /// Whether every requested format was written.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.failed.is_none()
    }
}

/// Writes `table` to `<dir>/<stem>.<ext>` for each format in order.
///
/// Stops at the first failing format. Files from earlier formats are left
/// in place and the failure is recorded in the report.
///
/// # Errors
///
/// Returns [`ExportError::InvalidDirectory`] before writing anything if
/// `dir` is not an existing directory.
pub fn export_all(
    table: &StatTable,
    index: &GeometryIndex,
    dir: &Path,
    stem: &str,
    formats: &[ExportFormat],
) -> Result<ExportReport, ExportError> {
    check_directory(dir)?;

    let mut report = ExportReport::default();
    for (i, &format) in formats.iter().enumerate() {
        let path = dir.join(format!("{stem}.{}", format.extension()));
        let result = match format {
            ExportFormat::Csv => export_csv(table, &path),
            ExportFormat::Geojson => export_geojson(table, index, &path),
            ExportFormat::Parquet => export_parquet(table, index, &path),
        };
        match result {
            Ok(rows) => {
                log::info!("Wrote {rows} rows to {}", path.display());
                report.written.push((format, path));
            }
            Err(e) => {
                log::error!("{format} export to {} failed: {e}", path.display());
                report.failed = Some((format, e));
                report.skipped = formats[i + 1..].to_vec();
                break;
            }
        }
    }

    Ok(report)
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::PathBuf;

    use fire_atlas_aggregate_models::{StatRow, StatTable, StatValue};
    use fire_atlas_district_models::District;
    use fire_atlas_spatial::GeometryIndex;
    use geo::{LineString, MultiPolygon, Polygon};

    /// Fresh scratch directory, removed by the caller.
    pub fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "fire_atlas_export_{name}_{}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    pub fn index() -> GeometryIndex {
        let districts = (1..=2)
            .map(|id: u32| {
                let x = f64::from(id - 1);
                District {
                    id,
                    name: format!("District {id}"),
                    parent_region: "Riau".to_string(),
                    geometry: MultiPolygon(vec![Polygon::new(
                        LineString::from(vec![
                            (x, 0.0),
                            (x + 1.0, 0.0),
                            (x + 1.0, 1.0),
                            (x, 1.0),
                            (x, 0.0),
                        ]),
                        vec![],
                    )]),
                    area_km2: 12.5,
                }
            })
            .collect();
        GeometryIndex::new(districts).unwrap()
    }

    pub fn table() -> StatTable {
        let columns = ["district_name", "area_km2", "fire_count_modis", "first_fire_modis"];
        let mut table =
            StatTable::new("combined", columns.iter().map(ToString::to_string).collect());
        for (id, count) in [(1, 3), (2, 0)] {
            let mut row = StatRow::new(id);
            row.insert("district_name", StatValue::Text(format!("District {id}")));
            row.insert("area_km2", StatValue::Real(12.5));
            row.insert("fire_count_modis", StatValue::Count(count));
            row.insert("first_fire_modis", StatValue::Null);
            table.push_row(row);
        }
        table
    }
}
