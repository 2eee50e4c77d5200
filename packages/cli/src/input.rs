//! Observation file readers.
//!
//! Point detections are read from FIRMS-style CSV (`latitude`,
//! `longitude`, `frp`, `confidence`, `acq_date`, `acq_time` plus any
//! numeric attribute columns). Grids are read from JSON documents matching
//! the [`ObservationGrid`] layout.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use fire_atlas_observation_models::{Confidence, ObservationGrid, ObservationPoint, PointSet};
use thiserror::Error;

/// Columns consumed directly rather than kept as attributes.
const CORE_COLUMNS: &[&str] = &[
    "latitude",
    "longitude",
    "frp",
    "confidence",
    "acq_date",
    "acq_time",
];

/// FIRMS column names that are stored under a different attribute name.
const ATTRIBUTE_ALIASES: &[(&str, &str)] = &[("type", "fire_type")];

/// Errors raised while reading observation files.
#[derive(Debug, Error)]
pub enum InputError {
    /// A `sensor=path` argument is malformed.
    #[error("Expected SENSOR=PATH, got '{0}'")]
    InvalidSpec(String),

    /// A required CSV column is missing.
    #[error("{source_name} is missing column '{column}'")]
    MissingColumn {
        /// File or stream being read.
        source_name: String,
        /// Column name.
        column: &'static str,
    },

    /// A required value could not be parsed.
    #[error("{source_name} line {line}: invalid {column} '{value}'")]
    InvalidValue {
        /// File or stream being read.
        source_name: String,
        /// 1-based line number including the header.
        line: u64,
        /// Column name.
        column: &'static str,
        /// Raw value.
        value: String,
    },

    /// CSV reader error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parse error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Splits a `sensor=path` argument.
///
/// # Errors
///
/// Returns [`InputError::InvalidSpec`] if either side is empty.
pub fn parse_sensor_spec(spec: &str) -> Result<(String, PathBuf), InputError> {
    match spec.split_once('=') {
        Some((sensor, path)) if !sensor.trim().is_empty() && !path.trim().is_empty() => {
            Ok((sensor.trim().to_lowercase(), PathBuf::from(path.trim())))
        }
        _ => Err(InputError::InvalidSpec(spec.to_string())),
    }
}

/// Combines `acq_date` (`YYYY-MM-DD`) and `acq_time` (`HHMM`, possibly
/// without leading zeros) into a UTC timestamp.
fn acquisition_time(date: &str, time: Option<&str>) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").ok()?;
    let time = match time.map(str::trim).filter(|t| !t.is_empty()) {
        Some(raw) => {
            let hhmm: u32 = raw.parse().ok()?;
            NaiveTime::from_hms_opt(hhmm / 100, hhmm % 100, 0)?
        }
        None => NaiveTime::MIN,
    };
    Some(date.and_time(time).and_utc())
}

/// Reads a FIRMS-style CSV into a [`PointSet`].
///
/// Rows with an empty confidence get level `0`. Unparseable attribute
/// cells are skipped.
///
/// # Errors
///
/// Returns an error if a core column is missing or a coordinate, FRP or
/// date cell cannot be parsed.
pub fn read_points<R: Read>(
    sensor: &str,
    source_name: &str,
    reader: R,
) -> Result<PointSet, InputError> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();

    let column = |name: &'static str| -> Result<usize, InputError> {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| InputError::MissingColumn {
                source_name: source_name.to_string(),
                column: name,
            })
    };
    let lat_col = column("latitude")?;
    let lon_col = column("longitude")?;
    let frp_col = column("frp")?;
    let confidence_col = headers.iter().position(|h| h == "confidence");
    let date_col = headers.iter().position(|h| h == "acq_date");
    let time_col = headers.iter().position(|h| h == "acq_time");

    let attribute_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter(|(_, h)| !CORE_COLUMNS.contains(&h.as_str()))
        .map(|(i, h)| {
            let name = ATTRIBUTE_ALIASES
                .iter()
                .find(|(from, _)| from == h)
                .map_or(h.as_str(), |(_, to)| *to);
            (i, name.to_string())
        })
        .collect();

    let mut points = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let line = row as u64 + 2;
        let number = |col: usize, name: &'static str| -> Result<f64, InputError> {
            let raw = record.get(col).unwrap_or("").trim();
            raw.parse().map_err(|_| InputError::InvalidValue {
                source_name: source_name.to_string(),
                line,
                column: name,
                value: raw.to_string(),
            })
        };

        let acquired_at = match date_col.and_then(|c| record.get(c)) {
            Some(date) if !date.trim().is_empty() => Some(
                acquisition_time(date, time_col.and_then(|c| record.get(c))).ok_or_else(|| {
                    InputError::InvalidValue {
                        source_name: source_name.to_string(),
                        line,
                        column: "acq_date",
                        value: date.to_string(),
                    }
                })?,
            ),
            _ => None,
        };

        let confidence = confidence_col
            .and_then(|c| record.get(c))
            .filter(|raw| !raw.trim().is_empty())
            .map_or(Confidence::Level(0.0), Confidence::parse);

        let attributes: BTreeMap<String, f64> = attribute_cols
            .iter()
            .filter_map(|(col, name)| {
                let value = record.get(*col)?.trim().parse::<f64>().ok()?;
                Some((name.clone(), value))
            })
            .collect();

        points.push(ObservationPoint {
            longitude: number(lon_col, "longitude")?,
            latitude: number(lat_col, "latitude")?,
            frp: number(frp_col, "frp")?,
            confidence,
            acquired_at,
            attributes,
        });
    }

    log::info!("Read {} {sensor} detections from {source_name}", points.len());
    Ok(PointSet::new(sensor, points))
}

/// Reads a FIRMS-style CSV file.
///
/// # Errors
///
/// See [`read_points`].
pub fn read_points_file(sensor: &str, path: &Path) -> Result<PointSet, InputError> {
    let file = std::fs::File::open(path)?;
    read_points(sensor, &path.display().to_string(), file)
}

/// Reads an observation grid from JSON. A non-empty `sensor` overrides the
/// document's own sensor id.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn read_grid_file(sensor: Option<&str>, path: &Path) -> Result<ObservationGrid, InputError> {
    let contents = std::fs::read_to_string(path)?;
    let mut grid: ObservationGrid = serde_json::from_str(&contents)?;
    if let Some(sensor) = sensor {
        grid.sensor = sensor.to_string();
    }
    log::info!(
        "Read {} grid from {} ({} steps, {} fields)",
        grid.sensor,
        path.display(),
        grid.times.len(),
        grid.fields.len()
    );
    Ok(grid)
}
