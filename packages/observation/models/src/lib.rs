#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Satellite observation types.
//!
//! Observation sources deliver either a [`PointSet`] (discrete active-fire
//! detections) or an [`ObservationGrid`] (a `(time, lat, lon)` cube of one
//! or more named fields) per sensor per query window. Both are immutable
//! once produced and are consumed by the aggregation engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Detection confidence on a sensor-defined scale.
///
/// MODIS reports a numeric level, VIIRS a label (`"l"`, `"n"`, `"h"`). The
/// interpretation of either is left to the sensor's aggregation config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Confidence {
    /// Numeric confidence level.
    Level(f64),
    /// Categorical confidence label.
    Label(String),
}

impl Confidence {
    /// Parses a raw confidence value, preferring the numeric form.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        trimmed
            .parse::<f64>()
            .map_or_else(|_| Self::Label(trimmed.to_string()), Self::Level)
    }
}

/// A single active-fire detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationPoint {
    /// Longitude in degrees.
    pub longitude: f64,
    /// Latitude in degrees.
    pub latitude: f64,
    /// Fire radiative power in MW (non-negative).
    pub frp: f64,
    /// Detection confidence.
    pub confidence: Confidence,
    /// Acquisition time, when the source provides one.
    pub acquired_at: Option<DateTime<Utc>>,
    /// Sensor-specific numeric attributes (e.g. `brightness`,
    /// `bright_ti4`, `fire_type`).
    #[serde(default)]
    pub attributes: BTreeMap<String, f64>,
}

impl ObservationPoint {
    /// Looks up a sensor-specific attribute.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<f64> {
        self.attributes.get(name).copied()
    }
}

/// All point detections from one sensor for one query window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointSet {
    /// Sensor identifier (e.g. `"modis"`, `"viirs"`). Used as the column
    /// suffix for every statistic derived from this set.
    pub sensor: String,
    /// Detections in source order.
    pub points: Vec<ObservationPoint>,
}

impl PointSet {
    /// Creates a point set for `sensor`.
    #[must_use]
    pub fn new(sensor: impl Into<String>, points: Vec<ObservationPoint>) -> Self {
        Self {
            sensor: sensor.into(),
            points,
        }
    }
}

/// One named field of an [`ObservationGrid`], stored row-major as
/// `[time][lat][lon]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GridField {
    /// Cell values.
    pub values: Vec<f64>,
    /// No-data sentinel. Cells equal to it are treated like `NaN`.
    #[serde(default)]
    pub fill_value: Option<f64>,
}

impl GridField {
    /// Returns the value at `index`, or `None` when the cell is `NaN`, the
    /// fill value, or out of range.
    #[must_use]
    pub fn value(&self, index: usize) -> Option<f64> {
        let value = *self.values.get(index)?;
        if value.is_nan() {
            return None;
        }
        match self.fill_value {
            Some(fill) if value == fill => None,
            _ => Some(value),
        }
    }
}

/// A gridded observation cube indexed by `(time, lat, lon)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationGrid {
    /// Sensor identifier, used as the column suffix for fire grids.
    pub sensor: String,
    /// Time coordinate.
    pub times: Vec<DateTime<Utc>>,
    /// Latitude coordinate (cell centres, any ordering).
    pub lat: Vec<f64>,
    /// Longitude coordinate (cell centres, any ordering).
    pub lon: Vec<f64>,
    /// Named fields sharing the grid's shape.
    pub fields: BTreeMap<String, GridField>,
}

impl ObservationGrid {
    /// Number of cells per field (`times * lat * lon`).
    #[must_use]
    pub fn cell_count(&self) -> usize {
        self.times.len() * self.lat.len() * self.lon.len()
    }

    /// Flat index of cell `(t, i, j)`.
    #[must_use]
    pub fn index(&self, t: usize, i: usize, j: usize) -> usize {
        (t * self.lat.len() + i) * self.lon.len() + j
    }

    /// Looks up a field by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&GridField> {
        self.fields.get(name)
    }

    /// Checks that every field holds exactly one value per cell.
    ///
    /// # Errors
    ///
    /// Returns the first field whose length disagrees with the coordinates.
    pub fn validate_shape(&self) -> Result<(), GridShapeError> {
        let expected = self.cell_count();
        for (name, field) in &self.fields {
            if field.values.len() != expected {
                return Err(GridShapeError {
                    field: name.clone(),
                    expected,
                    actual: field.values.len(),
                });
            }
        }
        Ok(())
    }
}

/// A grid field whose length does not match the grid's coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("grid field '{field}' has {actual} values, expected {expected}")]
pub struct GridShapeError {
    /// Offending field name.
    pub field: String,
    /// `times * lat * lon`.
    pub expected: usize,
    /// Actual number of values.
    pub actual: usize,
}
