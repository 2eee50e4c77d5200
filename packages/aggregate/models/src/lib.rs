#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Per-district statistic tables and engine configuration.
//!
//! Every aggregation pass produces a [`StatTable`]: one [`StatRow`] per
//! district, keyed by [`DistrictId`], holding named scalar
//! [`StatValue`]s. Column names carry the sensor identifier as a suffix
//! (`fire_count_modis`) so tables from different sensors can be joined
//! without collisions.

pub mod config;
pub mod summary;

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use fire_atlas_district_models::DistrictId;
use serde::Serialize;

pub use config::{
    ClassCount, CombinedMetric, Comparison, ConcentrationConfig, ConfidenceRule, EngineConfig,
    GridFootprint, GridSensorConfig, PointSensorConfig, SummaryConfig,
};
pub use summary::{DatasetInfo, DatasetSummary, SpatialCoverage, TemporalCoverage};

/// A single aggregated value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatValue {
    /// Exact integer count.
    Count(u64),
    /// Real-valued statistic.
    Real(f64),
    /// Point in time.
    Timestamp(DateTime<Utc>),
    /// Free text (district descriptors).
    Text(String),
    /// No value (e.g. no observation timestamp).
    Null,
}

impl StatValue {
    /// Numeric view of counts and reals.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Count(n) => Some(*n as f64),
            Self::Real(x) => Some(*x),
            Self::Timestamp(_) | Self::Text(_) | Self::Null => None,
        }
    }

    /// The exact count, if this is a count.
    #[must_use]
    pub const fn as_count(&self) -> Option<u64> {
        match self {
            Self::Count(n) => Some(*n),
            _ => None,
        }
    }

    /// The timestamp, if this is one.
    #[must_use]
    pub const fn as_timestamp(&self) -> Option<&DateTime<Utc>> {
        match self {
            Self::Timestamp(ts) => Some(ts),
            _ => None,
        }
    }

    /// The text, if this is text.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Zero-filled value of the same kind.
    #[must_use]
    pub const fn zero_like(&self) -> Self {
        match self {
            Self::Count(_) => Self::Count(0),
            Self::Real(_) => Self::Real(0.0),
            Self::Timestamp(_) | Self::Text(_) | Self::Null => Self::Null,
        }
    }
}

impl std::fmt::Display for StatValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{n}"),
            Self::Real(x) => write!(f, "{x}"),
            Self::Timestamp(ts) => write!(f, "{}", ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
            Self::Text(s) => write!(f, "{s}"),
            Self::Null => Ok(()),
        }
    }
}

/// One district's statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatRow {
    /// Owning district.
    pub district_id: DistrictId,
    /// Column name to value.
    #[serde(flatten)]
    pub values: BTreeMap<String, StatValue>,
}

impl StatRow {
    /// Creates an empty row for a district.
    #[must_use]
    pub const fn new(district_id: DistrictId) -> Self {
        Self {
            district_id,
            values: BTreeMap::new(),
        }
    }

    /// Looks up a column value.
    #[must_use]
    pub fn get(&self, column: &str) -> Option<&StatValue> {
        self.values.get(column)
    }

    /// Sets a column value.
    pub fn insert(&mut self, column: impl Into<String>, value: StatValue) {
        self.values.insert(column.into(), value);
    }
}

/// A per-district statistic table produced by one full aggregation pass.
///
/// Rows follow district load order. Columns keep insertion order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatTable {
    source: String,
    columns: Vec<String>,
    rows: Vec<StatRow>,
    positions: BTreeMap<DistrictId, usize>,
}

impl StatTable {
    /// Creates an empty table. `source` names the sensor or dataset the
    /// statistics came from.
    #[must_use]
    pub fn new(source: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            source: source.into(),
            columns,
            rows: Vec::new(),
            positions: BTreeMap::new(),
        }
    }

    /// Sensor or dataset the table was built from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Column names in order, excluding `district_id`.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Rows in district order.
    #[must_use]
    pub fn rows(&self) -> &[StatRow] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether the table has a column.
    #[must_use]
    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Appends a row, replacing any earlier row for the same district.
    pub fn push_row(&mut self, row: StatRow) {
        if let Some(&pos) = self.positions.get(&row.district_id) {
            self.rows[pos] = row;
        } else {
            self.positions.insert(row.district_id, self.rows.len());
            self.rows.push(row);
        }
    }

    /// Looks up a district's row.
    #[must_use]
    pub fn row(&self, district_id: DistrictId) -> Option<&StatRow> {
        self.positions.get(&district_id).map(|&pos| &self.rows[pos])
    }

    /// Looks up a single value.
    #[must_use]
    pub fn value(&self, district_id: DistrictId, column: &str) -> Option<&StatValue> {
        self.row(district_id).and_then(|row| row.get(column))
    }

    /// Numeric view of a column in row order (`None` for missing or
    /// non-numeric cells).
    #[must_use]
    pub fn column_f64(&self, column: &str) -> Vec<Option<f64>> {
        self.rows
            .iter()
            .map(|row| row.get(column).and_then(StatValue::as_f64))
            .collect()
    }

    /// Adds a column, filling row `i` with `values[i]` (missing trailing
    /// values become [`StatValue::Null`]).
    pub fn add_column(&mut self, column: impl Into<String>, values: Vec<StatValue>) {
        let column = column.into();
        let mut values = values.into_iter();
        for row in &mut self.rows {
            row.insert(column.clone(), values.next().unwrap_or(StatValue::Null));
        }
        if !self.has_column(&column) {
            self.columns.push(column);
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;

    use super::*;

    fn table() -> StatTable {
        let mut table = StatTable::new("modis", vec!["fire_count_modis".to_string()]);
        for (id, count) in [(3, 4), (1, 0)] {
            let mut row = StatRow::new(id);
            row.insert("fire_count_modis", StatValue::Count(count));
            table.push_row(row);
        }
        table
    }

    #[test]
    fn rows_keep_insertion_order() {
        let t = table();
        let ids: Vec<_> = t.rows().iter().map(|r| r.district_id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(t.value(3, "fire_count_modis"), Some(&StatValue::Count(4)));
    }

    #[test]
    fn push_row_replaces_existing_district() {
        let mut t = table();
        let mut row = StatRow::new(3);
        row.insert("fire_count_modis", StatValue::Count(9));
        t.push_row(row);

        assert_eq!(t.len(), 2);
        assert_eq!(t.value(3, "fire_count_modis"), Some(&StatValue::Count(9)));
    }

    #[test]
    fn add_column_aligns_with_rows() {
        let mut t = table();
        t.add_column("fire_density_modis", vec![StatValue::Real(0.4)]);

        assert!(t.has_column("fire_density_modis"));
        assert_eq!(t.value(3, "fire_density_modis"), Some(&StatValue::Real(0.4)));
        assert_eq!(t.value(1, "fire_density_modis"), Some(&StatValue::Null));
        assert_eq!(t.column_f64("fire_density_modis"), vec![Some(0.4), None]);
    }

    #[test]
    fn display_formats_each_kind() {
        let ts = Utc.with_ymd_and_hms(2015, 9, 14, 6, 30, 0).unwrap();
        assert_eq!(StatValue::Count(7).to_string(), "7");
        assert_eq!(StatValue::Real(1.5).to_string(), "1.5");
        assert_eq!(StatValue::Timestamp(ts).to_string(), "2015-09-14T06:30:00Z");
        assert_eq!(StatValue::Null.to_string(), "");
    }

    #[test]
    fn zero_like_keeps_kind() {
        assert_eq!(StatValue::Count(5).zero_like(), StatValue::Count(0));
        assert_eq!(StatValue::Real(2.5).zero_like(), StatValue::Real(0.0));
        assert_eq!(StatValue::Text("x".into()).zero_like(), StatValue::Null);
    }
}
