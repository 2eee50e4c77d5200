//! Dataset-level summary document.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::StatValue;

/// Dataset-wide roll-up of the combined per-district table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    /// Coverage and size of the district set.
    pub dataset_info: DatasetInfo,
    /// `total_fires_<sensor>`, `districts_with_fires_<sensor>` and FRP
    /// totals/means.
    pub fire_statistics: BTreeMap<String, StatValue>,
    /// `<column>_overall_mean` / `<column>_overall_std` for each
    /// concentration mean column.
    pub co_statistics: BTreeMap<String, f64>,
    /// Pearson correlation keyed `<fire column>_vs_<co column>`. Pairs
    /// where either side is constant are absent.
    pub correlations: BTreeMap<String, f64>,
}

/// District set description.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    /// Number of rows in the combined table.
    pub total_districts: usize,
    /// Number of distinct parent regions.
    pub provinces: usize,
    /// First and last observation dates.
    pub temporal_coverage: TemporalCoverage,
    /// Extent and area.
    pub spatial_coverage: SpatialCoverage,
}

/// Date range spanned by first/last observation columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TemporalCoverage {
    /// Earliest observation date, if any district saw one.
    pub start: Option<NaiveDate>,
    /// Latest observation date.
    pub end: Option<NaiveDate>,
}

/// Spatial extent of the district set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialCoverage {
    /// `[min_lon, min_lat, max_lon, max_lat]`.
    pub bbox: Option<[f64; 4]>,
    /// Sum of district areas.
    pub total_area_km2: f64,
}
