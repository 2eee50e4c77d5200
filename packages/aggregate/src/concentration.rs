//! Concentration (CO) grid aggregation.
//!
//! For every selected field `v` the district footprint is reduced to
//! spatial statistics over all valid cells and to a temporal series of
//! per-step spatial means, which feeds [`linear_trend`].

use fire_atlas_aggregate_models::{ConcentrationConfig, StatRow, StatTable, StatValue};
use fire_atlas_observation_models::{GridField, ObservationGrid};
use fire_atlas_spatial::GeometryIndex;

use crate::AggregateError;
use crate::grid::{check_shape, district_cells, required_field};
use crate::progress::{self, ProgressCallback};
use crate::stats::{mean, population_std, quantile};
use crate::trend::linear_trend;

/// Statistic suffixes emitted per field, in order.
pub const CONCENTRATION_STATS: &[&str] = &[
    "mean",
    "std",
    "min",
    "max",
    "median",
    "p95",
    "valid_pixels",
    "temporal_mean",
    "temporal_std",
    "temporal_trend",
];

/// Every column emitted for the given fields.
#[must_use]
pub fn concentration_columns(fields: &[String]) -> Vec<String> {
    fields
        .iter()
        .flat_map(|field| CONCENTRATION_STATS.iter().map(move |stat| format!("{field}_{stat}")))
        .collect()
}

/// Concentrations are physical amounts; zero and negative cells are
/// retrieval failures.
fn valid_concentration(field: &GridField, index: usize) -> Option<f64> {
    field.value(index).filter(|v| v.is_finite() && *v > 0.0)
}

fn field_statistics(
    grid: &ObservationGrid,
    field: &GridField,
    cells: &[(usize, usize)],
) -> Vec<StatValue> {
    let mut all = Vec::new();
    let mut series = Vec::with_capacity(grid.times.len());

    for t in 0..grid.times.len() {
        let step: Vec<f64> = cells
            .iter()
            .filter_map(|&(i, j)| valid_concentration(field, grid.index(t, i, j)))
            .collect();
        series.push(mean(&step).unwrap_or(f64::NAN));
        all.extend(step);
    }

    if all.is_empty() {
        return CONCENTRATION_STATS
            .iter()
            .map(|stat| {
                if *stat == "valid_pixels" {
                    StatValue::Count(0)
                } else {
                    StatValue::Real(0.0)
                }
            })
            .collect();
    }

    let spatial_mean = mean(&all).unwrap_or(0.0);
    let spatial_std = population_std(&all);
    all.sort_by(f64::total_cmp);
    let min = all[0];
    let max = all[all.len() - 1];
    let median = quantile(&all, 0.5).unwrap_or(0.0);
    let p95 = quantile(&all, 0.95).unwrap_or(0.0);

    let steps: Vec<f64> = series.iter().copied().filter(|v| !v.is_nan()).collect();

    vec![
        StatValue::Real(spatial_mean),
        StatValue::Real(spatial_std),
        StatValue::Real(min),
        StatValue::Real(max),
        StatValue::Real(median),
        StatValue::Real(p95),
        StatValue::Count(all.len() as u64),
        StatValue::Real(mean(&steps).unwrap_or(0.0)),
        StatValue::Real(population_std(&steps)),
        StatValue::Real(linear_trend(&series)),
    ]
}

/// Reduces a concentration grid to per-district statistics.
///
/// Fields come from [`ConcentrationConfig::select_fields`]. A cell is valid
/// when it holds data and is strictly positive. Districts with no valid
/// cells for a field get zeros for that field.
///
/// # Errors
///
/// Returns [`AggregateError::InputShape`] if the grid shape is
/// inconsistent or a configured field is absent.
pub fn aggregate_concentration(
    index: &GeometryIndex,
    grid: &ObservationGrid,
    config: &ConcentrationConfig,
    progress: &dyn ProgressCallback,
) -> Result<StatTable, AggregateError> {
    check_shape(grid)?;
    let names = config.select_fields(grid.fields.keys().map(String::as_str));
    let fields = names
        .iter()
        .map(|name| required_field(grid, name))
        .collect::<Result<Vec<_>, _>>()?;

    if names.is_empty() {
        log::warn!("{} grid has no concentration fields", grid.sensor);
    }
    log::info!(
        "Aggregating concentration fields {names:?} from {} onto {} districts",
        grid.sensor,
        index.len()
    );

    let columns = concentration_columns(&names);
    let mut table = StatTable::new(grid.sensor.clone(), columns.clone());

    progress::begin(progress, index.len(), "CO data aggregation".to_string());
    for district in index.districts() {
        let cells = district_cells(index, grid, district.id, config.footprint);
        let mut row = StatRow::new(district.id);
        let values = fields
            .iter()
            .flat_map(|field| field_statistics(grid, field, &cells));
        for (column, value) in columns.iter().zip(values) {
            row.insert(column.clone(), value);
        }
        table.push_row(row);
        progress.inc(1);
    }
    progress.finish(format!("CO: {} districts", table.len()));

    Ok(table)
}
