//! Gridded fire product aggregation.
//!
//! Each district's footprint is selected from the `(lat, lon)` plane by
//! coordinate value, then reduced across every time step. With the default
//! [`GridFootprint::BoundingBox`] the footprint is every cell whose centre
//! falls inside the district's bounding box (inclusive), which over-counts
//! for irregular polygons.

use fire_atlas_aggregate_models::{GridFootprint, GridSensorConfig, StatRow, StatTable, StatValue};
use fire_atlas_district_models::DistrictId;
use fire_atlas_observation_models::{GridField, ObservationGrid};
use fire_atlas_spatial::GeometryIndex;

use crate::progress::{self, ProgressCallback};
use crate::{AggregateError, sensor_column};

/// `(lat index, lon index)` pairs making up a district's footprint.
///
/// Selection is by coordinate value, so descending axes work the same as
/// ascending ones. Invalid and unknown districts have no cells.
#[must_use]
pub fn district_cells(
    index: &GeometryIndex,
    grid: &ObservationGrid,
    id: DistrictId,
    footprint: GridFootprint,
) -> Vec<(usize, usize)> {
    let Some(bbox) = index.clip_bbox(id) else {
        return Vec::new();
    };

    let rows: Vec<usize> = grid
        .lat
        .iter()
        .enumerate()
        .filter(|(_, lat)| (bbox.min_lat..=bbox.max_lat).contains(*lat))
        .map(|(i, _)| i)
        .collect();
    let cols: Vec<usize> = grid
        .lon
        .iter()
        .enumerate()
        .filter(|(_, lon)| (bbox.min_lon..=bbox.max_lon).contains(*lon))
        .map(|(j, _)| j)
        .collect();

    let cells = rows
        .iter()
        .flat_map(|&i| cols.iter().map(move |&j| (i, j)));

    match footprint {
        GridFootprint::BoundingBox => cells.collect(),
        GridFootprint::CellCenterInPolygon => cells
            .filter(|&(i, j)| index.contains(id, grid.lon[j], grid.lat[i]))
            .collect(),
    }
}

/// Checks the grid shape and returns a required field.
pub(crate) fn required_field<'a>(
    grid: &'a ObservationGrid,
    name: &str,
) -> Result<&'a GridField, AggregateError> {
    grid.field(name).ok_or_else(|| {
        AggregateError::input_shape(format!(
            "{} grid is missing field '{name}'",
            grid.sensor
        ))
    })
}

pub(crate) fn check_shape(grid: &ObservationGrid) -> Result<(), AggregateError> {
    grid.validate_shape()
        .map_err(|e| AggregateError::input_shape(format!("{} grid: {e}", grid.sensor)))
}

/// Every column [`aggregate_fire_grid`] emits for `sensor`, in order.
#[must_use]
pub fn grid_columns(sensor: &str, config: &GridSensorConfig) -> Vec<String> {
    let mut columns = vec![
        sensor_column("fire_pixels", sensor),
        sensor_column("total_frp_gridded", sensor),
        sensor_column("mean_frp_gridded", sensor),
    ];
    if config.report_valid_pixels {
        columns.push(sensor_column("valid_pixels", sensor));
    }
    columns
}

/// Reduces a gridded fire product to per-district statistics.
///
/// Fire pixels are mask cells strictly above
/// [`GridSensorConfig::fire_class_threshold`]. The intensity sum and mean
/// skip no-data cells, which are counted as valid pixels only when they
/// hold data. A footprint with no cells yields a zero-filled row.
///
/// # Errors
///
/// Returns [`AggregateError::InputShape`] if a field's length disagrees
/// with the grid coordinates or the mask or intensity field is missing.
pub fn aggregate_fire_grid(
    index: &GeometryIndex,
    grid: &ObservationGrid,
    config: &GridSensorConfig,
    progress: &dyn ProgressCallback,
) -> Result<StatTable, AggregateError> {
    let sensor = grid.sensor.as_str();
    check_shape(grid)?;
    let mask = required_field(grid, &config.mask_field)?;
    let intensity = required_field(grid, &config.intensity_field)?;

    log::info!(
        "Aggregating {sensor} grid ({} x {} x {}) onto {} districts ({} footprint)",
        grid.times.len(),
        grid.lat.len(),
        grid.lon.len(),
        index.len(),
        config.footprint,
    );

    let columns = grid_columns(sensor, config);
    let mut table = StatTable::new(sensor, columns.clone());

    progress::begin(progress, index.len(), format!("{sensor} grid aggregation"));
    for district in index.districts() {
        let cells = district_cells(index, grid, district.id, config.footprint);

        let mut fire_pixels = 0_u64;
        let mut valid = 0_u64;
        let mut frp_sum = 0.0;
        for t in 0..grid.times.len() {
            for &(i, j) in &cells {
                let idx = grid.index(t, i, j);
                if mask
                    .value(idx)
                    .is_some_and(|class| class > config.fire_class_threshold)
                {
                    fire_pixels += 1;
                }
                if let Some(frp) = intensity.value(idx) {
                    valid += 1;
                    frp_sum += frp;
                }
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let frp_mean = if valid == 0 { 0.0 } else { frp_sum / valid as f64 };

        let mut values = vec![
            StatValue::Count(fire_pixels),
            StatValue::Real(frp_sum),
            StatValue::Real(frp_mean),
        ];
        if config.report_valid_pixels {
            values.push(StatValue::Count(valid));
        }

        let mut row = StatRow::new(district.id);
        for (column, value) in columns.iter().zip(values) {
            row.insert(column.clone(), value);
        }
        table.push_row(row);
        progress.inc(1);
    }
    progress.finish(format!("{sensor}: {} districts", table.len()));

    Ok(table)
}
