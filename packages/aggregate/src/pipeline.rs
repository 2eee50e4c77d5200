//! End-to-end aggregation run.

use fire_atlas_aggregate_models::{DatasetSummary, EngineConfig, StatTable};
use fire_atlas_observation_models::{ObservationGrid, PointSet};
use fire_atlas_spatial::GeometryIndex;

use crate::AggregateError;
use crate::combine::combine;
use crate::concentration::aggregate_concentration;
use crate::grid::aggregate_fire_grid;
use crate::point::aggregate_points;
use crate::progress::ProgressCallback;
use crate::summary::build_summary;

/// Observations for one run. Every slice may be empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineInputs<'a> {
    /// Point detections, one set per sensor.
    pub point_sets: &'a [PointSet],
    /// Gridded fire products, one per sensor.
    pub fire_grids: &'a [ObservationGrid],
    /// Concentration grids.
    pub concentration_grids: &'a [ObservationGrid],
}

/// Result of a full run.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Combined per-district table.
    pub table: StatTable,
    /// Dataset-level roll-up of `table`.
    pub summary: DatasetSummary,
}

/// Aggregates every input, combines the per-sensor tables and builds the
/// summary.
///
/// # Errors
///
/// Returns the first error from any stage. No partial output is returned.
pub fn run_pipeline(
    index: &GeometryIndex,
    inputs: &PipelineInputs<'_>,
    config: &EngineConfig,
    progress: &dyn ProgressCallback,
) -> Result<PipelineOutput, AggregateError> {
    log::info!(
        "Running aggregation: {} point sets, {} fire grids, {} concentration grids",
        inputs.point_sets.len(),
        inputs.fire_grids.len(),
        inputs.concentration_grids.len()
    );

    let mut tables = Vec::new();

    for set in inputs.point_sets {
        let sensor_config = config.point_sensor(&set.sensor);
        tables.push(aggregate_points(index, set, &sensor_config, progress)?);
    }
    for grid in inputs.fire_grids {
        let sensor_config = config.grid_sensor(&grid.sensor);
        tables.push(aggregate_fire_grid(index, grid, &sensor_config, progress)?);
    }
    for grid in inputs.concentration_grids {
        tables.push(aggregate_concentration(
            index,
            grid,
            &config.concentration,
            progress,
        )?);
    }

    let table = combine(index, &tables, &config.combined_metrics)?;
    let summary = build_summary(index, &table, &config.summary);

    Ok(PipelineOutput { table, summary })
}
