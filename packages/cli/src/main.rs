#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the fire atlas aggregation engine.
//!
//! Loads district boundaries and satellite observations from disk, runs
//! the aggregation pipeline, and writes the per-district table and the
//! dataset summary.
//!
//! Uses `indicatif-log-bridge` (via [`fire_atlas_cli_utils::init_logger`])
//! to route `log` output through `indicatif::MultiProgress` so that log
//! lines and progress bars never fight for the terminal.

mod input;

use std::path::PathBuf;
use std::time::Instant;

use clap::{Parser, Subcommand};
use fire_atlas_aggregate::{EngineConfig, PipelineInputs, load_config, run_pipeline};
use fire_atlas_cli_utils::IndicatifProgress;
use fire_atlas_export::{ExportFormat, export_all, write_summary};
use fire_atlas_spatial::GeometryIndex;
use fire_atlas_spatial::boundaries::load_districts_file;
use fire_atlas_spatial::validate::validate_boundaries;

#[derive(Parser)]
#[command(name = "fire_atlas", about = "Satellite fire and CO aggregation onto district polygons")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate observations onto districts and export the results
    Aggregate {
        /// District boundaries (`GeoJSON` feature collection)
        #[arg(long)]
        districts: PathBuf,
        /// Point detections as SENSOR=PATH to a FIRMS-style CSV (repeatable)
        #[arg(long = "points")]
        points: Vec<String>,
        /// Gridded fire product as SENSOR=PATH to a grid JSON (repeatable)
        #[arg(long = "fire-grid")]
        fire_grids: Vec<String>,
        /// Concentration grid JSON (repeatable)
        #[arg(long = "concentration")]
        concentration: Vec<PathBuf>,
        /// Engine configuration (TOML). Defaults apply when omitted
        #[arg(long)]
        config: Option<PathBuf>,
        /// Existing output directory
        #[arg(long, default_value = "output")]
        output: PathBuf,
        /// Output file stem
        #[arg(long, default_value = "district_statistics")]
        stem: String,
        /// Comma-separated export formats (csv, geojson, parquet)
        #[arg(long, default_value = "csv,geojson,parquet")]
        formats: String,
    },
    /// Report on a district boundary file without aggregating
    ValidateBoundaries {
        /// District boundaries (`GeoJSON` feature collection)
        #[arg(long)]
        districts: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = fire_atlas_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::Aggregate {
            districts,
            points,
            fire_grids,
            concentration,
            config,
            output,
            stem,
            formats,
        } => {
            let start = Instant::now();
            let formats = ExportFormat::parse_list(&formats)?;
            let config = match config {
                Some(path) => load_config(path)?,
                None => EngineConfig::default(),
            };

            let index = GeometryIndex::new(load_districts_file(&districts)?)?;

            let point_sets = points
                .iter()
                .map(|spec| {
                    let (sensor, path) = input::parse_sensor_spec(spec)?;
                    input::read_points_file(&sensor, &path)
                })
                .collect::<Result<Vec<_>, _>>()?;
            let fire_grids = fire_grids
                .iter()
                .map(|spec| {
                    let (sensor, path) = input::parse_sensor_spec(spec)?;
                    input::read_grid_file(Some(&sensor), &path)
                })
                .collect::<Result<Vec<_>, _>>()?;
            let concentration_grids = concentration
                .iter()
                .map(|path| input::read_grid_file(None, path))
                .collect::<Result<Vec<_>, _>>()?;

            let progress = IndicatifProgress::districts_bar(&multi, "Aggregating districts");
            let inputs = PipelineInputs {
                point_sets: &point_sets,
                fire_grids: &fire_grids,
                concentration_grids: &concentration_grids,
            };
            let result = run_pipeline(&index, &inputs, &config, progress.as_ref())?;

            write_summary(&result.summary, &output.join(format!("{stem}_summary.json")))?;
            let report = export_all(&result.table, &index, &output, &stem, &formats)?;
            for (format, path) in &report.written {
                log::info!("{format}: {}", path.display());
            }
            if let Some((format, e)) = report.failed {
                if !report.skipped.is_empty() {
                    log::warn!(
                        "Skipped formats: {}",
                        report
                            .skipped
                            .iter()
                            .map(ToString::to_string)
                            .collect::<Vec<_>>()
                            .join(", ")
                    );
                }
                return Err(format!("{format} export failed: {e}").into());
            }

            log::info!(
                "Aggregated {} districts in {:.1}s",
                result.table.len(),
                start.elapsed().as_secs_f64()
            );
        }
        Commands::ValidateBoundaries { districts } => {
            let index = GeometryIndex::new(load_districts_file(&districts)?)?;
            let report = validate_boundaries(&index);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}
