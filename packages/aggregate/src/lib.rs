#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Spatial aggregation engine.
//!
//! Reduces satellite observations onto district polygons:
//!
//! - [`point::aggregate_points`] joins active-fire detections against the
//!   [`GeometryIndex`] and summarises each district.
//! - [`grid::aggregate_fire_grid`] and
//!   [`concentration::aggregate_concentration`] subset gridded cubes to each
//!   district's footprint (bounding box by default).
//! - [`combine::combine`] left-joins the per-sensor tables onto the full
//!   district set and adds cross-sensor totals.
//! - [`summary::build_summary`] rolls the combined table up into dataset
//!   statistics and fire/CO correlations.
//!
//! Every entry point takes explicit immutable inputs and returns a new
//! table or a typed error. A district with no observations still gets a
//! zero-filled row.

pub mod combine;
pub mod concentration;
pub mod grid;
pub mod pipeline;
pub mod point;
pub mod progress;
pub mod stats;
pub mod summary;
pub mod trend;

use std::path::Path;

use fire_atlas_spatial::SpatialError;
use thiserror::Error;

pub use fire_atlas_aggregate_models::{EngineConfig, StatRow, StatTable, StatValue};
pub use fire_atlas_spatial::GeometryIndex;
pub use pipeline::{PipelineInputs, PipelineOutput, run_pipeline};

/// Errors surfaced by the aggregation entry points.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// An observation or district record lacks a required field, or a
    /// grid's fields disagree with its coordinates. The whole batch is
    /// rejected.
    #[error("Input shape error: {message}")]
    InputShape {
        /// Description of what is missing.
        message: String,
    },

    /// Building the geometry index failed.
    #[error("Spatial error: {0}")]
    Spatial(#[from] SpatialError),

    /// The configuration document could not be parsed.
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Reading the configuration file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AggregateError {
    pub(crate) fn input_shape(message: impl Into<String>) -> Self {
        Self::InputShape {
            message: message.into(),
        }
    }
}

/// Parses an [`EngineConfig`] from TOML. Missing keys take their defaults.
///
/// # Errors
///
/// Returns [`AggregateError::Config`] if the document is malformed.
pub fn config_from_toml_str(toml_str: &str) -> Result<EngineConfig, AggregateError> {
    Ok(toml::from_str(toml_str)?)
}

/// Loads an [`EngineConfig`] from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: impl AsRef<Path>) -> Result<EngineConfig, AggregateError> {
    let path = path.as_ref();
    log::info!("Loading engine config from {}", path.display());
    config_from_toml_str(&std::fs::read_to_string(path)?)
}

/// Column name for a per-sensor statistic.
#[must_use]
pub fn sensor_column(stem: &str, sensor: &str) -> String {
    format!("{stem}_{sensor}")
}
