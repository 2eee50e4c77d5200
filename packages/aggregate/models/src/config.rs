//! Engine configuration.
//!
//! Every aggregation call receives its configuration explicitly. All
//! fields have documented defaults, so an empty TOML document yields the
//! stock MODIS/VIIRS setup.

use std::collections::BTreeMap;

use fire_atlas_observation_models::Confidence;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Top-level configuration for one engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Point-detection sensors keyed by sensor id.
    pub point_sensors: BTreeMap<String, PointSensorConfig>,
    /// Gridded fire products keyed by sensor id.
    pub grid_sensors: BTreeMap<String, GridSensorConfig>,
    /// Concentration (CO) grid handling.
    pub concentration: ConcentrationConfig,
    /// Cross-sensor totals computed by the combiner.
    pub combined_metrics: Vec<CombinedMetric>,
    /// Column selection for the dataset summary.
    pub summary: SummaryConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            point_sensors: BTreeMap::from([
                ("modis".to_string(), PointSensorConfig::modis()),
                ("viirs".to_string(), PointSensorConfig::viirs()),
            ]),
            grid_sensors: BTreeMap::new(),
            concentration: ConcentrationConfig::default(),
            combined_metrics: CombinedMetric::defaults(),
            summary: SummaryConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Configuration for a point sensor, falling back to
    /// [`PointSensorConfig::default`] for unknown sensors.
    #[must_use]
    pub fn point_sensor(&self, sensor: &str) -> PointSensorConfig {
        self.point_sensors.get(sensor).cloned().unwrap_or_else(|| {
            log::debug!("No point config for sensor '{sensor}', using defaults");
            PointSensorConfig::default()
        })
    }

    /// Configuration for a gridded fire sensor, falling back to
    /// [`GridSensorConfig::default`].
    #[must_use]
    pub fn grid_sensor(&self, sensor: &str) -> GridSensorConfig {
        self.grid_sensors.get(sensor).cloned().unwrap_or_default()
    }
}

/// How a point sensor's detections are reduced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointSensorConfig {
    /// High-confidence rule. `None` means the sensor has no confidence
    /// scale and its high-confidence count is always zero.
    pub confidence: Option<ConfidenceRule>,
    /// Attributes averaged per district as `mean_<field>_<sensor>`.
    pub mean_fields: Vec<String>,
    /// Attribute-equality counts per district as `<column>_<sensor>`.
    pub class_counts: Vec<ClassCount>,
}

impl PointSensorConfig {
    /// MODIS active fires: numeric confidence, high when `>= 7`.
    #[must_use]
    pub fn modis() -> Self {
        Self {
            confidence: Some(ConfidenceRule {
                threshold: 7.0,
                comparison: Comparison::AtLeast,
                labels: BTreeMap::new(),
            }),
            mean_fields: vec!["brightness".to_string()],
            class_counts: vec![],
        }
    }

    /// VIIRS active fires: `l`/`n`/`h` labels, high when `h`.
    #[must_use]
    pub fn viirs() -> Self {
        Self {
            confidence: Some(ConfidenceRule {
                threshold: 3.0,
                comparison: Comparison::AtLeast,
                labels: BTreeMap::from([
                    ("l".to_string(), 1.0),
                    ("n".to_string(), 2.0),
                    ("h".to_string(), 3.0),
                ]),
            }),
            mean_fields: vec!["bright_ti4".to_string(), "bright_ti5".to_string()],
            class_counts: vec![ClassCount {
                column: "vegetation_fires".to_string(),
                field: "fire_type".to_string(),
                value: 0.0,
            }],
        }
    }
}

/// Direction of a threshold test.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    /// `value >= threshold`
    #[default]
    AtLeast,
    /// `value > threshold`
    GreaterThan,
    /// `value <= threshold`
    AtMost,
    /// `value < threshold`
    LessThan,
}

impl Comparison {
    /// Applies the comparison.
    #[must_use]
    pub fn test(self, value: f64, threshold: f64) -> bool {
        match self {
            Self::AtLeast => value >= threshold,
            Self::GreaterThan => value > threshold,
            Self::AtMost => value <= threshold,
            Self::LessThan => value < threshold,
        }
    }
}

/// Sensor-specific rule deciding whether a detection is high confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceRule {
    /// Threshold on the ordinal scale.
    pub threshold: f64,
    /// Direction of the comparison.
    #[serde(default)]
    pub comparison: Comparison,
    /// Ordinal value for each categorical label.
    #[serde(default)]
    pub labels: BTreeMap<String, f64>,
}

impl ConfidenceRule {
    /// Whether a detection meets the rule. Labels without an ordinal and
    /// `NaN` levels never do.
    #[must_use]
    pub fn meets(&self, confidence: &Confidence) -> bool {
        let ordinal = match confidence {
            Confidence::Level(level) => Some(*level),
            Confidence::Label(label) => self
                .labels
                .get(label)
                .or_else(|| self.labels.get(&label.to_lowercase()))
                .copied(),
        };
        ordinal.is_some_and(|v| self.comparison.test(v, self.threshold))
    }
}

/// Counts detections whose attribute equals a value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassCount {
    /// Output column stem (suffixed with the sensor).
    pub column: String,
    /// Attribute to test.
    pub field: String,
    /// Value that counts.
    pub value: f64,
}

/// Which grid cells belong to a district.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GridFootprint {
    /// Every cell whose centre lies in the district's bounding box. Over-
    /// counts for irregular polygons; downstream statistics are calibrated
    /// to it.
    #[default]
    BoundingBox,
    /// Only cells whose centre lies inside the district polygon.
    CellCenterInPolygon,
}

/// How a gridded fire product is reduced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSensorConfig {
    /// Categorical fire-mask field.
    pub mask_field: String,
    /// Mask classes strictly above this value are fire pixels.
    pub fire_class_threshold: f64,
    /// Continuous intensity field summed and averaged per district.
    pub intensity_field: String,
    /// Also emit `valid_pixels_<sensor>`.
    pub report_valid_pixels: bool,
    /// Cell membership strategy.
    pub footprint: GridFootprint,
}

impl Default for GridSensorConfig {
    fn default() -> Self {
        Self {
            mask_field: "fire_mask".to_string(),
            fire_class_threshold: 6.0,
            intensity_field: "MaxFRP".to_string(),
            report_valid_pixels: false,
            footprint: GridFootprint::BoundingBox,
        }
    }
}

/// How concentration grids are reduced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcentrationConfig {
    /// Fields to aggregate. Empty selects every field whose name contains
    /// `co` (case-insensitive).
    pub fields: Vec<String>,
    /// Cell membership strategy.
    pub footprint: GridFootprint,
}

impl ConcentrationConfig {
    /// Resolves the fields to aggregate from a grid's field names.
    #[must_use]
    pub fn select_fields<'a>(&self, available: impl Iterator<Item = &'a str>) -> Vec<String> {
        if self.fields.is_empty() {
            available
                .filter(|name| name.to_lowercase().contains("co"))
                .map(str::to_string)
                .collect()
        } else {
            self.fields.clone()
        }
    }
}

/// A cross-sensor total: `column = sum(<prefix><sensor>)` over every
/// sensor whose column is present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedMetric {
    /// Output column.
    pub column: String,
    /// Per-sensor column prefix.
    pub prefix: String,
}

impl CombinedMetric {
    /// Creates a metric.
    #[must_use]
    pub fn new(column: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            prefix: prefix.into(),
        }
    }

    /// Fire count, FRP and fire-pixel totals.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![
            Self::new("total_fires_all_sensors", "fire_count_"),
            Self::new("total_frp_all_sensors", "total_frp_"),
            Self::new("total_fire_pixels_all_sensors", "fire_pixels_"),
        ]
    }
}

/// Column selection rules for the dataset summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Prefix of per-sensor fire count columns.
    pub fire_count_prefix: String,
    /// Substring identifying FRP total columns.
    pub total_frp_marker: String,
    /// Substring (case-insensitive) identifying concentration columns.
    /// Combined with a `_mean` suffix to select per-district means.
    pub concentration_marker: String,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            fire_count_prefix: "fire_count_".to_string(),
            total_frp_marker: "total_frp".to_string(),
            concentration_marker: "co_".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config: EngineConfig = toml::from_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn toml_overrides_thresholds() {
        let config: EngineConfig = toml::from_str(
            r#"
            [point_sensors.modis]
            mean_fields = []

            [point_sensors.modis.confidence]
            threshold = 80.0
            comparison = "greater_than"

            [grid_sensors.mod14a1]
            fire_class_threshold = 7.0
            footprint = "cell_center_in_polygon"
            "#,
        )
        .unwrap();

        let modis = config.point_sensor("modis");
        let rule = modis.confidence.unwrap();
        assert!((rule.threshold - 80.0).abs() < f64::EPSILON);
        assert_eq!(rule.comparison, Comparison::GreaterThan);
        assert!(modis.mean_fields.is_empty());

        let grid = config.grid_sensor("mod14a1");
        assert!((grid.fire_class_threshold - 7.0).abs() < f64::EPSILON);
        assert_eq!(grid.footprint, GridFootprint::CellCenterInPolygon);
        assert_eq!(grid.mask_field, "fire_mask");
    }

    #[test]
    fn unknown_sensor_falls_back_to_default() {
        let config = EngineConfig::default();
        assert_eq!(config.point_sensor("goes"), PointSensorConfig::default());
        assert_eq!(config.grid_sensor("goes"), GridSensorConfig::default());
    }

    #[test]
    fn modis_rule_uses_numeric_level() {
        let rule = PointSensorConfig::modis().confidence.unwrap();
        assert!(rule.meets(&Confidence::Level(7.0)));
        assert!(rule.meets(&Confidence::Level(9.0)));
        assert!(!rule.meets(&Confidence::Level(3.0)));
        assert!(!rule.meets(&Confidence::Level(f64::NAN)));
    }

    #[test]
    fn viirs_rule_maps_labels() {
        let rule = PointSensorConfig::viirs().confidence.unwrap();
        assert!(rule.meets(&Confidence::Label("h".to_string())));
        assert!(rule.meets(&Confidence::Label("H".to_string())));
        assert!(!rule.meets(&Confidence::Label("n".to_string())));
        assert!(!rule.meets(&Confidence::Label("unknown".to_string())));
    }

    #[test]
    fn at_most_inverts_direction() {
        let rule = ConfidenceRule {
            threshold: 2.0,
            comparison: Comparison::AtMost,
            labels: BTreeMap::new(),
        };
        assert!(rule.meets(&Confidence::Level(1.0)));
        assert!(!rule.meets(&Confidence::Level(2.5)));
    }

    #[test]
    fn concentration_fields_default_to_co_names() {
        let config = ConcentrationConfig::default();
        let fields = config.select_fields(["co_total", "COSurface", "quality_flag"].into_iter());
        assert_eq!(fields, vec!["co_total", "COSurface"]);
    }
}
