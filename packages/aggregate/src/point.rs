//! Point observation aggregation.
//!
//! Every detection is spatially joined against the [`GeometryIndex`] in
//! one batch, then grouped by district. Detections outside every polygon
//! are dropped from all statistics. Each district gets exactly one row,
//! zero-filled when it saw no detections.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use fire_atlas_aggregate_models::{PointSensorConfig, StatRow, StatTable, StatValue};
use fire_atlas_district_models::DistrictId;
use fire_atlas_observation_models::{ObservationPoint, PointSet};
use fire_atlas_spatial::GeometryIndex;

use crate::progress::{self, ProgressCallback};
use crate::{AggregateError, sensor_column};

/// Output column stems, in order, before the sensor-specific extras.
pub const POINT_COLUMN_STEMS: &[&str] = &[
    "fire_count",
    "total_frp",
    "mean_frp",
    "max_frp",
    "high_conf_fires",
    "fire_density",
    "fire_days",
    "first_fire",
    "last_fire",
];

/// Every column [`aggregate_points`] emits for `sensor`, in order.
#[must_use]
pub fn point_columns(sensor: &str, config: &PointSensorConfig) -> Vec<String> {
    POINT_COLUMN_STEMS
        .iter()
        .map(|stem| sensor_column(stem, sensor))
        .chain(
            config
                .mean_fields
                .iter()
                .map(|field| sensor_column(&format!("mean_{field}"), sensor)),
        )
        .chain(
            config
                .class_counts
                .iter()
                .map(|class| sensor_column(&class.column, sensor)),
        )
        .collect()
}

/// Assigns each detection to the district containing it, in input order.
#[must_use]
pub fn assign_points(
    index: &GeometryIndex,
    points: &[ObservationPoint],
) -> Vec<Option<DistrictId>> {
    points
        .iter()
        .map(|p| index.locate(p.longitude, p.latitude))
        .collect()
}

/// Running totals for one district.
#[derive(Debug, Clone)]
struct Accumulator {
    count: u64,
    frp_sum: f64,
    frp_max: Option<f64>,
    high_confidence: u64,
    days: BTreeSet<NaiveDate>,
    first: Option<DateTime<Utc>>,
    last: Option<DateTime<Utc>>,
    field_sums: Vec<f64>,
    class_counts: Vec<u64>,
}

impl Accumulator {
    fn new(config: &PointSensorConfig) -> Self {
        Self {
            count: 0,
            frp_sum: 0.0,
            frp_max: None,
            high_confidence: 0,
            days: BTreeSet::new(),
            first: None,
            last: None,
            field_sums: vec![0.0; config.mean_fields.len()],
            class_counts: vec![0; config.class_counts.len()],
        }
    }

    fn add(&mut self, point: &ObservationPoint, config: &PointSensorConfig) {
        self.count += 1;
        self.frp_sum += point.frp;
        self.frp_max = Some(self.frp_max.map_or(point.frp, |max| max.max(point.frp)));

        if config
            .confidence
            .as_ref()
            .is_some_and(|rule| rule.meets(&point.confidence))
        {
            self.high_confidence += 1;
        }

        if let Some(ts) = point.acquired_at {
            self.days.insert(ts.date_naive());
            self.first = Some(self.first.map_or(ts, |first| first.min(ts)));
            self.last = Some(self.last.map_or(ts, |last| last.max(ts)));
        }

        // Presence of every field was checked before the join.
        for (sum, field) in self.field_sums.iter_mut().zip(&config.mean_fields) {
            *sum += point.attribute(field).unwrap_or(0.0);
        }
        for (count, class) in self.class_counts.iter_mut().zip(&config.class_counts) {
            if point.attribute(&class.field) == Some(class.value) {
                *count += 1;
            }
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn mean(&self, sum: f64) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            sum / self.count as f64
        }
    }

    fn into_values(self, density: f64) -> Vec<StatValue> {
        let timestamp =
            |ts: Option<DateTime<Utc>>| ts.map_or(StatValue::Null, StatValue::Timestamp);

        let mut values = vec![
            StatValue::Count(self.count),
            StatValue::Real(self.frp_sum),
            StatValue::Real(self.mean(self.frp_sum)),
            StatValue::Real(self.frp_max.unwrap_or(0.0)),
            StatValue::Count(self.high_confidence),
            StatValue::Real(density),
            StatValue::Count(self.days.len() as u64),
            timestamp(self.first),
            timestamp(self.last),
        ];
        values.extend(
            self.field_sums
                .iter()
                .map(|&sum| StatValue::Real(self.mean(sum))),
        );
        values.extend(self.class_counts.iter().map(|&n| StatValue::Count(n)));
        values
    }
}

/// Rejects detections that violate the observation contract.
fn validate_points(points: &PointSet, config: &PointSensorConfig) -> Result<(), AggregateError> {
    let required: Vec<&str> = config
        .mean_fields
        .iter()
        .map(String::as_str)
        .chain(config.class_counts.iter().map(|c| c.field.as_str()))
        .collect();

    for (i, point) in points.points.iter().enumerate() {
        if !(point.frp >= 0.0 && point.frp.is_finite()) {
            return Err(AggregateError::input_shape(format!(
                "{} point {i} has invalid frp {}",
                points.sensor, point.frp
            )));
        }
        if let Some(field) = required.iter().find(|f| point.attribute(f).is_none()) {
            return Err(AggregateError::input_shape(format!(
                "{} point {i} is missing attribute '{field}'",
                points.sensor
            )));
        }
    }
    Ok(())
}

/// Reduces one sensor's detections to per-district statistics.
///
/// Columns are those of [`point_columns`]. Densities divide by
/// `area_km2` and are `0.0` for zero-area districts.
///
/// # Errors
///
/// Returns [`AggregateError::InputShape`] if a detection has a negative or
/// non-finite FRP or lacks an attribute the sensor config requires.
pub fn aggregate_points(
    index: &GeometryIndex,
    points: &PointSet,
    config: &PointSensorConfig,
    progress: &dyn ProgressCallback,
) -> Result<StatTable, AggregateError> {
    let sensor = points.sensor.as_str();
    validate_points(points, config)?;

    log::info!(
        "Aggregating {} {sensor} points onto {} districts",
        points.points.len(),
        index.len()
    );

    let assignments = assign_points(index, &points.points);

    let mut accumulators = vec![Accumulator::new(config); index.len()];
    let mut unassigned = 0_u64;
    for (point, assignment) in points.points.iter().zip(&assignments) {
        match assignment.and_then(|id| index.slot(id)) {
            Some(slot) => accumulators[slot].add(point, config),
            None => unassigned += 1,
        }
    }
    if unassigned > 0 {
        log::debug!("{unassigned} {sensor} points fell outside every district");
    }

    let columns = point_columns(sensor, config);
    let mut table = StatTable::new(sensor, columns.clone());

    progress::begin(progress, index.len(), format!("{sensor} fire aggregation"));
    for (district, acc) in index.districts().iter().zip(accumulators) {
        let density = district.density(acc.count);
        let mut row = StatRow::new(district.id);
        for (column, value) in columns.iter().zip(acc.into_values(density)) {
            row.insert(column.clone(), value);
        }
        table.push_row(row);
        progress.inc(1);
    }
    progress.finish(format!("{sensor}: {} districts", table.len()));

    Ok(table)
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone as _;
    use fire_atlas_aggregate_models::{ClassCount, CombinedMetric};
    use fire_atlas_observation_models::Confidence;

    use super::*;
    use crate::progress::NullProgress;
    use crate::combine::combine;
    use crate::testing::{point, row_of_districts, with_malformed_districts};

    fn count(table: &StatTable, id: DistrictId, column: &str) -> u64 {
        table.value(id, column).and_then(StatValue::as_count).unwrap()
    }

    fn real(table: &StatTable, id: DistrictId, column: &str) -> f64 {
        table.value(id, column).and_then(StatValue::as_f64).unwrap()
    }

    #[test]
    fn empty_point_set_zero_fills_every_district() {
        let index = row_of_districts(4);
        let set = PointSet::new("modis", vec![]);

        let table =
            aggregate_points(&index, &set, &PointSensorConfig::modis(), &NullProgress).unwrap();

        assert_eq!(table.len(), 4);
        for row in table.rows() {
            assert_eq!(row.get("fire_count_modis"), Some(&StatValue::Count(0)));
            assert_eq!(row.get("total_frp_modis"), Some(&StatValue::Real(0.0)));
            assert_eq!(row.get("max_frp_modis"), Some(&StatValue::Real(0.0)));
            assert_eq!(row.get("fire_days_modis"), Some(&StatValue::Count(0)));
            assert_eq!(row.get("first_fire_modis"), Some(&StatValue::Null));
            assert_eq!(row.get("last_fire_modis"), Some(&StatValue::Null));
            assert_eq!(row.get("mean_brightness_modis"), Some(&StatValue::Real(0.0)));
        }
    }

    #[test]
    fn row_count_matches_district_count_regardless_of_points() {
        let index = row_of_districts(3);
        for n in [0, 1, 50] {
            let points = (0..n).map(|i| point(0.5 + f64::from(i % 3), 0.5, 1.0)).collect();
            let set = PointSet::new("s", points);
            let table = aggregate_points(
                &index,
                &set,
                &PointSensorConfig::default(),
                &NullProgress,
            )
            .unwrap();
            assert_eq!(table.len(), 3);
        }
    }

    #[test]
    fn intensity_statistics_per_district() {
        let index = row_of_districts(2);
        let set = PointSet::new(
            "s",
            vec![point(0.2, 0.5, 10.0), point(0.8, 0.5, 30.0), point(1.5, 0.5, 5.0)],
        );

        let table =
            aggregate_points(&index, &set, &PointSensorConfig::default(), &NullProgress).unwrap();

        assert_eq!(count(&table, 1, "fire_count_s"), 2);
        assert!((real(&table, 1, "total_frp_s") - 40.0).abs() < 1e-12);
        assert!((real(&table, 1, "mean_frp_s") - 20.0).abs() < 1e-12);
        assert!((real(&table, 1, "max_frp_s") - 30.0).abs() < 1e-12);
        assert_eq!(count(&table, 2, "fire_count_s"), 1);
        assert!((real(&table, 2, "max_frp_s") - 5.0).abs() < 1e-12);
    }

    #[test]
    fn points_outside_every_polygon_are_not_counted() {
        let index = row_of_districts(2);
        let set = PointSet::new(
            "s",
            vec![
                point(0.5, 0.5, 1.0),
                point(50.0, 50.0, 1.0),
                point(1.5, -3.0, 1.0),
                point(1.5, 0.5, 1.0),
            ],
        );

        let table =
            aggregate_points(&index, &set, &PointSensorConfig::default(), &NullProgress).unwrap();
        let assigned: u64 = table
            .rows()
            .iter()
            .filter_map(|r| r.get("fire_count_s").and_then(StatValue::as_count))
            .sum();
        let unassigned = assign_points(&index, &set.points)
            .iter()
            .filter(|a| a.is_none())
            .count() as u64;

        assert_eq!(assigned, 2);
        assert_eq!(assigned + unassigned, set.points.len() as u64);
    }

    #[test]
    fn density_scenario_matches_counts_over_area() {
        let index = row_of_districts(5);
        let counts = [0, 10, 0, 5, 20];
        let points = counts
            .iter()
            .enumerate()
            .flat_map(|(i, &n)| (0..n).map(move |_| point(i as f64 + 0.5, 0.5, 1.0)))
            .collect();
        let set = PointSet::new("modis", points);

        let config = PointSensorConfig {
            mean_fields: vec![],
            ..PointSensorConfig::modis()
        };

        let table = aggregate_points(&index, &set, &config, &NullProgress).unwrap();
        let densities: Vec<f64> = table
            .column_f64("fire_density_modis")
            .into_iter()
            .map(Option::unwrap)
            .collect();

        assert_eq!(densities, vec![0.0, 1.0, 0.0, 0.5, 2.0]);
    }

    #[test]
    fn zero_area_district_has_zero_density() {
        let mut districts = row_of_districts(1).districts().to_vec();
        districts[0].area_km2 = 0.0;
        let index = GeometryIndex::new(districts).unwrap();
        let set = PointSet::new("s", vec![point(0.5, 0.5, 1.0)]);

        let table =
            aggregate_points(&index, &set, &PointSensorConfig::default(), &NullProgress).unwrap();

        assert_eq!(count(&table, 1, "fire_count_s"), 1);
        assert_eq!(table.value(1, "fire_density_s"), Some(&StatValue::Real(0.0)));
    }

    #[test]
    fn confidence_and_temporal_statistics() {
        let index = row_of_districts(1);
        let at = |d, h| Some(Utc.with_ymd_and_hms(2015, 9, d, h, 0, 0).unwrap());
        let mut points = vec![point(0.5, 0.5, 1.0), point(0.5, 0.5, 1.0), point(0.5, 0.5, 1.0)];
        points[0].confidence = Confidence::Label("h".to_string());
        points[0].acquired_at = at(14, 6);
        points[1].confidence = Confidence::Label("n".to_string());
        points[1].acquired_at = at(14, 18);
        points[2].confidence = Confidence::Label("h".to_string());
        points[2].acquired_at = at(2, 5);
        for p in &mut points {
            p.attributes.insert("bright_ti4".to_string(), 330.0);
            p.attributes.insert("bright_ti5".to_string(), 300.0);
            p.attributes.insert("fire_type".to_string(), 0.0);
        }
        points[1].attributes.insert("fire_type".to_string(), 2.0);
        let set = PointSet::new("viirs", points);

        let table =
            aggregate_points(&index, &set, &PointSensorConfig::viirs(), &NullProgress).unwrap();

        assert_eq!(count(&table, 1, "high_conf_fires_viirs"), 2);
        assert_eq!(count(&table, 1, "fire_days_viirs"), 2);
        assert_eq!(count(&table, 1, "vegetation_fires_viirs"), 2);
        assert!((real(&table, 1, "mean_bright_ti4_viirs") - 330.0).abs() < 1e-9);
        assert_eq!(
            table.value(1, "first_fire_viirs").and_then(StatValue::as_timestamp),
            at(2, 5).as_ref()
        );
        assert_eq!(
            table.value(1, "last_fire_viirs").and_then(StatValue::as_timestamp),
            at(14, 18).as_ref()
        );
    }

    #[test]
    fn missing_required_attribute_is_input_shape_error() {
        let index = row_of_districts(1);
        let set = PointSet::new("modis", vec![point(0.5, 0.5, 1.0)]);

        let err =
            aggregate_points(&index, &set, &PointSensorConfig::modis(), &NullProgress).unwrap_err();

        assert!(matches!(err, AggregateError::InputShape { .. }));
    }

    #[test]
    fn negative_frp_is_input_shape_error() {
        let index = row_of_districts(1);
        let set = PointSet::new("s", vec![point(0.5, 0.5, -1.0)]);

        let err = aggregate_points(
            &index,
            &set,
            &PointSensorConfig::default(),
            &NullProgress,
        )
        .unwrap_err();

        assert!(matches!(err, AggregateError::InputShape { .. }));
    }

    #[test]
    fn repeated_runs_are_identical() {
        let index = row_of_districts(3);
        let set = PointSet::new(
            "s",
            (0..30)
                .map(|i| point(f64::from(i) * 0.1, 0.5, f64::from(i) * 1.37))
                .collect(),
        );
        let config = PointSensorConfig {
            confidence: None,
            mean_fields: vec![],
            class_counts: vec![ClassCount {
                column: "odd".to_string(),
                field: "parity".to_string(),
                value: 1.0,
            }],
        };
        let set = PointSet::new(
            set.sensor,
            set.points
                .into_iter()
                .enumerate()
                .map(|(i, mut p)| {
                    p.attributes.insert("parity".to_string(), (i % 2) as f64);
                    p
                })
                .collect(),
        );

        let first = aggregate_points(&index, &set, &config, &NullProgress).unwrap();
        let second = aggregate_points(&index, &set, &config, &NullProgress).unwrap();

        assert_eq!(first, second);
        for (a, b) in first.rows().iter().zip(second.rows()) {
            for (column, value) in &a.values {
                if let (StatValue::Real(x), Some(StatValue::Real(y))) = (value, b.get(column)) {
                    assert_eq!(x.to_bits(), y.to_bits());
                }
            }
        }
    }

    #[test]
    fn malformed_districts_keep_zero_filled_rows() {
        let index = with_malformed_districts();
        let set = PointSet::new("modis", vec![point(0.2, 0.5, 5.0), point(1.5, 0.5, 3.0)]);

        let table =
            aggregate_points(&index, &set, &PointSensorConfig::default(), &NullProgress).unwrap();
        let combined = combine(&index, &[table], &CombinedMetric::defaults()).unwrap();

        assert_eq!(combined.len(), 3);
        for id in [1, 2] {
            assert_eq!(count(&combined, id, "fire_count_modis"), 0);
            assert_eq!(count(&combined, id, "total_fires_all_sensors"), 0);
            assert!(real(&combined, id, "total_frp_modis").abs() < 1e-12);
        }
        assert_eq!(count(&combined, 3, "fire_count_modis"), 1);
        assert_eq!(count(&combined, 3, "total_fires_all_sensors"), 1);
    }
}
