//! Cross-sensor combination.
//!
//! Joins per-sensor tables on `district_id`, anchored on the full district
//! set, and derives cross-sensor totals.

use std::collections::BTreeSet;

use fire_atlas_aggregate_models::{CombinedMetric, StatRow, StatTable, StatValue};
use fire_atlas_spatial::GeometryIndex;

use crate::AggregateError;

/// Source name of the combined table.
pub const COMBINED_SOURCE: &str = "combined";

/// District descriptor columns leading every combined table.
pub const DESCRIPTOR_COLUMNS: &[&str] = &["district_name", "parent_region", "area_km2"];

/// Where one output column reads from.
struct ColumnSource<'a> {
    output: String,
    table: &'a StatTable,
    column: &'a str,
    zero: StatValue,
}

/// Zero value matching the kind of the first populated cell in a column.
fn zero_for(table: &StatTable, column: &str) -> StatValue {
    table
        .rows()
        .iter()
        .filter_map(|row| row.get(column))
        .find(|v| !matches!(v, StatValue::Null))
        .map_or(StatValue::Null, StatValue::zero_like)
}

/// Resolves output column names, qualifying collisions with the table's
/// source.
fn plan_columns(tables: &[StatTable]) -> Result<Vec<ColumnSource<'_>>, AggregateError> {
    let mut taken: BTreeSet<String> = DESCRIPTOR_COLUMNS.iter().map(ToString::to_string).collect();
    let mut plan = Vec::new();

    for table in tables {
        for column in table.columns() {
            let output = if taken.contains(column) {
                let qualified = format!("{column}_{}", table.source());
                if taken.contains(&qualified) {
                    return Err(AggregateError::input_shape(format!(
                        "column '{column}' from {} collides even when qualified as '{qualified}'",
                        table.source()
                    )));
                }
                log::debug!("Renaming colliding column {column} to {qualified}");
                qualified
            } else {
                column.clone()
            };
            taken.insert(output.clone());
            plan.push(ColumnSource {
                output,
                table,
                column,
                zero: zero_for(table, column),
            });
        }
    }

    Ok(plan)
}

/// Sums a metric's contributing columns for one row. Counts stay exact
/// integers unless a real contributes. Returns `None` when the count
/// overflows `u64`.
#[allow(clippy::cast_precision_loss)]
fn sum_metric(row: &StatRow, columns: &[String]) -> Option<StatValue> {
    let mut count = 0_u64;
    let mut real = 0.0;
    let mut any_real = false;
    for column in columns {
        match row.get(column) {
            Some(StatValue::Count(n)) => count = count.checked_add(*n)?,
            Some(StatValue::Real(x)) => {
                real += x;
                any_real = true;
            }
            _ => {}
        }
    }
    Some(if any_real {
        StatValue::Real(real + count as f64)
    } else {
        StatValue::Count(count)
    })
}

/// Left-joins every table onto the district set and adds the combined
/// metrics.
///
/// Districts missing from a table get zeros of the matching kind (`Null`
/// for timestamps). A metric column is emitted only when at least one
/// `<prefix><source>` column exists.
///
/// # Errors
///
/// Returns [`AggregateError::InputShape`] if a column name collides even
/// after qualification with its table's source, or if a combined count
/// overflows.
pub fn combine(
    index: &GeometryIndex,
    tables: &[StatTable],
    metrics: &[CombinedMetric],
) -> Result<StatTable, AggregateError> {
    let plan = plan_columns(tables)?;
    let sources: BTreeSet<&str> = tables.iter().map(StatTable::source).collect();

    let mut columns: Vec<String> = DESCRIPTOR_COLUMNS.iter().map(ToString::to_string).collect();
    columns.extend(plan.iter().map(|c| c.output.clone()));

    let mut combined = StatTable::new(COMBINED_SOURCE, columns);
    for district in index.districts() {
        let mut row = StatRow::new(district.id);
        row.insert("district_name", StatValue::Text(district.name.clone()));
        row.insert("parent_region", StatValue::Text(district.parent_region.clone()));
        row.insert("area_km2", StatValue::Real(district.area_km2));

        for source in &plan {
            let value = source
                .table
                .value(district.id, source.column)
                .cloned()
                .unwrap_or_else(|| source.zero.clone());
            row.insert(source.output.clone(), value);
        }
        combined.push_row(row);
    }

    for metric in metrics {
        let contributing: Vec<String> = sources
            .iter()
            .map(|sensor| format!("{}{sensor}", metric.prefix))
            .filter(|column| combined.has_column(column))
            .collect();
        if contributing.is_empty() {
            log::debug!("Skipping {}: no contributing columns", metric.column);
            continue;
        }
        if combined.has_column(&metric.column) {
            return Err(AggregateError::input_shape(format!(
                "combined metric '{}' collides with an existing column",
                metric.column
            )));
        }
        let values = combined
            .rows()
            .iter()
            .map(|row| {
                sum_metric(row, &contributing).ok_or_else(|| {
                    AggregateError::input_shape(format!(
                        "combined metric '{}' overflows for district {}",
                        metric.column, row.district_id
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        combined.add_column(metric.column.clone(), values);
    }

    log::info!(
        "Combined {} tables into {} rows x {} columns",
        tables.len(),
        combined.len(),
        combined.columns().len()
    );

    Ok(combined)
}

#[cfg(test)]
mod tests {
    use fire_atlas_district_models::DistrictId;

    use super::*;
    use crate::testing::row_of_districts;

    fn sensor_table(sensor: &str, rows: &[(DistrictId, u64, f64)]) -> StatTable {
        let count = format!("fire_count_{sensor}");
        let frp = format!("total_frp_{sensor}");
        let mut table = StatTable::new(sensor, vec![count.clone(), frp.clone()]);
        for &(id, n, total) in rows {
            let mut row = StatRow::new(id);
            row.insert(count.clone(), StatValue::Count(n));
            row.insert(frp.clone(), StatValue::Real(total));
            table.push_row(row);
        }
        table
    }

    #[test]
    fn left_join_keeps_every_district() {
        let index = row_of_districts(3);
        let modis = sensor_table("modis", &[(2, 4, 10.0)]);

        let combined = combine(&index, &[modis], &CombinedMetric::defaults()).unwrap();

        assert_eq!(combined.len(), 3);
        assert_eq!(combined.value(1, "fire_count_modis"), Some(&StatValue::Count(0)));
        assert_eq!(combined.value(3, "total_frp_modis"), Some(&StatValue::Real(0.0)));
        assert_eq!(
            combined.value(2, "district_name"),
            Some(&StatValue::Text("District 2".to_string()))
        );
        assert_eq!(combined.value(2, "area_km2"), Some(&StatValue::Real(10.0)));
    }

    #[test]
    fn single_sensor_totals_equal_that_sensor() {
        let index = row_of_districts(3);
        let modis = sensor_table("modis", &[(1, 3, 1.5), (2, 0, 0.0), (3, 7, 2.25)]);

        let combined = combine(&index, &[modis], &CombinedMetric::defaults()).unwrap();

        for row in combined.rows() {
            assert_eq!(row.get("total_fires_all_sensors"), row.get("fire_count_modis"));
            assert_eq!(row.get("total_frp_all_sensors"), row.get("total_frp_modis"));
        }
        assert!(!combined.has_column("fire_count_viirs"));
    }

    #[test]
    fn totals_are_exact_integer_sums() {
        let index = row_of_districts(2);
        let modis = sensor_table("modis", &[(1, 3, 1.0), (2, 9_007_199_254_740_993, 0.0)]);
        let viirs = sensor_table("viirs", &[(1, 11, 2.0)]);

        let combined = combine(&index, &[modis, viirs], &CombinedMetric::defaults()).unwrap();

        assert_eq!(combined.value(1, "total_fires_all_sensors"), Some(&StatValue::Count(14)));
        assert_eq!(
            combined.value(2, "total_fires_all_sensors"),
            Some(&StatValue::Count(9_007_199_254_740_993))
        );
        assert_eq!(combined.value(1, "total_frp_all_sensors"), Some(&StatValue::Real(3.0)));
    }

    #[test]
    fn overflowing_total_is_an_input_shape_error() {
        let index = row_of_districts(1);
        let modis = sensor_table("modis", &[(1, u64::MAX, 0.0)]);
        let viirs = sensor_table("viirs", &[(1, 1, 0.0)]);

        let err = combine(&index, &[modis, viirs], &CombinedMetric::defaults()).unwrap_err();

        let AggregateError::InputShape { message } = err else {
            panic!("expected an input shape error, got {err:?}");
        };
        assert!(message.contains("total_fires_all_sensors"));
    }

    #[test]
    fn metric_without_contributing_columns_is_omitted() {
        let index = row_of_districts(2);
        let modis = sensor_table("modis", &[(1, 1, 1.0)]);

        let combined = combine(&index, &[modis], &CombinedMetric::defaults()).unwrap();
        assert!(!combined.has_column("total_fire_pixels_all_sensors"));

        let none = combine(&index, &[], &CombinedMetric::defaults()).unwrap();
        assert_eq!(none.len(), 2);
        assert!(!none.has_column("total_fires_all_sensors"));
        assert!(!none.has_column("total_frp_all_sensors"));
    }

    #[test]
    fn colliding_columns_are_qualified_with_source() {
        let index = row_of_districts(1);
        let mut a = StatTable::new("tropomi", vec!["co_total_mean".to_string()]);
        let mut b = StatTable::new("mopitt", vec!["co_total_mean".to_string()]);
        for (table, v) in [(&mut a, 1.0), (&mut b, 2.0)] {
            let mut row = StatRow::new(1);
            row.insert("co_total_mean", StatValue::Real(v));
            table.push_row(row);
        }

        let combined = combine(&index, &[a, b], &[]).unwrap();

        assert_eq!(combined.value(1, "co_total_mean"), Some(&StatValue::Real(1.0)));
        assert_eq!(combined.value(1, "co_total_mean_mopitt"), Some(&StatValue::Real(2.0)));
    }

    #[test]
    fn missing_timestamps_join_as_null() {
        let index = row_of_districts(2);
        let mut table = StatTable::new("modis", vec!["first_fire_modis".to_string()]);
        let mut row = StatRow::new(1);
        row.insert("first_fire_modis", StatValue::Null);
        table.push_row(row);

        let combined = combine(&index, &[table], &[]).unwrap();

        assert_eq!(combined.value(2, "first_fire_modis"), Some(&StatValue::Null));
    }
}
