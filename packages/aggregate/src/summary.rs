//! Dataset-wide roll-up of the combined table.

use std::collections::{BTreeMap, BTreeSet};

use fire_atlas_aggregate_models::{
    DatasetInfo, DatasetSummary, SpatialCoverage, StatTable, StatValue, SummaryConfig,
    TemporalCoverage,
};
use fire_atlas_spatial::GeometryIndex;

use crate::stats::{mean, pearson, sample_std};

fn numeric(table: &StatTable, column: &str) -> Vec<f64> {
    table.column_f64(column).into_iter().flatten().collect()
}

fn fire_count_columns<'a>(table: &'a StatTable, config: &SummaryConfig) -> Vec<&'a str> {
    table
        .columns()
        .iter()
        .map(String::as_str)
        .filter(|c| c.starts_with(&config.fire_count_prefix))
        .collect()
}

fn concentration_mean_columns<'a>(table: &'a StatTable, config: &SummaryConfig) -> Vec<&'a str> {
    let marker = config.concentration_marker.to_lowercase();
    table
        .columns()
        .iter()
        .map(String::as_str)
        .filter(|c| {
            let lower = c.to_lowercase();
            lower.contains(&marker) && lower.contains("_mean")
        })
        .collect()
}

fn dataset_info(index: &GeometryIndex, table: &StatTable) -> DatasetInfo {
    let provinces: BTreeSet<&str> = table
        .rows()
        .iter()
        .filter_map(|row| row.get("parent_region").and_then(StatValue::as_text))
        .collect();

    let dates: Vec<_> = table
        .columns()
        .iter()
        .filter(|c| c.starts_with("first_fire_") || c.starts_with("last_fire_"))
        .flat_map(|c| table.rows().iter().filter_map(move |row| row.get(c)))
        .filter_map(StatValue::as_timestamp)
        .map(chrono::DateTime::date_naive)
        .collect();

    DatasetInfo {
        total_districts: table.len(),
        provinces: provinces.len(),
        temporal_coverage: TemporalCoverage {
            start: dates.iter().min().copied(),
            end: dates.iter().max().copied(),
        },
        spatial_coverage: SpatialCoverage {
            bbox: index.total_bounds().map(|b| b.to_array()),
            total_area_km2: index.districts().iter().map(|d| d.area_km2).sum(),
        },
    }
}

fn fire_statistics(table: &StatTable, config: &SummaryConfig) -> BTreeMap<String, StatValue> {
    let mut stats = BTreeMap::new();

    for column in fire_count_columns(table, config) {
        let sensor = &column[config.fire_count_prefix.len()..];
        let cells: Vec<&StatValue> = table.rows().iter().filter_map(|r| r.get(column)).collect();

        let total = if cells.iter().all(|v| v.as_count().is_some()) {
            StatValue::Count(cells.iter().filter_map(|v| v.as_count()).sum())
        } else {
            StatValue::Real(cells.iter().filter_map(|v| v.as_f64()).sum())
        };
        let with_fires = cells
            .iter()
            .filter(|v| v.as_f64().is_some_and(|n| n > 0.0))
            .count();

        stats.insert(format!("total_fires_{sensor}"), total);
        stats.insert(
            format!("districts_with_fires_{sensor}"),
            StatValue::Count(with_fires as u64),
        );
    }

    for column in table
        .columns()
        .iter()
        .filter(|c| c.contains(&config.total_frp_marker))
    {
        let values = numeric(table, column);
        stats.insert(
            format!("{column}_total"),
            StatValue::Real(values.iter().sum()),
        );
        stats.insert(
            format!("{column}_mean"),
            StatValue::Real(mean(&values).unwrap_or(0.0)),
        );
    }

    stats
}

fn co_statistics(table: &StatTable, config: &SummaryConfig) -> BTreeMap<String, f64> {
    let mut stats = BTreeMap::new();
    for column in concentration_mean_columns(table, config) {
        let values = numeric(table, column);
        stats.insert(
            format!("{column}_overall_mean"),
            mean(&values).unwrap_or(0.0),
        );
        stats.insert(format!("{column}_overall_std"), sample_std(&values));
    }
    stats
}

fn correlations(table: &StatTable, config: &SummaryConfig) -> BTreeMap<String, f64> {
    let mut result = BTreeMap::new();
    let co_columns = concentration_mean_columns(table, config);

    for fire in fire_count_columns(table, config) {
        let fire_values = table.column_f64(fire);
        for &co in &co_columns {
            let (xs, ys): (Vec<f64>, Vec<f64>) = fire_values
                .iter()
                .zip(table.column_f64(co))
                .filter_map(|(x, y)| Some(((*x)?, y?)))
                .filter(|(x, y)| x.is_finite() && y.is_finite())
                .unzip();
            match pearson(&xs, &ys) {
                Some(r) => {
                    result.insert(format!("{fire}_vs_{co}"), r);
                }
                None => {
                    log::debug!("No correlation for {fire} vs {co}: constant or too few values");
                }
            }
        }
    }

    result
}

/// Rolls the combined table up into dataset-level statistics.
///
/// Correlations are computed for every fire count / concentration mean
/// column pair and omitted when either side has zero variance.
#[must_use]
pub fn build_summary(
    index: &GeometryIndex,
    table: &StatTable,
    config: &SummaryConfig,
) -> DatasetSummary {
    let summary = DatasetSummary {
        dataset_info: dataset_info(index, table),
        fire_statistics: fire_statistics(table, config),
        co_statistics: co_statistics(table, config),
        correlations: correlations(table, config),
    };
    log::info!(
        "Summary: {} districts, {} fire statistics, {} correlations",
        summary.dataset_info.total_districts,
        summary.fire_statistics.len(),
        summary.correlations.len()
    );
    summary
}
