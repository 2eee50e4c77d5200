//! `GeoJSON` sink: one feature per district with its polygon retained.

use std::fs::File;
use std::io::{BufWriter, Write as _};
use std::path::Path;

use fire_atlas_aggregate_models::{StatRow, StatTable};
use fire_atlas_spatial::GeometryIndex;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue};

use crate::{ExportError, check_parent};

/// `GeoJSON` geometry of a district, `None` for empty polygons.
#[must_use]
pub fn district_geometry(index: &GeometryIndex, row: &StatRow) -> Option<Geometry> {
    index
        .district(row.district_id)
        .filter(|d| !d.geometry.0.is_empty())
        .map(|d| Geometry::new(geojson::Value::from(&d.geometry)))
}

fn properties(table: &StatTable, row: &StatRow) -> Result<JsonObject, ExportError> {
    let mut props = JsonObject::new();
    props.insert(
        "district_id".to_string(),
        JsonValue::from(row.district_id),
    );
    for column in table.columns() {
        let value = match row.get(column) {
            Some(v) => serde_json::to_value(v)?,
            None => JsonValue::Null,
        };
        props.insert(column.clone(), value);
    }
    Ok(props)
}

/// Writes the table as a `GeoJSON` feature collection. Every statistic
/// becomes a feature property alongside `district_id`.
///
/// Returns the number of features written.
///
/// # Errors
///
/// Returns an error if the parent directory is missing or writing fails.
pub fn export_geojson(
    table: &StatTable,
    index: &GeometryIndex,
    path: &Path,
) -> Result<u64, ExportError> {
    check_parent(path)?;

    let features = table
        .rows()
        .iter()
        .map(|row| {
            Ok(Feature {
                bbox: None,
                geometry: district_geometry(index, row),
                id: None,
                properties: Some(properties(table, row)?),
                foreign_members: None,
            })
        })
        .collect::<Result<Vec<_>, ExportError>>()?;
    let count = features.len() as u64;

    let collection = FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    };

    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer(&mut writer, &collection)?;
    writer.flush()?;

    Ok(count)
}
