//! District source backed by `GeoJSON` feature collections.
//!
//! Each feature becomes one [`District`]. Property names follow the
//! standardized boundary layout (`district_id`, `district_name`,
//! `province_name`, `area_km2`), with the GADM level-2 names (`NAME_2`,
//! `NAME_1`) accepted as fallbacks.

use std::path::Path;

use fire_atlas_district_models::{District, DistrictId};
use geo::{GeodesicArea, MultiPolygon};
use geojson::{Feature, GeoJson};

use crate::SpatialError;

/// Placeholder used when a boundary feature carries no name.
pub const UNKNOWN_NAME: &str = "Unknown";

const SQUARE_METRES_PER_KM2: f64 = 1e6;

/// Reads districts from a `GeoJSON` file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or does not hold a valid
/// district feature collection.
pub fn load_districts_file(path: impl AsRef<Path>) -> Result<Vec<District>, SpatialError> {
    let path = path.as_ref();
    log::info!("Loading district boundaries from {}", path.display());
    let contents = std::fs::read_to_string(path)?;
    load_districts_geojson(&contents)
}

/// Parses districts from a `GeoJSON` `FeatureCollection` string.
///
/// Features without a `district_id` property are numbered by position.
/// Features without `area_km2` get the geodesic area of their geometry.
/// Features with missing or non-polygonal geometry are returned with an
/// empty polygon so the geometry index can tag them invalid.
///
/// # Errors
///
/// Returns an error if the document is not a feature collection or a
/// feature has neither `area_km2` nor a polygon to measure.
pub fn load_districts_geojson(geojson_str: &str) -> Result<Vec<District>, SpatialError> {
    let GeoJson::FeatureCollection(collection) = geojson_str.parse::<GeoJson>()? else {
        return Err(SpatialError::NotFeatureCollection);
    };

    collection
        .features
        .iter()
        .enumerate()
        .map(|(position, feature)| parse_district(position, feature))
        .collect()
}

fn parse_district(position: usize, feature: &Feature) -> Result<District, SpatialError> {
    let id = match feature.property("district_id") {
        Some(value) => value
            .as_u64()
            .and_then(|v| DistrictId::try_from(v).ok())
            .ok_or(SpatialError::MissingProperty {
                feature: position,
                property: "district_id",
            })?,
        None => DistrictId::try_from(position).map_err(|_| SpatialError::MissingProperty {
            feature: position,
            property: "district_id",
        })?,
    };

    let name = string_property(feature, &["district_name", "NAME_2", "name"]);
    let parent_region = string_property(feature, &["province_name", "parent_region", "NAME_1"]);

    let geometry = feature.geometry.clone().and_then(to_multipolygon);
    if geometry.is_none() {
        log::warn!("Boundary feature {position} ({name}) has no polygon geometry");
    }

    let area_km2 = match feature.property("area_km2").and_then(serde_json::Value::as_f64) {
        Some(area) => area,
        None => {
            let area = geometry
                .as_ref()
                .map(|g| g.geodesic_area_unsigned() / SQUARE_METRES_PER_KM2)
                .filter(|area| area.is_finite() && *area > 0.0)
                .ok_or(SpatialError::MissingProperty {
                    feature: position,
                    property: "area_km2",
                })?;
            log::debug!("Boundary feature {position} ({name}) has no area_km2, computed {area:.1}");
            area
        }
    };

    Ok(District {
        id,
        name,
        parent_region,
        geometry: geometry.unwrap_or_else(|| MultiPolygon(vec![])),
        area_km2,
    })
}

fn string_property(feature: &Feature, keys: &[&str]) -> String {
    keys.iter()
        .find_map(|key| feature.property(key).and_then(serde_json::Value::as_str))
        .unwrap_or(UNKNOWN_NAME)
        .to_string()
}

/// Converts a `GeoJSON` geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
fn to_multipolygon(geometry: geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}
