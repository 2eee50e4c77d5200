#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! In-memory geometry index for district attribution.
//!
//! Builds an R-tree over the district polygons once per run and answers
//! point-in-polygon lookups for point observations and bounding-box
//! queries for gridded observations. Districts with unusable geometry are
//! kept (so they still receive zero-filled statistics) but never match a
//! spatial query.

pub mod boundaries;
pub mod validate;

use std::collections::{BTreeMap, BTreeSet};

use fire_atlas_district_models::{BoundingBox, District, DistrictId};
use geo::{BoundingRect, Contains, MultiPolygon, Validation};
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;

pub use fire_atlas_district_models;

/// Errors raised while loading districts or building the index.
#[derive(Debug, Error)]
pub enum SpatialError {
    /// Two districts share the same identifier.
    #[error("Duplicate district id {0}")]
    DuplicateDistrict(DistrictId),

    /// A district area is negative or not a number.
    #[error("District {id} has invalid area {area_km2}")]
    InvalidArea {
        /// District identifier.
        id: DistrictId,
        /// Offending area.
        area_km2: f64,
    },

    /// A boundary feature is missing a required property.
    #[error("Boundary feature {feature} is missing property '{property}'")]
    MissingProperty {
        /// Feature position in the collection.
        feature: usize,
        /// Property name.
        property: &'static str,
    },

    /// The boundary document is not valid `GeoJSON`.
    #[error("GeoJSON error: {0}")]
    GeoJson(#[from] geojson::Error),

    /// The boundary document is `GeoJSON` but not a feature collection.
    #[error("Expected a GeoJSON FeatureCollection")]
    NotFeatureCollection,

    /// Reading the boundary file failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// A valid district polygon stored in the R-tree.
struct BoundaryEntry {
    slot: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for BoundaryEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built spatial index over a fixed set of districts.
///
/// Constructed once per run and shared read-only by every aggregation
/// step.
pub struct GeometryIndex {
    districts: Vec<District>,
    slots: BTreeMap<DistrictId, usize>,
    bboxes: Vec<Option<BoundingBox>>,
    tree: RTree<BoundaryEntry>,
    invalid: BTreeSet<DistrictId>,
}

impl GeometryIndex {
    /// Builds the index, tagging districts with empty or malformed
    /// polygons as invalid.
    ///
    /// # Errors
    ///
    /// Returns an error if two districts share an id or an area is
    /// negative or `NaN`.
    pub fn new(districts: Vec<District>) -> Result<Self, SpatialError> {
        let mut slots = BTreeMap::new();
        let mut bboxes = Vec::with_capacity(districts.len());
        let mut entries = Vec::new();
        let mut invalid = BTreeSet::new();

        for (slot, district) in districts.iter().enumerate() {
            if slots.insert(district.id, slot).is_some() {
                return Err(SpatialError::DuplicateDistrict(district.id));
            }
            if district.area_km2.is_nan() || district.area_km2 < 0.0 {
                return Err(SpatialError::InvalidArea {
                    id: district.id,
                    area_km2: district.area_km2,
                });
            }

            let bbox = compute_bbox(&district.geometry);
            bboxes.push(bbox);

            match (bbox, geometry_problem(&district.geometry)) {
                (Some(bbox), None) => entries.push(BoundaryEntry {
                    slot,
                    envelope: AABB::from_corners(
                        [bbox.min_lon, bbox.min_lat],
                        [bbox.max_lon, bbox.max_lat],
                    ),
                }),
                (_, problem) => {
                    log::warn!(
                        "District {} ({}) has unusable geometry: {}; excluding it from spatial queries",
                        district.id,
                        district.name,
                        problem.unwrap_or("empty polygon"),
                    );
                    invalid.insert(district.id);
                }
            }
        }

        let tree = RTree::bulk_load(entries);
        log::info!(
            "Loaded {} districts into geometry index ({} invalid)",
            districts.len(),
            invalid.len()
        );

        Ok(Self {
            districts,
            slots,
            bboxes,
            tree,
            invalid,
        })
    }

    /// All districts in load order, valid or not.
    #[must_use]
    pub fn districts(&self) -> &[District] {
        &self.districts
    }

    /// Number of districts, valid or not.
    #[must_use]
    pub fn len(&self) -> usize {
        self.districts.len()
    }

    /// Whether the index holds no districts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.districts.is_empty()
    }

    /// Looks up a district by id.
    #[must_use]
    pub fn district(&self, id: DistrictId) -> Option<&District> {
        self.slots.get(&id).map(|&slot| &self.districts[slot])
    }

    /// Position of a district in [`Self::districts`].
    #[must_use]
    pub fn slot(&self, id: DistrictId) -> Option<usize> {
        self.slots.get(&id).copied()
    }

    /// Whether the district was excluded from spatial queries.
    #[must_use]
    pub fn is_invalid(&self, id: DistrictId) -> bool {
        self.invalid.contains(&id)
    }

    /// Ids of every district excluded from spatial queries.
    #[must_use]
    pub const fn invalid_districts(&self) -> &BTreeSet<DistrictId> {
        &self.invalid
    }

    /// Finds the district containing a point.
    ///
    /// Boundaries are exclusive. Where polygons overlap, the smallest
    /// district wins, then the lowest id.
    #[must_use]
    pub fn locate(&self, lon: f64, lat: f64) -> Option<DistrictId> {
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }

        let point = geo::Point::new(lon, lat);
        let query_env = AABB::from_point([lon, lat]);

        let mut best: Option<&District> = None;

        for entry in self.tree.locate_in_envelope_intersecting(&query_env) {
            let district = &self.districts[entry.slot];
            if !district.geometry.contains(&point) {
                continue;
            }
            match best {
                None => best = Some(district),
                Some(current)
                    if (district.area_km2, district.id) < (current.area_km2, current.id) =>
                {
                    best = Some(district);
                }
                _ => {}
            }
        }

        best.map(|d| d.id)
    }

    /// Whether a specific valid district contains the point.
    #[must_use]
    pub fn contains(&self, id: DistrictId, lon: f64, lat: f64) -> bool {
        if self.invalid.contains(&id) {
            return false;
        }
        self.district(id)
            .is_some_and(|d| d.geometry.contains(&geo::Point::new(lon, lat)))
    }

    /// Axis-aligned bounding box of a valid district's polygon.
    ///
    /// Returns `None` for unknown or invalid districts.
    #[must_use]
    pub fn clip_bbox(&self, id: DistrictId) -> Option<BoundingBox> {
        if self.invalid.contains(&id) {
            return None;
        }
        self.slots.get(&id).and_then(|&slot| self.bboxes[slot])
    }

    /// Bounding box covering every non-empty district polygon.
    #[must_use]
    pub fn total_bounds(&self) -> Option<BoundingBox> {
        self.bboxes
            .iter()
            .flatten()
            .copied()
            .reduce(|acc, bbox| acc.union(&bbox))
    }
}

/// Describes why a polygon cannot take part in spatial queries.
fn geometry_problem(mp: &MultiPolygon<f64>) -> Option<&'static str> {
    if mp.0.is_empty() || mp.0.iter().all(|p| p.exterior().0.is_empty()) {
        Some("empty polygon")
    } else if !mp.is_valid() {
        Some("invalid polygon (self-intersecting or degenerate)")
    } else {
        None
    }
}

/// Computes the bounding box for a [`MultiPolygon`].
fn compute_bbox(mp: &MultiPolygon<f64>) -> Option<BoundingBox> {
    mp.bounding_rect()
        .map(|rect| BoundingBox::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use geo::{LineString, Polygon};

    pub fn square(min_lon: f64, min_lat: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![Polygon::new(
            LineString::from(vec![
                (min_lon, min_lat),
                (min_lon + size, min_lat),
                (min_lon + size, min_lat + size),
                (min_lon, min_lat + size),
                (min_lon, min_lat),
            ]),
            vec![],
        )])
    }

    pub fn district(id: DistrictId, geometry: MultiPolygon<f64>, area_km2: f64) -> District {
        District {
            id,
            name: format!("District {id}"),
            parent_region: "Riau".to_string(),
            geometry,
            area_km2,
        }
    }

    fn bowtie() -> MultiPolygon<f64> {
        MultiPolygon(vec![Polygon::new(
            LineString::from(vec![(0.0, 0.0), (1.0, 1.0), (1.0, 0.0), (0.0, 1.0), (0.0, 0.0)]),
            vec![],
        )])
    }

    #[test]
    fn locate_finds_containing_district() {
        let index = GeometryIndex::new(vec![
            district(1, square(0.0, 0.0, 1.0), 10.0),
            district(2, square(1.0, 0.0, 1.0), 10.0),
        ])
        .unwrap();

        assert_eq!(index.locate(0.5, 0.5), Some(1));
        assert_eq!(index.locate(1.5, 0.5), Some(2));
    }

    #[test]
    fn locate_outside_every_polygon_is_none() {
        let index = GeometryIndex::new(vec![district(1, square(0.0, 0.0, 1.0), 10.0)]).unwrap();

        assert_eq!(index.locate(5.0, 5.0), None);
        assert_eq!(index.locate(f64::NAN, 0.5), None);
    }

    #[test]
    fn locate_prefers_smallest_overlapping_district() {
        let index = GeometryIndex::new(vec![
            district(1, square(0.0, 0.0, 4.0), 160.0),
            district(2, square(1.0, 1.0, 1.0), 10.0),
        ])
        .unwrap();

        assert_eq!(index.locate(1.5, 1.5), Some(2));
        assert_eq!(index.locate(3.5, 3.5), Some(1));
    }

    #[test]
    fn clip_bbox_returns_polygon_envelope() {
        let index = GeometryIndex::new(vec![district(7, square(100.0, -2.0, 0.5), 10.0)]).unwrap();

        assert_eq!(
            index.clip_bbox(7),
            Some(BoundingBox::new(100.0, -2.0, 100.5, -1.5))
        );
        assert_eq!(index.clip_bbox(8), None);
    }

    #[test]
    fn malformed_polygons_are_tagged_invalid_not_fatal() {
        let index = GeometryIndex::new(vec![
            district(1, MultiPolygon(vec![]), 10.0),
            district(2, bowtie(), 10.0),
            district(3, square(5.0, 5.0, 1.0), 10.0),
        ])
        .unwrap();

        assert_eq!(index.len(), 3);
        assert!(index.is_invalid(1));
        assert!(index.is_invalid(2));
        assert!(!index.is_invalid(3));
        assert_eq!(index.clip_bbox(2), None);
        assert_eq!(index.locate(0.2, 0.5), None);
        assert!(!index.contains(2, 0.2, 0.5));
        assert_eq!(index.locate(5.5, 5.5), Some(3));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let result = GeometryIndex::new(vec![
            district(1, square(0.0, 0.0, 1.0), 10.0),
            district(1, square(1.0, 0.0, 1.0), 10.0),
        ]);

        assert!(matches!(result, Err(SpatialError::DuplicateDistrict(1))));
    }

    #[test]
    fn negative_area_is_rejected() {
        let result = GeometryIndex::new(vec![district(4, square(0.0, 0.0, 1.0), -1.0)]);

        assert!(matches!(result, Err(SpatialError::InvalidArea { id: 4, .. })));
    }

    #[test]
    fn total_bounds_covers_all_districts() {
        let index = GeometryIndex::new(vec![
            district(1, square(0.0, 0.0, 1.0), 10.0),
            district(2, square(3.0, -2.0, 1.0), 10.0),
        ])
        .unwrap();

        assert_eq!(
            index.total_bounds(),
            Some(BoundingBox::new(0.0, -2.0, 4.0, 1.0))
        );
    }
}
