#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Administrative district types.
//!
//! A [`District`] is the smallest polygon unit that observations are
//! aggregated onto. Districts are loaded once per run and referenced by
//! [`DistrictId`] everywhere else; joins never compare geometry.

use geo::MultiPolygon;
use serde::{Deserialize, Serialize};

/// Stable district identifier, unique within a run.
pub type DistrictId = u32;

/// An administrative district as supplied by the boundary source.
#[derive(Debug, Clone, PartialEq)]
pub struct District {
    /// Unique identifier used as the sole join key.
    pub id: DistrictId,
    /// District name (e.g. "Kabupaten Ogan Komering Ilir").
    pub name: String,
    /// Name of the parent region (province).
    pub parent_region: String,
    /// District polygon in long/lat degrees.
    pub geometry: MultiPolygon<f64>,
    /// Precomputed area in square kilometres.
    pub area_km2: f64,
}

impl District {
    /// Number of observations per square kilometre, or `0.0` when the
    /// district has no usable area.
    #[must_use]
    pub fn density(&self, count: u64) -> f64 {
        if self.area_km2 > 0.0 {
            #[allow(clippy::cast_precision_loss)]
            let count = count as f64;
            count / self.area_km2
        } else {
            0.0
        }
    }
}

/// Axis-aligned bounding box in long/lat degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western edge.
    pub min_lon: f64,
    /// Southern edge.
    pub min_lat: f64,
    /// Eastern edge.
    pub max_lon: f64,
    /// Northern edge.
    pub max_lat: f64,
}

impl BoundingBox {
    /// Creates a bounding box from its corners.
    #[must_use]
    pub const fn new(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        }
    }

    /// Whether the point lies inside the box, edges included.
    #[must_use]
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        (self.min_lon..=self.max_lon).contains(&lon) && (self.min_lat..=self.max_lat).contains(&lat)
    }

    /// Smallest box covering both `self` and `other`.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min_lon: self.min_lon.min(other.min_lon),
            min_lat: self.min_lat.min(other.min_lat),
            max_lon: self.max_lon.max(other.max_lon),
            max_lat: self.max_lat.max(other.max_lat),
        }
    }

    /// The box as `[min_lon, min_lat, max_lon, max_lat]`.
    #[must_use]
    pub const fn to_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }
}
