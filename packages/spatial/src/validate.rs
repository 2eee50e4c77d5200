//! Boundary sanity report.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::GeometryIndex;

/// Summary of the loaded district boundaries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoundaryReport {
    /// Number of districts loaded.
    pub total_districts: usize,
    /// Districts with a non-empty polygon.
    pub has_geometry: usize,
    /// Districts usable for spatial queries.
    pub valid_geometry: usize,
    /// `[min_lon, min_lat, max_lon, max_lat]` over every polygon.
    pub bounds: Option<[f64; 4]>,
    /// Number of distinct parent regions.
    pub provinces: usize,
    /// Sorted parent region names.
    pub province_list: Vec<String>,
}

/// Builds a [`BoundaryReport`] for an index.
#[must_use]
pub fn validate_boundaries(index: &GeometryIndex) -> BoundaryReport {
    let districts = index.districts();
    let province_list: Vec<String> = districts
        .iter()
        .map(|d| d.parent_region.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let report = BoundaryReport {
        total_districts: districts.len(),
        has_geometry: districts.iter().filter(|d| !d.geometry.0.is_empty()).count(),
        valid_geometry: districts.len() - index.invalid_districts().len(),
        bounds: index.total_bounds().map(|b| b.to_array()),
        provinces: province_list.len(),
        province_list,
    };

    log::info!(
        "Boundary report: {} districts, {} valid, {} provinces",
        report.total_districts,
        report.valid_geometry,
        report.provinces
    );

    report
}
