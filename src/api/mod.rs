//! High-level, ergonomic library API: read inputs from disk through GDAL and run
//! the analysis core on them. Prefer these entrypoints over the low-level `core`
//! modules when the data lives in files.
use std::path::Path;

use geo_types::MultiPolygon;
use tracing::info;

use crate::core::params::{AggregationParams, CompositeParams};
use crate::core::processing::composite::{Composite, compose_georeferenced};
use crate::core::vector::join::{AggregationReport, run_aggregation};
use crate::core::vector::overlay::build_overlay_mask;
use crate::error::Result;
use crate::io::gdal::GdalRasterReader;
use crate::io::vector::read_features;
use crate::types::Extent;

/// Read a multi-band raster and build its stretched three-channel composite.
pub fn compose_raster_file(path: &Path, params: &CompositeParams) -> Result<Composite> {
    let reader = GdalRasterReader::open(path)?;
    let raster = reader.read_all()?;
    compose_georeferenced(&raster, params)
}

/// Read the fine and coarse polygon layers, reproject both into `target_crs`
/// when given, and run derive/join/aggregate with diagnostics.
///
/// Areas are only meaningful when `target_crs` (or the files' own CRS) is projected.
pub fn aggregate_layers(
    fine_path: &Path,
    coarse_path: &Path,
    target_crs: Option<&str>,
    params: &AggregationParams,
) -> Result<AggregationReport> {
    let fine = read_features(fine_path, target_crs)?;
    let coarse = read_features(coarse_path, target_crs)?;
    info!(
        "Aggregating {} fine features into {} groups by '{}'",
        fine.len(),
        coarse.len(),
        params.group_key
    );
    run_aggregation(&fine, &coarse, params)
}

/// Overlay mask over an explicit extent, with the coarse layer reprojected into
/// the extent's CRS when `target_crs` is given.
pub fn overlay_mask_for_extent(
    extent: &Extent,
    coarse_path: &Path,
    target_crs: Option<&str>,
) -> Result<MultiPolygon<f64>> {
    let coarse = read_features(coarse_path, target_crs)?;
    build_overlay_mask(extent, &coarse)
}

/// Overlay mask over the footprint of a raster. The coarse layer is reprojected
/// into the raster's CRS.
pub fn overlay_mask_for_raster(raster_path: &Path, coarse_path: &Path) -> Result<MultiPolygon<f64>> {
    let reader = GdalRasterReader::open(raster_path)?;
    let extent = reader.metadata.extent();
    let crs = reader.metadata.projection.clone();
    let target = if crs.is_empty() { None } else { Some(crs.as_str()) };
    overlay_mask_for_extent(&extent, coarse_path, target)
}
