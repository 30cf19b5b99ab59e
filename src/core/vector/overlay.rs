use geo::BooleanOps;
use geo_types::MultiPolygon;
use tracing::debug;

use crate::core::vector::feature::FeatureCollection;
use crate::error::Result;
use crate::types::Extent;

/// Dissolve every polygon of `layer` into one MultiPolygon.
pub fn dissolve_all(layer: &FeatureCollection) -> Result<MultiPolygon<f64>> {
    let mut union = MultiPolygon::new(Vec::new());
    for (i, feature) in layer.iter().enumerate() {
        union = union.union(&feature.polygons(i)?);
    }
    Ok(union)
}

/// Overlay that covers `extent` everywhere except inside the coarse regions.
///
/// Computed as the symmetric difference of the extent rectangle and the union of
/// all polygons in `coarse`. When the union lies inside the rectangle this is the
/// rectangle with the regions punched out. Union parts reaching outside the
/// rectangle are *not* clipped away: they belong to exactly one of the two
/// operands and so appear in the mask as well.
///
/// An empty layer yields the bare rectangle.
pub fn build_overlay_mask(extent: &Extent, coarse: &FeatureCollection) -> Result<MultiPolygon<f64>> {
    extent.validate()?;
    let rectangle = MultiPolygon::new(vec![extent.to_polygon()]);
    let union = dissolve_all(coarse)?;
    if union.0.is_empty() {
        debug!("Overlay mask: no coarse polygons, returning the extent rectangle");
        return Ok(rectangle);
    }

    let mask = rectangle.xor(&union);
    debug!(
        "Overlay mask: {} coarse features dissolved into {} parts, mask has {} parts",
        coarse.len(),
        union.0.len(),
        mask.0.len()
    );
    Ok(mask)
}
