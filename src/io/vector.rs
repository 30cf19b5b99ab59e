use std::path::Path;

use gdal::Dataset;
use gdal::errors::GdalError;
use gdal::spatial_ref::{AxisMappingStrategy, SpatialRef};
use gdal::vector::{FieldValue, LayerAccess};
use tracing::{debug, info};

use crate::core::vector::feature::{AttributeValue, Feature, FeatureCollection};
use crate::error::Result;

fn attribute_from_field(value: Option<FieldValue>) -> AttributeValue {
    match value {
        None => AttributeValue::Null,
        Some(FieldValue::IntegerValue(v)) => AttributeValue::Int(v as i64),
        Some(FieldValue::Integer64Value(v)) => AttributeValue::Int(v),
        Some(FieldValue::RealValue(v)) => AttributeValue::Float(v),
        Some(FieldValue::StringValue(v)) => AttributeValue::String(v),
        Some(FieldValue::DateValue(v)) => AttributeValue::String(v.to_string()),
        Some(FieldValue::DateTimeValue(v)) => AttributeValue::String(v.to_rfc3339()),
        Some(other) => AttributeValue::String(format!("{other:?}")),
    }
}

/// Spatial reference for a user-supplied definition ("EPSG:32629", WKT, PROJ string),
/// with x/y in longitude/easting-first order.
pub fn spatial_ref(definition: &str) -> Result<SpatialRef> {
    let mut srs = SpatialRef::from_definition(definition)?;
    srs.set_axis_mapping_strategy(AxisMappingStrategy::TraditionalGisOrder);
    Ok(srs)
}

/// Read the first layer of an OGR-readable file (Shapefile, GeoPackage, GeoJSON, ...).
///
/// With `target_crs` every geometry is reprojected before conversion; without it
/// coordinates are kept as stored. Features without geometry are kept with
/// `geometry: None`, and their FID becomes the feature id.
pub fn read_features<P: AsRef<Path>>(path: P, target_crs: Option<&str>) -> Result<FeatureCollection> {
    let dataset = Dataset::open(path.as_ref())?;
    let mut layer = dataset.layer(0)?;
    let target = target_crs.map(spatial_ref).transpose()?;
    if target.is_some() && layer.spatial_ref().is_none() {
        return Err(GdalError::BadArgument(format!(
            "{} has no CRS to reproject from",
            path.as_ref().display()
        ))
        .into());
    }

    let mut collection = FeatureCollection::new();
    for ogr_feature in layer.features() {
        let geometry = match ogr_feature.geometry() {
            Some(geom) => {
                let geo = match &target {
                    Some(srs) => geom.transform_to(srs)?.to_geo()?,
                    None => geom.to_geo()?,
                };
                Some(geo)
            }
            None => None,
        };
        let mut feature = Feature {
            geometry,
            properties: Default::default(),
            id: ogr_feature.fid().map(|fid| fid.to_string()),
        };
        for (name, value) in ogr_feature.fields() {
            feature.set_property(name, attribute_from_field(value));
        }
        collection.push(feature);
    }

    info!(
        "Read {} features from {:?}{}",
        collection.len(),
        path.as_ref(),
        target_crs.map(|c| format!(" (reprojected to {c})")).unwrap_or_default()
    );
    debug!("Layer name: {}", layer.name());
    Ok(collection)
}
