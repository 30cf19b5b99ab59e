//! Collaborator layer: GDAL-backed raster reading and OGR-backed polygon
//! reading with optional reprojection. The analysis core never touches files;
//! these adapters produce the in-memory inputs it works on.
pub mod gdal;
pub use self::gdal::{GdalRasterReader, RasterMetadata};

pub mod vector;
pub use self::vector::{read_features, spatial_ref};
