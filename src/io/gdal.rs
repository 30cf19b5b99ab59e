use gdal::errors::GdalError;
use gdal::raster::ResampleAlg;
use gdal::Dataset;
use ndarray::{Array2, Array3, Axis};
use std::path::Path;
use tracing::{debug, info};

use crate::core::processing::composite::GeoRaster;
use crate::error::{Error, Result};
use crate::types::Extent;

/// Metadata extracted from a GDAL-supported raster
#[derive(Debug, Clone)]
pub struct RasterMetadata {
    /// Width (pixels) of the raster
    pub size_x: usize,
    /// Height (lines) of the raster
    pub size_y: usize,
    /// Number of raster bands
    pub bands: usize,
    /// Affine geotransform coefficients ([origin_x, pixel_width, rot_x, origin_y, rot_y, pixel_height])
    pub geotransform: [f64; 6],
    /// Projection as "EPSG:XXXX" when an authority code is present, WKT otherwise
    pub projection: String,
}

impl RasterMetadata {
    pub fn extent(&self) -> Extent {
        Extent::from_geotransform(self.geotransform, self.size_x, self.size_y)
    }
}

/// Reader for multi-band rasters (GeoTIFF and anything else GDAL opens)
pub struct GdalRasterReader {
    pub dataset: Dataset,
    pub metadata: RasterMetadata,
}

// Helper to extract EPSG code from WKT authority tag
pub(crate) fn parse_epsg(wkt: &str) -> Option<String> {
    const KEY: &str = "AUTHORITY[\"EPSG\",\"";
    if let Some(idx) = wkt.rfind(KEY) {
        let start = idx + KEY.len();
        if let Some(end) = wkt[start..].find('"') {
            let code = &wkt[start..start + end];
            return Some(format!("EPSG:{}", code));
        }
    }
    None
}

impl GdalRasterReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let dataset = Dataset::open(path.as_ref())?;
        let (size_x, size_y) = dataset.raster_size();
        let bands = dataset.raster_count() as usize;
        if bands == 0 {
            return Err(GdalError::BadArgument(format!(
                "{} has no raster bands",
                path.as_ref().display()
            ))
            .into());
        }
        let geotransform = dataset
            .geo_transform()
            .unwrap_or([0.0, 1.0, 0.0, 0.0, 0.0, 1.0]);
        let proj = dataset.projection();
        let projection = if proj.starts_with("EPSG:") {
            proj
        } else if let Some(code) = parse_epsg(&proj) {
            code
        } else {
            proj
        };
        info!(
            "Opened raster {:?}: {}x{} pixels, {} bands, {}",
            path.as_ref(),
            size_x,
            size_y,
            bands,
            projection
        );
        Ok(GdalRasterReader {
            dataset,
            metadata: RasterMetadata {
                size_x: size_x as usize,
                size_y: size_y as usize,
                bands,
                geotransform,
                projection,
            },
        })
    }

    /// Read a single band (0-based index) as an f64 ndarray of shape (height, width)
    pub fn read_band(&self, index: usize) -> Result<Array2<f64>> {
        if index >= self.metadata.bands {
            return Err(Error::BandIndexOutOfRange {
                index,
                bands: self.metadata.bands,
            });
        }
        // GDAL band numbers are 1-based
        let band = self.dataset.rasterband(index + 1)?;
        let window = (self.metadata.size_x, self.metadata.size_y);
        let buf = band.read_as::<f64>((0, 0), window, window, Some(ResampleAlg::NearestNeighbour))?;
        let array = Array2::from_shape_vec((self.metadata.size_y, self.metadata.size_x), buf.data().to_vec())
            .map_err(|e| GdalError::BadArgument(format!("band {} buffer: {e}", index)))?;
        debug!("Read band {} ({}x{})", index, self.metadata.size_x, self.metadata.size_y);
        Ok(array)
    }

    /// Read every band into a (band, row, col) cube together with its extent
    pub fn read_all(&self) -> Result<GeoRaster> {
        let mut data = Array3::<f64>::zeros((self.metadata.bands, self.metadata.size_y, self.metadata.size_x));
        for (idx, mut slot) in data.axis_iter_mut(Axis(0)).enumerate() {
            slot.assign(&self.read_band(idx)?);
        }
        Ok(GeoRaster {
            data,
            extent: self.metadata.extent(),
            projection: self.metadata.projection.clone(),
        })
    }
}
