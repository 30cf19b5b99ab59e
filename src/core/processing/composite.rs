use ndarray::{Array3, ArrayBase, Axis, Data, Dimension, Ix3};
use serde::Serialize;
use tracing::{debug, info};

use crate::core::params::CompositeParams;
use crate::core::processing::stretch::percentile_stretch;
use crate::error::{Error, Result};
use crate::types::Extent;

/// A raster read into memory: samples indexed (band, row, col) plus where it sits.
#[derive(Debug, Clone)]
pub struct GeoRaster {
    pub data: Array3<f64>,
    pub extent: Extent,
    /// Projection as reported by the reader (EPSG code or WKT)
    pub projection: String,
}

/// Display-ready composite, (row, col, channel) with values in [0, 1].
#[derive(Debug, Clone)]
pub struct Composite {
    pub image: Array3<f64>,
    pub extent: Extent,
    pub projection: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChannelStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Samples that were NaN and left out of min/max/mean
    pub nan_count: usize,
}

impl Composite {
    pub fn rows(&self) -> usize {
        self.image.len_of(Axis(0))
    }

    pub fn cols(&self) -> usize {
        self.image.len_of(Axis(1))
    }

    /// min/max/mean per output channel, ignoring NaN samples.
    pub fn channel_stats(&self) -> Vec<ChannelStats> {
        self.image
            .axis_iter(Axis(2))
            .map(|channel| {
                let mut min = f64::INFINITY;
                let mut max = f64::NEG_INFINITY;
                let mut sum = 0.0;
                let mut count = 0usize;
                let mut nan_count = 0usize;
                for &v in channel.iter() {
                    if v.is_nan() {
                        nan_count += 1;
                        continue;
                    }
                    min = min.min(v);
                    max = max.max(v);
                    sum += v;
                    count += 1;
                }
                let mean = if count > 0 { sum / count as f64 } else { f64::NAN };
                ChannelStats { min, max, mean, nan_count }
            })
            .collect()
    }
}

/// Build a three-channel display composite from a (band, row, col) raster.
///
/// The raster is copied into `f64` storage and *every* band is percentile
/// stretched with the same bounds. The stretched cube is then reordered to
/// (row, col, band) and the channels named by `params.bands` are picked in the
/// given order, so `[2, 1, 0]` turns a blue/green/red stack into RGB.
///
/// Fails on the first band that cannot be stretched; no partial composite is
/// returned.
pub fn compose<T, S, D>(raster: &ArrayBase<S, D>, params: &CompositeParams) -> Result<Array3<f64>>
where
    T: Copy + Into<f64>,
    S: Data<Elem = T>,
    D: Dimension,
{
    let stretch = params.stretch.unwrap_or_default();
    stretch.validate()?;
    let raster = raster
        .view()
        .into_dimensionality::<Ix3>()
        .map_err(|_| Error::InvalidShape {
            expected: 3,
            actual: raster.ndim(),
        })?;
    let band_count = raster.len_of(Axis(0));
    if let Some(&index) = params.bands.iter().find(|&&b| b >= band_count) {
        return Err(Error::BandIndexOutOfRange {
            index,
            bands: band_count,
        });
    }

    let mut working: Array3<f64> = raster.mapv(|v| v.into());
    for (b, mut band) in working.axis_iter_mut(Axis(0)).enumerate() {
        let stretched = percentile_stretch(&band, stretch)?;
        band.assign(&stretched);
        debug!("Stretched band {} of {}", b + 1, band_count);
    }

    let interleaved = working.permuted_axes([1, 2, 0]);
    let composite = interleaved.select(Axis(2), &params.bands);

    info!(
        "Composite built: {}x{} from bands {:?} (p{}..p{})",
        composite.len_of(Axis(1)),
        composite.len_of(Axis(0)),
        params.bands,
        stretch.pmin,
        stretch.pmax
    );

    Ok(composite)
}

/// [`compose`] for a raster read from disk; extent and projection are carried
/// through untouched so a renderer can place the image.
pub fn compose_georeferenced(raster: &GeoRaster, params: &CompositeParams) -> Result<Composite> {
    let image = compose(&raster.data, params)?;
    Ok(Composite {
        image,
        extent: raster.extent,
        projection: raster.projection.clone(),
    })
}
