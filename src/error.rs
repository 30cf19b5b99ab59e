//! Crate-level error type and `Result` alias.
//! Validation failures get semantic variants; GDAL, I/O and JSON errors from the
//! collaborator layer are forwarded transparently so callers see them unchanged.
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid percentile bounds: pmin={pmin}, pmax={pmax} (need 0 <= pmin < pmax <= 100)")]
    InvalidParameter { pmin: f64, pmax: f64 },

    #[error("Invalid array shape: expected {expected} dimensions, got {actual}")]
    InvalidShape { expected: usize, actual: usize },

    #[error("Cannot compute percentiles of an empty band")]
    EmptyBand,

    #[error("Band index {index} out of range for raster with {bands} bands")]
    BandIndexOutOfRange { index: usize, bands: usize },

    #[error("Feature {feature} has no attribute '{key}'")]
    MissingAttribute { feature: usize, key: String },

    #[error("Attribute '{key}' of feature {feature} is not numeric: {value}")]
    NonNumericAttribute {
        feature: usize,
        key: String,
        value: String,
    },

    #[error("Feature {feature} has no polygonal geometry")]
    NonPolygonal { feature: usize },

    #[error("Invalid extent: ({xmin}, {ymin}, {xmax}, {ymax})")]
    InvalidExtent {
        xmin: f64,
        ymin: f64,
        xmax: f64,
        ymax: f64,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Gdal(#[from] gdal::errors::GdalError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
