//! Shared types used across geoscope.
//! Includes the raster `Extent`, the `AreaUnit` used when reporting polygon
//! areas, and the `ReportFormat` selector of the CLI.
use clap::ValueEnum;
use geo_types::{LineString, Polygon};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Axis-aligned bounding extent in the coordinates of some CRS.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Extent {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Self {
        Self { xmin, ymin, xmax, ymax }
    }

    /// Bounds of a north-up or south-up raster from its GDAL geotransform.
    /// Rotation terms are ignored.
    pub fn from_geotransform(geotransform: [f64; 6], size_x: usize, size_y: usize) -> Self {
        let x0 = geotransform[0];
        let y0 = geotransform[3];
        let x1 = x0 + geotransform[1] * size_x as f64;
        let y1 = y0 + geotransform[5] * size_y as f64;
        Self {
            xmin: x0.min(x1),
            ymin: y0.min(y1),
            xmax: x0.max(x1),
            ymax: y0.max(y1),
        }
    }

    /// Fails unless `xmin < xmax` and `ymin < ymax`.
    pub fn validate(&self) -> Result<()> {
        if self.xmin < self.xmax && self.ymin < self.ymax {
            Ok(())
        } else {
            Err(Error::InvalidExtent {
                xmin: self.xmin,
                ymin: self.ymin,
                xmax: self.xmax,
                ymax: self.ymax,
            })
        }
    }

    /// `[xmin, xmax, ymin, ymax]`, the order image renderers take an extent in.
    pub fn plot_extent(&self) -> [f64; 4] {
        [self.xmin, self.xmax, self.ymin, self.ymax]
    }

    /// Closed rectangle ring, counter-clockwise from the lower-left corner.
    pub fn to_polygon(&self) -> Polygon<f64> {
        Polygon::new(
            LineString::from(vec![
                (self.xmin, self.ymin),
                (self.xmax, self.ymin),
                (self.xmax, self.ymax),
                (self.xmin, self.ymax),
                (self.xmin, self.ymin),
            ]),
            vec![],
        )
    }
}

impl std::str::FromStr for Extent {
    type Err = String;

    /// Parses `xmin,ymin,xmax,ymax`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let parts: Vec<f64> = s
            .split(',')
            .map(|p| p.trim().parse::<f64>().map_err(|e| format!("{p:?}: {e}")))
            .collect::<std::result::Result<_, _>>()?;
        match parts.as_slice() {
            [xmin, ymin, xmax, ymax] => Ok(Extent::new(*xmin, *ymin, *xmax, *ymax)),
            _ => Err(format!("expected 4 comma-separated values, got {}", parts.len())),
        }
    }
}

/// Unit in which derived polygon areas are stored.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AreaUnit {
    /// Square units of the layer CRS, unscaled.
    #[default]
    Native,
    /// Square kilometres, assuming the CRS unit is the metre.
    SquareKilometers,
}

impl AreaUnit {
    /// Divisor applied to a native area.
    pub fn scale(self) -> f64 {
        match self {
            AreaUnit::Native => 1.0,
            AreaUnit::SquareKilometers => 1e6,
        }
    }
}

impl std::fmt::Display for AreaUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AreaUnit::Native => write!(f, "crs units²"),
            AreaUnit::SquareKilometers => write!(f, "km²"),
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Debug, Default, ValueEnum, Serialize, Deserialize)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}
