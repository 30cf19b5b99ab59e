use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::AreaUnit;

/// Percentile bounds for a stretch. The default covers the full sample range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StretchParams {
    pub pmin: f64,
    pub pmax: f64,
}

impl Default for StretchParams {
    fn default() -> Self {
        Self { pmin: 0.0, pmax: 100.0 }
    }
}

impl StretchParams {
    pub fn new(pmin: f64, pmax: f64) -> Self {
        Self { pmin, pmax }
    }

    /// Requires `0 <= pmin < pmax <= 100`. NaN bounds fail every comparison.
    pub fn validate(&self) -> Result<()> {
        if 0.0 <= self.pmin && self.pmin < self.pmax && self.pmax <= 100.0 {
            Ok(())
        } else {
            Err(Error::InvalidParameter {
                pmin: self.pmin,
                pmax: self.pmax,
            })
        }
    }
}

/// Channel selection and stretch for a three-channel display composite.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositeParams {
    /// Raster band (0-based) feeding output channels 1, 2 and 3, in that order
    pub bands: [usize; 3],
    /// Applied to every band; None means `StretchParams::default()`
    #[serde(default)]
    pub stretch: Option<StretchParams>,
}

impl Default for CompositeParams {
    fn default() -> Self {
        Self {
            bands: [0, 1, 2],
            stretch: None,
        }
    }
}

/// Attribute names and units for the fine/coarse aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregationParams {
    /// Coarse-layer attribute identifying the group
    pub group_key: String,
    /// Fine-layer magnitude attribute
    pub measure_key: String,
    /// Optional fine-layer attribute naming the feature in reports
    pub label_key: Option<String>,
    /// Attribute written with the derived area
    pub area_key: String,
    /// Attribute written with the derived density
    pub density_key: String,
    pub area_unit: AreaUnit,
}

impl Default for AggregationParams {
    fn default() -> Self {
        Self {
            group_key: "group".to_string(),
            measure_key: "population".to_string(),
            label_key: None,
            area_key: "area".to_string(),
            density_key: "density".to_string(),
            area_unit: AreaUnit::Native,
        }
    }
}

/// Everything one analysis run needs, suitable for a JSON config file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// CRS both polygon layers are reprojected into (e.g. "EPSG:32629")
    pub target_crs: Option<String>,
    pub composite: CompositeParams,
    pub aggregation: AggregationParams,
}

impl AnalysisConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: AnalysisConfig = serde_json::from_str(&text)?;
        if let Some(stretch) = &config.composite.stretch {
            stretch.validate()?;
        }
        if config.aggregation.group_key.is_empty() || config.aggregation.measure_key.is_empty() {
            return Err(Error::Config(
                "aggregation.group_key and aggregation.measure_key must not be empty".into(),
            ));
        }
        Ok(config)
    }
}
