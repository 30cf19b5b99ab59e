#![doc = r#"
geoscope: display composites and fine/coarse polygon aggregation.

The crate covers two analysis tasks:

- **Raster display**: percentile-stretch every band of a multi-band image into
  [0, 1] and pick three bands, in order, as the channels of an RGB composite.
- **Polygon aggregation**: join a fine layer (e.g. wards with a population) to a
  coarse layer (e.g. counties), derive area and density, total the magnitude per
  group, and quantify how much is counted twice by features straddling a group
  boundary. A companion overlay mask (extent minus all coarse regions) is also
  available.

The analysis core in [`core`] is pure and in-memory. [`io`] reads rasters and
vector layers through GDAL, and [`api`] chains the two.

Stretch a band
--------------
```rust
use ndarray::array;
use geoscope::{percentile_stretch, StretchParams};

fn main() -> geoscope::Result<()> {
    let band = array![[10.0, 20.0], [30.0, 1000.0]];
    let stretched = percentile_stretch(&band, StretchParams::new(0.0, 75.0))?;
    assert_eq!(stretched[[1, 1]], 1.0);
    Ok(())
}
```

Compose a display image from a file
-----------------------------------
```rust,no_run
use std::path::Path;
use geoscope::{compose_raster_file, CompositeParams, StretchParams};

fn main() -> geoscope::Result<()> {
    let params = CompositeParams {
        bands: [2, 1, 0],
        stretch: Some(StretchParams::new(0.1, 99.9)),
    };
    let composite = compose_raster_file(Path::new("/data/mosaic.tif"), &params)?;
    println!("{}x{} at {:?}", composite.cols(), composite.rows(), composite.extent.plot_extent());
    Ok(())
}
```

Aggregate wards into counties
-----------------------------
```rust,no_run
use std::path::Path;
use geoscope::{aggregate_layers, AggregationParams, AreaUnit};

fn main() -> geoscope::Result<()> {
    let params = AggregationParams {
        group_key: "CountyName".into(),
        measure_key: "Population".into(),
        label_key: Some("Ward".into()),
        area_unit: AreaUnit::SquareKilometers,
        ..AggregationParams::default()
    };
    let report = aggregate_layers(
        Path::new("/data/NI_Wards.shp"),
        Path::new("/data/Counties.shp"),
        Some("EPSG:32629"),
        &params,
    )?;
    for (county, total) in &report.group_totals {
        println!("{county}: {total}");
    }
    println!("multiply counted: {}", report.overlap.multiply_counted);
    Ok(())
}
```

Error handling
--------------
All public functions return `geoscope::Result<T>`. Validation problems have their
own variants (`InvalidParameter`, `InvalidShape`, ...); GDAL and I/O failures are
passed through unchanged as `Error::Gdal` / `Error::Io`.

Numeric edge cases are not errors: a constant band stretches to NaN and a
zero-area polygon gets an infinite density.
"#]

pub mod api;
pub mod core;
pub mod error;
pub mod io;
pub mod types;

// Types
pub use crate::core::params::{AggregationParams, AnalysisConfig, CompositeParams, StretchParams};
pub use crate::core::processing::composite::{ChannelStats, Composite, GeoRaster};
pub use crate::core::vector::feature::{AttributeValue, Feature, FeatureCollection};
pub use crate::core::vector::join::{AggregationReport, JoinRecord, MaxFeature, OverlapReport};
pub use crate::error::{Error, Result};
pub use crate::types::{AreaUnit, Extent, ReportFormat};

// Core operations
pub use crate::core::processing::composite::{compose, compose_georeferenced};
pub use crate::core::processing::stretch::{percentile, percentile_stretch};
pub use crate::core::vector::join::{aggregate, derive_attributes, run_aggregation, spatial_join};
pub use crate::core::vector::overlay::{build_overlay_mask, dissolve_all};

// Readers
pub use crate::io::{GdalRasterReader, RasterMetadata, read_features};

// High-level API re-exports
pub use api::{
    aggregate_layers, compose_raster_file, overlay_mask_for_extent, overlay_mask_for_raster,
};
