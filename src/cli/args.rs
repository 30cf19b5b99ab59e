use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use geoscope::{AreaUnit, Extent, ReportFormat};

#[derive(Parser)]
#[command(name = "geoscope", version, about = "geoscope CLI")]
pub struct CliArgs {
    /// JSON analysis config; command-line options override its values
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable logging (RUST_LOG overrides the default debug level)
    #[arg(long, global = true, default_value_t = false)]
    pub log: bool,

    /// Report format (text or json)
    #[arg(long, global = true, value_enum, default_value_t = ReportFormat::Text)]
    pub report: ReportFormat,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Percentile-stretch a multi-band raster into a three-channel composite
    Compose(ComposeArgs),
    /// Join a fine polygon layer to a coarse one and total a measure per group
    Aggregate(AggregateArgs),
    /// Build the extent-minus-regions overlay polygon
    Mask(MaskArgs),
}

#[derive(Args)]
pub struct ComposeArgs {
    /// Input raster (GeoTIFF or any GDAL-readable format)
    #[arg(short, long)]
    pub input: PathBuf,

    /// Three 0-based band indices for channels 1,2,3 (e.g. 2,1,0)
    #[arg(long, value_delimiter = ',')]
    pub bands: Option<Vec<usize>>,

    /// Lower stretch percentile (0..100)
    #[arg(long)]
    pub pmin: Option<f64>,

    /// Upper stretch percentile (0..100)
    #[arg(long)]
    pub pmax: Option<f64>,
}

#[derive(Args)]
pub struct AggregateArgs {
    /// Fine layer, e.g. wards carrying a population attribute
    #[arg(long)]
    pub fine: PathBuf,

    /// Coarse layer, e.g. counties carrying a group name
    #[arg(long)]
    pub coarse: PathBuf,

    /// CRS both layers are reprojected into before measuring (e.g. EPSG:32629)
    #[arg(long)]
    pub target_crs: Option<String>,

    /// Coarse-layer group attribute
    #[arg(long)]
    pub group_key: Option<String>,

    /// Fine-layer magnitude attribute
    #[arg(long)]
    pub measure_key: Option<String>,

    /// Fine-layer attribute used to name the largest feature
    #[arg(long)]
    pub label_key: Option<String>,

    /// Unit of the derived area attribute
    #[arg(long, value_enum)]
    pub area_unit: Option<AreaUnit>,
}

#[derive(Args)]
pub struct MaskArgs {
    /// Coarse layer whose union is punched out of the extent
    #[arg(long)]
    pub coarse: PathBuf,

    /// Extent as xmin,ymin,xmax,ymax
    #[arg(long, conflicts_with = "raster")]
    pub extent: Option<Extent>,

    /// Take the extent (and CRS) from this raster instead
    #[arg(long)]
    pub raster: Option<PathBuf>,

    /// CRS the coarse layer is reprojected into when --extent is used
    #[arg(long)]
    pub target_crs: Option<String>,
}
