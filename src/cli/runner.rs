use geo::Area;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

use geoscope::{
    AggregationReport, AnalysisConfig, ChannelStats, Composite, Extent, ReportFormat,
    StretchParams, aggregate_layers, compose_raster_file, overlay_mask_for_extent,
    overlay_mask_for_raster,
};

use super::args::{AggregateArgs, CliArgs, Command, ComposeArgs, MaskArgs};
use super::errors::AppError;

#[derive(Serialize)]
struct ComposeSummary<'a> {
    rows: usize,
    cols: usize,
    extent: Extent,
    plot_extent: [f64; 4],
    projection: &'a str,
    channels: Vec<ChannelStats>,
}

#[derive(Serialize)]
struct MaskSummary<'a> {
    area: f64,
    parts: usize,
    geometry: &'a geo_types::MultiPolygon<f64>,
}

fn run_compose(
    args: ComposeArgs,
    config: AnalysisConfig,
    report: ReportFormat,
) -> Result<(), AppError> {
    let mut params = config.composite;
    if let Some(bands) = args.bands {
        params.bands = bands
            .as_slice()
            .try_into()
            .map_err(|_| AppError::InvalidBands { count: bands.len() })?;
    }
    if args.pmin.is_some() || args.pmax.is_some() {
        let base = params.stretch.unwrap_or_default();
        params.stretch = Some(StretchParams::new(
            args.pmin.unwrap_or(base.pmin),
            args.pmax.unwrap_or(base.pmax),
        ));
    }

    let composite: Composite = compose_raster_file(&args.input, &params)?;
    let summary = ComposeSummary {
        rows: composite.rows(),
        cols: composite.cols(),
        extent: composite.extent,
        plot_extent: composite.extent.plot_extent(),
        projection: &composite.projection,
        channels: composite.channel_stats(),
    };

    match report {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        ReportFormat::Text => {
            println!(
                "Composite {}x{} from bands {:?}, projection {}",
                summary.cols, summary.rows, params.bands, summary.projection
            );
            println!("Extent [xmin, xmax, ymin, ymax]: {:?}", summary.plot_extent);
            for (i, c) in summary.channels.iter().enumerate() {
                println!(
                    "Channel {}: min={:.4} max={:.4} mean={:.4} nan={}",
                    i + 1,
                    c.min,
                    c.max,
                    c.mean,
                    c.nan_count
                );
            }
        }
    }
    Ok(())
}

fn print_aggregation(report: &AggregationReport) {
    println!("{:<24} {}", report.group_key, report.measure_key);
    for (group, total) in &report.group_totals {
        println!("{:<24} {}", group, total);
    }
    let o = &report.overlap;
    println!("Total {} sum from fine layer: {:.2}", report.measure_key, o.fine_total);
    println!("Total {} sum from spatial join: {:.2}", report.measure_key, o.joined_total);
    println!("Number of features in fine layer: {}", o.fine_count);
    println!("Number of features in join: {}", o.record_count);
    println!("Number of features located in more than one group: {}", o.multiply_counted);
    println!(
        "Total {} of features located in more than one group: {}",
        report.measure_key, o.excess_magnitude
    );
    println!(
        "Exact count of spanning features: {} (excess {})",
        o.spanning_features, o.exact_excess
    );
    if let Some(max) = &o.max_feature {
        println!("Highest {}: {}", report.measure_key, max.magnitude);
        println!(
            "Feature with highest {}: {}",
            report.measure_key,
            max.label.clone().unwrap_or_else(|| format!("#{}", max.index))
        );
    }
}

fn run_aggregate(
    args: AggregateArgs,
    config: AnalysisConfig,
    report: ReportFormat,
) -> Result<(), AppError> {
    let mut params = config.aggregation;
    if let Some(key) = args.group_key {
        params.group_key = key;
    }
    if let Some(key) = args.measure_key {
        params.measure_key = key;
    }
    if args.label_key.is_some() {
        params.label_key = args.label_key;
    }
    if let Some(unit) = args.area_unit {
        params.area_unit = unit;
    }
    let target_crs = args.target_crs.or(config.target_crs);

    let result = aggregate_layers(&args.fine, &args.coarse, target_crs.as_deref(), &params)?;
    match report {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&result)?),
        ReportFormat::Text => print_aggregation(&result),
    }
    Ok(())
}

fn run_mask(args: MaskArgs, config: AnalysisConfig, report: ReportFormat) -> Result<(), AppError> {
    let mask = match (args.extent, args.raster) {
        (Some(extent), _) => {
            let target_crs = args.target_crs.or(config.target_crs);
            overlay_mask_for_extent(&extent, &args.coarse, target_crs.as_deref())?
        }
        (None, Some(raster)) => overlay_mask_for_raster(&raster, &args.coarse)?,
        (None, None) => {
            return Err(AppError::MissingArgument {
                arg: "--extent or --raster".to_string(),
            });
        }
    };

    let summary = MaskSummary {
        area: mask.unsigned_area(),
        parts: mask.0.len(),
        geometry: &mask,
    };
    match report {
        ReportFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        ReportFormat::Text => {
            println!("Overlay mask: {} parts, area {:.2}", summary.parts, summary.area)
        }
    }
    Ok(())
}

pub fn run(args: CliArgs) -> Result<(), Box<dyn std::error::Error>> {
    if args.log {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .init();
    }

    let config = match &args.config {
        Some(path) => {
            info!("Loading config from {:?}", path);
            AnalysisConfig::from_json_file(path)?
        }
        None => AnalysisConfig::default(),
    };

    match args.command {
        Command::Compose(cmd) => run_compose(cmd, config, args.report)?,
        Command::Aggregate(cmd) => run_aggregate(cmd, config, args.report)?,
        Command::Mask(cmd) => run_mask(cmd, config, args.report)?,
    }
    Ok(())
}
