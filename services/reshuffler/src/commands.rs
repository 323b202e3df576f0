//! Subcommand implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use merra_common::{parse_cli_date, Cadence, DownloadPlan, GridDefinition, Product};
use netcdf_parser::ImageStack;
use reshuffle::{ReshuffleConfig, ReshuffleJob, Reshuffler};
use serde_json::json;
use timeseries_store::{TimeSeriesReader, ZarrCellStore};
use tracing::{info, warn};

/// Arguments of the `reshuffle` subcommand.
pub struct ReshuffleArgs {
    pub dataset_root: PathBuf,
    pub timeseries_root: PathBuf,
    pub start: String,
    pub end: String,
    pub parameters: Vec<String>,
    pub imgbuffer: Option<usize>,
    pub cadence: Option<String>,
    pub product: Option<String>,
}

pub fn reshuffle(args: ReshuffleArgs) -> Result<()> {
    let start = parse_cli_date(&args.start).context("invalid start date")?;
    let end = parse_cli_date(&args.end).context("invalid end date")?;
    let cadence: Option<Cadence> = args
        .cadence
        .as_deref()
        .map(str::parse)
        .transpose()
        .context("invalid cadence")?;
    let product = match args.product.as_deref() {
        Some(name) => name.parse::<Product>()?,
        None => cadence.map(Product::for_cadence).unwrap_or(Product::HourlyLand),
    };
    let job = ReshuffleJob::for_product(product, start, end, cadence)?;

    let mut config = ReshuffleConfig::from_env();
    if let Some(image_buffer) = args.imgbuffer {
        config.image_buffer = image_buffer;
    }
    let grid = Arc::new(GridDefinition::new(config.grid_spec()).context("invalid cell size")?);

    let extent = product.layout().folder_version_first_last(&args.dataset_root);
    if extent.version.is_none() {
        warn!(
            root = %args.dataset_root.display(),
            product = %product,
            "No product files found in dataset root"
        );
    }

    let stack = ImageStack::new(&args.dataset_root, grid.clone(), product, args.parameters.clone());
    let store = ZarrCellStore::new(&args.timeseries_root, config.store.clone())?;
    let mut reshuffler = Reshuffler::new(stack, store, grid, &config)?;

    info!(
        dataset_root = %args.dataset_root.display(),
        timeseries_root = %args.timeseries_root.display(),
        parameters = ?args.parameters,
        image_buffer = config.image_buffer,
        mirrored_first = ?extent.first,
        mirrored_last = ?extent.last,
        "Starting reshuffle"
    );

    let summary = reshuffler.run(&job).with_context(|| {
        format!(
            "reshuffling {} into {} failed",
            args.dataset_root.display(),
            args.timeseries_root.display()
        )
    })?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn parse_day(value: Option<&str>) -> Result<Option<NaiveDate>> {
    value
        .map(|s| parse_cli_date(s).map(|t| t.date_naive()))
        .transpose()
        .context("invalid date")
}

pub fn scan(
    root: &Path,
    product: &str,
    plan: bool,
    start: Option<&str>,
    end: Option<&str>,
) -> Result<()> {
    let product: Product = product.parse()?;
    let extent = product.layout().folder_version_first_last(root);

    let mut output = json!({
        "product": product.product_name(),
        "root": root.display().to_string(),
        "version": extent.version,
        "first": extent.first,
        "last": extent.last,
    });

    if plan {
        let plan = DownloadPlan::resolve(
            product,
            root,
            parse_day(start)?,
            parse_day(end)?,
            Utc::now().date_naive(),
        )?;
        output["plan"] = json!({
            "start": plan.start,
            "end": plan.end,
            "targets": plan.targets(root),
        });
    }

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

pub fn read(root: &Path, lon: f64, lat: f64, parameters: Vec<String>) -> Result<()> {
    let mut reader = TimeSeriesReader::open(root)
        .with_context(|| format!("cannot open time series at {}", root.display()))?;
    if !parameters.is_empty() {
        reader = reader.with_variables(parameters);
    }

    let series = reader.read(lon, lat)?;
    println!("{}", serde_json::to_string_pretty(&series)?);
    Ok(())
}
