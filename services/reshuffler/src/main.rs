//! MERRA-2 reshuffler.
//!
//! Converts a local mirror of MERRA-2 land diagnostics into per-cell
//! time-series stores, and inspects mirrors and stores.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "reshuffler")]
#[command(about = "Reshuffle MERRA-2 images into per-cell time series")]
struct Cli {
    /// Log level
    #[arg(long, global = true, default_value = "info", env = "RUST_LOG")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Reshuffle a date range of images into cell stores
    Reshuffle {
        /// Root of the local product mirror ({YYYY}/{MM}/*.nc4)
        dataset_root: PathBuf,

        /// Output directory for the cell stores
        timeseries_root: PathBuf,

        /// First date, YYYY-MM-DD or YYYY-MM-DDTHH:MM
        start: String,

        /// Last date, YYYY-MM-DD or YYYY-MM-DDTHH:MM
        end: String,

        /// Variables to reshuffle, e.g. SFMC TSURF
        #[arg(required = true)]
        parameters: Vec<String>,

        /// Images held in memory before writing
        #[arg(long, env = "MERRA_IMG_BUFFER")]
        imgbuffer: Option<usize>,

        /// Image cadence: hourly, 6h, daily, monthly or <n>h (n divides 24)
        #[arg(long)]
        cadence: Option<String>,

        /// Product: hourly or monthly (default: from cadence)
        #[arg(long)]
        product: Option<String>,
    },

    /// Report the version and date range held by a local mirror
    Scan {
        /// Root of the local product mirror
        dataset_root: PathBuf,

        /// Product: hourly or monthly
        #[arg(long, default_value = "hourly")]
        product: String,

        /// Also list the remote directories needed to bring the mirror up to date
        #[arg(long)]
        plan: bool,

        /// First date to plan for (default: last mirrored date)
        #[arg(long)]
        start: Option<String>,

        /// Last date to plan for (default: today)
        #[arg(long)]
        end: Option<String>,
    },

    /// Print the time series nearest to a location
    Read {
        /// Directory holding the cell stores
        timeseries_root: PathBuf,

        #[arg(allow_negative_numbers = true)]
        lon: f64,

        #[arg(allow_negative_numbers = true)]
        lat: f64,

        /// Variables to print (default: all stored)
        parameters: Vec<String>,
    },
}

fn init_tracing(level: &str, json: bool) -> Result<()> {
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {}", e))
}

fn main() {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    if let Err(e) = init_tracing(&cli.log_level, cli.log_json) {
        eprintln!("{:#}", e);
        std::process::exit(1);
    }

    netcdf_parser::silence_hdf5_errors();

    let result = match cli.command {
        Commands::Reshuffle {
            dataset_root,
            timeseries_root,
            start,
            end,
            parameters,
            imgbuffer,
            cadence,
            product,
        } => commands::reshuffle(commands::ReshuffleArgs {
            dataset_root,
            timeseries_root,
            start,
            end,
            parameters,
            imgbuffer,
            cadence,
            product,
        }),
        Commands::Scan {
            dataset_root,
            product,
            plan,
            start,
            end,
        } => commands::scan(&dataset_root, &product, plan, start.as_deref(), end.as_deref()),
        Commands::Read {
            timeseries_root,
            lon,
            lat,
            parameters,
        } => commands::read(&timeseries_root, lon, lat, parameters),
    };

    if let Err(e) = result {
        error!(error = %format!("{:#}", e), "Command failed");
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
