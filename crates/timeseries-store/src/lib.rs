//! Per-cell time-series storage for reshuffled MERRA-2 images.
//!
//! Reshuffled data is grouped by cell. Each cell gets its own Zarr V3 store
//! holding the cell's grid points as the first axis and time as the second,
//! so reading the full record of one location touches a single store.
//!
//! - [`ZarrCellStore`] appends [`CellChunk`]s, one per cell and flush
//! - [`TimeSeriesReader`] reads series back by coordinate or gpi
//! - `grid.json` at the root records the grid the gpis refer to

pub mod config;
pub mod error;
pub mod grid_file;
pub mod reader;
pub mod types;
pub mod writer;

pub use config::{StoreConfig, ZarrCompression};
pub use error::{StoreError, StoreResult};
pub use grid_file::{read_grid, write_grid, GRID_FILE};
pub use reader::TimeSeriesReader;
pub use types::{from_days, to_days, CellChunk, CellInfo, RunMetadata, TimeSeries, TIME_UNITS};
pub use writer::{cell_dir_name, TimeSeriesStore, ZarrCellStore};
