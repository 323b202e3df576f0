//! Common types and utilities shared across the MERRA-2 reshuffling crates.
//!
//! - [`grid`]: the fixed GMAO 0.5° x 0.625° global grid and its cell partition
//! - [`time`]: image cadences and the timestamp sequence generator
//! - [`image`]: the immutable per-timestamp [`Image`] and the [`ImageSource`] seam
//! - [`archive`]: product definitions, archive layout and local mirror scanning

pub mod archive;
pub mod error;
pub mod grid;
pub mod image;
pub mod time;

pub use archive::{
    ArchiveExtent, ArchiveLayout, DateToken, DirTemplate, DownloadPlan, DownloadTarget,
    FileTemplate, Product,
};
pub use error::{MerraError, MerraResult};
pub use grid::{GridDefinition, GridPoint, GridSpec};
pub use image::{Image, ImageSource, VariableMetadata};
pub use time::{inclusive_end, parse_cli_date, Cadence, HourStep, ImageSequence};
