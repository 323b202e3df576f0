//! Reshuffling of MERRA-2 images into per-cell time series.
//!
//! A [`Reshuffler`] streams the timestamps of a [`ReshuffleJob`] from an
//! [`ImageSource`](merra_common::ImageSource), keeps up to
//! [`ReshuffleConfig::image_buffer`] images in memory and on every flush
//! appends one [`CellChunk`](timeseries_store::CellChunk) per cell to a
//! [`TimeSeriesStore`](timeseries_store::TimeSeriesStore).
//!
//! Stored values do not depend on the buffer size; it only trades memory
//! for the number of appends.

pub mod buffer;
pub mod config;
pub mod error;
pub mod reshuffler;

pub use buffer::{regroup, ImageBuffer};
pub use config::{ReshuffleConfig, DEFAULT_IMAGE_BUFFER};
pub use error::{CellFailure, ReshuffleError, Result};
pub use reshuffler::{ReshuffleJob, ReshuffleState, ReshuffleSummary, Reshuffler};
