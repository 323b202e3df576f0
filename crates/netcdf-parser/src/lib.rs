//! NetCDF reader for MERRA-2 land surface diagnostics.
//!
//! [`MerraImageReader`] extracts one time step of a set of variables from a
//! NetCDF-4 file into an [`Image`](merra_common::Image). [`ImageStack`]
//! resolves timestamps to files in a local archive mirror and implements
//! [`ImageSource`](merra_common::ImageSource) on top of the reader.
//!
//! # Implementation Notes
//!
//! Files are read with the `netcdf` crate (libnetcdf + HDF5). HDF5's own
//! stderr diagnostics are switched off via [`silence_hdf5_errors`] before the
//! first file is opened.

pub mod error;
mod native;
pub mod reader;
pub mod stack;

pub use error::{NetCdfError, NetCdfResult};
pub use native::silence_hdf5_errors;
pub use reader::MerraImageReader;
pub use stack::ImageStack;
