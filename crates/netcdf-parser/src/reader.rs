//! Reading single MERRA-2 images out of daily or monthly NetCDF files.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use merra_common::{GridDefinition, Image, Product, VariableMetadata};
use tracing::{info, warn};

use crate::error::{NetCdfError, NetCdfResult};
use crate::native::{get_f32_attr, get_string_attr, no_data_values, silence_hdf5_errors};

/// Reads a fixed set of variables at one time step of a MERRA-2 file.
///
/// Data variables are `(time, lat, lon)` with latitude ascending from 90°S
/// and longitude from 180°W, which flattens directly into gpi order.
#[derive(Debug, Clone)]
pub struct MerraImageReader {
    grid: Arc<GridDefinition>,
    product: Product,
    variables: Vec<String>,
}

impl MerraImageReader {
    pub fn new(grid: Arc<GridDefinition>, product: Product, variables: Vec<String>) -> Self {
        Self {
            grid,
            product,
            variables,
        }
    }

    pub fn grid(&self) -> &GridDefinition {
        &self.grid
    }

    pub fn product(&self) -> Product {
        self.product
    }

    pub fn variables(&self) -> &[String] {
        &self.variables
    }

    /// Read the image for `timestamp` from `path`.
    ///
    /// Only a file that cannot be opened is an error. Each variable that is
    /// absent, has the wrong shape or fails to read is NaN-filled and listed
    /// in [`Image::corrupt_variables`].
    pub fn read(&self, path: &Path, timestamp: DateTime<Utc>) -> NetCdfResult<Image> {
        silence_hdf5_errors();

        if !path.exists() {
            return Err(NetCdfError::FileOpen {
                path: path.to_path_buf(),
                message: "file does not exist".to_string(),
            });
        }

        let file = netcdf::open(path).map_err(|e| NetCdfError::FileOpen {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let time_index = self.product.time_index(timestamp);
        info!(
            path = %path.display(),
            timestamp = %timestamp,
            time_index = time_index,
            variables = self.variables.len(),
            "Reading image"
        );

        let mut data = BTreeMap::new();
        let mut metadata = BTreeMap::new();
        let mut corrupt = Vec::new();

        for name in &self.variables {
            match self.read_variable(&file, name, time_index) {
                Ok((values, meta)) => {
                    data.insert(name.clone(), values);
                    metadata.insert(name.clone(), meta);
                }
                Err(reason) => {
                    warn!(
                        path = %path.display(),
                        variable = %name,
                        reason = %reason,
                        "Variable unreadable, filling with NaN"
                    );
                    data.insert(name.clone(), vec![f32::NAN; self.grid.len()]);
                    metadata.insert(name.clone(), VariableMetadata::default());
                    corrupt.push(name.clone());
                }
            }
        }

        Image::new(timestamp, data, metadata, corrupt).map_err(|source| {
            NetCdfError::InvalidImage {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    /// Read one variable's slice, returning a description of the problem on failure.
    fn read_variable(
        &self,
        file: &netcdf::File,
        name: &str,
        time_index: usize,
    ) -> Result<(Vec<f32>, VariableMetadata), String> {
        let var = file
            .variable(name)
            .ok_or_else(|| "variable not present".to_string())?;

        let dims: Vec<usize> = var.dimensions().iter().map(|d| d.len()).collect();
        let raw: Vec<f32> = match dims.as_slice() {
            [nt, ny, nx] => {
                if time_index >= *nt {
                    return Err(format!(
                        "time index {} outside time dimension of length {}",
                        time_index, nt
                    ));
                }
                self.check_shape(*ny, *nx)?;
                var.get_values::<f32, _>((time_index, .., ..))
                    .map_err(|e| e.to_string())?
            }
            [ny, nx] => {
                self.check_shape(*ny, *nx)?;
                var.get_values::<f32, _>(..).map_err(|e| e.to_string())?
            }
            other => return Err(format!("unexpected dimensions {:?}", other)),
        };

        if raw.len() != self.grid.len() {
            return Err(format!(
                "read {} values, grid has {} points",
                raw.len(),
                self.grid.len()
            ));
        }

        let no_data = no_data_values(&var);
        let scale_factor = get_f32_attr(&var, "scale_factor").unwrap_or(1.0);
        let add_offset = get_f32_attr(&var, "add_offset").unwrap_or(0.0);

        let values = raw
            .into_iter()
            .map(|v| {
                if v.is_nan() || no_data.contains(&v) {
                    f32::NAN
                } else {
                    v * scale_factor + add_offset
                }
            })
            .collect();

        let meta = VariableMetadata {
            units: get_string_attr(&var, "units"),
            long_name: get_string_attr(&var, "long_name"),
        };

        Ok((values, meta))
    }

    fn check_shape(&self, ny: usize, nx: usize) -> Result<(), String> {
        if (ny, nx) != (self.grid.ny(), self.grid.nx()) {
            return Err(format!(
                "shape {}x{} does not match grid {}x{}",
                ny,
                nx,
                self.grid.ny(),
                self.grid.nx()
            ));
        }
        Ok(())
    }
}
