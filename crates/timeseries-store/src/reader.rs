//! Reading time series back out of the cell stores.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use merra_common::{GridDefinition, VariableMetadata};
use serde_json::{Map, Value};
use tracing::debug;
use zarrs::array::Array;
use zarrs::group::Group;
use zarrs_filesystem::FilesystemStore;

use crate::error::{StoreError, StoreResult};
use crate::grid_file::read_grid;
use crate::types::{from_days, CellInfo, TimeSeries};
use crate::writer::{cell_dir_name, open_storage, stored_variables, subset};

/// Reads per-location series from a directory written by
/// [`ZarrCellStore`](crate::ZarrCellStore).
#[derive(Debug)]
pub struct TimeSeriesReader {
    root: PathBuf,
    grid: GridDefinition,
    variables: Option<Vec<String>>,
}

impl TimeSeriesReader {
    /// Open the store at `root`, rebuilding the grid from its `grid.json`.
    pub fn open(root: impl Into<PathBuf>) -> StoreResult<Self> {
        let root = root.into();
        let spec = read_grid(&root)?;
        let grid = GridDefinition::new(spec).map_err(|e| StoreError::GridMismatch(e.to_string()))?;
        Ok(Self {
            root,
            grid,
            variables: None,
        })
    }

    /// Restrict reads to `variables`; all stored variables are read otherwise.
    pub fn with_variables(mut self, variables: Vec<String>) -> Self {
        self.variables = Some(variables);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn grid(&self) -> &GridDefinition {
        &self.grid
    }

    /// Cells that have a store, ascending.
    pub fn cells(&self) -> StoreResult<Vec<u32>> {
        let mut cells = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(cell) = name
                .to_str()
                .and_then(|n| n.strip_suffix(".zarr"))
                .and_then(|n| n.parse::<u32>().ok())
            else {
                continue;
            };
            if entry.path().join("zarr.json").exists() {
                cells.push(cell);
            }
        }
        cells.sort_unstable();
        Ok(cells)
    }

    fn open_cell(&self, cell: u32) -> StoreResult<Option<Arc<FilesystemStore>>> {
        let path = self.root.join(cell_dir_name(cell));
        if !path.join("zarr.json").exists() {
            return Ok(None);
        }
        open_storage(&path).map(Some)
    }

    /// Global attributes and extent of one cell store.
    pub fn cell_info(&self, cell: u32) -> StoreResult<CellInfo> {
        let storage = self
            .open_cell(cell)?
            .ok_or_else(|| StoreError::NotFound(format!("cell {}", cell)))?;

        let group = Group::open(storage.clone(), "/").map_err(StoreError::zarr)?;
        let attrs = group.attributes();
        let product_name = attrs
            .get("product_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        let variables = stored_variables(attrs)?;

        let location_id = Array::open(storage.clone(), "/location_id").map_err(StoreError::zarr)?;
        let time = Array::open(storage, "/time").map_err(StoreError::zarr)?;

        Ok(CellInfo {
            cell,
            product_name,
            variables,
            locations: location_id.shape().first().copied().unwrap_or(0) as usize,
            times: time.shape().first().copied().unwrap_or(0) as usize,
        })
    }

    /// Series of the grid point nearest to `(lon, lat)`.
    pub fn read(&self, lon: f64, lat: f64) -> StoreResult<TimeSeries> {
        let gpi = self
            .grid
            .nearest_gpi(lon, lat)
            .ok_or_else(|| StoreError::NotFound(format!("({}, {})", lon, lat)))?;
        self.read_gpi(gpi)
    }

    /// Series of grid point `gpi`.
    pub fn read_gpi(&self, gpi: usize) -> StoreResult<TimeSeries> {
        let point = self
            .grid
            .point(gpi)
            .ok_or_else(|| StoreError::NotFound(format!("gpi {}", gpi)))?;
        let storage = self
            .open_cell(point.cell)?
            .ok_or_else(|| StoreError::NotFound(format!("gpi {} (cell {})", gpi, point.cell)))?;

        let group = Group::open(storage.clone(), "/").map_err(StoreError::zarr)?;
        let stored = stored_variables(group.attributes())?;
        let variables = match &self.variables {
            Some(requested) => {
                if let Some(missing) = requested.iter().find(|v| !stored.contains(v)) {
                    return Err(StoreError::NotFound(format!(
                        "variable {} in cell {}",
                        missing, point.cell
                    )));
                }
                requested.clone()
            }
            None => stored,
        };

        let location_id = Array::open(storage.clone(), "/location_id").map_err(StoreError::zarr)?;
        let n_loc = location_id.shape().first().copied().unwrap_or(0);
        let ids: Vec<u64> = location_id
            .retrieve_array_subset_elements(&subset(vec![0], vec![n_loc])?)
            .map_err(StoreError::zarr)?;
        let loc = ids
            .iter()
            .position(|id| *id == gpi as u64)
            .ok_or_else(|| StoreError::NotFound(format!("gpi {} in cell {}", gpi, point.cell)))?
            as u64;

        let time = Array::open(storage.clone(), "/time").map_err(StoreError::zarr)?;
        let n_t = time.shape().first().copied().unwrap_or(0);

        let mut values = BTreeMap::new();
        let mut metadata = BTreeMap::new();
        let mut times = Vec::new();

        if n_t > 0 {
            let days: Vec<f64> = time
                .retrieve_array_subset_elements(&subset(vec![0], vec![n_t])?)
                .map_err(StoreError::zarr)?;
            times = days.into_iter().map(from_days).collect();
        }

        for name in variables {
            let array =
                Array::open(storage.clone(), &format!("/{}", name)).map_err(StoreError::zarr)?;
            let series: Vec<f32> = if n_t > 0 {
                array
                    .retrieve_array_subset_elements(&subset(vec![loc, 0], vec![1, n_t])?)
                    .map_err(StoreError::zarr)?
            } else {
                Vec::new()
            };
            metadata.insert(name.clone(), variable_metadata(array.attributes()));
            values.insert(name, series);
        }

        debug!(gpi, cell = point.cell, times = n_t, "Read time series");

        Ok(TimeSeries {
            gpi,
            lon: point.lon,
            lat: point.lat,
            times,
            values,
            metadata,
        })
    }
}

fn variable_metadata(attrs: &Map<String, Value>) -> VariableMetadata {
    let text = |key: &str| attrs.get(key).and_then(Value::as_str).map(str::to_string);
    VariableMetadata {
        units: text("units"),
        long_name: text("long_name"),
    }
}
