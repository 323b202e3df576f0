//! Appending cell chunks to per-cell Zarr V3 stores.
//!
//! Each cell lives in `{root}/{cell:04}.zarr`:
//!
//! ```text
//! 0962.zarr/
//!     zarr.json        group: product_name, cell, variables, time_units
//!     location_id/     [locations]          UInt64  gpi of each location
//!     lon/, lat/       [locations]          Float64
//!     time/            [time]               Float64 days since 1900-01-01
//!     SFMC/, ...       [locations, time]    Float32 with units/long_name
//! ```
//!
//! A new cell writes its arrays first and the group `zarr.json` last, so a
//! cell directory counts as created only once all of it is there. A
//! directory without the group metadata, or missing one of its arrays, is
//! removed and built again.
//!
//! Appends write the variable arrays first and extend `time` last, so the
//! length of `time` is the committed length of the store. Variable columns
//! beyond it are leftovers of an interrupted append and get overwritten.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use merra_common::GridSpec;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};
use zarrs::array::{Array, ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs::group::{Group, GroupBuilder};
use zarrs_filesystem::FilesystemStore;

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::grid_file::write_grid;
use crate::types::{from_days, to_days, CellChunk, RunMetadata, TIME_UNITS};

/// Destination of reshuffled cell data.
pub trait TimeSeriesStore {
    /// Prepare the output location for a run on `grid`.
    fn prepare(&self, grid: &GridSpec) -> StoreResult<()>;

    /// Append one chunk to its cell, creating the cell store if absent.
    ///
    /// `metadata` is only written when the cell store is created.
    fn append(&self, chunk: &CellChunk, metadata: &RunMetadata) -> StoreResult<()>;
}

/// Arrays present in every cell store besides the variables.
const CELL_ARRAYS: [&str; 4] = ["location_id", "lon", "lat", "time"];

/// Store directory name of a cell.
pub fn cell_dir_name(cell: u32) -> String {
    format!("{:04}.zarr", cell)
}

pub(crate) fn open_storage(path: &Path) -> StoreResult<Arc<FilesystemStore>> {
    Ok(Arc::new(FilesystemStore::new(path).map_err(StoreError::zarr)?))
}

pub(crate) fn subset(start: Vec<u64>, shape: Vec<u64>) -> StoreResult<ArraySubset> {
    ArraySubset::new_with_start_shape(start, shape).map_err(StoreError::zarr)
}

/// Filesystem-backed [`TimeSeriesStore`] with one Zarr group per cell.
#[derive(Debug, Clone)]
pub struct ZarrCellStore {
    root: PathBuf,
    config: StoreConfig,
}

impl ZarrCellStore {
    pub fn new(root: impl Into<PathBuf>, config: StoreConfig) -> StoreResult<Self> {
        config.validate().map_err(StoreError::Config)?;
        Ok(Self {
            root: root.into(),
            config,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn cell_path(&self, cell: u32) -> PathBuf {
        self.root.join(cell_dir_name(cell))
    }

    #[allow(clippy::too_many_arguments)]
    fn build_array(
        &self,
        storage: Arc<FilesystemStore>,
        path: &str,
        shape: Vec<u64>,
        chunk_shape: Vec<u64>,
        data_type: DataType,
        fill_value: FillValue,
        typesize: usize,
        attrs: Map<String, Value>,
    ) -> StoreResult<Array<FilesystemStore>> {
        let chunk_grid: zarrs::array::ChunkGrid = chunk_shape
            .try_into()
            .map_err(|e| StoreError::Config(format!("{:?}", e)))?;

        let mut binding = ArrayBuilder::new(shape, data_type, chunk_grid, fill_value);
        let mut builder = binding.attributes(attrs);

        if let Some(codec) = self.config.compression_codec(typesize)? {
            builder = builder.bytes_to_bytes_codecs(vec![codec]);
        }

        let array = builder.build(storage, path).map_err(StoreError::zarr)?;
        array.store_metadata().map_err(StoreError::zarr)?;
        Ok(array)
    }

    fn create_cell(
        &self,
        storage: &Arc<FilesystemStore>,
        chunk: &CellChunk,
        metadata: &RunMetadata,
    ) -> StoreResult<()> {
        let n_loc = chunk.n_locations() as u64;
        let variables: Vec<&String> = chunk.values.keys().collect();

        let mut attrs = Map::new();
        attrs.insert("product_name".to_string(), json!(metadata.product_name));
        attrs.insert("cell".to_string(), json!(chunk.cell));
        attrs.insert("variables".to_string(), json!(variables));
        attrs.insert("time_units".to_string(), json!(TIME_UNITS));

        let location_id = self.build_array(
            storage.clone(),
            "/location_id",
            vec![n_loc],
            vec![n_loc],
            DataType::UInt64,
            FillValue::from(0u64),
            8,
            Map::new(),
        )?;
        let gpis: Vec<u64> = chunk.gpis.iter().map(|g| *g as u64).collect();
        location_id
            .store_array_subset_elements(&subset(vec![0], vec![n_loc])?, &gpis)
            .map_err(StoreError::zarr)?;

        for (name, coords, units) in [
            ("/lon", &chunk.lons, "degrees_east"),
            ("/lat", &chunk.lats, "degrees_north"),
        ] {
            let mut coord_attrs = Map::new();
            coord_attrs.insert("units".to_string(), json!(units));
            let array = self.build_array(
                storage.clone(),
                name,
                vec![n_loc],
                vec![n_loc],
                DataType::Float64,
                FillValue::from(f64::NAN),
                8,
                coord_attrs,
            )?;
            array
                .store_array_subset_elements(&subset(vec![0], vec![n_loc])?, coords)
                .map_err(StoreError::zarr)?;
        }

        let time_chunk = self.config.time_chunk as u64;
        let mut time_attrs = Map::new();
        time_attrs.insert("units".to_string(), json!(TIME_UNITS));
        self.build_array(
            storage.clone(),
            "/time",
            vec![0],
            vec![time_chunk],
            DataType::Float64,
            FillValue::from(f64::NAN),
            8,
            time_attrs,
        )?;

        for name in chunk.values.keys() {
            let mut var_attrs = Map::new();
            if let Some(meta) = metadata.variables.get(name) {
                if let Some(units) = &meta.units {
                    var_attrs.insert("units".to_string(), json!(units));
                }
                if let Some(long_name) = &meta.long_name {
                    var_attrs.insert("long_name".to_string(), json!(long_name));
                }
            }
            self.build_array(
                storage.clone(),
                &format!("/{}", name),
                vec![n_loc, 0],
                vec![n_loc, time_chunk],
                DataType::Float32,
                FillValue::from(f32::NAN),
                4,
                var_attrs,
            )?;
        }

        // The group metadata marks the cell as created
        let mut builder = GroupBuilder::new();
        builder.attributes(attrs);
        let group = builder
            .build(storage.clone(), "/")
            .map_err(StoreError::zarr)?;
        group.store_metadata().map_err(StoreError::zarr)?;

        Ok(())
    }

    /// Whether `path` holds the group metadata and every array of a cell.
    fn is_created(&self, path: &Path) -> StoreResult<bool> {
        if !path.join("zarr.json").exists() {
            return Ok(false);
        }
        let group = Group::open(open_storage(path)?, "/").map_err(StoreError::zarr)?;
        let variables = stored_variables(group.attributes())?;
        Ok(CELL_ARRAYS
            .iter()
            .copied()
            .chain(variables.iter().map(String::as_str))
            .all(|name| path.join(name).join("zarr.json").exists()))
    }

    /// Check that an existing cell store holds the chunk's locations and variables.
    fn check_cell(&self, storage: &Arc<FilesystemStore>, chunk: &CellChunk) -> StoreResult<()> {
        let group = Group::open(storage.clone(), "/").map_err(StoreError::zarr)?;
        let stored: Vec<String> = stored_variables(group.attributes())?;
        let incoming: Vec<String> = chunk.values.keys().cloned().collect();
        if stored != incoming {
            return Err(StoreError::invalid_chunk(
                chunk.cell,
                format!("variables {:?} differ from stored {:?}", incoming, stored),
            ));
        }

        let location_id = Array::open(storage.clone(), "/location_id").map_err(StoreError::zarr)?;
        let n_loc = location_id.shape().first().copied().unwrap_or(0);
        let ids: Vec<u64> = location_id
            .retrieve_array_subset_elements(&subset(vec![0], vec![n_loc])?)
            .map_err(StoreError::zarr)?;
        if !ids.iter().copied().eq(chunk.gpis.iter().map(|g| *g as u64)) {
            return Err(StoreError::invalid_chunk(
                chunk.cell,
                "locations differ from the stored location_id",
            ));
        }
        Ok(())
    }
}

/// Variable names recorded in a cell group's attributes.
pub(crate) fn stored_variables(attrs: &Map<String, Value>) -> StoreResult<Vec<String>> {
    attrs
        .get("variables")
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .ok_or_else(|| StoreError::invalid_metadata("cell group has no variables attribute"))
}

impl TimeSeriesStore for ZarrCellStore {
    fn prepare(&self, grid: &GridSpec) -> StoreResult<()> {
        std::fs::create_dir_all(&self.root)?;
        write_grid(&self.root, grid)
    }

    fn append(&self, chunk: &CellChunk, metadata: &RunMetadata) -> StoreResult<()> {
        chunk.validate()?;

        let path = self.cell_path(chunk.cell);
        let created = !self.is_created(&path)?;
        if created && path.exists() {
            warn!(cell = chunk.cell, path = %path.display(), "Rebuilding incomplete cell store");
            std::fs::remove_dir_all(&path)?;
        }
        std::fs::create_dir_all(&path)?;
        let storage = open_storage(&path)?;

        if created {
            self.create_cell(&storage, chunk, metadata)?;
        } else {
            self.check_cell(&storage, chunk)?;
        }

        let mut time = Array::open(storage.clone(), "/time").map_err(StoreError::zarr)?;
        let t0 = time.shape().first().copied().unwrap_or(0);
        if t0 > 0 {
            let last: Vec<f64> = time
                .retrieve_array_subset_elements(&subset(vec![t0 - 1], vec![1])?)
                .map_err(StoreError::zarr)?;
            if let Some(last) = last.first().map(|d| from_days(*d)) {
                if chunk.times[0] <= last {
                    return Err(StoreError::NonMonotonicTime {
                        cell: chunk.cell,
                        last,
                        new: chunk.times[0],
                    });
                }
            }
        }

        let n_loc = chunk.n_locations() as u64;
        let n = chunk.n_times() as u64;

        for (name, values) in &chunk.values {
            let mut array =
                Array::open(storage.clone(), &format!("/{}", name)).map_err(StoreError::zarr)?;
            array.set_shape(vec![n_loc, t0 + n]);
            array.store_metadata().map_err(StoreError::zarr)?;
            array
                .store_array_subset_elements(&subset(vec![0, t0], vec![n_loc, n])?, values)
                .map_err(StoreError::zarr)?;
        }

        let days: Vec<f64> = chunk.times.iter().map(|t| to_days(*t)).collect();
        time.set_shape(vec![t0 + n]);
        time.store_array_subset_elements(&subset(vec![t0], vec![n])?, &days)
            .map_err(StoreError::zarr)?;
        // Extending `time` commits the append
        time.store_metadata().map_err(StoreError::zarr)?;

        debug!(
            cell = chunk.cell,
            locations = n_loc,
            times = n,
            total_times = t0 + n,
            created = created,
            "Appended cell chunk"
        );
        Ok(())
    }
}
