//! Synthetic MERRA-2 style data.
//!
//! [`SyntheticSource`] produces in-memory images with values that can be
//! recomputed from `(variable, gpi, timestamp)`, so tests can check any
//! stored value without keeping the images around. [`MerraFileBuilder`]
//! writes the same kind of data to a NetCDF file laid out like a MERRA-2
//! land diagnostics file.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use merra_common::{GridDefinition, Image, ImageSource, VariableMetadata};

/// Deterministic value of `variable_index` at `gpi` and `timestamp`.
///
/// Values are multiples of 0.25 below 2^14 and therefore exact in `f32`.
pub fn synthetic_value(variable_index: usize, gpi: usize, timestamp: DateTime<Utc>) -> f32 {
    let hours = (timestamp.timestamp() / 3600) as usize;
    let mixed = (gpi * 31 + hours * 7 + variable_index * 1009) % 10007;
    mixed as f32 * 0.25
}

/// Error returned for timestamps a [`SyntheticSource`] was told to fail on.
#[derive(Debug, thiserror::Error)]
#[error("no synthetic image for {0}")]
pub struct MissingImage(pub DateTime<Utc>);

/// In-memory image source over a grid.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    grid: Arc<GridDefinition>,
    variables: Vec<String>,
    missing: BTreeSet<DateTime<Utc>>,
    corrupt: BTreeSet<String>,
}

impl SyntheticSource {
    pub fn new(grid: Arc<GridDefinition>, variables: &[&str]) -> Self {
        Self {
            grid,
            variables: variables.iter().map(|v| v.to_string()).collect(),
            missing: BTreeSet::new(),
            corrupt: BTreeSet::new(),
        }
    }

    /// Fail reads for `timestamp`.
    pub fn with_missing(mut self, timestamp: DateTime<Utc>) -> Self {
        self.missing.insert(timestamp);
        self
    }

    /// Deliver `variable` NaN-filled and flagged as corrupt.
    pub fn with_corrupt(mut self, variable: &str) -> Self {
        self.corrupt.insert(variable.to_string());
        self
    }

    /// Expected value of `variable` at `gpi`, as [`ImageSource::read`] produces it.
    pub fn expected(&self, variable: &str, gpi: usize, timestamp: DateTime<Utc>) -> Option<f32> {
        let index = self.variables.iter().position(|v| v == variable)?;
        if self.corrupt.contains(variable) {
            return Some(f32::NAN);
        }
        Some(synthetic_value(index, gpi, timestamp))
    }

    pub fn metadata_for(variable: &str) -> VariableMetadata {
        VariableMetadata::new("m-3 m-3", format!("synthetic_{}", variable.to_lowercase()))
    }
}

impl ImageSource for SyntheticSource {
    type Error = MissingImage;

    fn read(&self, timestamp: DateTime<Utc>) -> Result<Image, Self::Error> {
        if self.missing.contains(&timestamp) {
            return Err(MissingImage(timestamp));
        }

        let mut data = BTreeMap::new();
        let mut metadata = BTreeMap::new();
        for (index, name) in self.variables.iter().enumerate() {
            let values = if self.corrupt.contains(name) {
                vec![f32::NAN; self.grid.len()]
            } else {
                (0..self.grid.len())
                    .map(|gpi| synthetic_value(index, gpi, timestamp))
                    .collect()
            };
            data.insert(name.clone(), values);
            metadata.insert(name.clone(), Self::metadata_for(name));
        }

        let corrupt = self.corrupt.iter().cloned().collect();
        Ok(Image::new(timestamp, data, metadata, corrupt).expect("synthetic image is consistent"))
    }
}

/// One variable of a synthetic NetCDF file.
pub struct SyntheticVariable {
    pub name: String,
    pub units: String,
    pub long_name: String,
    /// Raw stored value for `(time_index, gpi)`
    pub values: Box<dyn Fn(usize, usize) -> f32>,
    pub scale_offset: Option<(f32, f32)>,
}

/// Writes NetCDF files shaped like MERRA-2 land diagnostics:
/// `time x lat x lon` Float32 variables with `_FillValue`/`missing_value`.
pub struct MerraFileBuilder {
    grid: Arc<GridDefinition>,
    times: usize,
    fill_value: f32,
    variables: Vec<SyntheticVariable>,
}

/// Fill value used by the MERRA-2 collections.
pub const MERRA_FILL_VALUE: f32 = 1.0e15;

impl MerraFileBuilder {
    /// A file with `times` steps along the time dimension.
    pub fn new(grid: Arc<GridDefinition>, times: usize) -> Self {
        Self {
            grid,
            times,
            fill_value: MERRA_FILL_VALUE,
            variables: Vec::new(),
        }
    }

    pub fn fill_value(&self) -> f32 {
        self.fill_value
    }

    /// Add a variable whose raw value at `(time_index, gpi)` is `values(t, gpi)`.
    pub fn variable(
        mut self,
        name: &str,
        units: &str,
        long_name: &str,
        values: impl Fn(usize, usize) -> f32 + 'static,
    ) -> Self {
        self.variables.push(SyntheticVariable {
            name: name.to_string(),
            units: units.to_string(),
            long_name: long_name.to_string(),
            values: Box::new(values),
            scale_offset: None,
        });
        self
    }

    /// Add a packed variable carrying `scale_factor` and `add_offset`.
    pub fn packed_variable(
        mut self,
        name: &str,
        scale_factor: f32,
        add_offset: f32,
        values: impl Fn(usize, usize) -> f32 + 'static,
    ) -> Self {
        self.variables.push(SyntheticVariable {
            name: name.to_string(),
            units: "1".to_string(),
            long_name: name.to_lowercase(),
            values: Box::new(values),
            scale_offset: Some((scale_factor, add_offset)),
        });
        self
    }

    /// Write the file to `path`, creating parent directories.
    pub fn write(&self, path: &Path) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent directories");
        }

        let mut file = netcdf::create(path).expect("failed to create NetCDF file");
        let (nx, ny) = (self.grid.nx(), self.grid.ny());

        file.add_dimension("time", self.times).expect("add dim time");
        file.add_dimension("lat", ny).expect("add dim lat");
        file.add_dimension("lon", nx).expect("add dim lon");

        {
            let lons: Vec<f64> = self.grid.lons().into_iter().take(nx).collect();
            let mut var = file.add_variable::<f64>("lon", &["lon"]).expect("add var lon");
            var.put_values(&lons, ..).expect("put lon values");
        }
        {
            let lats: Vec<f64> = self.grid.lats().into_iter().step_by(nx).collect();
            let mut var = file.add_variable::<f64>("lat", &["lat"]).expect("add var lat");
            var.put_values(&lats, ..).expect("put lat values");
        }
        {
            let minutes: Vec<i32> = (0..self.times).map(|t| t as i32 * 60 + 30).collect();
            let mut var = file.add_variable::<i32>("time", &["time"]).expect("add var time");
            var.put_values(&minutes, ..).expect("put time values");
        }

        for variable in &self.variables {
            let mut var = file
                .add_variable::<f32>(&variable.name, &["time", "lat", "lon"])
                .expect("add data variable");
            var.put_attribute("_FillValue", self.fill_value)
                .expect("add _FillValue");
            var.put_attribute("missing_value", self.fill_value)
                .expect("add missing_value");
            var.put_attribute("units", variable.units.as_str())
                .expect("add units");
            var.put_attribute("long_name", variable.long_name.as_str())
                .expect("add long_name");
            if let Some((scale, offset)) = variable.scale_offset {
                var.put_attribute("scale_factor", scale)
                    .expect("add scale_factor");
                var.put_attribute("add_offset", offset)
                    .expect("add add_offset");
            }

            let data: Vec<f32> = (0..self.times)
                .flat_map(|t| (0..self.grid.len()).map(move |gpi| (t, gpi)))
                .map(|(t, gpi)| (variable.values)(t, gpi))
                .collect();
            var.put_values(&data, ..).expect("put data values");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::grids::coarse_grid;
    use chrono::TimeZone;

    #[test]
    fn test_synthetic_source_matches_expected() {
        let grid = Arc::new(coarse_grid());
        let source = SyntheticSource::new(grid.clone(), &["SFMC", "TSURF"]);
        let ts = Utc.with_ymd_and_hms(2018, 10, 1, 6, 30, 0).unwrap();

        let image = source.read(ts).unwrap();
        assert_eq!(image.len(), grid.len());
        for gpi in 0..grid.len() {
            assert_eq!(
                image.values("TSURF").unwrap()[gpi],
                source.expected("TSURF", gpi, ts).unwrap()
            );
        }
    }

    #[test]
    fn test_synthetic_values_change_over_time() {
        let t0 = Utc.with_ymd_and_hms(2018, 10, 1, 0, 30, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2018, 10, 1, 6, 30, 0).unwrap();
        assert_ne!(synthetic_value(0, 5, t0), synthetic_value(0, 5, t1));
    }

    #[test]
    fn test_missing_timestamp_fails() {
        let ts = Utc.with_ymd_and_hms(2018, 10, 1, 0, 30, 0).unwrap();
        let source = SyntheticSource::new(Arc::new(coarse_grid()), &["SFMC"]).with_missing(ts);
        assert!(source.read(ts).is_err());
    }

    #[test]
    fn test_corrupt_variable_is_flagged() {
        let ts = Utc.with_ymd_and_hms(2018, 10, 1, 0, 30, 0).unwrap();
        let source =
            SyntheticSource::new(Arc::new(coarse_grid()), &["SFMC", "RZMC"]).with_corrupt("RZMC");
        let image = source.read(ts).unwrap();
        assert_eq!(image.corrupt_variables(), &["RZMC".to_string()]);
        assert!(image.values("RZMC").unwrap().iter().all(|v| v.is_nan()));
    }
}
