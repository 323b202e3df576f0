//! Values exchanged with the cell stores.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use merra_common::VariableMetadata;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Units of the stored `time` array.
pub const TIME_UNITS: &str = "days since 1900-01-01 00:00:00";

fn time_origin() -> DateTime<Utc> {
    NaiveDate::from_ymd_opt(1900, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Timestamp as fractional days since 1900-01-01.
pub fn to_days(timestamp: DateTime<Utc>) -> f64 {
    (timestamp - time_origin()).num_seconds() as f64 / 86_400.0
}

/// Inverse of [`to_days`], rounded to the second.
pub fn from_days(days: f64) -> DateTime<Utc> {
    time_origin() + Duration::seconds((days * 86_400.0).round() as i64)
}

/// Metadata captured once per run and written when a cell store is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Product name, e.g. `MERRA2_hourly`
    pub product_name: String,
    /// Per-variable attributes
    pub variables: BTreeMap<String, VariableMetadata>,
}

/// One flush worth of data for one cell.
///
/// `values` holds, per variable, `gpis.len() * times.len()` values in
/// location-major order: all timestamps of the first location, then all
/// timestamps of the second, and so on.
#[derive(Debug, Clone, PartialEq)]
pub struct CellChunk {
    pub cell: u32,
    pub gpis: Vec<usize>,
    pub lons: Vec<f64>,
    pub lats: Vec<f64>,
    pub times: Vec<DateTime<Utc>>,
    pub values: BTreeMap<String, Vec<f32>>,
}

impl CellChunk {
    pub fn n_locations(&self) -> usize {
        self.gpis.len()
    }

    pub fn n_times(&self) -> usize {
        self.times.len()
    }

    /// Value of `variable` at location index `loc` and time index `t`.
    pub fn value(&self, variable: &str, loc: usize, t: usize) -> Option<f32> {
        if loc >= self.n_locations() || t >= self.n_times() {
            return None;
        }
        self.values
            .get(variable)
            .and_then(|v| v.get(loc * self.n_times() + t))
            .copied()
    }

    /// Check that all arrays agree in size and timestamps ascend.
    pub fn validate(&self) -> StoreResult<()> {
        let n_loc = self.n_locations();
        if n_loc == 0 {
            return Err(StoreError::invalid_chunk(self.cell, "no locations"));
        }
        if self.times.is_empty() {
            return Err(StoreError::invalid_chunk(self.cell, "no timestamps"));
        }
        if self.lons.len() != n_loc || self.lats.len() != n_loc {
            return Err(StoreError::invalid_chunk(
                self.cell,
                format!(
                    "{} locations but {} lons and {} lats",
                    n_loc,
                    self.lons.len(),
                    self.lats.len()
                ),
            ));
        }
        if let Some(w) = self.times.windows(2).find(|w| w[0] >= w[1]) {
            return Err(StoreError::NonMonotonicTime {
                cell: self.cell,
                last: w[0],
                new: w[1],
            });
        }
        let expected = n_loc * self.n_times();
        if let Some((name, values)) = self.values.iter().find(|(_, v)| v.len() != expected) {
            return Err(StoreError::invalid_chunk(
                self.cell,
                format!("{} has {} values, expected {}", name, values.len(), expected),
            ));
        }
        Ok(())
    }
}

/// Full time series of one grid point.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    pub gpi: usize,
    pub lon: f64,
    pub lat: f64,
    pub times: Vec<DateTime<Utc>>,
    pub values: BTreeMap<String, Vec<f32>>,
    pub metadata: BTreeMap<String, VariableMetadata>,
}

impl TimeSeries {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn variable(&self, name: &str) -> Option<&[f32]> {
        self.values.get(name).map(Vec::as_slice)
    }
}

/// Global attributes of one cell store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellInfo {
    pub cell: u32,
    pub product_name: String,
    pub variables: Vec<String>,
    pub locations: usize,
    pub times: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn chunk() -> CellChunk {
        let t0 = Utc.with_ymd_and_hms(2018, 10, 1, 0, 30, 0).unwrap();
        let mut values = BTreeMap::new();
        // 2 locations x 3 times
        values.insert("SFMC".to_string(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        CellChunk {
            cell: 7,
            gpis: vec![10, 11],
            lons: vec![0.0, 0.625],
            lats: vec![0.0, 0.0],
            times: vec![t0, t0 + Duration::hours(6), t0 + Duration::hours(12)],
            values,
        }
    }

    #[test]
    fn test_value_is_location_major() {
        let c = chunk();
        assert_eq!(c.value("SFMC", 0, 2), Some(3.0));
        assert_eq!(c.value("SFMC", 1, 0), Some(4.0));
        assert_eq!(c.value("SFMC", 2, 0), None);
    }

    #[test]
    fn test_validate() {
        assert!(chunk().validate().is_ok());

        let mut c = chunk();
        c.values.get_mut("SFMC").unwrap().pop();
        assert!(matches!(c.validate(), Err(StoreError::InvalidChunk { .. })));

        let mut c = chunk();
        c.times.swap(0, 1);
        assert!(matches!(c.validate(), Err(StoreError::NonMonotonicTime { .. })));
    }

    #[test]
    fn test_days_since_1900() {
        let t = Utc.with_ymd_and_hms(1900, 1, 2, 12, 0, 0).unwrap();
        assert_eq!(to_days(t), 1.5);
        let t = Utc.with_ymd_and_hms(2018, 10, 1, 6, 30, 0).unwrap();
        assert_eq!(from_days(to_days(t)), t);
    }
}
