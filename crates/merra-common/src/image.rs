//! Immutable per-timestamp images and the source seam the reshuffler reads from.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{MerraError, MerraResult};
use crate::grid::GridDefinition;

/// Descriptive attributes of one variable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub units: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_name: Option<String>,
}

impl VariableMetadata {
    pub fn new(units: impl Into<String>, long_name: impl Into<String>) -> Self {
        Self {
            units: Some(units.into()),
            long_name: Some(long_name.into()),
        }
    }
}

/// One timestamp's worth of gridded data.
///
/// Every variable holds one value per grid point in gpi order. Missing
/// values are NaN. Variables that could not be read at all are NaN-filled
/// and listed in [`Image::corrupt_variables`].
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    timestamp: DateTime<Utc>,
    data: BTreeMap<String, Vec<f32>>,
    metadata: BTreeMap<String, VariableMetadata>,
    corrupt_variables: Vec<String>,
}

impl Image {
    /// Build an image, checking that all variables have the same length.
    pub fn new(
        timestamp: DateTime<Utc>,
        data: BTreeMap<String, Vec<f32>>,
        metadata: BTreeMap<String, VariableMetadata>,
        corrupt_variables: Vec<String>,
    ) -> MerraResult<Self> {
        let mut lengths = data.iter().map(|(name, values)| (name, values.len()));
        if let Some((first_name, first_len)) = lengths.next() {
            if let Some((name, len)) = lengths.find(|(_, len)| *len != first_len) {
                return Err(MerraError::invalid_image(format!(
                    "variable {} has {} values but {} has {}",
                    name, len, first_name, first_len
                )));
            }
        }

        if let Some(name) = corrupt_variables.iter().find(|v| !data.contains_key(*v)) {
            return Err(MerraError::invalid_image(format!(
                "corrupt variable {} has no data",
                name
            )));
        }

        Ok(Self {
            timestamp,
            data,
            metadata,
            corrupt_variables,
        })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Number of values per variable (0 for an image without variables).
    pub fn len(&self) -> usize {
        self.data.values().next().map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Variable names in sorted order.
    pub fn variables(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    pub fn values(&self, variable: &str) -> Option<&[f32]> {
        self.data.get(variable).map(Vec::as_slice)
    }

    pub fn data(&self) -> &BTreeMap<String, Vec<f32>> {
        &self.data
    }

    pub fn metadata(&self) -> &BTreeMap<String, VariableMetadata> {
        &self.metadata
    }

    pub fn variable_metadata(&self, variable: &str) -> Option<&VariableMetadata> {
        self.metadata.get(variable)
    }

    /// Variables that were missing or unreadable and are NaN-filled.
    pub fn corrupt_variables(&self) -> &[String] {
        &self.corrupt_variables
    }

    /// Reshape every variable to `ny` rows of `nx` values, north row first.
    pub fn to_2d(&self, grid: &GridDefinition) -> MerraResult<BTreeMap<String, Vec<Vec<f32>>>> {
        if self.len() != grid.len() {
            return Err(MerraError::invalid_image(format!(
                "image has {} values per variable, grid has {} points",
                self.len(),
                grid.len()
            )));
        }

        Ok(self
            .data
            .iter()
            .map(|(name, values)| {
                let rows = values
                    .chunks(grid.nx())
                    .rev()
                    .map(<[f32]>::to_vec)
                    .collect();
                (name.clone(), rows)
            })
            .collect())
    }
}

/// Anything that can produce the image for a timestamp.
pub trait ImageSource {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Read the image for `timestamp`.
    ///
    /// Errors mean the image could not be produced at all; per-variable
    /// problems are reported through [`Image::corrupt_variables`].
    fn read(&self, timestamp: DateTime<Utc>) -> Result<Image, Self::Error>;
}
