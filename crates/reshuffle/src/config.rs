//! Reshuffling run configuration.

use merra_common::GridSpec;
use serde::{Deserialize, Serialize};
use timeseries_store::StoreConfig;

/// Default number of images held before a flush.
pub const DEFAULT_IMAGE_BUFFER: usize = 50;

/// Configuration of one reshuffling run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReshuffleConfig {
    /// Images held in memory before they are written out.
    pub image_buffer: usize,

    /// Latitude extent of a cell in degrees.
    pub cell_size_lat: f64,

    /// Longitude extent of a cell in degrees.
    pub cell_size_lon: f64,

    /// Cell store settings.
    pub store: StoreConfig,
}

impl Default for ReshuffleConfig {
    fn default() -> Self {
        let grid = GridSpec::merra();
        Self {
            image_buffer: DEFAULT_IMAGE_BUFFER,
            cell_size_lat: grid.cell_size_lat,
            cell_size_lon: grid.cell_size_lon,
            store: StoreConfig::default(),
        }
    }
}

impl ReshuffleConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self {
            store: StoreConfig::from_env(),
            ..Self::default()
        };

        if let Ok(val) = std::env::var("MERRA_IMG_BUFFER") {
            if let Ok(size) = val.parse() {
                config.image_buffer = size;
            }
        }

        if let Ok(val) = std::env::var("MERRA_CELL_SIZE_LAT") {
            if let Ok(size) = val.parse() {
                config.cell_size_lat = size;
            }
        }

        if let Ok(val) = std::env::var("MERRA_CELL_SIZE_LON") {
            if let Ok(size) = val.parse() {
                config.cell_size_lon = size;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.image_buffer == 0 {
            return Err("image_buffer must be > 0".to_string());
        }

        for (name, size) in [
            ("cell_size_lat", self.cell_size_lat),
            ("cell_size_lon", self.cell_size_lon),
        ] {
            if !size.is_finite() || size <= 0.0 {
                return Err(format!("{} must be a positive number, got {}", name, size));
            }
        }

        self.store.validate()
    }

    /// The GMAO mesh partitioned with the configured cell sizes.
    pub fn grid_spec(&self) -> GridSpec {
        GridSpec {
            cell_size_lat: self.cell_size_lat,
            cell_size_lon: self.cell_size_lon,
            ..GridSpec::merra()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ReshuffleConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.image_buffer, 50);
        assert_eq!(config.grid_spec(), GridSpec::merra());
    }

    #[test]
    fn test_invalid_config() {
        let config = ReshuffleConfig {
            image_buffer: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ReshuffleConfig {
            cell_size_lat: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut config = ReshuffleConfig::default();
        config.store.time_chunk = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_custom_cells() {
        let config = ReshuffleConfig {
            cell_size_lon: 5.0,
            ..Default::default()
        };
        assert_eq!(config.grid_spec(), GridSpec::merra_cell_grid());
    }
}
