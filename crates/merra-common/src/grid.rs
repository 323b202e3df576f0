//! The fixed global point grid used by MERRA-2 and its partition into cells.
//!
//! Points are enumerated row-major with latitude as the outer loop, starting
//! at (-180°, -90°). For the GMAO grid this gives 361 rows of 576 points, so
//! `gpi = row * 576 + col` and the flattened `[lat][lon]` arrays of a MERRA-2
//! file line up with gpi order directly.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{MerraError, MerraResult};

/// GMAO longitude spacing in degrees.
pub const MERRA_LON_RES: f64 = 0.625;
/// GMAO latitude spacing in degrees.
pub const MERRA_LAT_RES: f64 = 0.5;
/// Cell latitude extent used when reshuffling.
pub const RESHUFFLE_CELL_LAT: f64 = 5.0;
/// Cell longitude extent used when reshuffling.
pub const RESHUFFLE_CELL_LON: f64 = 6.25;

/// Tolerance for floor/ceil on values that should be exact multiples.
const EPS: f64 = 1e-9;

/// Parameters that fully determine a grid.
///
/// This is what gets persisted next to the time series so that readers can
/// rebuild the exact same enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    /// Longitude step of the mesh in degrees
    pub lon_res: f64,
    /// Latitude step of the mesh in degrees
    pub lat_res: f64,
    /// Longitude extent of one cell in degrees
    pub cell_size_lon: f64,
    /// Latitude extent of one cell in degrees
    pub cell_size_lat: f64,
}

impl GridSpec {
    /// GMAO mesh partitioned into 5° x 6.25° cells.
    pub fn merra() -> Self {
        Self {
            lon_res: MERRA_LON_RES,
            lat_res: MERRA_LAT_RES,
            cell_size_lon: RESHUFFLE_CELL_LON,
            cell_size_lat: RESHUFFLE_CELL_LAT,
        }
    }

    /// GMAO mesh partitioned into square 5° cells.
    pub fn merra_cell_grid() -> Self {
        Self {
            cell_size_lon: 5.0,
            ..Self::merra()
        }
    }

    fn validate(&self) -> MerraResult<()> {
        let values = [
            ("lon_res", self.lon_res),
            ("lat_res", self.lat_res),
            ("cell_size_lon", self.cell_size_lon),
            ("cell_size_lat", self.cell_size_lat),
        ];
        for (name, value) in values {
            if !value.is_finite() || value <= 0.0 {
                return Err(MerraError::invalid_grid(format!(
                    "{} must be a positive number, got {}",
                    name, value
                )));
            }
        }
        if self.lon_res > 360.0 || self.lat_res > 180.0 {
            return Err(MerraError::invalid_grid(format!(
                "resolution {}x{} yields no grid points",
                self.lon_res, self.lat_res
            )));
        }
        Ok(())
    }
}

/// A single point of the grid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridPoint {
    pub gpi: usize,
    pub lon: f64,
    pub lat: f64,
    pub cell: u32,
}

/// Immutable global grid with a precomputed cell id per point.
#[derive(Debug, Clone)]
pub struct GridDefinition {
    spec: GridSpec,
    nx: usize,
    ny: usize,
    cells: Vec<u32>,
}

impl GridDefinition {
    /// Build a grid from its parameters.
    ///
    /// Fails if the parameters are not positive finite numbers or the mesh
    /// would contain no points.
    pub fn new(spec: GridSpec) -> MerraResult<Self> {
        spec.validate()?;

        // Same point counts as arange(-180, 180, dx) and arange(-90, 90 + dy/2, dy).
        let nx = (360.0 / spec.lon_res - EPS).ceil() as usize;
        let ny = ((180.0 + spec.lat_res / 2.0) / spec.lat_res - EPS).ceil() as usize;
        if nx == 0 || ny == 0 {
            return Err(MerraError::invalid_grid(format!(
                "resolution {}x{} yields no grid points",
                spec.lon_res, spec.lat_res
            )));
        }

        let mut grid = Self {
            spec,
            nx,
            ny,
            cells: Vec::new(),
        };
        grid.cells = (0..nx * ny)
            .map(|gpi| {
                let (lon, lat) = grid.coords(gpi);
                grid.cell_for(lon, lat)
            })
            .collect();

        Ok(grid)
    }

    /// The GMAO grid with 5° x 6.25° reshuffling cells.
    pub fn merra() -> Self {
        Self::from_known(GridSpec::merra())
    }

    /// The GMAO grid with square 5° cells.
    pub fn merra_cell_grid() -> Self {
        Self::from_known(GridSpec::merra_cell_grid())
    }

    fn from_known(spec: GridSpec) -> Self {
        match Self::new(spec) {
            Ok(grid) => grid,
            Err(e) => unreachable!("built-in grid spec is valid: {}", e),
        }
    }

    pub fn spec(&self) -> &GridSpec {
        &self.spec
    }

    /// Number of longitudes per row.
    pub fn nx(&self) -> usize {
        self.nx
    }

    /// Number of latitude rows.
    pub fn ny(&self) -> usize {
        self.ny
    }

    /// Total number of grid points.
    pub fn len(&self) -> usize {
        self.nx * self.ny
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn coords(&self, gpi: usize) -> (f64, f64) {
        let row = gpi / self.nx;
        let col = gpi % self.nx;
        (
            -180.0 + col as f64 * self.spec.lon_res,
            -90.0 + row as f64 * self.spec.lat_res,
        )
    }

    /// Look up a point by its index.
    pub fn point(&self, gpi: usize) -> Option<GridPoint> {
        let cell = *self.cells.get(gpi)?;
        let (lon, lat) = self.coords(gpi);
        Some(GridPoint { gpi, lon, lat, cell })
    }

    /// Cell id of a grid point.
    pub fn cell_of(&self, gpi: usize) -> Option<u32> {
        self.cells.get(gpi).copied()
    }

    /// Number of cell rows along the latitude axis.
    fn cell_rows(&self) -> u32 {
        (180.0 / self.spec.cell_size_lat - EPS).ceil().max(1.0) as u32
    }

    /// Number of cell columns along the longitude axis.
    fn cell_cols(&self) -> u32 {
        (360.0 / self.spec.cell_size_lon - EPS).ceil().max(1.0) as u32
    }

    /// Cell id for an arbitrary position.
    ///
    /// Cells are numbered column by column: `x * rows + y`. The 90°N row
    /// belongs to the topmost cell band.
    pub fn cell_for(&self, lon: f64, lat: f64) -> u32 {
        let rows = self.cell_rows();
        let cols = self.cell_cols();
        let x = ((lon + 180.0 + EPS) / self.spec.cell_size_lon).floor().max(0.0) as u32;
        let y = ((lat + 90.0 + EPS) / self.spec.cell_size_lat).floor().max(0.0) as u32;
        x.min(cols - 1) * rows + y.min(rows - 1)
    }

    /// Nearest grid point to a position.
    ///
    /// Longitudes wrap around the antimeridian. Returns `None` for non-finite
    /// input or a latitude more than half a step outside the mesh.
    pub fn nearest_gpi(&self, lon: f64, lat: f64) -> Option<usize> {
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }

        let half = self.spec.lat_res / 2.0;
        let max_lat = -90.0 + (self.ny - 1) as f64 * self.spec.lat_res;
        if lat < -90.0 - half || lat > max_lat + half {
            return None;
        }

        let lon = (lon + 180.0).rem_euclid(360.0);
        let col = (lon / self.spec.lon_res).round() as usize % self.nx;
        let row = (((lat + 90.0) / self.spec.lat_res).round().max(0.0) as usize).min(self.ny - 1);

        Some(row * self.nx + col)
    }

    /// Distinct cell ids in ascending order.
    pub fn cells(&self) -> Vec<u32> {
        self.cell_partition().into_keys().collect()
    }

    /// Grid points of one cell in ascending gpi order.
    pub fn gpis_in_cell(&self, cell: u32) -> Vec<usize> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| **c == cell)
            .map(|(gpi, _)| gpi)
            .collect()
    }

    /// All cells with their grid points, gpi-ascending within each cell.
    pub fn cell_partition(&self) -> BTreeMap<u32, Vec<usize>> {
        let mut partition: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (gpi, cell) in self.cells.iter().enumerate() {
            partition.entry(*cell).or_default().push(gpi);
        }
        partition
    }

    /// Longitudes of all points in gpi order.
    pub fn lons(&self) -> Vec<f64> {
        (0..self.len()).map(|gpi| self.coords(gpi).0).collect()
    }

    /// Latitudes of all points in gpi order.
    pub fn lats(&self) -> Vec<f64> {
        (0..self.len()).map(|gpi| self.coords(gpi).1).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merra_grid_size() {
        let grid = GridDefinition::merra();
        assert_eq!(grid.nx(), 576);
        assert_eq!(grid.ny(), 361);
        assert_eq!(grid.len(), 207936);
    }

    #[test]
    fn test_merra_cell_grid_point() {
        let grid = GridDefinition::merra_cell_grid();
        let point = grid.point(153426).unwrap();
        assert_eq!(point.gpi, 153426);
        assert_eq!(point.lat, 43.0);
        assert_eq!(point.lon, -48.75);
        assert_eq!(point.cell, 962);
    }

    #[test]
    fn test_first_and_last_points() {
        let grid = GridDefinition::merra();
        let first = grid.point(0).unwrap();
        assert_eq!((first.lon, first.lat), (-180.0, -90.0));

        let last = grid.point(grid.len() - 1).unwrap();
        assert_eq!((last.lon, last.lat), (179.375, 90.0));
        assert!(grid.point(grid.len()).is_none());
    }

    #[test]
    fn test_nearest_gpi_known_location() {
        let grid = GridDefinition::merra();
        assert_eq!(grid.nearest_gpi(16.375, 48.125), Some(159290));
    }

    #[test]
    fn test_nearest_gpi_wraps_longitude() {
        let grid = GridDefinition::merra();
        // 179.9 is closer to -180 than to 179.375
        assert_eq!(grid.nearest_gpi(179.9, 0.0), grid.nearest_gpi(-180.0, 0.0));
        assert_eq!(grid.nearest_gpi(540.0, 0.0), grid.nearest_gpi(180.0, 0.0));
    }

    #[test]
    fn test_nearest_gpi_out_of_bounds() {
        let grid = GridDefinition::merra();
        assert!(grid.nearest_gpi(0.0, 91.0).is_none());
        assert!(grid.nearest_gpi(0.0, -90.3).is_none());
        assert!(grid.nearest_gpi(f64::NAN, 0.0).is_none());
    }

    #[test]
    fn test_reshuffle_cell_ids() {
        let grid = GridDefinition::merra();
        // 6.25° columns, 36 rows of 5°
        assert_eq!(grid.cell_for(-180.0, -90.0), 0);
        assert_eq!(grid.cell_for(-180.0, 89.5), 35);
        assert_eq!(grid.cell_for(-180.0, 90.0), 35);
        assert_eq!(grid.cell_for(-173.75, -90.0), 36);
        assert_eq!(grid.cell_for(179.375, 90.0), 57 * 36 + 35);
    }

    #[test]
    fn test_invalid_specs_rejected() {
        let mut spec = GridSpec::merra();
        spec.lon_res = 0.0;
        assert!(GridDefinition::new(spec).is_err());

        let mut spec = GridSpec::merra();
        spec.cell_size_lat = f64::NAN;
        assert!(GridDefinition::new(spec).is_err());

        let mut spec = GridSpec::merra();
        spec.lat_res = 400.0;
        assert!(GridDefinition::new(spec).is_err());
    }

    #[test]
    fn test_gpis_in_cell_sorted() {
        let grid = GridDefinition::merra();
        let gpis = grid.gpis_in_cell(0);
        // 10 columns of 0.625° and 10 rows of 0.5° fit in the first cell
        assert_eq!(gpis.len(), 100);
        assert!(gpis.windows(2).all(|w| w[0] < w[1]));
    }
}
