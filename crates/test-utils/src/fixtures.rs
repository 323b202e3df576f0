//! Known values of the MERRA-2 sample data.

/// The 2018-10-01 hourly land file and values read from it.
pub mod merra {
    /// Archive directory name of the hourly land product
    pub const PRODUCT_DIR: &str = "merra-test-data/M2T1NXLND.5.12.4";

    /// Sample day file, stored under `{PRODUCT_DIR}/2018/10/`
    pub const FIXTURE_DAY_FILE: &str = "MERRA2_400.tavg1_2d_lnd_Nx.20181001.nc4";

    /// Variables present in the sample file
    pub const VARIABLES: [&str; 6] = ["SFMC", "RZMC", "GWETPROF", "GWETROOT", "GWETTOP", "TSURF"];

    /// Reference location of the sample checks
    pub const POINT_LON: f64 = 16.375;
    pub const POINT_LAT: f64 = 48.125;

    /// Grid point nearest to the reference location
    pub const POINT_GPI: usize = 159290;

    /// Values at [`POINT_GPI`] on 2018-10-01T00:30, in [`VARIABLES`] order
    pub const POINT_VALUES_0030: [f32; 6] =
        [0.218083, 0.218432, 0.496459, 0.498425, 0.497566, 277.240417];

    /// SFMC at the reference point for 00:30, 06:30, 12:30 and 18:30
    pub const POINT_SFMC_SIX_HOURLY: [f32; 4] = [0.218083, 0.219587, 0.214836, 0.220690];

    pub const SFMC_UNITS: &str = "m-3 m-3";
    pub const SFMC_LONG_NAME: &str = "water_surface_layer";
}

/// Small grids that keep full-pipeline tests fast.
pub mod grids {
    use merra_common::{GridDefinition, GridSpec};

    /// 30° mesh (12 x 7 points) split into 60° x 60° cells.
    pub fn coarse_spec() -> GridSpec {
        GridSpec {
            lon_res: 30.0,
            lat_res: 30.0,
            cell_size_lon: 60.0,
            cell_size_lat: 60.0,
        }
    }

    pub fn coarse_grid() -> GridDefinition {
        GridDefinition::new(coarse_spec()).expect("coarse grid spec is valid")
    }
}
