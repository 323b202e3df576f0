//! Image reading from synthetic and real MERRA-2 files.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use merra_common::{GridDefinition, ImageSource, Product};
use netcdf_parser::{ImageStack, MerraImageReader, NetCdfError};
use tempfile::tempdir;
use test_utils::fixtures::grids::coarse_grid;
use test_utils::fixtures::merra;
use test_utils::{
    archive_root_of, assert_approx_eq, fixture_day_path, require_test_file, MerraFileBuilder,
};

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2018, 10, 1, hour, 30, 0).unwrap()
}

/// Raw value stored for `(time_index, gpi)` in the synthetic files.
fn raw(t: usize, gpi: usize) -> f32 {
    (t * 100 + gpi) as f32 * 0.5
}

fn day_file(grid: &Arc<GridDefinition>, times: usize) -> MerraFileBuilder {
    MerraFileBuilder::new(grid.clone(), times)
        .variable("SFMC", "m-3 m-3", "water_surface_layer", raw)
        .variable("TSURF", "K", "surface_temperature_of_land_incl_snow", |t, gpi| {
            // 90°S row is fill, as over Antarctic ice in the real files
            if gpi < 12 {
                test_utils::MERRA_FILL_VALUE
            } else {
                250.0 + raw(t, gpi)
            }
        })
}

#[test]
fn reads_slice_at_hour_of_day() {
    let dir = tempdir().unwrap();
    let grid = Arc::new(coarse_grid());
    let path = dir.path().join("day.nc4");
    day_file(&grid, 24).write(&path);

    let reader = MerraImageReader::new(
        grid.clone(),
        Product::HourlyLand,
        vec!["SFMC".to_string(), "TSURF".to_string()],
    );
    let image = reader.read(&path, at(6)).unwrap();

    assert_eq!(image.timestamp(), at(6));
    assert_eq!(image.len(), grid.len());
    assert!(image.corrupt_variables().is_empty());

    let sfmc = image.values("SFMC").unwrap();
    for gpi in 0..grid.len() {
        assert_eq!(sfmc[gpi], raw(6, gpi));
    }

    let meta = image.variable_metadata("SFMC").unwrap();
    assert_eq!(meta.units.as_deref(), Some("m-3 m-3"));
    assert_eq!(meta.long_name.as_deref(), Some("water_surface_layer"));
}

#[test]
fn fill_values_become_nan() {
    let dir = tempdir().unwrap();
    let grid = Arc::new(coarse_grid());
    let path = dir.path().join("day.nc4");
    day_file(&grid, 24).write(&path);

    let reader = MerraImageReader::new(grid, Product::HourlyLand, vec!["TSURF".to_string()]);
    let tsurf = reader.read(&path, at(0)).unwrap().values("TSURF").unwrap().to_vec();

    assert!(tsurf[..12].iter().all(|v| v.is_nan()));
    assert!(tsurf[12..].iter().all(|v| v.is_finite()));
    assert_eq!(tsurf[12], 250.0 + raw(0, 12));
}

#[test]
fn missing_variable_is_nan_filled_and_flagged() {
    let dir = tempdir().unwrap();
    let grid = Arc::new(coarse_grid());
    let path = dir.path().join("day.nc4");
    day_file(&grid, 24).write(&path);

    let reader = MerraImageReader::new(
        grid.clone(),
        Product::HourlyLand,
        vec!["SFMC".to_string(), "GWETTOP".to_string()],
    );
    let image = reader.read(&path, at(0)).unwrap();

    assert_eq!(image.corrupt_variables(), &["GWETTOP".to_string()]);
    let gwettop = image.values("GWETTOP").unwrap();
    assert_eq!(gwettop.len(), grid.len());
    assert!(gwettop.iter().all(|v| v.is_nan()));
    assert!(image.values("SFMC").unwrap().iter().all(|v| v.is_finite()));
}

#[test]
fn short_time_dimension_flags_variables() {
    let dir = tempdir().unwrap();
    let grid = Arc::new(coarse_grid());
    let path = dir.path().join("short.nc4");
    day_file(&grid, 4).write(&path);

    let reader = MerraImageReader::new(grid, Product::HourlyLand, vec!["SFMC".to_string()]);
    let image = reader.read(&path, at(18)).unwrap();
    assert_eq!(image.corrupt_variables(), &["SFMC".to_string()]);
}

#[test]
fn grid_mismatch_flags_variables() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("day.nc4");
    day_file(&Arc::new(coarse_grid()), 24).write(&path);

    let reader = MerraImageReader::new(
        Arc::new(GridDefinition::merra()),
        Product::HourlyLand,
        vec!["SFMC".to_string()],
    );
    let image = reader.read(&path, at(0)).unwrap();
    assert_eq!(image.corrupt_variables(), &["SFMC".to_string()]);
    assert_eq!(image.len(), 207936);
}

#[test]
fn scale_and_offset_are_applied() {
    let dir = tempdir().unwrap();
    let grid = Arc::new(coarse_grid());
    let path = dir.path().join("packed.nc4");
    MerraFileBuilder::new(grid.clone(), 1)
        .packed_variable("PACKED", 0.5, 10.0, |_, gpi| gpi as f32)
        .write(&path);

    let reader = MerraImageReader::new(grid, Product::MonthlyLand, vec!["PACKED".to_string()]);
    let image = reader
        .read(&path, Utc.with_ymd_and_hms(2018, 10, 1, 0, 0, 0).unwrap())
        .unwrap();
    let values = image.values("PACKED").unwrap();
    assert_eq!(values[0], 10.0);
    assert_eq!(values[7], 13.5);
}

#[test]
fn unopenable_file_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("garbage.nc4");
    std::fs::write(&path, b"not a netcdf file").unwrap();

    let reader =
        MerraImageReader::new(
            Arc::new(coarse_grid()),
            Product::HourlyLand,
            vec!["SFMC".to_string()],
        );
    assert!(matches!(reader.read(&path, at(0)), Err(NetCdfError::FileOpen { .. })));
    assert!(matches!(
        reader.read(&dir.path().join("absent.nc4"), at(0)),
        Err(NetCdfError::FileOpen { .. })
    ));
}

#[test]
fn image_stack_resolves_archive_files() {
    let dir = tempdir().unwrap();
    let grid = Arc::new(coarse_grid());
    day_file(&grid, 24).write(
        &dir.path()
            .join("2018/10/MERRA2_400.tavg1_2d_lnd_Nx.20181001.nc4"),
    );

    let stack = ImageStack::new(dir.path(), grid, Product::HourlyLand, vec!["SFMC".to_string()]);
    let image = stack.read(at(12)).unwrap();
    assert_eq!(image.values("SFMC").unwrap()[3], raw(12, 3));

    let missing = stack.read(Utc.with_ymd_and_hms(2018, 10, 2, 0, 30, 0).unwrap());
    match missing {
        Err(NetCdfError::FileNotFound { pattern, .. }) => {
            assert_eq!(pattern, "MERRA2_*.tavg1_2d_lnd_Nx.20181002.nc4");
        }
        other => panic!("expected FileNotFound, got {:?}", other.map(|i| i.timestamp())),
    }
}

#[test]
fn sample_file_values() {
    let path = require_test_file!(&fixture_day_path());

    let variables: Vec<String> = merra::VARIABLES.iter().map(|v| v.to_string()).collect();
    let reader = MerraImageReader::new(
        Arc::new(GridDefinition::merra()),
        Product::HourlyLand,
        variables.clone(),
    );
    let image = reader.read(&path, at(0)).unwrap();

    assert_eq!(image.variables().collect::<Vec<_>>().len(), variables.len());
    assert_eq!(image.len(), 207936);
    for (name, expected) in merra::VARIABLES.iter().zip(merra::POINT_VALUES_0030) {
        assert_approx_eq!(image.values(name).unwrap()[merra::POINT_GPI], expected, 1e-4);
    }

    let sfmc = image.variable_metadata("SFMC").unwrap();
    assert_eq!(sfmc.units.as_deref(), Some(merra::SFMC_UNITS));
    assert_eq!(sfmc.long_name.as_deref(), Some(merra::SFMC_LONG_NAME));

    let rows = image.to_2d(reader.grid()).unwrap();
    assert_eq!(rows["SFMC"].len(), 361);
    assert_eq!(rows["SFMC"][0].len(), 576);
}

#[test]
fn sample_file_through_stack() {
    let path = require_test_file!(&fixture_day_path());
    let root = archive_root_of(&path).unwrap();

    let stack = ImageStack::new(
        root,
        Arc::new(GridDefinition::merra()),
        Product::HourlyLand,
        vec!["SFMC".to_string()],
    );
    for (hour, expected) in [0, 6, 12, 18].into_iter().zip(merra::POINT_SFMC_SIX_HOURLY) {
        let image = stack.read(at(hour)).unwrap();
        assert_approx_eq!(image.values("SFMC").unwrap()[merra::POINT_GPI], expected, 1e-5);
    }
}
