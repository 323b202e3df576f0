//! Whole-grid properties of the GMAO mesh and its cell partitions.

use merra_common::{GridDefinition, GridSpec};

#[test]
fn cells_partition_the_gpi_range() {
    for grid in [GridDefinition::merra(), GridDefinition::merra_cell_grid()] {
        let partition = grid.cell_partition();

        let mut seen = vec![false; grid.len()];
        for (cell, gpis) in &partition {
            assert!(gpis.windows(2).all(|w| w[0] < w[1]), "cell {} not sorted", cell);
            for gpi in gpis {
                assert!(!seen[*gpi], "gpi {} in more than one cell", gpi);
                seen[*gpi] = true;
                assert_eq!(grid.cell_of(*gpi), Some(*cell));
            }
        }
        assert!(seen.iter().all(|s| *s));
        assert_eq!(grid.cells(), partition.keys().copied().collect::<Vec<_>>());
    }
}

#[test]
fn reshuffle_cells_are_ten_by_ten_points() {
    let grid = GridDefinition::merra();
    // 6.25° x 5° cells: 10 longitudes x 10 latitudes, top band also holds 90°N
    let cells = grid.cells();
    assert_eq!(cells.len(), 58 * 36);
    assert_eq!(grid.gpis_in_cell(0).len(), 100);
    assert_eq!(grid.gpis_in_cell(35).len(), 110);
}

#[test]
fn nearest_lookup_within_half_step() {
    let grid = GridDefinition::merra();
    let spec = grid.spec();

    let mut lat = -90.0;
    while lat <= 90.0 {
        let mut lon = -180.0;
        while lon < 180.0 {
            let gpi = grid.nearest_gpi(lon, lat).unwrap();
            let point = grid.point(gpi).unwrap();

            let dlon = (point.lon - lon).abs();
            let dlon = dlon.min(360.0 - dlon);
            assert!(dlon <= spec.lon_res / 2.0 + 1e-9, "lon {} -> {}", lon, point.lon);
            assert!((point.lat - lat).abs() <= spec.lat_res / 2.0 + 1e-9);

            lon += 1.7;
        }
        lat += 1.3;
    }
}

#[test]
fn grid_points_round_trip_through_nearest() {
    let grid = GridDefinition::merra();
    for gpi in (0..grid.len()).step_by(997) {
        let point = grid.point(gpi).unwrap();
        assert_eq!(grid.nearest_gpi(point.lon, point.lat), Some(gpi));
    }
}

#[test]
fn grid_spec_survives_json() {
    let spec = GridSpec::merra();
    let json = serde_json::to_string(&spec).unwrap();
    let back: GridSpec = serde_json::from_str(&json).unwrap();
    assert_eq!(back, spec);
    assert_eq!(GridDefinition::new(back).unwrap().len(), 207936);
}
