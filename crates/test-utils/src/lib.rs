//! Test support for the MERRA-2 reshuffling crates.
//!
//! - [`fixtures`]: reference values of the MERRA-2 sample day and small grids
//! - [`generators`]: synthetic image sources and MERRA-2 shaped NetCDF files
//! - [`paths`]: lookup of the optional sample data
//!
//! Tests that need the real sample file skip themselves when it is absent:
//!
//! ```ignore
//! let path = test_utils::require_test_file!(&test_utils::fixture_day_path());
//! ```

pub mod fixtures;
pub mod generators;
pub mod paths;

pub use fixtures::*;
pub use generators::*;
pub use paths::*;

/// Resolve a sample data file with [`find_test_file`], or end the calling
/// test early with a `SKIPPED` note on stderr.
#[macro_export]
macro_rules! require_test_file {
    ($name:expr) => {{
        match $crate::find_test_file($name) {
            Some(path) => path,
            None => {
                eprintln!(
                    "SKIPPED: sample file '{}' not found (set TEST_DATA_DIR or fill testdata/)",
                    $name
                );
                return;
            }
        }
    }};
}

/// Assert `|left - right| <= epsilon`, comparing in `f64`.
#[macro_export]
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left = $left as f64;
        let right = $right as f64;
        let epsilon = $epsilon as f64;
        let diff = (left - right).abs();
        if !(diff <= epsilon) {
            panic!(
                "assertion failed: `(left ≈ right)`\n  left: `{:?}`\n right: `{:?}`\n  diff: `{:?}` > `{:?}`",
                left, right, diff, epsilon
            );
        }
    }};
}

/// Element-wise [`assert_approx_eq!`] over two sequences of equal length.
#[macro_export]
macro_rules! assert_series_approx_eq {
    ($left:expr, $right:expr, $epsilon:expr) => {{
        let left: Vec<f64> = $left.iter().map(|v| *v as f64).collect();
        let right: Vec<f64> = $right.iter().map(|v| *v as f64).collect();
        assert_eq!(left.len(), right.len(), "series lengths differ");
        for (l, r) in left.iter().zip(&right) {
            $crate::assert_approx_eq!(*l, *r, $epsilon);
        }
    }};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_approx_eq_within_epsilon() {
        assert_approx_eq!(0.218083_f32, 0.21808, 1e-5);
        assert_approx_eq!(-5.5, -5.500001, 1e-4);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_approx_eq_outside_epsilon() {
        assert_approx_eq!(277.24, 277.0, 0.1);
    }

    #[test]
    #[should_panic(expected = "assertion failed")]
    fn test_approx_eq_rejects_nan() {
        assert_approx_eq!(f32::NAN, 0.0, 1.0);
    }

    #[test]
    fn test_series_approx_eq() {
        assert_series_approx_eq!([0.5_f32, 1.0], vec![0.5000001, 0.9999999], 1e-5);
    }
}
