//! Locating the optional MERRA-2 sample data.
//!
//! Sample files are not part of the repository. They are looked up below
//! `TEST_DATA_DIR`, then below `testdata/` at the workspace root.

use std::path::{Path, PathBuf};

use crate::fixtures::merra::{FIXTURE_DAY_FILE, PRODUCT_DIR};

/// Workspace root, two levels above this crate's manifest.
pub fn workspace_root() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    manifest_dir
        .ancestors()
        .nth(2)
        .unwrap_or(manifest_dir)
        .to_path_buf()
}

/// First existing `{dir}/{name}` over the sample data directories.
pub fn find_test_file(name: &str) -> Option<PathBuf> {
    let env_dir = std::env::var_os("TEST_DATA_DIR").map(PathBuf::from);
    env_dir
        .into_iter()
        .chain([workspace_root().join("testdata")])
        .map(|dir| dir.join(name))
        .find(|path| path.exists())
}

/// Relative path of the 2018-10-01 hourly sample file.
pub fn fixture_day_path() -> String {
    format!("{}/2018/10/{}", PRODUCT_DIR, FIXTURE_DAY_FILE)
}

/// Archive root (`.../M2T1NXLND.5.12.4`) of a day file laid out as
/// `{root}/{YYYY}/{MM}/{file}`.
pub fn archive_root_of(day_file: &Path) -> Option<PathBuf> {
    day_file.ancestors().nth(3).map(Path::to_path_buf)
}
