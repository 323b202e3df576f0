//! `grid.json` next to the cell stores, so readers rebuild the same grid.

use std::path::Path;

use merra_common::GridSpec;

use crate::error::{StoreError, StoreResult};

pub const GRID_FILE: &str = "grid.json";

/// Write `spec` to `{root}/grid.json`.
///
/// An existing file must describe the same grid; appending a run on another
/// grid to the same root would mix gpi enumerations.
pub fn write_grid(root: &Path, spec: &GridSpec) -> StoreResult<()> {
    if let Some(existing) = read_grid_if_present(root)? {
        if existing != *spec {
            return Err(StoreError::GridMismatch(format!(
                "{} holds {:?}, run uses {:?}",
                root.display(),
                existing,
                spec
            )));
        }
        return Ok(());
    }

    std::fs::create_dir_all(root)?;
    let json = serde_json::to_string_pretty(spec)?;
    std::fs::write(root.join(GRID_FILE), json)?;
    Ok(())
}

/// Read `{root}/grid.json`.
pub fn read_grid(root: &Path) -> StoreResult<GridSpec> {
    read_grid_if_present(root)?.ok_or_else(|| {
        StoreError::invalid_metadata(format!("{} has no {}", root.display(), GRID_FILE))
    })
}

fn read_grid_if_present(root: &Path) -> StoreResult<Option<GridSpec>> {
    let path = root.join(GRID_FILE);
    if !path.exists() {
        return Ok(None);
    }
    let json = std::fs::read_to_string(path)?;
    Ok(Some(serde_json::from_str(&json)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        write_grid(dir.path(), &GridSpec::merra()).unwrap();
        assert_eq!(read_grid(dir.path()).unwrap(), GridSpec::merra());
        // same grid again is fine
        write_grid(dir.path(), &GridSpec::merra()).unwrap();
    }

    #[test]
    fn test_other_grid_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_grid(dir.path(), &GridSpec::merra()).unwrap();
        let result = write_grid(dir.path(), &GridSpec::merra_cell_grid());
        assert!(matches!(result, Err(StoreError::GridMismatch(_))));
    }

    #[test]
    fn test_missing_grid_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_grid(dir.path()).is_err());
    }
}
