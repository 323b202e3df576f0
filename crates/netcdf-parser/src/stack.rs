//! Date-indexed access to a local MERRA-2 mirror.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use merra_common::{ArchiveLayout, GridDefinition, Image, ImageSource, Product};
use tracing::debug;

use crate::error::{NetCdfError, NetCdfResult};
use crate::reader::MerraImageReader;

/// Binds a data root and product layout to a reader.
///
/// `read(timestamp)` resolves the file holding that timestamp and reads the
/// image from it. Files are opened per call.
#[derive(Debug, Clone)]
pub struct ImageStack {
    root: PathBuf,
    layout: ArchiveLayout,
    reader: MerraImageReader,
}

impl ImageStack {
    pub fn new(
        root: impl Into<PathBuf>,
        grid: Arc<GridDefinition>,
        product: Product,
        variables: Vec<String>,
    ) -> Self {
        Self {
            root: root.into(),
            layout: product.layout(),
            reader: MerraImageReader::new(grid, product, variables),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn reader(&self) -> &MerraImageReader {
        &self.reader
    }

    /// Path of the file holding `timestamp`.
    pub fn locate(&self, timestamp: DateTime<Utc>) -> NetCdfResult<PathBuf> {
        let date = timestamp.date_naive();
        match self.layout.find_file(&self.root, date) {
            Some(path) => {
                debug!(timestamp = %timestamp, path = %path.display(), "Resolved image file");
                Ok(path)
            }
            None => Err(NetCdfError::FileNotFound {
                timestamp,
                dir: self.layout.local_dir(&self.root, date),
                pattern: self.layout.file.glob(date),
            }),
        }
    }
}

impl ImageSource for ImageStack {
    type Error = NetCdfError;

    fn read(&self, timestamp: DateTime<Utc>) -> Result<Image, Self::Error> {
        let path = self.locate(timestamp)?;
        self.reader.read(&path, timestamp)
    }
}
