//! Bounded image buffer and regrouping of its contents by cell.

use std::collections::BTreeMap;

use merra_common::{GridDefinition, Image};
use timeseries_store::CellChunk;

/// Holds up to `capacity` consecutive images.
#[derive(Debug)]
pub struct ImageBuffer {
    capacity: usize,
    images: Vec<Image>,
}

impl ImageBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            images: Vec::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.images.len() >= self.capacity
    }

    /// Add an image; returns true once the buffer is full.
    pub fn push(&mut self, image: Image) -> bool {
        self.images.push(image);
        self.is_full()
    }

    /// Remove and return the buffered images in arrival order.
    pub fn take(&mut self) -> Vec<Image> {
        std::mem::replace(&mut self.images, Vec::with_capacity(self.capacity))
    }
}

/// Regroup `images` into one chunk per cell of `partition`.
///
/// Locations keep ascending gpi order within a cell and times keep the order
/// of `images`. Every image must carry each of `variables` at full grid size.
pub fn regroup(
    images: &[Image],
    grid: &GridDefinition,
    partition: &BTreeMap<u32, Vec<usize>>,
    variables: &[String],
) -> Vec<CellChunk> {
    let times: Vec<_> = images.iter().map(Image::timestamp).collect();
    let columns: Vec<Vec<&[f32]>> = variables
        .iter()
        .map(|name| images.iter().filter_map(|img| img.values(name)).collect())
        .collect();

    partition
        .iter()
        .map(|(cell, gpis)| {
            let points: Vec<_> = gpis.iter().filter_map(|g| grid.point(*g)).collect();

            let values = variables
                .iter()
                .zip(&columns)
                .map(|(name, column)| {
                    let mut data = Vec::with_capacity(gpis.len() * images.len());
                    for gpi in gpis {
                        data.extend(column.iter().map(|values| values[*gpi]));
                    }
                    (name.clone(), data)
                })
                .collect();

            CellChunk {
                cell: *cell,
                gpis: gpis.clone(),
                lons: points.iter().map(|p| p.lon).collect(),
                lats: points.iter().map(|p| p.lat).collect(),
                times: times.clone(),
                values,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use merra_common::GridSpec;

    fn grid() -> GridDefinition {
        GridDefinition::new(GridSpec {
            lon_res: 90.0,
            lat_res: 90.0,
            cell_size_lon: 180.0,
            cell_size_lat: 180.0,
        })
        .unwrap()
    }

    fn image(grid: &GridDefinition, hour: i64) -> Image {
        let t0 = Utc.with_ymd_and_hms(2018, 10, 1, 0, 30, 0).unwrap();
        let values = (0..grid.len()).map(|gpi| (gpi * 10) as f32 + hour as f32).collect();
        let mut data = BTreeMap::new();
        data.insert("SFMC".to_string(), values);
        Image::new(t0 + Duration::hours(hour), data, BTreeMap::new(), Vec::new()).unwrap()
    }

    #[test]
    fn test_buffer_fills_and_empties() {
        let grid = grid();
        let mut buffer = ImageBuffer::new(2);
        assert!(!buffer.push(image(&grid, 0)));
        assert!(buffer.push(image(&grid, 1)));
        assert_eq!(buffer.take().len(), 2);
        assert!(buffer.is_empty());
        assert!(!buffer.is_full());
    }

    #[test]
    fn test_regroup_orders_locations_then_times() {
        let grid = grid();
        let images = vec![image(&grid, 0), image(&grid, 6)];
        let partition = grid.cell_partition();
        let chunks = regroup(&images, &grid, &partition, &["SFMC".to_string()]);

        assert_eq!(chunks.len(), partition.len());
        let total: usize = chunks.iter().map(|c| c.n_locations()).sum();
        assert_eq!(total, grid.len());

        for chunk in &chunks {
            assert!(chunk.validate().is_ok());
            assert!(chunk.gpis.windows(2).all(|w| w[0] < w[1]));
            for (loc, gpi) in chunk.gpis.iter().enumerate() {
                assert_eq!(chunk.value("SFMC", loc, 0), Some((gpi * 10) as f32));
                assert_eq!(chunk.value("SFMC", loc, 1), Some((gpi * 10) as f32 + 6.0));
            }
        }
    }
}
