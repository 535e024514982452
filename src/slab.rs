//! Windowed slab cache - the lines of the current slow-axis window
//!
//! A window is any contiguous range of slow-axis lines. Moving to the next
//! window keeps the lines both windows share and reads only the new ones;
//! lines that fall out of the window are evicted. The new window is assembled next to the old one and
//! swapped in once every read has succeeded, so a failed read leaves the
//! cache exactly as it was.

use crate::block::Column;
use crate::dataset::Dataset;
use crate::error::{BlockError, Result};
use crate::region::RegionFilter;
use ndarray::{s, Array3};
use std::ops::Range;
use std::sync::Arc;
use tracing::trace;

/// Which axis is blocked and shifted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// A is the slow axis: whole rows (fixed A) are cached
    AMajor,
    /// B is the slow axis: whole columns (fixed B) are cached
    BMajor,
}

/// Read counters of a traversal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TraversalStats {
    /// Lines read from storage, summed over datasets
    pub lines_read: u64,
    /// Lines carried over from the previous window, summed over datasets
    pub lines_reused: u64,
}

pub(crate) struct SlabCache {
    direction: Direction,
    datasets: Vec<Arc<dyn Dataset>>,
    sample_ranges: Vec<Range<usize>>,
    region: Option<Arc<dyn RegionFilter>>,
    max_lines: usize,
    fast_count: usize,
    /// (dataset, slot, fast index)
    slabs: Array3<Column>,
    window: Option<Range<usize>>,
    stats: TraversalStats,
}

impl SlabCache {
    pub(crate) fn new(
        direction: Direction,
        datasets: Vec<Arc<dyn Dataset>>,
        sample_ranges: Vec<Range<usize>>,
        region: Option<Arc<dyn RegionFilter>>,
        max_lines: usize,
        fast_count: usize,
    ) -> Self {
        Self {
            direction,
            datasets,
            sample_ranges,
            region,
            max_lines,
            fast_count,
            slabs: Array3::from_elem((0, 0, 0), None),
            window: None,
            stats: TraversalStats::default(),
        }
    }

    pub(crate) fn stats(&self) -> TraversalStats {
        self.stats
    }

    /// Column at a window slot and fast-axis index
    pub(crate) fn column(&self, dataset: usize, slot: usize, fast: usize) -> &Column {
        &self.slabs[[dataset, slot, fast]]
    }

    /// Column at a grid line and fast-axis index; `None` if either lies
    /// outside the current window
    pub(crate) fn cached(&self, dataset: usize, line: usize, fast: usize) -> Option<&Column> {
        let window = self.window.as_ref()?;
        if !window.contains(&line) || fast >= self.fast_count {
            return None;
        }
        Some(&self.slabs[[dataset, line - window.start, fast]])
    }

    /// Make `lines` along the slow axis the current window
    pub(crate) fn load(&mut self, lines: Range<usize>) -> Result<()> {
        if self.window.as_ref() == Some(&lines) {
            return Ok(());
        }

        let new_start = lines.start;
        let new_size = lines.len();
        let shape = (
            self.datasets.len(),
            self.max_lines.max(new_size),
            self.fast_count,
        );
        let mut slabs = Array3::from_elem(shape, None);

        // Lines shared with the current window move over without a read.
        let mut reused = 0;
        if let Some(old) = &self.window {
            if old.start <= new_start && new_start < old.end {
                reused = (old.end - new_start).min(new_size);
                let shift = new_start - old.start;
                let carried = self.slabs.slice(s![.., shift..shift + reused, ..]);
                slabs.slice_mut(s![.., 0..reused, ..]).assign(&carried);
            }
        }

        for (d, dataset) in self.datasets.iter().enumerate() {
            for slot in reused..new_size {
                let line = new_start + slot;
                let columns = self.read_line(dataset.as_ref(), &self.sample_ranges[d], line)?;
                slabs
                    .slice_mut(s![d, slot, ..])
                    .iter_mut()
                    .zip(columns)
                    .for_each(|(dst, src)| *dst = src);
            }
        }

        let num_datasets = self.datasets.len() as u64;
        self.stats.lines_reused += reused as u64 * num_datasets;
        self.stats.lines_read += (new_size - reused) as u64 * num_datasets;
        trace!(
            start = new_start,
            size = new_size,
            reused,
            "slab window loaded"
        );

        self.slabs = slabs;
        self.window = Some(lines);
        Ok(())
    }

    /// Read one full line along the fast axis, applying the region filter
    fn read_line(
        &self,
        dataset: &dyn Dataset,
        samples: &Range<usize>,
        line: usize,
    ) -> Result<Vec<Column>> {
        let fast = 0..self.fast_count;
        let columns = match self.direction {
            Direction::AMajor => dataset.read_row(line, fast, samples.clone())?,
            Direction::BMajor => dataset.read_column(line, fast, samples.clone())?,
        };
        if columns.len() != self.fast_count {
            return Err(BlockError::Storage(format!(
                "Short read from {}: line {} returned {} of {} columns",
                dataset.name(),
                line,
                columns.len(),
                self.fast_count
            )));
        }

        Ok(columns
            .into_iter()
            .enumerate()
            .map(|(i, column)| {
                let (a, b) = match self.direction {
                    Direction::AMajor => (line, i),
                    Direction::BMajor => (i, line),
                };
                match &self.region {
                    Some(region) => {
                        let (x, y) = dataset.coordinate_of(a, b);
                        region.contains(x, y).then(|| Arc::new(column))
                    }
                    None => Some(Arc::new(column)),
                }
            })
            .collect())
    }
}
