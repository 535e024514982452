//! Dataset abstraction - random access to rows and columns of sample-columns

use crate::error::{BlockError, Result};
use crate::geometry::GridGeometry;
use crate::types::TraversalOrder;
use ndarray::{s, Array3};
use std::ops::Range;

/// One column of samples at a fixed (A, B) grid position
#[derive(Debug, Clone, PartialEq)]
pub struct SampleColumn {
    /// Grid index along A
    pub a_index: usize,
    /// Grid index along B
    pub b_index: usize,
    /// World x
    pub x: f64,
    /// World y
    pub y: f64,
    /// Sample axis value of the first sample
    pub z_start: f64,
    /// Sample axis step
    pub z_delta: f64,
    /// Sample values
    pub samples: Vec<f32>,
}

impl SampleColumn {
    /// Number of samples in the column
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Trait for volume storage read by the traversal
///
/// Implementations own their retry policy; the traversal never retries
/// a failed read.
pub trait Dataset: Send + Sync {
    /// Display name used in error messages
    fn name(&self) -> &str;

    /// Grid geometry of the volume
    fn geometry(&self) -> &GridGeometry;

    /// Order in which the volume is cheapest to read
    fn preferred_order(&self) -> TraversalOrder {
        TraversalOrder::AMajor
    }

    /// Read the columns at line `a_index` for B indices in `b_range`
    fn read_row(
        &self,
        a_index: usize,
        b_range: Range<usize>,
        samples: Range<usize>,
    ) -> Result<Vec<SampleColumn>>;

    /// Read the columns at line `b_index` for A indices in `a_range`
    fn read_column(
        &self,
        b_index: usize,
        a_range: Range<usize>,
        samples: Range<usize>,
    ) -> Result<Vec<SampleColumn>>;

    /// World coordinate of a grid position
    fn coordinate_of(&self, a_index: usize, b_index: usize) -> (f64, f64) {
        self.geometry().xy_at(a_index, b_index)
    }
}

/// Check a request against a geometry before touching storage
pub(crate) fn check_request(
    geometry: &GridGeometry,
    line: usize,
    line_count: usize,
    range: &Range<usize>,
    range_count: usize,
    samples: &Range<usize>,
) -> Result<()> {
    if line >= line_count || range.start > range.end || range.end > range_count {
        return Err(BlockError::OutOfBounds(format!(
            "Line {} / range {:?} outside {} x {}",
            line,
            range,
            geometry.num_a(),
            geometry.num_b()
        )));
    }
    if samples.start >= samples.end || samples.end > geometry.num_samples() {
        return Err(BlockError::OutOfBounds(format!(
            "Sample range {:?} outside 0..{}",
            samples,
            geometry.num_samples()
        )));
    }
    Ok(())
}

/// In-memory volume backed by an `Array3<f32>` indexed (A, B, sample)
pub struct MemoryDataset {
    name: String,
    geometry: GridGeometry,
    data: Array3<f32>,
    preferred_order: TraversalOrder,
}

impl MemoryDataset {
    /// Create a dataset from an array shaped `(num_a, num_b, num_samples)`
    pub fn new(name: impl Into<String>, geometry: GridGeometry, data: Array3<f32>) -> Result<Self> {
        let expected = (geometry.num_a(), geometry.num_b(), geometry.num_samples());
        if data.dim() != expected {
            return Err(BlockError::InvalidArgument(format!(
                "Data shape {:?} does not match geometry {:?}",
                data.dim(),
                expected
            )));
        }
        Ok(Self {
            name: name.into(),
            geometry,
            data,
            preferred_order: TraversalOrder::AMajor,
        })
    }

    /// Create a dataset whose sample values come from a function of (a, b, sample)
    pub fn from_fn<F>(name: impl Into<String>, geometry: GridGeometry, f: F) -> Self
    where
        F: FnMut((usize, usize, usize)) -> f32,
    {
        let shape = (geometry.num_a(), geometry.num_b(), geometry.num_samples());
        Self {
            name: name.into(),
            geometry,
            data: Array3::from_shape_fn(shape, f),
            preferred_order: TraversalOrder::AMajor,
        }
    }

    /// Set the preferred traversal order
    pub fn with_preferred_order(mut self, order: TraversalOrder) -> Self {
        self.preferred_order = order;
        self
    }

    /// Underlying sample array
    pub fn data(&self) -> &Array3<f32> {
        &self.data
    }

    fn column(&self, a_index: usize, b_index: usize, samples: &Range<usize>) -> SampleColumn {
        let (x, y) = self.geometry.xy_at(a_index, b_index);
        let axis = &self.geometry.sample_axis;
        SampleColumn {
            a_index,
            b_index,
            x,
            y,
            z_start: axis.value_at(samples.start),
            z_delta: axis.delta,
            samples: self
                .data
                .slice(s![a_index, b_index, samples.clone()])
                .to_vec(),
        }
    }
}

impl Dataset for MemoryDataset {
    fn name(&self) -> &str {
        &self.name
    }

    fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    fn preferred_order(&self) -> TraversalOrder {
        self.preferred_order
    }

    fn read_row(
        &self,
        a_index: usize,
        b_range: Range<usize>,
        samples: Range<usize>,
    ) -> Result<Vec<SampleColumn>> {
        let g = &self.geometry;
        check_request(g, a_index, g.num_a(), &b_range, g.num_b(), &samples)?;
        Ok(b_range
            .map(|b| self.column(a_index, b, &samples))
            .collect())
    }

    fn read_column(
        &self,
        b_index: usize,
        a_range: Range<usize>,
        samples: Range<usize>,
    ) -> Result<Vec<SampleColumn>> {
        let g = &self.geometry;
        check_request(g, b_index, g.num_b(), &a_range, g.num_a(), &samples)?;
        Ok(a_range
            .map(|a| self.column(a, b_index, &samples))
            .collect())
    }
}
