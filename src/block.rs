//! Block shapes handed to consumers
//!
//! Every shape keeps the dataset index as its outermost dimension, so the
//! primary dataset is always index 0 and secondaries follow in the order
//! they were added.

use crate::dataset::SampleColumn;
use ndarray::{Array1, Array2, Array3, ArrayView2};
use std::ops::Range;
use std::sync::Arc;

/// A column slot: `None` marks a column filtered out by the region
pub type Column = Option<Arc<SampleColumn>>;

/// Rectangular tile of the grid, shaped (dataset, A, B)
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    a_start: usize,
    b_start: usize,
    columns: Array3<Column>,
}

impl Block {
    pub(crate) fn new(a_start: usize, b_start: usize, columns: Array3<Column>) -> Self {
        Self {
            a_start,
            b_start,
            columns,
        }
    }

    /// Number of datasets in the block
    pub fn num_datasets(&self) -> usize {
        self.columns.dim().0
    }

    /// Extent along A
    pub fn a_size(&self) -> usize {
        self.columns.dim().1
    }

    /// Extent along B
    pub fn b_size(&self) -> usize {
        self.columns.dim().2
    }

    /// Grid indices along A covered by the block
    pub fn a_range(&self) -> Range<usize> {
        self.a_start..self.a_start + self.a_size()
    }

    /// Grid indices along B covered by the block
    pub fn b_range(&self) -> Range<usize> {
        self.b_start..self.b_start + self.b_size()
    }

    /// Column at block-relative position, `None` if absent
    pub fn get(&self, dataset: usize, a: usize, b: usize) -> Option<&SampleColumn> {
        self.columns
            .get((dataset, a, b))
            .and_then(|slot| slot.as_deref())
    }

    /// All column slots
    pub fn columns(&self) -> &Array3<Column> {
        &self.columns
    }

    /// The (A, B) plane of one dataset
    pub fn dataset(&self, dataset: usize) -> ArrayView2<'_, Column> {
        self.columns.index_axis(ndarray::Axis(0), dataset)
    }

    /// Number of absent slots across all datasets
    pub fn absent_count(&self) -> usize {
        self.columns.iter().filter(|slot| slot.is_none()).count()
    }

    /// True if every slot is absent
    pub fn is_all_absent(&self) -> bool {
        self.columns.iter().all(Option::is_none)
    }

    /// Flatten each dataset's plane row-major into a slice
    pub fn into_slice(self) -> Slice {
        let (num_datasets, a_size, b_size) = self.columns.dim();
        let columns = Array2::from_shape_fn((num_datasets, a_size * b_size), |(d, i)| {
            self.columns[[d, i / b_size, i % b_size]].clone()
        });
        Slice {
            a_start: self.a_start,
            b_start: self.b_start,
            columns,
        }
    }
}

/// One line of columns per dataset, shaped (dataset, position)
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    a_start: usize,
    b_start: usize,
    columns: Array2<Column>,
}

impl Slice {
    /// Number of datasets in the slice
    pub fn num_datasets(&self) -> usize {
        self.columns.dim().0
    }

    /// Number of positions in the slice
    pub fn len(&self) -> usize {
        self.columns.dim().1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Grid origin (A, B) of the first position
    pub fn origin(&self) -> (usize, usize) {
        (self.a_start, self.b_start)
    }

    /// Column at a position, `None` if absent
    pub fn get(&self, dataset: usize, position: usize) -> Option<&SampleColumn> {
        self.columns
            .get((dataset, position))
            .and_then(|slot| slot.as_deref())
    }

    /// All column slots
    pub fn columns(&self) -> &Array2<Column> {
        &self.columns
    }

    /// Number of absent slots across all datasets
    pub fn absent_count(&self) -> usize {
        self.columns.iter().filter(|slot| slot.is_none()).count()
    }

    pub fn is_all_absent(&self) -> bool {
        self.columns.iter().all(Option::is_none)
    }
}

/// A single grid position across all datasets
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSet {
    a_index: usize,
    b_index: usize,
    columns: Array1<Column>,
}

impl ColumnSet {
    pub(crate) fn from_block(block: Block) -> Self {
        let num_datasets = block.num_datasets();
        let columns = Array1::from_shape_fn(num_datasets, |d| block.columns[[d, 0, 0]].clone());
        Self {
            a_index: block.a_start,
            b_index: block.b_start,
            columns,
        }
    }

    /// Grid position (A, B)
    pub fn position(&self) -> (usize, usize) {
        (self.a_index, self.b_index)
    }

    /// Number of datasets
    pub fn num_datasets(&self) -> usize {
        self.columns.len()
    }

    /// Column of one dataset, `None` if absent
    pub fn get(&self, dataset: usize) -> Option<&SampleColumn> {
        self.columns.get(dataset).and_then(|slot| slot.as_deref())
    }

    /// All column slots
    pub fn columns(&self) -> &Array1<Column> {
        &self.columns
    }

    /// True if the position was filtered out
    pub fn is_absent(&self) -> bool {
        self.columns.iter().all(Option::is_none)
    }
}

/// Cube of columns centred on one grid position, shaped (dataset, A, B)
///
/// The centre sits at cube index `(a_size / 2, b_size / 2)`. Cells past the
/// grid edge are absent, as are cells filtered out by the region.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighborhood {
    a_center: usize,
    b_center: usize,
    columns: Array3<Column>,
}

impl Neighborhood {
    pub(crate) fn new((a_center, b_center): (usize, usize), columns: Array3<Column>) -> Self {
        Self {
            a_center,
            b_center,
            columns,
        }
    }

    /// Grid position (A, B) of the centre
    pub fn center(&self) -> (usize, usize) {
        (self.a_center, self.b_center)
    }

    pub fn num_datasets(&self) -> usize {
        self.columns.dim().0
    }

    pub fn a_size(&self) -> usize {
        self.columns.dim().1
    }

    pub fn b_size(&self) -> usize {
        self.columns.dim().2
    }

    /// Column at cube-relative position, `None` if absent
    pub fn get(&self, dataset: usize, a: usize, b: usize) -> Option<&SampleColumn> {
        self.columns
            .get((dataset, a, b))
            .and_then(|slot| slot.as_deref())
    }

    /// Column at a signed offset from the centre, `None` if absent
    pub fn at_offset(&self, dataset: usize, da: isize, db: isize) -> Option<&SampleColumn> {
        let a = (self.a_size() / 2).checked_add_signed(da)?;
        let b = (self.b_size() / 2).checked_add_signed(db)?;
        self.get(dataset, a, b)
    }

    /// All column slots
    pub fn columns(&self) -> &Array3<Column> {
        &self.columns
    }

    pub fn absent_count(&self) -> usize {
        self.columns.iter().filter(|slot| slot.is_none()).count()
    }

    /// True if no dataset has a column anywhere in the cube
    pub fn is_all_absent(&self) -> bool {
        self.columns.iter().all(Option::is_none)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn column(a: usize, b: usize) -> Column {
        Some(Arc::new(SampleColumn {
            a_index: a,
            b_index: b,
            x: a as f64,
            y: b as f64,
            z_start: 0.0,
            z_delta: 1.0,
            samples: vec![(a * 10 + b) as f32],
        }))
    }

    fn create_test_block() -> Block {
        let columns = Array3::from_shape_fn((2, 2, 3), |(d, a, b)| {
            if d == 1 && b == 2 {
                None
            } else {
                column(5 + a, 7 + b)
            }
        });
        Block::new(5, 7, columns)
    }

    #[test]
    fn test_block_shape() {
        let block = create_test_block();
        assert_eq!(block.num_datasets(), 2);
        assert_eq!(block.a_range(), 5..7);
        assert_eq!(block.b_range(), 7..10);
        assert_eq!(block.absent_count(), 2);
        assert!(!block.is_all_absent());
        assert_eq!(block.get(0, 1, 2).unwrap().samples, vec![69.0]);
        assert!(block.get(1, 1, 2).is_none());
        assert!(block.get(2, 0, 0).is_none());
        assert_eq!(block.dataset(1).dim(), (2, 3));
    }

    #[test]
    fn test_into_slice_is_row_major() {
        let slice = create_test_block().into_slice();
        assert_eq!(slice.num_datasets(), 2);
        assert_eq!(slice.len(), 6);
        assert_eq!(slice.origin(), (5, 7));
        let order: Vec<(usize, usize)> = (0..6)
            .map(|i| {
                let c = slice.get(0, i).unwrap();
                (c.a_index, c.b_index)
            })
            .collect();
        assert_eq!(order, vec![(5, 7), (5, 8), (5, 9), (6, 7), (6, 8), (6, 9)]);
        assert_eq!(slice.absent_count(), 2);
    }

    #[test]
    fn test_column_set_from_block() {
        let columns = Array3::from_shape_fn((2, 1, 1), |(d, _, _)| {
            if d == 0 {
                column(3, 4)
            } else {
                None
            }
        });
        let set = ColumnSet::from_block(Block::new(3, 4, columns));
        assert_eq!(set.position(), (3, 4));
        assert_eq!(set.num_datasets(), 2);
        assert!(set.get(0).is_some());
        assert!(set.get(1).is_none());
        assert!(!set.is_absent());
    }

    #[test]
    fn test_neighborhood_offsets() {
        let columns = Array3::from_shape_fn((1, 3, 3), |(_, a, b)| {
            if a == 0 {
                None
            } else {
                column(3 + a, 6 + b)
            }
        });
        let cube = Neighborhood::new((4, 7), columns);
        assert_eq!(cube.center(), (4, 7));
        assert_eq!(cube.at_offset(0, 0, 0).unwrap().a_index, 4);
        assert_eq!(cube.at_offset(0, 1, -1).unwrap().b_index, 6);
        assert!(cube.at_offset(0, -1, 0).is_none());
        assert!(cube.at_offset(0, -2, 0).is_none());
        assert!(cube.at_offset(0, 0, 2).is_none());
        assert_eq!(cube.absent_count(), 3);
        assert!(!cube.is_all_absent());
        assert!(Neighborhood::new((0, 0), Array3::from_elem((2, 1, 1), None)).is_all_absent());
    }
}
