//! Directional traversal - walks the block grid in A-major or B-major order
//!
//! The slow axis is blocked and cached through the [`SlabCache`]; the fast
//! axis is carved out of the cached full-width lines at each step. Blocks are
//! always shaped (dataset, A, B), whichever axis is slow.
//!
//! The neighborhood strategy walks grid positions instead of blocks and
//! carves a cube centred on each one; cells beyond the grid edge stay absent.

use crate::block::{Block, Column, Neighborhood};
use crate::dataset::Dataset;
use crate::error::{BlockError, Result};
use crate::progress::{LoopState, ProgressHandle, ProgressTracker};
use crate::region::RegionFilter;
use crate::slab::{Direction, SlabCache, TraversalStats};
use crate::tiling::{AxisTiling, TilingPlan};
use ndarray::Array3;
use std::ops::Range;
use std::sync::Arc;
use tracing::debug;

/// Everything a strategy needs, checked by the cursor builder
pub(crate) struct TraversalParts {
    pub(crate) direction: Direction,
    /// Primary first; grids already checked to match
    pub(crate) datasets: Vec<Arc<dyn Dataset>>,
    pub(crate) sample_ranges: Vec<Range<usize>>,
    pub(crate) region: Option<Arc<dyn RegionFilter>>,
    pub(crate) plan: TilingPlan,
}

fn slow_fast(direction: Direction, plan: &TilingPlan) -> (&AxisTiling, &AxisTiling) {
    match direction {
        Direction::AMajor => (&plan.a, &plan.b),
        Direction::BMajor => (&plan.b, &plan.a),
    }
}

/// Loop indices (slow, fast) of the step after `state`
fn next_loops(
    direction: Direction,
    plan: &TilingPlan,
    state: &LoopState,
    started: bool,
) -> (usize, usize) {
    let (mut slow_loop, mut fast_loop) = match direction {
        Direction::AMajor => (state.a_loop, state.b_loop),
        Direction::BMajor => (state.b_loop, state.a_loop),
    };
    if started {
        fast_loop += 1;
        if fast_loop >= slow_fast(direction, plan).1.num_loops() {
            slow_loop += 1;
            fast_loop = 0;
        }
    }
    (slow_loop, fast_loop)
}

fn publish_step(
    tracker: &ProgressTracker,
    direction: Direction,
    previous: &LoopState,
    (slow_loop, fast_loop): (usize, usize),
) {
    let (a_loop, b_loop) = match direction {
        Direction::AMajor => (slow_loop, fast_loop),
        Direction::BMajor => (fast_loop, slow_loop),
    };
    tracker.publish(LoopState {
        current_loop: previous.current_loop + 1,
        a_loop,
        b_loop,
    });
}

pub(crate) struct DirectionalStrategy {
    direction: Direction,
    cache: SlabCache,
    tracker: Arc<ProgressTracker>,
    num_datasets: usize,
    initialized: bool,
}

impl DirectionalStrategy {
    pub(crate) fn new(parts: TraversalParts) -> Self {
        let TraversalParts {
            direction,
            datasets,
            sample_ranges,
            region,
            plan,
        } = parts;
        let geometry = datasets[0].geometry().clone();
        let (slow, fast) = slow_fast(direction, &plan);
        let (max_lines, fast_count) = (slow.max_block_size(), fast.count());
        let num_datasets = datasets.len();
        let cache = SlabCache::new(direction, datasets, sample_ranges, region, max_lines, fast_count);
        let tracker = ProgressTracker::new(plan, geometry.a_axis, geometry.b_axis);

        Self {
            direction,
            cache,
            tracker: Arc::new(tracker),
            num_datasets,
            initialized: false,
        }
    }

    pub(crate) fn direction(&self) -> Direction {
        self.direction
    }

    pub(crate) fn num_datasets(&self) -> usize {
        self.num_datasets
    }

    pub(crate) fn plan(&self) -> &TilingPlan {
        self.tracker.plan()
    }

    pub(crate) fn progress(&self) -> ProgressHandle {
        ProgressHandle::new(Arc::clone(&self.tracker))
    }

    pub(crate) fn stats(&self) -> TraversalStats {
        self.cache.stats()
    }

    pub(crate) fn has_next(&self) -> bool {
        self.tracker.snapshot().current_loop < self.plan().total_loops()
    }

    /// Produce the next block
    pub(crate) fn advance(&mut self) -> Result<Block> {
        let tracker = Arc::clone(&self.tracker);
        let plan = tracker.plan();
        let state = tracker.snapshot();
        if state.current_loop >= plan.total_loops() {
            return Err(BlockError::Exhausted);
        }
        let (slow_tiling, fast_tiling) = slow_fast(self.direction, plan);
        let (slow_loop, fast_loop) = next_loops(self.direction, plan, &state, self.initialized);

        // Loop state is only published once the window is in place, so a
        // failed read can be retried by calling advance again.
        self.cache.load(slow_tiling.block_range(slow_loop))?;
        self.initialized = true;

        let slow_size = slow_tiling.block_size(slow_loop);
        let fast_start = fast_tiling.block_start(fast_loop);
        let fast_size = fast_tiling.block_size(fast_loop);
        let block = match self.direction {
            Direction::AMajor => {
                let columns = self.carve((slow_size, fast_size), |d, a, b| {
                    self.cache.column(d, a, fast_start + b)
                });
                Block::new(slow_tiling.block_start(slow_loop), fast_start, columns)
            }
            Direction::BMajor => {
                let columns = self.carve((fast_size, slow_size), |d, a, b| {
                    self.cache.column(d, b, fast_start + a)
                });
                Block::new(fast_start, slow_tiling.block_start(slow_loop), columns)
            }
        };

        publish_step(&tracker, self.direction, &state, (slow_loop, fast_loop));
        debug!(
            loop_index = state.current_loop,
            total = plan.total_loops(),
            a = ?block.a_range(),
            b = ?block.b_range(),
            "block produced"
        );

        Ok(block)
    }

    fn carve<'a, F>(&'a self, (a_size, b_size): (usize, usize), column: F) -> Array3<Column>
    where
        F: Fn(usize, usize, usize) -> &'a Column,
    {
        Array3::from_shape_fn((self.num_datasets, a_size, b_size), |(d, a, b)| {
            column(d, a, b).clone()
        })
    }
}

/// Lines `[center - size / 2, center - size / 2 + size)` clipped to `0..count`
fn clipped_window(center: usize, size: usize, count: usize) -> Range<usize> {
    let start = center.saturating_sub(size / 2);
    let end = (center + size - size / 2).min(count);
    start..end
}

/// Grid line of cube offset `i` around `center`, if it exists
fn cube_line(center: usize, size: usize, i: usize, count: usize) -> Option<usize> {
    (center + i)
        .checked_sub(size / 2)
        .filter(|line| *line < count)
}

/// Walks every grid position on the increment lattice and carves a
/// `cube_a x cube_b` neighborhood centred on it
pub(crate) struct NeighborhoodStrategy {
    direction: Direction,
    cache: SlabCache,
    tracker: Arc<ProgressTracker>,
    num_datasets: usize,
    /// Cube extent (A, B)
    cube: (usize, usize),
    /// Grid extent (A, B)
    grid: (usize, usize),
    initialized: bool,
}

impl NeighborhoodStrategy {
    /// `parts.plan` holds the centre lattice: unit blocks at the increments
    pub(crate) fn new(parts: TraversalParts, cube: (usize, usize)) -> Self {
        let TraversalParts {
            direction,
            datasets,
            sample_ranges,
            region,
            plan,
        } = parts;
        let geometry = datasets[0].geometry().clone();
        let grid = (geometry.num_a(), geometry.num_b());
        let (max_lines, fast_count) = match direction {
            Direction::AMajor => (cube.0, grid.1),
            Direction::BMajor => (cube.1, grid.0),
        };
        let num_datasets = datasets.len();
        let cache = SlabCache::new(direction, datasets, sample_ranges, region, max_lines, fast_count);
        let tracker = ProgressTracker::new(plan, geometry.a_axis, geometry.b_axis);

        Self {
            direction,
            cache,
            tracker: Arc::new(tracker),
            num_datasets,
            cube,
            grid,
            initialized: false,
        }
    }

    pub(crate) fn direction(&self) -> Direction {
        self.direction
    }

    pub(crate) fn num_datasets(&self) -> usize {
        self.num_datasets
    }

    pub(crate) fn cube_shape(&self) -> (usize, usize) {
        self.cube
    }

    pub(crate) fn progress(&self) -> ProgressHandle {
        ProgressHandle::new(Arc::clone(&self.tracker))
    }

    pub(crate) fn stats(&self) -> TraversalStats {
        self.cache.stats()
    }

    pub(crate) fn total_loops(&self) -> usize {
        self.tracker.plan().total_loops()
    }

    pub(crate) fn has_next(&self) -> bool {
        self.tracker.snapshot().current_loop < self.total_loops()
    }

    /// Produce the neighborhood of the next centre
    pub(crate) fn advance(&mut self) -> Result<Neighborhood> {
        let tracker = Arc::clone(&self.tracker);
        let plan = tracker.plan();
        let state = tracker.snapshot();
        if state.current_loop >= plan.total_loops() {
            return Err(BlockError::Exhausted);
        }
        let (slow_tiling, fast_tiling) = slow_fast(self.direction, plan);
        let (slow_loop, fast_loop) = next_loops(self.direction, plan, &state, self.initialized);
        let slow_center = slow_tiling.block_start(slow_loop);
        let fast_center = fast_tiling.block_start(fast_loop);

        let (slow_cube, slow_count) = match self.direction {
            Direction::AMajor => (self.cube.0, self.grid.0),
            Direction::BMajor => (self.cube.1, self.grid.1),
        };
        self.cache
            .load(clipped_window(slow_center, slow_cube, slow_count))?;
        self.initialized = true;

        let (a_center, b_center) = match self.direction {
            Direction::AMajor => (slow_center, fast_center),
            Direction::BMajor => (fast_center, slow_center),
        };
        let (cube_a, cube_b) = self.cube;
        let (num_a, num_b) = self.grid;
        let columns = Array3::from_shape_fn((self.num_datasets, cube_a, cube_b), |(d, i, j)| {
            let a = cube_line(a_center, cube_a, i, num_a);
            let b = cube_line(b_center, cube_b, j, num_b);
            let (slow, fast) = match self.direction {
                Direction::AMajor => (a, b),
                Direction::BMajor => (b, a),
            };
            match (slow, fast) {
                (Some(slow), Some(fast)) => self.cache.cached(d, slow, fast).cloned().flatten(),
                _ => None,
            }
        });

        publish_step(&tracker, self.direction, &state, (slow_loop, fast_loop));
        debug!(
            loop_index = state.current_loop,
            total = plan.total_loops(),
            a = a_center,
            b = b_center,
            "neighborhood produced"
        );

        Ok(Neighborhood::new((a_center, b_center), columns))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::MemoryDataset;
    use crate::geometry::GridGeometry;
    use crate::types::AxisRange;

    fn create_test_dataset(num_a: usize, num_b: usize) -> Arc<dyn Dataset> {
        let geometry = GridGeometry::new(
            AxisRange::with_count("Inline", 0.0, 1.0, num_a).unwrap(),
            AxisRange::with_count("Crossline", 0.0, 1.0, num_b).unwrap(),
            AxisRange::with_count("Time", 0.0, 4.0, 2).unwrap(),
        );
        Arc::new(MemoryDataset::from_fn("strategy", geometry, |(a, b, s)| {
            (a * 100 + b * 10 + s) as f32
        }))
    }

    fn create_strategy(direction: Direction, a: (usize, usize), b: (usize, usize)) -> DirectionalStrategy {
        let ds = create_test_dataset(7, 5);
        let plan = TilingPlan::new(
            AxisTiling::new(7, a.0, a.1).unwrap(),
            AxisTiling::new(5, b.0, b.1).unwrap(),
        );
        DirectionalStrategy::new(TraversalParts {
            direction,
            datasets: vec![ds],
            sample_ranges: vec![0..2],
            region: None,
            plan,
        })
    }

    fn create_neighborhoods(direction: Direction, cube: (usize, usize)) -> NeighborhoodStrategy {
        let ds = create_test_dataset(7, 5);
        let plan = TilingPlan::new(
            AxisTiling::new(7, 1, 1).unwrap(),
            AxisTiling::new(5, 1, 1).unwrap(),
        );
        let parts = TraversalParts {
            direction,
            datasets: vec![ds],
            sample_ranges: vec![0..2],
            region: None,
            plan,
        };
        NeighborhoodStrategy::new(parts, cube)
    }

    fn ranges(strategy: &mut DirectionalStrategy) -> Vec<(Range<usize>, Range<usize>)> {
        let mut out = Vec::new();
        while strategy.has_next() {
            let block = strategy.advance().unwrap();
            out.push((block.a_range(), block.b_range()));
        }
        out
    }

    #[test]
    fn test_a_major_order() {
        let mut strategy = create_strategy(Direction::AMajor, (3, 2), (3, 3));
        assert_eq!(
            ranges(&mut strategy),
            vec![
                (0..3, 0..3),
                (0..3, 3..5),
                (2..5, 0..3),
                (2..5, 3..5),
                (4..7, 0..3),
                (4..7, 3..5),
            ]
        );
        assert!(matches!(strategy.advance(), Err(BlockError::Exhausted)));
    }

    #[test]
    fn test_b_major_order() {
        let mut strategy = create_strategy(Direction::BMajor, (4, 4), (2, 2));
        assert_eq!(
            ranges(&mut strategy),
            vec![
                (0..4, 0..2),
                (4..7, 0..2),
                (0..4, 2..4),
                (4..7, 2..4),
                (0..4, 4..5),
                (4..7, 4..5),
            ]
        );
    }

    #[test]
    fn test_blocks_are_a_by_b_in_both_directions() {
        for direction in [Direction::AMajor, Direction::BMajor] {
            let mut strategy = create_strategy(direction, (2, 2), (3, 3));
            let block = strategy.advance().unwrap();
            assert_eq!((block.a_size(), block.b_size()), (2, 3));
            let column = block.get(0, 1, 2).unwrap();
            assert_eq!((column.a_index, column.b_index), (1, 2));
            assert_eq!(column.samples, vec![120.0, 121.0]);
        }
    }

    #[test]
    fn test_clipped_window() {
        assert_eq!(clipped_window(0, 5, 7), 0..3);
        assert_eq!(clipped_window(3, 5, 7), 1..6);
        assert_eq!(clipped_window(6, 5, 7), 4..7);
        assert_eq!(clipped_window(2, 4, 7), 0..4);
        assert_eq!(clipped_window(0, 1, 7), 0..1);
        assert_eq!(cube_line(0, 3, 0, 7), None);
        assert_eq!(cube_line(6, 3, 2, 7), None);
        assert_eq!(cube_line(4, 3, 2, 7), Some(5));
    }

    #[test]
    fn test_neighborhood_edges_are_absent() {
        for direction in [Direction::AMajor, Direction::BMajor] {
            let mut strategy = create_neighborhoods(direction, (3, 3));
            let mut count = 0;
            while strategy.has_next() {
                let cube = strategy.advance().unwrap();
                let (a, b) = cube.center();
                for i in 0..3 {
                    for j in 0..3 {
                        let inside = (a + i) >= 1 && a + i - 1 < 7 && (b + j) >= 1 && b + j - 1 < 5;
                        match cube.get(0, i, j) {
                            Some(column) => {
                                assert!(inside);
                                assert_eq!((column.a_index, column.b_index), (a + i - 1, b + j - 1));
                            }
                            None => assert!(!inside, "{direction:?} ({a}, {b}) cell ({i}, {j})"),
                        }
                    }
                }
                count += 1;
            }
            assert_eq!(count, 35);
        }
    }

    #[test]
    fn test_neighborhood_reads_each_line_once() {
        let mut strategy = create_neighborhoods(Direction::AMajor, (5, 3));
        let mut centers = Vec::new();
        while strategy.has_next() {
            centers.push(strategy.advance().unwrap().center());
        }
        assert_eq!(centers[..6], [(0, 0), (0, 1), (0, 2), (0, 3), (0, 4), (1, 0)]);
        assert_eq!(strategy.stats().lines_read, 7);
        assert!(matches!(strategy.advance(), Err(BlockError::Exhausted)));
    }
}
