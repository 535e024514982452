//! Block, slice and column cursors - the consumer-facing traversal API
//!
//! A [`CursorBuilder`] validates the dataset set and configuration once,
//! picks the traversal direction and hands out a forward-only, single-pass
//! cursor. Cursors cannot be restarted; build a new one to traverse again.

use crate::block::{Block, ColumnSet, Neighborhood, Slice};
use crate::config::TraversalConfig;
use crate::dataset::Dataset;
use crate::error::{BlockError, Result};
use crate::progress::ProgressHandle;
use crate::region::RegionFilter;
use crate::slab::{Direction, TraversalStats};
use crate::strategy::{DirectionalStrategy, NeighborhoodStrategy, TraversalParts};
use crate::tiling::{AxisTiling, TilingPlan};
use crate::types::TraversalOrder;
use std::sync::Arc;
use tracing::debug;

/// A pull-based source of blocks, as consumed by the streaming pipeline
pub trait BlockSource: Send + 'static {
    type Item: Send + 'static;

    /// True while blocks remain
    fn has_next(&self) -> bool;

    /// Produce the next item; `Exhausted` once the source is done
    fn next_item(&mut self) -> Result<Self::Item>;

    /// Progress of the underlying traversal
    fn progress(&self) -> ProgressHandle;

    /// True if `item` carries no column at all, e.g. entirely outside the region
    fn is_all_absent(_item: &Self::Item) -> bool {
        false
    }
}

/// Builder for traversal cursors over a primary and optional secondary datasets
pub struct CursorBuilder {
    primary: Arc<dyn Dataset>,
    secondaries: Vec<Arc<dyn Dataset>>,
    region: Option<Arc<dyn RegionFilter>>,
    config: TraversalConfig,
}

impl CursorBuilder {
    /// Start a traversal over `primary`
    pub fn new(primary: Arc<dyn Dataset>) -> Self {
        Self {
            primary,
            secondaries: Vec::new(),
            region: None,
            config: TraversalConfig::default(),
        }
    }

    /// Add a secondary dataset traversed in lock-step with the primary
    pub fn with_secondary(mut self, dataset: Arc<dyn Dataset>) -> Self {
        self.secondaries.push(dataset);
        self
    }

    /// Mark columns outside `region` as absent
    pub fn with_region<R: RegionFilter + 'static>(mut self, region: R) -> Self {
        self.region = Some(Arc::new(region));
        self
    }

    /// Use a region filter shared with other traversals
    pub fn with_shared_region(mut self, region: Arc<dyn RegionFilter>) -> Self {
        self.region = Some(region);
        self
    }

    /// Set block sizes, increments, order and sample range
    pub fn with_config(mut self, config: TraversalConfig) -> Self {
        self.config = config;
        self
    }

    /// Cursor over `a_block_size x b_block_size` blocks
    pub fn build_blocks(self) -> Result<BlockCursor> {
        let c = &self.config;
        let (a_block, b_block, a_inc, b_inc) =
            (c.a_block_size, c.b_block_size, c.a_increment, c.b_increment);
        let strategy = self.build_strategy(|_, num_a, num_b| {
            Ok(TilingPlan::new(
                AxisTiling::new(num_a, a_block, a_inc)?,
                AxisTiling::new(num_b, b_block, b_inc)?,
            ))
        })?;
        Ok(BlockCursor::new(strategy))
    }

    /// Cursor over whole lines along the slow axis
    ///
    /// The increment along the slow axis is taken from the configuration;
    /// block sizes are ignored.
    pub fn build_slices(self) -> Result<SliceCursor> {
        let (a_inc, b_inc) = (self.config.a_increment, self.config.b_increment);
        let strategy = self.build_strategy(|direction, num_a, num_b| {
            let plan = match direction {
                Direction::AMajor => TilingPlan::new(
                    AxisTiling::new(num_a, 1, a_inc)?,
                    AxisTiling::new(num_b, num_b, 1)?,
                ),
                Direction::BMajor => TilingPlan::new(
                    AxisTiling::new(num_a, num_a, 1)?,
                    AxisTiling::new(num_b, 1, b_inc)?,
                ),
            };
            Ok(plan)
        })?;
        Ok(SliceCursor {
            inner: BlockCursor::new(strategy),
        })
    }

    /// Cursor over single grid positions, stepping by the configured increments
    pub fn build_columns(self) -> Result<ColumnCursor> {
        let (a_inc, b_inc) = (self.config.a_increment, self.config.b_increment);
        let strategy = self.build_strategy(|_, num_a, num_b| {
            Ok(TilingPlan::new(
                AxisTiling::new(num_a, 1, a_inc)?,
                AxisTiling::new(num_b, 1, b_inc)?,
            ))
        })?;
        Ok(ColumnCursor {
            inner: BlockCursor::new(strategy),
        })
    }

    /// Cursor over `a_block_size x b_block_size` neighborhoods centred on
    /// each grid position
    ///
    /// Centres step by the configured increments, so `with_increments(1, 1)`
    /// visits every position. Cells past the grid edge are absent.
    pub fn build_neighborhoods(self) -> Result<NeighborhoodCursor> {
        let c = &self.config;
        let cube = (c.a_block_size, c.b_block_size);
        let (a_inc, b_inc) = (c.a_increment, c.b_increment);
        let parts = self.prepare(|_, num_a, num_b| {
            Ok(TilingPlan::new(
                AxisTiling::new(num_a, 1, a_inc)?,
                AxisTiling::new(num_b, 1, b_inc)?,
            ))
        })?;
        Ok(NeighborhoodCursor {
            strategy: NeighborhoodStrategy::new(parts, cube),
            failed: false,
        })
    }

    fn direction(&self) -> Result<Direction> {
        let order = self
            .config
            .order
            .unwrap_or_else(|| self.primary.preferred_order());
        match order {
            TraversalOrder::AMajor => Ok(Direction::AMajor),
            TraversalOrder::BMajor => Ok(Direction::BMajor),
            TraversalOrder::SampleMajor => Err(BlockError::UnsupportedOrder(order)),
        }
    }

    fn build_strategy<F>(self, plan_for: F) -> Result<DirectionalStrategy>
    where
        F: FnOnce(Direction, usize, usize) -> Result<TilingPlan>,
    {
        Ok(DirectionalStrategy::new(self.prepare(plan_for)?))
    }

    fn prepare<F>(self, plan_for: F) -> Result<TraversalParts>
    where
        F: FnOnce(Direction, usize, usize) -> Result<TilingPlan>,
    {
        self.config.validate()?;
        let direction = self.direction()?;

        let geometry = self.primary.geometry();
        for secondary in &self.secondaries {
            if !geometry.matches_grid(secondary.geometry()) {
                return Err(BlockError::GeometryMismatch(format!(
                    "{} ({}) does not match the grid of {} ({})",
                    secondary.name(),
                    secondary.geometry().summary(),
                    self.primary.name(),
                    geometry.summary()
                )));
            }
        }

        let plan = plan_for(direction, geometry.num_a(), geometry.num_b())?;

        let mut datasets = Vec::with_capacity(1 + self.secondaries.len());
        datasets.push(self.primary);
        datasets.extend(self.secondaries);

        let sample_ranges = datasets
            .iter()
            .map(|dataset| {
                let axis = &dataset.geometry().sample_axis;
                match self.config.sample_range {
                    Some((first, last)) => axis.index_range(first, last),
                    None => Ok(axis.full_range()),
                }
            })
            .collect::<Result<Vec<_>>>()?;

        debug!(
            ?direction,
            datasets = datasets.len(),
            a_loops = plan.a.num_loops(),
            b_loops = plan.b.num_loops(),
            region = self.region.is_some(),
            "traversal configured"
        );

        Ok(TraversalParts {
            direction,
            datasets,
            sample_ranges,
            region: self.region,
            plan,
        })
    }
}

/// Cursor yielding (dataset, A, B) blocks
pub struct BlockCursor {
    strategy: DirectionalStrategy,
    failed: bool,
}

impl BlockCursor {
    fn new(strategy: DirectionalStrategy) -> Self {
        Self {
            strategy,
            failed: false,
        }
    }

    /// True while blocks remain
    pub fn has_next(&self) -> bool {
        self.strategy.has_next()
    }

    /// Read the next block; `Exhausted` once every block has been produced
    pub fn next_block(&mut self) -> Result<Block> {
        self.strategy.advance()
    }

    /// Percentage of blocks produced (0-100)
    pub fn completion(&self) -> u8 {
        self.strategy.progress().completion()
    }

    /// Description of the current block
    pub fn status_message(&self) -> String {
        self.strategy.progress().status_message()
    }

    /// Total number of blocks
    pub fn total_work(&self) -> usize {
        self.strategy.plan().total_loops()
    }

    /// Thread-safe progress view, usable while another thread drives the cursor
    pub fn progress(&self) -> ProgressHandle {
        self.strategy.progress()
    }

    /// Read/reuse counters so far
    pub fn stats(&self) -> TraversalStats {
        self.strategy.stats()
    }

    /// Slow axis of the traversal
    pub fn direction(&self) -> Direction {
        self.strategy.direction()
    }

    /// Number of datasets traversed together
    pub fn num_datasets(&self) -> usize {
        self.strategy.num_datasets()
    }

    /// Block layout of the traversal
    pub fn plan(&self) -> &TilingPlan {
        self.strategy.plan()
    }
}

/// Yields blocks until exhausted; stops after the first error
impl Iterator for BlockCursor {
    type Item = Result<Block>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || !self.has_next() {
            return None;
        }
        let result = self.next_block();
        self.failed = result.is_err();
        Some(result)
    }
}

impl BlockSource for BlockCursor {
    type Item = Block;

    fn has_next(&self) -> bool {
        BlockCursor::has_next(self)
    }

    fn next_item(&mut self) -> Result<Block> {
        self.next_block()
    }

    fn progress(&self) -> ProgressHandle {
        BlockCursor::progress(self)
    }

    fn is_all_absent(block: &Block) -> bool {
        block.is_all_absent()
    }
}

/// Cursor yielding one full line per dataset at each step
pub struct SliceCursor {
    inner: BlockCursor,
}

impl SliceCursor {
    pub fn has_next(&self) -> bool {
        self.inner.has_next()
    }

    /// Read the next slice; each step reads a full line from storage
    pub fn next_slice(&mut self) -> Result<Slice> {
        Ok(self.inner.next_block()?.into_slice())
    }

    pub fn completion(&self) -> u8 {
        self.inner.completion()
    }

    pub fn status_message(&self) -> String {
        self.inner.status_message()
    }

    pub fn total_work(&self) -> usize {
        self.inner.total_work()
    }

    pub fn progress(&self) -> ProgressHandle {
        self.inner.progress()
    }

    pub fn stats(&self) -> TraversalStats {
        self.inner.stats()
    }

    pub fn direction(&self) -> Direction {
        self.inner.direction()
    }
}

impl Iterator for SliceCursor {
    type Item = Result<Slice>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|block| block.map(Block::into_slice))
    }
}

impl BlockSource for SliceCursor {
    type Item = Slice;

    fn has_next(&self) -> bool {
        SliceCursor::has_next(self)
    }

    fn next_item(&mut self) -> Result<Slice> {
        self.next_slice()
    }

    fn progress(&self) -> ProgressHandle {
        SliceCursor::progress(self)
    }

    fn is_all_absent(slice: &Slice) -> bool {
        slice.is_all_absent()
    }
}

/// Cursor yielding a single grid position per step
pub struct ColumnCursor {
    inner: BlockCursor,
}

impl ColumnCursor {
    pub fn has_next(&self) -> bool {
        self.inner.has_next()
    }

    pub fn next_columns(&mut self) -> Result<ColumnSet> {
        Ok(ColumnSet::from_block(self.inner.next_block()?))
    }

    pub fn completion(&self) -> u8 {
        self.inner.completion()
    }

    pub fn status_message(&self) -> String {
        self.inner.status_message()
    }

    pub fn total_work(&self) -> usize {
        self.inner.total_work()
    }

    pub fn progress(&self) -> ProgressHandle {
        self.inner.progress()
    }

    pub fn stats(&self) -> TraversalStats {
        self.inner.stats()
    }

    pub fn direction(&self) -> Direction {
        self.inner.direction()
    }
}

impl Iterator for ColumnCursor {
    type Item = Result<ColumnSet>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|block| block.map(ColumnSet::from_block))
    }
}

impl BlockSource for ColumnCursor {
    type Item = ColumnSet;

    fn has_next(&self) -> bool {
        ColumnCursor::has_next(self)
    }

    fn next_item(&mut self) -> Result<ColumnSet> {
        self.next_columns()
    }

    fn progress(&self) -> ProgressHandle {
        ColumnCursor::progress(self)
    }

    fn is_all_absent(columns: &ColumnSet) -> bool {
        columns.is_absent()
    }
}

/// Cursor yielding a neighborhood cube per grid position
///
/// Only the slow-axis lines the current cube spans are held in memory;
/// lines behind the cube are evicted as it moves on.
pub struct NeighborhoodCursor {
    strategy: NeighborhoodStrategy,
    failed: bool,
}

impl NeighborhoodCursor {
    pub fn has_next(&self) -> bool {
        self.strategy.has_next()
    }

    /// Read the neighborhood of the next centre
    pub fn next_neighborhood(&mut self) -> Result<Neighborhood> {
        self.strategy.advance()
    }

    /// Cube extent (A, B)
    pub fn cube_shape(&self) -> (usize, usize) {
        self.strategy.cube_shape()
    }

    pub fn completion(&self) -> u8 {
        self.strategy.progress().completion()
    }

    pub fn status_message(&self) -> String {
        self.strategy.progress().status_message()
    }

    /// Number of centres visited
    pub fn total_work(&self) -> usize {
        self.strategy.total_loops()
    }

    pub fn progress(&self) -> ProgressHandle {
        self.strategy.progress()
    }

    pub fn stats(&self) -> TraversalStats {
        self.strategy.stats()
    }

    pub fn direction(&self) -> Direction {
        self.strategy.direction()
    }

    pub fn num_datasets(&self) -> usize {
        self.strategy.num_datasets()
    }
}

impl Iterator for NeighborhoodCursor {
    type Item = Result<Neighborhood>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || !self.has_next() {
            return None;
        }
        let result = self.next_neighborhood();
        self.failed = result.is_err();
        Some(result)
    }
}

impl BlockSource for NeighborhoodCursor {
    type Item = Neighborhood;

    fn has_next(&self) -> bool {
        NeighborhoodCursor::has_next(self)
    }

    fn next_item(&mut self) -> Result<Neighborhood> {
        self.next_neighborhood()
    }

    fn progress(&self) -> ProgressHandle {
        NeighborhoodCursor::progress(self)
    }

    fn is_all_absent(cube: &Neighborhood) -> bool {
        cube.is_all_absent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{MemoryDataset, SampleColumn};
    use crate::geometry::GridGeometry;
    use crate::region::SpatialExtent;
    use crate::types::AxisRange;
    use std::ops::Range;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn create_test_geometry(num_a: usize, num_b: usize) -> GridGeometry {
        GridGeometry::new(
            AxisRange::with_count("Inline", 0.0, 1.0, num_a).unwrap(),
            AxisRange::with_count("Crossline", 0.0, 1.0, num_b).unwrap(),
            AxisRange::with_count("Time", 0.0, 4.0, 6).unwrap(),
        )
    }

    fn create_test_dataset(num_a: usize, num_b: usize, offset: f32) -> Arc<MemoryDataset> {
        Arc::new(MemoryDataset::from_fn(
            "cursor",
            create_test_geometry(num_a, num_b),
            move |(a, b, s)| offset + (a * 100 + b * 10 + s) as f32,
        ))
    }

    /// Fails every read after the first `budget` lines
    struct FlakyDataset {
        inner: MemoryDataset,
        budget: usize,
        reads: AtomicUsize,
    }

    impl FlakyDataset {
        fn take_read(&self) -> Result<()> {
            if self.reads.fetch_add(1, Ordering::SeqCst) >= self.budget {
                return Err(BlockError::Storage("disk on fire".to_string()));
            }
            Ok(())
        }
    }

    impl Dataset for FlakyDataset {
        fn name(&self) -> &str {
            "flaky"
        }

        fn geometry(&self) -> &GridGeometry {
            self.inner.geometry()
        }

        fn read_row(&self, a: usize, b: Range<usize>, s: Range<usize>) -> Result<Vec<SampleColumn>> {
            self.take_read()?;
            self.inner.read_row(a, b, s)
        }

        fn read_column(&self, b: usize, a: Range<usize>, s: Range<usize>) -> Result<Vec<SampleColumn>> {
            self.take_read()?;
            self.inner.read_column(b, a, s)
        }
    }

    #[test]
    fn test_completion_sequence() {
        let mut cursor = CursorBuilder::new(create_test_dataset(10, 5, 0.0))
            .with_config(TraversalConfig::new(4, 5).with_increments(3, 5))
            .build_blocks()
            .unwrap();
        assert_eq!(cursor.total_work(), 3);
        assert_eq!(cursor.plan().a.block_sizes(), &[4, 4, 4]);

        let mut completions = vec![cursor.completion()];
        let mut a_ranges = Vec::new();
        while cursor.has_next() {
            let block = cursor.next_block().unwrap();
            a_ranges.push(block.a_range());
            completions.push(cursor.completion());
        }
        assert_eq!(completions, vec![0, 33, 67, 100]);
        assert_eq!(a_ranges, vec![0..4, 3..7, 6..10]);
        assert!(matches!(cursor.next_block(), Err(BlockError::Exhausted)));
    }

    #[test]
    fn test_geometry_mismatch_fails_at_build() {
        let primary = create_test_dataset(100, 5, 0.0);
        let secondary = create_test_dataset(50, 5, 0.0);
        let result = CursorBuilder::new(primary)
            .with_secondary(secondary)
            .with_config(TraversalConfig::new(4, 5))
            .build_blocks();
        match result {
            Err(err @ BlockError::GeometryMismatch(_)) => assert!(err.is_configuration()),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("mismatched geometry accepted"),
        }
    }

    #[test]
    fn test_sample_major_rejected() {
        let result = CursorBuilder::new(create_test_dataset(4, 4, 0.0))
            .with_config(TraversalConfig::new(2, 2).with_order(TraversalOrder::SampleMajor))
            .build_slices();
        assert!(matches!(
            result,
            Err(BlockError::UnsupportedOrder(TraversalOrder::SampleMajor))
        ));
    }

    #[test]
    fn test_invalid_block_size_rejected() {
        let result = CursorBuilder::new(create_test_dataset(4, 4, 0.0))
            .with_config(TraversalConfig::new(0, 2))
            .build_blocks();
        assert!(matches!(result, Err(BlockError::InvalidArgument(_))));
    }

    #[test]
    fn test_secondary_in_lock_step() {
        let mut cursor = CursorBuilder::new(create_test_dataset(6, 4, 0.0))
            .with_secondary(create_test_dataset(6, 4, 0.5))
            .with_config(TraversalConfig::new(3, 2).with_increments(2, 2))
            .build_blocks()
            .unwrap();
        assert_eq!(cursor.num_datasets(), 2);
        for block in cursor.by_ref() {
            let block = block.unwrap();
            for a in 0..block.a_size() {
                for b in 0..block.b_size() {
                    let primary = block.get(0, a, b).unwrap();
                    let secondary = block.get(1, a, b).unwrap();
                    assert_eq!(
                        (primary.a_index, primary.b_index),
                        (secondary.a_index, secondary.b_index)
                    );
                    assert_eq!(secondary.samples[0], primary.samples[0] + 0.5);
                }
            }
        }
    }

    #[test]
    fn test_preferred_order_is_used() {
        let dataset = MemoryDataset::from_fn("xline", create_test_geometry(4, 3), |_| 0.0)
            .with_preferred_order(TraversalOrder::BMajor);
        let cursor = CursorBuilder::new(Arc::new(dataset))
            .build_slices()
            .unwrap();
        assert_eq!(cursor.direction(), Direction::BMajor);
        assert_eq!(cursor.total_work(), 3);
    }

    #[test]
    fn test_slices_in_both_directions() {
        let inline = CursorBuilder::new(create_test_dataset(4, 3, 0.0))
            .with_config(TraversalConfig::default().with_order(TraversalOrder::AMajor))
            .build_slices()
            .unwrap();
        let slices: Vec<Slice> = inline.map(|s| s.unwrap()).collect();
        assert_eq!(slices.len(), 4);
        assert_eq!(slices[2].len(), 3);
        assert_eq!(slices[2].origin(), (2, 0));
        assert_eq!(slices[2].get(0, 1).unwrap().b_index, 1);

        let mut xline = CursorBuilder::new(create_test_dataset(4, 3, 0.0))
            .with_config(TraversalConfig::default().with_order(TraversalOrder::BMajor))
            .build_slices()
            .unwrap();
        assert_eq!(xline.status_message(), "Current slice: Crossline 0, Inline 0-3");
        let first = xline.next_slice().unwrap();
        assert_eq!(first.len(), 4);
        let positions: Vec<usize> = (0..4).map(|i| first.get(0, i).unwrap().a_index).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);
        // Every slice is a fresh read of a full line.
        while xline.has_next() {
            xline.next_slice().unwrap();
        }
        assert_eq!(xline.stats().lines_read, 3);
        assert_eq!(xline.stats().lines_reused, 0);
    }

    #[test]
    fn test_slice_increment_skips_lines() {
        let cursor = CursorBuilder::new(create_test_dataset(7, 3, 0.0))
            .with_config(TraversalConfig::default().with_increments(3, 1))
            .build_slices()
            .unwrap();
        let lines: Vec<usize> = cursor.map(|s| s.unwrap().origin().0).collect();
        assert_eq!(lines, vec![0, 3, 6]);
    }

    #[test]
    fn test_slice_status_message() {
        let mut cursor = CursorBuilder::new(create_test_dataset(4, 3, 0.0))
            .build_slices()
            .unwrap();
        cursor.next_slice().unwrap();
        cursor.next_slice().unwrap();
        assert_eq!(cursor.status_message(), "Current slice: Inline 1, Crossline 0-2");
    }

    #[test]
    fn test_column_cursor() {
        let mut cursor = CursorBuilder::new(create_test_dataset(3, 2, 0.0))
            .with_secondary(create_test_dataset(3, 2, 1.0))
            .with_config(TraversalConfig::default().with_sample_range(4.0, 8.0))
            .build_columns()
            .unwrap();
        assert_eq!(cursor.total_work(), 6);
        let first = cursor.next_columns().unwrap();
        assert_eq!(first.position(), (0, 0));
        assert_eq!(first.get(0).unwrap().samples, vec![1.0, 2.0]);
        assert_eq!(first.get(1).unwrap().samples, vec![2.0, 3.0]);
        let positions: Vec<(usize, usize)> = cursor.map(|c| c.unwrap().position()).collect();
        assert_eq!(positions, vec![(0, 1), (1, 0), (1, 1), (2, 0), (2, 1)]);
    }

    #[test]
    fn test_region_keeps_shape() {
        let plain = CursorBuilder::new(create_test_dataset(6, 6, 0.0))
            .with_config(TraversalConfig::new(3, 3).with_increments(2, 2))
            .build_blocks()
            .unwrap();
        let filtered = CursorBuilder::new(create_test_dataset(6, 6, 0.0))
            .with_region(SpatialExtent::new(0.0, 0.0, 2.0, 2.0).unwrap())
            .with_config(TraversalConfig::new(3, 3).with_increments(2, 2))
            .build_blocks()
            .unwrap();
        assert_eq!(plain.total_work(), filtered.total_work());

        for (plain, filtered) in plain.zip(filtered) {
            let (plain, filtered) = (plain.unwrap(), filtered.unwrap());
            assert_eq!(plain.columns().dim(), filtered.columns().dim());
            for ((d, a, b), slot) in filtered.columns().indexed_iter() {
                let (ga, gb) = (plain.a_range().start + a, plain.b_range().start + b);
                if ga <= 2 && gb <= 2 {
                    assert_eq!(slot.as_deref(), plain.get(d, a, b));
                } else {
                    assert!(slot.is_none());
                }
            }
        }
    }

    #[test]
    fn test_read_error_propagates_and_can_retry() {
        let flaky = FlakyDataset {
            inner: MemoryDataset::from_fn("inner", create_test_geometry(4, 2), |_| 1.0),
            budget: 2,
            reads: AtomicUsize::new(0),
        };
        let mut cursor = CursorBuilder::new(Arc::new(flaky))
            .with_config(TraversalConfig::new(2, 2))
            .build_blocks()
            .unwrap();
        assert!(cursor.next_block().is_ok());
        assert!(matches!(cursor.next_block(), Err(BlockError::Storage(_))));
        // Nothing was consumed by the failed step.
        assert_eq!(cursor.progress().current_loop(), 1);
        assert!(cursor.has_next());
    }

    #[test]
    fn test_iterator_stops_after_error() {
        let flaky = FlakyDataset {
            inner: MemoryDataset::from_fn("inner", create_test_geometry(4, 2), |_| 1.0),
            budget: 0,
            reads: AtomicUsize::new(0),
        };
        let cursor = CursorBuilder::new(Arc::new(flaky))
            .with_config(TraversalConfig::new(2, 2))
            .build_blocks()
            .unwrap();
        let results: Vec<_> = cursor.collect();
        assert_eq!(results.len(), 1);
        assert!(results[0].is_err());
    }

    #[test]
    fn test_neighborhoods_pad_grid_edges() {
        let mut cursor = CursorBuilder::new(create_test_dataset(4, 3, 0.0))
            .with_secondary(create_test_dataset(4, 3, 0.5))
            .with_config(TraversalConfig::new(3, 3).with_increments(1, 1))
            .build_neighborhoods()
            .unwrap();
        assert_eq!(cursor.total_work(), 12);
        assert_eq!(cursor.cube_shape(), (3, 3));

        let corner = cursor.next_neighborhood().unwrap();
        assert_eq!(corner.center(), (0, 0));
        assert_eq!(corner.num_datasets(), 2);
        // Row and column before the corner lie off the grid.
        assert_eq!(corner.absent_count(), 2 * 5);
        assert_eq!(corner.at_offset(0, 1, 1).unwrap().samples[0], 110.0);
        assert_eq!(corner.at_offset(1, 1, 1).unwrap().samples[0], 110.5);

        let interior = cursor.nth(3).unwrap().unwrap();
        assert_eq!(interior.center(), (1, 1));
        assert_eq!(interior.absent_count(), 0);
        let column = interior.get(0, 0, 2).unwrap();
        assert_eq!((column.a_index, column.b_index), (0, 2));
        assert_eq!(cursor.status_message(), "Current position: Inline 1, Crossline 1");
    }

    #[test]
    fn test_neighborhood_region_and_increments() {
        let cursor = CursorBuilder::new(create_test_dataset(6, 6, 0.0))
            .with_region(SpatialExtent::new(0.0, 0.0, 1.0, 1.0).unwrap())
            .with_config(
                TraversalConfig::new(3, 3)
                    .with_increments(2, 2)
                    .with_order(TraversalOrder::BMajor),
            )
            .build_neighborhoods()
            .unwrap();
        assert_eq!(cursor.direction(), Direction::BMajor);
        let cubes: Vec<Neighborhood> = cursor.map(|c| c.unwrap()).collect();
        let centers: Vec<(usize, usize)> = cubes.iter().map(Neighborhood::center).collect();
        assert_eq!(
            centers,
            vec![(0, 0), (2, 0), (4, 0), (0, 2), (2, 2), (4, 2), (0, 4), (2, 4), (4, 4)]
        );
        let empty: Vec<(usize, usize)> = cubes
            .iter()
            .filter(|c| c.is_all_absent())
            .map(Neighborhood::center)
            .collect();
        assert_eq!(empty, vec![(4, 0), (4, 2), (0, 4), (2, 4), (4, 4)]);
    }
}
