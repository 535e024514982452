//! Tiling planner - splits each grid axis into (possibly overlapping) blocks
//!
//! Block `i` of an axis starts at `i * increment`. Full blocks are emitted
//! while they fit; if the last full block stops short of the axis end, one
//! trailing remainder block covers what is left.
//!
//! ```text
//! count = 10, block = 4, increment = 3
//!
//! index   0 1 2 3 4 5 6 7 8 9
//! loop 0  # # # #
//! loop 1        # # # #
//! loop 2              # # # #
//! ```

use crate::error::{BlockError, Result};
use std::ops::Range;

/// Block layout along a single axis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisTiling {
    count: usize,
    block_size: usize,
    increment: usize,
    block_sizes: Vec<usize>,
}

impl AxisTiling {
    /// Plan the blocks of an axis with `count` lines
    pub fn new(count: usize, block_size: usize, increment: usize) -> Result<Self> {
        if count == 0 || block_size == 0 || increment == 0 {
            return Err(BlockError::InvalidArgument(format!(
                "Axis count ({count}), block size ({block_size}) and increment ({increment}) must all be positive"
            )));
        }

        let mut block_sizes = Vec::new();
        let mut start = 0;
        while start + block_size <= count {
            block_sizes.push(block_size);
            start += increment;
        }

        let covered = match block_sizes.len() {
            0 => 0,
            n => (n - 1) * increment + block_size,
        };
        if covered < count && start < count {
            block_sizes.push(count - start);
        }

        Ok(Self {
            count,
            block_size,
            increment,
            block_sizes,
        })
    }

    /// Number of lines along the axis
    pub fn count(&self) -> usize {
        self.count
    }

    /// Nominal block size
    pub fn nominal_block_size(&self) -> usize {
        self.block_size
    }

    /// Step between consecutive block starts
    pub fn increment(&self) -> usize {
        self.increment
    }

    /// Lines shared by consecutive full blocks
    pub fn overlap(&self) -> usize {
        self.block_size.saturating_sub(self.increment)
    }

    /// Number of blocks along the axis
    pub fn num_loops(&self) -> usize {
        self.block_sizes.len()
    }

    /// Block sizes in traversal order
    pub fn block_sizes(&self) -> &[usize] {
        &self.block_sizes
    }

    /// Size of the largest block
    pub fn max_block_size(&self) -> usize {
        self.block_sizes.iter().copied().max().unwrap_or(0)
    }

    /// Size of block `loop_index`
    pub fn block_size(&self, loop_index: usize) -> usize {
        self.block_sizes[loop_index]
    }

    /// First line of block `loop_index`
    pub fn block_start(&self, loop_index: usize) -> usize {
        loop_index * self.increment
    }

    /// Lines covered by block `loop_index`
    pub fn block_range(&self, loop_index: usize) -> Range<usize> {
        let start = self.block_start(loop_index);
        start..start + self.block_size(loop_index)
    }
}

/// Block layout of the A x B grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilingPlan {
    pub a: AxisTiling,
    pub b: AxisTiling,
}

impl TilingPlan {
    pub fn new(a: AxisTiling, b: AxisTiling) -> Self {
        Self { a, b }
    }

    /// Total number of blocks in a traversal
    pub fn total_loops(&self) -> usize {
        self.a.num_loops() * self.b.num_loops()
    }
}
