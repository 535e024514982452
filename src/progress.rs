//! Loop-index state shared between the driving thread and progress readers

use crate::tiling::TilingPlan;
use crate::types::AxisRange;
use parking_lot::Mutex;
use std::sync::Arc;

/// Position of a traversal in its block loops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopState {
    /// Blocks produced so far
    pub current_loop: usize,
    /// Loop index along A of the current block
    pub a_loop: usize,
    /// Loop index along B of the current block
    pub b_loop: usize,
}

pub(crate) struct ProgressTracker {
    plan: TilingPlan,
    a_axis: AxisRange,
    b_axis: AxisRange,
    state: Mutex<LoopState>,
}

impl ProgressTracker {
    pub(crate) fn new(plan: TilingPlan, a_axis: AxisRange, b_axis: AxisRange) -> Self {
        Self {
            plan,
            a_axis,
            b_axis,
            state: Mutex::new(LoopState::default()),
        }
    }

    pub(crate) fn plan(&self) -> &TilingPlan {
        &self.plan
    }

    pub(crate) fn snapshot(&self) -> LoopState {
        *self.state.lock()
    }

    pub(crate) fn publish(&self, state: LoopState) {
        *self.state.lock() = state;
    }
}

/// Cloneable, thread-safe view of a traversal's progress
#[derive(Clone)]
pub struct ProgressHandle {
    tracker: Arc<ProgressTracker>,
}

impl ProgressHandle {
    pub(crate) fn new(tracker: Arc<ProgressTracker>) -> Self {
        Self { tracker }
    }

    /// Total number of blocks in the traversal
    pub fn total_work(&self) -> usize {
        self.tracker.plan.total_loops()
    }

    /// Blocks produced so far
    pub fn current_loop(&self) -> usize {
        self.tracker.snapshot().current_loop
    }

    /// True once every block has been produced
    pub fn is_done(&self) -> bool {
        self.current_loop() >= self.total_work()
    }

    /// Percentage of blocks produced, rounded to the nearest integer
    pub fn completion(&self) -> u8 {
        completion_percent(self.current_loop(), self.total_work())
    }

    /// Human readable description of the current block
    pub fn status_message(&self) -> String {
        let state = self.tracker.snapshot();
        let plan = &self.tracker.plan;
        if state.current_loop >= plan.total_loops() {
            return "Traversal complete".to_string();
        }

        let a = plan.a.block_range(state.a_loop);
        let b = plan.b.block_range(state.b_loop);
        let (a_axis, b_axis) = (&self.tracker.a_axis, &self.tracker.b_axis);
        let b0 = b_axis.value_at(b.start);
        let b1 = b_axis.value_at(b.end - 1);
        // Wording follows the configured block shape, not the clipped one.
        let (a_unit, b_unit) = (
            plan.a.nominal_block_size() == 1,
            plan.b.nominal_block_size() == 1,
        );
        if a_unit && b_unit {
            format!(
                "Current position: {} {}, {} {}",
                a_axis.name,
                a_axis.value_at(a.start),
                b_axis.name,
                b0
            )
        } else if a_unit {
            format!(
                "Current slice: {} {}, {} {}-{}",
                a_axis.name,
                a_axis.value_at(a.start),
                b_axis.name,
                b0,
                b1
            )
        } else if b_unit {
            format!(
                "Current slice: {} {}, {} {}-{}",
                b_axis.name,
                b0,
                a_axis.name,
                a_axis.value_at(a.start),
                a_axis.value_at(a.end - 1)
            )
        } else {
            format!(
                "Current block: {} {}-{}, {} {}-{}",
                a_axis.name,
                a_axis.value_at(a.start),
                a_axis.value_at(a.end - 1),
                b_axis.name,
                b0,
                b1
            )
        }
    }
}

fn completion_percent(current: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    (100.0 * current as f64 / total as f64).round().min(100.0) as u8
}
