//! Core data types: axis ranges and traversal order

use crate::error::{BlockError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Range;

/// Relative tolerance used when comparing axis values
const AXIS_TOLERANCE: f64 = 1e-6;

pub(crate) fn approx_eq(a: f64, b: f64) -> bool {
    let scale = a.abs().max(b.abs()).max(1.0);
    (a - b).abs() <= AXIS_TOLERANCE * scale
}

/// Order in which the grid is walked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalOrder {
    /// A varies slowest, then B, samples fastest (inline order for seismic)
    AMajor,
    /// B varies slowest, then A, samples fastest (crossline order for seismic)
    BMajor,
    /// Slices along the sample axis (time/depth slices)
    SampleMajor,
}

impl fmt::Display for TraversalOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TraversalOrder::AMajor => "A-major",
            TraversalOrder::BMajor => "B-major",
            TraversalOrder::SampleMajor => "Sample-major",
        };
        f.write_str(name)
    }
}

/// A regularly sampled axis: start, end, step and the derived sample count
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisRange {
    /// Name of the axis (e.g., "Inline", "Crossline", "Time")
    pub name: String,
    /// Value of the first sample
    pub start: f64,
    /// Value of the last sample
    pub end: f64,
    /// Step between consecutive samples (may be negative)
    pub delta: f64,
    count: usize,
}

impl AxisRange {
    /// Create a new axis range
    pub fn new(name: impl Into<String>, start: f64, end: f64, delta: f64) -> Result<Self> {
        let name = name.into();
        if !start.is_finite() || !end.is_finite() || !delta.is_finite() || delta == 0.0 {
            return Err(BlockError::InvalidArgument(format!(
                "Axis {name}: start, end and delta must be finite and delta non-zero"
            )));
        }

        let steps = (end - start) / delta;
        if steps < -AXIS_TOLERANCE {
            return Err(BlockError::InvalidArgument(format!(
                "Axis {name}: delta {delta} does not lead from {start} to {end}"
            )));
        }

        Ok(Self {
            name,
            start,
            end,
            delta,
            count: 1 + steps.round().max(0.0) as usize,
        })
    }

    /// Create an axis from a start, a step and a number of samples
    pub fn with_count(name: impl Into<String>, start: f64, delta: f64, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(BlockError::InvalidArgument(
                "Axis must have at least one sample".to_string(),
            ));
        }
        Self::new(name, start, start + (count - 1) as f64 * delta, delta)
    }

    /// Number of samples along the axis
    pub fn count(&self) -> usize {
        self.count
    }

    /// Axis value at a sample index
    pub fn value_at(&self, index: usize) -> f64 {
        self.start + index as f64 * self.delta
    }

    /// Nearest sample index for a value, if it falls on the axis
    pub fn index_of(&self, value: f64) -> Option<usize> {
        let position = ((value - self.start) / self.delta).round();
        if position < 0.0 || position >= self.count as f64 {
            None
        } else {
            Some(position as usize)
        }
    }

    /// Resolve a value interval to the half-open range of sample indices it spans
    pub fn index_range(&self, first: f64, last: f64) -> Result<Range<usize>> {
        let i0 = self.index_of(first).ok_or_else(|| {
            BlockError::OutOfBounds(format!("{} {} is outside the axis", self.name, first))
        })?;
        let i1 = self.index_of(last).ok_or_else(|| {
            BlockError::OutOfBounds(format!("{} {} is outside the axis", self.name, last))
        })?;
        if i0 > i1 {
            return Err(BlockError::InvalidArgument(format!(
                "{} range {}..{} runs against the axis direction",
                self.name, first, last
            )));
        }
        Ok(i0..i1 + 1)
    }

    /// Full range of sample indices
    pub fn full_range(&self) -> Range<usize> {
        0..self.count
    }

    /// Same sampling as another axis (names are not compared)
    pub fn matches(&self, other: &AxisRange) -> bool {
        self.count == other.count
            && approx_eq(self.start, other.start)
            && approx_eq(self.delta, other.delta)
    }

    /// Check the stored count against start/end/delta, e.g. after deserializing
    pub fn validate(&self) -> Result<()> {
        let rebuilt = Self::new(self.name.clone(), self.start, self.end, self.delta)?;
        if rebuilt.count != self.count {
            return Err(BlockError::InvalidArgument(format!(
                "Axis {}: count {} inconsistent with range (expected {})",
                self.name, self.count, rebuilt.count
            )));
        }
        Ok(())
    }
}

impl fmt::Display for AxisRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}..{} step {} ({} samples)",
            self.name, self.start, self.end, self.delta, self.count
        )
    }
}
