//! Grid geometry - the A/B/sample axes of a volume and their placement in world coordinates

use crate::error::Result;
use crate::types::{approx_eq, AxisRange};
use serde::{Deserialize, Serialize};

/// Affine mapping from grid indices to world (x, y)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridTransform {
    /// World x of grid index (0, 0)
    pub origin_x: f64,
    /// World y of grid index (0, 0)
    pub origin_y: f64,
    /// World offset of one step along A
    pub a_step: (f64, f64),
    /// World offset of one step along B
    pub b_step: (f64, f64),
}

impl GridTransform {
    /// Create a new transform
    pub fn new(origin: (f64, f64), a_step: (f64, f64), b_step: (f64, f64)) -> Self {
        Self {
            origin_x: origin.0,
            origin_y: origin.1,
            a_step,
            b_step,
        }
    }

    /// Axis-aligned grid: A runs along x, B along y
    pub fn axis_aligned(origin: (f64, f64), a_spacing: f64, b_spacing: f64) -> Self {
        Self::new(origin, (a_spacing, 0.0), (0.0, b_spacing))
    }

    /// World coordinate of a grid index
    pub fn xy_at(&self, a_index: usize, b_index: usize) -> (f64, f64) {
        let a = a_index as f64;
        let b = b_index as f64;
        (
            self.origin_x + a * self.a_step.0 + b * self.b_step.0,
            self.origin_y + a * self.a_step.1 + b * self.b_step.1,
        )
    }

    fn matches(&self, other: &GridTransform) -> bool {
        approx_eq(self.origin_x, other.origin_x)
            && approx_eq(self.origin_y, other.origin_y)
            && approx_eq(self.a_step.0, other.a_step.0)
            && approx_eq(self.a_step.1, other.a_step.1)
            && approx_eq(self.b_step.0, other.b_step.0)
            && approx_eq(self.b_step.1, other.b_step.1)
    }
}

impl Default for GridTransform {
    fn default() -> Self {
        Self::axis_aligned((0.0, 0.0), 1.0, 1.0)
    }
}

/// Geometry of a volume: two grid axes, the sample axis and the world transform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    /// Grid axis A (inline for seismic)
    pub a_axis: AxisRange,
    /// Grid axis B (crossline for seismic)
    pub b_axis: AxisRange,
    /// Sample axis (time or depth)
    pub sample_axis: AxisRange,
    /// Grid to world mapping
    pub transform: GridTransform,
}

impl GridGeometry {
    /// Create a new geometry with a unit axis-aligned transform
    pub fn new(a_axis: AxisRange, b_axis: AxisRange, sample_axis: AxisRange) -> Self {
        Self {
            a_axis,
            b_axis,
            sample_axis,
            transform: GridTransform::default(),
        }
    }

    /// Set the world transform
    pub fn with_transform(mut self, transform: GridTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Number of lines along A
    pub fn num_a(&self) -> usize {
        self.a_axis.count()
    }

    /// Number of lines along B
    pub fn num_b(&self) -> usize {
        self.b_axis.count()
    }

    /// Number of samples per column
    pub fn num_samples(&self) -> usize {
        self.sample_axis.count()
    }

    /// World coordinate of a grid index
    pub fn xy_at(&self, a_index: usize, b_index: usize) -> (f64, f64) {
        self.transform.xy_at(a_index, b_index)
    }

    /// Same A/B grid and world placement as another geometry.
    ///
    /// Sample axes are not compared: each dataset resolves the requested
    /// sample interval against its own sample axis.
    pub fn matches_grid(&self, other: &GridGeometry) -> bool {
        self.a_axis.matches(&other.a_axis)
            && self.b_axis.matches(&other.b_axis)
            && self.transform.matches(&other.transform)
    }

    /// Validate all axes, e.g. after deserializing
    pub fn validate(&self) -> Result<()> {
        self.a_axis.validate()?;
        self.b_axis.validate()?;
        self.sample_axis.validate()
    }

    /// Get a summary string of the geometry
    pub fn summary(&self) -> String {
        format!(
            "{} x {} x {} ({} / {} / {})",
            self.num_a(),
            self.num_b(),
            self.num_samples(),
            self.a_axis.name,
            self.b_axis.name,
            self.sample_axis.name
        )
    }
}
