//! Region filters - spatial predicates deciding which columns carry data

use crate::error::{BlockError, Result};
use serde::{Deserialize, Serialize};

/// Spatial predicate over world coordinates
pub trait RegionFilter: Send + Sync {
    /// True if the point lies inside the region
    fn contains(&self, x: f64, y: f64) -> bool;
}

impl<F> RegionFilter for F
where
    F: Fn(f64, f64) -> bool + Send + Sync,
{
    fn contains(&self, x: f64, y: f64) -> bool {
        self(x, y)
    }
}

/// Axis-aligned rectangle in world coordinates (bounds inclusive)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpatialExtent {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl SpatialExtent {
    pub fn new(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Result<Self> {
        if !(min_x <= max_x && min_y <= max_y) {
            return Err(BlockError::InvalidArgument(format!(
                "Empty extent ({min_x}, {min_y}) - ({max_x}, {max_y})"
            )));
        }
        Ok(Self {
            min_x,
            min_y,
            max_x,
            max_y,
        })
    }
}

impl RegionFilter for SpatialExtent {
    fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.min_x && x <= self.max_x && y >= self.min_y && y <= self.max_y
    }
}

/// Closed polygon in world coordinates, tested with the even-odd rule
///
/// Serialized as `{ "vertices": [[x, y], ...] }`; the extent is derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PolygonVertices", into = "PolygonVertices")]
pub struct PolygonRegion {
    vertices: Vec<(f64, f64)>,
    extent: SpatialExtent,
}

#[derive(Serialize, Deserialize)]
struct PolygonVertices {
    vertices: Vec<(f64, f64)>,
}

impl TryFrom<PolygonVertices> for PolygonRegion {
    type Error = BlockError;

    fn try_from(raw: PolygonVertices) -> Result<Self> {
        Self::new(raw.vertices)
    }
}

impl From<PolygonRegion> for PolygonVertices {
    fn from(polygon: PolygonRegion) -> Self {
        Self {
            vertices: polygon.vertices,
        }
    }
}

impl PolygonRegion {
    /// Create a polygon from at least three vertices (closing edge implied)
    pub fn new(vertices: Vec<(f64, f64)>) -> Result<Self> {
        if vertices.len() < 3 {
            return Err(BlockError::InvalidArgument(format!(
                "Polygon needs at least 3 vertices, got {}",
                vertices.len()
            )));
        }
        let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
        let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
        for &(x, y) in &vertices {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }
        let extent = SpatialExtent::new(min_x, min_y, max_x, max_y)?;
        Ok(Self { vertices, extent })
    }

    /// Bounding box of the polygon
    pub fn extent(&self) -> SpatialExtent {
        self.extent
    }

    pub fn vertices(&self) -> &[(f64, f64)] {
        &self.vertices
    }
}

impl RegionFilter for PolygonRegion {
    fn contains(&self, x: f64, y: f64) -> bool {
        if !self.extent.contains(x, y) {
            return false;
        }
        let mut inside = false;
        let n = self.vertices.len();
        let mut j = n - 1;
        for i in 0..n {
            let (xi, yi) = self.vertices[i];
            let (xj, yj) = self.vertices[j];
            if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
                inside = !inside;
            }
            j = i;
        }
        inside
    }
}
