//! Traversal configuration

use crate::error::{BlockError, Result};
use crate::types::TraversalOrder;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default capacity of the streaming pipeline queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 4;

/// Parameters of a block traversal
///
/// Deserializes from JSON; missing fields take their defaults:
///
/// ```json
/// { "a_block_size": 5, "b_block_size": 5, "a_increment": 3, "order": "b_major" }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraversalConfig {
    /// Lines per block along A
    pub a_block_size: usize,
    /// Lines per block along B
    pub b_block_size: usize,
    /// Step between block starts along A
    pub a_increment: usize,
    /// Step between block starts along B
    pub b_increment: usize,
    /// Traversal order; `None` uses the primary dataset's preferred order
    pub order: Option<TraversalOrder>,
    /// Sample-axis interval (first, last) to read; `None` reads every sample
    pub sample_range: Option<(f64, f64)>,
    /// Capacity of the streaming pipeline queue
    pub queue_capacity: usize,
    /// Drop items without any column before they enter the pipeline queue
    pub skip_empty: bool,
}

impl Default for TraversalConfig {
    fn default() -> Self {
        Self {
            a_block_size: 1,
            b_block_size: 1,
            a_increment: 1,
            b_increment: 1,
            order: None,
            sample_range: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            skip_empty: false,
        }
    }
}

impl TraversalConfig {
    /// Create a configuration for `a x b` blocks that abut without overlap
    pub fn new(a_block_size: usize, b_block_size: usize) -> Self {
        Self {
            a_block_size,
            b_block_size,
            a_increment: a_block_size,
            b_increment: b_block_size,
            ..Self::default()
        }
    }

    /// Set the block start increments
    pub fn with_increments(mut self, a_increment: usize, b_increment: usize) -> Self {
        self.a_increment = a_increment;
        self.b_increment = b_increment;
        self
    }

    /// Force a traversal order
    pub fn with_order(mut self, order: TraversalOrder) -> Self {
        self.order = Some(order);
        self
    }

    /// Restrict the sample axis to `first..=last`
    pub fn with_sample_range(mut self, first: f64, last: f64) -> Self {
        self.sample_range = Some((first, last));
        self
    }

    /// Set the pipeline queue capacity
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Skip items that lie entirely outside the region when streaming
    pub fn with_skip_empty(mut self, skip_empty: bool) -> Self {
        self.skip_empty = skip_empty;
        self
    }

    /// Check that all sizes are positive
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("a_block_size", self.a_block_size),
            ("b_block_size", self.b_block_size),
            ("a_increment", self.a_increment),
            ("b_increment", self.b_increment),
            ("queue_capacity", self.queue_capacity),
        ];
        for (name, value) in fields {
            if value == 0 {
                return Err(BlockError::InvalidArgument(format!(
                    "{name} must be positive"
                )));
            }
        }
        if let Some((first, last)) = self.sample_range {
            if !first.is_finite() || !last.is_finite() {
                return Err(BlockError::InvalidArgument(
                    "sample_range bounds must be finite".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| BlockError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON configuration file
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }
}
