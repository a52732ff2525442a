// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error loading a configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// RON parse failure
    #[error("Invalid configuration: {0}")]
    Parse(#[from] ron::error::SpannedError),
}

/// Tunables for a graph instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Reject every mutation and ignore editing gestures
    pub read_only: bool,
    /// Cell size of the socket hit-test grid (world units)
    pub grid_cell_size: f32,
    /// Minimum viewport scale
    pub min_scale: f32,
    /// Maximum viewport scale
    pub max_scale: f32,
    /// Socket hit radius in screen pixels
    pub socket_hit_radius: f32,
    /// Hold time before a touch on a connected socket opens its menu
    pub long_press_ms: u64,
    /// Maximum interval between the taps of a double tap
    pub double_tap_ms: u64,
    /// Maximum distance between the taps of a double tap (screen pixels)
    pub double_tap_distance: f32,
    /// Offset applied to pasted nodes (world units)
    pub paste_offset: [f32; 2],
    /// Wheel delta to zoom factor multiplier
    pub wheel_sensitivity: f32,
    /// Snap dragged nodes to the grid on release
    pub snap_to_grid: bool,
    /// Grid size for snapping
    pub snap_size: f32,
    /// Padding around content for fit zoom (screen pixels)
    pub fit_padding: f32,
    /// Size of the canvas in screen pixels
    pub canvas_size: [f32; 2],
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            read_only: false,
            grid_cell_size: 50.0,
            min_scale: 0.1,
            max_scale: 3.0,
            socket_hit_radius: 15.0,
            long_press_ms: 500,
            double_tap_ms: 300,
            double_tap_distance: 50.0,
            paste_offset: [20.0, 20.0],
            wheel_sensitivity: 0.001,
            snap_to_grid: false,
            snap_size: 20.0,
            fit_padding: 40.0,
            canvas_size: [1280.0, 720.0],
        }
    }
}

impl GraphConfig {
    /// Parse a configuration from RON; missing fields take their defaults
    pub fn from_ron(source: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(source)?)
    }

    /// Long-press threshold
    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }

    /// Double-tap interval
    pub fn double_tap(&self) -> Duration {
        Duration::from_millis(self.double_tap_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config = GraphConfig::from_ron("(read_only: true, max_scale: 4.0)").unwrap();
        assert!(config.read_only);
        assert_eq!(config.max_scale, 4.0);
        assert_eq!(config.grid_cell_size, 50.0);
        assert_eq!(config.long_press(), Duration::from_millis(500));
    }

    #[test]
    fn test_invalid_ron() {
        assert!(GraphConfig::from_ron("(read_only: maybe)").is_err());
    }
}
