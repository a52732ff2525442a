// SPDX-License-Identifier: MIT OR Apache-2.0
//! Edge path geometry.

use egui::Pos2;

/// Horizontal control-point offset at unit scale
pub const BEZIER_CURVATURE: f32 = 50.0;

/// Cubic bezier between two screen points, bending horizontally out of the
/// source and into the target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgePath {
    /// Start point (output side)
    pub from: Pos2,
    /// First control point
    pub ctrl1: Pos2,
    /// Second control point
    pub ctrl2: Pos2,
    /// End point (input side)
    pub to: Pos2,
}

impl EdgePath {
    /// Path from an output anchor to an input anchor at the given zoom
    pub fn between(from: Pos2, to: Pos2, scale: f32) -> Self {
        let distance = (to.x - from.x).abs();
        let curvature = (BEZIER_CURVATURE * scale).min(distance * 0.5);
        Self {
            from,
            ctrl1: Pos2::new(from.x + curvature, from.y),
            ctrl2: Pos2::new(to.x - curvature, to.y),
            to,
        }
    }

    /// Point at parameter `t` in `0..=1`
    pub fn point(&self, t: f32) -> Pos2 {
        let mt = 1.0 - t;
        let a = mt * mt * mt;
        let b = 3.0 * mt * mt * t;
        let c = 3.0 * mt * t * t;
        let d = t * t * t;
        Pos2::new(
            a * self.from.x + b * self.ctrl1.x + c * self.ctrl2.x + d * self.to.x,
            a * self.from.y + b * self.ctrl1.y + c * self.ctrl2.y + d * self.to.y,
        )
    }

    /// Polyline approximation with `segments` segments
    pub fn points(&self, segments: usize) -> Vec<Pos2> {
        let segments = segments.max(1);
        (0..=segments)
            .map(|i| self.point(i as f32 / segments as f32))
            .collect()
    }

    /// SVG path data (`M .. C ..`)
    pub fn svg(&self) -> String {
        format!(
            "M {} {} C {} {}, {} {}, {} {}",
            self.from.x, self.from.y, self.ctrl1.x, self.ctrl1.y, self.ctrl2.x, self.ctrl2.y, self.to.x, self.to.y
        )
    }
}
