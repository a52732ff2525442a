// SPDX-License-Identifier: MIT OR Apache-2.0
//! Pan/zoom state, screen/world transforms and canvas gestures.
//!
//! World coordinates are the graph's own space; screen coordinates are pixels
//! relative to the canvas origin. `screen = world * scale + pan`.

use crate::input::PointerId;
use egui::{Pos2, Rect, Vec2};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default minimum scale
pub const DEFAULT_MIN_SCALE: f32 = 0.1;
/// Default maximum scale
pub const DEFAULT_MAX_SCALE: f32 = 3.0;
/// Scale used by the double-tap zoom-in
pub const DOUBLE_TAP_SCALE: f32 = 2.0;

/// Snapshot of the pan/zoom transform
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ViewportState {
    /// Horizontal pan in screen pixels
    pub x: f32,
    /// Vertical pan in screen pixels
    pub y: f32,
    /// Zoom factor
    pub scale: f32,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            scale: 1.0,
        }
    }
}

/// Pan/zoom transform with scale bounds
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    state: ViewportState,
    min_scale: f32,
    max_scale: f32,
    canvas_size: Vec2,
}

impl Viewport {
    /// Create a viewport at the origin with unit scale
    pub fn new(min_scale: f32, max_scale: f32) -> Self {
        let min_scale = min_scale.max(f32::EPSILON);
        Self {
            state: ViewportState::default(),
            min_scale,
            max_scale: max_scale.max(min_scale),
            canvas_size: Vec2::new(1280.0, 720.0),
        }
    }

    /// Current transform
    pub fn state(&self) -> ViewportState {
        self.state
    }

    /// Current scale
    pub fn scale(&self) -> f32 {
        self.state.scale
    }

    /// Current pan offset
    pub fn pan(&self) -> Vec2 {
        Vec2::new(self.state.x, self.state.y)
    }

    /// Scale bounds
    pub fn scale_bounds(&self) -> (f32, f32) {
        (self.min_scale, self.max_scale)
    }

    /// Canvas size in screen pixels
    pub fn canvas_size(&self) -> Vec2 {
        self.canvas_size
    }

    /// Set the canvas size in screen pixels
    pub fn set_canvas_size(&mut self, size: Vec2) {
        self.canvas_size = size;
    }

    /// Clamp a scale to the configured bounds
    pub fn clamp_scale(&self, scale: f32) -> f32 {
        scale.clamp(self.min_scale, self.max_scale)
    }

    /// Convert screen position to world position
    pub fn screen_to_world(&self, screen: Pos2) -> Pos2 {
        Pos2::new(
            (screen.x - self.state.x) / self.state.scale,
            (screen.y - self.state.y) / self.state.scale,
        )
    }

    /// Convert world position to screen position
    pub fn world_to_screen(&self, world: Pos2) -> Pos2 {
        Pos2::new(
            world.x * self.state.scale + self.state.x,
            world.y * self.state.scale + self.state.y,
        )
    }

    /// World-space area covered by the canvas
    pub fn visible_world_rect(&self) -> Rect {
        Rect::from_min_max(
            self.screen_to_world(Pos2::ZERO),
            self.screen_to_world(Pos2::ZERO + self.canvas_size),
        )
    }

    /// Replace the transform; the scale is clamped
    pub fn set(&mut self, state: ViewportState) {
        self.state = ViewportState {
            x: state.x,
            y: state.y,
            scale: self.clamp_scale(state.scale),
        };
    }

    /// Pan by a screen-space delta
    pub fn pan_by(&mut self, delta: Vec2) {
        self.state.x += delta.x;
        self.state.y += delta.y;
    }

    /// Multiply the scale by `factor`, keeping `anchor` fixed on screen
    pub fn zoom_at(&mut self, anchor: Pos2, factor: f32) {
        self.zoom_to(anchor, self.state.scale * factor);
    }

    /// Set the scale, keeping `anchor` fixed on screen
    pub fn zoom_to(&mut self, anchor: Pos2, scale: f32) {
        let scale = self.clamp_scale(scale);
        let ratio = scale / self.state.scale;
        self.state.x = anchor.x - (anchor.x - self.state.x) * ratio;
        self.state.y = anchor.y - (anchor.y - self.state.y) * ratio;
        self.state.scale = scale;
    }

    /// Frame `bounds` (world space) in the canvas with `padding` pixels around it
    pub fn fit_to(&mut self, bounds: Rect, padding: f32) {
        self.state = self.fit_state(bounds, padding);
    }

    /// Transform that would frame `bounds`, without applying it
    pub fn fit_state(&self, bounds: Rect, padding: f32) -> ViewportState {
        let available = (self.canvas_size - Vec2::splat(padding * 2.0)).max(Vec2::splat(1.0));
        let size = bounds.size().max(Vec2::splat(1.0));
        let scale = self.clamp_scale((available.x / size.x).min(available.y / size.y));
        let center = bounds.center();
        ViewportState {
            x: self.canvas_size.x / 2.0 - center.x * scale,
            y: self.canvas_size.y / 2.0 - center.y * scale,
            scale,
        }
    }

    /// Double-tap behaviour: zoom to 2x at the tap, or back to fit when already zoomed in
    pub fn toggle_zoom(&mut self, anchor: Pos2, content: Option<Rect>, padding: f32) {
        let target = self.clamp_scale(DOUBLE_TAP_SCALE);
        if (self.state.scale - target).abs() < 0.01 {
            match content {
                Some(bounds) => self.fit_to(bounds, padding),
                None => self.zoom_to(anchor, 1.0),
            }
        } else {
            self.zoom_to(anchor, target);
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_SCALE, DEFAULT_MAX_SCALE)
    }
}

/// Result of feeding input to the gesture recognizer
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GestureOutcome {
    /// Viewport was panned
    Panned,
    /// Viewport was zoomed (pinch or wheel)
    Zoomed,
    /// Double tap detected at this screen position
    DoubleTap(Pos2),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum GestureMode {
    Idle,
    Panning {
        pointer: PointerId,
        last: Pos2,
    },
    Pinching {
        initial_distance: f32,
        initial_scale: f32,
        last_mid: Pos2,
    },
}

#[derive(Debug, Clone, Copy)]
struct Tap {
    position: Pos2,
    time: Duration,
}

/// Canvas gesture recognizer: drag-pan, pinch-zoom and double tap.
#[derive(Debug, Clone)]
pub struct ViewportGestures {
    touches: IndexMap<PointerId, Pos2>,
    mode: GestureMode,
    last_tap: Option<Tap>,
    double_tap_interval: Duration,
    double_tap_distance: f32,
}

impl ViewportGestures {
    /// Create a recognizer with the given double-tap limits
    pub fn new(double_tap_interval: Duration, double_tap_distance: f32) -> Self {
        Self {
            touches: IndexMap::new(),
            mode: GestureMode::Idle,
            last_tap: None,
            double_tap_interval,
            double_tap_distance,
        }
    }

    /// Whether any pointer is tracked
    pub fn is_active(&self) -> bool {
        !self.touches.is_empty()
    }

    /// Whether a pointer belongs to this recognizer
    pub fn tracks(&self, pointer: PointerId) -> bool {
        self.touches.contains_key(&pointer)
    }

    /// Whether a pinch is in progress
    pub fn is_pinching(&self) -> bool {
        matches!(self.mode, GestureMode::Pinching { .. })
    }

    /// Whether a pan is in progress
    pub fn is_panning(&self) -> bool {
        matches!(self.mode, GestureMode::Panning { .. })
    }

    /// A pointer went down on empty canvas (or a second touch joined)
    pub fn pointer_down(
        &mut self,
        viewport: &Viewport,
        pointer: PointerId,
        position: Pos2,
        time: Duration,
    ) -> Option<GestureOutcome> {
        self.touches.insert(pointer, position);
        match self.touches.len() {
            1 => {
                self.mode = GestureMode::Panning {
                    pointer,
                    last: position,
                };
                self.register_tap(position, time)
            }
            2 => {
                self.start_pinch(viewport);
                None
            }
            // Extra fingers are tracked but do not change the gesture
            _ => None,
        }
    }

    fn register_tap(&mut self, position: Pos2, time: Duration) -> Option<GestureOutcome> {
        let is_double = self.last_tap.is_some_and(|tap| {
            time.saturating_sub(tap.time) <= self.double_tap_interval
                && tap.position.distance(position) <= self.double_tap_distance
        });
        if is_double {
            self.last_tap = None;
            Some(GestureOutcome::DoubleTap(position))
        } else {
            self.last_tap = Some(Tap { position, time });
            None
        }
    }

    fn start_pinch(&mut self, viewport: &Viewport) {
        let Some((a, b)) = self.first_two() else {
            return;
        };
        self.last_tap = None;
        self.mode = GestureMode::Pinching {
            initial_distance: a.distance(b).max(1.0),
            initial_scale: viewport.scale(),
            last_mid: midpoint(a, b),
        };
    }

    fn first_two(&self) -> Option<(Pos2, Pos2)> {
        let mut points = self.touches.values().copied();
        Some((points.next()?, points.next()?))
    }

    /// A tracked pointer moved
    pub fn pointer_move(
        &mut self,
        viewport: &mut Viewport,
        pointer: PointerId,
        position: Pos2,
    ) -> Option<GestureOutcome> {
        let tracked = self.touches.get_mut(&pointer)?;
        *tracked = position;

        match self.mode {
            GestureMode::Idle => None,
            GestureMode::Panning { pointer: owner, last } => {
                if owner != pointer {
                    return None;
                }
                let delta = position - last;
                self.mode = GestureMode::Panning {
                    pointer,
                    last: position,
                };
                if delta == Vec2::ZERO {
                    return None;
                }
                // Movement means this was not a tap
                self.last_tap = None;
                viewport.pan_by(delta);
                Some(GestureOutcome::Panned)
            }
            GestureMode::Pinching {
                initial_distance,
                initial_scale,
                last_mid,
            } => {
                let (a, b) = self.first_two()?;
                let mid = midpoint(a, b);
                viewport.pan_by(mid - last_mid);
                let ratio = a.distance(b) / initial_distance;
                viewport.zoom_to(mid, initial_scale * ratio);
                self.mode = GestureMode::Pinching {
                    initial_distance,
                    initial_scale,
                    last_mid: mid,
                };
                Some(GestureOutcome::Zoomed)
            }
        }
    }

    /// A tracked pointer was released.
    ///
    /// `over_interactive` reports whether a screen position is over a node or
    /// socket; a lone touch left behind by a pinch only resumes panning when it
    /// is not.
    pub fn pointer_up(
        &mut self,
        viewport: &Viewport,
        pointer: PointerId,
        over_interactive: impl Fn(Pos2) -> bool,
    ) {
        if self.touches.shift_remove(&pointer).is_none() {
            return;
        }
        match self.touches.len() {
            0 => self.mode = GestureMode::Idle,
            1 => {
                let was_pinching = self.is_pinching();
                let lost_owner =
                    matches!(self.mode, GestureMode::Panning { pointer: owner, .. } if owner == pointer);
                if was_pinching || lost_owner {
                    self.mode = match self.touches.first() {
                        Some((&remaining, &position)) if !over_interactive(position) => {
                            GestureMode::Panning {
                                pointer: remaining,
                                last: position,
                            }
                        }
                        _ => GestureMode::Idle,
                    };
                }
            }
            _ => self.start_pinch(viewport),
        }
    }

    /// Forget every pointer
    pub fn cancel(&mut self) {
        self.touches.clear();
        self.mode = GestureMode::Idle;
    }
}

impl Default for ViewportGestures {
    fn default() -> Self {
        Self::new(Duration::from_millis(300), 50.0)
    }
}

fn midpoint(a: Pos2, b: Pos2) -> Pos2 {
    Pos2::new((a.x + b.x) / 2.0, (a.y + b.y) / 2.0)
}
