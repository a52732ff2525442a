// SPDX-License-Identifier: MIT OR Apache-2.0
//! Multi-node dragging.

use crate::input::PointerId;
use crate::node::NodeId;
use egui::{Pos2, Vec2};

/// A completed node move
#[derive(Debug, Clone, PartialEq)]
pub struct NodeMove {
    /// Node
    pub node: NodeId,
    /// Position before the drag
    pub from: Pos2,
    /// Position after the drag
    pub to: Pos2,
}

impl NodeMove {
    /// Whether the node ended somewhere other than where it started
    pub fn is_move(&self) -> bool {
        self.from != self.to
    }
}

#[derive(Debug, Clone)]
struct Drag {
    pointer: PointerId,
    start: Pos2,
    /// Starting positions of nodes being dragged
    snapshots: Vec<(NodeId, Pos2)>,
    /// Latest positions
    current: Vec<Pos2>,
}

/// Moves a set of nodes by a pointer's total displacement
#[derive(Debug, Clone, Default)]
pub struct DragController {
    drag: Option<Drag>,
    /// Round positions to `snap_size` on release
    pub snap_to_grid: bool,
    /// Grid size for snapping
    pub snap_size: f32,
}

impl DragController {
    /// Create a controller with the given snapping
    pub fn new(snap_to_grid: bool, snap_size: f32) -> Self {
        Self {
            drag: None,
            snap_to_grid,
            snap_size,
        }
    }

    /// Whether a drag is in progress
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Pointer driving the drag
    pub fn pointer(&self) -> Option<PointerId> {
        self.drag.as_ref().map(|d| d.pointer)
    }

    /// Start a drag from a screen position with the nodes' current positions
    pub fn begin(&mut self, pointer: PointerId, screen: Pos2, snapshots: Vec<(NodeId, Pos2)>) {
        let current = snapshots.iter().map(|(_, p)| *p).collect();
        self.drag = Some(Drag {
            pointer,
            start: screen,
            snapshots,
            current,
        });
    }

    /// Apply the pointer's total screen displacement to every snapshot.
    ///
    /// Returns the new world position of each dragged node.
    pub fn update(&mut self, screen: Pos2, scale: f32) -> Vec<(NodeId, Pos2)> {
        let Some(drag) = self.drag.as_mut() else {
            return Vec::new();
        };
        let delta: Vec2 = (screen - drag.start) / scale.max(f32::EPSILON);
        drag.current = drag.snapshots.iter().map(|(_, p)| *p + delta).collect();
        drag.snapshots
            .iter()
            .zip(&drag.current)
            .map(|((id, _), p)| (id.clone(), *p))
            .collect()
    }

    /// Snap a position to the grid when snapping is on
    pub fn snap_position(&self, pos: Pos2) -> Pos2 {
        if self.snap_to_grid && self.snap_size > 0.0 {
            Pos2::new(
                (pos.x / self.snap_size).round() * self.snap_size,
                (pos.y / self.snap_size).round() * self.snap_size,
            )
        } else {
            pos
        }
    }

    /// Finish the drag, returning every dragged node's snapped final position.
    ///
    /// Nodes snapped back onto their start are included; check
    /// [`NodeMove::is_move`] before reporting a move.
    pub fn end(&mut self) -> Vec<NodeMove> {
        let Some(drag) = self.drag.take() else {
            return Vec::new();
        };
        drag.snapshots
            .into_iter()
            .zip(drag.current)
            .map(|((node, from), to)| NodeMove {
                node,
                from,
                to: self.snap_position(to),
            })
            .collect()
    }

    /// Abandon the drag, returning the snapshots to restore
    pub fn cancel(&mut self) -> Vec<(NodeId, Pos2)> {
        self.drag.take().map(|d| d.snapshots).unwrap_or_default()
    }
}
