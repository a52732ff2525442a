// SPDX-License-Identifier: MIT OR Apache-2.0
//! Input events routed into the graph controller.

use egui::{Pos2, Vec2};
use std::time::Duration;

/// Identifier of a pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PointerId {
    /// The mouse pointer
    Mouse,
    /// A touch point, by platform touch id
    Touch(u64),
}

/// Kind of pointing device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    /// Mouse or pen
    Mouse,
    /// Touch point
    Touch,
}

/// Keyboard modifiers held during an event
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    /// Shift key
    pub shift: bool,
}

/// A pointer sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// Pointer identity
    pub pointer: PointerId,
    /// Device kind
    pub kind: PointerKind,
    /// Position in screen pixels relative to the canvas
    pub position: Pos2,
    /// Event timestamp
    pub time: Duration,
    /// Modifiers held
    pub modifiers: Modifiers,
}

impl PointerEvent {
    /// Mouse event at a position
    pub fn mouse(position: Pos2, time: Duration) -> Self {
        Self {
            pointer: PointerId::Mouse,
            kind: PointerKind::Mouse,
            position,
            time,
            modifiers: Modifiers::default(),
        }
    }

    /// Touch event for a touch point
    pub fn touch(id: u64, position: Pos2, time: Duration) -> Self {
        Self {
            pointer: PointerId::Touch(id),
            kind: PointerKind::Touch,
            position,
            time,
            modifiers: Modifiers::default(),
        }
    }

    /// Same event with shift held
    pub fn with_shift(mut self) -> Self {
        self.modifiers.shift = true;
        self
    }
}

/// Mouse wheel sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WheelEvent {
    /// Cursor position in screen pixels
    pub position: Pos2,
    /// Scroll delta; positive y zooms in
    pub delta: Vec2,
    /// Modifiers held
    pub modifiers: Modifiers,
}

/// Keyboard commands understood by the controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyCommand {
    /// Abort the current gesture (Escape)
    Cancel,
    /// Delete selected nodes (Delete / Backspace)
    DeleteSelection,
    /// Copy selection to the clipboard
    Copy,
    /// Paste the clipboard
    Paste,
    /// Select every node
    SelectAll,
}
