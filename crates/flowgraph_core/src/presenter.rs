// SPDX-License-Identifier: MIT OR Apache-2.0
//! Contract with the rendering layer.
//!
//! The core never draws. It asks the presenter for measured geometry and
//! hands it visual updates, which the presenter is free to batch and apply on
//! its next frame.

use crate::edge::EdgeId;
use crate::node::NodeId;
use crate::path::EdgePath;
use crate::socket::SocketKey;
use egui::{Color32, Rect};

/// Visual side effect requested by the core
#[derive(Debug, Clone, PartialEq)]
pub enum VisualUpdate {
    /// Show or move the in-progress connection path
    TempPath {
        /// Path in screen space
        path: EdgePath,
        /// Stroke colour
        color: Color32,
    },
    /// Remove the in-progress connection path
    ClearTempPath,
    /// Highlight a socket as the would-be connection target
    HoverTarget(SocketKey),
    /// Remove any hover highlight
    ClearHover,
    /// Briefly flash a socket that refused a connection
    RejectFlash(SocketKey),
    /// Node selected state changed
    NodeSelected {
        /// Node
        node: NodeId,
        /// New state
        selected: bool,
    },
    /// Node moved to a new world position
    NodeMoved(NodeId),
    /// Edge added or removed; re-render it
    EdgeChanged(EdgeId),
    /// Node execution started or finished
    NodeExecuting {
        /// Node
        node: NodeId,
        /// Whether the node is running
        active: bool,
    },
    /// Viewport transform changed
    ViewportChanged,
}

/// Rendering layer attached to a controller
pub trait Presenter {
    /// Measured screen-space bounds of a socket, if it has been laid out
    fn socket_bounds(&self, socket: &SocketKey) -> Option<Rect> {
        let _ = socket;
        None
    }

    /// Queue a visual update
    fn apply(&mut self, update: VisualUpdate) {
        let _ = update;
    }
}

/// Presenter that measures nothing and ignores updates
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPresenter;

impl Presenter for NullPresenter {}

/// Presenter that keeps every update, for headless hosts and tests
#[derive(Debug, Default, Clone)]
pub struct RecordingPresenter {
    /// Updates in the order they were applied
    pub updates: Vec<VisualUpdate>,
}

impl RecordingPresenter {
    /// Drain recorded updates
    pub fn take(&mut self) -> Vec<VisualUpdate> {
        std::mem::take(&mut self.updates)
    }
}

impl Presenter for RecordingPresenter {
    fn apply(&mut self, update: VisualUpdate) {
        self.updates.push(update);
    }
}
