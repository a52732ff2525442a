// SPDX-License-Identifier: MIT OR Apache-2.0
//! Rendering-agnostic node editor core.
//!
//! This crate provides the interactive engine behind a visual node editor:
//! - Typed input/output sockets and connection validation
//! - Spatial hashing for socket hit-testing
//! - Pointer/touch gestures: connection drag, long-press menus, node drag,
//!   pan, pinch-zoom and double-tap zoom
//! - Dependency-ordered execution with branch gating
//!
//! ## Architecture
//!
//! [`GraphController`] owns every component and is the entry point for
//! hosts. Rendering is delegated to a [`Presenter`]; changes are reported as
//! [`GraphEvent`]s.

pub mod config;
pub mod connect;
pub mod controller;
pub mod document;
pub mod drag;
pub mod edge;
pub mod error;
pub mod events;
pub mod execution;
pub mod graph;
pub mod input;
pub mod node;
pub mod path;
pub mod presenter;
pub mod presets;
pub mod selection;
pub mod socket;
pub mod spatial;
pub mod template;
pub mod viewport;

pub use config::GraphConfig;
pub use controller::{GraphController, Hit};
pub use document::GraphDocument;
pub use edge::{Edge, EdgeId};
pub use error::{ConnectionError, ExecutionError, GraphError};
pub use events::{EventBus, EventKind, GraphEvent};
pub use execution::{ExecutionPlan, ExecutionReport, NodeContext};
pub use graph::Graph;
pub use input::{KeyCommand, PointerEvent, WheelEvent};
pub use node::{Node, NodeId};
pub use presenter::{NullPresenter, Presenter, VisualUpdate};
pub use socket::{DataType, Direction, SocketDescriptor, SocketId, SocketKey};
pub use spatial::SpatialGrid;
pub use template::{ExecuteHook, Template, TemplateRegistry};
pub use viewport::{Viewport, ViewportState};
