// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node definitions for the graph.

use crate::error::{GraphError, Result};
use crate::socket::{Direction, Socket, SocketDescriptor, SocketId, SocketKey};
use crate::template::Template;
use egui::{Pos2, Rect, Vec2};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Height of the node title bar in world units
pub const HEADER_HEIGHT: f32 = 24.0;
/// Vertical spacing between sockets in world units
pub const SOCKET_SPACING: f32 = 22.0;

/// Unique identifier for a node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub String);

impl NodeId {
    /// Wrap an existing id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(format!("node-{}", Uuid::new_v4().simple()))
    }

    /// Borrow the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// A node instance in the graph
#[derive(Debug, Clone)]
pub struct Node {
    /// Unique instance ID
    pub id: NodeId,
    /// Template name
    pub node_type: String,
    /// Display label
    pub label: String,
    /// Top-left corner in world coordinates
    pub position: Pos2,
    /// Size in world units
    pub size: Vec2,
    /// Whether the node is selected
    pub selected: bool,
    /// Per-instance field values
    pub data: serde_json::Map<String, serde_json::Value>,
    inputs: IndexMap<SocketId, Socket>,
    outputs: IndexMap<SocketId, Socket>,
}

impl Node {
    /// Create a new node from a template
    pub fn from_template(id: NodeId, template: &Template) -> Self {
        let inputs = template
            .inputs
            .iter()
            .map(|desc| {
                let socket = Socket::from_descriptor(id.clone(), Direction::Input, desc);
                (socket.id.clone(), socket)
            })
            .collect();
        let outputs = template
            .outputs
            .iter()
            .map(|desc| {
                let socket = Socket::from_descriptor(id.clone(), Direction::Output, desc);
                (socket.id.clone(), socket)
            })
            .collect();
        Self {
            id,
            node_type: template.name.clone(),
            label: template.label.clone(),
            position: Pos2::ZERO,
            size: template.size(),
            selected: false,
            data: serde_json::Map::new(),
            inputs,
            outputs,
        }
    }

    /// Set the position
    pub fn with_position(mut self, position: Pos2) -> Self {
        self.position = position;
        self
    }

    /// Bounding rectangle in world coordinates
    pub fn rect(&self) -> Rect {
        Rect::from_min_size(self.position, self.size)
    }

    /// Input sockets in display order
    pub fn inputs(&self) -> impl Iterator<Item = &Socket> {
        self.inputs.values()
    }

    /// Output sockets in display order
    pub fn outputs(&self) -> impl Iterator<Item = &Socket> {
        self.outputs.values()
    }

    /// Get all sockets
    pub fn sockets(&self) -> impl Iterator<Item = &Socket> {
        self.inputs.values().chain(self.outputs.values())
    }

    /// Whether the node declares any input sockets
    pub fn has_inputs(&self) -> bool {
        !self.inputs.is_empty()
    }

    /// Get a socket by direction and id
    pub fn socket(&self, direction: Direction, id: &SocketId) -> Option<&Socket> {
        self.sockets_of(direction).get(id)
    }

    pub(crate) fn socket_mut(&mut self, direction: Direction, id: &SocketId) -> Option<&mut Socket> {
        match direction {
            Direction::Input => self.inputs.get_mut(id),
            Direction::Output => self.outputs.get_mut(id),
        }
    }

    /// Get an output socket by index
    pub fn output_at(&self, index: usize) -> Option<&Socket> {
        self.outputs.get_index(index).map(|(_, socket)| socket)
    }

    fn sockets_of(&self, direction: Direction) -> &IndexMap<SocketId, Socket> {
        match direction {
            Direction::Input => &self.inputs,
            Direction::Output => &self.outputs,
        }
    }

    /// Add a socket after construction
    pub fn add_socket(&mut self, direction: Direction, desc: &SocketDescriptor) -> Result<SocketKey> {
        let map = match direction {
            Direction::Input => &mut self.inputs,
            Direction::Output => &mut self.outputs,
        };
        if map.contains_key(&desc.id) {
            return Err(GraphError::DuplicateSocket {
                node: self.id.clone(),
                socket: desc.id.clone(),
            });
        }
        let socket = Socket::from_descriptor(self.id.clone(), direction, desc);
        let key = socket.key();
        map.insert(desc.id.clone(), socket);
        Ok(key)
    }

    pub(crate) fn take_socket(&mut self, direction: Direction, id: &SocketId) -> Option<Socket> {
        match direction {
            Direction::Input => self.inputs.shift_remove(id),
            Direction::Output => self.outputs.shift_remove(id),
        }
    }

    /// Layout position of a socket in world coordinates.
    ///
    /// Inputs sit on the left edge and outputs on the right edge, stacked below
    /// the header. Used when the rendering layer has not reported real geometry.
    pub fn socket_anchor(&self, direction: Direction, id: &SocketId) -> Option<Pos2> {
        let index = self.sockets_of(direction).get_index_of(id)?;
        let y = self.position.y + HEADER_HEIGHT + index as f32 * SOCKET_SPACING + SOCKET_SPACING / 2.0;
        let x = match direction {
            Direction::Input => self.position.x,
            Direction::Output => self.position.x + self.size.x,
        };
        Some(Pos2::new(x, y))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template() -> Template {
        Template::new("math", "Math")
            .with_input(SocketDescriptor::new("a", "number"))
            .with_input(SocketDescriptor::new("b", "number"))
            .with_output(SocketDescriptor::new("sum", "number"))
    }

    #[test]
    fn test_sockets_keep_declaration_order() {
        let node = Node::from_template(NodeId::new("n1"), &template());
        let ids: Vec<_> = node.inputs().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
        assert!(node.has_inputs());
        assert_eq!(node.output_at(0).map(|s| s.id.as_str()), Some("sum"));
    }

    #[test]
    fn test_duplicate_socket_rejected() {
        let mut node = Node::from_template(NodeId::new("n1"), &template());
        let err = node
            .add_socket(Direction::Input, &SocketDescriptor::new("a", "string"))
            .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateSocket { .. }));
        // Same id in the other direction is fine
        assert!(node
            .add_socket(Direction::Output, &SocketDescriptor::new("a", "string"))
            .is_ok());
    }

    #[test]
    fn test_socket_anchor_layout() {
        let node = Node::from_template(NodeId::new("n1"), &template()).with_position(Pos2::new(10.0, 20.0));
        let b = node.socket_anchor(Direction::Input, &SocketId::new("b")).unwrap();
        assert_eq!(b, Pos2::new(10.0, 20.0 + HEADER_HEIGHT + SOCKET_SPACING * 1.5));
        let sum = node.socket_anchor(Direction::Output, &SocketId::new("sum")).unwrap();
        assert_eq!(sum.x, 10.0 + node.size.x);
        assert!(node.socket_anchor(Direction::Output, &SocketId::new("nope")).is_none());
    }

    #[test]
    fn test_generated_ids_are_unique() {
        assert_ne!(NodeId::generate(), NodeId::generate());
    }
}
