// SPDX-License-Identifier: MIT OR Apache-2.0
//! Socket definitions for node inputs/outputs.

use crate::edge::EdgeId;
use crate::node::NodeId;
use egui::Color32;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a socket, unique within its node and direction
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SocketId(pub String);

impl SocketId {
    /// Create a socket id
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SocketId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Socket direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Input socket
    Input,
    /// Output socket
    Output,
}

/// Fully qualified address of a socket
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SocketKey {
    /// Owning node
    pub node: NodeId,
    /// Socket direction
    pub direction: Direction,
    /// Socket id within the node and direction
    pub socket: SocketId,
}

impl SocketKey {
    /// Address an input socket
    pub fn input(node: NodeId, socket: impl Into<SocketId>) -> Self {
        Self {
            node,
            direction: Direction::Input,
            socket: socket.into(),
        }
    }

    /// Address an output socket
    pub fn output(node: NodeId, socket: impl Into<SocketId>) -> Self {
        Self {
            node,
            direction: Direction::Output,
            socket: socket.into(),
        }
    }
}

impl fmt::Display for SocketKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arrow = match self.direction {
            Direction::Input => "in",
            Direction::Output => "out",
        };
        write!(f, "{}.{}:{}", self.node, arrow, self.socket)
    }
}

/// Data type tag carried by a socket
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataType(pub String);

impl DataType {
    /// Wildcard accepting every type
    pub const ANY: &'static str = "any";
    /// Wildcard accepting every type
    pub const OBJECT: &'static str = "object";

    /// Create a data type tag
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    /// Whether this tag matches every other type
    pub fn is_wildcard(&self) -> bool {
        self.0 == Self::ANY || self.0 == Self::OBJECT
    }

    /// Check if this type can connect to another type
    pub fn can_connect_to(&self, other: &DataType) -> bool {
        self.is_wildcard() || other.is_wildcard() || self == other
    }

    /// Get the colour for this type (for UI)
    pub fn color(&self) -> Color32 {
        match self.0.as_str() {
            "exec" | "flow" => Color32::from_rgb(200, 200, 200),
            "boolean" | "bool" => Color32::from_rgb(200, 80, 80),
            "number" | "float" => Color32::from_rgb(80, 200, 80),
            "integer" | "int" => Color32::from_rgb(80, 200, 200),
            "vector" => Color32::from_rgb(200, 200, 80),
            "color" => Color32::from_rgb(255, 200, 100),
            "string" => Color32::from_rgb(200, 180, 150),
            "any" | "object" => Color32::from_rgb(150, 150, 150),
            other => {
                // Stable per-name colour for custom types
                let hash = other
                    .bytes()
                    .fold(0x811c_9dc5_u32, |h, b| (h ^ u32::from(b)).wrapping_mul(0x0100_0193));
                let [r, g, b, _] = hash.to_le_bytes();
                Color32::from_rgb(100 + r % 128, 100 + g % 128, 100 + b % 128)
            }
        }
    }
}

impl Default for DataType {
    fn default() -> Self {
        Self::new(Self::ANY)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DataType {
    fn from(tag: &str) -> Self {
        Self::new(tag)
    }
}

/// Socket declaration inside a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocketDescriptor {
    /// Socket id
    pub id: SocketId,
    /// Data type tag
    #[serde(default)]
    pub data_type: DataType,
    /// Display label
    #[serde(default)]
    pub label: String,
    /// Connection limit; `None` uses the direction default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<usize>,
    /// Colour override as RGB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[u8; 3]>,
}

impl SocketDescriptor {
    /// Create a descriptor; the label defaults to the id
    pub fn new(id: impl Into<SocketId>, data_type: impl Into<DataType>) -> Self {
        let id = id.into();
        Self {
            label: id.0.clone(),
            id,
            data_type: data_type.into(),
            max_connections: None,
            color: None,
        }
    }

    /// Set the display label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Set the connection limit
    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = Some(max);
        self
    }

    /// Override the display colour
    pub fn with_color(mut self, rgb: [u8; 3]) -> Self {
        self.color = Some(rgb);
        self
    }
}

/// A socket on a node
#[derive(Debug, Clone)]
pub struct Socket {
    /// Socket id
    pub id: SocketId,
    /// Owning node
    pub node: NodeId,
    /// Socket direction
    pub direction: Direction,
    /// Data type
    pub data_type: DataType,
    /// Display label
    pub label: String,
    /// Maximum number of connections; `None` is unbounded
    pub max_connections: Option<usize>,
    color: Option<Color32>,
    connections: IndexSet<EdgeId>,
}

impl Socket {
    /// Instantiate a socket from its descriptor
    pub fn from_descriptor(node: NodeId, direction: Direction, desc: &SocketDescriptor) -> Self {
        let max_connections = match (desc.max_connections, direction) {
            (Some(max), _) => Some(max),
            (None, Direction::Input) => Some(1),
            (None, Direction::Output) => None,
        };
        Self {
            id: desc.id.clone(),
            node,
            direction,
            data_type: desc.data_type.clone(),
            label: desc.label.clone(),
            max_connections,
            color: desc.color.map(|[r, g, b]| Color32::from_rgb(r, g, b)),
            connections: IndexSet::new(),
        }
    }

    /// Address of this socket
    pub fn key(&self) -> SocketKey {
        SocketKey {
            node: self.node.clone(),
            direction: self.direction,
            socket: self.id.clone(),
        }
    }

    /// Resolved display colour
    pub fn color(&self) -> Color32 {
        self.color.unwrap_or_else(|| self.data_type.color())
    }

    /// Edges attached to this socket
    pub fn connections(&self) -> impl Iterator<Item = &EdgeId> {
        self.connections.iter()
    }

    /// Number of attached edges
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Whether another edge may be attached
    pub fn is_full(&self) -> bool {
        self.max_connections
            .is_some_and(|max| self.connections.len() >= max)
    }

    pub(crate) fn attach(&mut self, edge: EdgeId) {
        self.connections.insert(edge);
    }

    pub(crate) fn detach(&mut self, edge: &EdgeId) -> bool {
        self.connections.shift_remove(edge)
    }
}
