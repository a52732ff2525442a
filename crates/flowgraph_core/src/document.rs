// SPDX-License-Identifier: MIT OR Apache-2.0
//! Saved graph documents.
//!
//! A document is the exchange shape of a graph: nodes, edges and the viewport.
//! JSON is the interchange format; RON is offered for hand-edited files.

use crate::edge::Edge;
use crate::error::DocumentError;
use crate::graph::Graph;
use crate::node::{Node, NodeId};
use crate::socket::{SocketId, SocketKey};
use crate::viewport::ViewportState;
use serde::{Deserialize, Serialize};

/// Saved node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Node id; generated on load when empty
    #[serde(default)]
    pub id: String,
    /// Template name
    #[serde(rename = "type")]
    pub node_type: String,
    /// Display label
    #[serde(default)]
    pub label: String,
    /// World x
    #[serde(default)]
    pub x: f32,
    /// World y
    #[serde(default)]
    pub y: f32,
    /// Width
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f32>,
    /// Height
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f32>,
    /// Selected state
    #[serde(default)]
    pub selected: bool,
    /// Per-instance data
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.0.clone(),
            node_type: node.node_type.clone(),
            label: node.label.clone(),
            x: node.position.x,
            y: node.position.y,
            width: Some(node.size.x),
            height: Some(node.size.y),
            selected: node.selected,
            data: node.data.clone(),
        }
    }
}

/// Saved edge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRecord {
    /// Edge id
    #[serde(default)]
    pub id: String,
    /// Source node
    pub from_node_id: String,
    /// Source output socket
    pub from_socket_id: String,
    /// Target node
    pub to_node_id: String,
    /// Target input socket
    pub to_socket_id: String,
}

impl EdgeRecord {
    /// Output socket of the edge
    pub fn from_key(&self) -> SocketKey {
        SocketKey::output(NodeId::new(self.from_node_id.as_str()), SocketId::new(self.from_socket_id.as_str()))
    }

    /// Input socket of the edge
    pub fn to_key(&self) -> SocketKey {
        SocketKey::input(NodeId::new(self.to_node_id.as_str()), SocketId::new(self.to_socket_id.as_str()))
    }
}

impl From<&Edge> for EdgeRecord {
    fn from(edge: &Edge) -> Self {
        Self {
            id: edge.id.0.clone(),
            from_node_id: edge.from.node.0.clone(),
            from_socket_id: edge.from.socket.0.clone(),
            to_node_id: edge.to.node.0.clone(),
            to_socket_id: edge.to.socket.0.clone(),
        }
    }
}

/// Saved graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphDocument {
    /// Nodes in creation order
    #[serde(default)]
    pub nodes: Vec<NodeRecord>,
    /// Edges
    #[serde(default)]
    pub edges: Vec<EdgeRecord>,
    /// Viewport transform
    #[serde(default)]
    pub viewport: ViewportState,
}

impl GraphDocument {
    /// Capture a graph and viewport
    pub fn capture(graph: &Graph, viewport: ViewportState) -> Self {
        Self {
            nodes: graph.nodes().map(NodeRecord::from).collect(),
            edges: graph.edges().map(EdgeRecord::from).collect(),
            viewport,
        }
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> Result<String, DocumentError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse from JSON
    pub fn from_json(source: &str) -> Result<Self, DocumentError> {
        Ok(serde_json::from_str(source)?)
    }

    /// Serialize to RON
    pub fn to_ron(&self) -> Result<String, DocumentError> {
        Ok(ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())?)
    }

    /// Parse from RON
    pub fn from_ron(source: &str) -> Result<Self, DocumentError> {
        Ok(ron::from_str(source)?)
    }
}
