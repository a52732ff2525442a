// SPDX-License-Identifier: MIT OR Apache-2.0
//! Edge definitions for the graph.

use crate::node::NodeId;
use crate::socket::{Direction, SocketKey};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an edge, derived from its endpoints
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(pub String);

impl EdgeId {
    /// Derive the id of the edge linking `from` to `to`
    pub fn derive(from: &SocketKey, to: &SocketKey) -> Self {
        Self(format!(
            "{}:{}->{}:{}",
            from.node, from.socket, to.node, to.socket
        ))
    }

    /// Borrow the id as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A directed edge from an output socket to an input socket
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    /// Edge id
    pub id: EdgeId,
    /// Output socket
    pub from: SocketKey,
    /// Input socket
    pub to: SocketKey,
}

impl Edge {
    /// Create a new edge; the caller guarantees `from` is an output and `to` an input
    pub(crate) fn new(from: SocketKey, to: SocketKey) -> Self {
        debug_assert_eq!(from.direction, Direction::Output);
        debug_assert_eq!(to.direction, Direction::Input);
        Self {
            id: EdgeId::derive(&from, &to),
            from,
            to,
        }
    }

    /// Check if this edge involves a specific node
    pub fn involves_node(&self, node_id: &NodeId) -> bool {
        self.from.node == *node_id || self.to.node == *node_id
    }

    /// Check if this edge involves a specific socket
    pub fn involves_socket(&self, socket: &SocketKey) -> bool {
        self.from == *socket || self.to == *socket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_deterministic() {
        let from = SocketKey::output(NodeId::new("a"), "out");
        let to = SocketKey::input(NodeId::new("b"), "in");
        let edge = Edge::new(from.clone(), to.clone());
        assert_eq!(edge.id, Edge::new(from.clone(), to.clone()).id);
        assert_eq!(edge.id.as_str(), "a:out->b:in");
        assert!(edge.involves_socket(&to) && edge.involves_socket(&from));
        assert!(edge.involves_node(&NodeId::new("b")));
    }
}
