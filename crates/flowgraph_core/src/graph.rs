// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph data structure containing nodes and edges.
//!
//! Nodes and edges live in id-keyed maps owned by [`Graph`]. Sockets refer to
//! their edges by id, so every removal goes through this type and keeps the
//! edge map and both socket connection sets consistent.

use crate::edge::{Edge, EdgeId};
use crate::error::{ConnectionError, GraphError, Result};
use crate::node::{Node, NodeId};
use crate::socket::{Direction, Socket, SocketDescriptor, SocketKey};
use egui::Rect;
use indexmap::{IndexMap, IndexSet};

/// A node graph
#[derive(Debug, Clone, Default)]
pub struct Graph {
    nodes: IndexMap<NodeId, Node>,
    edges: IndexMap<EdgeId, Edge>,
}

impl Graph {
    /// Create a new empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node to the graph
    pub fn insert_node(&mut self, node: Node) -> Result<NodeId> {
        if self.nodes.contains_key(&node.id) {
            return Err(GraphError::DuplicateNode(node.id));
        }
        let id = node.id.clone();
        self.nodes.insert(id.clone(), node);
        Ok(id)
    }

    /// Remove a node and its edges.
    ///
    /// Returns the node together with the edges that were removed with it.
    pub fn remove_node(&mut self, node_id: &NodeId) -> Option<(Node, Vec<Edge>)> {
        if !self.nodes.contains_key(node_id) {
            return None;
        }
        let incident: Vec<EdgeId> = self
            .edges
            .values()
            .filter(|e| e.involves_node(node_id))
            .map(|e| e.id.clone())
            .collect();
        let removed = incident
            .iter()
            .filter_map(|id| self.disconnect(id))
            .collect();
        let node = self.nodes.shift_remove(node_id)?;
        Some((node, removed))
    }

    /// Get a node by ID
    pub fn node(&self, node_id: &NodeId) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub(crate) fn node_mut(&mut self, node_id: &NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(node_id)
    }

    /// Whether a node exists
    pub fn contains_node(&self, node_id: &NodeId) -> bool {
        self.nodes.contains_key(node_id)
    }

    /// Get all nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Get all node IDs
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.nodes.keys()
    }

    /// Get the number of nodes
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Resolve a socket
    pub fn socket(&self, key: &SocketKey) -> Option<&Socket> {
        self.nodes.get(&key.node)?.socket(key.direction, &key.socket)
    }

    /// Check whether an edge may link two sockets, in either order.
    ///
    /// The check is symmetric: swapping the arguments never changes whether it
    /// passes.
    pub fn check_connection(&self, a: &SocketKey, b: &SocketKey) -> std::result::Result<(), ConnectionError> {
        let sa = self
            .socket(a)
            .ok_or_else(|| ConnectionError::MissingSocket(a.clone()))?;
        let sb = self
            .socket(b)
            .ok_or_else(|| ConnectionError::MissingSocket(b.clone()))?;

        if a == b {
            return Err(ConnectionError::SameSocket);
        }
        if a.node == b.node {
            return Err(ConnectionError::SameNode(a.node.clone()));
        }
        if a.direction == b.direction {
            return Err(ConnectionError::SameDirection);
        }
        if !sa.data_type.can_connect_to(&sb.data_type) {
            return Err(ConnectionError::IncompatibleTypes {
                from: sa.data_type.to_string(),
                to: sb.data_type.to_string(),
            });
        }
        if sa.is_full() {
            return Err(ConnectionError::SocketFull(a.clone()));
        }
        if sb.is_full() {
            return Err(ConnectionError::SocketFull(b.clone()));
        }
        if self.edge_between(a, b).is_some() {
            return Err(ConnectionError::AlreadyConnected);
        }
        Ok(())
    }

    /// Whether an edge may link two sockets
    pub fn can_connect(&self, a: &SocketKey, b: &SocketKey) -> bool {
        self.check_connection(a, b).is_ok()
    }

    /// Add an edge between two sockets.
    ///
    /// The sockets may be given in either order; the output socket always
    /// becomes the edge source.
    pub fn connect(&mut self, a: &SocketKey, b: &SocketKey) -> std::result::Result<EdgeId, ConnectionError> {
        self.check_connection(a, b)?;
        let (from, to) = normalize(a, b);
        let edge = Edge::new(from.clone(), to.clone());
        let id = edge.id.clone();

        // check_connection resolved both sockets
        if let Some(socket) = self.socket_mut(&from) {
            socket.attach(id.clone());
        }
        if let Some(socket) = self.socket_mut(&to) {
            socket.attach(id.clone());
        }
        self.edges.insert(id.clone(), edge);
        Ok(id)
    }

    /// Remove an edge, detaching it from both sockets
    pub fn disconnect(&mut self, edge_id: &EdgeId) -> Option<Edge> {
        let edge = self.edges.shift_remove(edge_id)?;
        if let Some(socket) = self.socket_mut(&edge.from) {
            socket.detach(edge_id);
        }
        if let Some(socket) = self.socket_mut(&edge.to) {
            socket.detach(edge_id);
        }
        Some(edge)
    }

    fn socket_mut(&mut self, key: &SocketKey) -> Option<&mut Socket> {
        self.nodes
            .get_mut(&key.node)?
            .socket_mut(key.direction, &key.socket)
    }

    /// Add a socket to an existing node
    pub fn add_socket(
        &mut self,
        node_id: &NodeId,
        direction: Direction,
        desc: &SocketDescriptor,
    ) -> Result<SocketKey> {
        self.nodes
            .get_mut(node_id)
            .ok_or_else(|| GraphError::NodeNotFound(node_id.clone()))?
            .add_socket(direction, desc)
    }

    /// Remove a socket and every edge attached to it
    pub fn remove_socket(&mut self, key: &SocketKey) -> Option<(Socket, Vec<Edge>)> {
        let attached: Vec<EdgeId> = self.socket(key)?.connections().cloned().collect();
        let removed = attached.iter().filter_map(|id| self.disconnect(id)).collect();
        let socket = self
            .nodes
            .get_mut(&key.node)?
            .take_socket(key.direction, &key.socket)?;
        Some((socket, removed))
    }

    /// Get an edge by ID
    pub fn edge(&self, edge_id: &EdgeId) -> Option<&Edge> {
        self.edges.get(edge_id)
    }

    /// Get all edges
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.values()
    }

    /// Get the number of edges
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Get edges involving a node
    pub fn edges_for_node<'a>(&'a self, node_id: &'a NodeId) -> impl Iterator<Item = &'a Edge> {
        self.edges.values().filter(move |e| e.involves_node(node_id))
    }

    /// Get edges attached to a socket
    pub fn edges_for_socket<'a>(&'a self, key: &'a SocketKey) -> impl Iterator<Item = &'a Edge> {
        self.edges.values().filter(move |e| e.involves_socket(key))
    }

    /// The edge linking two sockets, in either order
    pub fn edge_between(&self, a: &SocketKey, b: &SocketKey) -> Option<&Edge> {
        if a.direction == b.direction {
            return None;
        }
        let (from, to) = normalize(a, b);
        self.edges.get(&EdgeId::derive(from, to))
    }

    /// Upstream nodes of every node: an edge A -> B makes B depend on A
    pub fn dependencies(&self) -> IndexMap<NodeId, IndexSet<NodeId>> {
        let mut deps: IndexMap<NodeId, IndexSet<NodeId>> = self
            .nodes
            .keys()
            .map(|id| (id.clone(), IndexSet::new()))
            .collect();
        for edge in self.edges.values() {
            if let Some(upstream) = deps.get_mut(&edge.to.node) {
                upstream.insert(edge.from.node.clone());
            }
        }
        deps
    }

    /// World-space bounds of all nodes
    pub fn bounds(&self) -> Option<Rect> {
        self.nodes
            .values()
            .map(Node::rect)
            .reduce(|acc, rect| acc.union(rect))
    }

    /// Remove everything
    pub fn clear(&mut self) {
        self.edges.clear();
        self.nodes.clear();
    }
}

/// Order a socket pair as (output, input)
pub(crate) fn normalize<'a>(a: &'a SocketKey, b: &'a SocketKey) -> (&'a SocketKey, &'a SocketKey) {
    if a.direction == Direction::Output {
        (a, b)
    } else {
        (b, a)
    }
}
