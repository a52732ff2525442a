// SPDX-License-Identifier: MIT OR Apache-2.0
//! Node selection and the copy/paste clipboard.

use crate::document::EdgeRecord;
use crate::events::{EventBus, GraphEvent};
use crate::graph::Graph;
use crate::node::NodeId;
use crate::presenter::{Presenter, VisualUpdate};
use egui::Rect;
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Set of selected nodes.
///
/// Every change updates the nodes' `selected` flags, asks the presenter to
/// re-render them and emits an event carrying the full selection.
#[derive(Debug, Clone, Default)]
pub struct SelectionManager {
    selected: IndexSet<NodeId>,
}

impl SelectionManager {
    /// Create an empty selection
    pub fn new() -> Self {
        Self::default()
    }

    /// Selected node ids in selection order
    pub fn ids(&self) -> impl Iterator<Item = &NodeId> {
        self.selected.iter()
    }

    /// Selected ids as a vector
    pub fn to_vec(&self) -> Vec<NodeId> {
        self.selected.iter().cloned().collect()
    }

    /// Whether a node is selected
    pub fn contains(&self, node: &NodeId) -> bool {
        self.selected.contains(node)
    }

    /// Number of selected nodes
    pub fn len(&self) -> usize {
        self.selected.len()
    }

    /// Whether nothing is selected
    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }

    fn mark(graph: &mut Graph, presenter: &mut impl Presenter, node: &NodeId, selected: bool) {
        if let Some(n) = graph.node_mut(node) {
            n.selected = selected;
            presenter.apply(VisualUpdate::NodeSelected {
                node: node.clone(),
                selected,
            });
        }
    }

    /// Select a node, replacing the selection unless `additive`
    pub fn select_node(
        &mut self,
        graph: &mut Graph,
        events: &mut EventBus,
        presenter: &mut impl Presenter,
        node: &NodeId,
        additive: bool,
    ) -> bool {
        if !graph.contains_node(node) {
            return false;
        }
        if !additive {
            for other in std::mem::take(&mut self.selected) {
                if other != *node {
                    Self::mark(graph, presenter, &other, false);
                }
            }
        }
        self.selected.insert(node.clone());
        Self::mark(graph, presenter, node, true);
        events.emit(&GraphEvent::NodeSelected {
            node: node.clone(),
            selection: self.to_vec(),
        });
        true
    }

    /// Remove a node from the selection
    pub fn deselect_node(
        &mut self,
        graph: &mut Graph,
        events: &mut EventBus,
        presenter: &mut impl Presenter,
        node: &NodeId,
    ) -> bool {
        if !self.selected.shift_remove(node) {
            return false;
        }
        Self::mark(graph, presenter, node, false);
        events.emit(&GraphEvent::NodeDeselected {
            node: node.clone(),
            selection: self.to_vec(),
        });
        true
    }

    /// Toggle a node's membership
    pub fn toggle_node(
        &mut self,
        graph: &mut Graph,
        events: &mut EventBus,
        presenter: &mut impl Presenter,
        node: &NodeId,
    ) {
        if self.contains(node) {
            self.deselect_node(graph, events, presenter, node);
        } else {
            self.select_node(graph, events, presenter, node, true);
        }
    }

    /// Empty the selection
    pub fn clear(&mut self, graph: &mut Graph, events: &mut EventBus, presenter: &mut impl Presenter) {
        if self.selected.is_empty() {
            return;
        }
        let previous = self.to_vec();
        for node in std::mem::take(&mut self.selected) {
            Self::mark(graph, presenter, &node, false);
        }
        events.emit(&GraphEvent::SelectionCleared { previous });
    }

    /// Select every node
    pub fn select_all(&mut self, graph: &mut Graph, events: &mut EventBus, presenter: &mut impl Presenter) {
        let all: Vec<NodeId> = graph.node_ids().cloned().collect();
        for node in &all {
            if !self.contains(node) {
                self.select_node(graph, events, presenter, node, true);
            }
        }
    }

    /// Select nodes whose bounds intersect a world-space rectangle
    pub fn select_in_rect(
        &mut self,
        graph: &mut Graph,
        events: &mut EventBus,
        presenter: &mut impl Presenter,
        rect: Rect,
        additive: bool,
    ) -> usize {
        if !additive {
            self.clear(graph, events, presenter);
        }
        let hits: Vec<NodeId> = graph
            .nodes()
            .filter(|n| n.rect().intersects(rect))
            .map(|n| n.id.clone())
            .collect();
        for node in &hits {
            if !self.contains(node) {
                self.select_node(graph, events, presenter, node, true);
            }
        }
        hits.len()
    }

    /// Drop a node that no longer exists without emitting events
    pub(crate) fn forget(&mut self, node: &NodeId) {
        self.selected.shift_remove(node);
    }

    /// Re-sync with the nodes' `selected` flags (after loading a document)
    pub(crate) fn sync_from(&mut self, graph: &Graph) {
        self.selected = graph
            .nodes()
            .filter(|n| n.selected)
            .map(|n| n.id.clone())
            .collect();
    }
}

/// Copied node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipboardNode {
    /// Id at copy time
    pub id: String,
    /// Template name
    #[serde(rename = "type")]
    pub node_type: String,
    /// Display label
    pub label: String,
    /// World x
    pub x: f32,
    /// World y
    pub y: f32,
    /// Per-instance data
    #[serde(default)]
    pub data: serde_json::Map<String, serde_json::Value>,
}

/// Structural snapshot of a selection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClipboardData {
    /// Copied nodes
    pub nodes: Vec<ClipboardNode>,
    /// Edges whose both ends are copied nodes
    pub edges: Vec<EdgeRecord>,
}

impl ClipboardData {
    /// Capture the selected nodes and the edges between them
    pub fn capture(graph: &Graph, selection: &SelectionManager) -> Self {
        let nodes = selection
            .ids()
            .filter_map(|id| graph.node(id))
            .map(|node| ClipboardNode {
                id: node.id.0.clone(),
                node_type: node.node_type.clone(),
                label: node.label.clone(),
                x: node.position.x,
                y: node.position.y,
                data: node.data.clone(),
            })
            .collect();
        let edges = graph
            .edges()
            .filter(|e| selection.contains(&e.from.node) && selection.contains(&e.to.node))
            .map(EdgeRecord::from)
            .collect();
        Self { nodes, edges }
    }

    /// Whether there is nothing to paste
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
