// SPDX-License-Identifier: MIT OR Apache-2.0
//! Domain events emitted by the graph controller.

use crate::edge::EdgeId;
use crate::error::ConnectionError;
use crate::node::NodeId;
use crate::socket::SocketKey;
use crate::viewport::ViewportState;
use egui::Pos2;

/// Action offered by a socket's long-press menu
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketAction {
    /// Remove one edge
    DeleteConnection(EdgeId),
    /// Remove every edge on the socket
    DeleteAllConnections,
}

/// What changed the viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportCause {
    /// Pan gesture or API call
    Pan,
    /// Wheel, pinch or zoom call
    Zoom,
    /// Fit or explicit set
    Reset,
}

/// Event category, for filtered subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Nodes and edges added or removed
    Structure,
    /// Selection changes
    Selection,
    /// Node moves, connection feedback, menus
    Interaction,
    /// Pan and zoom
    Viewport,
    /// Execution lifecycle
    Execution,
}

/// A domain event
#[derive(Debug, Clone, PartialEq)]
pub enum GraphEvent {
    /// Node added
    NodeCreated {
        /// Node id
        node: NodeId,
        /// Template name
        node_type: String,
        /// World position
        position: Pos2,
    },
    /// Node removed (its edges were removed first)
    NodeRemoved {
        /// Node id
        node: NodeId,
        /// Template name
        node_type: String,
    },
    /// Edge added
    EdgeCreated {
        /// Edge id
        edge: EdgeId,
        /// Output socket
        from: SocketKey,
        /// Input socket
        to: SocketKey,
    },
    /// Edge removed
    EdgeRemoved {
        /// Edge id
        edge: EdgeId,
        /// Output socket
        from: SocketKey,
        /// Input socket
        to: SocketKey,
    },
    /// An interactive connection attempt was refused
    ConnectionFailed {
        /// Socket the drag started from
        from: SocketKey,
        /// Socket it was dropped on
        to: SocketKey,
        /// Why it was refused
        reason: ConnectionError,
    },
    /// Node added to the selection
    NodeSelected {
        /// Node id
        node: NodeId,
        /// Full selection afterwards
        selection: Vec<NodeId>,
    },
    /// Node removed from the selection
    NodeDeselected {
        /// Node id
        node: NodeId,
        /// Full selection afterwards
        selection: Vec<NodeId>,
    },
    /// Selection emptied
    SelectionCleared {
        /// Nodes that were selected
        previous: Vec<NodeId>,
    },
    /// Node moved by a drag or an API call
    NodeMoved {
        /// Node id
        node: NodeId,
        /// Position before
        from: Pos2,
        /// Position after
        to: Pos2,
    },
    /// Long press on a connected socket
    SocketMenuRequested {
        /// Socket pressed
        socket: SocketKey,
        /// Screen position of the press
        position: Pos2,
        /// Offered actions
        actions: Vec<SocketAction>,
    },
    /// Viewport transform changed
    ViewportChanged {
        /// Transform before
        previous: ViewportState,
        /// Transform after
        current: ViewportState,
        /// What changed it
        cause: ViewportCause,
    },
    /// Execution run started
    ExecutionStarted {
        /// Nodes in the execution order
        total: usize,
    },
    /// A node's hook completed
    NodeExecuted {
        /// Node id
        node: NodeId,
        /// Position in the order
        index: usize,
    },
    /// A node was gated off by branch activation
    NodeSkipped {
        /// Node id
        node: NodeId,
    },
    /// Execution run finished, successfully or not
    ExecutionCompleted {
        /// Hooks that completed
        executed: usize,
        /// Nodes in the execution order
        total: usize,
        /// Failure message
        error: Option<String>,
    },
    /// A dependency was dropped to break a cycle
    CycleDetected {
        /// Node whose dependency was dropped
        node: NodeId,
        /// Upstream node that closed the cycle
        upstream: NodeId,
    },
    /// Every node and edge was removed
    GraphCleared,
    /// A document was loaded
    GraphLoaded {
        /// Nodes created
        nodes: usize,
        /// Edges created
        edges: usize,
    },
}

impl GraphEvent {
    /// Category of this event
    pub fn kind(&self) -> EventKind {
        match self {
            Self::NodeCreated { .. }
            | Self::NodeRemoved { .. }
            | Self::EdgeCreated { .. }
            | Self::EdgeRemoved { .. }
            | Self::GraphCleared
            | Self::GraphLoaded { .. } => EventKind::Structure,
            Self::NodeSelected { .. } | Self::NodeDeselected { .. } | Self::SelectionCleared { .. } => {
                EventKind::Selection
            }
            Self::ConnectionFailed { .. } | Self::NodeMoved { .. } | Self::SocketMenuRequested { .. } => {
                EventKind::Interaction
            }
            Self::ViewportChanged { .. } => EventKind::Viewport,
            Self::ExecutionStarted { .. }
            | Self::NodeExecuted { .. }
            | Self::NodeSkipped { .. }
            | Self::ExecutionCompleted { .. }
            | Self::CycleDetected { .. } => EventKind::Execution,
        }
    }
}

/// Handle returned by [`EventBus::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

struct Listener {
    id: ListenerId,
    filter: Option<EventKind>,
    callback: Box<dyn FnMut(&GraphEvent)>,
}

/// Fan-out of events to registered listeners
#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Listener>,
    next_id: u64,
}

impl EventBus {
    /// Create a bus with no listeners
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event
    pub fn subscribe(&mut self, callback: impl FnMut(&GraphEvent) + 'static) -> ListenerId {
        self.add(None, Box::new(callback))
    }

    /// Receive events of one kind
    pub fn subscribe_kind(
        &mut self,
        kind: EventKind,
        callback: impl FnMut(&GraphEvent) + 'static,
    ) -> ListenerId {
        self.add(Some(kind), Box::new(callback))
    }

    fn add(&mut self, filter: Option<EventKind>, callback: Box<dyn FnMut(&GraphEvent)>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push(Listener { id, filter, callback });
        id
    }

    /// Remove a listener; returns whether it existed
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != id);
        self.listeners.len() != before
    }

    /// Deliver an event to matching listeners in subscription order
    pub fn emit(&mut self, event: &GraphEvent) {
        let kind = event.kind();
        for listener in &mut self.listeners {
            if listener.filter.map_or(true, |filter| filter == kind) {
                (listener.callback)(event);
            }
        }
    }

    /// Number of listeners
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
