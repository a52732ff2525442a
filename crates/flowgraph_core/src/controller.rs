// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph controller: the public entry point of the engine.
//!
//! The controller owns every component and routes input to exactly one of
//! them per pointer sequence: the connection engine when a socket was hit, the
//! drag controller when a node was hit, and the viewport gestures otherwise.
//! Mutations made through it keep the spatial grid, selection and events in
//! step with the graph.

use crate::connect::{ConnectOutcome, ConnectionEngine};
use crate::config::GraphConfig;
use crate::document::{GraphDocument, NodeRecord};
use crate::drag::DragController;
use crate::edge::{Edge, EdgeId};
use crate::error::{ConnectionError, DocumentError, ExecutionError, GraphError, Result};
use crate::events::{EventBus, GraphEvent, ListenerId, SocketAction, ViewportCause};
use crate::execution::{self, ExecutionPlan, ExecutionReport, ExecutionScheduler};
use crate::graph::Graph;
use crate::input::{KeyCommand, PointerEvent, PointerKind, WheelEvent};
use crate::node::{Node, NodeId};
use crate::presenter::{NullPresenter, Presenter, VisualUpdate};
use crate::selection::{ClipboardData, SelectionManager};
use crate::socket::{Direction, Socket, SocketDescriptor, SocketKey};
use crate::spatial::SpatialGrid;
use crate::template::{Template, TemplateRegistry};
use crate::viewport::{GestureOutcome, Viewport, ViewportGestures, ViewportState};
use egui::{Pos2, Rect, Vec2};
use std::collections::HashMap;
use std::time::Duration;

/// What lies under a screen position
#[derive(Debug, Clone, PartialEq)]
pub enum Hit {
    /// A socket within the hit radius
    Socket(SocketKey),
    /// The topmost node containing the point
    Node(NodeId),
    /// Empty canvas
    Canvas,
}

/// Orchestrates the graph, its interaction engines and the rendering layer
pub struct GraphController<P: Presenter = NullPresenter> {
    config: GraphConfig,
    registry: TemplateRegistry,
    graph: Graph,
    grid: SpatialGrid<SocketKey>,
    viewport: Viewport,
    gestures: ViewportGestures,
    connection: ConnectionEngine,
    selection: SelectionManager,
    drag: DragController,
    scheduler: ExecutionScheduler,
    events: EventBus,
    presenter: P,
    clipboard: Option<ClipboardData>,
}

impl GraphController<NullPresenter> {
    /// Create a headless controller
    pub fn new(config: GraphConfig) -> Self {
        Self::with_presenter(config, NullPresenter)
    }
}

impl Default for GraphController<NullPresenter> {
    fn default() -> Self {
        Self::new(GraphConfig::default())
    }
}

impl<P: Presenter> GraphController<P> {
    /// Create a controller attached to a rendering layer
    pub fn with_presenter(config: GraphConfig, presenter: P) -> Self {
        let mut viewport = Viewport::new(config.min_scale, config.max_scale);
        viewport.set_canvas_size(Vec2::from(config.canvas_size));
        Self {
            grid: SpatialGrid::new(config.grid_cell_size),
            viewport,
            gestures: ViewportGestures::new(config.double_tap(), config.double_tap_distance),
            connection: ConnectionEngine::new(config.socket_hit_radius, config.long_press()),
            selection: SelectionManager::new(),
            drag: DragController::new(config.snap_to_grid, config.snap_size),
            scheduler: ExecutionScheduler::new(),
            events: EventBus::new(),
            registry: TemplateRegistry::new(),
            graph: Graph::new(),
            clipboard: None,
            presenter,
            config,
        }
    }

    // ---- accessors ----

    /// Active configuration
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    /// The graph
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Registered templates
    pub fn registry(&self) -> &TemplateRegistry {
        &self.registry
    }

    /// Viewport transform
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    /// Current selection
    pub fn selection(&self) -> &SelectionManager {
        &self.selection
    }

    /// Connection engine state
    pub fn connection(&self) -> &ConnectionEngine {
        &self.connection
    }

    /// Socket hit-test index
    pub fn grid(&self) -> &SpatialGrid<SocketKey> {
        &self.grid
    }

    /// Attached rendering layer
    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    /// Attached rendering layer, mutably
    pub fn presenter_mut(&mut self) -> &mut P {
        &mut self.presenter
    }

    /// Last copied selection
    pub fn clipboard(&self) -> Option<&ClipboardData> {
        self.clipboard.as_ref()
    }

    /// Event bus, for filtered subscriptions
    pub fn events_mut(&mut self) -> &mut EventBus {
        &mut self.events
    }

    /// Receive every event
    pub fn subscribe(&mut self, callback: impl FnMut(&GraphEvent) + 'static) -> ListenerId {
        self.events.subscribe(callback)
    }

    /// Stop receiving events
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Whether editing is disabled
    pub fn is_read_only(&self) -> bool {
        self.config.read_only
    }

    /// Enable or disable editing; gestures in flight are cancelled
    pub fn set_read_only(&mut self, read_only: bool) {
        if read_only {
            self.cancel_interaction();
        }
        self.config.read_only = read_only;
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.config.read_only {
            Err(GraphError::ReadOnly)
        } else {
            Ok(())
        }
    }

    // ---- templates and structure ----

    /// Register a node template; existing nodes are unaffected
    pub fn register_template(&mut self, template: Template) {
        self.registry.register(template);
    }

    /// Create a node of a registered type
    pub fn add_node(&mut self, node_type: &str, position: Pos2) -> Result<NodeId> {
        self.add_node_with(None, node_type, position, serde_json::Map::new())
    }

    /// Create a node with an explicit id and data bag
    pub fn add_node_with(
        &mut self,
        id: Option<NodeId>,
        node_type: &str,
        position: Pos2,
        data: serde_json::Map<String, serde_json::Value>,
    ) -> Result<NodeId> {
        self.ensure_writable()?;
        let template = self
            .registry
            .get(node_type)
            .ok_or_else(|| GraphError::UnknownNodeType(node_type.to_string()))?
            .clone();
        let mut node = Node::from_template(id.unwrap_or_else(NodeId::generate), &template).with_position(position);
        node.data = data;
        let id = self.insert_node(node)?;
        self.events.emit(&GraphEvent::NodeCreated {
            node: id.clone(),
            node_type: node_type.to_string(),
            position,
        });
        Ok(id)
    }

    fn insert_node(&mut self, node: Node) -> Result<NodeId> {
        let id = self.graph.insert_node(node)?;
        self.index_node(&id);
        tracing::debug!("Added node {id}");
        Ok(id)
    }

    /// Remove a node; its edges are removed first
    pub fn remove_node(&mut self, id: &NodeId) -> Result<()> {
        self.ensure_writable()?;
        let (node, edges) = self
            .graph
            .remove_node(id)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        for edge in &edges {
            self.edge_removed(edge);
        }
        for socket in node.sockets() {
            self.grid.remove(&socket.key());
        }
        self.selection.forget(id);
        tracing::debug!("Removed node {id}");
        self.events.emit(&GraphEvent::NodeRemoved {
            node: node.id,
            node_type: node.node_type,
        });
        Ok(())
    }

    /// Add a socket to an existing node
    pub fn add_socket(&mut self, node: &NodeId, direction: Direction, desc: &SocketDescriptor) -> Result<SocketKey> {
        self.ensure_writable()?;
        let key = self.graph.add_socket(node, direction, desc)?;
        self.index_node(node);
        Ok(key)
    }

    /// Remove a socket and its edges
    pub fn remove_socket(&mut self, key: &SocketKey) -> Result<()> {
        self.ensure_writable()?;
        let (_, edges) = self
            .graph
            .remove_socket(key)
            .ok_or_else(|| GraphError::Connection(ConnectionError::MissingSocket(key.clone())))?;
        for edge in &edges {
            self.edge_removed(edge);
        }
        self.grid.remove(key);
        // Later sockets on the node shift up
        self.index_node(&key.node);
        Ok(())
    }

    /// Validate a prospective edge without creating it
    pub fn can_connect(&self, a: &SocketKey, b: &SocketKey) -> std::result::Result<(), ConnectionError> {
        self.graph.check_connection(a, b)
    }

    /// Whether an edge may link two sockets
    pub fn is_connectable(&self, a: &SocketKey, b: &SocketKey) -> bool {
        self.graph.can_connect(a, b)
    }

    /// Create an edge between two sockets, in either order
    pub fn create_edge(&mut self, a: &SocketKey, b: &SocketKey) -> Result<EdgeId> {
        self.ensure_writable()?;
        let id = self.graph.connect(a, b)?;
        self.edge_created(&id);
        Ok(id)
    }

    fn edge_created(&mut self, id: &EdgeId) {
        let Some(edge) = self.graph.edge(id) else {
            return;
        };
        tracing::debug!("Connected {} -> {}", edge.from, edge.to);
        let event = GraphEvent::EdgeCreated {
            edge: id.clone(),
            from: edge.from.clone(),
            to: edge.to.clone(),
        };
        self.presenter.apply(VisualUpdate::EdgeChanged(id.clone()));
        self.events.emit(&event);
    }

    fn edge_removed(&mut self, edge: &Edge) {
        self.presenter.apply(VisualUpdate::EdgeChanged(edge.id.clone()));
        self.events.emit(&GraphEvent::EdgeRemoved {
            edge: edge.id.clone(),
            from: edge.from.clone(),
            to: edge.to.clone(),
        });
    }

    /// Remove an edge; returns whether it existed
    pub fn remove_edge(&mut self, id: &EdgeId) -> Result<bool> {
        self.ensure_writable()?;
        match self.graph.disconnect(id) {
            Some(edge) => {
                self.edge_removed(&edge);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Remove every edge on a socket; returns how many were removed
    pub fn disconnect_socket(&mut self, key: &SocketKey) -> Result<usize> {
        self.ensure_writable()?;
        let ids: Vec<EdgeId> = self
            .graph
            .socket(key)
            .map(|s| s.connections().cloned().collect())
            .unwrap_or_default();
        let mut removed = 0;
        for id in &ids {
            if let Some(edge) = self.graph.disconnect(id) {
                self.edge_removed(&edge);
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Carry out an action offered by a socket menu
    pub fn apply_socket_action(&mut self, socket: &SocketKey, action: &SocketAction) -> Result<usize> {
        match action {
            SocketAction::DeleteConnection(edge) => Ok(usize::from(self.remove_edge(edge)?)),
            SocketAction::DeleteAllConnections => self.disconnect_socket(socket),
        }
    }

    /// Move a node to a world position
    pub fn move_node(&mut self, id: &NodeId, position: Pos2) -> Result<()> {
        self.ensure_writable()?;
        let from = self
            .graph
            .node(id)
            .map(|n| n.position)
            .ok_or_else(|| GraphError::NodeNotFound(id.clone()))?;
        self.place_node(id, position);
        if from != position {
            self.events.emit(&GraphEvent::NodeMoved {
                node: id.clone(),
                from,
                to: position,
            });
        }
        Ok(())
    }

    /// Set a node's position, shifting its indexed sockets by the same delta
    fn place_node(&mut self, id: &NodeId, position: Pos2) {
        let Some(node) = self.graph.node_mut(id) else {
            return;
        };
        let delta = position - node.position;
        node.position = position;
        let keys: Vec<SocketKey> = node.sockets().map(Socket::key).collect();
        for key in keys {
            match self.grid.position(&key) {
                Some(p) => self.grid.update(&key, p + delta),
                None => {
                    if let Some(p) = self.socket_world_position(&key) {
                        self.grid.insert(key, p);
                    }
                }
            }
        }
        self.presenter.apply(VisualUpdate::NodeMoved(id.clone()));
    }

    /// World position of a socket: measured by the presenter, else the node layout
    pub fn socket_world_position(&self, key: &SocketKey) -> Option<Pos2> {
        socket_world(&self.graph, &self.viewport, &self.presenter, key)
    }

    fn index_node(&mut self, id: &NodeId) {
        let Some(node) = self.graph.node(id) else {
            return;
        };
        let keys: Vec<SocketKey> = node.sockets().map(Socket::key).collect();
        for key in keys {
            if let Some(p) = self.socket_world_position(&key) {
                self.grid.update(&key, p);
            }
        }
    }

    /// Re-read every socket position, e.g. after the presenter re-measured
    pub fn refresh_geometry(&mut self) {
        let Self {
            grid,
            graph,
            viewport,
            presenter,
            ..
        } = self;
        let (graph, viewport, presenter) = (&*graph, &*viewport, &*presenter);
        grid.rebuild(|key| socket_world(graph, viewport, presenter, key));
        // Sockets never indexed yet
        let missing: Vec<SocketKey> = graph
            .nodes()
            .flat_map(Node::sockets)
            .map(Socket::key)
            .filter(|k| !grid.contains(k))
            .collect();
        for key in missing {
            if let Some(p) = socket_world(graph, viewport, presenter, &key) {
                grid.insert(key, p);
            }
        }
    }

    /// Remove every node and edge
    pub fn clear(&mut self) -> Result<()> {
        self.ensure_writable()?;
        self.reset();
        tracing::info!("Graph cleared");
        self.events.emit(&GraphEvent::GraphCleared);
        Ok(())
    }

    fn reset(&mut self) {
        self.cancel_interaction();
        self.graph.clear();
        self.grid.clear();
        self.selection = SelectionManager::new();
    }

    // ---- selection and clipboard ----

    /// Select a node, replacing the selection unless `additive`
    pub fn select_node(&mut self, id: &NodeId, additive: bool) -> bool {
        self.selection
            .select_node(&mut self.graph, &mut self.events, &mut self.presenter, id, additive)
    }

    /// Remove a node from the selection
    pub fn deselect_node(&mut self, id: &NodeId) -> bool {
        self.selection
            .deselect_node(&mut self.graph, &mut self.events, &mut self.presenter, id)
    }

    /// Empty the selection
    pub fn clear_selection(&mut self) {
        self.selection
            .clear(&mut self.graph, &mut self.events, &mut self.presenter);
    }

    /// Select every node
    pub fn select_all(&mut self) {
        self.selection
            .select_all(&mut self.graph, &mut self.events, &mut self.presenter);
    }

    /// Select nodes intersecting a world-space rectangle
    pub fn select_in_rect(&mut self, rect: Rect, additive: bool) -> usize {
        self.selection
            .select_in_rect(&mut self.graph, &mut self.events, &mut self.presenter, rect, additive)
    }

    /// Selected node ids
    pub fn selected_nodes(&self) -> Vec<NodeId> {
        self.selection.to_vec()
    }

    /// Delete the selected nodes; edges go first
    pub fn delete_selected_nodes(&mut self) -> Result<usize> {
        self.ensure_writable()?;
        let ids = self.selection.to_vec();
        for id in &ids {
            self.remove_node(id)?;
        }
        Ok(ids.len())
    }

    /// Copy the selection into the internal clipboard
    pub fn copy(&mut self) -> Option<&ClipboardData> {
        if self.selection.is_empty() {
            return None;
        }
        let data = ClipboardData::capture(&self.graph, &self.selection);
        tracing::debug!("Copied {} node(s), {} edge(s)", data.nodes.len(), data.edges.len());
        self.clipboard = Some(data);
        self.clipboard.as_ref()
    }

    /// Paste the internal clipboard
    pub fn paste(&mut self) -> Result<Vec<NodeId>> {
        match self.clipboard.clone() {
            Some(data) => self.paste_data(&data),
            None => Ok(Vec::new()),
        }
    }

    /// Paste a clipboard payload: fresh ids, offset positions, edges re-validated.
    ///
    /// The pasted nodes become the selection.
    pub fn paste_data(&mut self, data: &ClipboardData) -> Result<Vec<NodeId>> {
        self.ensure_writable()?;
        if let Some(missing) = data.nodes.iter().find(|n| !self.registry.contains(&n.node_type)) {
            return Err(GraphError::UnknownNodeType(missing.node_type.clone()));
        }

        let offset = Vec2::from(self.config.paste_offset);
        let mut remap = HashMap::new();
        let mut created = Vec::with_capacity(data.nodes.len());
        for copied in &data.nodes {
            let position = Pos2::new(copied.x, copied.y) + offset;
            let id = self.add_node_with(None, &copied.node_type, position, copied.data.clone())?;
            if let Some(node) = self.graph.node_mut(&id) {
                node.label = copied.label.clone();
            }
            remap.insert(copied.id.as_str(), id.clone());
            created.push(id);
        }

        for record in &data.edges {
            let (Some(from), Some(to)) = (
                remap.get(record.from_node_id.as_str()),
                remap.get(record.to_node_id.as_str()),
            ) else {
                continue;
            };
            let from = SocketKey::output(from.clone(), record.from_socket_id.as_str());
            let to = SocketKey::input(to.clone(), record.to_socket_id.as_str());
            match self.graph.connect(&from, &to) {
                Ok(id) => self.edge_created(&id),
                Err(err) => tracing::debug!("Skipping pasted edge {from} -> {to}: {err}"),
            }
        }

        self.clear_selection();
        for id in &created {
            self.select_node(id, true);
        }
        Ok(created)
    }

    // ---- viewport ----

    fn viewport_changed(&mut self, previous: ViewportState, cause: ViewportCause) {
        let current = self.viewport.state();
        if current == previous {
            return;
        }
        self.presenter.apply(VisualUpdate::ViewportChanged);
        self.events.emit(&GraphEvent::ViewportChanged {
            previous,
            current,
            cause,
        });
    }

    /// Replace the viewport transform
    pub fn set_viewport(&mut self, state: ViewportState) {
        let previous = self.viewport.state();
        self.viewport.set(state);
        self.viewport_changed(previous, ViewportCause::Reset);
    }

    /// Pan by a screen-space delta
    pub fn pan_by(&mut self, delta: Vec2) {
        let previous = self.viewport.state();
        self.viewport.pan_by(delta);
        self.viewport_changed(previous, ViewportCause::Pan);
    }

    /// Zoom by `factor` keeping a screen point fixed
    pub fn zoom_at(&mut self, anchor: Pos2, factor: f32) {
        let previous = self.viewport.state();
        self.viewport.zoom_at(anchor, factor);
        self.viewport_changed(previous, ViewportCause::Zoom);
    }

    /// Frame every node in the canvas
    pub fn fit_to_content(&mut self) {
        let Some(bounds) = self.graph.bounds() else {
            return;
        };
        let previous = self.viewport.state();
        self.viewport.fit_to(bounds, self.config.fit_padding);
        self.viewport_changed(previous, ViewportCause::Reset);
    }

    /// Toggle between 2x zoom at `anchor` and fitting the content
    pub fn toggle_zoom(&mut self, anchor: Pos2) {
        let previous = self.viewport.state();
        self.viewport
            .toggle_zoom(anchor, self.graph.bounds(), self.config.fit_padding);
        self.viewport_changed(previous, ViewportCause::Zoom);
    }

    /// Resize the canvas
    pub fn set_canvas_size(&mut self, size: Vec2) {
        self.viewport.set_canvas_size(size);
    }

    /// Nodes overlapping the visible canvas, for culling
    pub fn visible_nodes(&self) -> Vec<NodeId> {
        let view = self.viewport.visible_world_rect();
        self.graph
            .nodes()
            .filter(|n| view.intersects(n.rect()))
            .map(|n| n.id.clone())
            .collect()
    }

    // ---- execution ----

    /// Order the next run would use, with any dependencies dropped for cycles
    pub fn execution_order(&self) -> ExecutionPlan {
        execution::plan(&self.graph, &self.registry)
    }

    /// Run every hooked node once in dependency order
    pub async fn execute(&mut self) -> std::result::Result<ExecutionReport, ExecutionError> {
        self.scheduler
            .run(&self.graph, &self.registry, &mut self.events, &mut self.presenter)
            .await
    }

    // ---- persistence ----

    /// Capture the graph and viewport
    pub fn serialize(&self) -> GraphDocument {
        GraphDocument::capture(&self.graph, self.viewport.state())
    }

    /// Capture as pretty JSON
    pub fn to_json(&self) -> std::result::Result<String, DocumentError> {
        self.serialize().to_json()
    }

    /// Replace the graph with a document.
    ///
    /// Nodes of unregistered types are skipped with a warning; edges whose
    /// endpoints are missing or invalid are skipped.
    pub fn deserialize(&mut self, doc: &GraphDocument) {
        self.reset();

        for record in &doc.nodes {
            if let Err(err) = self.load_node(record) {
                tracing::warn!("Skipping node {:?}: {err}", record.id);
            }
        }
        self.viewport.set(doc.viewport);
        self.presenter.apply(VisualUpdate::ViewportChanged);

        let mut edges = 0;
        for record in &doc.edges {
            match self.graph.connect(&record.from_key(), &record.to_key()) {
                Ok(id) => {
                    self.presenter.apply(VisualUpdate::EdgeChanged(id));
                    edges += 1;
                }
                Err(err) => tracing::debug!("Skipping edge {:?}: {err}", record.id),
            }
        }

        self.refresh_geometry();
        self.selection.sync_from(&self.graph);
        let nodes = self.graph.node_count();
        tracing::info!("Loaded graph: {nodes} node(s), {edges} edge(s)");
        self.events.emit(&GraphEvent::GraphLoaded { nodes, edges });
    }

    fn load_node(&mut self, record: &NodeRecord) -> Result<NodeId> {
        let template = self
            .registry
            .get(&record.node_type)
            .ok_or_else(|| GraphError::UnknownNodeType(record.node_type.clone()))?;
        let id = if record.id.is_empty() {
            NodeId::generate()
        } else {
            NodeId::new(record.id.as_str())
        };
        let mut node = Node::from_template(id, template).with_position(Pos2::new(record.x, record.y));
        if !record.label.is_empty() {
            node.label = record.label.clone();
        }
        node.size = Vec2::new(
            record.width.unwrap_or(node.size.x),
            record.height.unwrap_or(node.size.y),
        );
        node.selected = record.selected;
        node.data = record.data.clone();
        self.insert_node(node)
    }

    /// Replace the graph with a JSON document
    pub fn load_json(&mut self, source: &str) -> std::result::Result<(), DocumentError> {
        let doc = GraphDocument::from_json(source)?;
        self.deserialize(&doc);
        Ok(())
    }

    // ---- input ----

    /// What lies under a screen position
    pub fn hit_test(&self, screen: Pos2) -> Hit {
        hit_test(
            &self.graph,
            &self.grid,
            &self.viewport,
            self.config.socket_hit_radius,
            screen,
        )
    }

    /// A pointer went down
    pub fn pointer_down(&mut self, event: PointerEvent) {
        // The connection or node drag owns the interaction; extra touches are ignored
        if self.connection.is_active() || self.drag.is_dragging() {
            return;
        }
        if self.gestures.is_active() {
            if event.kind == PointerKind::Touch {
                self.gesture_down(event);
            }
            return;
        }

        match self.hit_test(event.position) {
            Hit::Socket(key) => {
                if self.config.read_only {
                    return;
                }
                let Some(anchor) = self.grid.position(&key) else {
                    return;
                };
                let connected = self.graph.socket(&key).is_some_and(|s| s.connection_count() > 0);
                if event.kind == PointerKind::Touch && connected {
                    self.connection
                        .press(event.pointer, key, anchor, event.position, event.time);
                } else {
                    self.connection.begin(
                        event.pointer,
                        key,
                        anchor,
                        &self.graph,
                        &self.viewport,
                        &mut self.presenter,
                    );
                }
            }
            Hit::Node(id) => {
                if event.modifiers.shift {
                    self.selection
                        .toggle_node(&mut self.graph, &mut self.events, &mut self.presenter, &id);
                } else if !self.selection.contains(&id) {
                    self.select_node(&id, false);
                }
                if self.config.read_only || !self.selection.contains(&id) {
                    return;
                }
                let snapshots = self
                    .selection
                    .ids()
                    .filter_map(|n| self.graph.node(n).map(|node| (n.clone(), node.position)))
                    .collect();
                self.drag.begin(event.pointer, event.position, snapshots);
            }
            Hit::Canvas => {
                if !event.modifiers.shift {
                    self.clear_selection();
                }
                self.gesture_down(event);
            }
        }
    }

    fn gesture_down(&mut self, event: PointerEvent) {
        let outcome = self
            .gestures
            .pointer_down(&self.viewport, event.pointer, event.position, event.time);
        if let Some(GestureOutcome::DoubleTap(at)) = outcome {
            tracing::debug!("Double tap at {at:?}");
            self.toggle_zoom(at);
        }
    }

    /// A pointer moved
    pub fn pointer_move(&mut self, event: PointerEvent) {
        if self.connection.pointer() == Some(event.pointer) {
            let outcome = self.connection.pointer_move(
                event.pointer,
                event.position,
                event.time,
                &self.graph,
                &self.grid,
                &self.viewport,
                &mut self.presenter,
            );
            if let Some(outcome) = outcome {
                self.resolve_connection(outcome);
            }
        } else if self.drag.pointer() == Some(event.pointer) {
            for (id, position) in self.drag.update(event.position, self.viewport.scale()) {
                self.place_node(&id, position);
            }
        } else if self.gestures.tracks(event.pointer) {
            let previous = self.viewport.state();
            match self
                .gestures
                .pointer_move(&mut self.viewport, event.pointer, event.position)
            {
                Some(GestureOutcome::Panned) => self.viewport_changed(previous, ViewportCause::Pan),
                Some(GestureOutcome::Zoomed) => self.viewport_changed(previous, ViewportCause::Zoom),
                _ => {}
            }
        }
    }

    /// A pointer was released
    pub fn pointer_up(&mut self, event: PointerEvent) {
        if self.connection.pointer() == Some(event.pointer) {
            if let Some(outcome) = self
                .connection
                .pointer_up(event.pointer, event.time, &mut self.presenter)
            {
                self.resolve_connection(outcome);
            }
        } else if self.drag.pointer() == Some(event.pointer) {
            for moved in self.drag.end() {
                self.place_node(&moved.node, moved.to);
                if !moved.is_move() {
                    continue;
                }
                self.events.emit(&GraphEvent::NodeMoved {
                    node: moved.node,
                    from: moved.from,
                    to: moved.to,
                });
            }
        } else if self.gestures.tracks(event.pointer) {
            let Self {
                gestures,
                graph,
                grid,
                viewport,
                config,
                ..
            } = self;
            gestures.pointer_up(viewport, event.pointer, |p| {
                hit_test(graph, grid, viewport, config.socket_hit_radius, p) != Hit::Canvas
            });
        }
    }

    /// The platform cancelled a pointer
    pub fn pointer_cancel(&mut self, event: PointerEvent) {
        if self.connection.pointer() == Some(event.pointer) {
            self.connection.cancel(&mut self.presenter);
        } else if self.drag.pointer() == Some(event.pointer) {
            self.restore_drag();
        } else if self.gestures.tracks(event.pointer) {
            self.gestures.cancel();
        }
    }

    /// Mouse wheel: zoom at the cursor
    pub fn wheel(&mut self, event: WheelEvent) {
        let factor = 1.0 + event.delta.y * self.config.wheel_sensitivity;
        if factor > 0.0 {
            self.zoom_at(event.position, factor);
        }
    }

    /// Keyboard command
    pub fn key(&mut self, command: KeyCommand) {
        let result = match command {
            KeyCommand::Cancel => {
                self.cancel_interaction();
                Ok(())
            }
            KeyCommand::DeleteSelection => self.delete_selected_nodes().map(drop),
            KeyCommand::Copy => {
                self.copy();
                Ok(())
            }
            KeyCommand::Paste => self.paste().map(drop),
            KeyCommand::SelectAll => {
                self.select_all();
                Ok(())
            }
        };
        if let Err(err) = result {
            tracing::debug!("{command:?} ignored: {err}");
        }
    }

    /// Advance timers (long press)
    pub fn tick(&mut self, now: Duration) {
        if let Some(outcome) = self.connection.tick(now) {
            self.resolve_connection(outcome);
        }
    }

    /// Abort the connection or drag in progress
    pub fn cancel_interaction(&mut self) {
        self.connection.cancel(&mut self.presenter);
        self.restore_drag();
        self.gestures.cancel();
    }

    fn restore_drag(&mut self) {
        for (id, position) in self.drag.cancel() {
            self.place_node(&id, position);
        }
    }

    fn resolve_connection(&mut self, outcome: ConnectOutcome) {
        match outcome {
            ConnectOutcome::Connect { from, to } => {
                match self.graph.connect(&from, &to) {
                    Ok(id) => self.edge_created(&id),
                    Err(reason) => self.connection_failed(from, to, reason),
                }
            }
            ConnectOutcome::Rejected { from, to, reason } => self.connection_failed(from, to, reason),
            ConnectOutcome::Menu { socket, position } => {
                let mut actions: Vec<SocketAction> = self
                    .graph
                    .edges_for_socket(&socket)
                    .map(|e| SocketAction::DeleteConnection(e.id.clone()))
                    .collect();
                if actions.is_empty() {
                    return;
                }
                actions.push(SocketAction::DeleteAllConnections);
                tracing::debug!("Socket menu for {socket}");
                self.events.emit(&GraphEvent::SocketMenuRequested {
                    socket,
                    position,
                    actions,
                });
            }
            ConnectOutcome::Tap(_) | ConnectOutcome::Cancelled => {}
        }
    }

    fn connection_failed(&mut self, from: SocketKey, to: SocketKey, reason: ConnectionError) {
        tracing::debug!("Connection {from} -> {to} failed: {reason}");
        self.events
            .emit(&GraphEvent::ConnectionFailed { from, to, reason });
    }
}

impl<P: Presenter> std::fmt::Debug for GraphController<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphController")
            .field("nodes", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .field("viewport", &self.viewport.state())
            .field("read_only", &self.config.read_only)
            .finish()
    }
}

fn socket_world(graph: &Graph, viewport: &Viewport, presenter: &impl Presenter, key: &SocketKey) -> Option<Pos2> {
    let node = graph.node(&key.node)?;
    node.socket(key.direction, &key.socket)?;
    match presenter.socket_bounds(key) {
        Some(bounds) => Some(viewport.screen_to_world(bounds.center())),
        None => node.socket_anchor(key.direction, &key.socket),
    }
}

fn hit_test(graph: &Graph, grid: &SpatialGrid<SocketKey>, viewport: &Viewport, radius: f32, screen: Pos2) -> Hit {
    let world = viewport.screen_to_world(screen);
    if let Some(key) = grid.find_at(world, radius / viewport.scale()) {
        return Hit::Socket(key.clone());
    }
    graph
        .nodes()
        .filter(|n| n.rect().contains(world))
        .last()
        .map_or(Hit::Canvas, |n| Hit::Node(n.id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::RecordingPresenter;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn templates() -> [Template; 2] {
        [
            Template::new("source", "Source").with_output(SocketDescriptor::new("out", "number")),
            Template::new("sink", "Sink")
                .with_input(SocketDescriptor::new("in", "number"))
                .with_output(SocketDescriptor::new("out", "number")),
        ]
    }

    fn controller() -> GraphController<RecordingPresenter> {
        let mut c = GraphController::with_presenter(GraphConfig::default(), RecordingPresenter::default());
        for t in templates() {
            c.register_template(t);
        }
        c
    }

    fn recorder(c: &mut GraphController<RecordingPresenter>) -> Rc<RefCell<Vec<GraphEvent>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        c.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        seen
    }

    #[test]
    fn test_unknown_type_rejected() {
        let mut c = controller();
        assert!(matches!(
            c.add_node("nope", Pos2::ZERO),
            Err(GraphError::UnknownNodeType(_))
        ));
    }

    #[test]
    fn test_sockets_indexed_on_create_and_move() {
        let mut c = controller();
        let a = c.add_node("source", Pos2::ZERO).unwrap();
        let key = SocketKey::output(a.clone(), "out");
        let before = c.grid().position(&key).unwrap();
        c.move_node(&a, Pos2::new(100.0, 50.0)).unwrap();
        assert_eq!(c.grid().position(&key).unwrap(), before + Vec2::new(100.0, 50.0));

        c.remove_node(&a).unwrap();
        assert!(c.grid().is_empty());
    }

    #[test]
    fn test_remove_node_events_edges_first() {
        let mut c = controller();
        let a = c.add_node("source", Pos2::ZERO).unwrap();
        let b = c.add_node("sink", Pos2::new(300.0, 0.0)).unwrap();
        c.create_edge(&SocketKey::output(a.clone(), "out"), &SocketKey::input(b, "in"))
            .unwrap();
        let seen = recorder(&mut c);
        c.remove_node(&a).unwrap();
        let seen = seen.borrow();
        assert!(matches!(seen[0], GraphEvent::EdgeRemoved { .. }));
        assert!(matches!(seen[1], GraphEvent::NodeRemoved { .. }));
        assert_eq!(c.graph().edge_count(), 0);
    }

    #[test]
    fn test_remove_socket_reindexes_node() {
        let mut c = controller();
        let b = c.add_node("sink", Pos2::ZERO).unwrap();
        let extra = SocketDescriptor::new("extra", "number");
        let key = c.add_socket(&b, Direction::Input, &extra).unwrap();
        let old_in = SocketKey::input(b.clone(), "in");
        let slot = c.grid().position(&old_in).unwrap();
        c.remove_socket(&old_in).unwrap();
        assert_eq!(c.grid().position(&key), Some(slot));
        assert!(!c.grid().contains(&old_in));
        assert!(c.add_socket(&b, Direction::Input, &SocketDescriptor::new("in", "number")).is_ok());
        assert!(matches!(
            c.add_socket(&b, Direction::Input, &extra),
            Err(GraphError::DuplicateSocket { .. })
        ));
    }

    #[test]
    fn test_read_only_blocks_mutation() {
        let mut c = controller();
        let a = c.add_node("source", Pos2::ZERO).unwrap();
        c.set_read_only(true);
        assert!(matches!(c.add_node("source", Pos2::ZERO), Err(GraphError::ReadOnly)));
        assert!(matches!(c.remove_node(&a), Err(GraphError::ReadOnly)));
        assert!(matches!(c.clear(), Err(GraphError::ReadOnly)));
        // Selection still works
        assert!(c.select_node(&a, false));
    }

    #[test]
    fn test_hit_test_precedence() {
        let mut c = controller();
        let a = c.add_node("source", Pos2::ZERO).unwrap();
        let socket = c.grid().position(&SocketKey::output(a.clone(), "out")).unwrap();
        assert_eq!(c.hit_test(socket), Hit::Socket(SocketKey::output(a.clone(), "out")));
        assert_eq!(c.hit_test(Pos2::new(60.0, 40.0)), Hit::Node(a.clone()));
        let top = c.add_node("source", Pos2::new(20.0, 20.0)).unwrap();
        assert_eq!(c.hit_test(Pos2::new(60.0, 40.0)), Hit::Node(top));
        assert_eq!(c.hit_test(Pos2::new(900.0, 600.0)), Hit::Canvas);
    }

    #[test]
    fn test_wheel_zooms_at_cursor() {
        let mut c = controller();
        let seen = recorder(&mut c);
        let cursor = Pos2::new(200.0, 100.0);
        let world = c.viewport().screen_to_world(cursor);
        c.wheel(WheelEvent {
            position: cursor,
            delta: Vec2::new(0.0, 500.0),
            modifiers: Default::default(),
        });
        assert!((c.viewport().scale() - 1.5).abs() < 1e-5);
        let back = c.viewport().world_to_screen(world);
        assert!((back - cursor).length() < 1e-3);
        assert!(matches!(
            seen.borrow()[0],
            GraphEvent::ViewportChanged { cause: ViewportCause::Zoom, .. }
        ));
    }

    #[test]
    fn test_canvas_drag_pans() {
        let mut c = controller();
        let t = Duration::ZERO;
        c.pointer_down(PointerEvent::mouse(Pos2::new(500.0, 500.0), t));
        c.pointer_move(PointerEvent::mouse(Pos2::new(520.0, 510.0), t));
        c.pointer_up(PointerEvent::mouse(Pos2::new(520.0, 510.0), t));
        assert_eq!(c.viewport().pan(), Vec2::new(20.0, 10.0));
    }

    #[test]
    fn test_node_drag_moves_selection() {
        let mut c = controller();
        let a = c.add_node("source", Pos2::ZERO).unwrap();
        let b = c.add_node("source", Pos2::new(300.0, 0.0)).unwrap();
        c.select_node(&a, false);
        c.select_node(&b, true);
        let seen = recorder(&mut c);

        let t = Duration::ZERO;
        c.pointer_down(PointerEvent::mouse(Pos2::new(60.0, 40.0), t));
        c.pointer_move(PointerEvent::mouse(Pos2::new(90.0, 60.0), t));
        c.pointer_up(PointerEvent::mouse(Pos2::new(90.0, 60.0), t));

        assert_eq!(c.graph().node(&a).unwrap().position, Pos2::new(30.0, 20.0));
        assert_eq!(c.graph().node(&b).unwrap().position, Pos2::new(330.0, 20.0));
        let moves = seen
            .borrow()
            .iter()
            .filter(|e| matches!(e, GraphEvent::NodeMoved { .. }))
            .count();
        assert_eq!(moves, 2);
    }

    #[test]
    fn test_snapped_release_restores_start() {
        let config = GraphConfig {
            snap_to_grid: true,
            snap_size: 20.0,
            ..GraphConfig::default()
        };
        let mut c = GraphController::with_presenter(config, RecordingPresenter::default());
        for t in templates() {
            c.register_template(t);
        }
        let a = c.add_node("source", Pos2::ZERO).unwrap();
        let key = SocketKey::output(a.clone(), "out");
        let socket = c.grid().position(&key).unwrap();
        let seen = recorder(&mut c);

        let t = Duration::ZERO;
        c.pointer_down(PointerEvent::mouse(Pos2::new(60.0, 40.0), t));
        c.pointer_move(PointerEvent::mouse(Pos2::new(63.0, 40.0), t));
        assert_eq!(c.graph().node(&a).unwrap().position, Pos2::new(3.0, 0.0));
        c.pointer_up(PointerEvent::mouse(Pos2::new(63.0, 40.0), t));

        assert_eq!(c.graph().node(&a).unwrap().position, Pos2::ZERO);
        assert_eq!(c.grid().position(&key), Some(socket));
        assert!(!seen
            .borrow()
            .iter()
            .any(|e| matches!(e, GraphEvent::NodeMoved { .. })));
    }

    #[test]
    fn test_visible_nodes_follow_viewport() {
        let mut c = controller();
        let near = c.add_node("source", Pos2::new(100.0, 100.0)).unwrap();
        let far = c.add_node("source", Pos2::new(3000.0, 100.0)).unwrap();
        assert_eq!(c.visible_nodes(), vec![near.clone()]);
        c.pan_by(Vec2::new(-2900.0, 0.0));
        assert_eq!(c.visible_nodes(), vec![far]);
    }

    #[test]
    fn test_extra_touch_ignored_during_connection() {
        let mut c = controller();
        let a = c.add_node("source", Pos2::ZERO).unwrap();
        let socket = c.grid().position(&SocketKey::output(a, "out")).unwrap();
        let t = Duration::ZERO;
        c.pointer_down(PointerEvent::touch(0, socket, t));
        assert!(c.connection().is_active());
        c.pointer_down(PointerEvent::touch(1, Pos2::new(700.0, 500.0), t));
        c.pointer_move(PointerEvent::touch(1, Pos2::new(750.0, 500.0), t));
        assert_eq!(c.viewport().pan(), Vec2::ZERO);
    }

    #[test]
    fn test_pinch_zoom() {
        let mut c = controller();
        let t = Duration::ZERO;
        c.pointer_down(PointerEvent::touch(0, Pos2::new(500.0, 400.0), t));
        c.pointer_down(PointerEvent::touch(1, Pos2::new(600.0, 400.0), t));
        c.pointer_move(PointerEvent::touch(1, Pos2::new(700.0, 400.0), t));
        assert!((c.viewport().scale() - 2.0).abs() < 1e-4);
    }

    #[test]
    fn test_double_tap_toggles_zoom() {
        let mut c = controller();
        let at = Pos2::new(400.0, 300.0);
        let world = c.viewport().screen_to_world(at);
        for ms in [0, 10, 100, 110] {
            let event = PointerEvent::touch(0, at, Duration::from_millis(ms));
            if ms % 100 == 0 {
                c.pointer_down(event);
            } else {
                c.pointer_up(event);
            }
        }
        assert_eq!(c.viewport().scale(), 2.0);
        assert!((c.viewport().world_to_screen(world) - at).length() < 1e-3);
    }

    #[test]
    fn test_deserialize_skips_unknown_and_dangling() {
        let mut c = controller();
        let json = r#"{
            "nodes": [
                {"id": "a", "type": "source", "x": 0, "y": 0},
                {"id": "m", "type": "mystery", "x": 0, "y": 0},
                {"id": "b", "type": "sink", "x": 300, "y": 0, "selected": true}
            ],
            "edges": [
                {"id": "1", "fromNodeId": "a", "fromSocketId": "out", "toNodeId": "b", "toSocketId": "in"},
                {"id": "2", "fromNodeId": "m", "fromSocketId": "out", "toNodeId": "b", "toSocketId": "in"}
            ],
            "viewport": {"x": 5, "y": 6, "scale": 9}
        }"#;
        c.load_json(json).unwrap();
        assert_eq!(c.graph().node_count(), 2);
        assert_eq!(c.graph().edge_count(), 1);
        assert_eq!(c.viewport().scale(), 3.0);
        assert_eq!(c.selected_nodes(), vec![NodeId::new("b")]);
        assert_eq!(c.grid().len(), 3);
    }
}
