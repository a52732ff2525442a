// SPDX-License-Identifier: MIT OR Apache-2.0
//! Interactive connection creation.
//!
//! The engine tracks one pointer from a socket to a drop target. It drives the
//! temporary path and hover feedback through the presenter and reports what
//! the gesture resolved to; the controller commits the result.

use crate::error::ConnectionError;
use crate::graph::{normalize, Graph};
use crate::input::PointerId;
use crate::path::EdgePath;
use crate::presenter::{Presenter, VisualUpdate};
use crate::socket::{Direction, Socket, SocketKey};
use crate::spatial::SpatialGrid;
use crate::viewport::Viewport;
use egui::{Color32, Pos2};
use std::time::Duration;

/// Engine state
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectState {
    /// No connection gesture
    Idle,
    /// Touch held on a connected socket, waiting for long press or movement
    Pressing {
        /// Pointer holding the socket
        pointer: PointerId,
        /// Pressed socket
        socket: SocketKey,
        /// Socket position in world space
        anchor: Pos2,
        /// Screen position of the press
        origin: Pos2,
        /// Time of the press
        since: Duration,
    },
    /// Dragging a connection out of a socket
    Connecting {
        /// Pointer dragging
        pointer: PointerId,
        /// Socket the drag started from
        source: SocketKey,
        /// Source socket position in world space
        anchor: Pos2,
        /// Valid target under the pointer
        hover: Option<SocketKey>,
        /// Candidate under the pointer that refused the connection
        rejected: Option<(SocketKey, ConnectionError)>,
    },
}

/// What a connection gesture resolved to
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectOutcome {
    /// Dropped on a valid target; `from` is the output socket
    Connect {
        /// Output socket
        from: SocketKey,
        /// Input socket
        to: SocketKey,
    },
    /// Dropped on a socket that refused the connection
    Rejected {
        /// Socket the drag started from
        from: SocketKey,
        /// Socket it was dropped on
        to: SocketKey,
        /// Why it was refused
        reason: ConnectionError,
    },
    /// Long press on a connected socket
    Menu {
        /// Pressed socket
        socket: SocketKey,
        /// Screen position of the press
        position: Pos2,
    },
    /// Short tap on a socket
    Tap(SocketKey),
    /// Released over nothing, or cancelled
    Cancelled,
}

/// Connection gesture state machine
#[derive(Debug, Clone)]
pub struct ConnectionEngine {
    state: ConnectState,
    hit_radius: f32,
    long_press: Duration,
}

impl ConnectionEngine {
    /// Create an engine with a screen-space hit radius and long-press threshold
    pub fn new(hit_radius: f32, long_press: Duration) -> Self {
        Self {
            state: ConnectState::Idle,
            hit_radius,
            long_press,
        }
    }

    /// Current state
    pub fn state(&self) -> &ConnectState {
        &self.state
    }

    /// Whether a gesture is in progress
    pub fn is_active(&self) -> bool {
        self.state != ConnectState::Idle
    }

    /// Pointer owning the gesture
    pub fn pointer(&self) -> Option<PointerId> {
        match &self.state {
            ConnectState::Idle => None,
            ConnectState::Pressing { pointer, .. } | ConnectState::Connecting { pointer, .. } => {
                Some(*pointer)
            }
        }
    }

    /// Current hover target
    pub fn hover(&self) -> Option<&SocketKey> {
        match &self.state {
            ConnectState::Connecting { hover, .. } => hover.as_ref(),
            _ => None,
        }
    }

    /// Start dragging a connection from a socket
    pub fn begin(
        &mut self,
        pointer: PointerId,
        source: SocketKey,
        anchor: Pos2,
        graph: &Graph,
        viewport: &Viewport,
        presenter: &mut impl Presenter,
    ) {
        tracing::debug!("Connection drag from {source}");
        let screen = viewport.world_to_screen(anchor);
        let color = socket_color(graph, &source);
        presenter.apply(VisualUpdate::TempPath {
            path: temp_path(&source, screen, screen, viewport.scale()),
            color,
        });
        self.state = ConnectState::Connecting {
            pointer,
            source,
            anchor,
            hover: None,
            rejected: None,
        };
    }

    /// Hold a connected socket; becomes a menu on long press or a drag on movement
    pub fn press(&mut self, pointer: PointerId, socket: SocketKey, anchor: Pos2, origin: Pos2, time: Duration) {
        tracing::debug!("Press on connected socket {socket}");
        self.state = ConnectState::Pressing {
            pointer,
            socket,
            anchor,
            origin,
            since: time,
        };
    }

    /// Advance the long-press timer
    pub fn tick(&mut self, time: Duration) -> Option<ConnectOutcome> {
        match &self.state {
            ConnectState::Pressing {
                socket,
                origin,
                since,
                ..
            } if time.saturating_sub(*since) >= self.long_press => {
                let outcome = ConnectOutcome::Menu {
                    socket: socket.clone(),
                    position: *origin,
                };
                self.state = ConnectState::Idle;
                Some(outcome)
            }
            _ => None,
        }
    }

    /// Track the owning pointer.
    ///
    /// Returns an outcome only when a pending long press fires.
    pub fn pointer_move(
        &mut self,
        pointer: PointerId,
        position: Pos2,
        time: Duration,
        graph: &Graph,
        grid: &SpatialGrid<SocketKey>,
        viewport: &Viewport,
        presenter: &mut impl Presenter,
    ) -> Option<ConnectOutcome> {
        if self.pointer() != Some(pointer) {
            return None;
        }
        if let Some(outcome) = self.tick(time) {
            return Some(outcome);
        }

        if let ConnectState::Pressing {
            socket,
            anchor,
            origin,
            ..
        } = &self.state
        {
            if *origin == position {
                return None;
            }
            // Movement cancels the long press and resumes a normal drag
            let (socket, anchor) = (socket.clone(), *anchor);
            self.begin(pointer, socket, anchor, graph, viewport, presenter);
        }

        let ConnectState::Connecting {
            source,
            anchor,
            hover,
            rejected,
            ..
        } = &mut self.state
        else {
            return None;
        };

        let world = viewport.screen_to_world(position);
        let tolerance = self.hit_radius / viewport.scale();
        let candidate = grid.find_at(world, tolerance).cloned();

        let previous = hover.take();
        *rejected = None;
        let mut color = socket_color(graph, source);
        match candidate {
            Some(target) => match graph.check_connection(source, &target) {
                Ok(()) => {
                    color = socket_color(graph, normalize(source, &target).0);
                    if previous.as_ref() != Some(&target) {
                        presenter.apply(VisualUpdate::HoverTarget(target.clone()));
                    }
                    *hover = Some(target);
                }
                Err(reason) => {
                    if previous.is_some() {
                        presenter.apply(VisualUpdate::ClearHover);
                    }
                    if target != *source && graph.socket(&target).is_some_and(Socket::is_full) {
                        presenter.apply(VisualUpdate::RejectFlash(target.clone()));
                    }
                    tracing::debug!("Connection {source} -> {target} refused: {reason}");
                    *rejected = Some((target, reason));
                }
            },
            None => {
                if previous.is_some() {
                    presenter.apply(VisualUpdate::ClearHover);
                }
            }
        }

        let start = viewport.world_to_screen(*anchor);
        presenter.apply(VisualUpdate::TempPath {
            path: temp_path(source, start, position, viewport.scale()),
            color,
        });
        None
    }

    /// Release the owning pointer
    pub fn pointer_up(
        &mut self,
        pointer: PointerId,
        time: Duration,
        presenter: &mut impl Presenter,
    ) -> Option<ConnectOutcome> {
        if self.pointer() != Some(pointer) {
            return None;
        }
        if let Some(outcome) = self.tick(time) {
            return Some(outcome);
        }
        let outcome = match std::mem::replace(&mut self.state, ConnectState::Idle) {
            ConnectState::Idle => return None,
            ConnectState::Pressing { socket, .. } => return Some(ConnectOutcome::Tap(socket)),
            ConnectState::Connecting {
                source,
                hover,
                rejected,
                ..
            } => match (hover, rejected) {
                (Some(target), _) => {
                    let (from, to) = normalize(&source, &target);
                    ConnectOutcome::Connect {
                        from: from.clone(),
                        to: to.clone(),
                    }
                }
                (None, Some((to, reason))) => ConnectOutcome::Rejected {
                    from: source,
                    to,
                    reason,
                },
                (None, None) => ConnectOutcome::Cancelled,
            },
        };
        cleanup(presenter);
        Some(outcome)
    }

    /// Abort any gesture
    pub fn cancel(&mut self, presenter: &mut impl Presenter) -> bool {
        let was_connecting = matches!(self.state, ConnectState::Connecting { .. });
        let was_active = self.is_active();
        self.state = ConnectState::Idle;
        if was_connecting {
            tracing::debug!("Connection drag cancelled");
            cleanup(presenter);
        }
        was_active
    }
}

impl Default for ConnectionEngine {
    fn default() -> Self {
        Self::new(15.0, Duration::from_millis(500))
    }
}

fn cleanup(presenter: &mut impl Presenter) {
    presenter.apply(VisualUpdate::ClearTempPath);
    presenter.apply(VisualUpdate::ClearHover);
}

fn socket_color(graph: &Graph, key: &SocketKey) -> Color32 {
    graph.socket(key).map_or(Color32::GRAY, Socket::color)
}

/// Path between the source anchor and the pointer, drawn output to input
fn temp_path(source: &SocketKey, anchor: Pos2, pointer: Pos2, scale: f32) -> EdgePath {
    match source.direction {
        Direction::Output => EdgePath::between(anchor, pointer, scale),
        Direction::Input => EdgePath::between(pointer, anchor, scale),
    }
}
