// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error types for graph mutation, connection validation and execution.

use crate::node::NodeId;
use crate::socket::{SocketId, SocketKey};

/// Reason a connection between two sockets was rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    /// One of the sockets does not exist
    #[error("Socket not found: {0}")]
    MissingSocket(SocketKey),

    /// Both ends are the same socket
    #[error("Cannot connect a socket to itself")]
    SameSocket,

    /// Both sockets belong to the same node
    #[error("Cannot connect sockets of the same node: {0}")]
    SameNode(NodeId),

    /// Both sockets are inputs or both are outputs
    #[error("Sockets have the same direction")]
    SameDirection,

    /// Data types are not compatible
    #[error("Incompatible data types: {from} -> {to}")]
    IncompatibleTypes {
        /// Data type of the first socket
        from: String,
        /// Data type of the second socket
        to: String,
    },

    /// Socket already holds its maximum number of connections
    #[error("Socket is at its connection limit: {0}")]
    SocketFull(SocketKey),

    /// An edge already links this pair of sockets
    #[error("Sockets are already connected")]
    AlreadyConnected,
}

impl ConnectionError {
    /// Short machine-readable reason, suitable for UI feedback
    pub fn reason(&self) -> &'static str {
        match self {
            Self::MissingSocket(_) => "missing-socket",
            Self::SameSocket => "same-socket",
            Self::SameNode(_) => "same-node",
            Self::SameDirection => "same-direction",
            Self::IncompatibleTypes { .. } => "incompatible-types",
            Self::SocketFull(_) => "max-connections",
            Self::AlreadyConnected => "already-connected",
        }
    }
}

/// Error from programmatic graph mutation
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// No template registered under this name
    #[error("Unknown node type: {0}")]
    UnknownNodeType(String),

    /// Node id already in use
    #[error("Duplicate node id: {0}")]
    DuplicateNode(NodeId),

    /// Node not found
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    /// Socket id already used on this node and direction
    #[error("Duplicate socket id {socket} on node {node}")]
    DuplicateSocket {
        /// Owning node
        node: NodeId,
        /// Offending socket id
        socket: SocketId,
    },

    /// Mutation attempted while read-only
    #[error("Graph is read-only")]
    ReadOnly,

    /// Connection was rejected
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Error raised by a node's execution hook
pub type HookError = Box<dyn std::error::Error + 'static>;

/// Error during graph execution
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    /// A node hook failed; the run was halted
    #[error("Node {node} failed after {executed} node(s) executed: {source}")]
    NodeFailed {
        /// Node whose hook failed
        node: NodeId,
        /// Nodes that completed before the failure
        executed: usize,
        /// Error returned by the hook
        #[source]
        source: HookError,
    },
}

/// Error reading or writing a graph document
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    /// JSON (de)serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// RON serialization failed
    #[error("RON error: {0}")]
    Ron(#[from] ron::Error),

    /// RON parsing failed
    #[error("RON parse error: {0}")]
    RonParse(#[from] ron::error::SpannedError),
}

/// Result type for graph mutations
pub type Result<T> = std::result::Result<T, GraphError>;
