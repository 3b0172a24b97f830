use serde::{Deserialize, Serialize};

use crate::domain::{Node, NodeId};

/// `Nodes.Query` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The caller's own contact record; must match the connection identity.
    pub requester: Node,
    /// Id whose neighbourhood is requested.
    pub target: NodeId,
    /// Maximum number of nodes wanted. Zero is rejected.
    pub limit: u32,
}

impl QueryRequest {
    pub fn new(requester: Node, target: NodeId, limit: usize) -> Self {
        Self {
            requester,
            target,
            limit: u32::try_from(limit).unwrap_or(u32::MAX),
        }
    }
}

/// `Nodes.Query` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryResponse {
    /// Closest known nodes, ascending by distance to the target.
    Nodes(Vec<Node>),
    /// The request was refused.
    Error { message: String },
}

impl QueryResponse {
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }
}
