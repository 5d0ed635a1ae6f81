//! Error types for every layer of the playbook core.
//!
//! Validation findings are deliberately absent here: they are data, not errors,
//! and live in [`crate::validation`].

use crate::types::{EdgeId, NodeId, NodeKind};
use crate::validation::Finding;
use thiserror::Error;

/// Errors raised by graph mutations. A failed mutation never touches the graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GraphError {
    /// An edge endpoint does not exist
    #[error("Edge endpoint '{0}' does not reference an existing node")]
    InvalidEndpoint(NodeId),

    /// An edge would start and end at the same node
    #[error("Edge would connect node '{0}' to itself")]
    SelfLoop(NodeId),

    /// No node has this ID
    #[error("Node '{0}' not found")]
    NodeNotFound(NodeId),

    /// No edge has this ID
    #[error("Edge '{0}' not found")]
    EdgeNotFound(EdgeId),

    /// New node data is of a different kind than the node
    #[error("Node '{node}' is a {expected} node and cannot take {found} data")]
    KindMismatch {
        /// The node being updated
        node: NodeId,
        /// Kind of the node
        expected: NodeKind,
        /// Kind of the rejected data
        found: NodeKind,
    },
}

/// Errors raised while reading or writing playbook documents.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// Missing fields, unknown kinds, or an inconsistent graph
    #[error("Malformed playbook document: {0}")]
    MalformedDocument(String),

    /// The document could not be serialized
    #[error("Failed to encode playbook document: {0}")]
    Encode(#[from] serde_json::Error),

    /// Reading or writing a file failed
    #[error("I/O error on '{path}': {source}")]
    Io {
        /// The file involved
        path: String,
        /// The underlying failure
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised when exporting to the automation format.
#[derive(Error, Debug, Clone)]
pub enum ExportError {
    /// Validation reported errors; all findings are attached
    #[error("Playbook has {} blocking validation error(s)", count_errors(.0))]
    Blocked(Vec<Finding>),
}

/// Errors surfaced by the editing session to its caller.
#[derive(Error, Debug)]
pub enum SessionError {
    /// A graph mutation failed
    #[error(transparent)]
    Graph(#[from] GraphError),

    /// A document operation failed
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// An automation export failed
    #[error(transparent)]
    Export(#[from] ExportError),

    /// Save refused because validation reported errors
    #[error("Cannot save: playbook has {} blocking validation error(s)", count_errors(.0))]
    SaveBlocked(Vec<Finding>),

    /// Test run refused because validation reported errors
    #[error("Cannot test: playbook has {} blocking validation error(s)", count_errors(.0))]
    TestBlocked(Vec<Finding>),

    /// Nothing has been saved yet
    #[error("No playbook stored in the save slot")]
    EmptySaveSlot,
}

fn count_errors(findings: &[Finding]) -> usize {
    findings.iter().filter(|f| f.is_error()).count()
}
