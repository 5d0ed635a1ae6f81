//! The save/interchange document for playbooks.
//!
//! A [`Document`] is a flat, versionless JSON object:
//! `{ "name", "nodes", "edges", "savedAt" }`. It is what the save slot stores
//! and what `.json` files contain. Reading one back either yields a complete
//! playbook or fails as a whole with [`DocumentError::MalformedDocument`].

use crate::error::DocumentError;
use crate::types::{Edge, PlaybookNode, Playbook};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A named, timestamped playbook as stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    /// Playbook name
    pub name: String,
    /// Nodes in insertion order
    pub nodes: Vec<PlaybookNode>,
    /// Edges in insertion order
    pub edges: Vec<Edge>,
    /// When the document was written; optional on import
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
}

impl Document {
    /// Serialize the document to a pretty-printed JSON string.
    ///
    /// Fails with [`DocumentError::MalformedDocument`] if a node position is
    /// NaN or infinite, since JSON has no encoding for those that reads back.
    pub fn to_json(&self) -> Result<String, DocumentError> {
        if let Some(node) = self.nodes.iter().find(|n| !n.position.is_finite()) {
            return Err(malformed(format!(
                "node '{}' has a non-finite position ({}, {})",
                node.id, node.position.x, node.position.y
            )));
        }
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses a document from JSON, checking its shape but not its graph structure.
    pub fn from_json(json: &str) -> Result<Self, DocumentError> {
        serde_json::from_str(json).map_err(|e| DocumentError::MalformedDocument(e.to_string()))
    }
}

/// Captures `playbook` as a document named `name`, stamped with the current time.
pub fn to_document(playbook: &Playbook, name: &str) -> Document {
    Document {
        name: name.to_string(),
        nodes: playbook.nodes.clone(),
        edges: playbook.edges.clone(),
        saved_at: Some(Utc::now()),
    }
}

/// Rebuilds a playbook from a document.
///
/// Fails if node or edge IDs repeat, an edge references a node that is not in
/// the document, or an edge loops onto its own source. Nothing partial is
/// ever returned.
pub fn from_document(document: &Document) -> Result<Playbook, DocumentError> {
    let mut node_ids = HashSet::new();
    for node in &document.nodes {
        if !node_ids.insert(node.id) {
            return Err(malformed(format!("duplicate node id '{}'", node.id)));
        }
    }

    let mut edge_ids = HashSet::new();
    for edge in &document.edges {
        if !edge_ids.insert(edge.id) {
            return Err(malformed(format!("duplicate edge id '{}'", edge.id)));
        }
        for endpoint in [edge.source, edge.target] {
            if !node_ids.contains(&endpoint) {
                return Err(malformed(format!(
                    "edge '{}' references missing node '{endpoint}'",
                    edge.id
                )));
            }
        }
        if edge.source == edge.target {
            return Err(malformed(format!("edge '{}' is a self-loop", edge.id)));
        }
    }

    Ok(Playbook {
        nodes: document.nodes.clone(),
        edges: document.edges.clone(),
    })
}

/// Parses JSON text straight into a playbook and its name.
pub fn playbook_from_json(json: &str) -> Result<(String, Playbook), DocumentError> {
    let document = Document::from_json(json)?;
    let playbook = from_document(&document)?;
    Ok((document.name, playbook))
}

fn malformed(reason: String) -> DocumentError {
    DocumentError::MalformedDocument(reason)
}
