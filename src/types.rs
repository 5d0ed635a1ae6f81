//! Core data types and structures for the playbook designer.
//!
//! This module defines the graph model: nodes, edges, their typed configuration
//! records, and the [`Playbook`] that owns them. Mutations here only guard
//! low-level invariants (existing endpoints, no self-loops). Higher-level
//! structure such as a single trigger or acyclicity is left to
//! [`crate::validation`] so an editor can pass through incomplete states.

use crate::constants::DUPLICATE_OFFSET;
use crate::error::GraphError;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for playbook nodes.
pub type NodeId = Uuid;

/// Unique identifier for playbook edges.
pub type EdgeId = Uuid;

/// The closed set of node kinds a playbook is built from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    /// Entry point of the playbook
    Trigger,
    /// Branches on an expression through `true`/`false` edges
    Condition,
    /// A response step
    Action,
}

impl NodeKind {
    /// All node kinds, in palette order.
    pub const ALL: [NodeKind; 3] = [NodeKind::Trigger, NodeKind::Condition, NodeKind::Action];

    /// Returns the configuration a freshly dropped node of this kind starts with.
    pub fn default_data(self) -> NodeData {
        match self {
            NodeKind::Trigger => NodeData::Trigger(TriggerConfig {
                label: "New Trigger".into(),
                trigger_type: "alert".into(),
                filter: None,
            }),
            NodeKind::Condition => NodeData::Condition(ConditionConfig {
                label: "New Condition".into(),
                expression: String::new(),
            }),
            NodeKind::Action => NodeData::Action(ActionConfig {
                label: "New Action".into(),
                action_type: "notify".into(),
                parameters: Default::default(),
            }),
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Trigger => "trigger",
            NodeKind::Condition => "condition",
            NodeKind::Action => "action",
        };
        f.write_str(name)
    }
}

/// Configuration of a trigger node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerConfig {
    /// Display label
    pub label: String,
    /// Event source that starts the playbook (e.g. `alert`, `schedule`, `webhook`)
    pub trigger_type: String,
    /// Optional filter narrowing which events fire the trigger
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

/// Configuration of a condition node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConditionConfig {
    /// Display label
    pub label: String,
    /// Expression evaluated by the automation platform; opaque to the core
    pub expression: String,
}

/// Configuration of an action node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionConfig {
    /// Display label
    pub label: String,
    /// Action identifier understood by the automation platform (e.g. `isolate_host`)
    pub action_type: String,
    /// Free-form action parameters
    #[serde(default)]
    pub parameters: serde_json::Map<String, serde_json::Value>,
}

/// Kind-specific node configuration.
///
/// The core only reads the variant tag; the records themselves are carried
/// through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "config", rename_all = "lowercase")]
pub enum NodeData {
    /// Trigger configuration
    Trigger(TriggerConfig),
    /// Condition configuration
    Condition(ConditionConfig),
    /// Action configuration
    Action(ActionConfig),
}

impl NodeData {
    /// Returns the node kind this record belongs to.
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::Trigger(_) => NodeKind::Trigger,
            NodeData::Condition(_) => NodeKind::Condition,
            NodeData::Action(_) => NodeKind::Action,
        }
    }

    /// Returns the display label of the node.
    pub fn label(&self) -> &str {
        match self {
            NodeData::Trigger(c) => &c.label,
            NodeData::Condition(c) => &c.label,
            NodeData::Action(c) => &c.label,
        }
    }
}

/// Canvas coordinates of a node. Layout only; never read by validation or simulation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Position {
    /// Horizontal coordinate
    pub x: f64,
    /// Vertical coordinate
    pub y: f64,
}

impl Position {
    /// Creates a position from its coordinates.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Returns true if both coordinates are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Returns this position shifted by the given offset.
    pub fn offset(self, (dx, dy): (f64, f64)) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }
}

/// Represents a single node in the playbook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaybookNode {
    /// Unique identifier for this node
    pub id: NodeId,
    /// Position on the canvas
    pub position: Position,
    /// Kind and configuration of this node
    pub data: NodeData,
}

impl PlaybookNode {
    /// Creates a new node with a fresh unique ID.
    ///
    /// # Arguments
    ///
    /// * `data` - The kind-specific configuration of the node
    /// * `position` - Where the canvas placed the node
    pub fn new(data: NodeData, position: Position) -> Self {
        Self {
            id: Uuid::new_v4(),
            position,
            data,
        }
    }

    /// Returns the kind of this node.
    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }
}

/// Outcome label carried by an edge leaving a condition node.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Branch {
    /// Followed when the condition holds
    True,
    /// Followed when the condition does not hold
    False,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Branch::True => "true",
            Branch::False => "false",
        })
    }
}

impl std::str::FromStr for Branch {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Ok(Branch::True),
            "false" | "no" => Ok(Branch::False),
            other => Err(format!("'{other}' is not a branch, expected 'true' or 'false'")),
        }
    }
}

/// Represents a directed edge between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Edge {
    /// Unique identifier for this edge
    pub id: EdgeId,
    /// ID of the source node
    pub source: NodeId,
    /// ID of the target node
    pub target: NodeId,
    /// Branch label; only meaningful on edges leaving a condition
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<Branch>,
}

impl Edge {
    /// Creates a new edge with a fresh unique ID.
    pub fn new(source: NodeId, target: NodeId, label: Option<Branch>) -> Self {
        Self {
            id: Uuid::new_v4(),
            source,
            target,
            label,
        }
    }
}

/// The playbook graph: nodes and edges, both kept in insertion order.
///
/// Insertion order is what makes validator output and simulation order
/// deterministic, so both collections are plain vectors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Playbook {
    /// All nodes, in insertion order
    pub nodes: Vec<PlaybookNode>,
    /// All edges, in insertion order
    pub edges: Vec<Edge>,
}

impl Playbook {
    /// Creates a new empty playbook.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the playbook has neither nodes nor edges.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Looks up a node by ID.
    pub fn node(&self, id: &NodeId) -> Option<&PlaybookNode> {
        self.nodes.iter().find(|n| n.id == *id)
    }

    /// Looks up an edge by ID.
    pub fn edge(&self, id: &EdgeId) -> Option<&Edge> {
        self.edges.iter().find(|e| e.id == *id)
    }

    /// Returns `true` if a node with the given ID exists.
    pub fn contains_node(&self, id: &NodeId) -> bool {
        self.nodes.iter().any(|n| n.id == *id)
    }

    /// Returns the insertion index of a node.
    pub fn node_index(&self, id: &NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == *id)
    }

    /// Iterates over the edges leaving `id`, in insertion order.
    pub fn outgoing<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == *id)
    }

    /// Iterates over the edges entering `id`, in insertion order.
    pub fn incoming<'a>(&'a self, id: &'a NodeId) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.target == *id)
    }

    /// Iterates over the trigger nodes, in insertion order.
    pub fn triggers(&self) -> impl Iterator<Item = &PlaybookNode> {
        self.nodes.iter().filter(|n| n.kind() == NodeKind::Trigger)
    }

    /// Adds a node built from `data` at `position`.
    ///
    /// # Returns
    ///
    /// The ID of the newly added node.
    pub fn add_node(&mut self, data: NodeData, position: Position) -> NodeId {
        let node = PlaybookNode::new(data, position);
        let id = node.id;
        self.nodes.push(node);
        id
    }

    /// Removes a node and every edge touching it.
    ///
    /// # Returns
    ///
    /// The removed node, or [`GraphError::NodeNotFound`] if it did not exist.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<PlaybookNode, GraphError> {
        let index = self.node_index(id).ok_or(GraphError::NodeNotFound(*id))?;
        let node = self.nodes.remove(index);
        self.edges.retain(|e| e.source != *id && e.target != *id);
        Ok(node)
    }

    /// Replaces a node's configuration. The node's kind cannot change.
    pub fn update_node_data(&mut self, id: &NodeId, data: NodeData) -> Result<(), GraphError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == *id)
            .ok_or(GraphError::NodeNotFound(*id))?;
        if node.kind() != data.kind() {
            return Err(GraphError::KindMismatch {
                node: *id,
                expected: node.kind(),
                found: data.kind(),
            });
        }
        node.data = data;
        Ok(())
    }

    /// Moves a node on the canvas.
    pub fn move_node(&mut self, id: &NodeId, position: Position) -> Result<(), GraphError> {
        let node = self
            .nodes
            .iter_mut()
            .find(|n| n.id == *id)
            .ok_or(GraphError::NodeNotFound(*id))?;
        node.position = position;
        Ok(())
    }

    /// Adds an edge between two existing, distinct nodes.
    ///
    /// # Arguments
    ///
    /// * `source` - The ID of the source node
    /// * `target` - The ID of the target node
    /// * `label` - Branch label, expected only when `source` is a condition
    ///
    /// # Returns
    ///
    /// The ID of the new edge, [`GraphError::InvalidEndpoint`] if either node is missing,
    /// or [`GraphError::SelfLoop`] if `source == target`.
    pub fn add_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        label: Option<Branch>,
    ) -> Result<EdgeId, GraphError> {
        if !self.contains_node(&source) {
            return Err(GraphError::InvalidEndpoint(source));
        }
        if !self.contains_node(&target) {
            return Err(GraphError::InvalidEndpoint(target));
        }
        if source == target {
            return Err(GraphError::SelfLoop(source));
        }

        let edge = Edge::new(source, target, label);
        let id = edge.id;
        self.edges.push(edge);
        Ok(id)
    }

    /// Removes an edge.
    pub fn remove_edge(&mut self, id: &EdgeId) -> Result<Edge, GraphError> {
        let index = self
            .edges
            .iter()
            .position(|e| e.id == *id)
            .ok_or(GraphError::EdgeNotFound(*id))?;
        Ok(self.edges.remove(index))
    }

    /// Copies a node's kind and data into a new node placed next to the original.
    /// Edges are not copied.
    pub fn duplicate_node(&mut self, id: &NodeId) -> Result<NodeId, GraphError> {
        let original = self.node(id).ok_or(GraphError::NodeNotFound(*id))?;
        let data = original.data.clone();
        let position = original.position.offset(DUPLICATE_OFFSET);
        Ok(self.add_node(data, position))
    }
}
