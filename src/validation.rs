//! Structural validation of playbooks.
//!
//! [`validate`] never fails and never mutates the graph. An empty result means
//! the playbook is structurally sound; any [`Severity::Error`] finding must
//! block save, test and export, while warnings are advisory.

use crate::types::{Branch, EdgeId, NodeId, NodeKind, Playbook};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

/// How serious a finding is.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Blocks save, test and export
    Error,
    /// Advisory only
    Warning,
}

/// The structural problem a finding reports.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum FindingKind {
    /// No trigger node exists
    NoEntryPoint,
    /// More than one trigger node exists
    MultipleEntryPoints,
    /// A cycle is reachable from the trigger
    CycleDetected,
    /// A non-trigger node cannot be reached from the trigger
    UnreachableNode,
    /// A condition has more than one edge for the same branch
    DuplicateBranch,
    /// A condition is missing its `true` or `false` edge
    IncompleteBranch,
    /// An edge leaving a condition carries no branch label
    UnlabeledBranch,
    /// An edge leaving a trigger or action carries a branch label
    LabelIgnored,
    /// An edge connects a node to itself
    SelfLoop,
    /// An edge references a node that does not exist
    DanglingEdge,
}

/// What a finding points at.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Subject {
    /// A node
    Node(NodeId),
    /// An edge
    Edge(EdgeId),
}

/// A single validator output item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Finding {
    /// How serious the problem is
    pub severity: Severity,
    /// Which problem this is
    pub kind: FindingKind,
    /// Human-readable description
    pub message: String,
    /// The offending node or edge, if the problem is local to one
    pub subject: Option<Subject>,
}

impl Finding {
    fn error(kind: FindingKind, message: impl Into<String>, subject: Option<Subject>) -> Self {
        Self {
            severity: Severity::Error,
            kind,
            message: message.into(),
            subject,
        }
    }

    fn warning(kind: FindingKind, message: impl Into<String>, subject: Option<Subject>) -> Self {
        Self {
            severity: Severity::Warning,
            kind,
            message: message.into(),
            subject,
        }
    }

    /// Returns true for error-severity findings.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(f, "{severity}: {}", self.message)?;
        match self.subject {
            Some(Subject::Node(id)) => write!(f, " (node {id})"),
            Some(Subject::Edge(id)) => write!(f, " (edge {id})"),
            None => Ok(()),
        }
    }
}

/// Returns true if any finding is error-severity.
pub fn has_errors(findings: &[Finding]) -> bool {
    findings.iter().any(Finding::is_error)
}

/// Validates the structure of a playbook.
///
/// Findings come back errors first, then warnings. Within each group,
/// graph-wide findings precede node findings, which precede edge findings,
/// each in insertion order.
pub fn validate(playbook: &Playbook) -> Vec<Finding> {
    let graph = IndexedGraph::new(playbook);
    let mut findings = Vec::new();

    check_entry_points(playbook, &mut findings);
    check_edges(playbook, &graph, &mut findings);
    check_cycles(playbook, &graph, &mut findings);
    check_reachability(playbook, &graph, &mut findings);
    check_branches(playbook, &graph, &mut findings);

    // Stable sort keeps check order for findings on the same subject.
    findings.sort_by_key(|f| (f.severity, subject_rank(playbook, f.subject)));
    findings
}

fn subject_rank(playbook: &Playbook, subject: Option<Subject>) -> (u8, usize) {
    match subject {
        None => (0, 0),
        Some(Subject::Node(id)) => (1, playbook.node_index(&id).unwrap_or(usize::MAX)),
        Some(Subject::Edge(id)) => (
            2,
            playbook
                .edges
                .iter()
                .position(|e| e.id == id)
                .unwrap_or(usize::MAX),
        ),
    }
}

/// Index-based view of a playbook with dangling edges and self-loops dropped,
/// so traversals only ever see well-formed adjacency.
struct IndexedGraph {
    index: HashMap<NodeId, usize>,
    /// Outgoing (edge index, target node index) per node, in edge insertion order
    adjacency: Vec<Vec<(usize, usize)>>,
}

impl IndexedGraph {
    fn new(playbook: &Playbook) -> Self {
        let index: HashMap<NodeId, usize> = playbook
            .nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id, i))
            .collect();
        let mut adjacency = vec![Vec::new(); playbook.nodes.len()];
        for (edge_index, edge) in playbook.edges.iter().enumerate() {
            if let (Some(&from), Some(&to)) = (index.get(&edge.source), index.get(&edge.target)) {
                if from != to {
                    adjacency[from].push((edge_index, to));
                }
            }
        }
        Self { index, adjacency }
    }

    fn contains(&self, id: &NodeId) -> bool {
        self.index.contains_key(id)
    }
}

fn trigger_indices(playbook: &Playbook) -> Vec<usize> {
    playbook
        .nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.kind() == NodeKind::Trigger)
        .map(|(i, _)| i)
        .collect()
}

fn check_entry_points(playbook: &Playbook, findings: &mut Vec<Finding>) {
    match playbook.triggers().count() {
        0 => findings.push(Finding::error(
            FindingKind::NoEntryPoint,
            "Playbook has no entry point: add a trigger node",
            None,
        )),
        1 => {}
        n => findings.push(Finding::error(
            FindingKind::MultipleEntryPoints,
            format!("Playbook has {n} trigger nodes: multiple entry points, ambiguous start"),
            None,
        )),
    }
}

fn check_edges(playbook: &Playbook, graph: &IndexedGraph, findings: &mut Vec<Finding>) {
    for edge in &playbook.edges {
        let subject = Some(Subject::Edge(edge.id));
        if !graph.contains(&edge.source) || !graph.contains(&edge.target) {
            findings.push(Finding::error(
                FindingKind::DanglingEdge,
                "Dangling edge: an endpoint no longer exists",
                subject,
            ));
        } else if edge.source == edge.target {
            findings.push(Finding::error(
                FindingKind::SelfLoop,
                "Edge connects a node to itself",
                subject,
            ));
        }
    }
}

/// Depth-first search from every trigger, marking nodes on the current path.
/// An edge into a node still on the path closes a cycle.
fn check_cycles(playbook: &Playbook, graph: &IndexedGraph, findings: &mut Vec<Finding>) {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Unvisited,
        OnStack,
        Done,
    }

    let mut marks = vec![Mark::Unvisited; playbook.nodes.len()];
    for root in trigger_indices(playbook) {
        if marks[root] != Mark::Unvisited {
            continue;
        }
        // (node, position of the next outgoing edge to explore)
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        marks[root] = Mark::OnStack;

        while let Some(frame) = stack.last_mut() {
            let (node, cursor) = *frame;
            match graph.adjacency[node].get(cursor) {
                Some(&(edge_index, next)) => {
                    frame.1 += 1;
                    match marks[next] {
                        Mark::Unvisited => {
                            marks[next] = Mark::OnStack;
                            stack.push((next, 0));
                        }
                        Mark::OnStack => {
                            let edge = &playbook.edges[edge_index];
                            findings.push(Finding::error(
                                FindingKind::CycleDetected,
                                format!(
                                    "Cycle detected: edge from '{}' back to '{}' closes a loop",
                                    playbook.nodes[node].data.label(),
                                    playbook.nodes[next].data.label(),
                                ),
                                Some(Subject::Edge(edge.id)),
                            ));
                        }
                        Mark::Done => {}
                    }
                }
                None => {
                    marks[node] = Mark::Done;
                    stack.pop();
                }
            }
        }
    }
}

fn check_reachability(playbook: &Playbook, graph: &IndexedGraph, findings: &mut Vec<Finding>) {
    let roots = trigger_indices(playbook);
    if roots.is_empty() {
        // Already reported as a missing entry point.
        return;
    }

    let mut reached: HashSet<usize> = roots.iter().copied().collect();
    let mut queue: VecDeque<usize> = roots.into_iter().collect();
    while let Some(node) = queue.pop_front() {
        for &(_, next) in &graph.adjacency[node] {
            if reached.insert(next) {
                queue.push_back(next);
            }
        }
    }

    for (i, node) in playbook.nodes.iter().enumerate() {
        if node.kind() != NodeKind::Trigger && !reached.contains(&i) {
            findings.push(Finding::warning(
                FindingKind::UnreachableNode,
                format!(
                    "Unreachable node '{}': no path from the trigger",
                    node.data.label()
                ),
                Some(Subject::Node(node.id)),
            ));
        }
    }
}

fn check_branches(playbook: &Playbook, graph: &IndexedGraph, findings: &mut Vec<Finding>) {
    for node in &playbook.nodes {
        let subject = Some(Subject::Node(node.id));
        let outgoing = playbook
            .outgoing(&node.id)
            .filter(|e| graph.contains(&e.target) && e.target != e.source);

        if node.kind() != NodeKind::Condition {
            for edge in outgoing.filter(|e| e.label.is_some()) {
                findings.push(Finding::warning(
                    FindingKind::LabelIgnored,
                    format!(
                        "Branch label on an edge leaving {} '{}' is ignored",
                        node.kind(),
                        node.data.label()
                    ),
                    Some(Subject::Edge(edge.id)),
                ));
            }
            continue;
        }

        let (mut true_edges, mut false_edges) = (0usize, 0usize);
        for edge in outgoing {
            match edge.label {
                Some(Branch::True) => true_edges += 1,
                Some(Branch::False) => false_edges += 1,
                None => findings.push(Finding::error(
                    FindingKind::UnlabeledBranch,
                    format!(
                        "Edge leaving condition '{}' has no true/false label",
                        node.data.label()
                    ),
                    Some(Subject::Edge(edge.id)),
                )),
            }
        }

        for (branch, count) in [(Branch::True, true_edges), (Branch::False, false_edges)] {
            if count > 1 {
                findings.push(Finding::error(
                    FindingKind::DuplicateBranch,
                    format!(
                        "Duplicate branch: condition '{}' has {count} '{branch}' edges",
                        node.data.label()
                    ),
                    subject,
                ));
            }
        }

        let missing: Vec<&str> = [("true", true_edges), ("false", false_edges)]
            .iter()
            .filter(|(_, count)| *count == 0)
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            findings.push(Finding::warning(
                FindingKind::IncompleteBranch,
                format!(
                    "Incomplete branch: condition '{}' has no '{}' edge, default behavior undefined",
                    node.data.label(),
                    missing.join("' or '")
                ),
                subject,
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Edge, Position};
    use uuid::Uuid;

    fn kinds(findings: &[Finding]) -> Vec<(Severity, FindingKind)> {
        findings.iter().map(|f| (f.severity, f.kind)).collect()
    }

    fn add(playbook: &mut Playbook, kind: NodeKind) -> NodeId {
        playbook.add_node(kind.default_data(), Position::default())
    }

    #[test]
    fn test_empty_playbook_has_no_entry_point() {
        let findings = validate(&Playbook::new());

        assert_eq!(kinds(&findings), vec![(Severity::Error, FindingKind::NoEntryPoint)]);
        assert!(has_errors(&findings));
    }

    #[test]
    fn test_trigger_to_action_is_clean() {
        let mut playbook = Playbook::new();
        let t = add(&mut playbook, NodeKind::Trigger);
        let a = add(&mut playbook, NodeKind::Action);
        playbook.add_edge(t, a, None).unwrap();

        assert!(validate(&playbook).is_empty());
    }

    #[test]
    fn test_lone_trigger_is_clean() {
        let mut playbook = Playbook::new();
        add(&mut playbook, NodeKind::Trigger);

        assert!(validate(&playbook).is_empty());
    }

    #[test]
    fn test_multiple_triggers() {
        let mut playbook = Playbook::new();
        add(&mut playbook, NodeKind::Trigger);
        add(&mut playbook, NodeKind::Trigger);

        let findings = validate(&playbook);

        assert_eq!(
            kinds(&findings),
            vec![(Severity::Error, FindingKind::MultipleEntryPoints)]
        );
    }

    #[test]
    fn test_cycle_names_closing_edge() {
        let mut playbook = Playbook::new();
        let t = add(&mut playbook, NodeKind::Trigger);
        let a = add(&mut playbook, NodeKind::Action);
        let b = add(&mut playbook, NodeKind::Action);
        playbook.add_edge(t, a, None).unwrap();
        playbook.add_edge(a, b, None).unwrap();
        let back = playbook.add_edge(b, a, None).unwrap();

        let findings = validate(&playbook);

        assert_eq!(kinds(&findings), vec![(Severity::Error, FindingKind::CycleDetected)]);
        assert_eq!(findings[0].subject, Some(Subject::Edge(back)));
    }

    #[test]
    fn test_diamond_is_not_a_cycle() {
        let mut playbook = Playbook::new();
        let t = add(&mut playbook, NodeKind::Trigger);
        let c = add(&mut playbook, NodeKind::Condition);
        let yes = add(&mut playbook, NodeKind::Action);
        let no = add(&mut playbook, NodeKind::Action);
        let join = add(&mut playbook, NodeKind::Action);
        playbook.add_edge(t, c, None).unwrap();
        playbook.add_edge(c, yes, Some(Branch::True)).unwrap();
        playbook.add_edge(c, no, Some(Branch::False)).unwrap();
        playbook.add_edge(yes, join, None).unwrap();
        playbook.add_edge(no, join, None).unwrap();

        assert!(validate(&playbook).is_empty());
    }

    #[test]
    fn test_cycle_outside_trigger_reach_is_only_unreachable() {
        let mut playbook = Playbook::new();
        add(&mut playbook, NodeKind::Trigger);
        let a = add(&mut playbook, NodeKind::Action);
        let b = add(&mut playbook, NodeKind::Action);
        playbook.add_edge(a, b, None).unwrap();
        playbook.add_edge(b, a, None).unwrap();

        let findings = validate(&playbook);

        assert_eq!(
            kinds(&findings),
            vec![
                (Severity::Warning, FindingKind::UnreachableNode),
                (Severity::Warning, FindingKind::UnreachableNode),
            ]
        );
    }

    #[test]
    fn test_incomplete_branch_warning() {
        let mut playbook = Playbook::new();
        let t = add(&mut playbook, NodeKind::Trigger);
        let c = add(&mut playbook, NodeKind::Condition);
        let a = add(&mut playbook, NodeKind::Action);
        playbook.add_edge(t, c, None).unwrap();
        playbook.add_edge(c, a, Some(Branch::True)).unwrap();

        let findings = validate(&playbook);

        assert_eq!(
            kinds(&findings),
            vec![(Severity::Warning, FindingKind::IncompleteBranch)]
        );
        assert_eq!(findings[0].subject, Some(Subject::Node(c)));
        assert!(findings[0].message.contains("'false'"));
    }

    #[test]
    fn test_duplicate_branch_error() {
        let mut playbook = Playbook::new();
        let t = add(&mut playbook, NodeKind::Trigger);
        let c = add(&mut playbook, NodeKind::Condition);
        let a = add(&mut playbook, NodeKind::Action);
        let b = add(&mut playbook, NodeKind::Action);
        let d = add(&mut playbook, NodeKind::Action);
        playbook.add_edge(t, c, None).unwrap();
        playbook.add_edge(c, a, Some(Branch::True)).unwrap();
        playbook.add_edge(c, b, Some(Branch::True)).unwrap();
        playbook.add_edge(c, d, Some(Branch::False)).unwrap();

        let findings = validate(&playbook);

        assert_eq!(kinds(&findings), vec![(Severity::Error, FindingKind::DuplicateBranch)]);
    }

    #[test]
    fn test_unlabeled_condition_edge() {
        let mut playbook = Playbook::new();
        let t = add(&mut playbook, NodeKind::Trigger);
        let c = add(&mut playbook, NodeKind::Condition);
        let a = add(&mut playbook, NodeKind::Action);
        playbook.add_edge(t, c, None).unwrap();
        playbook.add_edge(c, a, None).unwrap();

        let findings = validate(&playbook);

        assert_eq!(
            kinds(&findings),
            vec![
                (Severity::Error, FindingKind::UnlabeledBranch),
                (Severity::Warning, FindingKind::IncompleteBranch),
            ]
        );
    }

    #[test]
    fn test_label_on_action_edge_is_warned() {
        let mut playbook = Playbook::new();
        let t = add(&mut playbook, NodeKind::Trigger);
        let a = add(&mut playbook, NodeKind::Action);
        playbook.add_edge(t, a, Some(Branch::False)).unwrap();

        let findings = validate(&playbook);

        assert_eq!(kinds(&findings), vec![(Severity::Warning, FindingKind::LabelIgnored)]);
    }

    #[test]
    fn test_dangling_and_self_loop_edges() {
        let mut playbook = Playbook::new();
        let t = add(&mut playbook, NodeKind::Trigger);
        let dangling = Edge::new(t, Uuid::new_v4(), None);
        let looped = Edge::new(t, t, None);
        playbook.edges.push(dangling.clone());
        playbook.edges.push(looped.clone());

        let findings = validate(&playbook);

        assert_eq!(
            kinds(&findings),
            vec![
                (Severity::Error, FindingKind::DanglingEdge),
                (Severity::Error, FindingKind::SelfLoop),
            ]
        );
        assert_eq!(findings[0].subject, Some(Subject::Edge(dangling.id)));
        assert_eq!(findings[1].subject, Some(Subject::Edge(looped.id)));
    }

    #[test]
    fn test_errors_sorted_before_warnings() {
        let mut playbook = Playbook::new();
        let orphan = add(&mut playbook, NodeKind::Action);
        add(&mut playbook, NodeKind::Trigger);
        add(&mut playbook, NodeKind::Trigger);

        let findings = validate(&playbook);

        assert_eq!(
            kinds(&findings),
            vec![
                (Severity::Error, FindingKind::MultipleEntryPoints),
                (Severity::Warning, FindingKind::UnreachableNode),
            ]
        );
        assert_eq!(findings[1].subject, Some(Subject::Node(orphan)));
    }

    #[test]
    fn test_node_findings_follow_insertion_order() {
        let mut playbook = Playbook::new();
        add(&mut playbook, NodeKind::Trigger);
        let first = add(&mut playbook, NodeKind::Action);
        let second = add(&mut playbook, NodeKind::Condition);
        let third = add(&mut playbook, NodeKind::Action);

        let subjects: Vec<_> = validate(&playbook).into_iter().map(|f| f.subject).collect();

        // The unreachable condition also reports its incomplete branches right after.
        assert_eq!(
            subjects,
            vec![
                Some(Subject::Node(first)),
                Some(Subject::Node(second)),
                Some(Subject::Node(second)),
                Some(Subject::Node(third)),
            ]
        );
    }

    #[test]
    fn test_finding_display() {
        let finding = Finding::error(FindingKind::NoEntryPoint, "no entry point", None);
        assert_eq!(finding.to_string(), "error: no entry point");
    }
}
