//! Simulation engine for test runs of a playbook.
//!
//! [`simulate`] computes the whole run up front: a deterministic timeline of
//! [`SimulationStep`]s walking from the trigger through the graph. The
//! [`runner`] then replays that timeline against the clock so a caller can
//! watch it, pause it, or stop it. Nothing here mutates the playbook.

pub mod runner;

use crate::config::SimulationConfig;
use crate::types::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

pub use runner::{SimulationEvent, SimulationHandle, SimulationRunner, SimulationState};

/// Status of a node during a simulated run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NodeStatus {
    /// Not reached yet
    Pending,
    /// Currently executing
    Running,
    /// Finished executing
    Completed,
    /// Only reachable through branches that were not taken
    Blocked,
}

/// One status transition in the simulated timeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationStep {
    /// The node whose status changed
    pub node_id: NodeId,
    /// The status the node moved into
    pub status: NodeStatus,
    /// How long the node stays in this status before the next step
    pub duration: Duration,
}

/// Decides which branch a condition takes during simulation.
pub trait BranchPolicy {
    /// Picks the branch for `condition`. Called once per executed condition.
    fn choose(&mut self, condition: &PlaybookNode) -> Branch;
}

/// Always follows the `true` edge. The default, so runs are reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysTrue;

impl BranchPolicy for AlwaysTrue {
    fn choose(&mut self, _condition: &PlaybookNode) -> Branch {
        Branch::True
    }
}

/// Always follows the `false` edge.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysFalse;

impl BranchPolicy for AlwaysFalse {
    fn choose(&mut self, _condition: &PlaybookNode) -> Branch {
        Branch::False
    }
}

/// Per-condition branch choices, with a fallback for conditions not listed.
#[derive(Debug, Clone)]
pub struct FixedBranches {
    overrides: HashMap<NodeId, Branch>,
    fallback: Branch,
}

impl FixedBranches {
    /// Creates a policy taking `fallback` for every condition.
    pub fn new(fallback: Branch) -> Self {
        Self {
            overrides: HashMap::new(),
            fallback,
        }
    }

    /// Forces `branch` for the condition `node`.
    pub fn with(mut self, node: NodeId, branch: Branch) -> Self {
        self.overrides.insert(node, branch);
        self
    }
}

impl BranchPolicy for FixedBranches {
    fn choose(&mut self, condition: &PlaybookNode) -> Branch {
        self.overrides
            .get(&condition.id)
            .copied()
            .unwrap_or(self.fallback)
    }
}

/// The outcome of simulating a playbook.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Simulation {
    steps: Vec<SimulationStep>,
    /// Final status per node, in node insertion order
    statuses: Vec<(NodeId, NodeStatus)>,
}

impl Simulation {
    /// The timeline, in emission order.
    pub fn steps(&self) -> &[SimulationStep] {
        &self.steps
    }

    /// Consumes the simulation, returning its timeline.
    pub fn into_steps(self) -> Vec<SimulationStep> {
        self.steps
    }

    /// Returns true if nothing was executed (e.g. the playbook has no trigger).
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Final status of a node after the whole run.
    pub fn status_of(&self, id: &NodeId) -> Option<NodeStatus> {
        self.statuses
            .iter()
            .find(|(node, _)| node == id)
            .map(|(_, status)| *status)
    }

    /// Final status of every node, in insertion order.
    pub fn statuses(&self) -> &[(NodeId, NodeStatus)] {
        &self.statuses
    }

    /// The node to highlight while step `tick` is current: the running node, if any.
    pub fn active_node_at(&self, tick: usize) -> Option<NodeId> {
        self.steps
            .get(tick)
            .filter(|step| step.status == NodeStatus::Running)
            .map(|step| step.node_id)
    }

    /// Sum of all step durations.
    pub fn total_duration(&self) -> Duration {
        self.steps.iter().map(|s| s.duration).sum()
    }

    /// IDs of nodes that completed, in execution order.
    pub fn execution_order(&self) -> Vec<NodeId> {
        self.steps
            .iter()
            .filter(|s| s.status == NodeStatus::Completed)
            .map(|s| s.node_id)
            .collect()
    }
}

/// Simulates a playbook with the default policy ([`AlwaysTrue`]) and timing.
pub fn simulate_default(playbook: &Playbook) -> Simulation {
    simulate(playbook, &mut AlwaysTrue, &SimulationConfig::default())
}

/// Computes the execution timeline of a playbook.
///
/// The walk starts at the first trigger (in insertion order). A node runs once
/// every edge into it from the reachable part of the graph has been resolved
/// and at least one of them was taken. A node whose inputs all resolved as
/// not taken is `blocked`, and its own outgoing edges resolve as not taken.
/// Nodes on a cycle never get all their inputs resolved and stay `pending`,
/// so the walk always terminates.
///
/// # Arguments
///
/// * `playbook` - The graph to walk; it is read, never modified
/// * `policy` - Picks the branch of every condition that executes
/// * `timing` - Per-kind base durations, jitter bound and jitter seed
pub fn simulate(
    playbook: &Playbook,
    policy: &mut dyn BranchPolicy,
    timing: &SimulationConfig,
) -> Simulation {
    let mut statuses: Vec<(NodeId, NodeStatus)> = playbook
        .nodes
        .iter()
        .map(|n| (n.id, NodeStatus::Pending))
        .collect();

    let Some(trigger) = playbook.triggers().next() else {
        log::debug!("Simulation skipped: playbook has no trigger");
        return Simulation {
            steps: Vec::new(),
            statuses,
        };
    };

    let index: HashMap<NodeId, usize> = playbook
        .nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id, i))
        .collect();

    // Well-formed adjacency: (target index, label) per source, in edge insertion order.
    let mut adjacency: Vec<Vec<(usize, Option<Branch>)>> = vec![Vec::new(); playbook.nodes.len()];
    for edge in &playbook.edges {
        if let (Some(&from), Some(&to)) = (index.get(&edge.source), index.get(&edge.target)) {
            if from != to {
                adjacency[from].push((to, edge.label));
            }
        }
    }

    let start = index[&trigger.id];
    let reachable = reachable_from(start, &adjacency);

    let mut pending_inputs = vec![0usize; playbook.nodes.len()];
    for &from in &reachable {
        for &(to, _) in &adjacency[from] {
            pending_inputs[to] += 1;
        }
    }
    let mut taken_inputs = vec![0usize; playbook.nodes.len()];
    let mut processed = vec![false; playbook.nodes.len()];

    let mut rng = StdRng::seed_from_u64(timing.seed);
    let mut steps = Vec::new();
    let mut queue = VecDeque::from([start]);

    while let Some(current) = queue.pop_front() {
        if processed[current] {
            continue;
        }
        processed[current] = true;
        let node = &playbook.nodes[current];
        let runs = current == start || taken_inputs[current] > 0;

        let chosen = if runs {
            let duration = timing.duration_for(node.kind(), &mut rng);
            steps.push(SimulationStep {
                node_id: node.id,
                status: NodeStatus::Running,
                duration,
            });
            steps.push(SimulationStep {
                node_id: node.id,
                status: NodeStatus::Completed,
                duration: Duration::ZERO,
            });
            statuses[current].1 = NodeStatus::Completed;
            log::debug!("Simulated {} '{}' for {:?}", node.kind(), node.data.label(), duration);

            match node.kind() {
                NodeKind::Condition => Some(policy.choose(node)),
                NodeKind::Trigger | NodeKind::Action => None,
            }
        } else {
            steps.push(SimulationStep {
                node_id: node.id,
                status: NodeStatus::Blocked,
                duration: Duration::ZERO,
            });
            statuses[current].1 = NodeStatus::Blocked;
            None
        };

        for &(next, label) in &adjacency[current] {
            if processed[next] {
                continue;
            }
            let taken = runs
                && match node.kind() {
                    NodeKind::Condition => label.is_some() && label == chosen,
                    NodeKind::Trigger | NodeKind::Action => true,
                };
            pending_inputs[next] = pending_inputs[next].saturating_sub(1);
            if taken {
                taken_inputs[next] += 1;
            }
            if pending_inputs[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    Simulation { steps, statuses }
}

fn reachable_from(start: usize, adjacency: &[Vec<(usize, Option<Branch>)>]) -> Vec<usize> {
    let mut seen = HashSet::from([start]);
    let mut order = vec![start];
    let mut queue = VecDeque::from([start]);
    while let Some(node) = queue.pop_front() {
        for &(next, _) in &adjacency[node] {
            if seen.insert(next) {
                order.push(next);
                queue.push_back(next);
            }
        }
    }
    order
}

impl SimulationConfig {
    /// Simulated duration of a node of `kind`: the kind's base plus bounded jitter.
    pub fn duration_for(&self, kind: NodeKind, rng: &mut StdRng) -> Duration {
        let base = match kind {
            NodeKind::Trigger => self.trigger_ms,
            NodeKind::Condition => self.condition_ms,
            NodeKind::Action => self.action_ms,
        };
        let jitter = if self.jitter_ms == 0 {
            0
        } else {
            rng.gen_range(0..=self.jitter_ms)
        };
        Duration::from_millis(base.saturating_add(jitter))
    }
}
