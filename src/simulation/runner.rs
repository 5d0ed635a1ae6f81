//! Real-time playback of a simulated run.
//!
//! A [`SimulationRunner`] replays a precomputed [`Simulation`] on the tokio
//! clock, holding each step for its duration. The returned
//! [`SimulationHandle`] pauses, resumes and stops the run and receives the
//! emitted steps. Must be started from within a tokio runtime.

use super::{BranchPolicy, NodeStatus, Simulation, SimulationStep};
use crate::config::SimulationConfig;
use crate::types::{NodeId, Playbook};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Represents the overall state of a simulation run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SimulationState {
    /// Simulation is stopped
    Stopped,
    /// Simulation is running continuously
    Running,
    /// Simulation is temporarily paused
    Paused,
}

/// Something the run reports to its handle.
#[derive(Debug, Clone, PartialEq)]
pub enum SimulationEvent {
    /// A node changed status; `active` is the node to highlight, if any
    Step {
        /// The transition that just happened
        step: SimulationStep,
        /// The running node, or `None` between nodes
        active: Option<NodeId>,
    },
    /// Every step has been emitted
    Finished,
}

/// Starts simulation runs.
pub struct SimulationRunner;

impl SimulationRunner {
    /// Plans a run over a private copy of `playbook` and starts playing it back.
    ///
    /// The playbook is cloned before planning so later edits by the caller cannot
    /// affect a run in progress.
    pub fn start(
        playbook: &Playbook,
        policy: &mut dyn BranchPolicy,
        timing: &SimulationConfig,
    ) -> SimulationHandle {
        let snapshot = playbook.clone();
        let plan = super::simulate(&snapshot, policy, timing);
        Self::play(&snapshot, plan)
    }

    /// Starts playing back an already computed simulation of `playbook`.
    pub fn play(playbook: &Playbook, plan: Simulation) -> SimulationHandle {
        let (control_tx, control_rx) = watch::channel(SimulationState::Running);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let statuses = playbook
            .nodes
            .iter()
            .map(|n| (n.id, NodeStatus::Pending))
            .collect();

        log::info!("Simulation started with {} steps", plan.steps().len());
        let task = tokio::spawn(drive(plan.into_steps(), event_tx, control_rx));

        SimulationHandle {
            control: control_tx,
            events: event_rx,
            statuses,
            active: None,
            finished: false,
            task: Some(task),
        }
    }
}

/// Plays steps back in order until done, stopped, or the handle is dropped.
async fn drive(
    steps: Vec<SimulationStep>,
    events: mpsc::UnboundedSender<SimulationEvent>,
    mut control: watch::Receiver<SimulationState>,
) {
    for step in steps {
        if !wait_until_running(&mut control).await {
            return;
        }
        let duration = step.duration;
        let active = (step.status == NodeStatus::Running).then_some(step.node_id);
        if events.send(SimulationEvent::Step { step, active }).is_err() {
            return;
        }
        if !hold(duration, &mut control).await {
            return;
        }
    }
    let _ = events.send(SimulationEvent::Finished);
}

/// Waits out a pause. Returns false if the run was stopped.
async fn wait_until_running(control: &mut watch::Receiver<SimulationState>) -> bool {
    loop {
        let state = *control.borrow_and_update();
        match state {
            SimulationState::Running => return true,
            SimulationState::Stopped => return false,
            SimulationState::Paused => {
                if control.changed().await.is_err() {
                    return false;
                }
            }
        }
    }
}

/// Holds for `duration`, freezing the remaining time while paused.
/// Returns false if the run was stopped.
async fn hold(duration: Duration, control: &mut watch::Receiver<SimulationState>) -> bool {
    let mut remaining = duration;
    while !remaining.is_zero() {
        let started = Instant::now();
        tokio::select! {
            _ = tokio::time::sleep(remaining) => return true,
            changed = control.changed() => {
                if changed.is_err() {
                    return false;
                }
                remaining = remaining.saturating_sub(started.elapsed());
                if !wait_until_running(control).await {
                    return false;
                }
            }
        }
    }
    true
}

/// Controls a run in progress and collects what it reports.
///
/// Dropping the handle tears the run down.
pub struct SimulationHandle {
    control: watch::Sender<SimulationState>,
    events: mpsc::UnboundedReceiver<SimulationEvent>,
    statuses: HashMap<NodeId, NodeStatus>,
    active: Option<NodeId>,
    finished: bool,
    task: Option<JoinHandle<()>>,
}

impl SimulationHandle {
    /// Suspends the run after the current moment; progress is kept.
    pub fn pause(&self) {
        self.control.send_replace(SimulationState::Paused);
        log::debug!("Simulation paused");
    }

    /// Resumes a paused run.
    pub fn resume(&self) {
        self.control.send_replace(SimulationState::Running);
        log::debug!("Simulation resumed");
    }

    /// Current control state of the run.
    pub fn state(&self) -> SimulationState {
        if self.finished {
            SimulationState::Stopped
        } else {
            *self.control.borrow()
        }
    }

    /// Returns true once every step has been received.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// The node currently highlighted, as of the last received event.
    pub fn active_node(&self) -> Option<NodeId> {
        self.active
    }

    /// Last reported status of a node.
    pub fn status_of(&self, id: &NodeId) -> Option<NodeStatus> {
        self.statuses.get(id).copied()
    }

    /// Waits for the next event. Returns `None` once the run is over.
    pub async fn next_event(&mut self) -> Option<SimulationEvent> {
        let event = self.events.recv().await?;
        self.apply(&event);
        Some(event)
    }

    /// Returns the next event if one is already waiting.
    pub fn try_next_event(&mut self) -> Option<SimulationEvent> {
        let event = self.events.try_recv().ok()?;
        self.apply(&event);
        Some(event)
    }

    /// Stops the run and returns the last reported status of every node.
    ///
    /// Statuses are not rolled back: nodes that completed stay completed.
    pub fn stop(mut self) -> HashMap<NodeId, NodeStatus> {
        self.control.send_replace(SimulationState::Stopped);
        if let Some(task) = self.task.take() {
            task.abort();
        }
        while let Some(event) = self.try_next_event() {
            log::trace!("Draining {event:?} after stop");
        }
        log::info!("Simulation stopped");
        std::mem::take(&mut self.statuses)
    }

    fn apply(&mut self, event: &SimulationEvent) {
        match event {
            SimulationEvent::Step { step, active } => {
                self.statuses.insert(step.node_id, step.status);
                self.active = *active;
            }
            SimulationEvent::Finished => {
                self.active = None;
                self.finished = true;
                log::info!("Simulation finished");
            }
        }
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::AlwaysTrue;
    use crate::types::{NodeKind, Position};

    fn timing() -> SimulationConfig {
        SimulationConfig {
            jitter_ms: 0,
            ..SimulationConfig::default()
        }
    }

    fn linear(actions: usize) -> (Playbook, Vec<NodeId>) {
        let mut playbook = Playbook::new();
        let mut ids = vec![playbook.add_node(NodeKind::Trigger.default_data(), Position::default())];
        for _ in 0..actions {
            let id = playbook.add_node(NodeKind::Action.default_data(), Position::default());
            playbook.add_edge(*ids.last().unwrap(), id, None).unwrap();
            ids.push(id);
        }
        (playbook, ids)
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_emits_every_step_then_finishes() {
        let (playbook, ids) = linear(1);
        let mut handle = SimulationRunner::start(&playbook, &mut AlwaysTrue, &timing());

        let mut seen = Vec::new();
        while let Some(event) = handle.next_event().await {
            match event {
                SimulationEvent::Step { step, .. } => seen.push((step.node_id, step.status)),
                SimulationEvent::Finished => break,
            }
        }

        assert_eq!(
            seen,
            vec![
                (ids[0], NodeStatus::Running),
                (ids[0], NodeStatus::Completed),
                (ids[1], NodeStatus::Running),
                (ids[1], NodeStatus::Completed),
            ]
        );
        assert!(handle.is_finished());
        assert_eq!(handle.state(), SimulationState::Stopped);
        assert_eq!(handle.status_of(&ids[1]), Some(NodeStatus::Completed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_steps_are_held_for_their_duration() {
        let (playbook, ids) = linear(1);
        let mut handle = SimulationRunner::start(&playbook, &mut AlwaysTrue, &timing());
        let started = Instant::now();

        handle.next_event().await;
        assert_eq!(handle.active_node(), Some(ids[0]));
        handle.next_event().await;

        assert!(started.elapsed() >= Duration::from_millis(400));
        assert_eq!(handle.active_node(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_suspends_and_resume_continues() {
        let (playbook, ids) = linear(2);
        let mut handle = SimulationRunner::start(&playbook, &mut AlwaysTrue, &timing());

        handle.next_event().await;
        handle.pause();
        tokio::time::sleep(Duration::from_secs(60)).await;
        while handle.try_next_event().is_some() {}
        assert_eq!(handle.status_of(&ids[0]), Some(NodeStatus::Running));
        assert_eq!(handle.state(), SimulationState::Paused);

        handle.resume();
        while let Some(event) = handle.next_event().await {
            if event == SimulationEvent::Finished {
                break;
            }
        }
        assert_eq!(handle.status_of(&ids[2]), Some(NodeStatus::Completed));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_keeps_completed_statuses() {
        let (playbook, ids) = linear(2);
        let mut handle = SimulationRunner::start(&playbook, &mut AlwaysTrue, &timing());

        // trigger running, trigger completed, first action running
        for _ in 0..3 {
            handle.next_event().await;
        }
        let statuses = handle.stop();

        assert_eq!(statuses.get(&ids[0]), Some(&NodeStatus::Completed));
        assert_eq!(statuses.get(&ids[1]), Some(&NodeStatus::Running));
        assert_eq!(statuses.get(&ids[2]), Some(&NodeStatus::Pending));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_is_isolated_from_later_edits() {
        let (mut playbook, ids) = linear(1);
        let mut handle = SimulationRunner::start(&playbook, &mut AlwaysTrue, &timing());

        playbook.remove_node(&ids[1]).unwrap();

        let mut completed = Vec::new();
        while let Some(event) = handle.next_event().await {
            if let SimulationEvent::Step { step, .. } = event {
                if step.status == NodeStatus::Completed {
                    completed.push(step.node_id);
                }
            }
        }
        assert_eq!(completed, ids);
    }
}
