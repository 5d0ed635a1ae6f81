//! The editing session: the surface the canvas and palette talk to.
//!
//! A [`PlaybookSession`] owns the live playbook, its undo history and at most
//! one test run. Every structural edit goes through here so it is recorded in
//! history exactly once. Save, test and export are gated on validation.

mod export;
mod file_ops;

#[cfg(test)]
mod tests;

pub use file_ops::SaveSlot;

use crate::config::DesignerConfig;
use crate::constants::DEFAULT_PLAYBOOK_NAME;
use crate::error::{GraphError, SessionError};
use crate::history::History;
use crate::simulation::{self, BranchPolicy, NodeStatus, Simulation, SimulationHandle, SimulationRunner};
use crate::templates::{build_template, TemplateKind};
use crate::types::*;
use crate::validation::{has_errors, validate, Finding};
use std::collections::HashMap;

/// A single-user editing session over one playbook.
pub struct PlaybookSession {
    name: String,
    playbook: Playbook,
    history: History,
    config: DesignerConfig,
    save_slot: SaveSlot,
    run: Option<SimulationHandle>,
}

impl Default for PlaybookSession {
    fn default() -> Self {
        Self::new(DesignerConfig::default())
    }
}

impl PlaybookSession {
    /// Creates a session holding an empty, untitled playbook.
    pub fn new(config: DesignerConfig) -> Self {
        let save_slot = SaveSlot::new(&config.save_slot_dir);
        Self {
            name: DEFAULT_PLAYBOOK_NAME.to_string(),
            playbook: Playbook::new(),
            history: History::new(config.history_depth),
            config,
            save_slot,
            run: None,
        }
    }

    /// The playbook's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the playbook. Names are metadata and are not tracked by undo.
    pub fn rename(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The live playbook.
    pub fn playbook(&self) -> &Playbook {
        &self.playbook
    }

    /// The session's configuration.
    pub fn config(&self) -> &DesignerConfig {
        &self.config
    }

    /// Adds a node and records it in history.
    pub fn add_node(&mut self, data: NodeData, position: Position) -> NodeId {
        self.stop_run_before_edit();
        let id = self.playbook.add_node(data, position);
        self.commit("add node");
        id
    }

    /// Removes a node with its edges and records it in history.
    pub fn remove_node(&mut self, id: &NodeId) -> Result<PlaybookNode, GraphError> {
        self.stop_run_before_edit();
        let node = self.playbook.remove_node(id)?;
        self.commit("remove node");
        Ok(node)
    }

    /// Replaces a node's configuration and records it in history.
    pub fn update_node_data(&mut self, id: &NodeId, data: NodeData) -> Result<(), GraphError> {
        self.stop_run_before_edit();
        self.playbook.update_node_data(id, data)?;
        self.commit("update node data");
        Ok(())
    }

    /// Moves a node. Cosmetic, so nothing is recorded in history.
    pub fn move_node(&mut self, id: &NodeId, position: Position) -> Result<(), GraphError> {
        self.stop_run_before_edit();
        self.playbook.move_node(id, position)
    }

    /// Adds an edge and records it in history.
    pub fn add_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        label: Option<Branch>,
    ) -> Result<EdgeId, GraphError> {
        self.stop_run_before_edit();
        let id = self.playbook.add_edge(source, target, label)?;
        self.commit("add edge");
        Ok(id)
    }

    /// Removes an edge and records it in history.
    pub fn remove_edge(&mut self, id: &EdgeId) -> Result<Edge, GraphError> {
        self.stop_run_before_edit();
        let edge = self.playbook.remove_edge(id)?;
        self.commit("remove edge");
        Ok(edge)
    }

    /// Duplicates a node (without its edges) and records it in history.
    pub fn duplicate_node(&mut self, id: &NodeId) -> Result<NodeId, GraphError> {
        self.stop_run_before_edit();
        let copy = self.playbook.duplicate_node(id)?;
        self.commit("duplicate node");
        Ok(copy)
    }

    /// Reverts the last structural edit.
    ///
    /// # Returns
    ///
    /// The restored playbook, or `None` if there was nothing to undo.
    pub fn undo(&mut self) -> Option<&Playbook> {
        self.stop_run_before_edit();
        let restored = self.history.undo()?;
        self.playbook = restored;
        log::debug!("Undo to history entry #{}", self.history.current().sequence());
        Some(&self.playbook)
    }

    /// Re-applies the last undone edit.
    ///
    /// # Returns
    ///
    /// The restored playbook, or `None` if there was nothing to redo.
    pub fn redo(&mut self) -> Option<&Playbook> {
        self.stop_run_before_edit();
        let restored = self.history.redo()?;
        self.playbook = restored;
        log::debug!("Redo to history entry #{}", self.history.current().sequence());
        Some(&self.playbook)
    }

    /// Returns true if there is an edit to undo.
    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    /// Returns true if there is an edit to redo.
    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    /// Validates the live playbook.
    pub fn validate(&self) -> Vec<Finding> {
        validate(&self.playbook)
    }

    /// Computes the simulated timeline of the live playbook without playing it.
    pub fn simulate(&self, policy: &mut dyn BranchPolicy) -> Simulation {
        simulation::simulate(&self.playbook, policy, &self.config.simulation)
    }

    /// Starts a real-time test run, replacing any run already in progress.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Returns
    ///
    /// A handle to the new run, or [`SessionError::TestBlocked`] if validation
    /// reports errors. A blocked test leaves any previous run untouched.
    pub fn start_test(
        &mut self,
        policy: &mut dyn BranchPolicy,
    ) -> Result<&mut SimulationHandle, SessionError> {
        let findings = self.validate();
        if has_errors(&findings) {
            log::warn!("Test of '{}' blocked by validation errors", self.name);
            return Err(SessionError::TestBlocked(findings));
        }

        self.stop_test();
        let handle = SimulationRunner::start(&self.playbook, policy, &self.config.simulation);
        Ok(self.run.insert(handle))
    }

    /// The run in progress, if any.
    pub fn test_run(&mut self) -> Option<&mut SimulationHandle> {
        self.run.as_mut()
    }

    /// Stops the run in progress.
    ///
    /// # Returns
    ///
    /// The last reported node statuses, or `None` if nothing was running.
    pub fn stop_test(&mut self) -> Option<HashMap<NodeId, NodeStatus>> {
        self.run.take().map(SimulationHandle::stop)
    }

    /// Discards the current playbook and history and starts from an empty one.
    pub fn new_playbook(&mut self) {
        self.replace(DEFAULT_PLAYBOOK_NAME.to_string(), Playbook::new());
    }

    /// Replaces the current playbook with a built-in template.
    pub fn load_template(&mut self, kind: TemplateKind) {
        let (name, playbook) = build_template(kind);
        self.replace(name.to_string(), playbook);
    }

    /// Swaps in a whole new playbook, making it the history baseline.
    fn replace(&mut self, name: String, playbook: Playbook) {
        self.stop_run_before_edit();
        self.name = name;
        self.playbook = playbook;
        self.history.reset(&self.playbook);
        log::info!("Session now editing '{}'", self.name);
    }

    fn commit(&mut self, what: &str) {
        self.history.push(&self.playbook);
        log::debug!(
            "Committed {what} as history entry #{}",
            self.history.current().sequence()
        );
    }

    fn stop_run_before_edit(&mut self) {
        if let Some(run) = &self.run {
            if !run.is_finished() {
                log::warn!("Stopping test run before editing the playbook");
            }
            self.stop_test();
        }
    }
}
