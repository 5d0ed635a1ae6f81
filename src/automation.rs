//! Export to the external automation format.
//!
//! The [`ExternalSpec`] is a one-way export consumed by an orchestration
//! platform: each node becomes a step and each edge a transition. Export
//! refuses playbooks with error-severity validation findings.

use crate::error::ExportError;
use crate::types::*;
use crate::validation::{has_errors, validate};
use serde::{Deserialize, Serialize};

/// Format identifier written into every export.
pub const AUTOMATION_FORMAT_VERSION: &str = "1.0";

/// Step type understood by the automation platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepType {
    /// Entry point, from a trigger node
    Start,
    /// Two-way decision, from a condition node
    Decision,
    /// Work item, from an action node
    Task,
}

impl From<NodeKind> for StepType {
    fn from(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Trigger => StepType::Start,
            NodeKind::Condition => StepType::Decision,
            NodeKind::Action => StepType::Task,
        }
    }
}

/// When a transition is followed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransitionOn {
    /// After the source step completes
    Success,
    /// When the source decision evaluates to true
    True,
    /// When the source decision evaluates to false
    False,
}

/// A control-flow link between two steps.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transition {
    /// Step the link starts from
    pub from: NodeId,
    /// Step the link leads to
    pub to: NodeId,
    /// When the link is followed
    pub on: TransitionOn,
}

/// One step of the exported playbook.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutomationStep {
    /// Node ID, reused as step ID
    pub id: NodeId,
    /// Step type derived from the node kind
    #[serde(rename = "type")]
    pub step_type: StepType,
    /// Display name
    pub name: String,
    /// The node's configuration record, passed through untouched
    pub config: serde_json::Value,
}

/// The document handed to the automation platform.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExternalSpec {
    /// Format version
    pub version: String,
    /// Playbook name
    pub name: String,
    /// ID of the start step
    pub entry: Option<NodeId>,
    /// Steps, in node insertion order
    pub steps: Vec<AutomationStep>,
    /// Transitions, in edge insertion order
    pub transitions: Vec<Transition>,
}

impl ExternalSpec {
    /// Serialize the spec to a pretty-printed JSON string
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Converts a playbook to the automation format.
///
/// # Returns
///
/// The exported spec, or [`ExportError::Blocked`] carrying every finding if
/// validation reports any error.
pub fn to_automation_format(playbook: &Playbook, name: &str) -> Result<ExternalSpec, ExportError> {
    let findings = validate(playbook);
    if has_errors(&findings) {
        log::warn!("Automation export of '{name}' blocked by validation errors");
        return Err(ExportError::Blocked(findings));
    }

    let steps = playbook
        .nodes
        .iter()
        .map(|node| AutomationStep {
            id: node.id,
            step_type: node.kind().into(),
            name: node.data.label().to_string(),
            config: config_value(&node.data),
        })
        .collect();

    let transitions = playbook
        .edges
        .iter()
        .filter_map(|edge| {
            let source = playbook.node(&edge.source)?;
            let on = match (source.kind(), edge.label) {
                (NodeKind::Condition, Some(Branch::True)) => TransitionOn::True,
                (NodeKind::Condition, Some(Branch::False)) => TransitionOn::False,
                _ => TransitionOn::Success,
            };
            Some(Transition {
                from: edge.source,
                to: edge.target,
                on,
            })
        })
        .collect();

    Ok(ExternalSpec {
        version: AUTOMATION_FORMAT_VERSION.to_string(),
        name: name.to_string(),
        entry: playbook.triggers().next().map(|t| t.id),
        steps,
        transitions,
    })
}

fn config_value(data: &NodeData) -> serde_json::Value {
    let value = match data {
        NodeData::Trigger(config) => serde_json::to_value(config),
        NodeData::Condition(config) => serde_json::to_value(config),
        NodeData::Action(config) => serde_json::to_value(config),
    };
    // Config records are plain structs of strings and JSON maps.
    value.unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::FindingKind;

    fn branching() -> (Playbook, [NodeId; 4]) {
        let mut playbook = Playbook::new();
        let t = playbook.add_node(NodeKind::Trigger.default_data(), Position::default());
        let c = playbook.add_node(NodeKind::Condition.default_data(), Position::default());
        let yes = playbook.add_node(NodeKind::Action.default_data(), Position::default());
        let no = playbook.add_node(NodeKind::Action.default_data(), Position::default());
        playbook.add_edge(t, c, None).unwrap();
        playbook.add_edge(c, yes, Some(Branch::True)).unwrap();
        playbook.add_edge(c, no, Some(Branch::False)).unwrap();
        (playbook, [t, c, yes, no])
    }

    #[test]
    fn test_export_maps_kinds_and_links() {
        let (playbook, [t, c, yes, no]) = branching();

        let spec = to_automation_format(&playbook, "Triage").unwrap();

        assert_eq!(spec.name, "Triage");
        assert_eq!(spec.entry, Some(t));
        let types: Vec<_> = spec.steps.iter().map(|s| s.step_type).collect();
        assert_eq!(
            types,
            vec![StepType::Start, StepType::Decision, StepType::Task, StepType::Task]
        );
        assert_eq!(
            spec.transitions,
            vec![
                Transition { from: t, to: c, on: TransitionOn::Success },
                Transition { from: c, to: yes, on: TransitionOn::True },
                Transition { from: c, to: no, on: TransitionOn::False },
            ]
        );
    }

    #[test]
    fn test_export_passes_config_through() {
        let (playbook, _) = branching();

        let spec = to_automation_format(&playbook, "Triage").unwrap();

        assert_eq!(spec.steps[0].config["trigger_type"], "alert");
        assert_eq!(spec.steps[2].name, "New Action");
    }

    #[test]
    fn test_export_blocked_on_errors() {
        let mut playbook = Playbook::new();
        playbook.add_node(NodeKind::Action.default_data(), Position::default());

        let result = to_automation_format(&playbook, "Broken");

        let Err(ExportError::Blocked(findings)) = result else {
            panic!("export should be blocked");
        };
        assert_eq!(findings[0].kind, FindingKind::NoEntryPoint);
    }

    #[test]
    fn test_export_allows_warnings() {
        let mut playbook = Playbook::new();
        playbook.add_node(NodeKind::Trigger.default_data(), Position::default());
        playbook.add_node(NodeKind::Action.default_data(), Position::default());

        assert!(to_automation_format(&playbook, "Orphan").is_ok());
    }

    #[test]
    fn test_export_json_uses_type_key() {
        let (playbook, _) = branching();

        let json = to_automation_format(&playbook, "Triage").unwrap().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["version"], AUTOMATION_FORMAT_VERSION);
        assert_eq!(value["steps"][1]["type"], "decision");
        assert_eq!(value["transitions"][2]["on"], "false");
    }
}
