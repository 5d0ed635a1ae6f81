use super::*;
use crate::config::SimulationConfig;
use crate::simulation::{simulate_default, AlwaysTrue, SimulationEvent};
use crate::validation::{FindingKind, Severity};
use crate::error::{DocumentError, ExportError};
use std::path::Path;

/// A session writing its save slot under `dir`, with jitter disabled.
fn session_in(dir: &Path) -> PlaybookSession {
    PlaybookSession::new(DesignerConfig {
        save_slot_dir: dir.to_path_buf(),
        history_depth: 100,
        simulation: SimulationConfig {
            jitter_ms: 0,
            ..SimulationConfig::default()
        },
    })
}

fn add(session: &mut PlaybookSession, kind: NodeKind) -> NodeId {
    session.add_node(kind.default_data(), Position::default())
}

fn errors(findings: &[Finding]) -> Vec<FindingKind> {
    findings
        .iter()
        .filter(|f| f.severity == Severity::Error)
        .map(|f| f.kind)
        .collect()
}

fn warnings(findings: &[Finding]) -> Vec<FindingKind> {
    findings
        .iter()
        .filter(|f| f.severity == Severity::Warning)
        .map(|f| f.kind)
        .collect()
}

fn transitions(session: &PlaybookSession) -> Vec<(NodeId, NodeStatus)> {
    session
        .simulate(&mut AlwaysTrue)
        .steps()
        .iter()
        .map(|s| (s.node_id, s.status))
        .collect()
}

#[test]
fn scenario_a_trigger_to_action() {
    let mut session = PlaybookSession::default();
    let trigger = add(&mut session, NodeKind::Trigger);
    let action = add(&mut session, NodeKind::Action);
    session.add_edge(trigger, action, None).unwrap();

    assert!(errors(&session.validate()).is_empty());
    assert_eq!(
        transitions(&session),
        vec![
            (trigger, NodeStatus::Running),
            (trigger, NodeStatus::Completed),
            (action, NodeStatus::Running),
            (action, NodeStatus::Completed),
        ]
    );
}

#[test]
fn scenario_b_condition_with_only_true_branch() {
    let mut session = PlaybookSession::default();
    let trigger = add(&mut session, NodeKind::Trigger);
    let condition = add(&mut session, NodeKind::Condition);
    let action = add(&mut session, NodeKind::Action);
    session.add_edge(trigger, condition, None).unwrap();
    session.add_edge(condition, action, Some(Branch::True)).unwrap();

    let findings = session.validate();
    assert!(errors(&findings).is_empty());
    assert_eq!(warnings(&findings), vec![FindingKind::IncompleteBranch]);

    let simulation = session.simulate(&mut AlwaysTrue);
    assert_eq!(simulation.execution_order(), vec![trigger, condition, action]);
    for id in [trigger, condition, action] {
        assert_eq!(simulation.status_of(&id), Some(NodeStatus::Completed));
    }
}

#[test]
fn scenario_c_cycle() {
    let mut session = PlaybookSession::default();
    let trigger = add(&mut session, NodeKind::Trigger);
    let a = add(&mut session, NodeKind::Action);
    let b = add(&mut session, NodeKind::Action);
    session.add_edge(trigger, a, None).unwrap();
    session.add_edge(a, b, None).unwrap();
    session.add_edge(b, a, None).unwrap();

    assert_eq!(errors(&session.validate()), vec![FindingKind::CycleDetected]);
}

#[test]
fn scenario_d_two_disconnected_triggers() {
    let mut session = PlaybookSession::default();
    add(&mut session, NodeKind::Trigger);
    add(&mut session, NodeKind::Trigger);

    assert_eq!(
        errors(&session.validate()),
        vec![FindingKind::MultipleEntryPoints]
    );
}

#[test]
fn zero_triggers_always_error() {
    let mut session = PlaybookSession::default();
    let a = add(&mut session, NodeKind::Action);
    let c = add(&mut session, NodeKind::Condition);
    session.add_edge(c, a, Some(Branch::True)).unwrap();

    assert!(errors(&session.validate()).contains(&FindingKind::NoEntryPoint));
}

#[test]
fn terminal_action_ends_simulation_completed() {
    let mut session = PlaybookSession::default();
    let trigger = add(&mut session, NodeKind::Trigger);
    let condition = add(&mut session, NodeKind::Condition);
    let middle = add(&mut session, NodeKind::Action);
    let terminal = add(&mut session, NodeKind::Action);
    session.add_edge(trigger, condition, None).unwrap();
    session.add_edge(condition, middle, Some(Branch::True)).unwrap();
    session.add_edge(middle, terminal, None).unwrap();

    let simulation = simulate_default(session.playbook());
    let last = simulation.steps().last().unwrap();

    assert_eq!((last.node_id, last.status), (terminal, NodeStatus::Completed));
}

#[test]
fn undo_all_then_redo_all_restores_every_state() {
    let mut session = PlaybookSession::default();
    let mut states = vec![session.playbook().clone()];

    let trigger = add(&mut session, NodeKind::Trigger);
    states.push(session.playbook().clone());
    let condition = add(&mut session, NodeKind::Condition);
    states.push(session.playbook().clone());
    let action = add(&mut session, NodeKind::Action);
    states.push(session.playbook().clone());
    session.add_edge(trigger, condition, None).unwrap();
    states.push(session.playbook().clone());
    let edge = session.add_edge(condition, action, Some(Branch::True)).unwrap();
    states.push(session.playbook().clone());
    session.update_node_data(&action, NodeKind::Action.default_data()).unwrap();
    states.push(session.playbook().clone());
    let copy = session.duplicate_node(&action).unwrap();
    states.push(session.playbook().clone());
    session.remove_edge(&edge).unwrap();
    states.push(session.playbook().clone());
    session.remove_node(&copy).unwrap();
    states.push(session.playbook().clone());

    let mutations = states.len() - 1;
    for expected in states.iter().rev().skip(1) {
        assert_eq!(session.undo(), Some(expected));
    }
    assert!(session.playbook().is_empty());
    assert_eq!(session.undo(), None);

    for expected in states.iter().skip(1) {
        assert_eq!(session.redo(), Some(expected));
    }
    assert_eq!(session.redo(), None);
    assert_eq!(session.playbook(), &states[mutations]);
}

#[test]
fn failed_mutations_do_not_touch_history() {
    let mut session = PlaybookSession::default();
    let a = add(&mut session, NodeKind::Action);

    assert_eq!(
        session.add_edge(a, a, None),
        Err(GraphError::SelfLoop(a))
    );
    assert!(session
        .update_node_data(&a, NodeKind::Trigger.default_data())
        .is_err());

    assert!(session.undo().is_some());
    assert!(!session.can_undo());
}

#[test]
fn moving_a_node_is_not_undoable() {
    let mut session = PlaybookSession::default();
    let a = add(&mut session, NodeKind::Action);

    session.move_node(&a, Position::new(300.0, 120.0)).unwrap();
    assert_eq!(
        session.playbook().node(&a).map(|n| n.position),
        Some(Position::new(300.0, 120.0))
    );

    // The only entry is the add itself, recorded at the original position.
    session.undo();
    assert!(session.playbook().is_empty());
    let redone = session.redo().unwrap();
    assert_eq!(redone.node(&a).map(|n| n.position), Some(Position::default()));
}

#[test]
fn save_and_reload_slot() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    session.load_template(TemplateKind::MalwareContainment);
    let saved = session.playbook().clone();

    let path = session.save().unwrap();
    assert!(path.starts_with(dir.path()));

    let mut other = session_in(dir.path());
    other.load_from_slot().unwrap();
    assert_eq!(other.name(), "Malware Containment");
    assert_eq!(other.playbook(), &saved);
    assert!(!other.can_undo());
}

#[test]
fn later_save_overwrites_slot() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    session.load_template(TemplateKind::PhishingTriage);
    session.save().unwrap();
    session.load_template(TemplateKind::BruteForceLockout);
    session.save().unwrap();

    let document = session.save_slot().read().unwrap().unwrap();
    assert_eq!(document.name, "Brute-Force Lockout");
}

#[test]
fn save_blocked_on_errors() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    add(&mut session, NodeKind::Action);

    assert!(matches!(session.save(), Err(SessionError::SaveBlocked(_))));
    assert!(session.save_slot().read().unwrap().is_none());
}

#[test]
fn load_from_empty_slot() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());

    assert!(matches!(session.load_from_slot(), Err(SessionError::EmptySaveSlot)));
}

#[test]
fn export_then_import_file() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("playbook.json");
    let mut session = session_in(dir.path());
    session.load_template(TemplateKind::PhishingTriage);
    session.rename("Phishing v2");
    session.export_file(&file).unwrap();

    let mut other = session_in(dir.path());
    other.import_file(&file).unwrap();

    assert_eq!(other.name(), "Phishing v2");
    assert_eq!(other.playbook(), session.playbook());
}

#[test]
fn failed_import_leaves_session_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("broken.json");
    std::fs::write(&file, r#"{"name": "Broken", "nodes": [{"id": "not-a-uuid"}], "edges": []}"#)
        .unwrap();

    let mut session = session_in(dir.path());
    let trigger = add(&mut session, NodeKind::Trigger);
    let before = session.playbook().clone();

    let result = session.import_file(&file);

    assert!(matches!(
        result,
        Err(SessionError::Document(DocumentError::MalformedDocument(_)))
    ));
    assert_eq!(session.playbook(), &before);
    assert_eq!(session.name(), DEFAULT_PLAYBOOK_NAME);
    assert!(session.playbook().contains_node(&trigger));
    assert!(session.can_undo());
}

#[test]
fn import_of_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());

    let result = session.import_file(&dir.path().join("absent.json"));

    assert!(matches!(result, Err(SessionError::Document(DocumentError::Io { .. }))));
}

#[test]
fn automation_export_gated_on_validation() {
    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("automation.json");
    let mut session = session_in(dir.path());
    add(&mut session, NodeKind::Condition);

    assert!(matches!(
        session.export_automation_file(&out),
        Err(SessionError::Export(ExportError::Blocked(_)))
    ));
    assert!(!out.exists());

    session.load_template(TemplateKind::BruteForceLockout);
    session.export_automation_file(&out).unwrap();
    let text = std::fs::read_to_string(&out).unwrap();
    assert!(text.contains("\"decision\""));
}

#[tokio::test(start_paused = true)]
async fn test_run_blocked_on_errors() {
    let mut session = PlaybookSession::default();
    add(&mut session, NodeKind::Action);

    let result = session.start_test(&mut AlwaysTrue);

    assert!(matches!(result, Err(SessionError::TestBlocked(_))));
    assert!(session.test_run().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_run_plays_to_completion() {
    let dir = tempfile::tempdir().unwrap();
    let mut session = session_in(dir.path());
    let trigger = add(&mut session, NodeKind::Trigger);
    let action = add(&mut session, NodeKind::Action);
    session.add_edge(trigger, action, None).unwrap();

    let handle = session.start_test(&mut AlwaysTrue).unwrap();
    let mut active = Vec::new();
    while let Some(event) = handle.next_event().await {
        match event {
            SimulationEvent::Step { active: Some(id), .. } => active.push(id),
            SimulationEvent::Step { .. } => {}
            SimulationEvent::Finished => break,
        }
    }

    assert_eq!(active, vec![trigger, action]);
    let statuses = session.stop_test().unwrap();
    assert_eq!(statuses.get(&action), Some(&NodeStatus::Completed));
}

#[tokio::test(start_paused = true)]
async fn new_test_run_replaces_previous() {
    let mut session = PlaybookSession::default();
    let trigger = add(&mut session, NodeKind::Trigger);
    let action = add(&mut session, NodeKind::Action);
    session.add_edge(trigger, action, None).unwrap();

    session.start_test(&mut AlwaysTrue).unwrap().next_event().await;
    let handle = session.start_test(&mut AlwaysTrue).unwrap();

    let first = handle.next_event().await;
    assert!(matches!(
        first,
        Some(SimulationEvent::Step { step, .. }) if step.node_id == trigger && step.status == NodeStatus::Running
    ));
}

#[tokio::test(start_paused = true)]
async fn editing_stops_the_test_run() {
    let mut session = PlaybookSession::default();
    let trigger = add(&mut session, NodeKind::Trigger);
    let action = add(&mut session, NodeKind::Action);
    session.add_edge(trigger, action, None).unwrap();
    session.start_test(&mut AlwaysTrue).unwrap();

    add(&mut session, NodeKind::Action);

    assert!(session.test_run().is_none());
}

#[test]
fn non_finite_position_fails_save_and_export() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("playbook.json");
    let mut session = session_in(dir.path());
    session.load_template(TemplateKind::BruteForceLockout);
    let id = session.playbook().nodes[0].id;
    session.move_node(&id, Position::new(f64::NAN, 80.0)).unwrap();

    assert!(matches!(
        session.save(),
        Err(SessionError::Document(DocumentError::MalformedDocument(_)))
    ));
    assert!(session.save_slot().read().unwrap().is_none());
    assert!(session.export_file(&file).is_err());
    assert!(!file.exists());
}

#[tokio::test(start_paused = true)]
async fn moving_a_node_stops_the_test_run() {
    let mut session = PlaybookSession::default();
    let trigger = add(&mut session, NodeKind::Trigger);
    let action = add(&mut session, NodeKind::Action);
    session.add_edge(trigger, action, None).unwrap();
    session.start_test(&mut AlwaysTrue).unwrap();

    session.move_node(&action, Position::new(10.0, 10.0)).unwrap();

    assert!(session.test_run().is_none());
}
