//! Built-in playbook templates that can be quickly loaded into a session.
//!
//! This module defines a few curated incident-response playbooks, from a
//! straight containment sequence to multi-branch triage, to help new users
//! get started.

use crate::types::*;
use serde_json::json;

/// Kinds of built-in templates available from the gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TemplateKind {
    /// Reported email -> blocklist check -> sandbox -> verdict
    PhishingTriage,
    /// EDR alert -> isolate -> collect evidence -> escalate by asset criticality
    MalwareContainment,
    /// Repeated login failures -> lock account or block source
    BruteForceLockout,
}

/// Metadata for a single template.
pub struct TemplateInfo {
    /// Stable identifier for the template
    pub kind: TemplateKind,
    /// Human-friendly display name
    pub name: &'static str,
}

/// Returns all templates with their display names.
pub const fn all_templates() -> &'static [TemplateInfo] {
    const TEMPLATES: &[TemplateInfo] = &[
        TemplateInfo {
            kind: TemplateKind::PhishingTriage,
            name: "Phishing Triage",
        },
        TemplateInfo {
            kind: TemplateKind::MalwareContainment,
            name: "Malware Containment",
        },
        TemplateInfo {
            kind: TemplateKind::BruteForceLockout,
            name: "Brute-Force Lockout",
        },
    ];
    TEMPLATES
}

/// Builds a template playbook, returning it with its display name.
pub fn build_template(kind: TemplateKind) -> (&'static str, Playbook) {
    let name = all_templates()
        .iter()
        .find(|info| info.kind == kind)
        .map(|info| info.name)
        .unwrap_or("Template");
    let playbook = match kind {
        TemplateKind::PhishingTriage => build_phishing_triage(),
        TemplateKind::MalwareContainment => build_malware_containment(),
        TemplateKind::BruteForceLockout => build_brute_force_lockout(),
    };
    (name, playbook)
}

fn trigger(label: &str, trigger_type: &str, filter: Option<&str>) -> NodeData {
    NodeData::Trigger(TriggerConfig {
        label: label.into(),
        trigger_type: trigger_type.into(),
        filter: filter.map(String::from),
    })
}

fn condition(label: &str, expression: &str) -> NodeData {
    NodeData::Condition(ConditionConfig {
        label: label.into(),
        expression: expression.into(),
    })
}

fn action(label: &str, action_type: &str, parameters: serde_json::Value) -> NodeData {
    NodeData::Action(ActionConfig {
        label: label.into(),
        action_type: action_type.into(),
        parameters: parameters.as_object().cloned().unwrap_or_default(),
    })
}

/// Links two template nodes. Template nodes always exist and are distinct.
fn link(pb: &mut Playbook, from: NodeId, to: NodeId, label: Option<Branch>) {
    if let Err(e) = pb.add_edge(from, to, label) {
        log::error!("Template edge rejected: {e}");
    }
}

fn build_phishing_triage() -> Playbook {
    let mut pb = Playbook::new();

    let reported = pb.add_node(
        trigger("Phishing email reported", "email_report", None),
        Position::new(80.0, 200.0),
    );
    let blocklisted = pb.add_node(
        condition("Sender on blocklist?", "email.sender_domain in threat_intel.blocklist"),
        Position::new(300.0, 200.0),
    );
    let quarantine = pb.add_node(
        action("Quarantine email", "quarantine_email", json!({"scope": "all_mailboxes"})),
        Position::new(540.0, 100.0),
    );
    let detonate = pb.add_node(
        action("Detonate attachments", "sandbox_detonate", json!({"timeout_s": 300})),
        Position::new(540.0, 300.0),
    );
    let malicious = pb.add_node(
        condition("Verdict malicious?", "sandbox.verdict == 'malicious'"),
        Position::new(760.0, 300.0),
    );
    let block_sender = pb.add_node(
        action("Block sender domain", "block_domain", json!({"list": "mail_gateway"})),
        Position::new(980.0, 220.0),
    );
    let close = pb.add_node(
        action("Close as benign", "close_ticket", json!({"resolution": "false_positive"})),
        Position::new(980.0, 380.0),
    );

    link(&mut pb, reported, blocklisted, None);
    link(&mut pb, blocklisted, quarantine, Some(Branch::True));
    link(&mut pb, blocklisted, detonate, Some(Branch::False));
    link(&mut pb, detonate, malicious, None);
    link(&mut pb, malicious, block_sender, Some(Branch::True));
    link(&mut pb, malicious, close, Some(Branch::False));

    pb
}

fn build_malware_containment() -> Playbook {
    let mut pb = Playbook::new();

    let alert = pb.add_node(
        trigger("EDR malware alert", "edr_alert", Some("severity >= 'high'")),
        Position::new(80.0, 200.0),
    );
    let isolate = pb.add_node(
        action("Isolate host", "isolate_host", json!({"host": "{{alert.hostname}}"})),
        Position::new(300.0, 200.0),
    );
    let collect = pb.add_node(
        action("Collect forensic image", "collect_evidence", json!({"artifacts": ["memory", "disk"]})),
        Position::new(520.0, 200.0),
    );
    let critical = pb.add_node(
        condition("Critical asset?", "asset.criticality == 'critical'"),
        Position::new(740.0, 200.0),
    );
    let page = pb.add_node(
        action("Page on-call responder", "page", json!({"rotation": "ir-primary"})),
        Position::new(960.0, 120.0),
    );
    let ticket = pb.add_node(
        action("Open incident ticket", "create_ticket", json!({"priority": "P3"})),
        Position::new(960.0, 280.0),
    );

    link(&mut pb, alert, isolate, None);
    link(&mut pb, isolate, collect, None);
    link(&mut pb, collect, critical, None);
    link(&mut pb, critical, page, Some(Branch::True));
    link(&mut pb, critical, ticket, Some(Branch::False));

    pb
}

fn build_brute_force_lockout() -> Playbook {
    let mut pb = Playbook::new();

    let failures = pb.add_node(
        trigger("Repeated login failures", "auth_failures", Some("count > 10 within 5m")),
        Position::new(80.0, 200.0),
    );
    let privileged = pb.add_node(
        condition("Privileged account?", "user.groups contains 'admins'"),
        Position::new(300.0, 200.0),
    );
    let disable = pb.add_node(
        action("Disable account", "disable_account", json!({"user": "{{alert.username}}"})),
        Position::new(520.0, 120.0),
    );
    let reset = pb.add_node(
        action("Force password reset", "reset_password", json!({"notify_user": true})),
        Position::new(740.0, 120.0),
    );
    let block = pb.add_node(
        action("Block source IP", "block_ip", json!({"ip": "{{alert.src_ip}}", "duration": "24h"})),
        Position::new(520.0, 280.0),
    );

    link(&mut pb, failures, privileged, None);
    link(&mut pb, privileged, disable, Some(Branch::True));
    link(&mut pb, disable, reset, None);
    link(&mut pb, privileged, block, Some(Branch::False));

    pb
}
