//! Command-line front end over the playbook core.

use crate::config::DesignerConfig;
use crate::document::{playbook_from_json, to_document};
use crate::session::PlaybookSession;
use crate::simulation::{FixedBranches, NodeStatus, SimulationEvent};
use crate::templates::{build_template, TemplateKind};
use crate::types::{Branch, NodeId, Playbook};
use crate::validation::has_errors;
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Design, check and test incident-response playbooks.
#[derive(Debug, Parser)]
#[command(name = "playbook-designer", version, about)]
pub struct Cli {
    /// Path to a TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print validation findings; exits non-zero on errors
    Validate {
        /// Playbook document to check
        file: PathBuf,
    },
    /// Print the simulated execution timeline
    Simulate {
        /// Playbook document to run
        file: PathBuf,
        /// Force a condition's branch, as `<node-id>=true|false`
        #[arg(long = "branch", value_parser = parse_branch_override)]
        branches: Vec<(NodeId, Branch)>,
        /// Play the run back in real time instead of printing it at once
        #[arg(long)]
        realtime: bool,
    },
    /// Write the automation-format export of a playbook
    Export {
        /// Playbook document to export
        file: PathBuf,
        /// Output path
        #[arg(long, short)]
        out: PathBuf,
    },
    /// Write a built-in template as a playbook document
    Template {
        /// Template to write
        #[arg(value_enum)]
        kind: TemplateKind,
        /// Output path
        #[arg(long, short)]
        out: PathBuf,
    },
    /// Validate a playbook document and store it in the save slot
    Save {
        /// Playbook document to store
        file: PathBuf,
    },
    /// Print the document held in the save slot
    ShowSlot,
}

fn parse_branch_override(raw: &str) -> Result<(NodeId, Branch), String> {
    let (id, branch) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <node-id>=true|false, got '{raw}'"))?;
    let id = id.trim().parse::<NodeId>().map_err(|e| e.to_string())?;
    Ok((id, branch.parse()?))
}

/// Parses arguments and runs the selected command.
pub async fn run() -> Result<()> {
    let cli = Cli::parse();
    let config = DesignerConfig::load(cli.config.as_deref())?;
    execute(cli.command, config).await
}

/// Runs one command against the given configuration.
pub async fn execute(command: Command, config: DesignerConfig) -> Result<()> {
    let mut session = PlaybookSession::new(config);
    match command {
        Command::Validate { file } => {
            session.import_file(&file)?;
            let findings = session.validate();
            if findings.is_empty() {
                println!("{}: no findings", session.name());
            }
            for finding in &findings {
                println!("{finding}");
            }
            if has_errors(&findings) {
                bail!("'{}' has validation errors", session.name());
            }
        }
        Command::Simulate {
            file,
            branches,
            realtime,
        } => {
            session.import_file(&file)?;
            let mut policy = branches
                .into_iter()
                .fold(FixedBranches::new(Branch::True), |policy, (id, branch)| {
                    policy.with(id, branch)
                });
            if realtime {
                play_realtime(&mut session, &mut policy).await?;
            } else {
                let simulation = session.simulate(&mut policy);
                for step in simulation.steps() {
                    println!(
                        "{:>10} {:<28} {:?}",
                        status_name(step.status),
                        node_label(session.playbook(), &step.node_id),
                        step.duration
                    );
                }
                println!("total {:?}", simulation.total_duration());
            }
        }
        Command::Export { file, out } => {
            session.import_file(&file)?;
            session
                .export_automation_file(&out)
                .with_context(|| format!("exporting to {}", out.display()))?;
            println!("Wrote {}", out.display());
        }
        Command::Template { kind, out } => {
            let (name, playbook) = build_template(kind);
            write_json(&out, &to_document(&playbook, name).to_json()?)?;
            println!("Wrote template '{name}' to {}", out.display());
        }
        Command::Save { file } => {
            session.import_file(&file)?;
            let path = session.save()?;
            println!("Saved '{}' to {}", session.name(), path.display());
        }
        Command::ShowSlot => match session.save_slot().read()? {
            Some(document) => {
                // Round-trip through the graph checks the slot is still loadable.
                let json = document.to_json()?;
                playbook_from_json(&json)?;
                println!("{json}");
            }
            None => println!("Save slot is empty"),
        },
    }
    Ok(())
}

async fn play_realtime(session: &mut PlaybookSession, policy: &mut FixedBranches) -> Result<()> {
    let playbook = session.playbook().clone();
    let handle = session.start_test(policy)?;
    while let Some(event) = handle.next_event().await {
        match event {
            SimulationEvent::Step { step, .. } => println!(
                "{:>10} {}",
                status_name(step.status),
                node_label(&playbook, &step.node_id)
            ),
            SimulationEvent::Finished => break,
        }
    }
    session.stop_test();
    Ok(())
}

fn status_name(status: NodeStatus) -> &'static str {
    match status {
        NodeStatus::Pending => "pending",
        NodeStatus::Running => "running",
        NodeStatus::Completed => "completed",
        NodeStatus::Blocked => "blocked",
    }
}

fn node_label(playbook: &Playbook, id: &NodeId) -> String {
    playbook
        .node(id)
        .map(|n| n.data.label().to_string())
        .unwrap_or_else(|| id.to_string())
}

fn write_json(path: &Path, json: &str) -> Result<()> {
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))
}
