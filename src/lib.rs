//! # Playbook Designer
//!
//! The core of a visual editor for incident-response automation playbooks:
//! directed graphs built from three kinds of nodes:
//! - **Triggers**: the single entry point of a playbook
//! - **Conditions**: two-way branches through `true`/`false` edges
//! - **Actions**: response steps
//!
//! ## Features
//! - Graph model with checked edge endpoints
//! - Bounded snapshot undo/redo history
//! - Structural validation (entry points, cycles, orphans, branch coverage)
//! - Deterministic execution simulation with real-time, pausable playback
//! - JSON save slot, file import/export, and export to an automation format
//!
//! The canvas and palette sit outside this crate: they drive a
//! [`PlaybookSession`] and render its [`Playbook`].

#![warn(missing_docs)]
#![deny(unsafe_code)]

mod automation;
pub mod cli;
mod config;
mod constants;
mod document;
mod error;
mod history;
mod session;
mod simulation;
mod templates;
mod types;
mod validation;

// Re-export public types and functions
pub use automation::*;
pub use config::*;
pub use constants::*;
pub use document::*;
pub use error::*;
pub use history::*;
pub use session::*;
pub use simulation::*;
pub use templates::*;
pub use types::*;
pub use validation::*;

/// Runs the command-line interface.
///
/// # Example
///
/// ```no_run
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     playbook_designer::run_cli().await
/// }
/// ```
pub async fn run_cli() -> anyhow::Result<()> {
    cli::run().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_default() {
        let session = PlaybookSession::default();
        assert!(session.playbook().is_empty());
        assert!(!session.can_undo());
        assert_eq!(session.name(), DEFAULT_PLAYBOOK_NAME);
    }
}
