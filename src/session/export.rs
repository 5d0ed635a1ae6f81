//! Export of the session's playbook to the automation format.

use super::PlaybookSession;
use crate::automation::{to_automation_format, ExternalSpec};
use crate::error::{DocumentError, SessionError};
use std::path::Path;

impl PlaybookSession {
    /// Converts the playbook to the automation format, re-validating first.
    pub fn export_automation(&self) -> Result<ExternalSpec, SessionError> {
        Ok(to_automation_format(&self.playbook, &self.name)?)
    }

    /// Writes the automation export to `path`.
    pub fn export_automation_file(&self, path: &Path) -> Result<(), SessionError> {
        let spec = self.export_automation()?;
        let json = spec.to_json().map_err(DocumentError::Encode)?;
        std::fs::write(path, json).map_err(|source| DocumentError::Io {
            path: path.display().to_string(),
            source,
        })?;
        log::info!("Exported automation spec for '{}' to {}", self.name, path.display());
        Ok(())
    }
}
