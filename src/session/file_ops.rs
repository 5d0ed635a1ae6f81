//! File operations for saving and loading playbooks.
//!
//! There is exactly one save slot, overwritten in place on every save. Files
//! can also be imported and exported as standalone `.json` documents. An
//! import is fully parsed and checked before it touches the session.

use super::PlaybookSession;
use crate::constants::SAVE_SLOT_KEY;
use crate::document::{from_document, to_document, Document};
use crate::error::{DocumentError, SessionError};
use crate::validation::has_errors;
use std::path::{Path, PathBuf};

/// The single persisted save slot.
#[derive(Debug, Clone)]
pub struct SaveSlot {
    path: PathBuf,
}

impl SaveSlot {
    /// Creates the slot inside `dir`. Nothing is touched on disk until the first write.
    pub fn new(dir: &Path) -> Self {
        Self {
            path: dir.join(format!("{SAVE_SLOT_KEY}.json")),
        }
    }

    /// Location of the slot on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrites the slot with `document`.
    pub fn write(&self, document: &Document) -> Result<(), DocumentError> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| io_error(dir, source))?;
        }
        write_document(&self.path, document)
    }

    /// Reads the slot back.
    ///
    /// # Returns
    ///
    /// `Ok(None)` if nothing has been saved yet.
    pub fn read(&self) -> Result<Option<Document>, DocumentError> {
        if !self.path.exists() {
            return Ok(None);
        }
        read_document(&self.path).map(Some)
    }
}

impl PlaybookSession {
    /// The save slot this session writes to.
    pub fn save_slot(&self) -> &SaveSlot {
        &self.save_slot
    }

    /// Saves the playbook into the save slot, replacing whatever was there.
    ///
    /// # Returns
    ///
    /// The slot path, or [`SessionError::SaveBlocked`] if validation reports errors.
    pub fn save(&self) -> Result<PathBuf, SessionError> {
        let findings = self.validate();
        if has_errors(&findings) {
            log::warn!("Save of '{}' blocked by validation errors", self.name);
            return Err(SessionError::SaveBlocked(findings));
        }

        self.save_slot.write(&to_document(&self.playbook, &self.name))?;
        log::info!("Saved '{}' to {}", self.name, self.save_slot.path().display());
        Ok(self.save_slot.path().to_path_buf())
    }

    /// Replaces the session's playbook with the one in the save slot.
    pub fn load_from_slot(&mut self) -> Result<(), SessionError> {
        let document = self.save_slot.read()?.ok_or(SessionError::EmptySaveSlot)?;
        let playbook = from_document(&document)?;
        self.replace(document.name, playbook);
        Ok(())
    }

    /// Writes the playbook to a standalone `.json` document.
    pub fn export_file(&self, path: &Path) -> Result<(), SessionError> {
        write_document(path, &to_document(&self.playbook, &self.name))?;
        log::info!("Exported '{}' to {}", self.name, path.display());
        Ok(())
    }

    /// Replaces the session's playbook with the document at `path`.
    ///
    /// On any failure the session is left exactly as it was.
    pub fn import_file(&mut self, path: &Path) -> Result<(), SessionError> {
        let text = std::fs::read_to_string(path).map_err(|source| io_error(path, source))?;
        self.import_json(&text).inspect_err(|e| {
            log::warn!("Rejected import of {}: {e}", path.display());
        })
    }

    /// Replaces the session's playbook with the document in `json`.
    ///
    /// On any failure the session is left exactly as it was.
    pub fn import_json(&mut self, json: &str) -> Result<(), SessionError> {
        let document = Document::from_json(json)?;
        let playbook = from_document(&document)?;
        self.replace(document.name, playbook);
        Ok(())
    }
}

/// Reads and parses a document file.
pub(crate) fn read_document(path: &Path) -> Result<Document, DocumentError> {
    let text = std::fs::read_to_string(path).map_err(|source| io_error(path, source))?;
    Document::from_json(&text)
}

fn write_document(path: &Path, document: &Document) -> Result<(), DocumentError> {
    let json = document.to_json()?;
    std::fs::write(path, json).map_err(|source| io_error(path, source))
}

fn io_error(path: &Path, source: std::io::Error) -> DocumentError {
    DocumentError::Io {
        path: path.display().to_string(),
        source,
    }
}
