//! Shared application-wide constants.
//! Centralizes tweakable values used across the editing session, simulator and storage.

// Undo/redo
/// Maximum number of undo history entries to retain.
pub const MAX_UNDO_HISTORY: usize = 50;

// Graph editing
/// Offset (in canvas units) applied to a duplicated node so it does not sit on top of the original.
pub const DUPLICATE_OFFSET: (f64, f64) = (40.0, 40.0);

// Simulation timing
/// Base simulated duration of a trigger node, in milliseconds.
pub const TRIGGER_DURATION_MS: u64 = 400;
/// Base simulated duration of a condition node, in milliseconds.
pub const CONDITION_DURATION_MS: u64 = 600;
/// Base simulated duration of an action node, in milliseconds.
pub const ACTION_DURATION_MS: u64 = 1000;
/// Upper bound of the random jitter added to every simulated duration, in milliseconds.
pub const MAX_JITTER_MS: u64 = 250;

// Storage
/// Key of the single local save slot. Doubles as the file stem on disk.
pub const SAVE_SLOT_KEY: &str = "playbook-designer.current";
/// Directory name used under the platform data/config directories.
pub const APP_DIR_NAME: &str = "playbook-designer";
/// Name given to playbooks that have not been named yet.
pub const DEFAULT_PLAYBOOK_NAME: &str = "Untitled Playbook";
