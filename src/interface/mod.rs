//! High-level interface for entwine operations.

mod workspace;

pub use workspace::{ApplyResult, Workspace, CONFIG_FILE, MARKER_DIR};
