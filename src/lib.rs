//! Entwine - Literate Programming Entanglement Engine
//!
//! This library keeps named code blocks in markdown documents and the source
//! files generated from them in step. Edits can happen on either side; the
//! workspace notices them, plans a change set, and applies it.
//!
//! # Features
//!
//! - **Status**: Classify files and blocks against the content index
//! - **Stage**: Plan a change set, asking a resolver when both sides changed
//! - **Apply**: Replay a change set, update the index and re-tangle targets
//! - **Log**: List every staged change set
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use entwine::interface::Workspace;
//! use entwine::staging::{ConflictChoice, FixedChoice};
//!
//! let mut workspace = Workspace::find(Path::new(".")).unwrap();
//! workspace
//!     .stage("sync docs", &mut FixedChoice(ConflictChoice::TakeBase))
//!     .unwrap();
//! workspace.apply_latest().unwrap();
//! ```

pub mod config;
pub mod errors;
pub mod index;
pub mod interface;
pub mod io;
pub mod model;
pub mod readers;
pub mod staging;
pub mod status;
pub mod text_location;

// Re-export commonly used types
pub use config::Config;
pub use errors::{EntwineError, Result};
pub use interface::{ApplyResult, Workspace};
pub use model::{NamedBlock, ReferenceName};
pub use staging::{ChangeRecord, ChangeSet, ConflictChoice, ConflictResolver};
pub use status::Status;
