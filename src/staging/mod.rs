//! Staged changes: planning, conflicts, records and their application.

mod apply;
mod conflict;
mod planner;
mod record;

pub use apply::{apply_records, commit_index, modified_definitions, refresh_files, retangle};
pub use conflict::{settle, Conflict, ConflictChoice, ConflictResolver, FixedChoice};
pub use planner::plan_changes;
pub use record::{
    ChangeRecord, ChangeSet, ChangeSetSummary, HistoryEntry, StagingHistory, CHANGES_DIR,
    STAGING_FILE,
};
