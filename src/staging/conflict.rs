//! The decision point when a generated file and its prose definition disagree.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::{EntwineError, Result};
use crate::model::ReferenceName;

/// How to settle one disagreement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "clap", derive(clap::ValueEnum))]
pub enum ConflictChoice {
    /// Keep what the generated file says.
    TakeTarget,
    /// Keep what the prose says.
    TakeBase,
    /// Ask [`ConflictResolver::merge`] for the content.
    ManualMerge,
}

/// A block whose generated copy differs from its definition.
#[derive(Debug, Clone, Copy)]
pub struct Conflict<'a> {
    pub name: &'a ReferenceName,
    /// Generated file the other side was read from.
    pub target_file: &'a Path,
    /// Content from the prose, with earlier choices already folded in.
    pub base: &'a str,
    /// Content read back from the generated file.
    pub other: &'a str,
}

/// Supplied by the caller; staging blocks on it for every conflict.
pub trait ConflictResolver {
    fn choose(&mut self, conflict: &Conflict<'_>) -> ConflictChoice;

    /// Produces merged content for [`ConflictChoice::ManualMerge`].
    fn merge(&mut self, base: &str, other: &str) -> Result<String>;
}

/// Answers every conflict the same way. Cannot merge by hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedChoice(pub ConflictChoice);

impl ConflictResolver for FixedChoice {
    fn choose(&mut self, _conflict: &Conflict<'_>) -> ConflictChoice {
        self.0
    }

    fn merge(&mut self, _base: &str, _other: &str) -> Result<String> {
        Err(EntwineError::Other(
            "manual merge needs an interactive resolver".to_string(),
        ))
    }
}

/// Folds one conflict into the running content.
pub fn settle(resolver: &mut (impl ConflictResolver + ?Sized), conflict: &Conflict<'_>) -> Result<String> {
    let choice = resolver.choose(conflict);
    tracing::info!(
        "'{}' differs in {}: {:?}",
        conflict.name,
        conflict.target_file.display(),
        choice
    );
    match choice {
        ConflictChoice::TakeTarget => Ok(conflict.other.to_string()),
        ConflictChoice::TakeBase => Ok(conflict.base.to_string()),
        ConflictChoice::ManualMerge => resolver.merge(conflict.base, conflict.other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Joiner;

    impl ConflictResolver for Joiner {
        fn choose(&mut self, _conflict: &Conflict<'_>) -> ConflictChoice {
            ConflictChoice::ManualMerge
        }

        fn merge(&mut self, base: &str, other: &str) -> Result<String> {
            Ok(format!("{}\n{}", base, other))
        }
    }

    fn conflict<'a>(name: &'a ReferenceName) -> Conflict<'a> {
        Conflict {
            name,
            target_file: Path::new("out.py"),
            base: "prose",
            other: "target",
        }
    }

    #[test]
    fn test_fixed_choices() {
        let name = ReferenceName::new("a");
        assert_eq!(
            settle(&mut FixedChoice(ConflictChoice::TakeTarget), &conflict(&name)).unwrap(),
            "target"
        );
        assert_eq!(
            settle(&mut FixedChoice(ConflictChoice::TakeBase), &conflict(&name)).unwrap(),
            "prose"
        );
        assert!(settle(&mut FixedChoice(ConflictChoice::ManualMerge), &conflict(&name)).is_err());
    }

    #[test]
    fn test_manual_merge_calls_back() {
        let name = ReferenceName::new("a");
        assert_eq!(settle(&mut Joiner, &conflict(&name)).unwrap(), "prose\ntarget");
    }
}
