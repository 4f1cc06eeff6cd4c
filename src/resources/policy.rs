//! Conflict policy: what to do when a deployment target is occupied.
//!
//! The decision is separated from the prompt: [`ConflictPolicy::from_mode`]
//! is a pure mapping for non-interactive modes, and [`PolicyDecider`] asks a
//! [`Prompter`] only in `ask` mode.
use anyhow::Result;
use std::fmt;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use crate::prompt::Prompter;

/// Action for a single occupied target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictPolicy {
    /// Leave the existing target untouched.
    Skip,
    /// Remove the existing target without a backup.
    Overwrite,
    /// Back up the existing target, then replace it.
    Backup,
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Skip => write!(f, "skip"),
            Self::Overwrite => write!(f, "overwrite"),
            Self::Backup => write!(f, "backup"),
        }
    }
}

/// Run-wide conflict mode selected on the command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum ConflictMode {
    /// Skip every occupied target.
    Skip,
    /// Overwrite every occupied target.
    Overwrite,
    /// Back up and replace every occupied target.
    #[default]
    Backup,
    /// Ask for each occupied target.
    Ask,
}

impl ConflictPolicy {
    /// Policy implied by `mode`, or `None` when the user must be asked.
    #[must_use]
    pub const fn from_mode(mode: ConflictMode) -> Option<Self> {
        match mode {
            ConflictMode::Skip => Some(Self::Skip),
            ConflictMode::Overwrite => Some(Self::Overwrite),
            ConflictMode::Backup => Some(Self::Backup),
            ConflictMode::Ask => None,
        }
    }
}

/// Suffix marking a choice that applies to every remaining conflict.
const FOR_ALL_SUFFIX: &str = " all";

/// Choices offered in `ask` mode; the first is the default.
fn choices() -> Vec<String> {
    [
        ConflictPolicy::Backup,
        ConflictPolicy::Overwrite,
        ConflictPolicy::Skip,
    ]
    .iter()
    .flat_map(|p| [p.to_string(), format!("{p}{FOR_ALL_SUFFIX}")])
    .collect()
}

/// Parse a prompt answer into a policy and whether it is remembered.
#[must_use]
pub fn parse_choice(choice: &str) -> Option<(ConflictPolicy, bool)> {
    let (name, sticky) = choice
        .strip_suffix(FOR_ALL_SUFFIX)
        .map_or((choice, false), |name| (name, true));
    let policy = match name {
        "skip" => ConflictPolicy::Skip,
        "overwrite" => ConflictPolicy::Overwrite,
        "backup" => ConflictPolicy::Backup,
        _ => return None,
    };
    Some((policy, sticky))
}

/// Decides the policy for each occupied target during one run.
pub struct PolicyDecider {
    mode: ConflictMode,
    prompter: Arc<dyn Prompter>,
    remembered: Mutex<Option<ConflictPolicy>>,
}

impl fmt::Debug for PolicyDecider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyDecider")
            .field("mode", &self.mode)
            .field("remembered", &self.remembered)
            .finish_non_exhaustive()
    }
}

impl PolicyDecider {
    /// Create a decider for `mode`.
    #[must_use]
    pub fn new(mode: ConflictMode, prompter: Arc<dyn Prompter>) -> Self {
        Self {
            mode,
            prompter,
            remembered: Mutex::new(None),
        }
    }

    /// Mode this decider was created with.
    #[must_use]
    pub const fn mode(&self) -> ConflictMode {
        self.mode
    }

    /// Policy for the occupied `target`, described by `current`.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt fails or returns an unknown choice.
    pub fn decide(&self, target: &Path, current: &str) -> Result<ConflictPolicy> {
        if let Some(policy) = ConflictPolicy::from_mode(self.mode) {
            return Ok(policy);
        }

        let mut remembered = self
            .remembered
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(policy) = *remembered {
            return Ok(policy);
        }

        let prompt = format!("{} already exists ({current})", target.display());
        let answer = self.prompter.ask_choice(&prompt, &choices())?;
        let (policy, sticky) = parse_choice(&answer)
            .ok_or_else(|| anyhow::anyhow!("unknown conflict choice '{answer}'"))?;
        if sticky {
            *remembered = Some(policy);
        }
        Ok(policy)
    }
}
