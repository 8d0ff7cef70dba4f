//! Provisioning State Machine
//!
//! Rust-side source of truth for deployment progress. It enforces valid
//! state transitions and makes it impossible to skip steps programmatically.
//!
//! # Stage Flow
//!
//! ```text
//! NotStarted
//!     ↓
//! UpdatingPackageIndex
//!     ↓
//! EnsuringInterpreter
//!     ↓
//! CreatingEnvironment
//!     ↓
//! InstallingDependencies
//!     ↓
//! PreparingDataDirs
//!     ↓
//! CheckingEnvFile
//!     ↓
//! InstallingService
//!     ↓
//! Completed
//!
//! (Any non-terminal stage can transition to Failed)
//! ```

use std::fmt;

use thiserror::Error;

use crate::steps::Step;

/// Provisioning stages in sequential order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProvisionStage {
    NotStarted = 0,
    UpdatingPackageIndex = 1,
    EnsuringInterpreter = 2,
    CreatingEnvironment = 3,
    InstallingDependencies = 4,
    PreparingDataDirs = 5,
    /// Last point at which the run can stop without touching the service
    CheckingEnvFile = 6,
    InstallingService = 7,
    /// Terminal state
    Completed = 8,
    /// Terminal state; the failing stage is kept in `ProvisionContext::failed_at`
    Failed = 255,
}

impl ProvisionStage {
    #[inline]
    pub const fn order(self) -> u8 {
        self as u8
    }

    /// Returns true if this is a terminal state (Completed or Failed)
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns the next stage in the sequence, or None if at a terminal state
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::NotStarted => Some(Self::UpdatingPackageIndex),
            Self::UpdatingPackageIndex => Some(Self::EnsuringInterpreter),
            Self::EnsuringInterpreter => Some(Self::CreatingEnvironment),
            Self::CreatingEnvironment => Some(Self::InstallingDependencies),
            Self::InstallingDependencies => Some(Self::PreparingDataDirs),
            Self::PreparingDataDirs => Some(Self::CheckingEnvFile),
            Self::CheckingEnvFile => Some(Self::InstallingService),
            Self::InstallingService => Some(Self::Completed),
            Self::Completed | Self::Failed => None,
        }
    }

    /// The stage that executes `step`
    pub const fn for_step(step: Step) -> Self {
        match step {
            Step::UpdatePackageIndex => Self::UpdatingPackageIndex,
            Step::EnsureInterpreter => Self::EnsuringInterpreter,
            Step::CreateEnvironment => Self::CreatingEnvironment,
            Step::InstallDependencies => Self::InstallingDependencies,
            Step::EnsureDataDirs => Self::PreparingDataDirs,
            Step::CheckEnvFile => Self::CheckingEnvFile,
            Step::InstallService => Self::InstallingService,
        }
    }

    /// The step executed while in this stage, if any
    pub const fn step(self) -> Option<Step> {
        match self {
            Self::UpdatingPackageIndex => Some(Step::UpdatePackageIndex),
            Self::EnsuringInterpreter => Some(Step::EnsureInterpreter),
            Self::CreatingEnvironment => Some(Step::CreateEnvironment),
            Self::InstallingDependencies => Some(Step::InstallDependencies),
            Self::PreparingDataDirs => Some(Step::EnsureDataDirs),
            Self::CheckingEnvFile => Some(Step::CheckEnvFile),
            Self::InstallingService => Some(Step::InstallService),
            Self::NotStarted | Self::Completed | Self::Failed => None,
        }
    }

    /// Returns a human-readable description of this stage
    pub const fn description(self) -> &'static str {
        match self {
            Self::NotStarted => "Not started",
            Self::UpdatingPackageIndex => "Updating package index",
            Self::EnsuringInterpreter => "Ensuring interpreter",
            Self::CreatingEnvironment => "Creating virtual environment",
            Self::InstallingDependencies => "Installing dependencies",
            Self::PreparingDataDirs => "Preparing data directories",
            Self::CheckingEnvFile => "Checking env file",
            Self::InstallingService => "Installing service",
            Self::Completed => "Deployment complete",
            Self::Failed => "Deployment failed",
        }
    }
}

impl fmt::Display for ProvisionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// Errors that can occur during state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProvisionTransitionError {
    #[error("Cannot skip from {from} to {to} (must transition through intermediate stages)")]
    SkippedStage {
        from: ProvisionStage,
        to: ProvisionStage,
    },

    #[error("Cannot go backwards from {from} to {to} (provisioning is forward-only)")]
    BackwardTransition {
        from: ProvisionStage,
        to: ProvisionStage,
    },

    #[error("Cannot transition from terminal state {from}")]
    FromTerminalState { from: ProvisionStage },

    #[error("Already at stage {stage}")]
    AlreadyAtStage { stage: ProvisionStage },
}

/// Owns the current provisioning stage and validates every transition.
///
/// ```
/// use tryon_deploy::provision_state::{ProvisionContext, ProvisionStage};
///
/// let mut ctx = ProvisionContext::new();
/// ctx.advance().unwrap();
/// assert_eq!(ctx.current_stage(), ProvisionStage::UpdatingPackageIndex);
///
/// // Cannot skip stages
/// assert!(ctx.transition_to(ProvisionStage::InstallingService).is_err());
/// ```
#[derive(Debug, Clone)]
pub struct ProvisionContext {
    current: ProvisionStage,
    failed_at: Option<ProvisionStage>,
    /// (stage, unix timestamp) for every transition taken
    stage_history: Vec<(ProvisionStage, u64)>,
}

impl Default for ProvisionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ProvisionContext {
    pub fn new() -> Self {
        Self {
            current: ProvisionStage::NotStarted,
            failed_at: None,
            stage_history: Vec::with_capacity(Step::count() + 2),
        }
    }

    #[inline]
    pub fn current_stage(&self) -> ProvisionStage {
        self.current
    }

    #[inline]
    pub fn failed_at(&self) -> Option<ProvisionStage> {
        self.failed_at
    }

    #[inline]
    pub fn is_complete(&self) -> bool {
        self.current == ProvisionStage::Completed
    }

    #[inline]
    pub fn is_failed(&self) -> bool {
        self.current == ProvisionStage::Failed
    }

    pub fn stage_history(&self) -> &[(ProvisionStage, u64)] {
        &self.stage_history
    }

    /// Advance to the next stage in sequence.
    ///
    /// # Errors
    ///
    /// - `FromTerminalState` if already at Completed or Failed
    pub fn advance(&mut self) -> Result<ProvisionStage, ProvisionTransitionError> {
        let Some(next_stage) = self.current.next() else {
            return Err(ProvisionTransitionError::FromTerminalState { from: self.current });
        };

        self.record_stage_transition(next_stage);
        self.current = next_stage;

        Ok(next_stage)
    }

    /// Transition to a specific stage, which must be the next one in sequence.
    ///
    /// # Errors
    ///
    /// - `AlreadyAtStage` if target is the current stage
    /// - `BackwardTransition` if target is before current
    /// - `SkippedStage` if target is not the immediate next stage
    /// - `FromTerminalState` if current is a terminal state
    pub fn transition_to(
        &mut self,
        target: ProvisionStage,
    ) -> Result<ProvisionStage, ProvisionTransitionError> {
        if self.current.is_terminal() {
            return Err(ProvisionTransitionError::FromTerminalState { from: self.current });
        }

        if target == self.current {
            return Err(ProvisionTransitionError::AlreadyAtStage { stage: target });
        }

        // Failed is only reachable through fail()
        if target == ProvisionStage::Failed {
            return Err(ProvisionTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }

        if target.order() < self.current.order() {
            return Err(ProvisionTransitionError::BackwardTransition {
                from: self.current,
                to: target,
            });
        }

        if self.current.next() != Some(target) {
            return Err(ProvisionTransitionError::SkippedStage {
                from: self.current,
                to: target,
            });
        }

        self.record_stage_transition(target);
        self.current = target;

        Ok(target)
    }

    /// Mark the run as failed, remembering the stage it failed in.
    ///
    /// # Errors
    ///
    /// - `FromTerminalState` if already at Completed or Failed
    pub fn fail(&mut self) -> Result<(), ProvisionTransitionError> {
        if self.current.is_terminal() {
            return Err(ProvisionTransitionError::FromTerminalState { from: self.current });
        }

        self.failed_at = Some(self.current);
        self.record_stage_transition(ProvisionStage::Failed);
        self.current = ProvisionStage::Failed;

        Ok(())
    }

    fn record_stage_transition(&mut self, stage: ProvisionStage) {
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        self.stage_history.push((stage, timestamp));
    }
}

impl From<ProvisionTransitionError> for crate::error::DeployError {
    fn from(err: ProvisionTransitionError) -> Self {
        crate::error::DeployError::transition(err.to_string())
    }
}
