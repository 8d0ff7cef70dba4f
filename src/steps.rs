//! The ordered deployment steps.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

/// One step of a deployment, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    #[strum(serialize = "Update package index")]
    UpdatePackageIndex,
    #[strum(serialize = "Ensure interpreter")]
    EnsureInterpreter,
    #[strum(serialize = "Create environment")]
    CreateEnvironment,
    #[strum(serialize = "Install dependencies")]
    InstallDependencies,
    #[strum(serialize = "Ensure data directories")]
    EnsureDataDirs,
    #[strum(serialize = "Check env file")]
    CheckEnvFile,
    #[strum(serialize = "Install service")]
    InstallService,
}

impl Step {
    /// 1-based position shown in progress output ("[3/7]")
    pub fn number(self) -> usize {
        Self::iter().position(|s| s == self).map_or(0, |i| i + 1)
    }

    /// Total number of steps in a full deployment
    pub fn count() -> usize {
        Self::iter().count()
    }

    /// Steps that only talk to the OS package manager
    pub fn uses_apt(self) -> bool {
        matches!(self, Self::UpdatePackageIndex | Self::EnsureInterpreter)
    }
}
