//! tryon-deploy library
//!
//! Host provisioning for the virtual try-on Telegram bot: package index
//! refresh, interpreter install, virtualenv, dependencies, data directories,
//! env file check and systemd service installation, run in order and stopping
//! at the first failure.

pub mod cli;
pub mod command_args;
pub mod commands;
pub mod config_file;
pub mod envfile;
pub mod error;
pub mod process_guard;
pub mod provision;
pub mod provision_state;
pub mod runner;
pub mod sanity;
pub mod steps;
pub mod unit;

// Re-export main types for convenience
pub use command_args::{CommandArgs, Invocation};
pub use config_file::DeployConfig;
pub use envfile::EnvFile;
pub use error::DeployError;
pub use process_guard::{ChildRegistry, CommandProcessGroup, ProcessGuard};
pub use provision::{PlannedStep, ProvisionOptions, ProvisionReport, Provisioner, StepOutcome};
pub use provision_state::{ProvisionContext, ProvisionStage, ProvisionTransitionError};
pub use runner::{CommandOutput, CommandRunner, SystemRunner, enable_dry_run, is_dry_run};
pub use steps::Step;
