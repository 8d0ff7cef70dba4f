//! Error handling module for tryon-deploy
//!
//! Provides centralized error handling with proper error types using thiserror.
//! Every failure that ends a deployment maps to a process exit status through
//! [`DeployError::exit_code`].

use std::path::PathBuf;

use thiserror::Error;

use crate::steps::Step;

/// Main error type for tryon-deploy
#[derive(Error, Debug)]
pub enum DeployError {
    /// IO errors (file operations, directory creation, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Validation errors (config values, env file contents)
    #[error("Validation error: {0}")]
    Validation(String),

    /// The environment file the service reads its secrets from is absent
    #[error("{} not found", .path.display())]
    MissingEnvFile { path: PathBuf, example: PathBuf },

    /// The systemd unit file to install is absent
    #[error("Service unit file {} not found", .path.display())]
    MissingUnitFile { path: PathBuf },

    /// An external command could not be started at all
    #[error("Failed to spawn {program}: {source}")]
    CommandSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// An external command ran and exited unsuccessfully
    #[error("{step}: {program} failed (exit code {}){}", .exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string()), format_stderr(.stderr))]
    CommandFailed {
        step: Step,
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Provisioning state machine transition errors
    #[error("Provision transition error: {0}")]
    Transition(String),
}

/// Result type alias for deployment operations
pub type Result<T> = std::result::Result<T, DeployError>;

fn format_stderr(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(": {}", trimmed)
    }
}

impl DeployError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a transition error
    pub fn transition(msg: impl Into<String>) -> Self {
        Self::Transition(msg.into())
    }

    /// Process exit status for this error.
    ///
    /// A failed external command surfaces its own status so the caller sees the
    /// same code a fail-fast shell would have returned. Commands killed by a
    /// signal have no status and map to 1.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::CommandFailed {
                exit_code: Some(code),
                ..
            } if *code != 0 => *code,
            _ => 1,
        }
    }

    /// Remediation text printed for errors the operator can fix by hand.
    pub fn remediation(&self) -> Option<String> {
        match self {
            Self::MissingEnvFile { path, example } => Some(format!(
                "Create it from the example and fill in your secrets:\n  cp {} {}\n  nano {}",
                example.display(),
                path.display(),
                path.display()
            )),
            Self::MissingUnitFile { path } => Some(format!(
                "Generate one with:\n  tryon-deploy render-unit --output {}",
                path.display()
            )),
            _ => None,
        }
    }
}
