//! Type-safe external command contracts.
//!
//! This module provides the `CommandArgs` trait for ensuring compile-time
//! correctness of the arguments handed to `apt-get`, the interpreter, `pip` and
//! `systemctl`. Instead of raw string vectors, Rust structs implement this trait
//! to produce the exact argv and environment each tool expects.

use std::path::{Path, PathBuf};

/// Trait for typed command arguments.
///
/// # Contract
///
/// - `program()`: the executable, looked up on `PATH` unless it is a path.
/// - `to_cli_args()`: arguments exactly as the program expects them.
/// - `get_env_vars()`: extra environment variables for the child.
///
/// ```
/// use tryon_deploy::command_args::CommandArgs;
/// use tryon_deploy::commands::apt::AptInstallArgs;
///
/// let args = AptInstallArgs::new(["python3.11", "python3.11-venv"]);
/// assert_eq!(args.program(), "apt-get");
/// assert_eq!(args.to_cli_args(), ["install", "-y", "python3.11", "python3.11-venv"]);
/// ```
pub trait CommandArgs {
    fn program(&self) -> String;

    fn to_cli_args(&self) -> Vec<String>;

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![]
    }
}

/// An owned, fully built command line ready for a [`crate::runner::CommandRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    /// Build an invocation from typed arguments
    pub fn from_args<T: CommandArgs + ?Sized>(args: &T) -> Self {
        Self {
            program: args.program(),
            args: args.to_cli_args(),
            env: args.get_env_vars(),
            cwd: None,
        }
    }

    /// Run the command from `dir` instead of the caller's working directory
    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    /// Short program name for logs and errors (`/srv/bot/venv/bin/pip` -> `pip`)
    pub fn short_name(&self) -> &str {
        Path::new(&self.program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(&self.program)
    }

    /// Shell-like rendering for plan output and logs
    pub fn display_line(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1 + self.env.len());
        for (key, value) in &self.env {
            parts.push(format!("{}={}", key, value));
        }
        parts.push(self.program.clone());
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                parts.push(format!("'{}'", arg));
            } else {
                parts.push(arg.clone());
            }
        }
        parts.join(" ")
    }
}
