//! External command execution
//!
//! Every `apt-get`, `pip` and `systemctl` call a deployment makes goes through a
//! [`CommandRunner`]. The production [`SystemRunner`] gives each child its own
//! process group, registers it with the global [`ChildRegistry`] so signals
//! tear it down, and mirrors its output into the log as it runs.

use std::io::{BufRead, BufReader};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::command_args::Invocation;
use crate::error::{DeployError, Result};
use crate::process_guard::{ChildRegistry, CommandProcessGroup};
use crate::steps::Step;

static DRY_RUN: AtomicBool = AtomicBool::new(false);

/// Turn on dry-run mode: commands are logged, not executed.
pub fn enable_dry_run() {
    DRY_RUN.store(true, Ordering::SeqCst);
}

pub fn is_dry_run() -> bool {
    DRY_RUN.load(Ordering::SeqCst)
}

/// Output from one external command.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Exit code (None if terminated by signal).
    pub exit_code: Option<i32>,
    pub success: bool,
    /// True when the command was only logged
    pub dry_run: bool,
}

impl CommandOutput {
    /// Successful output of a command that was skipped by dry-run mode
    pub fn skipped(invocation: &Invocation) -> Self {
        Self {
            stdout: format!("[DRY RUN] Skipped: {}\n", invocation.display_line()),
            exit_code: Some(0),
            success: true,
            dry_run: true,
            ..Self::default()
        }
    }

    /// Turn a non-zero exit into `DeployError::CommandFailed`
    pub fn ensure_success(self, step: Step, invocation: &Invocation) -> Result<Self> {
        if self.success {
            Ok(self)
        } else {
            Err(DeployError::CommandFailed {
                step,
                program: invocation.short_name().to_string(),
                exit_code: self.exit_code,
                stderr: self.stderr,
            })
        }
    }
}

/// Executes external commands on behalf of a deployment.
pub trait CommandRunner {
    /// Run one command to completion.
    ///
    /// Returns `Err` only when the command could not be started; a command that
    /// ran and failed comes back as `Ok` with `success == false`.
    fn run(&mut self, invocation: &Invocation) -> Result<CommandOutput>;

    /// Whether `program` resolves to an executable on `PATH`
    fn program_exists(&mut self, program: &str) -> bool {
        program_on_path(program)
    }
}

/// Runs commands on the host.
#[derive(Debug, Default)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

impl CommandRunner for SystemRunner {
    fn run(&mut self, invocation: &Invocation) -> Result<CommandOutput> {
        let line = invocation.display_line();

        if is_dry_run() {
            info!("[DRY RUN] would run: {}", line);
            return Ok(CommandOutput::skipped(invocation));
        }

        info!("running: {}", line);

        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .envs(invocation.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .in_new_process_group();
        if let Some(dir) = &invocation.cwd {
            cmd.current_dir(dir);
        }

        let mut child = cmd.spawn().map_err(|source| DeployError::CommandSpawn {
            program: invocation.program.clone(),
            source,
        })?;
        let pid = child.id();
        let name = invocation.short_name().to_string();

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.register(pid, name.clone());
        }

        // stderr drains on its own thread so neither pipe can fill and stall the child
        let stderr_reader = child.stderr.take().map(|stderr| {
            let name = name.clone();
            std::thread::spawn(move || {
                let mut captured = String::new();
                for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                    warn!(program = %name, "{}", line);
                    captured.push_str(&line);
                    captured.push('\n');
                }
                captured
            })
        });

        let mut stdout = String::new();
        if let Some(out) = child.stdout.take() {
            for line in BufReader::new(out).lines().map_while(|l| l.ok()) {
                debug!(program = %name, "{}", line);
                stdout.push_str(&line);
                stdout.push('\n');
            }
        }

        let status = child.wait();

        if let Ok(mut registry) = ChildRegistry::global().lock() {
            registry.unregister(pid);
        }

        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        let status = status?;

        let exit_code = status.code();
        if status.success() {
            debug!(program = %name, "exited successfully");
        } else {
            warn!(program = %name, exit_code = ?exit_code, "exited unsuccessfully");
        }

        Ok(CommandOutput {
            stdout,
            stderr,
            exit_code,
            success: status.success(),
            dry_run: false,
        })
    }
}

/// `which`-style lookup: true when `program` is an executable file, either as
/// given (if it contains a slash) or in some `PATH` entry.
pub fn program_on_path(program: &str) -> bool {
    use std::os::unix::fs::PermissionsExt;

    let is_executable = |path: &std::path::Path| {
        path.metadata()
            .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    };

    if program.contains('/') {
        return is_executable(std::path::Path::new(program));
    }

    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| is_executable(&dir.join(program))))
        .unwrap_or(false)
}
