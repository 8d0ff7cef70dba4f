//! Process lifecycle management for child processes
//!
//! This module ensures that `apt-get`, `pip` and `systemctl` children are
//! terminated when the deployer exits (gracefully or via signal).
//!
//! # Problem Solved
//! Interrupting a deploy while `apt-get install` runs would otherwise leave
//! dpkg running detached, holding the dpkg lock for the next attempt.
//!
//! # Solution
//! - Spawn children in their own process group with a parent-death signal
//! - Track every live child PID (and what it is) in a global registry
//! - On SIGINT/SIGTERM/SIGHUP or guard drop, SIGTERM each group, then SIGKILL
//!   whatever outlives the grace period

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use nix::libc;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;

static CHILD_REGISTRY: OnceLock<Arc<Mutex<ChildRegistry>>> = OnceLock::new();

/// Grace period for children when the guard is dropped
const DROP_GRACE: Duration = Duration::from_secs(5);
/// Grace period when a termination signal arrives
const SIGNAL_GRACE: Duration = Duration::from_secs(3);

/// Live child processes, keyed by PID (which is also their process group id)
#[derive(Debug, Default)]
pub struct ChildRegistry {
    children: HashMap<u32, String>,
    cleanup_initiated: bool,
}

impl ChildRegistry {
    /// Get or create the global child registry
    pub fn global() -> Arc<Mutex<ChildRegistry>> {
        CHILD_REGISTRY
            .get_or_init(|| Arc::new(Mutex::new(ChildRegistry::default())))
            .clone()
    }

    /// Track a spawned child. `label` is the program name used in log lines.
    pub fn register(&mut self, pid: u32, label: impl Into<String>) {
        let label = label.into();
        tracing::debug!(pid, program = %label, "registered child process");
        self.children.insert(pid, label);
    }

    pub fn unregister(&mut self, pid: u32) {
        if self.children.remove(&pid).is_some() {
            tracing::debug!(pid, "unregistered child process");
        }
    }

    pub fn count(&self) -> usize {
        self.children.len()
    }

    /// SIGTERM every tracked process group, wait up to `grace_period`,
    /// then SIGKILL the survivors. Runs at most once per registry.
    pub fn terminate_all(&mut self, grace_period: Duration) {
        if std::mem::replace(&mut self.cleanup_initiated, true) {
            tracing::debug!("child cleanup already initiated");
            return;
        }
        if self.children.is_empty() {
            return;
        }

        let targets: Vec<(u32, String)> = self.children.drain().collect();
        tracing::info!(count = targets.len(), "terminating child processes");

        for (pid, label) in &targets {
            signal_tree(*pid, Signal::SIGTERM, label);
        }

        let deadline = Instant::now() + grace_period;
        while Instant::now() < deadline {
            if targets.iter().all(|(pid, _)| !is_process_alive(*pid)) {
                tracing::info!("child processes exited after SIGTERM");
                return;
            }
            std::thread::sleep(Duration::from_millis(100));
        }

        for (pid, label) in &targets {
            if is_process_alive(*pid) {
                tracing::warn!(pid, program = %label, "child ignored SIGTERM, sending SIGKILL");
                signal_tree(*pid, Signal::SIGKILL, label);
            }
        }
    }
}

/// Signal the child's process group, falling back to the child alone
fn signal_tree(pid: u32, sig: Signal, label: &str) {
    if let Err(group_err) = send_signal_to_group(pid, sig) {
        tracing::debug!(pid, %group_err, "group signal failed, signalling process directly");
        if let Err(e) = send_signal(pid, sig) {
            tracing::warn!(pid, program = %label, error = %e, "failed to send {}", sig);
        }
    }
}

fn send_signal(pid: u32, sig: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(pid as i32), sig)
}

/// Negative PID addresses the whole process group
fn send_signal_to_group(pgid: u32, sig: Signal) -> Result<(), nix::Error> {
    signal::kill(Pid::from_raw(-(pgid as i32)), sig)
}

/// Alive means signalable and not a zombie
fn is_process_alive(pid: u32) -> bool {
    if signal::kill(Pid::from_raw(pid as i32), None).is_err() {
        return false;
    }

    // Third field of /proc/<pid>/stat is the state letter
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .map_or(true, |state| !matches!(state, "Z" | "X")),
        Err(_) => true,
    }
}

/// RAII guard that terminates all registered children on drop
pub struct ProcessGuard {
    registry: Arc<Mutex<ChildRegistry>>,
}

impl ProcessGuard {
    pub fn new() -> Self {
        Self {
            registry: ChildRegistry::global(),
        }
    }
}

impl Default for ProcessGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.registry.lock() {
            registry.terminate_all(DROP_GRACE);
        }
    }
}

/// Install handlers for SIGINT, SIGTERM and SIGHUP.
///
/// On any of them the registered children are torn down and the process
/// exits with `128 + signal`. Call once at program start.
pub fn init_signal_handlers() -> Result<(), std::io::Error> {
    use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM, SIGHUP])?;

    std::thread::Builder::new()
        .name("signal-handler".to_string())
        .spawn(move || {
            if let Some(sig) = signals.forever().next() {
                let name = Signal::try_from(sig).map_or("UNKNOWN", |s| s.as_str());
                tracing::warn!(signal = name, "deployment interrupted, cleaning up");

                if let Ok(mut registry) = ChildRegistry::global().lock() {
                    registry.terminate_all(SIGNAL_GRACE);
                }

                std::process::exit(128 + sig);
            }
        })?;

    Ok(())
}

/// Extension trait for `std::process::Command` to isolate the child
pub trait CommandProcessGroup {
    /// Run the child as leader of a new process group that receives SIGTERM
    /// when this process dies
    fn in_new_process_group(&mut self) -> &mut Self;
}

impl CommandProcessGroup for std::process::Command {
    fn in_new_process_group(&mut self) -> &mut Self {
        use std::os::unix::process::CommandExt;

        // SAFETY: the closure only calls async-signal-safe setpgid and prctl
        unsafe {
            self.pre_exec(|| {
                nix::unistd::setpgid(Pid::from_raw(0), Pid::from_raw(0))
                    .map_err(std::io::Error::other)?;

                if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGTERM) == -1 {
                    return Err(std::io::Error::last_os_error());
                }

                Ok(())
            });
        }
        self
    }
}
