//! Pre-flight sanity checks for the host
//!
//! Verifies before any step runs that:
//! - the tools a deployment shells out to are on `PATH`
//! - we run with root privileges (EUID 0), since apt and systemd need them
//!
//! A failed check prints a boxed report and exits 1 before anything changes.

use crate::runner::program_on_path;

/// Result of environment verification
#[derive(Debug)]
pub struct SanityCheckResult {
    pub missing_binaries: Vec<String>,
    pub is_root: bool,
}

impl SanityCheckResult {
    /// Returns true if all checks passed
    pub fn is_ok(&self) -> bool {
        self.missing_binaries.is_empty() && self.is_root
    }
}

/// Binaries every deployment needs
const REQUIRED_BINARIES: &[&str] = &["apt-get", "systemctl", "cp"];

/// Only needed when the interpreter has to be installed
const OPTIONAL_BINARIES: &[&str] = &["add-apt-repository", "journalctl"];

fn is_running_as_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Check binaries and privileges. `skip_root` pretends we are root.
pub fn verify_environment(skip_root: bool) -> SanityCheckResult {
    let missing_binaries = REQUIRED_BINARIES
        .iter()
        .filter(|b| !program_on_path(b))
        .map(|b| (*b).to_string())
        .collect();

    for binary in OPTIONAL_BINARIES {
        if !program_on_path(binary) {
            tracing::debug!("optional binary not found: {}", binary);
        }
    }

    let is_root = if skip_root || should_skip_root_check() {
        tracing::warn!("root check skipped");
        true
    } else {
        is_running_as_root()
    };

    SanityCheckResult {
        missing_binaries,
        is_root,
    }
}

/// Root check opt-out for development: `TRYON_DEPLOY_SKIP_ROOT_CHECK=1`
pub fn should_skip_root_check() -> bool {
    std::env::var("TRYON_DEPLOY_SKIP_ROOT_CHECK")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Map binary names to the Debian package that ships them
fn get_package_for_binary(binary: &str) -> &'static str {
    match binary {
        "apt-get" => "apt",
        "systemctl" | "journalctl" => "systemd",
        "cp" => "coreutils",
        "add-apt-repository" => "software-properties-common",
        _ => "unknown",
    }
}

/// Human-readable failure report
pub fn format_report(result: &SanityCheckResult) -> String {
    let mut lines = vec![
        String::new(),
        "╔══════════════════════════════════════════════════════════════════╗".to_string(),
        "║              tryon-deploy - Pre-flight Check Failed              ║".to_string(),
        "╚══════════════════════════════════════════════════════════════════╝".to_string(),
        String::new(),
    ];

    if !result.is_root {
        lines.push("❌ ERROR: Root privileges required".to_string());
        lines.push("   Installing packages and systemd units needs root.".to_string());
        lines.push(String::new());
        lines.push("   Solution: Run with sudo or as root user:".to_string());
        lines.push("     sudo tryon-deploy".to_string());
        lines.push(String::new());
    }

    if !result.missing_binaries.is_empty() {
        lines.push("❌ ERROR: Missing required binaries".to_string());
        lines.push(String::new());
        for binary in &result.missing_binaries {
            lines.push(format!(
                "   • {} (install: apt-get install {})",
                binary,
                get_package_for_binary(binary)
            ));
        }
        lines.push(String::new());
    }

    lines.push("Fix the above issues and try again.".to_string());
    lines.join("\n")
}

/// Verify the host and exit 1 with a report if it is not fit to deploy on
pub fn run_preflight_checks(skip_root: bool) {
    tracing::debug!(skip_root, "running pre-flight checks");

    let result = verify_environment(skip_root);
    if !result.is_ok() {
        eprintln!("{}", format_report(&result));
        std::process::exit(1);
    }

    tracing::info!("pre-flight checks passed");
}
