//! Tests for deployment orchestration through the public API
//!
//! These tests verify:
//! - The missing env file aborts with exit status 1 before the service step
//! - A present env file lets the run reach the service step
//! - Re-running over an existing deployment does not fail
//! - The first failing command ends the run with its own exit status
//! - A relative project directory is resolved exactly once

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tryon_deploy::provision::step_invocations;
use tryon_deploy::{
    CommandOutput, CommandRunner, DeployConfig, DeployError, Invocation, ProvisionOptions,
    ProvisionStage, Provisioner, Step, StepOutcome,
};

// =============================================================================
// Fixtures
// =============================================================================

/// Answers every command with success unless its program name matches `fail`
#[derive(Default)]
struct FakeHost {
    executed: Vec<String>,
    fail: Option<(&'static str, i32)>,
}

impl CommandRunner for FakeHost {
    fn run(&mut self, invocation: &Invocation) -> tryon_deploy::error::Result<CommandOutput> {
        self.executed.push(invocation.display_line());
        let failed = self
            .fail
            .filter(|(program, _)| invocation.short_name() == *program);
        Ok(match failed {
            Some((_, code)) => CommandOutput {
                stderr: "E: simulated failure\n".to_string(),
                exit_code: Some(code),
                success: false,
                ..CommandOutput::default()
            },
            None => CommandOutput {
                exit_code: Some(0),
                success: true,
                ..CommandOutput::default()
            },
        })
    }

    fn program_exists(&mut self, _program: &str) -> bool {
        true
    }
}

fn write_project(root: &Path, env: Option<&str>) -> DeployConfig {
    fs::write(root.join("requirements.txt"), "python-telegram-bot==21.0\n").unwrap();
    fs::write(
        root.join("tryon-bot.service"),
        "[Unit]\nDescription=Try-on bot\n[Service]\nExecStart=/bin/true\n",
    )
    .unwrap();
    fs::write(root.join(".env.example"), "BOT_TOKEN=\nGEMINI_API_KEY=\n").unwrap();
    if let Some(contents) = env {
        fs::write(root.join(".env"), contents).unwrap();
    }
    fs::create_dir(root.join("units")).unwrap();

    DeployConfig {
        project_dir: root.to_path_buf(),
        systemd_dir: root.join("units"),
        ..DeployConfig::default()
    }
}

// =============================================================================
// Env file guard
// =============================================================================

#[test]
fn test_missing_env_file_exits_one_with_remediation() {
    let dir = TempDir::new().unwrap();
    let config = write_project(dir.path(), None);

    let mut provisioner = Provisioner::new(&config, FakeHost::default());
    let err = provisioner.run().unwrap_err();

    assert_eq!(err.exit_code(), 1);
    let hint = err.remediation().expect("missing env file has remediation");
    assert!(hint.contains(&format!(
        "cp {} {}",
        config.env_example_path().display(),
        config.env_file_path().display()
    )));

    // Nothing touched the service
    assert!(
        provisioner
            .runner()
            .executed
            .iter()
            .all(|cmd| !cmd.starts_with("systemctl"))
    );
    assert!(!config.installed_unit_path().exists());
    assert_eq!(
        provisioner.context().failed_at(),
        Some(ProvisionStage::CheckingEnvFile)
    );
}

#[test]
fn test_present_env_file_reaches_service_step() {
    let dir = TempDir::new().unwrap();
    let config = write_project(dir.path(), Some("BOT_TOKEN=1:a\nGEMINI_API_KEY=k\n"));

    let mut provisioner = Provisioner::new(&config, FakeHost::default());
    let report = provisioner.run().unwrap();

    let executed = &provisioner.runner().executed;
    assert_eq!(executed.last().unwrap(), "systemctl restart tryon-bot");
    assert!(executed.contains(&"systemctl daemon-reload".to_string()));
    assert!(executed.contains(&"systemctl enable tryon-bot".to_string()));
    assert_eq!(report.outcomes.last().unwrap(), &(Step::InstallService, StepOutcome::Done));
    assert_eq!(
        fs::read_to_string(config.installed_unit_path()).unwrap(),
        fs::read_to_string(config.unit_file_path()).unwrap()
    );
}

#[test]
fn test_incomplete_env_file_is_not_fatal_during_deploy() {
    let dir = TempDir::new().unwrap();
    let config = write_project(dir.path(), Some("# filled in later\n"));

    let mut provisioner = Provisioner::new(&config, FakeHost::default());
    assert!(provisioner.run().is_ok());
}

#[test]
fn test_env_file_only_needs_to_exist() {
    // Multi-line quoted values and bare keys are fine for the bot's loader
    for contents in [
        "BOT_TOKEN=1:a\nGEMINI_API_KEY=k\nNOTE=\"line one\nline two\"\n",
        "BOT_TOKEN=1:a\nGEMINI_API_KEY=k\nDEBUG\n",
    ] {
        let dir = TempDir::new().unwrap();
        let config = write_project(dir.path(), Some(contents));

        let mut provisioner = Provisioner::new(&config, FakeHost::default());
        provisioner.run().unwrap();

        assert!(provisioner.context().is_complete());
        assert_eq!(
            provisioner.runner().executed.last().unwrap(),
            "systemctl restart tryon-bot"
        );
    }
}

// =============================================================================
// Project directory
// =============================================================================

#[test]
fn test_relative_project_dir_is_not_applied_twice() {
    let config = DeployConfig {
        project_dir: PathBuf::from("bot"),
        ..DeployConfig::default()
    };
    let root = std::env::current_dir().unwrap().join("bot");

    let venv = &step_invocations(&config, Step::CreateEnvironment)[0];
    assert_eq!(venv.args.last().unwrap(), &root.join("venv").display().to_string());
    assert_eq!(venv.cwd.as_deref(), Some(root.as_path()));

    let deps = step_invocations(&config, Step::InstallDependencies);
    assert_eq!(deps[0].program, root.join("venv/bin/pip").display().to_string());
    assert_eq!(
        deps[1].args.last().unwrap(),
        &root.join("requirements.txt").display().to_string()
    );
    assert_eq!(config.venv_python(), root.join("venv/bin/python"));
}

// =============================================================================
// Idempotence
// =============================================================================

#[test]
fn test_second_run_with_existing_directories_succeeds() {
    let dir = TempDir::new().unwrap();
    let config = write_project(dir.path(), Some("BOT_TOKEN=1\nGEMINI_API_KEY=2\n"));

    Provisioner::new(&config, FakeHost::default()).run().unwrap();
    assert!(config.data_dir_paths().iter().all(|d| d.is_dir()));

    // A file left in a data directory survives the second run
    let photo = dir.path().join("data/photos/keep.jpg");
    fs::write(&photo, b"jpeg").unwrap();

    Provisioner::new(&config, FakeHost::default()).run().unwrap();
    assert!(photo.is_file());
}

// =============================================================================
// Fail-fast
// =============================================================================

#[test]
fn test_failing_command_stops_run_with_its_exit_code() {
    let dir = TempDir::new().unwrap();
    let config = write_project(dir.path(), Some("BOT_TOKEN=1\nGEMINI_API_KEY=2\n"));

    let host = FakeHost {
        fail: Some(("apt-get", 100)),
        ..FakeHost::default()
    };
    let mut provisioner = Provisioner::new(&config, host);
    let err = provisioner.run().unwrap_err();

    assert_eq!(err.exit_code(), 100);
    assert!(matches!(
        err,
        DeployError::CommandFailed {
            step: Step::UpdatePackageIndex,
            ..
        }
    ));
    assert_eq!(provisioner.runner().executed.len(), 1);
    assert!(provisioner.context().is_failed());
    assert!(!dir.path().join("data").exists());
}

#[test]
fn test_systemctl_failure_after_unit_copy() {
    let dir = TempDir::new().unwrap();
    let config = write_project(dir.path(), Some("BOT_TOKEN=1\nGEMINI_API_KEY=2\n"));

    let host = FakeHost {
        fail: Some(("systemctl", 5)),
        ..FakeHost::default()
    };
    let mut provisioner = Provisioner::new(&config, host);
    let err = provisioner.run().unwrap_err();

    assert_eq!(err.exit_code(), 5);
    assert!(config.installed_unit_path().is_file());
    assert_eq!(
        provisioner.runner().executed.last().unwrap(),
        "systemctl daemon-reload"
    );
}

#[test]
fn test_skip_apt_never_calls_apt() {
    let dir = TempDir::new().unwrap();
    let config = write_project(dir.path(), Some("BOT_TOKEN=1\nGEMINI_API_KEY=2\n"));

    let host = FakeHost {
        fail: Some(("apt-get", 100)),
        ..FakeHost::default()
    };
    let mut provisioner =
        Provisioner::new(&config, host).with_options(ProvisionOptions { skip_apt: true });
    provisioner.run().unwrap();
    assert!(provisioner.context().is_complete());
}
