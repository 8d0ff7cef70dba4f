//! Deployment orchestration
//!
//! `Provisioner` walks the seven [`Step`]s in order, driving the
//! [`ProvisionContext`] state machine as it goes. The first failure marks the
//! context failed and is returned unchanged: there is no retry and no rollback,
//! and nothing after the failing step runs.

use std::fs;

use serde::Serialize;
use strum::IntoEnumIterator;
use tracing::{error, info, warn};

use crate::command_args::{CommandArgs, Invocation};
use crate::commands::apt::{AddRepositoryArgs, AptInstallArgs, AptUpdateArgs};
use crate::commands::python::{PipInstallArgs, PipTarget, VenvCreateArgs};
use crate::commands::systemd::{SystemctlAction, SystemctlArgs};
use crate::config_file::DeployConfig;
use crate::envfile::EnvFile;
use crate::error::{DeployError, Result};
use crate::provision_state::{ProvisionContext, ProvisionStage};
use crate::runner::{CommandOutput, CommandRunner, is_dry_run};
use crate::steps::Step;

/// Package that provides `add-apt-repository`
const REPOSITORY_TOOLS_PACKAGE: &str = "software-properties-common";

/// Knobs that change which steps do work
#[derive(Debug, Clone, Copy, Default)]
pub struct ProvisionOptions {
    /// Skip the package index update and interpreter install
    pub skip_apt: bool,
}

/// What a single step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Done,
    /// Nothing to do; the reason is shown to the operator
    Skipped(String),
}

/// Summary of a successful deployment
#[derive(Debug, Clone)]
pub struct ProvisionReport {
    pub outcomes: Vec<(Step, StepOutcome)>,
    pub dry_run: bool,
    pub service_name: String,
}

impl ProvisionReport {
    pub fn skipped(&self) -> impl Iterator<Item = Step> + '_ {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, StepOutcome::Skipped(_)))
            .map(|(s, _)| *s)
    }
}

/// One step as it would run, for `plan`
#[derive(Debug, Clone, Serialize)]
pub struct PlannedStep {
    pub number: usize,
    pub step: Step,
    pub title: String,
    pub actions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,
}

/// Runs a deployment described by a [`DeployConfig`].
pub struct Provisioner<'a, R: CommandRunner> {
    config: &'a DeployConfig,
    runner: R,
    options: ProvisionOptions,
    context: ProvisionContext,
}

impl<'a, R: CommandRunner> Provisioner<'a, R> {
    pub fn new(config: &'a DeployConfig, runner: R) -> Self {
        Self {
            config,
            runner,
            options: ProvisionOptions::default(),
            context: ProvisionContext::new(),
        }
    }

    pub fn with_options(mut self, options: ProvisionOptions) -> Self {
        self.options = options;
        self
    }

    pub fn context(&self) -> &ProvisionContext {
        &self.context
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Execute every step in order, stopping at the first failure.
    pub fn run(&mut self) -> Result<ProvisionReport> {
        let mut outcomes = Vec::with_capacity(Step::count());

        for step in Step::iter() {
            self.context.transition_to(ProvisionStage::for_step(step))?;
            info!("[{}/{}] {}", step.number(), Step::count(), step);

            match self.execute(step) {
                Ok(outcome) => {
                    if let StepOutcome::Skipped(reason) = &outcome {
                        info!("[{}/{}] skipped: {}", step.number(), Step::count(), reason);
                    }
                    outcomes.push((step, outcome));
                }
                Err(e) => {
                    error!("{} failed: {}", step, e);
                    self.context.fail()?;
                    return Err(e);
                }
            }
        }

        self.context.advance()?;
        info!("deployment of {} complete", self.config.service_name);

        Ok(ProvisionReport {
            outcomes,
            dry_run: is_dry_run(),
            service_name: self.config.service_name.clone(),
        })
    }

    fn execute(&mut self, step: Step) -> Result<StepOutcome> {
        match step {
            Step::UpdatePackageIndex => self.update_package_index(),
            Step::EnsureInterpreter => self.ensure_interpreter(),
            Step::CreateEnvironment => self.create_environment(),
            Step::InstallDependencies => self.install_dependencies(),
            Step::EnsureDataDirs => self.ensure_data_dirs(),
            Step::CheckEnvFile => self.check_env_file(),
            Step::InstallService => self.install_service(),
        }
    }

    fn exec(&mut self, step: Step, invocation: Invocation) -> Result<CommandOutput> {
        self.runner.run(&invocation)?.ensure_success(step, &invocation)
    }

    fn exec_all(&mut self, step: Step, invocations: Vec<Invocation>) -> Result<StepOutcome> {
        for invocation in invocations {
            self.exec(step, invocation)?;
        }
        Ok(StepOutcome::Done)
    }

    fn update_package_index(&mut self) -> Result<StepOutcome> {
        if self.options.skip_apt {
            return Ok(StepOutcome::Skipped("apt steps disabled".to_string()));
        }
        let invocations = step_invocations(self.config, Step::UpdatePackageIndex);
        self.exec_all(Step::UpdatePackageIndex, invocations)
    }

    fn ensure_interpreter(&mut self) -> Result<StepOutcome> {
        if self.options.skip_apt {
            return Ok(StepOutcome::Skipped("apt steps disabled".to_string()));
        }
        let python = self.config.python_binary();
        if self.runner.program_exists(&python) {
            return Ok(StepOutcome::Skipped(format!("{} already installed", python)));
        }

        info!("{} not found, installing from {}", python, self.config.python_ppa);
        let invocations = step_invocations(self.config, Step::EnsureInterpreter);
        self.exec_all(Step::EnsureInterpreter, invocations)
    }

    fn create_environment(&mut self) -> Result<StepOutcome> {
        let venv_python = self.config.venv_python();
        if venv_python.is_file() {
            return Ok(StepOutcome::Skipped(format!(
                "virtual environment exists at {}",
                self.config.venv_path().display()
            )));
        }
        let invocations = step_invocations(self.config, Step::CreateEnvironment);
        self.exec_all(Step::CreateEnvironment, invocations)
    }

    fn install_dependencies(&mut self) -> Result<StepOutcome> {
        let invocations = step_invocations(self.config, Step::InstallDependencies);
        self.exec_all(Step::InstallDependencies, invocations)
    }

    fn ensure_data_dirs(&mut self) -> Result<StepOutcome> {
        for dir in self.config.data_dir_paths() {
            if is_dry_run() {
                info!("[DRY RUN] would create {}", dir.display());
                continue;
            }
            // create_dir_all succeeds when the directory already exists
            fs::create_dir_all(&dir)?;
            info!("data directory ready: {}", dir.display());
        }
        Ok(StepOutcome::Done)
    }

    fn check_env_file(&mut self) -> Result<StepOutcome> {
        let path = self.config.env_file_path();
        if !path.is_file() {
            return Err(DeployError::MissingEnvFile {
                path,
                example: self.config.env_example_path(),
            });
        }

        // Only presence is fatal; `check-env` is the strict variant
        let parsed = fs::read_to_string(&path)
            .map_err(DeployError::from)
            .and_then(|content| EnvFile::parse(&content));
        match parsed {
            Ok(env) => {
                let missing = env.missing_keys(&self.config.required_env_keys);
                if !missing.is_empty() {
                    warn!(
                        "{} is missing values for: {}",
                        path.display(),
                        missing.join(", ")
                    );
                }
            }
            Err(e) => warn!("could not check required keys in {}: {}", path.display(), e),
        }
        Ok(StepOutcome::Done)
    }

    fn install_service(&mut self) -> Result<StepOutcome> {
        let source = self.config.unit_file_path();
        if !source.is_file() {
            return Err(DeployError::MissingUnitFile { path: source });
        }

        let target = self.config.installed_unit_path();
        if is_dry_run() {
            info!("[DRY RUN] would copy {} to {}", source.display(), target.display());
        } else {
            fs::copy(&source, &target)?;
            info!("installed {}", target.display());
        }

        let invocations = step_invocations(self.config, Step::InstallService);
        self.exec_all(Step::InstallService, invocations)
    }

    /// `systemctl status` output for the deployed service. Never fails the run.
    pub fn service_status(&mut self) -> Option<String> {
        let invocation = Invocation::from_args(&SystemctlArgs::for_service(
            SystemctlAction::Status,
            &self.config.service_name,
        ));
        match self.runner.run(&invocation) {
            Ok(output) => Some(output.stdout),
            Err(e) => {
                warn!("could not query service status: {}", e);
                None
            }
        }
    }
}

/// The external commands a step runs, in order.
///
/// File-system actions (directory creation, env check, unit copy) are not
/// commands and are absent here; [`plan`] describes them separately.
pub fn step_invocations(config: &DeployConfig, step: Step) -> Vec<Invocation> {
    let project = config.project_root();
    let service = config.service_name.as_str();

    fn inv(args: &dyn CommandArgs) -> Invocation {
        Invocation::from_args(args)
    }

    match step {
        Step::UpdatePackageIndex => vec![inv(&AptUpdateArgs)],
        Step::EnsureInterpreter => vec![
            inv(&AptInstallArgs::new([REPOSITORY_TOOLS_PACKAGE])),
            inv(&AddRepositoryArgs {
                repository: config.python_ppa.clone(),
            }),
            inv(&AptUpdateArgs),
            inv(&AptInstallArgs::python_toolchain(config.python_version.trim())),
        ],
        Step::CreateEnvironment => vec![
            inv(&VenvCreateArgs {
                interpreter: config.python_binary(),
                venv_dir: config.venv_path(),
            })
            .in_dir(&project),
        ],
        Step::InstallDependencies => vec![
            inv(&PipInstallArgs {
                pip: config.venv_pip(),
                target: PipTarget::UpgradePip,
            })
            .in_dir(&project),
            inv(&PipInstallArgs {
                pip: config.venv_pip(),
                target: PipTarget::Requirements(config.requirements_path()),
            })
            .in_dir(&project),
        ],
        Step::EnsureDataDirs | Step::CheckEnvFile => vec![],
        Step::InstallService => vec![
            inv(&SystemctlArgs::daemon_reload()),
            inv(&SystemctlArgs::for_service(SystemctlAction::Enable, service)),
            inv(&SystemctlArgs::for_service(SystemctlAction::Restart, service)),
        ],
    }
}

/// Describe every step without running anything.
pub fn plan(config: &DeployConfig, options: ProvisionOptions) -> Vec<PlannedStep> {
    Step::iter()
        .map(|step| {
            let mut actions: Vec<String> = Vec::new();
            let mut condition = None;

            if options.skip_apt && step.uses_apt() {
                condition = Some("skipped (apt steps disabled)".to_string());
            }

            match step {
                Step::EnsureInterpreter if condition.is_none() => {
                    condition = Some(format!("only if {} is not on PATH", config.python_binary()));
                }
                Step::CreateEnvironment => {
                    condition = Some(format!("only if {} does not exist", config.venv_python().display()));
                }
                Step::EnsureDataDirs => {
                    actions.extend(
                        config
                            .data_dir_paths()
                            .iter()
                            .map(|d| format!("mkdir -p {}", d.display())),
                    );
                }
                Step::CheckEnvFile => {
                    actions.push(format!(
                        "require {} (template: {})",
                        config.env_file_path().display(),
                        config.env_example_path().display()
                    ));
                }
                Step::InstallService => {
                    actions.push(format!(
                        "cp {} {}",
                        config.unit_file_path().display(),
                        config.installed_unit_path().display()
                    ));
                }
                _ => {}
            }

            actions.extend(
                step_invocations(config, step)
                    .iter()
                    .map(Invocation::display_line),
            );

            PlannedStep {
                number: step.number(),
                step,
                title: step.to_string(),
                actions,
                condition,
            }
        })
        .collect()
}

/// Strict env file check: the file must exist and every required key must
/// have a value.
pub fn verify_env_file(config: &DeployConfig) -> Result<EnvFile> {
    let env = EnvFile::load(&config.env_file_path(), &config.env_example_path())?;
    let missing = env.missing_keys(&config.required_env_keys);
    if missing.is_empty() {
        Ok(env)
    } else {
        Err(DeployError::validation(format!(
            "{} has no value for: {}",
            config.env_file_path().display(),
            missing.join(", ")
        )))
    }
}

/// Post-deploy hints for following the service
pub fn follow_up_hints(service: &str) -> Vec<String> {
    vec![
        format!("systemctl status {}", service),
        format!("journalctl -u {} -f", service),
    ]
}
