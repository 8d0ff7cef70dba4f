//! Type-safe arguments for the interpreter and pip.

use std::path::PathBuf;

use crate::command_args::CommandArgs;

/// `python<version> -m venv <dir>`
#[derive(Debug, Clone)]
pub struct VenvCreateArgs {
    /// Interpreter binary, e.g. `python3.11`
    pub interpreter: String,
    pub venv_dir: PathBuf,
}

impl CommandArgs for VenvCreateArgs {
    fn program(&self) -> String {
        self.interpreter.clone()
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec![
            "-m".to_string(),
            "venv".to_string(),
            self.venv_dir.display().to_string(),
        ]
    }
}

/// What a `pip install` call installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipTarget {
    /// `--upgrade pip`
    UpgradePip,
    /// `-r <manifest>`
    Requirements(PathBuf),
}

/// `<venv>/bin/pip install ...`
#[derive(Debug, Clone)]
pub struct PipInstallArgs {
    pub pip: PathBuf,
    pub target: PipTarget,
}

impl CommandArgs for PipInstallArgs {
    fn program(&self) -> String {
        self.pip.display().to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec!["install".to_string()];
        match &self.target {
            PipTarget::UpgradePip => {
                args.push("--upgrade".to_string());
                args.push("pip".to_string());
            }
            PipTarget::Requirements(manifest) => {
                args.push("-r".to_string());
                args.push(manifest.display().to_string());
            }
        }
        args
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        vec![("PIP_DISABLE_PIP_VERSION_CHECK".to_string(), "1".to_string())]
    }
}
