//! Type-safe arguments for the Debian package tools.
//!
//! - `AptUpdateArgs` for `apt-get update`
//! - `AptInstallArgs` for `apt-get install -y`
//! - `AddRepositoryArgs` for `add-apt-repository -y`

use crate::command_args::CommandArgs;

/// Keeps debconf from prompting; a deploy has no terminal to answer on.
fn noninteractive_env() -> Vec<(String, String)> {
    vec![("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string())]
}

// ============================================================================
// apt-get update
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct AptUpdateArgs;

impl CommandArgs for AptUpdateArgs {
    fn program(&self) -> String {
        "apt-get".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["update".to_string()]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        noninteractive_env()
    }
}

// ============================================================================
// apt-get install
// ============================================================================

/// `apt-get install -y <packages>`
#[derive(Debug, Clone)]
pub struct AptInstallArgs {
    pub packages: Vec<String>,
}

impl AptInstallArgs {
    pub fn new<I, S>(packages: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            packages: packages.into_iter().map(Into::into).collect(),
        }
    }

    /// Interpreter, venv module and headers for one Python version
    pub fn python_toolchain(version: &str) -> Self {
        Self::new([
            format!("python{}", version),
            format!("python{}-venv", version),
            format!("python{}-dev", version),
        ])
    }
}

impl CommandArgs for AptInstallArgs {
    fn program(&self) -> String {
        "apt-get".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec!["install".to_string(), "-y".to_string()];
        args.extend(self.packages.iter().cloned());
        args
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        noninteractive_env()
    }
}

// ============================================================================
// add-apt-repository
// ============================================================================

/// `add-apt-repository -y <repository>`
#[derive(Debug, Clone)]
pub struct AddRepositoryArgs {
    /// Repository spec, e.g. `ppa:deadsnakes/ppa`
    pub repository: String,
}

impl CommandArgs for AddRepositoryArgs {
    fn program(&self) -> String {
        "add-apt-repository".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        vec!["-y".to_string(), self.repository.clone()]
    }

    fn get_env_vars(&self) -> Vec<(String, String)> {
        noninteractive_env()
    }
}
