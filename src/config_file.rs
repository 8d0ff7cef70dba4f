//! Deployment configuration file handling.
//!
//! A `DeployConfig` is loaded from JSON, can be saved back out with
//! `init-config`, and is overridden piecemeal by CLI flags. Every field has a
//! default matching the bot's repository layout, so running with no config
//! file at all deploys the bot from the current directory.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Deployment configuration that can be saved/loaded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeployConfig {
    /// Checkout of the bot; every relative path below resolves against it
    pub project_dir: PathBuf,

    // Interpreter
    pub python_version: String,
    pub python_ppa: String,

    // Environment & dependencies
    pub venv_dir: PathBuf,
    pub requirements: PathBuf,

    // Filesystem
    pub data_dirs: Vec<PathBuf>,
    pub env_file: PathBuf,
    pub env_example: PathBuf,
    /// Keys the bot refuses to start without
    pub required_env_keys: Vec<String>,

    // Service
    pub service_name: String,
    pub unit_file: PathBuf,
    /// Absolute; not resolved against `project_dir`
    pub systemd_dir: PathBuf,
    /// `User=` in the rendered unit. None leaves it out (runs as root)
    pub service_user: Option<String>,
    pub entry_module: String,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            project_dir: PathBuf::from("."),
            python_version: "3.11".to_string(),
            python_ppa: "ppa:deadsnakes/ppa".to_string(),
            venv_dir: PathBuf::from("venv"),
            requirements: PathBuf::from("requirements.txt"),
            data_dirs: vec![PathBuf::from("data"), PathBuf::from("data/photos")],
            env_file: PathBuf::from(".env"),
            env_example: PathBuf::from(".env.example"),
            required_env_keys: vec!["BOT_TOKEN".to_string(), "GEMINI_API_KEY".to_string()],
            service_name: "tryon-bot".to_string(),
            unit_file: PathBuf::from("tryon-bot.service"),
            systemd_dir: PathBuf::from("/etc/systemd/system"),
            service_user: None,
            entry_module: "bot.main".to_string(),
        }
    }
}

impl DeployConfig {
    /// Save configuration to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .context("Failed to serialize configuration to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Load configuration from a JSON file. Missing fields take their defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read configuration from {:?}", path.as_ref()))?;

        let config: Self =
            serde_json::from_str(&content).context("Failed to parse configuration JSON")?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        // Interpreter version: "3" or "3.11", digits and dots only
        let version = self.python_version.trim();
        if version.is_empty() {
            anyhow::bail!("Python version must be specified");
        }
        if !version.split('.').all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_digit())) {
            anyhow::bail!("Python version must look like 3.11, got {:?}", version);
        }

        if self.python_ppa.trim().is_empty() {
            anyhow::bail!("Python PPA must be specified");
        }

        // Service name becomes a unit filename and a systemctl argument
        let name = self.service_name.trim();
        if name.is_empty() {
            anyhow::bail!("Service name must be specified");
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '@'))
        {
            anyhow::bail!("Service name can only contain letters, numbers, '-', '_', '.' and '@'");
        }
        if name.ends_with(".service") {
            anyhow::bail!("Service name must not include the .service suffix");
        }

        if !self.systemd_dir.is_absolute() {
            anyhow::bail!("systemd directory must be an absolute path");
        }

        for path in [&self.venv_dir, &self.requirements, &self.env_file, &self.unit_file] {
            if path.as_os_str().is_empty() {
                anyhow::bail!("Paths in the configuration must not be empty");
            }
        }
        if self.data_dirs.iter().any(|d| d.as_os_str().is_empty()) {
            anyhow::bail!("Data directories must not be empty paths");
        }

        if let Some(user) = &self.service_user {
            if user.trim().is_empty() || user.contains(char::is_whitespace) {
                anyhow::bail!("Service user must be a single non-empty word");
            }
        }

        if self.entry_module.trim().is_empty() {
            anyhow::bail!("Entry module must be specified");
        }

        Ok(())
    }

    /// `project_dir` made absolute against the current directory
    pub fn project_root(&self) -> PathBuf {
        std::path::absolute(&self.project_dir).unwrap_or_else(|_| self.project_dir.clone())
    }

    /// Resolve a project-relative path to an absolute one
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.project_root().join(path)
        }
    }

    /// Interpreter binary name, e.g. `python3.11`
    pub fn python_binary(&self) -> String {
        format!("python{}", self.python_version.trim())
    }

    pub fn venv_path(&self) -> PathBuf {
        self.resolve(&self.venv_dir)
    }

    pub fn venv_python(&self) -> PathBuf {
        self.venv_path().join("bin").join("python")
    }

    pub fn venv_pip(&self) -> PathBuf {
        self.venv_path().join("bin").join("pip")
    }

    pub fn requirements_path(&self) -> PathBuf {
        self.resolve(&self.requirements)
    }

    pub fn data_dir_paths(&self) -> Vec<PathBuf> {
        self.data_dirs.iter().map(|d| self.resolve(d)).collect()
    }

    pub fn env_file_path(&self) -> PathBuf {
        self.resolve(&self.env_file)
    }

    pub fn env_example_path(&self) -> PathBuf {
        self.resolve(&self.env_example)
    }

    pub fn unit_file_path(&self) -> PathBuf {
        self.resolve(&self.unit_file)
    }

    /// Where the unit file lands, e.g. `/etc/systemd/system/tryon-bot.service`
    pub fn installed_unit_path(&self) -> PathBuf {
        self.systemd_dir.join(format!("{}.service", self.service_name))
    }
}
