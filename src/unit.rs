//! systemd unit rendering for the bot service.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::config_file::DeployConfig;

/// Render a unit file that runs the bot from its virtual environment.
///
/// Paths are absolute; systemd rejects a relative `WorkingDirectory`.
pub fn render_unit(config: &DeployConfig) -> String {
    let project = config
        .project_dir
        .canonicalize()
        .unwrap_or_else(|_| config.project_root());
    let rebased = DeployConfig {
        project_dir: project.clone(),
        ..config.clone()
    };

    let user_line = config
        .service_user
        .as_ref()
        .map(|user| format!("User={}\n", user))
        .unwrap_or_default();

    format!(
        "[Unit]\n\
         Description=Virtual Try-On Telegram Bot ({service})\n\
         After=network.target\n\
         \n\
         [Service]\n\
         Type=simple\n\
         {user_line}\
         WorkingDirectory={workdir}\n\
         EnvironmentFile={env_file}\n\
         ExecStart={python} -m {entry}\n\
         Restart=always\n\
         RestartSec=10\n\
         \n\
         [Install]\n\
         WantedBy=multi-user.target\n",
        service = config.service_name,
        workdir = project.display(),
        env_file = rebased.env_file_path().display(),
        python = rebased.venv_python().display(),
        entry = config.entry_module,
    )
}

/// Write the rendered unit to `path`
pub fn write_unit(config: &DeployConfig, path: &Path) -> Result<()> {
    fs::write(path, render_unit(config))
        .with_context(|| format!("Failed to write unit file to {:?}", path))
}
