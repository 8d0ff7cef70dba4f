use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// tryon-deploy - provision a host for the virtual try-on bot
#[derive(Parser, Debug)]
#[command(name = "tryon-deploy")]
#[command(about = "Installs the interpreter, virtualenv, dependencies and systemd service for the try-on bot")]
#[command(version)]
pub struct Cli {
    /// Dry-run mode: log every command and file change without making it.
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// JSON deployment configuration (defaults are used for absent fields)
    #[arg(short, long, global = true, env = "TRYON_DEPLOY_CONFIG")]
    pub config: Option<PathBuf>,

    /// Project checkout to deploy (overrides the config file)
    #[arg(short, long, global = true)]
    pub project_dir: Option<PathBuf>,

    /// Do not require root privileges
    #[arg(long, global = true)]
    pub skip_root_check: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the full deployment (the default when no command is given)
    Deploy {
        /// Skip the package index update and interpreter install
        #[arg(long)]
        skip_apt: bool,
    },
    /// Show the steps and commands a deployment would run
    Plan {
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
        /// Plan as if --skip-apt were given
        #[arg(long)]
        skip_apt: bool,
    },
    /// Check that the env file exists and sets every required key
    CheckEnv,
    /// Print a systemd unit for the service
    RenderUnit {
        /// Write the unit here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Run the pre-flight host checks only
    Preflight,
    /// Write the default configuration as JSON
    InitConfig {
        /// Destination file
        path: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
