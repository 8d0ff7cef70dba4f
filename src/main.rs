//! tryon-deploy - main entry point
//!
//! Provisions the host and (re)starts the bot service. Running with no
//! arguments performs the full deployment.

use std::process::ExitCode;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use tryon_deploy::cli::{Cli, Commands, LogFormat};
use tryon_deploy::provision::{self, ProvisionOptions, Provisioner};
use tryon_deploy::{
    DeployConfig, DeployError, ProcessGuard, SystemRunner, process_guard, runner, sanity, unit,
};

/// Initialize tracing; `RUST_LOG` overrides the default `info` level
fn init_logging(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse_args();
    init_logging(cli.log_format);
    debug!("CLI arguments parsed: {:?}", cli);

    if cli.dry_run {
        runner::enable_dry_run();
        info!("dry-run mode: no commands will be executed");
    }

    // Children are torn down on SIGINT/SIGTERM/SIGHUP and when the guard drops
    if let Err(e) = process_guard::init_signal_handlers() {
        warn!("Failed to initialize signal handlers: {}", e);
    }
    let guard = ProcessGuard::new();

    let result = run(&cli);
    drop(guard);

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => report_failure(&err),
    }
}

fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        None => deploy(cli, ProvisionOptions::default()),
        Some(Commands::Deploy { skip_apt }) => deploy(
            cli,
            ProvisionOptions {
                skip_apt: *skip_apt,
            },
        ),
        Some(Commands::Plan { json, skip_apt }) => {
            let config = load_config(cli)?;
            print_plan(&config, ProvisionOptions { skip_apt: *skip_apt }, *json)
        }
        Some(Commands::CheckEnv) => {
            let config = load_config(cli)?;
            let env = provision::verify_env_file(&config)?;
            println!(
                "✓ {} defines {} variable(s), all required keys set",
                config.env_file_path().display(),
                env.len()
            );
            Ok(())
        }
        Some(Commands::RenderUnit { output }) => {
            let config = load_config(cli)?;
            match output {
                Some(path) => {
                    unit::write_unit(&config, path)?;
                    println!("✓ Wrote {}", path.display());
                }
                None => print!("{}", unit::render_unit(&config)),
            }
            Ok(())
        }
        Some(Commands::Preflight) => {
            sanity::run_preflight_checks(cli.skip_root_check);
            println!("✓ Pre-flight checks passed");
            Ok(())
        }
        Some(Commands::InitConfig { path }) => {
            let config = match &cli.project_dir {
                Some(dir) => DeployConfig {
                    project_dir: dir.clone(),
                    ..DeployConfig::default()
                },
                None => DeployConfig::default(),
            };
            config.save_to_file(path)?;
            println!("✓ Wrote default configuration to {}", path.display());
            Ok(())
        }
    }
}

/// Load the config file (or defaults), apply CLI overrides, validate
fn load_config(cli: &Cli) -> Result<DeployConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from: {:?}", path);
            DeployConfig::load_from_file(path)?
        }
        None => DeployConfig::default(),
    };

    if let Some(dir) = &cli.project_dir {
        config.project_dir = dir.clone();
    }
    config.project_dir = std::path::absolute(&config.project_dir)
        .with_context(|| format!("Invalid project directory {:?}", config.project_dir))?;

    config
        .validate()
        .context("Invalid deployment configuration")?;
    Ok(config)
}

fn deploy(cli: &Cli, options: ProvisionOptions) -> Result<()> {
    let config = load_config(cli)?;

    // Root is irrelevant when nothing is executed
    sanity::run_preflight_checks(cli.skip_root_check || cli.dry_run);

    println!(
        "🚀 Deploying {} from {}",
        config.service_name,
        config.project_dir.display()
    );

    let mut provisioner = Provisioner::new(&config, SystemRunner::new()).with_options(options);
    let report = provisioner.run()?;

    for (step, outcome) in &report.outcomes {
        match outcome {
            provision::StepOutcome::Done => println!("  ✓ {}", step),
            provision::StepOutcome::Skipped(reason) => println!("  - {} ({})", step, reason),
        }
    }

    if report.dry_run {
        println!("\n✓ Dry run complete, nothing was changed");
        return Ok(());
    }

    println!("\n✓ {} deployed and restarted", report.service_name);
    if let Some(status) = provisioner.service_status() {
        print!("{}", status);
    }
    println!("\nUseful commands:");
    for hint in provision::follow_up_hints(&report.service_name) {
        println!("  {}", hint);
    }

    Ok(())
}

fn print_plan(config: &DeployConfig, options: ProvisionOptions, json: bool) -> Result<()> {
    let steps = provision::plan(config, options);

    if json {
        let out = serde_json::to_string_pretty(&steps).context("Failed to serialize plan")?;
        println!("{}", out);
        return Ok(());
    }

    for planned in &steps {
        match &planned.condition {
            Some(cond) => println!("[{}/{}] {} ({})", planned.number, steps.len(), planned.title, cond),
            None => println!("[{}/{}] {}", planned.number, steps.len(), planned.title),
        }
        for action in &planned.actions {
            println!("    {}", action);
        }
    }
    Ok(())
}

/// Print the error (and any remediation) and pick the exit status
fn report_failure(err: &anyhow::Error) -> ExitCode {
    debug!("{:?}", err);

    let deploy_err = err.downcast_ref::<DeployError>();
    eprintln!("\nERROR: {:#}", err);
    if let Some(hint) = deploy_err.and_then(DeployError::remediation) {
        eprintln!("{}", hint);
    }

    let code = deploy_err.map_or(1, DeployError::exit_code);
    ExitCode::from(u8::try_from(code).unwrap_or(1))
}
