//! End-to-end tests for the tryon-deploy binary
//!
//! Only subcommands that never touch the host are exercised here; the full
//! deployment is covered through the library in provision_tests.rs.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn tryon_deploy(project: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tryon-deploy"))
        .arg("--project-dir")
        .arg(project)
        .args(args)
        .env_remove("TRYON_DEPLOY_CONFIG")
        .env("RUST_LOG", "error")
        .output()
        .expect("Failed to run tryon-deploy")
}

#[test]
fn test_check_env_missing_file() {
    let dir = TempDir::new().unwrap();
    let output = tryon_deploy(dir.path(), &["check-env"]);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert_eq!(stderr.matches(".env not found").count(), 1, "stderr: {}", stderr);
    assert!(stderr.contains("cp "), "stderr: {}", stderr);
    assert!(stderr.contains(".env.example"), "stderr: {}", stderr);
}

#[test]
fn test_check_env_missing_keys() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join(".env"), "BOT_TOKEN=123:abc\n").unwrap();

    let output = tryon_deploy(dir.path(), &["check-env"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("GEMINI_API_KEY"));
}

#[test]
fn test_check_env_complete() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join(".env"),
        "BOT_TOKEN=123:abc\nGEMINI_API_KEY=secret\n",
    )
    .unwrap();

    let output = tryon_deploy(dir.path(), &["check-env"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("all required keys set"));
}

#[test]
fn test_plan_json_lists_seven_steps() {
    let dir = TempDir::new().unwrap();
    let output = tryon_deploy(dir.path(), &["plan", "--json"]);
    assert!(output.status.success());

    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let steps = plan.as_array().unwrap();
    assert_eq!(steps.len(), 7);
    assert_eq!(steps[5]["step"], "check_env_file");
    assert_eq!(steps[6]["title"], "Install service");
}

#[test]
fn test_relative_project_dir_resolves_once() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("bot")).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_tryon-deploy"))
        .current_dir(dir.path())
        .args(["--project-dir", "bot", "plan", "--json"])
        .env_remove("TRYON_DEPLOY_CONFIG")
        .env("RUST_LOG", "error")
        .output()
        .expect("Failed to run tryon-deploy");
    assert!(output.status.success());

    let root = dir.path().canonicalize().unwrap().join("bot");
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let venv_action = plan[2]["actions"][0].as_str().unwrap();
    assert_eq!(
        venv_action,
        format!("python3.11 -m venv {}", root.join("venv").display())
    );
    let pip_action = plan[3]["actions"][1].as_str().unwrap();
    assert!(pip_action.starts_with(&root.join("venv/bin/pip").display().to_string()));
    assert!(!pip_action.contains("bot/bot"));
}

#[test]
fn test_render_unit_to_file() {
    let dir = TempDir::new().unwrap();
    let unit_path = dir.path().join("tryon-bot.service");
    let output = tryon_deploy(
        dir.path(),
        &["render-unit", "--output", unit_path.to_str().unwrap()],
    );
    assert!(output.status.success());

    let unit = fs::read_to_string(&unit_path).unwrap();
    assert!(unit.contains("[Service]"));
    assert!(unit.contains("-m bot.main"));
}

#[test]
fn test_init_config_then_use_it() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("deploy.json");

    let output = tryon_deploy(dir.path(), &["init-config", config_path.to_str().unwrap()]);
    assert!(output.status.success());

    let written: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&config_path).unwrap()).unwrap();
    assert_eq!(written["python_version"], "3.11");
    assert_eq!(written["service_name"], "tryon-bot");

    let output = tryon_deploy(
        dir.path(),
        &["--config", config_path.to_str().unwrap(), "plan"],
    );
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("[7/7] Install service"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("deploy.json");
    fs::write(&config_path, r#"{ "service_name": "bad name" }"#).unwrap();

    let output = tryon_deploy(
        dir.path(),
        &["--config", config_path.to_str().unwrap(), "plan"],
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid deployment configuration"));
}
