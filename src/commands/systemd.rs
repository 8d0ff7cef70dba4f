//! Type-safe arguments for `systemctl`.

use strum::{Display, EnumString};

use crate::command_args::CommandArgs;

/// systemctl verbs used by a deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[derive(Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum SystemctlAction {
    DaemonReload,
    Enable,
    Restart,
    Status,
}

impl SystemctlAction {
    /// Whether the verb takes a unit name
    pub fn takes_unit(self) -> bool {
        !matches!(self, Self::DaemonReload)
    }
}

/// `systemctl <action> [<service>]`
#[derive(Debug, Clone)]
pub struct SystemctlArgs {
    pub action: SystemctlAction,
    pub service: Option<String>,
}

impl SystemctlArgs {
    pub fn daemon_reload() -> Self {
        Self {
            action: SystemctlAction::DaemonReload,
            service: None,
        }
    }

    pub fn for_service(action: SystemctlAction, service: &str) -> Self {
        Self {
            action,
            service: Some(service.to_string()),
        }
    }
}

impl CommandArgs for SystemctlArgs {
    fn program(&self) -> String {
        "systemctl".to_string()
    }

    fn to_cli_args(&self) -> Vec<String> {
        let mut args = vec![self.action.to_string()];
        if self.action.takes_unit() {
            if let Some(ref svc) = self.service {
                args.push(svc.clone());
            }
        }
        if self.action == SystemctlAction::Status {
            args.push("--no-pager".to_string());
        }
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daemon_reload() {
        assert_eq!(SystemctlArgs::daemon_reload().to_cli_args(), vec!["daemon-reload"]);
    }

    #[test]
    fn test_service_actions() {
        let enable = SystemctlArgs::for_service(SystemctlAction::Enable, "tryon-bot");
        assert_eq!(enable.to_cli_args(), vec!["enable", "tryon-bot"]);

        let restart = SystemctlArgs::for_service(SystemctlAction::Restart, "tryon-bot");
        assert_eq!(restart.to_cli_args(), vec!["restart", "tryon-bot"]);

        let status = SystemctlArgs::for_service(SystemctlAction::Status, "tryon-bot");
        assert_eq!(status.to_cli_args(), vec!["status", "tryon-bot", "--no-pager"]);
    }

    #[test]
    fn test_action_parse() {
        let action: SystemctlAction = "daemon-reload".parse().unwrap();
        assert_eq!(action, SystemctlAction::DaemonReload);
        assert!(!action.takes_unit());
    }

    #[test]
    fn test_daemon_reload_ignores_service() {
        let args = SystemctlArgs {
            action: SystemctlAction::DaemonReload,
            service: Some("tryon-bot".to_string()),
        };
        assert_eq!(args.to_cli_args(), vec!["daemon-reload"]);
    }
}
