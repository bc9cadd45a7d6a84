use serde::Serialize;
use tracing::{info, warn};

use crate::adb::Adb;
use crate::defs::DeviceId;
use crate::task::Action;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Succeeded,
    Failed,
    /// Not executed (check mode).
    Skipped,
}

/// Result of one task on one device.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TaskOutcome {
    /// `None` for tasks that do not address a device.
    pub device: Option<DeviceId>,
    pub status: OutcomeStatus,
    pub output: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub invocation: Vec<String>,
}

impl TaskOutcome {
    pub fn skipped(device: Option<&str>, invocation: Vec<String>) -> Self {
        Self {
            device: device.map(str::to_string),
            status: OutcomeStatus::Skipped,
            output: String::new(),
            error: None,
            invocation,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.status == OutcomeStatus::Succeeded
    }
}

/// adb arguments for `action`, addressed to `device` when given.
pub fn invocation(action: &Action, device: Option<&str>) -> Vec<String> {
    let mut args: Vec<String> = Vec::new();
    if let Some(device) = device {
        args.extend(["-s".to_string(), device.to_string()]);
    }

    let tail: Vec<&str> = match action {
        Action::Reboot => vec!["reboot"],
        Action::Install { src } => vec!["install", "-t", "-g", src.as_str()],
        Action::Reinstall { src } => vec!["install", "-t", "-g", "-r", src.as_str()],
        Action::Uninstall { pkg_name } => vec!["uninstall", pkg_name.as_str()],
        Action::Copy { src, dst } => vec!["push", src.as_str(), dst.as_str()],
        Action::Fetch { src, dst } => vec!["pull", src.as_str(), dst.as_str()],
        Action::Kill => vec!["kill-server"],
        Action::Configure { port, .. } => vec!["tcpip", port.as_str()],
        Action::List => vec!["devices", "-l"],
        Action::Shell { command } => vec!["shell", command.as_str()],
    };
    args.extend(tail.into_iter().map(str::to_string));
    args
}

/// Runs validated actions through adb. Holds no state between calls.
pub struct TaskExecutor<'a> {
    adb: &'a Adb<'a>,
}

impl<'a> TaskExecutor<'a> {
    pub const fn new(adb: &'a Adb<'a>) -> Self {
        Self { adb }
    }

    pub fn execute(&self, action: &Action, device: Option<&str>) -> TaskOutcome {
        let args = invocation(action, device);
        let task = action.task();
        let label = device.unwrap_or("adb server");

        if let Action::Configure { port, ip: Some(ip) } = action {
            info!("{label} will listen on {ip}:{port} after switching to tcpip");
        }

        let (status, output, error) = match self.adb.run(&args) {
            Ok(out) if out.success => {
                info!("{task} succeeded on {label}");
                (OutcomeStatus::Succeeded, out.stdout, None)
            }
            Ok(out) => {
                let cause = out.failure_cause();
                warn!("{task} failed on {label}: {cause}");
                (OutcomeStatus::Failed, out.stdout, Some(cause))
            }
            Err(err) => {
                warn!("{task} failed on {label}: {err}");
                (OutcomeStatus::Failed, String::new(), Some(err.to_string()))
            }
        };

        TaskOutcome {
            device: device.map(str::to_string),
            status,
            output,
            error,
            invocation: args,
        }
    }
}
