use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{FleetError, Result};

/// Device-management operations understood by the dispatcher.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Task {
    Reboot,
    Install,
    Reinstall,
    Uninstall,
    Copy,
    Fetch,
    Kill,
    Configure,
    List,
    Shell,
}

/// How often a task runs relative to the resolved targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// One invocation per target.
    PerDevice,
    /// One invocation, no device selector.
    Once,
    /// No invocation; answered from the inventory.
    Inventory,
}

impl Task {
    pub const fn required_params(self) -> &'static [Param] {
        match self {
            Self::Reboot | Self::Kill | Self::List => &[],
            Self::Install | Self::Reinstall => &[Param::Src],
            Self::Uninstall => &[Param::PkgName],
            Self::Copy | Self::Fetch => &[Param::Src, Param::Dst],
            Self::Configure => &[Param::Port],
            Self::Shell => &[Param::Command],
        }
    }

    /// Caller-facing message when a required parameter is absent.
    pub const fn missing_parameter_reason(self) -> &'static str {
        match self {
            Self::Install | Self::Reinstall => "no src found",
            Self::Uninstall => "no package to uninstall found",
            Self::Copy | Self::Fetch => "Source/Destination not found",
            Self::Configure => "Port not found",
            Self::Shell => "command not found",
            Self::Reboot | Self::Kill | Self::List => "missing parameter",
        }
    }

    pub const fn scope(self) -> Scope {
        match self {
            Self::Kill => Scope::Once,
            Self::List => Scope::Inventory,
            _ => Scope::PerDevice,
        }
    }

    /// Whether a successful run changes device or server state.
    pub const fn is_mutating(self) -> bool {
        !matches!(self, Self::List | Self::Shell)
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .to_possible_value()
            .map(|v| v.get_name().to_string())
            .unwrap_or_default();
        f.write_str(&name)
    }
}

/// Named task parameter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Param {
    Src,
    Dst,
    PkgName,
    Port,
    Command,
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Src => "src",
            Self::Dst => "dst",
            Self::PkgName => "pkgName",
            Self::Port => "port",
            Self::Command => "command",
        })
    }
}

/// Optional-field parameter bag supplied by the caller.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TaskParams {
    pub src: Option<String>,
    #[serde(alias = "dest")]
    pub dst: Option<String>,
    #[serde(alias = "pkgName", alias = "pkgname", alias = "pkg-name")]
    pub pkg_name: Option<String>,
    pub port: Option<String>,
    pub ip: Option<String>,
    pub command: Option<String>,
}

impl TaskParams {
    /// Fills every unset field from `fallback`.
    pub fn or(self, fallback: Self) -> Self {
        Self {
            src: self.src.or(fallback.src),
            dst: self.dst.or(fallback.dst),
            pkg_name: self.pkg_name.or(fallback.pkg_name),
            port: self.port.or(fallback.port),
            ip: self.ip.or(fallback.ip),
            command: self.command.or(fallback.command),
        }
    }

    /// Value of `param`, treating blank strings as absent.
    pub fn get(&self, param: Param) -> Option<&str> {
        let value = match param {
            Param::Src => &self.src,
            Param::Dst => &self.dst,
            Param::PkgName => &self.pkg_name,
            Param::Port => &self.port,
            Param::Command => &self.command,
        };
        value.as_deref().filter(|v| !v.trim().is_empty())
    }
}

/// A task whose required parameters are known to be present.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Action {
    Reboot,
    Install { src: String },
    Reinstall { src: String },
    Uninstall { pkg_name: String },
    Copy { src: String, dst: String },
    Fetch { src: String, dst: String },
    Kill,
    Configure { port: String, ip: Option<String> },
    List,
    Shell { command: String },
}

impl Action {
    pub const fn task(&self) -> Task {
        match self {
            Self::Reboot => Task::Reboot,
            Self::Install { .. } => Task::Install,
            Self::Reinstall { .. } => Task::Reinstall,
            Self::Uninstall { .. } => Task::Uninstall,
            Self::Copy { .. } => Task::Copy,
            Self::Fetch { .. } => Task::Fetch,
            Self::Kill => Task::Kill,
            Self::Configure { .. } => Task::Configure,
            Self::List => Task::List,
            Self::Shell { .. } => Task::Shell,
        }
    }
}

/// Checks that every parameter `task` needs is present.
///
/// Runs once, before any device is touched; the first missing field in
/// [`Task::required_params`] order is reported.
pub fn validate(task: Task, params: &TaskParams) -> Result<Action> {
    for &field in task.required_params() {
        if params.get(field).is_none() {
            return Err(FleetError::MissingParameter { task, field });
        }
    }

    let take = |field: Param| params.get(field).unwrap_or_default().to_string();

    Ok(match task {
        Task::Reboot => Action::Reboot,
        Task::Install => Action::Install {
            src: take(Param::Src),
        },
        Task::Reinstall => Action::Reinstall {
            src: take(Param::Src),
        },
        Task::Uninstall => Action::Uninstall {
            pkg_name: take(Param::PkgName),
        },
        Task::Copy => Action::Copy {
            src: take(Param::Src),
            dst: take(Param::Dst),
        },
        Task::Fetch => Action::Fetch {
            src: take(Param::Src),
            dst: take(Param::Dst),
        },
        Task::Kill => Action::Kill,
        Task::Configure => Action::Configure {
            port: take(Param::Port),
            ip: params.ip.clone().filter(|ip| !ip.trim().is_empty()),
        },
        Task::List => Action::List,
        Task::Shell => Action::Shell {
            command: take(Param::Command),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn missing(task: Task, params: &TaskParams) -> Param {
        match validate(task, params) {
            Err(FleetError::MissingParameter { field, .. }) => field,
            other => panic!("expected missing parameter, got {other:?}"),
        }
    }

    #[test]
    fn install_requires_src() {
        assert_eq!(missing(Task::Install, &TaskParams::default()), Param::Src);

        let params = TaskParams {
            src: Some("a.apk".into()),
            ..Default::default()
        };
        assert_eq!(
            validate(Task::Install, &params).unwrap(),
            Action::Install {
                src: "a.apk".into()
            }
        );
    }

    #[test]
    fn copy_and_fetch_need_both_paths() {
        let only_src = TaskParams {
            src: Some("/sdcard/a".into()),
            ..Default::default()
        };
        assert_eq!(missing(Task::Copy, &only_src), Param::Dst);
        assert_eq!(missing(Task::Fetch, &TaskParams::default()), Param::Src);
    }

    #[test]
    fn blank_values_count_as_missing() {
        let params = TaskParams {
            command: Some("   ".into()),
            ..Default::default()
        };
        assert_eq!(missing(Task::Shell, &params), Param::Command);
    }

    #[test]
    fn parameterless_tasks_always_validate() {
        for task in [Task::Reboot, Task::Kill, Task::List] {
            assert!(validate(task, &TaskParams::default()).is_ok());
        }
    }

    #[test]
    fn required_table_matches_reasons() {
        let cases = [
            (Task::Uninstall, Param::PkgName, "no package to uninstall found"),
            (Task::Configure, Param::Port, "Port not found"),
            (Task::Shell, Param::Command, "command not found"),
            (Task::Reinstall, Param::Src, "no src found"),
        ];
        for (task, field, reason) in cases {
            let err = validate(task, &TaskParams::default()).unwrap_err();
            assert_eq!(err.to_string(), reason);
            assert_eq!(missing(task, &TaskParams::default()), field);
        }
    }

    #[test]
    fn every_action_reports_its_task() {
        for task in Task::value_variants() {
            let params = TaskParams {
                src: Some("s".into()),
                dst: Some("d".into()),
                pkg_name: Some("p".into()),
                port: Some("5555".into()),
                ip: None,
                command: Some("id".into()),
            };
            assert_eq!(validate(*task, &params).unwrap().task(), *task);
        }
    }

    #[test]
    fn params_merge_prefers_self() {
        let cli = TaskParams {
            src: Some("cli.apk".into()),
            ..Default::default()
        };
        let file = TaskParams {
            src: Some("file.apk".into()),
            port: Some("5555".into()),
            ..Default::default()
        };
        let merged = cli.or(file);
        assert_eq!(merged.src.as_deref(), Some("cli.apk"));
        assert_eq!(merged.port.as_deref(), Some("5555"));
    }

    #[test]
    fn task_names_are_lowercase() {
        assert_eq!(Task::Configure.to_string(), "configure");
        assert_eq!(Task::from_str("shell", true).unwrap(), Task::Shell);
    }
}
