use std::fmt;
use std::path::PathBuf;

use indicatif::ProgressBar;
use serde::{Serialize, Serializer};
use tracing::{debug, error, info, warn};

use crate::adb::Adb;
use crate::defs::DeviceId;
use crate::error::{FleetError, Result};
use crate::executor::{self, OutcomeStatus, TaskExecutor, TaskOutcome};
use crate::process::CommandRunner;
use crate::target::{self, TargetPrompt, TargetSpec};
use crate::task::{self, Action, Scope, Task, TaskParams};

/// Everything a run needs, fixed before the first process is spawned.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub adb_location: PathBuf,
    pub task: Task,
    pub target: TargetSpec,
    pub params: TaskParams,
    /// Resolve and validate, but do not touch any device.
    pub check_mode: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPhase {
    Init,
    PreflightCheck,
    ResolveTargets,
    ValidateTask,
    Executing(usize),
    Aggregate,
    Done,
    Failed,
}

impl fmt::Display for DispatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init => f.write_str("init"),
            Self::PreflightCheck => f.write_str("preflight"),
            Self::ResolveTargets => f.write_str("resolve"),
            Self::ValidateTask => f.write_str("validate"),
            Self::Executing(i) => write!(f, "executing[{i}]"),
            Self::Aggregate => f.write_str("aggregate"),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Consolidated output of read tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DispatchOutput {
    #[default]
    None,
    Devices(Vec<DeviceId>),
    Text(String),
}

impl Serialize for DispatchOutput {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::None => serializer.serialize_str(""),
            Self::Devices(devices) => devices.serialize(serializer),
            Self::Text(text) => serializer.serialize_str(text),
        }
    }
}

/// Result record handed back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchResult {
    pub status: bool,
    pub changed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    pub output: DispatchOutput,
    pub outcomes: Vec<TaskOutcome>,
}

impl DispatchResult {
    pub fn failed(msg: impl Into<String>) -> Self {
        Self {
            status: false,
            changed: false,
            msg: Some(msg.into()),
            output: DispatchOutput::None,
            outcomes: Vec::new(),
        }
    }

    fn listed(devices: Vec<DeviceId>) -> Self {
        Self {
            status: true,
            changed: false,
            msg: None,
            output: DispatchOutput::Devices(devices),
            outcomes: Vec::new(),
        }
    }

    /// Folds per-device outcomes into the caller-visible record.
    ///
    /// The run fails only when at least one device was attempted and every
    /// attempted device failed; skipped outcomes never count either way.
    fn aggregate(task: Task, outcomes: Vec<TaskOutcome>) -> Self {
        let attempted = outcomes
            .iter()
            .filter(|o| o.status != OutcomeStatus::Skipped)
            .count();
        let succeeded = outcomes.iter().filter(|o| o.succeeded()).count();
        let status = attempted == 0 || succeeded > 0;

        let output = if task == Task::Shell {
            DispatchOutput::Text(
                outcomes
                    .iter()
                    .filter(|o| o.succeeded())
                    .map(|o| o.output.as_str())
                    .collect(),
            )
        } else {
            DispatchOutput::None
        };

        Self {
            status,
            changed: task.is_mutating() && succeeded > 0,
            msg: (!status).then(|| format!("{task} failed on every target")),
            output,
            outcomes,
        }
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes
            .iter()
            .filter(|o| o.status == OutcomeStatus::Failed)
    }
}

/// Drives one task across the resolved fleet.
pub struct Dispatcher<'a> {
    config: &'a DispatchConfig,
    runner: &'a dyn CommandRunner,
    prompt: &'a mut dyn TargetPrompt,
    progress: ProgressBar,
    phase: DispatchPhase,
}

impl<'a> Dispatcher<'a> {
    pub fn new(
        config: &'a DispatchConfig,
        runner: &'a dyn CommandRunner,
        prompt: &'a mut dyn TargetPrompt,
    ) -> Self {
        Self {
            config,
            runner,
            prompt,
            progress: ProgressBar::hidden(),
            phase: DispatchPhase::Init,
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = progress;
        self
    }

    pub const fn phase(&self) -> DispatchPhase {
        self.phase
    }

    pub fn run(&mut self) -> DispatchResult {
        let outcome = self.pipeline();
        self.progress.finish_and_clear();

        match outcome {
            Ok(result) => {
                self.enter(DispatchPhase::Done);
                result
            }
            Err(err) => {
                self.enter(DispatchPhase::Failed);
                match &err {
                    FleetError::MissingParameter { task, field } => {
                        error!("{task} requires `{field}`");
                    }
                    FleetError::ToolUnavailable { location, .. } => {
                        error!("adb is not usable at {}", location.display());
                    }
                    _ => {}
                }
                let reason = err.to_string();
                let kind = err.kind();
                error!(kind, "{:#}", anyhow::Error::from(err));
                DispatchResult::failed(reason)
            }
        }
    }

    fn pipeline(&mut self) -> Result<DispatchResult> {
        let config = self.config;
        let adb = Adb::new(&config.adb_location, self.runner);

        self.enter(DispatchPhase::PreflightCheck);
        let version = adb.version()?;
        info!("using {} ({version})", adb.location().display());

        self.enter(DispatchPhase::ResolveTargets);
        let resolution = target::resolve(&config.target, &adb, &mut *self.prompt)?;

        self.enter(DispatchPhase::ValidateTask);
        let action = task::validate(config.task, &config.params)?;

        let executor = TaskExecutor::new(&adb);
        let outcomes = match config.task.scope() {
            Scope::Inventory => {
                let devices = match resolution.inventory {
                    Some(inventory) => inventory.devices,
                    None => adb.list_devices()?.devices,
                };
                self.enter(DispatchPhase::Aggregate);
                return Ok(DispatchResult::listed(devices));
            }

            Scope::Once => {
                self.enter(DispatchPhase::Executing(0));
                vec![self.run_one(&executor, &action, None)]
            }

            Scope::PerDevice => {
                if resolution.targets.is_empty() {
                    warn!("no target devices found, nothing to {}", config.task);
                }
                self.progress.set_length(resolution.targets.len() as u64);
                let mut outcomes = Vec::with_capacity(resolution.targets.len());
                for (i, device) in resolution.targets.iter().enumerate() {
                    self.enter(DispatchPhase::Executing(i));
                    self.progress.set_message(device.clone());
                    outcomes.push(self.run_one(&executor, &action, Some(device.as_str())));
                    self.progress.inc(1);
                }
                outcomes
            }
        };

        self.enter(DispatchPhase::Aggregate);
        Ok(DispatchResult::aggregate(config.task, outcomes))
    }

    fn run_one(
        &self,
        executor: &TaskExecutor<'_>,
        action: &Action,
        device: Option<&str>,
    ) -> TaskOutcome {
        if self.config.check_mode {
            let args = executor::invocation(action, device);
            info!("check mode, would run: adb {}", args.join(" "));
            return TaskOutcome::skipped(device, args);
        }
        executor.execute(action, device)
    }

    fn enter(&mut self, phase: DispatchPhase) {
        debug!("{} -> {phase}", self.phase);
        self.phase = phase;
    }
}
