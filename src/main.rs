mod adb;
mod cli;
mod config;
mod defs;
mod dispatch;
mod error;
mod executor;
mod logging;
mod process;
mod target;
mod task;

use std::io::{self, IsTerminal};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::anyhow;
use clap::CommandFactory;
use clap::Parser;
use clap_complete::generate;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::cli::Cli;
use crate::cli::RunArgs;
use crate::cli::TopLevel;
use crate::config::ParamsFile;
use crate::defs::DEFAULT_ADB_LOCATION;
use crate::defs::DEFAULT_TARGET;
use crate::dispatch::{DispatchConfig, DispatchOutput, DispatchResult, Dispatcher};
use crate::process::SystemRunner;
use crate::target::{TargetSpec, TerminalPrompt};

fn main() -> anyhow::Result<ExitCode> {
    let _guard = logging::init_logging()?;

    let cli = Cli::parse();

    match cli.command {
        Some(TopLevel::Run(args)) => run(&args),

        Some(TopLevel::Completion { shell }) => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(shell, &mut cmd, bin_name, &mut io::stdout());
            Ok(ExitCode::SUCCESS)
        }

        None => {
            Cli::command().print_help()?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn run(args: &RunArgs) -> anyhow::Result<ExitCode> {
    let app_config = config::load_config()?;
    let file = match &args.params {
        Some(path) => config::load_params(path)?,
        None => ParamsFile::default(),
    };

    // flags, then arguments file, then user config, then built-in defaults
    let task = args
        .task
        .or(file.task)
        .ok_or_else(|| anyhow!("no task given: pass --task or set `task` in the arguments file"))?;
    let target = args
        .target
        .clone()
        .or(file.target)
        .or(app_config.default_target)
        .unwrap_or_else(|| DEFAULT_TARGET.to_string());
    let adb_location = args
        .adb_location
        .clone()
        .or(file.adb_location)
        .or(app_config.adb_location)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ADB_LOCATION));
    let timeout = args.timeout.unwrap_or(app_config.command_timeout_secs).max(1);

    let config = DispatchConfig {
        adb_location,
        task,
        target: TargetSpec::parse(&target),
        params: args.task_params().or(file.params),
        check_mode: args.check,
    };
    info!("running {task} on target `{target}`");

    let runner = SystemRunner::new(Duration::from_secs(timeout));
    let mut prompt = TerminalPrompt;
    let progress = progress_bar(args.json || config.target == TargetSpec::Interactive)?;

    let mut dispatcher = Dispatcher::new(&config, &runner, &mut prompt).with_progress(progress);
    let result = dispatcher.run();
    debug!("dispatch ended in {} state", dispatcher.phase());

    report(&result, args.json)?;

    Ok(if result.status {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn progress_bar(hidden: bool) -> anyhow::Result<ProgressBar> {
    if hidden || !io::stderr().is_terminal() {
        return Ok(ProgressBar::hidden());
    }

    let bar = ProgressBar::new(0);
    bar.set_style(ProgressStyle::with_template(
        "{spinner:.cyan} [{pos}/{len}] {msg}",
    )?);
    Ok(bar)
}

fn report(result: &DispatchResult, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    match &result.output {
        DispatchOutput::Devices(devices) => {
            for device in devices {
                println!("{device}");
            }
        }
        DispatchOutput::Text(text) => print!("{text}"),
        DispatchOutput::None => {}
    }
    if let Some(msg) = &result.msg {
        println!("{msg}");
    }

    let failed = result.failures().count();
    if !result.outcomes.is_empty() {
        info!(
            "{} device(s) processed, {failed} failed, changed={}",
            result.outcomes.len(),
            result.changed
        );
    }
    for outcome in result.failures() {
        warn!(
            "{}: {}",
            outcome.device.as_deref().unwrap_or("adb server"),
            outcome.error.as_deref().unwrap_or("failed")
        );
    }

    Ok(())
}
