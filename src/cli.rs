use std::path::PathBuf;

use clap::builder::Styles;
use clap::builder::styling::AnsiColor;
use clap::builder::styling::Effects;
use clap::{Args, Parser, Subcommand, crate_description, crate_name, crate_version};
use clap_complete::Shell;

use crate::task::{Task, TaskParams};

#[derive(Parser)]
#[command(name = crate_name!(),
    version = crate_version!(),
    about = crate_description!(),
    styles = Styles::styled()
        .header(AnsiColor::BrightGreen.on_default() | Effects::BOLD | Effects::UNDERLINE)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::BrightCyan.on_default() | Effects::BOLD)
        .placeholder(AnsiColor::Cyan.on_default()))]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<TopLevel>,
}

#[derive(Subcommand)]
pub enum TopLevel {
    /// Run a task on one, all or an interactively chosen device
    Run(RunArgs),

    /// Generate shell completion
    Completion {
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Args, Debug, Default)]
pub struct RunArgs {
    /// Task to perform
    #[arg(long, value_enum)]
    pub task: Option<Task>,

    /// Device id, `all` for every emulator, or `input` to choose interactively
    #[arg(long)]
    pub target: Option<String>,

    /// Path to the adb executable
    #[arg(long, alias = "adbLocation")]
    pub adb_location: Option<PathBuf>,

    /// Local file for install/reinstall/copy, device path for fetch
    #[arg(long)]
    pub src: Option<String>,

    /// Device path for copy, local path for fetch
    #[arg(long, alias = "dest")]
    pub dst: Option<String>,

    /// Package to uninstall
    #[arg(long, alias = "pkgName")]
    pub pkg_name: Option<String>,

    /// Port for `configure` (adb tcpip)
    #[arg(long)]
    pub port: Option<String>,

    /// Address the device will be reachable on after `configure`
    #[arg(long)]
    pub ip: Option<String>,

    /// Command line for `shell`
    #[arg(long)]
    pub command: Option<String>,

    /// Kill any adb invocation running longer than this many seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Resolve targets and validate parameters without touching any device
    #[arg(long)]
    pub check: bool,

    /// Print the result record as JSON
    #[arg(long)]
    pub json: bool,

    /// Arguments file (TOML, YAML or JSON); flags take precedence
    #[arg(long, value_name = "FILE")]
    pub params: Option<PathBuf>,
}

impl RunArgs {
    pub fn task_params(&self) -> TaskParams {
        TaskParams {
            src: self.src.clone(),
            dst: self.dst.clone(),
            pkg_name: self.pkg_name.clone(),
            port: self.port.clone(),
            ip: self.ip.clone(),
            command: self.command.clone(),
        }
    }
}
