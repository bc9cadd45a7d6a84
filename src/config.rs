use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::Context;
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::defs::{APP_DIR, CONFIG_FILE_NAME, DEFAULT_COMMAND_TIMEOUT_SECS, ENV_PREFIX};
use crate::task::{Task, TaskParams};

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub adb_location: Option<PathBuf>,
    pub default_target: Option<String>,
    pub command_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            adb_location: None,
            default_target: None,
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
        }
    }
}

/// Arguments file handed over by an automation host.
///
/// Uses the same field names as the playbook options, so `adbLocation`
/// and `pkgName` are accepted as well as their snake_case forms.
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ParamsFile {
    pub task: Option<Task>,
    pub target: Option<String>,
    #[serde(alias = "adbLocation", alias = "adblocation")]
    pub adb_location: Option<PathBuf>,
    #[serde(flatten)]
    pub params: TaskParams,
}

pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        Path::new(&xdg).join(APP_DIR)
    } else if let Ok(home) = std::env::var("HOME") {
        Path::new(&home).join(".config").join(APP_DIR)
    } else {
        PathBuf::from(APP_DIR)
    }
}

fn ensure_config_file(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        fs::write(
            path,
            "# adb-fleet configuration\n\
             \n\
             # adb_location = \"/root/Android/Sdk/platform-tools/adb\"\n\
             # default_target = \"all\"\n\
             # command_timeout_secs = 300\n",
        )?;
    }

    Ok(())
}

/// Loads the user config, creating a commented template on first run.
pub fn load_config() -> anyhow::Result<AppConfig> {
    let path = config_dir().join(CONFIG_FILE_NAME);

    ensure_config_file(&path)
        .with_context(|| format!("failed to prepare config file {}", path.display()))?;

    load_config_from(&path)
}

pub fn load_config_from(path: &Path) -> anyhow::Result<AppConfig> {
    Config::builder()
        .add_source(File::from(path).required(false))
        .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
        .build()
        .and_then(|config| config.try_deserialize())
        .with_context(|| format!("failed to load config {}", path.display()))
}

/// Reads a TOML, YAML or JSON arguments file; the format follows the extension.
pub fn load_params(path: &Path) -> anyhow::Result<ParamsFile> {
    Config::builder()
        .add_source(File::from(path))
        .build()
        .and_then(|config| config.try_deserialize())
        .with_context(|| format!("failed to read parameters from {}", path.display()))
}
