use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::defs::{DeviceId, EMULATOR_MARKER};
use crate::error::{FleetError, ProcessError, Result};
use crate::process::{CommandOutput, CommandRunner};

/// Devices reported by one `adb devices -l` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInventory {
    pub raw: String,
    pub devices: Vec<DeviceId>,
}

/// Handle on the adb executable at a fixed location.
pub struct Adb<'r> {
    location: PathBuf,
    runner: &'r dyn CommandRunner,
}

impl<'r> Adb<'r> {
    pub fn new(location: impl Into<PathBuf>, runner: &'r dyn CommandRunner) -> Self {
        Self {
            location: location.into(),
            runner,
        }
    }

    pub fn location(&self) -> &Path {
        &self.location
    }

    pub fn run(&self, args: &[String]) -> std::result::Result<CommandOutput, ProcessError> {
        self.runner.run(&self.location, args)
    }

    /// Confirms the executable can be started at all.
    pub fn version(&self) -> Result<String> {
        let output = self
            .run(&["version".to_string()])
            .map_err(|source| self.unavailable(source))?;

        if !output.success {
            return Err(self.unavailable(ProcessError::Exited {
                program: self.location.display().to_string(),
                cause: output.failure_cause(),
            }));
        }

        let version = output.stdout.lines().next().unwrap_or_default().to_string();
        debug!("found {version}");
        Ok(version)
    }

    pub fn list_devices(&self) -> Result<DeviceInventory> {
        let output = self
            .run(&["devices".to_string(), "-l".to_string()])
            .map_err(|source| self.unavailable(source))?;

        if !output.success {
            return Err(FleetError::ListingFailed {
                code: output.code,
                stderr: output.stderr.trim().to_string(),
            });
        }

        let devices = parse_device_list(&output.stdout);
        info!("adb reports {} emulator(s)", devices.len());
        Ok(DeviceInventory {
            raw: output.stdout,
            devices,
        })
    }

    fn unavailable(&self, source: ProcessError) -> FleetError {
        FleetError::ToolUnavailable {
            location: self.location.clone(),
            source,
        }
    }
}

/// Extracts emulator identifiers from `adb devices -l` output.
///
/// Only entries whose line starts with `emulator` are recognised; physical
/// devices listed by serial number are skipped. Order of appearance is kept.
pub fn parse_device_list(raw: &str) -> Vec<DeviceId> {
    let mut devices = Vec::new();
    let mut rest = raw;

    while let Some(pos) = rest.find(EMULATOR_MARKER) {
        rest = &rest[pos + 1..];
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        devices.push(rest[..end].to_string());
    }

    devices
}
