use std::io::{self, BufRead, IsTerminal};

use dialoguer::Input;
use dialoguer::theme::ColorfulTheme;
use tracing::{debug, info};

use crate::adb::{Adb, DeviceInventory};
use crate::defs::DeviceId;
use crate::error::{FleetError, Result};

/// Which devices a task is aimed at.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TargetSpec {
    Explicit(DeviceId),
    All,
    Interactive,
}

impl TargetSpec {
    /// `all` and `input` are keywords; anything else names a device.
    pub fn parse(value: &str) -> Self {
        match value.trim() {
            "" | "all" => Self::All,
            "input" => Self::Interactive,
            id => Self::Explicit(id.to_string()),
        }
    }
}

/// Operator interaction used by [`TargetSpec::Interactive`].
pub trait TargetPrompt {
    /// Shows the raw device listing before asking.
    fn display(&mut self, listing: &str);

    fn read_target_id(&mut self) -> io::Result<String>;
}

/// Prompts on the controlling terminal, or reads one line when stdin is piped.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl TargetPrompt for TerminalPrompt {
    fn display(&mut self, listing: &str) {
        eprintln!("{}", listing.trim_end());
    }

    fn read_target_id(&mut self) -> io::Result<String> {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return read_line(&mut stdin.lock());
        }

        Input::<String>::with_theme(&ColorfulTheme::default())
            .with_prompt("Enter the name of the Device")
            .allow_empty(true)
            .interact_text()
            .map_err(io::Error::other)
    }
}

fn read_line(reader: &mut impl BufRead) -> io::Result<String> {
    let mut line = String::new();
    reader.read_line(&mut line)?;
    Ok(line)
}

/// Concrete targets plus the inventory consulted to find them, if any.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub targets: Vec<DeviceId>,
    pub inventory: Option<DeviceInventory>,
}

pub fn resolve(
    spec: &TargetSpec,
    adb: &Adb<'_>,
    prompt: &mut dyn TargetPrompt,
) -> Result<Resolution> {
    let resolution = match spec {
        // caller-supplied ids are trusted, not checked against adb
        TargetSpec::Explicit(id) => Resolution {
            targets: vec![id.clone()],
            inventory: None,
        },

        TargetSpec::All => {
            let inventory = adb.list_devices()?;
            Resolution {
                targets: inventory.devices.clone(),
                inventory: Some(inventory),
            }
        }

        TargetSpec::Interactive => {
            let inventory = adb.list_devices()?;
            prompt.display(&inventory.raw);
            let entered = prompt.read_target_id()?;
            let id = entered.trim();
            if id.is_empty() {
                return Err(FleetError::NoTargetEntered);
            }
            debug!("operator selected {id}");
            Resolution {
                targets: vec![id.to_string()],
                inventory: Some(inventory),
            }
        }
    };

    info!("resolved {} target(s)", resolution.targets.len());
    Ok(resolution)
}
