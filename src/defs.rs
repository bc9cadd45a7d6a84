/// Serial or emulator name as reported by `adb devices`.
pub type DeviceId = String;

pub const APP_DIR: &str = "adb-fleet";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const LOG_FILE_NAME: &str = "latest.log";
pub const ENV_PREFIX: &str = "ADB_FLEET";

pub const DEFAULT_ADB_LOCATION: &str = "/root/Android/Sdk/platform-tools/adb";
pub const DEFAULT_TARGET: &str = "all";
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 300;

/// Line prefix that marks an emulator entry in `adb devices -l` output.
pub const EMULATOR_MARKER: &str = "\nemulator";
