use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::task::{Param, Task};

/// Fatal errors: any of these aborts the run before a device is touched.
#[derive(Error, Debug)]
pub enum FleetError {
    #[error("error in adbLocation")]
    ToolUnavailable {
        location: PathBuf,
        #[source]
        source: ProcessError,
    },

    #[error("{}", task.missing_parameter_reason())]
    MissingParameter { task: Task, field: Param },

    #[error("adb devices failed with code {}: {stderr}", code.unwrap_or(-1))]
    ListingFailed { code: Option<i32>, stderr: String },

    #[error("no device entered")]
    NoTargetEntered,

    #[error("failed to read target from terminal")]
    Prompt(#[from] io::Error),
}

impl FleetError {
    /// Name of the taxonomy bucket, used in structured logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ToolUnavailable { .. } | Self::ListingFailed { .. } => "tool_unavailable",
            Self::MissingParameter { .. } => "missing_parameter",
            Self::NoTargetEntered | Self::Prompt(_) => "target_resolution",
        }
    }
}

/// Failure of a single external process invocation.
#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} did not finish within {}s", timeout.as_secs())]
    TimedOut { program: String, timeout: Duration },

    #[error("{program} {cause}")]
    Exited { program: String, cause: String },

    #[error("failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, FleetError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_parameter_reason_depends_on_task() {
        let err = FleetError::MissingParameter {
            task: Task::Install,
            field: Param::Src,
        };
        assert_eq!(err.to_string(), "no src found");

        let err = FleetError::MissingParameter {
            task: Task::Fetch,
            field: Param::Dst,
        };
        assert_eq!(err.to_string(), "Source/Destination not found");
    }

    #[test]
    fn tool_unavailable_keeps_reason_and_source() {
        let err = FleetError::ToolUnavailable {
            location: PathBuf::from("/nope/adb"),
            source: ProcessError::Spawn {
                program: "/nope/adb".into(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        };
        assert_eq!(err.to_string(), "error in adbLocation");
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.kind(), "tool_unavailable");
    }

    #[test]
    fn prompt_cause_is_reported_once() {
        let err = FleetError::from(io::Error::other("not a terminal"));
        assert_eq!(err.to_string(), "failed to read target from terminal");

        let chain = format!("{:#}", anyhow::Error::from(err));
        assert_eq!(chain.matches("not a terminal").count(), 1);
    }
}
