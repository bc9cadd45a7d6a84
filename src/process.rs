use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::error::ProcessError;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Captured result of a finished process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Short human readable cause for a failed run.
    pub fn failure_cause(&self) -> String {
        let stderr = self.stderr.trim();
        let code = self.code.unwrap_or(-1);
        if stderr.is_empty() {
            format!("exited with code {code}")
        } else {
            format!("exited with code {code}: {stderr}")
        }
    }
}

/// Seam between the dispatcher and the operating system.
pub trait CommandRunner {
    fn run(&self, program: &Path, args: &[String]) -> Result<CommandOutput, ProcessError>;
}

/// Runs real processes, killing any that outlive `timeout`.
#[derive(Debug, Clone, Copy)]
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn timed_out(&self, program: String) -> ProcessError {
        ProcessError::TimedOut {
            program,
            timeout: self.timeout,
        }
    }
}

impl CommandRunner for SystemRunner {
    fn run(&self, program: &Path, args: &[String]) -> Result<CommandOutput, ProcessError> {
        let name = program.display().to_string();
        debug!("running {name} {}", args.join(" "));

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ProcessError::Spawn {
                program: name.clone(),
                source,
            })?;

        let deadline = Instant::now() + self.timeout;
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match wait_bounded(&mut child, deadline) {
            Ok(Some(status)) => status,
            Ok(None) => {
                warn!("{name} timed out after {}s, killing it", self.timeout.as_secs());
                let _ = child.kill();
                let _ = child.wait();
                return Err(self.timed_out(name));
            }
            Err(source) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ProcessError::Wait {
                    program: name,
                    source,
                });
            }
        };

        // a grandchild can keep the pipes open after the child exits
        let (Some(stdout), Some(stderr)) = (collect(stdout, deadline), collect(stderr, deadline))
        else {
            warn!("{name} left its output open past {}s", self.timeout.as_secs());
            return Err(self.timed_out(name));
        };

        let output = CommandOutput {
            success: status.success(),
            code: status.code(),
            stdout,
            stderr,
        };
        trace!(?output, "{name} finished");
        Ok(output)
    }
}

fn wait_bounded(child: &mut Child, deadline: Instant) -> std::io::Result<Option<ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Reads a pipe to the end on its own thread. The thread is abandoned if
/// the caller stops waiting.
fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<Receiver<Vec<u8>>> {
    pipe.map(|mut pipe| {
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            let _ = tx.send(buf);
        });
        rx
    })
}

/// `None` when the pipe is still open at the deadline.
fn collect(rx: Option<Receiver<Vec<u8>>>, deadline: Instant) -> Option<String> {
    let Some(rx) = rx else {
        return Some(String::new());
    };
    let remaining = deadline.saturating_duration_since(Instant::now());
    rx.recv_timeout(remaining.max(POLL_INTERVAL))
        .ok()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["-c".to_string(), script.to_string()]
    }

    #[test]
    fn captures_stdout_and_exit_code() {
        let runner = SystemRunner::new(Duration::from_secs(5));
        let out = runner
            .run(Path::new("sh"), &sh("echo hello; echo oops >&2; exit 3"))
            .unwrap();
        assert!(!out.success);
        assert_eq!(out.code, Some(3));
        assert_eq!(out.stdout, "hello\n");
        assert_eq!(out.failure_cause(), "exited with code 3: oops");
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let runner = SystemRunner::new(Duration::from_secs(5));
        let err = runner
            .run(Path::new("/definitely/not/here/adb"), &[])
            .unwrap_err();
        assert!(matches!(err, ProcessError::Spawn { .. }));
    }

    #[test]
    fn hung_process_is_killed() {
        let runner = SystemRunner::new(Duration::from_millis(200));
        let err = runner.run(Path::new("sh"), &sh("exec sleep 10")).unwrap_err();
        assert!(matches!(err, ProcessError::TimedOut { .. }));
    }

    #[test]
    fn background_child_holding_output_is_bounded() {
        let runner = SystemRunner::new(Duration::from_millis(200));
        let start = Instant::now();
        let err = runner
            .run(Path::new("sh"), &sh("sleep 5 & echo hi"))
            .unwrap_err();

        assert!(matches!(err, ProcessError::TimedOut { .. }));
        assert!(start.elapsed() < Duration::from_secs(2));
    }
}
