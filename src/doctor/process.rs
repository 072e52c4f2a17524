//! Installer and verifier commands
//!
//! Both are shell commands run in the project directory. Output is captured
//! for failure attribution. On unix each command runs in its own process
//! group, and the whole group is killed if the run is cancelled, so test
//! runners started by the shell do not outlive a timeout.

use crate::error::{ProcessError, ProcessStage};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Maximum number of bytes of captured output kept as failure evidence
const MAX_CAPTURED_OUTPUT: usize = 8 * 1024;

/// Installs dependencies for the current manifest and lock state
#[async_trait]
pub trait Installer: Send + Sync {
    async fn install(&self, dir: &Path) -> Result<(), ProcessError>;
}

/// Verifies the installed project; exit status is the only signal
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, dir: &Path) -> Result<(), ProcessError>;
}

/// A shell command bound to a doctor stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellCommand {
    stage: ProcessStage,
    command: String,
}

impl ShellCommand {
    /// Command installing dependencies
    pub fn install(command: impl Into<String>) -> Self {
        Self {
            stage: ProcessStage::Install,
            command: command.into(),
        }
    }

    /// Command verifying the project
    pub fn test(command: impl Into<String>) -> Self {
        Self {
            stage: ProcessStage::Test,
            command: command.into(),
        }
    }

    /// The command line
    pub fn command(&self) -> &str {
        &self.command
    }

    /// Run the command in `dir`
    pub async fn run(&self, dir: &Path) -> Result<(), ProcessError> {
        debug!("running `{}` in {}", self.command, dir.display());

        let mut command = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C");
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c");
            c
        };
        command
            .arg(&self.command)
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let child = command
            .spawn()
            .map_err(|e| self.failure(None, format!("failed to execute command: {}", e)))?;
        let group = GroupKill { pgid: child.id() };
        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.failure(None, format!("failed to wait for command: {}", e)))?;
        group.disarm();

        if output.status.success() {
            return Ok(());
        }

        let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
        captured.push_str(&String::from_utf8_lossy(&output.stderr));
        Err(self.failure(output.status.code(), tail(&captured, MAX_CAPTURED_OUTPUT)))
    }

    fn failure(&self, exit_code: Option<i32>, output: impl Into<String>) -> ProcessError {
        ProcessError {
            stage: self.stage,
            command: self.command.clone(),
            exit_code,
            output: output.into(),
        }
    }
}

#[async_trait]
impl Installer for ShellCommand {
    async fn install(&self, dir: &Path) -> Result<(), ProcessError> {
        self.run(dir).await
    }
}

#[async_trait]
impl Verifier for ShellCommand {
    async fn verify(&self, dir: &Path) -> Result<(), ProcessError> {
        self.run(dir).await
    }
}

/// Kills a command's process group when dropped before the command finished
struct GroupKill {
    pgid: Option<u32>,
}

impl GroupKill {
    fn disarm(mut self) {
        self.pgid = None;
    }
}

impl Drop for GroupKill {
    fn drop(&mut self) {
        #[cfg(unix)]
        {
            if let Some(pgid) = self.pgid.take() {
                debug!("killing process group {}", pgid);
                // SAFETY: kill() only sends a signal; a negative pid addresses the group
                unsafe {
                    libc::kill(-(pgid as libc::pid_t), libc::SIGKILL);
                }
            }
        }
        #[cfg(not(unix))]
        let _ = self.pgid.take();
    }
}

/// Last `max` bytes of `s`, cut at a character boundary
fn tail(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut start = s.len() - max;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_string()
}
