//! Process runner for the external `smbclient` tool.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use sharecp_core::error::{ShareError, ShareResult};
use sharecp_core::Secret;

/// Program name looked up on `PATH` when none is configured.
pub const DEFAULT_PROGRAM: &str = "smbclient";

/// Captured result of one tool invocation.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// Both streams, for error classification. smbclient prints NT_STATUS
    /// codes on either one depending on version.
    pub fn diagnostics(&self) -> String {
        format!("{}\n{}", self.stdout, self.stderr)
    }
}

/// Runs the protocol tool with the given arguments.
///
/// The password, when present, travels in the child's environment and never
/// on its command line.
#[allow(async_fn_in_trait)]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, args: &[String], password: Option<&Secret>) -> ShareResult<CommandOutput>;
}

/// Spawns the real program.
#[derive(Debug, Clone)]
pub struct SystemRunner {
    program: PathBuf,
}

impl SystemRunner {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl CommandRunner for SystemRunner {
    async fn run(&self, args: &[String], password: Option<&Secret>) -> ShareResult<CommandOutput> {
        let mut cmd = Command::new(&self.program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_remove("PASSWD")
            .kill_on_drop(true);
        if let Some(password) = password {
            cmd.env("PASSWD", password.expose());
        }

        tracing::debug!(program = %self.program.display(), ?args, "running");

        let output = cmd.output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ShareError::Unsupported(format!(
                    "protocol tool '{}' not found; install smbclient or set its path",
                    self.program.display()
                ))
            } else {
                ShareError::Transport(format!("failed to run {}: {e}", self.program.display()))
            }
        })?;

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sharecp_core::ErrorKind;

    #[tokio::test]
    async fn missing_program_is_unsupported() {
        let runner = SystemRunner::new("/nonexistent/sharecp-test/smbclient");
        let err = runner.run(&["-V".to_string()], None).await.unwrap_err();
        assert!(matches!(err, ShareError::Unsupported(_)));
        assert_eq!(err.kind(), ErrorKind::Usage);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn password_goes_through_environment() {
        let runner = SystemRunner::new("sh");
        let args = vec!["-c".to_string(), "printf %s \"$PASSWD\"; echo oops >&2".to_string()];
        let out = runner
            .run(&args, Some(&Secret::new("hunter2")))
            .await
            .unwrap();
        assert!(out.success);
        assert_eq!(out.stdout, "hunter2");
        assert_eq!(out.stderr.trim(), "oops");
        assert!(!args.iter().any(|a| a.contains("hunter2")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn failure_status_is_reported() {
        let runner = SystemRunner::new("sh");
        let out = runner
            .run(&["-c".to_string(), "exit 3".to_string()], None)
            .await
            .unwrap();
        assert!(!out.success);
    }
}
