use crate::gcloud::GcloudError;
use std::path::PathBuf;
use std::process::Stdio;

/// Runs gcloud subcommands. The Cloud Run client only needs it for access
/// tokens; tests substitute a mock.
#[allow(async_fn_in_trait)]
pub trait GcloudExecutor: Send + Sync {
    /// Run `gcloud <args>` and return its stdout.
    async fn exec(&self, args: &[String]) -> Result<String, GcloudError>;
}

/// Spawns the gcloud binary, `gcloud` from `PATH` unless told otherwise.
///
/// The child never reads stdin, so an expired login fails instead of
/// prompting, and it is killed if the caller stops waiting.
#[derive(Debug, Clone)]
pub struct RealExecutor {
    program: PathBuf,
}

impl RealExecutor {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for RealExecutor {
    fn default() -> Self {
        Self::new("gcloud")
    }
}

impl GcloudExecutor for RealExecutor {
    async fn exec(&self, args: &[String]) -> Result<String, GcloudError> {
        let command = args.join(" ");
        tracing::debug!(program = ?self.program, %command, "running gcloud");

        let output = tokio::process::Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| GcloudError::Spawn {
                program: self.program.clone(),
                source: e,
            })?;

        if !output.status.success() {
            return Err(GcloudError::CommandFailed {
                command,
                exit_code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        String::from_utf8(output.stdout).map_err(|e| GcloudError::InvalidUtf8 { command, source: e })
    }
}
