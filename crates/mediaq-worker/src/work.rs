//! Work function that runs an external analysis command per item.
//!
//! Exit status contract: `0` is success, `75` (EX_TEMPFAIL) is a transient
//! failure, anything else is permanent. Failing to spawn the command at all
//! counts as transient.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing;

use mediaq_core::error::AppError;
use mediaq_core::traits::{WorkError, WorkFunction};
use mediaq_core::types::{ItemId, MediaKind};

/// Exit code that asks for a retry.
pub const EXIT_TEMPFAIL: i32 = 75;

/// Runs a configured command for each item
#[derive(Debug, Clone)]
pub struct CommandWorkFunction {
    /// Program to run
    program: String,
    /// Argument templates
    args: Vec<String>,
}

impl CommandWorkFunction {
    /// Create from an argv template. `{kind}` and `{id}` are substituted in
    /// every element.
    pub fn new(command: &[String]) -> Result<Self, AppError> {
        let (program, args) = command.split_first().ok_or_else(|| {
            AppError::configuration("processing.command must name a program")
        })?;
        Ok(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }

    /// Substitute template placeholders in arguments
    pub fn substitute_args(&self, item_id: ItemId, kind: MediaKind) -> Vec<String> {
        let id = item_id.to_string();
        self.args
            .iter()
            .map(|arg| arg.replace("{kind}", kind.as_str()).replace("{id}", &id))
            .collect()
    }
}

#[async_trait]
impl WorkFunction for CommandWorkFunction {
    async fn process(
        &self,
        item_id: ItemId,
        kind: MediaKind,
        cancel: CancellationToken,
    ) -> Result<(), WorkError> {
        let args = self.substitute_args(item_id, kind);
        let start = std::time::Instant::now();

        tracing::debug!(
            item_id = %item_id,
            command = %self.program,
            ?args,
            "Running analysis command"
        );

        let mut cmd = Command::new(&self.program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| {
            WorkError::Transient(format!("Failed to start '{}': {}", self.program, e))
        })?;

        let output = tokio::select! {
            _ = cancel.cancelled() => {
                tracing::warn!(item_id = %item_id, "Analysis cancelled, killing command");
                return Err(WorkError::Transient("Analysis cancelled".to_string()));
            }
            output = child.wait_with_output() => output.map_err(|e| {
                WorkError::Transient(format!("Failed to wait for '{}': {}", self.program, e))
            })?,
        };

        let duration_ms = start.elapsed().as_millis() as u64;
        let stderr: String = String::from_utf8_lossy(&output.stderr)
            .chars()
            .take(2000)
            .collect();

        match output.status.code() {
            Some(0) => {
                tracing::debug!(item_id = %item_id, duration_ms, "Analysis completed");
                Ok(())
            }
            Some(EXIT_TEMPFAIL) => Err(WorkError::Transient(format!(
                "Analysis asked for retry: {}",
                stderr.trim()
            ))),
            Some(code) => Err(WorkError::Permanent(format!(
                "Analysis failed with exit code {}: {}",
                code,
                stderr.trim()
            ))),
            None => Err(WorkError::Transient(format!(
                "Analysis terminated by signal: {}",
                stderr.trim()
            ))),
        }
    }
}
