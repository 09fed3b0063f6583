//! Running compiled commands

use crate::command::CompiledCommand;
use crate::error::{CompileError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

/// Captured output of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs a compiled command against the provisioning executor
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn run(&self, command: &CompiledCommand) -> Result<ExecutionOutput>;
}

/// Spawns the devops command as a child process
///
/// Sensitive flags go to the child's argument list only; logs see the
/// redacted rendering.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    program: String,
}

impl ProcessExecutor {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

#[async_trait]
impl NodeExecutor for ProcessExecutor {
    async fn run(&self, command: &CompiledCommand) -> Result<ExecutionOutput> {
        let mut cmd = Command::new(&self.program);
        cmd.args(command.process_args());
        cmd.envs(&command.env);
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        tracing::debug!("Running: {} {}", self.program, command);

        let output = cmd.output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let code = output
                .status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string());
            return Err(CompileError::Execution(format!(
                "{} exited with {}: {}",
                self.program,
                code,
                stderr.trim()
            )));
        }

        Ok(ExecutionOutput { stdout, stderr })
    }
}
