use async_trait::async_trait;
use std::process::Stdio;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("failed to launch docker exec: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("server command `{command}` exited with status {code}")]
    Failed { command: String, code: i32 },
}

/// Seam to the live server's admin console.
#[async_trait]
pub trait ServerConsole: Send + Sync {
    async fn execute(&self, command: &str) -> Result<(), ExecutionError>;
}

#[async_trait]
impl<C: ServerConsole + ?Sized> ServerConsole for std::sync::Arc<C> {
    async fn execute(&self, command: &str) -> Result<(), ExecutionError> {
        (**self).execute(command).await
    }
}

/// Sends commands into the server container via `docker exec <name> rcon-cli <cmd>`.
pub struct DockerRcon {
    container: String,
    rcon_bin: String,
}

impl DockerRcon {
    pub fn new(container: String, rcon_bin: String) -> Self {
        Self { container, rcon_bin }
    }
}

#[async_trait]
impl ServerConsole for DockerRcon {
    async fn execute(&self, command: &str) -> Result<(), ExecutionError> {
        debug!("sending `{}` to container {}", command, self.container);
        let status = Command::new("docker")
            .arg("exec")
            .arg(&self.container)
            .arg(&self.rcon_bin)
            .arg(command)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .map_err(ExecutionError::Spawn)?;

        if !status.success() {
            return Err(ExecutionError::Failed {
                command: command.to_string(),
                code: status.code().unwrap_or(-1),
            });
        }
        Ok(())
    }
}
