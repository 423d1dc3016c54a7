//! External site builder invocation.
//!
//! The builder is a collaborator, not part of this crate: an external
//! command that transforms the source tree into a self-contained output
//! directory. Its own stdout/stderr are the primary diagnostic surface, so
//! both are inherited. Any failure is fatal to the process; the orchestrator
//! does not attempt partial recovery from a broken build.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use crate::config::BuilderConfig;

/// Errors from builder invocations.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("failed to run `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}")]
    Failed {
        command: String,
        status: std::process::ExitStatus,
    },
}

/// The external transformation step that turns source content into servable
/// output.
#[async_trait]
pub trait Builder: Send + Sync {
    /// One-time project scaffolding. Idempotent; invoked only when the
    /// manifest file changes.
    async fn init_project(&self, source_root: &Path) -> Result<(), BuildError>;

    /// Full rebuild of the output tree at the builder's conventional
    /// relative location under `source_root`.
    async fn build(&self, source_root: &Path) -> Result<(), BuildError>;
}

/// Runs the configured builder command (`gitbook` by default) with the
/// source root as working directory.
pub struct CommandBuilder {
    command: String,
}

impl CommandBuilder {
    pub fn new(config: &BuilderConfig) -> Self {
        Self {
            command: config.command.clone(),
        }
    }

    async fn run(&self, subcommand: &str, source_root: &Path) -> Result<(), BuildError> {
        let display = format!("{} {subcommand}", self.command);

        let status = Command::new(&self.command)
            .arg(subcommand)
            .current_dir(source_root)
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| BuildError::Spawn {
                command: display.clone(),
                source,
            })?;

        if !status.success() {
            return Err(BuildError::Failed {
                command: display,
                status,
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Builder for CommandBuilder {
    async fn init_project(&self, source_root: &Path) -> Result<(), BuildError> {
        self.run("init", source_root).await?;
        crate::log_event!("builder", "init complete");
        Ok(())
    }

    async fn build(&self, source_root: &Path) -> Result<(), BuildError> {
        self.run("build", source_root).await?;
        crate::log_event!("builder", "build complete");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn command_builder(command: &str) -> CommandBuilder {
        CommandBuilder::new(&BuilderConfig {
            command: command.to_string(),
            ..BuilderConfig::default()
        })
    }

    #[tokio::test]
    async fn missing_command_is_a_spawn_error() {
        let tmp = TempDir::new().unwrap();
        let builder = command_builder("sitewatch-no-such-builder");

        let err = builder.build(tmp.path()).await.unwrap_err();
        assert!(matches!(err, BuildError::Spawn { .. }));
    }

    #[tokio::test]
    async fn nonzero_exit_is_a_failure() {
        let tmp = TempDir::new().unwrap();
        // `false` ignores its argument and exits 1 on any platform we target.
        let builder = command_builder("false");

        let err = builder.build(tmp.path()).await.unwrap_err();
        match err {
            BuildError::Failed { command, .. } => assert_eq!(command, "false build"),
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn successful_command_passes() {
        let tmp = TempDir::new().unwrap();
        // `true` exits 0 regardless of the subcommand argument.
        let builder = command_builder("true");

        builder.init_project(tmp.path()).await.unwrap();
        builder.build(tmp.path()).await.unwrap();
    }
}
