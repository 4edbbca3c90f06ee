//! Acquisition of raw tool output.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::process::Command;

use sensors2mqtt_common::Source;

use crate::config::SourceConfig;
use crate::{lm_sensors, nvidia_smi};

/// The tool could not produce output this cycle.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{command} exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: std::process::ExitStatus,
        stderr: String,
    },

    #[error("{command} did not finish within {timeout:?}")]
    Timeout { command: String, timeout: Duration },

    #[error("{command} produced output that is not UTF-8")]
    InvalidOutput { command: String },
}

/// Something that produces the raw text of one source.
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Which parser understands the output.
    fn source(&self) -> Source;

    /// Produce the raw output for this cycle.
    async fn read(&self) -> Result<String, SourceError>;
}

/// Runs an external tool and captures its standard output.
#[derive(Debug, Clone)]
pub struct CommandSource {
    source: Source,
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSource {
    /// Create a source running `program` with `args`.
    pub fn new(
        source: Source,
        program: impl Into<String>,
        args: Vec<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            source,
            program: program.into(),
            args,
            timeout,
        }
    }

    /// Create a source from its settings, falling back to the tool defaults.
    pub fn from_config(source: Source, config: &SourceConfig) -> Self {
        let (program, args) = match source {
            Source::LmSensors => (lm_sensors::DEFAULT_COMMAND, lm_sensors::DEFAULT_ARGS),
            Source::NvidiaSmi => (nvidia_smi::DEFAULT_COMMAND, nvidia_smi::DEFAULT_ARGS),
        };

        Self::new(
            source,
            config.command.as_deref().unwrap_or(program),
            config
                .args
                .clone()
                .unwrap_or_else(|| args.iter().map(|a| a.to_string()).collect()),
            config.timeout(),
        )
    }

    /// The program being run.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Its arguments.
    pub fn args(&self) -> &[String] {
        &self.args
    }
}

#[async_trait]
impl ReadingSource for CommandSource {
    fn source(&self) -> Source {
        self.source
    }

    async fn read(&self) -> Result<String, SourceError> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(SourceError::Spawn {
                    command: self.program.clone(),
                    source,
                });
            }
            Err(_) => {
                return Err(SourceError::Timeout {
                    command: self.program.clone(),
                    timeout: self.timeout,
                });
            }
        };

        if !output.status.success() {
            return Err(SourceError::Failed {
                command: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        String::from_utf8(output.stdout).map_err(|_| SourceError::InvalidOutput {
            command: self.program.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shell(script: &str, timeout: Duration) -> CommandSource {
        CommandSource::new(
            Source::LmSensors,
            "sh",
            vec!["-c".to_string(), script.to_string()],
            timeout,
        )
    }

    #[test]
    fn test_defaults_from_config() {
        let source = CommandSource::from_config(Source::LmSensors, &SourceConfig::default());
        assert_eq!(source.program(), "sensors");
        assert_eq!(source.args(), ["-j"]);

        let source = CommandSource::from_config(Source::NvidiaSmi, &SourceConfig::default());
        assert_eq!(source.program(), "nvidia-smi");
        assert_eq!(source.args()[1], "--format=csv");
        assert_eq!(source.source(), Source::NvidiaSmi);
    }

    #[test]
    fn test_command_override() {
        let config = SourceConfig {
            command: Some("/opt/bin/sensors".to_string()),
            args: Some(vec![]),
            ..SourceConfig::default()
        };
        let source = CommandSource::from_config(Source::LmSensors, &config);
        assert_eq!(source.program(), "/opt/bin/sensors");
        assert!(source.args().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_read_stdout() {
        let output = shell("echo '{}'", Duration::from_secs(5)).read().await.unwrap();
        assert_eq!(output.trim(), "{}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit() {
        let err = shell("echo boom >&2; exit 3", Duration::from_secs(5))
            .read()
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Failed { ref stderr, .. } if stderr == "boom"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout() {
        let err = shell("sleep 5", Duration::from_millis(50))
            .read()
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_missing_binary() {
        let source = CommandSource::new(
            Source::NvidiaSmi,
            "sensors2mqtt-no-such-tool",
            Vec::new(),
            Duration::from_secs(1),
        );
        assert!(matches!(source.read().await, Err(SourceError::Spawn { .. })));
    }
}
