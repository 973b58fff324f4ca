//! External tool runner.
//!
//! Every process the pipeline starts goes through [`ToolRunner::run`]:
//! the command is logged, stdout/stderr are captured, and the call is
//! bounded by a deadline. A process still running at the deadline is
//! killed and the call fails; it is never retried here.

use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

use crate::logging::EpisodeLogger;

/// Number of stderr lines carried in a failure message.
const ERROR_LINES: usize = 5;

/// Errors from running an external tool.
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Failed to start {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} timed out after {seconds}s")]
    TimedOut { tool: String, seconds: u64 },

    #[error("{tool} failed with exit code {exit_code}: {message}")]
    Failed {
        tool: String,
        exit_code: i32,
        message: String,
    },
}

impl ToolError {
    pub fn tool(&self) -> &str {
        match self {
            ToolError::Spawn { tool, .. }
            | ToolError::TimedOut { tool, .. }
            | ToolError::Failed { tool, .. } => tool,
        }
    }
}

/// A program plus its arguments.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Short tool name for messages (`/usr/bin/ffmpeg` -> `ffmpeg`).
    pub fn tool_name(&self) -> String {
        Path::new(&self.program)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.clone())
    }

    /// Shell-like rendering for logs.
    pub fn display(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().map(|a| {
                let s = a.to_string_lossy();
                if s.contains(' ') || s.is_empty() {
                    format!("\"{}\"", s)
                } else {
                    s.into_owned()
                }
            }))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Captured output of a successful run.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Runs external tools with a deadline and optional episode logging.
#[derive(Clone)]
pub struct ToolRunner {
    timeout: Duration,
    logger: Option<Arc<EpisodeLogger>>,
}

impl ToolRunner {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            logger: None,
        }
    }

    /// Log commands and tool output to an episode logger.
    pub fn with_logger(mut self, logger: Arc<EpisodeLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Same runner with a different deadline.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        Self {
            timeout,
            logger: self.logger.clone(),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run a command to completion.
    pub async fn run(&self, cmd: &ToolCommand) -> Result<ToolOutput, ToolError> {
        let tool = cmd.tool_name();
        let command_line = cmd.display();

        tracing::debug!(command = %command_line, "Running tool");
        if let Some(ref logger) = self.logger {
            logger.command(&command_line);
        }

        let child = Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ToolError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        // Dropping the future on timeout drops the child, which kills it
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|source| ToolError::Spawn {
                tool: tool.clone(),
                source,
            })?,
            Err(_) => {
                if let Some(ref logger) = self.logger {
                    logger.error(&format!(
                        "{} killed after {}s deadline",
                        tool,
                        self.timeout.as_secs()
                    ));
                }
                return Err(ToolError::TimedOut {
                    tool,
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if let Some(ref logger) = self.logger {
            for line in stderr.lines().filter(|l| !l.trim().is_empty()) {
                logger.output_line(line, true);
            }
        }

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            if let Some(ref logger) = self.logger {
                logger.show_tail(&tool);
            }
            return Err(ToolError::Failed {
                tool,
                exit_code,
                message: last_lines(&stderr, ERROR_LINES),
            });
        }

        Ok(ToolOutput { stdout, stderr })
    }
}

/// Last `n` non-empty lines of `text`, joined with " | ".
fn last_lines(text: &str, n: usize) -> String {
    let lines: Vec<&str> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect();
    let start = lines.len().saturating_sub(n);
    lines[start..].join(" | ")
}
