//! Command execution on hosts and network namespaces.
//!
//! Every remote step of the configuration protocol goes through the
//! [`Host`] trait: the protocol never cares whether a command runs locally,
//! inside `ip netns exec`, or over some test-controller transport.
//!
//! # Example
//!
//! ```ignore
//! use hwconf::host::{Host, LocalHost};
//!
//! let host = LocalHost::new("host1");
//! let out = host.run("ethtool -l eth0").await?;
//! println!("{}", out.stdout);
//!
//! // Same machine, inside a named namespace
//! let ns = host.netns("testns");
//! ns.run("ip link show").await?;
//! ```

use std::fmt;
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{Error, Result};

/// Shared handle to a host.
pub type HostRef = Arc<dyn Host>;

/// How loudly a command is logged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobLevel {
    /// Housekeeping queries (`lscpu`, `/proc/interrupts`), logged at trace level.
    Debug,
    /// Commands that change device state, logged at debug level.
    #[default]
    Normal,
}

/// Captured result of a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output.
    pub stdout: String,
    /// Standard error.
    pub stderr: String,
    /// Exit code, -1 when the process was killed by a signal.
    pub exit_code: i32,
}

impl CommandOutput {
    /// Create a successful output with the given stdout.
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Default::default()
        }
    }

    /// Create a failed output.
    pub fn failed(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            stdout: String::new(),
            stderr: stderr.into(),
            exit_code,
        }
    }

    /// Check if the command exited with status 0.
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Turn a non-zero exit into [`Error::RemoteCommand`].
    pub fn check(self, host: &str, command: &str) -> Result<Self> {
        if self.success() {
            Ok(self)
        } else {
            Err(Error::RemoteCommand {
                host: host.to_string(),
                command: command.to_string(),
                exit_code: self.exit_code,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// A machine or network namespace commands can be run in.
#[async_trait]
pub trait Host: Send + Sync + fmt::Debug {
    /// Identifier used in descriptions and for deduplication.
    fn id(&self) -> &str;

    /// Run a shell command and return its output whatever the exit code.
    async fn exec(&self, command: &str, level: JobLevel) -> Result<CommandOutput>;

    /// Run a shell command, failing on a non-zero exit code.
    async fn run(&self, command: &str) -> Result<CommandOutput> {
        self.run_at(command, JobLevel::Normal).await
    }

    /// Run a shell command at the given log level, failing on a non-zero exit code.
    async fn run_at(&self, command: &str, level: JobLevel) -> Result<CommandOutput> {
        self.exec(command, level).await?.check(self.id(), command)
    }
}

/// The local machine, optionally entered through `ip netns exec`.
#[derive(Debug, Clone)]
pub struct LocalHost {
    id: String,
    netns: Option<String>,
}

impl LocalHost {
    /// Create a handle for the local machine.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            netns: None,
        }
    }

    /// Get a handle running commands inside a named network namespace.
    pub fn netns(&self, name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            id: format!("{}.{}", self.id, name),
            netns: Some(name),
        }
    }

    /// The namespace name, if any.
    pub fn netns_name(&self) -> Option<&str> {
        self.netns.as_deref()
    }

    fn command(&self, command: &str) -> Command {
        let mut cmd = match &self.netns {
            Some(ns) => {
                let mut cmd = Command::new("ip");
                cmd.args(["netns", "exec", ns, "sh", "-c", command]);
                cmd
            }
            None => {
                let mut cmd = Command::new("sh");
                cmd.args(["-c", command]);
                cmd
            }
        };
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl Host for LocalHost {
    fn id(&self) -> &str {
        &self.id
    }

    async fn exec(&self, command: &str, level: JobLevel) -> Result<CommandOutput> {
        match level {
            JobLevel::Debug => tracing::trace!(host = %self.id, %command, "running"),
            JobLevel::Normal => tracing::debug!(host = %self.id, %command, "running"),
        }

        let output = self.command(command).output().await?;
        let result = CommandOutput {
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            exit_code: output.status.code().unwrap_or(-1),
        };

        if !result.success() {
            tracing::debug!(
                host = %self.id,
                %command,
                exit_code = result.exit_code,
                stderr = %result.stderr.trim(),
                "command failed"
            );
        }

        Ok(result)
    }
}
