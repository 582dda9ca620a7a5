//! Side-effect boundary for remediation operations
//!
//! Every command, signal, filesystem check and remote call made by the
//! executor goes through [`Host`], so operations can be exercised against a
//! scripted host in tests.

use async_trait::async_trait;
use std::fmt;
use std::time::Duration;
use tokio::process::Command;

#[derive(Debug, thiserror::Error)]
pub enum HostError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("signal delivery failed: {0}")]
    Signal(std::io::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A command to run on the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cmd {
    pub program: String,
    pub args: Vec<String>,
    /// Needs root; run through `sudo -n` when the agent is unprivileged
    pub privileged: bool,
    pub timeout: Duration,
}

impl Cmd {
    pub fn new(program: &str, args: &[&str], timeout_secs: u64) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
            privileged: false,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    #[must_use]
    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CmdOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Terminate,
    Kill,
}

/// An authenticated JSON POST.
#[derive(Debug, Clone, PartialEq)]
pub struct PostRequest {
    pub url: String,
    pub bearer_token: String,
    pub body: Option<serde_json::Value>,
    pub timeout: Duration,
}

#[async_trait]
pub trait Host: Send + Sync {
    async fn run(&self, cmd: &Cmd) -> Result<CmdOutput, HostError>;

    /// Whether `program` resolves on `PATH`.
    async fn program_available(&self, program: &str) -> bool;

    fn path_exists(&self, path: &str) -> bool;

    fn process_exists(&self, pid: i32) -> bool;

    fn signal(&self, pid: i32, signal: Signal) -> Result<(), HostError>;

    /// Whether a directory can be listed within `timeout`.
    async fn path_accessible(&self, path: &str, timeout: Duration) -> bool;

    /// POST and return the HTTP status code.
    async fn http_post(&self, request: &PostRequest) -> Result<u16, HostError>;
}

/// The real machine.
pub struct SystemHost {
    http: reqwest::Client,
    is_root: bool,
}

impl SystemHost {
    pub fn new() -> Result<Self, HostError> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            // SAFETY: geteuid has no preconditions and cannot fail
            is_root: unsafe { libc::geteuid() } == 0,
        })
    }
}

#[async_trait]
impl Host for SystemHost {
    async fn run(&self, cmd: &Cmd) -> Result<CmdOutput, HostError> {
        let mut command = if cmd.privileged && !self.is_root {
            let mut c = Command::new("sudo");
            c.arg("-n").arg(&cmd.program);
            c
        } else {
            Command::new(&cmd.program)
        };
        command.args(&cmd.args).kill_on_drop(true);

        let output = tokio::time::timeout(cmd.timeout, command.output())
            .await
            .map_err(|_| HostError::Timeout(cmd.timeout))?
            .map_err(|source| HostError::Spawn {
                program: cmd.program.clone(),
                source,
            })?;

        Ok(CmdOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }

    async fn program_available(&self, program: &str) -> bool {
        let Some(path) = std::env::var_os("PATH") else {
            return false;
        };
        for dir in std::env::split_paths(&path) {
            if let Ok(meta) = tokio::fs::metadata(dir.join(program)).await {
                if meta.is_file() {
                    return true;
                }
            }
        }
        false
    }

    fn path_exists(&self, path: &str) -> bool {
        std::path::Path::new(path).exists()
    }

    fn process_exists(&self, pid: i32) -> bool {
        if pid <= 0 {
            return false;
        }
        // SAFETY: signal 0 performs permission and existence checks only
        let rc = unsafe { libc::kill(pid, 0) };
        rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }

    fn signal(&self, pid: i32, signal: Signal) -> Result<(), HostError> {
        let sig = match signal {
            Signal::Terminate => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        };
        // SAFETY: pid was validated positive by the caller; kill has no memory effects
        let rc = unsafe { libc::kill(pid, sig) };
        if rc == 0 {
            Ok(())
        } else {
            Err(HostError::Signal(std::io::Error::last_os_error()))
        }
    }

    async fn path_accessible(&self, path: &str, timeout: Duration) -> bool {
        matches!(
            tokio::time::timeout(timeout, tokio::fs::read_dir(path)).await,
            Ok(Ok(_))
        )
    }

    async fn http_post(&self, request: &PostRequest) -> Result<u16, HostError> {
        let mut builder = self
            .http
            .post(&request.url)
            .bearer_auth(&request.bearer_token)
            .timeout(request.timeout);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        Ok(builder.send().await?.status().as_u16())
    }
}
