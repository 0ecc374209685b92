//! Local shell session.
//!
//! Executes requests on the local host through `tokio::process`. This is
//! the backend used by tests and by development against localhost; remote
//! backends implement [`Session`] elsewhere.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

use crate::types::{ConnectionConfig, ExecRequest, Session, SessionError};

/// Default shell used when a request carries no interpreter.
#[cfg(unix)]
const DEFAULT_SHELL: &str = "/bin/sh";

#[cfg(windows)]
const DEFAULT_SHELL: &str = "cmd.exe";

/// A session that runs commands on the local host.
#[derive(Debug, Clone)]
pub struct LocalSession {
  shell: String,
}

impl LocalSession {
  /// Create a session with the platform default shell.
  pub fn new() -> Self {
    Self {
      shell: DEFAULT_SHELL.to_string(),
    }
  }

  /// Create a session from connection settings, honoring the configured
  /// default shell override.
  pub fn from_config(config: &ConnectionConfig) -> Self {
    Self {
      shell: config.default_shell.clone().unwrap_or_else(|| DEFAULT_SHELL.to_string()),
    }
  }

  /// The argument vector for a request: the request's interpreter if set,
  /// otherwise the session shell with its command flag.
  fn argv(&self, req: &ExecRequest) -> Vec<String> {
    if req.interpreter.is_empty() {
      #[cfg(unix)]
      let flag = "-c";
      #[cfg(windows)]
      let flag = "/C";
      vec![self.shell.clone(), flag.to_string()]
    } else {
      req.interpreter.clone()
    }
  }
}

impl Default for LocalSession {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Session for LocalSession {
  async fn run(&self, req: &ExecRequest) -> Result<String, SessionError> {
    let argv = self.argv(req);
    info!(interpreter = %argv[0], workdir = %req.working_directory, "running command");

    let mut command = Command::new(&argv[0]);
    command
      .args(&argv[1..])
      .arg(&req.command)
      .current_dir(&req.working_directory)
      .stdin(if req.stdin.is_some() { Stdio::piped() } else { Stdio::null() })
      .stdout(Stdio::piped())
      .stderr(Stdio::piped());

    for (key, value) in &req.env {
      command.env(key, value);
    }

    // A session that cannot start the process is indistinguishable from an
    // unreachable host as far as the engine is concerned.
    let mut child = command.spawn().map_err(|e| SessionError::Connection {
      message: format!("failed to start {}: {}", argv[0], e),
    })?;

    if let Some(input) = &req.stdin {
      if let Some(mut stdin) = child.stdin.take() {
        // The command may exit without draining stdin; the exit status
        // decides success, not the pipe.
        match stdin.write_all(input.as_bytes()).await {
          Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
          result => result?,
        }
        // Closes the pipe so the command sees EOF.
        drop(stdin);
      }
    }

    let output = child.wait_with_output().await?;

    if !output.status.success() {
      let stderr = String::from_utf8_lossy(&output.stderr).to_string();
      if !stderr.is_empty() {
        debug!(stderr = %stderr, "command stderr");
      }
      return Err(SessionError::CommandExit {
        code: output.status.code(),
        stderr,
      });
    }

    // Output is kept byte-exact; drift detection compares it verbatim.
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
  }
}
