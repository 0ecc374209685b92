//! Session interface and error taxonomy.

use std::collections::BTreeMap;
use std::io;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Connection settings for a host.
///
/// Passed explicitly from the top-level context into each reconciliation
/// call; there is no package-level default connection. The bundled local
/// backend honors only `default_shell`; `host`, `port`, and `user` are
/// addressed to remote backends implementing [`Session`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
  /// Host to connect to.
  #[serde(default = "default_host")]
  pub host: String,

  /// Port to connect to.
  #[serde(default = "default_port")]
  pub port: u16,

  /// User to run commands as.
  #[serde(default)]
  pub user: String,

  /// Shell used when a request has no interpreter of its own.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default_shell: Option<String>,
}

fn default_host() -> String {
  "localhost".to_string()
}

fn default_port() -> u16 {
  22
}

impl Default for ConnectionConfig {
  fn default() -> Self {
    Self {
      host: default_host(),
      port: default_port(),
      user: String::new(),
      default_shell: None,
    }
  }
}

/// One command execution, fully specified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
  /// The command body to run.
  pub command: String,

  /// Data fed to the command's standard input, if any.
  pub stdin: Option<String>,

  /// Environment variables set for the command.
  pub env: BTreeMap<String, String>,

  /// Working directory for the command.
  pub working_directory: String,

  /// Interpreter argument vector the command body is appended to.
  /// Empty means the session's default shell.
  pub interpreter: Vec<String>,
}

/// Errors a session can report for a single execution.
///
/// The engine reacts differently to each class: command exit failures are
/// absorbed into resource state during read, while connection failures are
/// always fatal.
#[derive(Debug, Error)]
pub enum SessionError {
  /// The transport could not reach the host or start the command.
  #[error("connection failed: {message}")]
  Connection { message: String },

  /// The command ran on the host and exited non-zero.
  #[error("command exited with code {code:?}: {stderr}")]
  CommandExit { code: Option<i32>, stderr: String },

  /// Any other failure during execution.
  #[error("session io error: {0}")]
  Other(#[from] io::Error),
}

impl SessionError {
  /// Returns true for a remote command exit failure (as opposed to a
  /// transport-level failure).
  pub fn is_command_exit(&self) -> bool {
    matches!(self, SessionError::CommandExit { .. })
  }
}

/// A session to a host.
///
/// Each call runs exactly one command and is independent of any other
/// call; implementations must not assume state carries over between runs.
#[async_trait]
pub trait Session: Send + Sync {
  /// Run one command, returning captured stdout.
  async fn run(&self, req: &ExecRequest) -> Result<String, SessionError>;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn connection_config_defaults() {
    let config = ConnectionConfig::default();
    assert_eq!(config.host, "localhost");
    assert_eq!(config.port, 22);
    assert!(config.user.is_empty());
    assert!(config.default_shell.is_none());
  }

  #[test]
  fn connection_config_deserializes_with_defaults() {
    let config: ConnectionConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(config, ConnectionConfig::default());
  }

  #[test]
  fn session_error_classification() {
    let exit = SessionError::CommandExit {
      code: Some(2),
      stderr: "boom".to_string(),
    };
    assert!(exit.is_command_exit());

    let conn = SessionError::Connection {
      message: "unreachable".to_string(),
    };
    assert!(!conn.is_command_exit());
  }

  #[test]
  fn session_error_display_includes_context() {
    let exit = SessionError::CommandExit {
      code: Some(127),
      stderr: "not found".to_string(),
    };
    let message = exit.to_string();
    assert!(message.contains("127"));
    assert!(message.contains("not found"));
  }
}
