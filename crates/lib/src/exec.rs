//! Single-command execution against a session.
//!
//! Runs exactly one lifecycle command per call and performs no retries;
//! retry policy, if any, belongs to the transport's caller. Exit and
//! connection failures stay distinguishable for the reconciler.

use linscript_transport::{Session, SessionError};
use tracing::{debug, info};

use crate::script::Script;

/// Execute a script, returning captured stdout.
pub async fn execute(session: &dyn Session, script: Script) -> Result<String, SessionError> {
  info!(
    workdir = %script.working_directory,
    interpreter = ?script.interpreter,
    has_stdin = script.stdin.is_some(),
    "executing lifecycle command"
  );
  debug!(script = ?script, "script detail");

  let output = session.run(&script.into_request()).await?;
  debug!(bytes = output.len(), "command completed");
  Ok(output)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::resource::{LifecycleCommands, ScriptConfig};
  use crate::script::{Phase, build_script};
  use crate::testutil::FakeSession;
  use std::collections::BTreeMap;

  fn config() -> ScriptConfig {
    ScriptConfig {
      lifecycle_commands: LifecycleCommands {
        create: "create-cmd".to_string(),
        read: "read-cmd".to_string(),
        update: None,
        delete: "delete-cmd".to_string(),
      },
      triggers: BTreeMap::new(),
      environment: BTreeMap::new(),
      sensitive_environment: BTreeMap::new(),
      interpreter: Vec::new(),
      working_directory: ".".to_string(),
    }
  }

  #[tokio::test]
  async fn passes_request_through_and_returns_output() {
    let session = FakeSession::new();
    session.push_ok("stdout here");

    let script = build_script(&config(), Phase::Read).unwrap();
    let out = execute(&session, script).await.unwrap();

    assert_eq!(out, "stdout here");
    let requests = session.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].command, "read-cmd");
  }

  #[tokio::test]
  async fn propagates_exit_error() {
    let session = FakeSession::new();
    session.push_exit(1, "failed");

    let script = build_script(&config(), Phase::Create).unwrap();
    let err = execute(&session, script).await.unwrap_err();
    assert!(err.is_command_exit());
  }

  #[tokio::test]
  async fn propagates_connection_error() {
    let session = FakeSession::new();
    session.push_connection_error("host unreachable");

    let script = build_script(&config(), Phase::Delete).unwrap();
    let err = execute(&session, script).await.unwrap_err();
    assert!(matches!(err, SessionError::Connection { .. }));
  }
}
