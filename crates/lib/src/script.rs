//! Per-invocation script assembly.
//!
//! A [`Script`] is built immediately before execution and consumed by it:
//! the command body for the selected phase, the merged environment, the
//! interpreter vector, and (for update) stdin seeded with the previous
//! output. It is never persisted.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use linscript_transport::ExecRequest;
use thiserror::Error;

use crate::resource::ScriptConfig;

/// Lifecycle phase selecting which command body runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
  Create,
  Read,
  Update,
  Delete,
}

impl Phase {
  pub fn as_str(&self) -> &'static str {
    match self {
      Phase::Create => "create",
      Phase::Read => "read",
      Phase::Update => "update",
      Phase::Delete => "delete",
    }
  }
}

impl fmt::Display for Phase {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.as_str())
  }
}

/// A single-use executable script value.
#[derive(Clone, PartialEq, Eq)]
pub struct Script {
  pub body: String,
  pub env: BTreeMap<String, String>,
  pub interpreter: Vec<String>,
  pub working_directory: String,
  pub stdin: Option<String>,
  sensitive_keys: BTreeSet<String>,
}

impl Script {
  /// Seed standard input, used by the update phase to hand the command
  /// the previous output.
  pub fn with_stdin(mut self, stdin: String) -> Self {
    self.stdin = Some(stdin);
    self
  }

  /// Convert into a transport request, consuming the script.
  pub fn into_request(self) -> ExecRequest {
    ExecRequest {
      command: self.body,
      stdin: self.stdin,
      env: self.env,
      working_directory: self.working_directory,
      interpreter: self.interpreter,
    }
  }
}

// Sensitive environment values must never appear in logs or error
// output, so Debug redacts them.
impl fmt::Debug for Script {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let env: BTreeMap<&str, &str> = self
      .env
      .iter()
      .map(|(k, v)| {
        if self.sensitive_keys.contains(k) {
          (k.as_str(), "(sensitive)")
        } else {
          (k.as_str(), v.as_str())
        }
      })
      .collect();
    f.debug_struct("Script")
      .field("body", &self.body)
      .field("env", &env)
      .field("interpreter", &self.interpreter)
      .field("working_directory", &self.working_directory)
      .field("stdin", &self.stdin.as_ref().map(|s| s.len()))
      .finish()
  }
}

/// Errors from script assembly.
#[derive(Debug, Error)]
pub enum ScriptError {
  /// The update phase was requested but no update command is configured.
  /// The classifier prevents reconciliation from reaching this state.
  #[error("no update command configured")]
  MissingUpdateCommand,
}

/// Assemble the script for a lifecycle phase. Pure, no I/O.
///
/// The environment is `environment` overlaid with `sensitive_environment`;
/// on a key collision the sensitive value wins (last write wins).
pub fn build_script(config: &ScriptConfig, phase: Phase) -> Result<Script, ScriptError> {
  let commands = &config.lifecycle_commands;
  let body = match phase {
    Phase::Create => commands.create.clone(),
    Phase::Read => commands.read.clone(),
    Phase::Delete => commands.delete.clone(),
    Phase::Update => commands.update.clone().ok_or(ScriptError::MissingUpdateCommand)?,
  };

  let mut env = config.environment.clone();
  for (key, value) in &config.sensitive_environment {
    env.insert(key.clone(), value.clone());
  }

  Ok(Script {
    body,
    env,
    interpreter: config.interpreter.clone(),
    working_directory: config.working_directory.clone(),
    stdin: None,
    sensitive_keys: config.sensitive_environment.keys().cloned().collect(),
  })
}
