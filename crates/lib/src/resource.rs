//! Script resource schema types.
//!
//! The declared shape of a script resource, validated once at the schema
//! boundary. Everything downstream works with these typed values; no
//! dynamic coercion happens inside the engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The four user-supplied lifecycle command bodies. Exactly one set per
/// resource; `update` is optional and its absence means "not updatable
/// in place".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecycleCommands {
  pub create: String,
  pub read: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub update: Option<String>,
  pub delete: String,
}

fn default_working_directory() -> String {
  ".".to_string()
}

/// Declared attributes of a script resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptConfig {
  pub lifecycle_commands: LifecycleCommands,

  /// Opaque key-value map; any change forces replacement.
  #[serde(default)]
  pub triggers: BTreeMap<String, String>,

  /// Environment variables for every lifecycle command.
  #[serde(default)]
  pub environment: BTreeMap<String, String>,

  /// Environment variables merged identically at execution time but
  /// redacted from logs and output.
  #[serde(default)]
  pub sensitive_environment: BTreeMap<String, String>,

  /// Command invocation prefix; empty means the session's default shell.
  #[serde(default)]
  pub interpreter: Vec<String>,

  #[serde(default = "default_working_directory")]
  pub working_directory: String,
}

/// Schema validation failures, reported before anything executes.
#[derive(Debug, Error)]
pub enum ValidateError {
  #[error("lifecycle command `{0}` must not be empty")]
  EmptyCommand(&'static str),

  #[error("interpreter entry {index} must not be empty")]
  EmptyInterpreterEntry { index: usize },

  #[error("working_directory must not be empty")]
  EmptyWorkingDirectory,
}

impl ScriptConfig {
  /// Validate the configuration once, at the schema boundary.
  pub fn validate(&self) -> Result<(), ValidateError> {
    let lc = &self.lifecycle_commands;
    if lc.create.is_empty() {
      return Err(ValidateError::EmptyCommand("create"));
    }
    if lc.read.is_empty() {
      return Err(ValidateError::EmptyCommand("read"));
    }
    if lc.delete.is_empty() {
      return Err(ValidateError::EmptyCommand("delete"));
    }
    if let Some(update) = &lc.update {
      if update.is_empty() {
        return Err(ValidateError::EmptyCommand("update"));
      }
    }
    for (index, entry) in self.interpreter.iter().enumerate() {
      if entry.is_empty() {
        return Err(ValidateError::EmptyInterpreterEntry { index });
      }
    }
    if self.working_directory.is_empty() {
      return Err(ValidateError::EmptyWorkingDirectory);
    }
    Ok(())
  }

  /// The configured update command, if any.
  pub fn update_command(&self) -> Option<&str> {
    self.lifecycle_commands.update.as_deref()
  }
}
