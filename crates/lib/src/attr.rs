//! Attribute names of the script resource schema.
//!
//! Changed-key enumeration, classification, and restore-on-failure all
//! speak in terms of these names. Element-level keys use dotted suffixes
//! (`environment.FOO`, `interpreter.0`, `lifecycle_commands.update`).

pub const LIFECYCLE_COMMANDS: &str = "lifecycle_commands";
pub const TRIGGERS: &str = "triggers";
pub const ENVIRONMENT: &str = "environment";
pub const SENSITIVE_ENVIRONMENT: &str = "sensitive_environment";
pub const INTERPRETER: &str = "interpreter";
pub const WORKING_DIRECTORY: &str = "working_directory";
pub const OUTPUT: &str = "output";
pub const DIRTY: &str = "dirty";
pub const READ_FAILED: &str = "read_failed";
pub const READ_ERROR: &str = "read_error";

/// Attributes restored when an apply must fall back to the committed
/// state. `triggers` is absent: it is immutable once set and never part
/// of an in-place diff.
pub const RESTORABLE: &[&str] = &[
  LIFECYCLE_COMMANDS,
  ENVIRONMENT,
  SENSITIVE_ENVIRONMENT,
  INTERPRETER,
  WORKING_DIRECTORY,
  OUTPUT,
  DIRTY,
  READ_FAILED,
  READ_ERROR,
];
