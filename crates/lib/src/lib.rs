//! linscript-lib: core engine for declarative script resources.
//!
//! A script resource's entire lifecycle is a set of user-supplied shell
//! command bodies (create/read/update/delete) executed over a session.
//! This crate decides which command to run for a given state change, how
//! to interpret its result, and when a change requires replacing the
//! remote resource instead of updating it in place:
//!
//! - `resource`: typed resource schema and validation
//! - `state`: committed vs staged records, changed-key diffs, persistence
//! - `script`: per-invocation script assembly (body, env merge, stdin)
//! - `exec`: single-command execution against a session
//! - `reconcile`: the Create/Read/Update/Delete state machine
//! - `classify`: pre-execution change classification (update vs replace)
//! - `apply`: orchestration across a named set of resources

pub mod apply;
pub mod attr;
pub mod classify;
pub mod exec;
pub mod reconcile;
pub mod resource;
pub mod script;
pub mod state;
pub mod testutil;
