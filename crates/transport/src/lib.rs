//! linscript-transport: session layer for linscript.
//!
//! This crate defines the interface the engine uses to run lifecycle
//! commands on a host:
//!
//! - [`Session`]: runs exactly one command per call and returns captured
//!   stdout or a classified [`SessionError`]
//! - [`ExecRequest`]: everything a single execution needs (command body,
//!   stdin, environment, working directory, interpreter)
//! - [`ConnectionConfig`]: explicit connection settings carried down from
//!   the top-level context (no process-global connection state)
//! - [`LocalSession`]: a backend that executes on the local host, used for
//!   development and tests
//!
//! The transport performs no retries, no pooling, and no timeouts; retry
//! policy and cancellation belong to the caller.

mod local;
mod types;

pub use local::LocalSession;
pub use types::{ConnectionConfig, ExecRequest, Session, SessionError};
