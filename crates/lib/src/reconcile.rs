//! The lifecycle state machine.
//!
//! Orchestrates Create/Read/Update/Delete for one resource instance
//! against a session:
//!
//! - **create**: run the create command, read back the output, then mint
//!   the identifier that proves create succeeded
//! - **read**: run the read command; a command exit failure is absorbed
//!   into `read_failed`/`read_error` state instead of failing the apply,
//!   success recomputes `dirty` against the stored output
//! - **update**: a change to the command bodies alone executes nothing
//!   and defers to the next pass; an ordinary change runs the update
//!   command with stdin seeded from the stored output
//! - **delete**: run the delete command; any failure leaves the resource
//!   considered not-destroyed so a retry stays possible
//!
//! Only read failures are absorbed; every other failure surfaces
//! immediately. No retries happen at this layer.

use linscript_transport::{Session, SessionError};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::attr;
use crate::exec;
use crate::script::{Phase, ScriptError, build_script};
use crate::state::ResourceData;

/// Errors from reconciling one resource.
#[derive(Debug, Error)]
pub enum ReconcileError {
  /// A lifecycle command failed.
  #[error("{phase} command failed: {source}")]
  Exec {
    phase: Phase,
    #[source]
    source: SessionError,
  },

  /// Script assembly failed.
  #[error(transparent)]
  Script(#[from] ScriptError),
}

impl ReconcileError {
  fn exec(phase: Phase) -> impl FnOnce(SessionError) -> Self {
    move |source| ReconcileError::Exec { phase, source }
  }
}

/// Run the read command and store its output. Any failure is fatal here;
/// the absorbing behavior lives in [`read`].
async fn read_output(session: &dyn Session, data: &mut ResourceData) -> Result<(), ReconcileError> {
  let script = build_script(&data.state().config, Phase::Read)?;
  let output = exec::execute(session, script)
    .await
    .map_err(ReconcileError::exec(Phase::Read))?;
  data.state_mut().output = output;
  Ok(())
}

/// Create the resource: execute the create command (no stdin), read back
/// the initial output, then commit a fresh identifier.
///
/// If anything after the create command fails, the remote side effect has
/// already happened; the caller surfaces that caveat.
pub async fn create(session: &dyn Session, data: &mut ResourceData) -> Result<(), ReconcileError> {
  info!("creating resource");
  let script = build_script(&data.state().config, Phase::Create)?;
  exec::execute(session, script)
    .await
    .map_err(ReconcileError::exec(Phase::Create))?;

  read_output(session, data).await?;

  let id = Uuid::new_v4().to_string();
  data.set_id(id);
  info!(id = data.id().unwrap_or_default(), "resource created");
  Ok(())
}

/// Refresh the resource: execute the read command and reconcile the
/// result into state.
///
/// A command exit failure is recorded as state (`read_failed`,
/// `read_error`), leaving `output` and `dirty` untouched, and is not
/// surfaced as an error; a later classification decides whether the
/// unreadable resource gets replaced. Connection and other failures
/// propagate.
pub async fn read(session: &dyn Session, data: &mut ResourceData) -> Result<(), ReconcileError> {
  let previous = data.state().output.clone();

  match read_output(session, data).await {
    Err(ReconcileError::Exec {
      source: source @ SessionError::CommandExit { .. },
      ..
    }) => {
      warn!(error = %source, "read command failed; recording as state");
      let state = data.state_mut();
      state.read_failed = true;
      state.read_error = source.to_string();
      return Ok(());
    }
    Err(e) => {
      let state = data.state_mut();
      state.read_failed = false;
      state.read_error = String::new();
      return Err(e);
    }
    Ok(()) => {}
  }

  let state = data.state_mut();
  state.read_failed = false;
  state.read_error = String::new();
  let fresh = state.output.clone();
  state.dirty = previous != fresh;
  debug!(dirty = state.dirty, "read complete");
  Ok(())
}

/// Update the resource in place.
///
/// When the lifecycle command bodies themselves changed, nothing
/// executes: every other staged attribute is restored to its committed
/// value and the actual work is deferred to the next reconciliation
/// pass, which will see only the command-body change applied. Changing
/// how to update must not be conflated with performing an update.
///
/// Otherwise the update command runs with stdin seeded from the stored
/// output so it can diff against prior state. On failure all staged
/// attributes are restored before the error propagates.
pub async fn update(session: &dyn Session, data: &mut ResourceData) -> Result<(), ReconcileError> {
  if data.has_change(attr::LIFECYCLE_COMMANDS) {
    info!("lifecycle commands changed; restoring other attributes and deferring execution");
    data.restore_prior(&[attr::LIFECYCLE_COMMANDS]);
    return Ok(());
  }

  info!("updating resource");
  let script = build_script(&data.state().config, Phase::Update)?.with_stdin(data.state().output.clone());

  if let Err(source) = exec::execute(session, script).await {
    data.restore_prior(&[]);
    return Err(ReconcileError::Exec {
      phase: Phase::Update,
      source,
    });
  }

  read_output(session, data).await
}

/// Delete the resource: execute the delete command (no stdin). Any
/// failure is fatal and the resource is considered not-destroyed.
pub async fn delete(session: &dyn Session, data: &mut ResourceData) -> Result<(), ReconcileError> {
  info!("deleting resource");
  let script = build_script(&data.state().config, Phase::Delete)?;
  exec::execute(session, script)
    .await
    .map_err(ReconcileError::exec(Phase::Delete))?;
  data.clear_id();
  info!("resource deleted");
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::collections::BTreeMap;

  use super::*;
  use crate::resource::{LifecycleCommands, ScriptConfig};
  use crate::state::{ResourceData, ScriptRecord, StoredResource};
  use crate::testutil::FakeSession;

  fn config() -> ScriptConfig {
    ScriptConfig {
      lifecycle_commands: LifecycleCommands {
        create: "create-cmd".to_string(),
        read: "read-cmd".to_string(),
        update: Some("update-cmd".to_string()),
        delete: "delete-cmd".to_string(),
      },
      triggers: BTreeMap::new(),
      environment: BTreeMap::new(),
      sensitive_environment: BTreeMap::new(),
      interpreter: Vec::new(),
      working_directory: ".".to_string(),
    }
  }

  fn existing(record: ScriptRecord, desired: ScriptConfig) -> ResourceData {
    ResourceData::existing(
      StoredResource {
        id: "an-id".to_string(),
        record,
      },
      desired,
    )
  }

  #[tokio::test]
  async fn create_runs_create_then_read_and_mints_id() {
    let session = FakeSession::new();
    session.push_ok(""); // create
    session.push_ok("hi"); // read

    let mut data = ResourceData::new(config());
    create(&session, &mut data).await.unwrap();

    let requests = session.requests();
    assert_eq!(requests[0].command, "create-cmd");
    assert_eq!(requests[1].command, "read-cmd");
    assert!(requests[0].stdin.is_none());

    assert!(data.id().is_some());
    assert_eq!(data.state().output, "hi");
    assert!(!data.state().dirty);
    assert!(!data.state().read_failed);
  }

  #[tokio::test]
  async fn create_failure_leaves_no_id() {
    let session = FakeSession::new();
    session.push_exit(1, "create blew up");

    let mut data = ResourceData::new(config());
    let err = create(&session, &mut data).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Exec { phase: Phase::Create, .. }));
    assert!(data.id().is_none());
  }

  #[tokio::test]
  async fn create_read_failure_is_fatal() {
    // The remote create already happened; the identifier is not minted
    // and the failure surfaces.
    let session = FakeSession::new();
    session.push_ok("");
    session.push_exit(1, "read blew up");

    let mut data = ResourceData::new(config());
    let err = create(&session, &mut data).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Exec { phase: Phase::Read, .. }));
    assert!(data.id().is_none());
  }

  #[tokio::test]
  async fn read_sets_dirty_on_drift() {
    let session = FakeSession::new();
    session.push_ok("bye");

    let mut record = ScriptRecord::new(config());
    record.output = "hi".to_string();
    let mut data = existing(record, config());

    read(&session, &mut data).await.unwrap();
    assert_eq!(data.state().output, "bye");
    assert!(data.state().dirty);
  }

  #[tokio::test]
  async fn read_is_clean_when_output_unchanged() {
    let session = FakeSession::new();
    session.push_ok("hi");
    session.push_ok("hi");

    let mut record = ScriptRecord::new(config());
    record.output = "hi".to_string();
    let mut data = existing(record, config());

    read(&session, &mut data).await.unwrap();
    assert!(!data.state().dirty);

    // Reading again with no remote mutation stays clean.
    read(&session, &mut data).await.unwrap();
    assert!(!data.state().dirty);
  }

  #[tokio::test]
  async fn read_absorbs_exit_failure_into_state() {
    let session = FakeSession::new();
    session.push_exit(2, "no such file");

    let mut record = ScriptRecord::new(config());
    record.output = "hi".to_string();
    record.dirty = false;
    let mut data = existing(record, config());

    read(&session, &mut data).await.unwrap();

    assert!(data.state().read_failed);
    assert!(data.state().read_error.contains("no such file"));
    // Output and dirty are untouched by a failed read.
    assert_eq!(data.state().output, "hi");
    assert!(!data.state().dirty);
  }

  #[tokio::test]
  async fn read_clears_failure_bookkeeping_on_success() {
    let session = FakeSession::new();
    session.push_ok("hi");

    let mut record = ScriptRecord::new(config());
    record.output = "hi".to_string();
    record.read_failed = true;
    record.read_error = "stale".to_string();
    let mut data = existing(record, config());

    read(&session, &mut data).await.unwrap();
    assert!(!data.state().read_failed);
    assert!(data.state().read_error.is_empty());
  }

  #[tokio::test]
  async fn read_connection_error_is_fatal() {
    let session = FakeSession::new();
    session.push_connection_error("unreachable");

    let mut data = existing(ScriptRecord::new(config()), config());
    let err = read(&session, &mut data).await.unwrap_err();
    assert!(matches!(
      err,
      ReconcileError::Exec {
        phase: Phase::Read,
        source: SessionError::Connection { .. }
      }
    ));
    assert!(!data.state().read_failed);
  }

  #[tokio::test]
  async fn update_seeds_stdin_with_stored_output() {
    let session = FakeSession::new();
    session.push_ok(""); // update
    session.push_ok("after"); // read

    let mut record = ScriptRecord::new(config());
    record.output = "before".to_string();

    let mut desired = config();
    desired.working_directory = "/tmp".to_string();
    let mut data = existing(record, desired);

    update(&session, &mut data).await.unwrap();

    let requests = session.requests();
    assert_eq!(requests[0].command, "update-cmd");
    assert_eq!(requests[0].stdin.as_deref(), Some("before"));
    assert_eq!(data.state().output, "after");
  }

  #[tokio::test]
  async fn update_with_command_change_executes_nothing() {
    let session = FakeSession::new();

    let mut record = ScriptRecord::new(config());
    record.output = "committed".to_string();

    let mut desired = config();
    desired.lifecycle_commands.update = Some("brand-new-update".to_string());
    let mut data = existing(record, desired);
    data.state_mut().output = "staged".to_string();

    update(&session, &mut data).await.unwrap();

    assert!(session.requests().is_empty());
    // New commands kept, everything else restored.
    assert_eq!(
      data.state().config.lifecycle_commands.update.as_deref(),
      Some("brand-new-update")
    );
    assert_eq!(data.state().output, "committed");
  }

  #[tokio::test]
  async fn update_failure_restores_prior_attributes() {
    let session = FakeSession::new();
    session.push_exit(1, "update failed");

    let mut record = ScriptRecord::new(config());
    record.output = "committed".to_string();

    let mut desired = config();
    desired.working_directory = "/tmp".to_string();
    let mut data = existing(record, desired);

    let err = update(&session, &mut data).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Exec { phase: Phase::Update, .. }));
    assert_eq!(data.state().config.working_directory, ".");
    assert_eq!(data.state().output, "committed");
  }

  #[tokio::test]
  async fn update_without_update_command_is_an_error() {
    let session = FakeSession::new();

    let mut base = config();
    base.lifecycle_commands.update = None;
    let mut desired = base.clone();
    desired.working_directory = "/tmp".to_string();

    let mut data = existing(ScriptRecord::new(base), desired);
    let err = update(&session, &mut data).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Script(ScriptError::MissingUpdateCommand)));
  }

  #[tokio::test]
  async fn delete_clears_id_on_success() {
    let session = FakeSession::new();
    session.push_ok("");

    let mut data = existing(ScriptRecord::new(config()), config());
    delete(&session, &mut data).await.unwrap();

    assert_eq!(session.requests()[0].command, "delete-cmd");
    assert!(session.requests()[0].stdin.is_none());
    assert!(data.id().is_none());
  }

  #[tokio::test]
  async fn delete_failure_keeps_resource() {
    let session = FakeSession::new();
    session.push_exit(1, "still busy");

    let mut data = existing(ScriptRecord::new(config()), config());
    let err = delete(&session, &mut data).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Exec { phase: Phase::Delete, .. }));
    assert!(data.id().is_some());
  }
}
