//! Apply orchestration across a named set of resources.
//!
//! This is the provider-level flow: given a resource file, a state
//! store, and a session, each resource is classified and then driven
//! through the lifecycle state machine:
//!
//! 1. Load prior state (if any)
//! 2. Classify the staged diff; conflicts abort before any execution
//! 3. Create, replace (destroy then recreate), update, or refresh
//! 4. Persist the resulting state
//! 5. Resources removed from the file are destroyed and their state
//!    cleaned up
//!
//! Each resource is reconciled independently and sequentially; a failure
//! aborts the apply without touching state already committed for other
//! resources.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use linscript_transport::{ConnectionConfig, Session};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::attr;
use crate::classify::{ClassifyError, classify};
use crate::reconcile;
use crate::reconcile::ReconcileError;
use crate::resource::{ScriptConfig, ValidateError};
use crate::state::{ResourceData, StateError, StateStore, StoredResource};

/// A resource file: connection settings plus named script resources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceFile {
  #[serde(default)]
  pub connection: ConnectionConfig,

  #[serde(default)]
  pub resources: BTreeMap<String, ScriptConfig>,
}

impl ResourceFile {
  /// Load and parse a resource file.
  pub fn load(path: &Path) -> Result<Self, ApplyError> {
    let content = std::fs::read_to_string(path).map_err(|source| ApplyError::ConfigRead {
      path: path.to_path_buf(),
      source,
    })?;
    serde_json::from_str(&content).map_err(|source| ApplyError::ConfigParse {
      path: path.to_path_buf(),
      source,
    })
  }
}

/// What an apply would do (or did) with one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanAction {
  /// No prior state: run the create command.
  Create,
  /// Destroy and recreate; carries the attributes forcing replacement.
  Replace(Vec<String>),
  /// Run the update command in place.
  Update,
  /// Only the command bodies changed: commit them without executing.
  DeferCommandChange,
  /// Nothing staged: refresh output/dirty via the read command.
  Refresh,
  /// Present in state but absent from the file: run the delete command.
  Destroy,
}

/// Result of an apply run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ApplyReport {
  pub created: Vec<String>,
  pub replaced: Vec<String>,
  pub updated: Vec<String>,
  pub deferred: Vec<String>,
  pub refreshed: Vec<String>,
  pub destroyed: Vec<String>,
}

impl ApplyReport {
  /// Total number of resources touched.
  pub fn total(&self) -> usize {
    self.created.len()
      + self.replaced.len()
      + self.updated.len()
      + self.deferred.len()
      + self.refreshed.len()
      + self.destroyed.len()
  }
}

/// Errors that can occur during apply.
#[derive(Debug, Error)]
pub enum ApplyError {
  #[error("failed to read resource file {path}: {source}")]
  ConfigRead {
    path: PathBuf,
    #[source]
    source: io::Error,
  },

  #[error("failed to parse resource file {path}: {source}")]
  ConfigParse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid resource `{name}`: {source}")]
  Validate {
    name: String,
    #[source]
    source: ValidateError,
  },

  #[error("resource `{name}`: {source}")]
  Classify {
    name: String,
    #[source]
    source: ClassifyError,
  },

  #[error("resource `{name}`: {source}")]
  Reconcile {
    name: String,
    #[source]
    source: ReconcileError,
  },

  /// The remote side effect has already happened; only the local
  /// bookkeeping failed.
  #[error("resource `{name}`: created remotely but persisting state failed ({source}); the remote side effect is not rolled back")]
  StatePersist {
    name: String,
    #[source]
    source: StateError,
  },

  #[error("state error: {0}")]
  State(#[from] StateError),
}

/// Decide what to do with one resource. Pure.
fn decide(data: &ResourceData) -> Result<PlanAction, ClassifyError> {
  if data.id().is_none() {
    return Ok(PlanAction::Create);
  }

  let classification = classify(data)?;
  if classification.requires_replacement() {
    return Ok(PlanAction::Replace(
      classification.replace_keys().iter().cloned().collect(),
    ));
  }

  if data.has_change(attr::LIFECYCLE_COMMANDS) {
    Ok(PlanAction::DeferCommandChange)
  } else if data.has_config_change() {
    Ok(PlanAction::Update)
  } else {
    Ok(PlanAction::Refresh)
  }
}

/// Build the mid-apply view of one resource from stored state plus the
/// desired configuration.
fn staged(stored: Option<StoredResource>, desired: &ScriptConfig) -> ResourceData {
  match stored {
    Some(stored) => ResourceData::existing(stored, desired.clone()),
    None => ResourceData::new(desired.clone()),
  }
}

/// Compute the plan for a resource file without executing anything.
pub fn plan(store: &StateStore, file: &ResourceFile) -> Result<Vec<(String, PlanAction)>, ApplyError> {
  let mut actions = Vec::new();

  for (name, config) in &file.resources {
    config.validate().map_err(|source| ApplyError::Validate {
      name: name.clone(),
      source,
    })?;

    let data = staged(store.load(name)?, config);
    let action = decide(&data).map_err(|source| ApplyError::Classify {
      name: name.clone(),
      source,
    })?;
    actions.push((name.clone(), action));
  }

  for name in store.list()? {
    if !file.resources.contains_key(&name) {
      actions.push((name, PlanAction::Destroy));
    }
  }

  Ok(actions)
}

/// Apply a resource file.
pub async fn apply(
  session: &dyn Session,
  store: &StateStore,
  file: &ResourceFile,
) -> Result<ApplyReport, ApplyError> {
  let mut report = ApplyReport::default();

  // Destroy resources removed from the file first, with the commands
  // they were created with.
  for name in store.list()? {
    if file.resources.contains_key(&name) {
      continue;
    }
    let Some(stored) = store.load(&name)? else { continue };
    info!(resource = %name, "resource removed from file; destroying");

    let config = stored.record.config.clone();
    let mut data = ResourceData::existing(stored, config);
    reconcile::delete(session, &mut data)
      .await
      .map_err(|source| ApplyError::Reconcile {
        name: name.clone(),
        source,
      })?;
    store.remove(&name)?;
    report.destroyed.push(name);
  }

  for (name, config) in &file.resources {
    config.validate().map_err(|source| ApplyError::Validate {
      name: name.clone(),
      source,
    })?;

    let mut data = staged(store.load(name)?, config);
    let action = decide(&data).map_err(|source| ApplyError::Classify {
      name: name.clone(),
      source,
    })?;

    match &action {
      PlanAction::Create => {
        reconcile::create(session, &mut data)
          .await
          .map_err(|source| ApplyError::Reconcile {
            name: name.clone(),
            source,
          })?;
        report.created.push(name.clone());
      }

      PlanAction::Replace(keys) => {
        warn!(resource = %name, keys = ?keys, "replacing resource");
        // Destroy with the committed configuration, then create fresh
        // with the desired one.
        let committed = data.prior().clone();
        let prior_config = committed.config.clone();
        let mut old = ResourceData::existing(
          StoredResource {
            id: data.id().unwrap_or_default().to_string(),
            record: committed,
          },
          prior_config,
        );
        reconcile::delete(session, &mut old)
          .await
          .map_err(|source| ApplyError::Reconcile {
            name: name.clone(),
            source,
          })?;
        // The old instance is gone. Commit that before attempting the
        // create, so a failed create leaves a resource to recreate
        // rather than one whose delete command gets run twice.
        store.remove(name)?;

        data = ResourceData::new(config.clone());
        reconcile::create(session, &mut data)
          .await
          .map_err(|source| ApplyError::Reconcile {
            name: name.clone(),
            source,
          })?;
        report.replaced.push(name.clone());
      }

      PlanAction::Update | PlanAction::DeferCommandChange => {
        reconcile::update(session, &mut data)
          .await
          .map_err(|source| ApplyError::Reconcile {
            name: name.clone(),
            source,
          })?;
        if matches!(action, PlanAction::Update) {
          report.updated.push(name.clone());
        } else {
          report.deferred.push(name.clone());
        }
      }

      PlanAction::Refresh => {
        reconcile::read(session, &mut data)
          .await
          .map_err(|source| ApplyError::Reconcile {
            name: name.clone(),
            source,
          })?;
        report.refreshed.push(name.clone());
      }

      // Destroy is produced only for removed resources, handled above.
      PlanAction::Destroy => {}
    }

    if let Some(resource) = data.to_stored() {
      store.save(name, &resource).map_err(|source| ApplyError::StatePersist {
        name: name.clone(),
        source,
      })?;
    }
  }

  info!(touched = report.total(), "apply complete");
  Ok(report)
}

/// Destroy every resource with persisted state.
pub async fn destroy_all(session: &dyn Session, store: &StateStore) -> Result<ApplyReport, ApplyError> {
  let mut report = ApplyReport::default();

  for name in store.list()? {
    let Some(stored) = store.load(&name)? else { continue };
    let config = stored.record.config.clone();
    let mut data = ResourceData::existing(stored, config);
    reconcile::delete(session, &mut data)
      .await
      .map_err(|source| ApplyError::Reconcile {
        name: name.clone(),
        source,
      })?;
    store.remove(&name)?;
    report.destroyed.push(name);
  }

  info!(destroyed = report.destroyed.len(), "destroy complete");
  Ok(report)
}
