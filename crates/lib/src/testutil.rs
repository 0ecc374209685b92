//! Test helpers shared across the crate's tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use linscript_transport::{ExecRequest, Session, SessionError};

/// A scripted in-memory session.
///
/// Responses are queued in order; every run records its request so tests
/// can assert on what would have reached the host. Running past the end
/// of the queue yields a connection error rather than a panic.
#[derive(Debug, Default)]
pub struct FakeSession {
  responses: Mutex<VecDeque<Result<String, SessionError>>>,
  requests: Mutex<Vec<ExecRequest>>,
}

impl FakeSession {
  pub fn new() -> Self {
    Self::default()
  }

  /// Queue a successful execution returning the given stdout.
  pub fn push_ok(&self, output: &str) {
    self
      .responses
      .lock()
      .expect("responses lock")
      .push_back(Ok(output.to_string()));
  }

  /// Queue a command exit failure.
  pub fn push_exit(&self, code: i32, stderr: &str) {
    self
      .responses
      .lock()
      .expect("responses lock")
      .push_back(Err(SessionError::CommandExit {
        code: Some(code),
        stderr: stderr.to_string(),
      }));
  }

  /// Queue a connection-level failure.
  pub fn push_connection_error(&self, message: &str) {
    self
      .responses
      .lock()
      .expect("responses lock")
      .push_back(Err(SessionError::Connection {
        message: message.to_string(),
      }));
  }

  /// All requests run so far, in order.
  pub fn requests(&self) -> Vec<ExecRequest> {
    self.requests.lock().expect("requests lock").clone()
  }
}

#[async_trait]
impl Session for FakeSession {
  async fn run(&self, req: &ExecRequest) -> Result<String, SessionError> {
    self.requests.lock().expect("requests lock").push(req.clone());
    self
      .responses
      .lock()
      .expect("responses lock")
      .pop_front()
      .unwrap_or_else(|| {
        Err(SessionError::Connection {
          message: "no scripted response left".to_string(),
        })
      })
  }
}
