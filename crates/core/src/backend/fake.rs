//! Scripted in-memory backend for exercising request lifecycles without a
//! server.
//!
//! # Example
//!
//! ```ignore
//! let (backend, controller) = FakeBackend::new();
//! controller.push(Operation::Autocomplete, Reply::json(200, json!({"data": []})));
//! let (slow, gate) = Reply::json(200, json!([])).held();
//! controller.push_for_query("pizza", slow);
//!
//! // ... drive the pipeline ...
//! gate.release();
//! assert_eq!(controller.call_count(Operation::Autocomplete), 1);
//! ```
//!
//! Unscripted calls get a benign default: a fresh session token, an empty
//! suggestion list, or a created lead.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lead_protocol::{AutocompleteQuery, ReportPayload};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::oneshot;
use tokio::time::Instant;

use super::{ApiResponse, LeadBackend};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
	CreateSession,
	Autocomplete,
	SubmitReport,
}

/// A scripted reply: a response or a transport failure, optionally delayed
/// or held until released.
#[derive(Debug)]
pub struct Reply {
	outcome: std::result::Result<ApiResponse, String>,
	delay: Duration,
	gate: Option<oneshot::Receiver<()>>,
}

impl Reply {
	pub fn response(response: ApiResponse) -> Self {
		Self {
			outcome: Ok(response),
			delay: Duration::ZERO,
			gate: None,
		}
	}

	pub fn json(status: u16, body: Value) -> Self {
		Self::response(ApiResponse::new(status, body))
	}

	/// No response at all: the call fails as a transport error.
	pub fn network_error(message: impl Into<String>) -> Self {
		Self {
			outcome: Err(message.into()),
			delay: Duration::ZERO,
			gate: None,
		}
	}

	pub fn after(mut self, delay: Duration) -> Self {
		self.delay = delay;
		self
	}

	/// Holds the reply until the returned gate is released (or dropped).
	pub fn held(mut self) -> (Self, ReplyGate) {
		let (tx, rx) = oneshot::channel();
		self.gate = Some(rx);
		(self, ReplyGate { tx })
	}
}

pub struct ReplyGate {
	tx: oneshot::Sender<()>,
}

impl ReplyGate {
	pub fn release(self) {
		let _ = self.tx.send(());
	}
}

/// A request as the fake received it.
#[derive(Debug, Clone)]
pub struct RecordedCall {
	pub operation: Operation,
	pub body: Value,
	pub at: Instant,
}

#[derive(Default)]
struct Script {
	replies: HashMap<Operation, VecDeque<Reply>>,
	by_query: HashMap<String, VecDeque<Reply>>,
	calls: Vec<RecordedCall>,
	completed: HashMap<Operation, usize>,
	abandoned: HashMap<Operation, usize>,
	issued_sessions: usize,
	issued_leads: usize,
}

impl Script {
	fn next_reply(&mut self, operation: Operation, query: Option<&str>) -> Reply {
		if let Some(reply) = query.and_then(|q| self.by_query.get_mut(q)).and_then(VecDeque::pop_front) {
			return reply;
		}
		if let Some(reply) = self.replies.get_mut(&operation).and_then(VecDeque::pop_front) {
			return reply;
		}

		match operation {
			Operation::CreateSession => {
				self.issued_sessions += 1;
				Reply::json(200, json!({ "session_token": format!("fake-session-{}", self.issued_sessions) }))
			}
			Operation::Autocomplete => Reply::json(200, json!({ "data": [] })),
			Operation::SubmitReport => {
				self.issued_leads += 1;
				Reply::json(
					201,
					json!({ "message": "Lead created", "data": { "lead_id": format!("fake-lead-{}", self.issued_leads) } }),
				)
			}
		}
	}
}

/// Counts a call as abandoned if its future is dropped before it finishes.
struct CallGuard {
	script: Arc<Mutex<Script>>,
	operation: Operation,
	finished: bool,
}

impl Drop for CallGuard {
	fn drop(&mut self) {
		let mut script = self.script.lock();
		let counter = if self.finished {
			script.completed.entry(self.operation).or_default()
		} else {
			script.abandoned.entry(self.operation).or_default()
		};
		*counter += 1;
	}
}

pub struct FakeBackend {
	script: Arc<Mutex<Script>>,
}

impl FakeBackend {
	/// Creates a shared fake and the controller used to script it.
	pub fn new() -> (Arc<Self>, FakeBackendController) {
		let script = Arc::new(Mutex::new(Script::default()));
		let backend = Arc::new(Self {
			script: Arc::clone(&script),
		});
		(backend, FakeBackendController { script })
	}

	async fn call(&self, operation: Operation, body: Value, query: Option<&str>) -> Result<ApiResponse> {
		let reply = {
			let mut script = self.script.lock();
			script.calls.push(RecordedCall {
				operation,
				body,
				at: Instant::now(),
			});
			script.next_reply(operation, query)
		};

		let mut guard = CallGuard {
			script: Arc::clone(&self.script),
			operation,
			finished: false,
		};

		if let Some(gate) = reply.gate {
			let _ = gate.await;
		}
		if !reply.delay.is_zero() {
			tokio::time::sleep(reply.delay).await;
		}

		guard.finished = true;
		reply.outcome.map_err(Error::Transport)
	}
}

#[async_trait]
impl LeadBackend for FakeBackend {
	async fn create_session(&self) -> Result<ApiResponse> {
		self.call(Operation::CreateSession, Value::Null, None).await
	}

	async fn autocomplete(&self, query: &AutocompleteQuery) -> Result<ApiResponse> {
		let body = serde_json::to_value(query)?;
		self.call(Operation::Autocomplete, body, Some(&query.q)).await
	}

	async fn submit_report(&self, payload: &ReportPayload) -> Result<ApiResponse> {
		let body = serde_json::to_value(payload)?;
		self.call(Operation::SubmitReport, body, None).await
	}
}

/// Scripts replies and inspects what the fake received.
#[derive(Clone)]
pub struct FakeBackendController {
	script: Arc<Mutex<Script>>,
}

impl FakeBackendController {
	/// Queues a reply for the next call of `operation`.
	pub fn push(&self, operation: Operation, reply: Reply) {
		self.script.lock().replies.entry(operation).or_default().push_back(reply);
	}

	/// Queues an autocomplete reply used only for the exact query text `q`.
	/// Takes precedence over replies queued with [`push`](Self::push).
	pub fn push_for_query(&self, q: &str, reply: Reply) {
		self.script.lock().by_query.entry(q.to_string()).or_default().push_back(reply);
	}

	pub fn calls(&self) -> Vec<RecordedCall> {
		self.script.lock().calls.clone()
	}

	pub fn calls_for(&self, operation: Operation) -> Vec<RecordedCall> {
		self.script
			.lock()
			.calls
			.iter()
			.filter(|call| call.operation == operation)
			.cloned()
			.collect()
	}

	pub fn call_count(&self, operation: Operation) -> usize {
		self.script.lock().calls.iter().filter(|call| call.operation == operation).count()
	}

	/// Calls whose future was dropped before a reply was produced.
	pub fn abandoned(&self, operation: Operation) -> usize {
		self.script.lock().abandoned.get(&operation).copied().unwrap_or(0)
	}

	pub fn completed(&self, operation: Operation) -> usize {
		self.script.lock().completed.get(&operation).copied().unwrap_or(0)
	}
}
