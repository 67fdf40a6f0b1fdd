//! Search session management.
//!
//! Holds the single search-session token for the lifetime of a search
//! context. Each fetch runs under its own cancellation token; starting a new
//! fetch or closing the manager cancels the previous one, and state commits
//! check that token under the state lock, so a response that arrives after
//! teardown never writes.

use std::fmt;
use std::sync::Arc;

use lead_protocol::SessionPayload;
use lead_runtime::{CancellationToken, Observable, SupersedeSlot};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::{ApiResponse, SharedBackend};

const SESSION_FAILURE: &str = "Failed to create search session";

/// Opaque token scoping a sequence of autocomplete requests.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
	pub fn new(token: impl Into<String>) -> Self {
		Self(token.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Debug for SessionToken {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("SessionToken(..)")
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
	#[error("{message}")]
	Backend { status: u16, message: String },

	#[error("Could not reach the server: {0}")]
	Network(String),

	#[error("Session response did not include a token")]
	MalformedResponse,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
	pub session_token: Option<SessionToken>,
	pub loading: bool,
	pub error: Option<SessionError>,
}

struct SessionInner {
	backend: SharedBackend,
	state: Observable<SessionState>,
	slot: SupersedeSlot,
}

impl SessionInner {
	fn begin_fetch(&self) -> CancellationToken {
		let token = self.slot.begin();
		self.state.commit(&token, |state| {
			*state = SessionState {
				session_token: None,
				loading: true,
				error: None,
			};
		});
		token
	}

	async fn fetch(&self, token: CancellationToken) {
		if token.is_cancelled() {
			return;
		}
		let pending = self.state.pending(&token, |state| state.loading = false);

		let response = tokio::select! {
			biased;
			_ = token.cancelled() => {
				debug!(target = "leads.session", "session request superseded");
				return;
			}
			response = self.backend.create_session() => response,
		};

		let result = match response {
			Ok(response) => token_from_response(&response),
			Err(e) => Err(SessionError::Network(e.detail())),
		};

		let committed = self.state.commit(&token, |state| {
			*state = match result {
				Ok(session_token) => SessionState {
					session_token: Some(session_token),
					loading: false,
					error: None,
				},
				Err(error) => SessionState {
					session_token: None,
					loading: false,
					error: Some(error),
				},
			};
		});

		pending.complete();
		if !committed {
			debug!(target = "leads.session", "session response arrived after teardown; discarded");
			return;
		}

		match &self.state.borrow().error {
			None => info!(target = "leads.session", "search session created"),
			Some(error) => warn!(target = "leads.session", %error, "search session creation failed"),
		}
	}
}

fn token_from_response(response: &ApiResponse) -> Result<SessionToken, SessionError> {
	if !response.is_success() {
		let message = response.error_body().best_message().unwrap_or_else(|| SESSION_FAILURE.to_string());
		return Err(SessionError::Backend {
			status: response.status,
			message,
		});
	}

	SessionPayload::deserialize(&response.body)
		.ok()
		.map(SessionPayload::into_token)
		.filter(|token| !token.trim().is_empty())
		.map(SessionToken::new)
		.ok_or(SessionError::MalformedResponse)
}

/// Owns the search session token.
///
/// Dropping the manager tears it down: any in-flight creation request is
/// abandoned and its result discarded.
pub struct SessionManager {
	inner: Arc<SessionInner>,
}

impl SessionManager {
	/// Creates the manager and issues exactly one session-creation request.
	///
	/// Must be called from within a Tokio runtime.
	pub fn start(backend: SharedBackend) -> Self {
		let inner = Arc::new(SessionInner {
			backend,
			state: Observable::default(),
			slot: SupersedeSlot::new(),
		});

		let token = inner.begin_fetch();
		let task = Arc::clone(&inner);
		tokio::spawn(async move { task.fetch(token).await });

		Self { inner }
	}

	pub fn state(&self) -> SessionState {
		self.inner.state.get()
	}

	pub fn subscribe(&self) -> watch::Receiver<SessionState> {
		self.inner.state.subscribe()
	}

	pub fn token(&self) -> Option<SessionToken> {
		self.inner.state.borrow().session_token.clone()
	}

	/// Supersedes any pending creation and fetches a fresh token, replacing
	/// the current one.
	///
	/// Dropping the returned future abandons the request and clears
	/// `loading`, leaving no token.
	pub async fn refetch(&self) {
		let token = self.inner.begin_fetch();
		self.inner.fetch(token).await;
	}

	/// Waits until no creation request is pending and returns that state.
	pub async fn wait_ready(&self) -> SessionState {
		let mut rx = self.subscribe();
		match rx.wait_for(|state| !state.loading).await {
			Ok(state) => state.clone(),
			Err(_) => self.state(),
		}
	}

	pub fn close(&self) {
		self.inner.state.fence(|| self.inner.slot.shutdown());
		if self.inner.state.borrow().loading {
			self.inner.state.update(|state| state.loading = false);
		}
	}

	pub fn is_closed(&self) -> bool {
		self.inner.slot.is_shutdown()
	}
}

impl Drop for SessionManager {
	fn drop(&mut self) {
		self.close();
	}
}
