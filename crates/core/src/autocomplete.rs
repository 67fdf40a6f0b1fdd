//! Debounced, cancellable place autocomplete.
//!
//! Each [`AutocompleteCoordinator::search`] call supersedes the previous
//! one: its debounce timer is discarded and any request already on the wire
//! is dropped. Only the most recent query can write to [`SearchState`].

use std::sync::Arc;
use std::time::Duration;

use lead_protocol::{AutocompleteQuery, Suggestion, parse_suggestions};
use lead_runtime::{CancellationToken, Debouncer, Observable};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, trace, warn};

use crate::backend::{ApiResponse, SharedBackend};
use crate::config::AutocompleteConfig;
use crate::error::Result;
use crate::geo::{GeoPosition, GeoState};
use crate::session::{SessionState, SessionToken};

const SEARCH_FAILURE: &str = "Search failed";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
	/// Backend answered 429. `retry_after` is the server's hint, if any; it is
	/// never acted on here.
	#[error("Too many requests. Please try again shortly.")]
	RateLimited { retry_after: Option<Duration> },

	#[error("{message}")]
	Backend { status: u16, message: String },

	#[error("Could not reach the server: {0}")]
	Network(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
	pub suggestions: Vec<Suggestion>,
	pub loading: bool,
	pub error: Option<SearchError>,
}

/// Builds the request for a trimmed query. Location is attached only when
/// both coordinates are known, and the radius only alongside it.
pub fn build_query(
	query: &str,
	config: &AutocompleteConfig,
	session: Option<&SessionToken>,
	position: Option<GeoPosition>,
) -> AutocompleteQuery {
	AutocompleteQuery {
		q: query.to_string(),
		session_token: session.map(|token| token.as_str().to_string()),
		country: config.country.clone(),
		language: config.language.clone(),
		lat: position.map(|p| p.lat),
		lng: position.map(|p| p.lng),
		radius: position.map(|_| config.radius_meters),
	}
}

/// Maps a backend reply to suggestions or a search error.
pub fn classify(response: Result<ApiResponse>) -> std::result::Result<Vec<Suggestion>, SearchError> {
	let response = response.map_err(|e| SearchError::Network(e.detail()))?;

	if response.is_rate_limited() {
		return Err(SearchError::RateLimited {
			retry_after: response.retry_after,
		});
	}
	if !response.is_success() {
		let message = response
			.error_body()
			.top_level_message()
			.map(str::to_string)
			.unwrap_or_else(|| SEARCH_FAILURE.to_string());
		return Err(SearchError::Backend {
			status: response.status,
			message,
		});
	}

	Ok(parse_suggestions(&response.body))
}

/// Everything a fired search needs, detached from the coordinator so the
/// debounced task can own it.
#[derive(Clone)]
struct SearchContext {
	backend: SharedBackend,
	config: AutocompleteConfig,
	state: Arc<Observable<SearchState>>,
	session: Option<watch::Receiver<SessionState>>,
	location: Option<watch::Receiver<GeoState>>,
}

impl SearchContext {
	async fn run(self, query: String, token: CancellationToken) {
		let session_token = self.session.as_ref().and_then(|rx| rx.borrow().session_token.clone());
		let position = self.location.as_ref().and_then(|rx| rx.borrow().position());
		let request = build_query(&query, &self.config, session_token.as_ref(), position);

		if !self.state.commit(&token, |state| {
			state.loading = true;
			state.error = None;
		}) {
			return;
		}

		debug!(
			target = "leads.search",
			query = %request.q,
			has_session = request.session_token.is_some(),
			has_location = request.lat.is_some(),
			"autocomplete request"
		);
		let outcome = classify(self.backend.autocomplete(&request).await);

		if let Err(error) = &outcome {
			warn!(target = "leads.search", query = %request.q, %error, "autocomplete failed");
		}

		let committed = self.state.commit(&token, |state| {
			state.loading = false;
			match outcome {
				Ok(suggestions) => {
					state.suggestions = suggestions;
					state.error = None;
				}
				Err(error) => {
					state.suggestions.clear();
					state.error = Some(error);
				}
			}
		});
		if !committed {
			trace!(target = "leads.search", query = %request.q, "stale autocomplete result discarded");
		}
	}
}

/// Turns keystrokes into at most one visible suggestion list per settled
/// query.
pub struct AutocompleteCoordinator {
	context: SearchContext,
	debouncer: Debouncer,
}

impl AutocompleteCoordinator {
	pub fn new(backend: SharedBackend, config: AutocompleteConfig) -> Self {
		let debouncer = Debouncer::new(config.debounce());
		Self {
			context: SearchContext {
				backend,
				config,
				state: Arc::new(Observable::default()),
				session: None,
				location: None,
			},
			debouncer,
		}
	}

	/// Reads the session token from `session` when a search fires.
	pub fn with_session(mut self, session: watch::Receiver<SessionState>) -> Self {
		self.context.session = Some(session);
		self
	}

	/// Reads coordinates from `location` when a search fires.
	pub fn with_location(mut self, location: watch::Receiver<GeoState>) -> Self {
		self.context.location = Some(location);
		self
	}

	pub fn config(&self) -> &AutocompleteConfig {
		&self.context.config
	}

	pub fn state(&self) -> SearchState {
		self.context.state.get()
	}

	pub fn subscribe(&self) -> watch::Receiver<SearchState> {
		self.context.state.subscribe()
	}

	pub fn suggestions(&self) -> Vec<Suggestion> {
		self.context.state.borrow().suggestions.clone()
	}

	/// Queues a search for `query`, superseding any earlier one.
	///
	/// Queries shorter than the minimum length clear the suggestions right
	/// away and never reach the network. Must be called from within a Tokio
	/// runtime.
	pub fn search(&self, query: &str) {
		if self.debouncer.is_shutdown() {
			trace!(target = "leads.search", "search after close ignored");
			return;
		}

		let query = query.trim();
		if query.chars().count() < self.context.config.min_query_length {
			self.context.state.update(|state| {
				self.debouncer.cancel();
				state.suggestions.clear();
				state.error = None;
				state.loading = false;
			});
			return;
		}

		let context = self.context.clone();
		let query = query.to_string();
		self.debouncer.schedule(move |token| context.run(query, token));
	}

	/// Discards the pending timer and any in-flight request. Nothing is
	/// written to the state afterwards.
	pub fn close(&self) {
		self.context.state.fence(|| self.debouncer.shutdown());
	}

	pub fn is_closed(&self) -> bool {
		self.debouncer.is_shutdown()
	}
}

impl Drop for AutocompleteCoordinator {
	fn drop(&mut self) {
		self.close();
	}
}

#[cfg(test)]
mod tests {
	use serde_json::json;
	use tokio::time::Instant;

	use super::*;
	use crate::backend::{FakeBackend, FakeBackendController, Operation, Reply};
	use crate::error::Error;
	use crate::geo::Permission;

	const DEBOUNCE: Duration = Duration::from_millis(400);

	fn coordinator() -> (AutocompleteCoordinator, FakeBackendController) {
		let (backend, controller) = FakeBackend::new();
		(AutocompleteCoordinator::new(backend, AutocompleteConfig::default()), controller)
	}

	fn suggestion(place_id: &str) -> serde_json::Value {
		json!({
			"place_id": place_id,
			"description": format!("{place_id}, MG Road"),
			"main_text": place_id,
			"secondary_text": "MG Road"
		})
	}

	async fn settle() {
		tokio::time::sleep(DEBOUNCE + Duration::from_millis(50)).await;
	}

	#[test]
	fn query_carries_location_only_when_known() {
		let config = AutocompleteConfig::default();
		let token = SessionToken::new("tok");

		let bare = build_query("pizza", &config, None, None);
		assert_eq!(bare.country, "in");
		assert_eq!(bare.language, "en");
		assert!(bare.session_token.is_none());
		assert!(bare.lat.is_none() && bare.lng.is_none() && bare.radius.is_none());

		let located = build_query("pizza", &config, Some(&token), Some(GeoPosition { lat: 12.97, lng: 77.59 }));
		assert_eq!(located.session_token.as_deref(), Some("tok"));
		assert_eq!(located.lat, Some(12.97));
		assert_eq!(located.lng, Some(77.59));
		assert_eq!(located.radius, Some(50_000));
	}

	#[test]
	fn classification_distinguishes_rate_limits() {
		let limited = ApiResponse::new(429, json!({ "message": "slow down" })).with_retry_after(Duration::from_secs(60));
		assert_eq!(
			classify(Ok(limited)),
			Err(SearchError::RateLimited {
				retry_after: Some(Duration::from_secs(60))
			})
		);

		assert_eq!(
			classify(Ok(ApiResponse::new(500, json!({ "message": "Places API down" })))),
			Err(SearchError::Backend {
				status: 500,
				message: "Places API down".into()
			})
		);
		assert_eq!(
			classify(Ok(ApiResponse::new(502, serde_json::Value::Null))),
			Err(SearchError::Backend {
				status: 502,
				message: SEARCH_FAILURE.into()
			})
		);
		assert_eq!(
			classify(Err(Error::Transport("offline".into()))),
			Err(SearchError::Network("offline".into()))
		);
	}

	#[test]
	fn classification_accepts_both_success_shapes() {
		let wrapped = classify(Ok(ApiResponse::new(200, json!({ "data": [suggestion("p1")] })))).unwrap();
		let bare = classify(Ok(ApiResponse::new(200, json!([suggestion("p1")])))).unwrap();
		assert_eq!(wrapped, bare);
		assert_eq!(wrapped[0].place_id, "p1");

		let odd = classify(Ok(ApiResponse::new(200, json!({ "results": [] })))).unwrap();
		assert!(odd.is_empty());
	}

	#[tokio::test(start_paused = true)]
	async fn short_query_clears_without_network() {
		let (search, controller) = coordinator();
		controller.push(Operation::Autocomplete, Reply::json(200, json!([suggestion("p1")])));

		search.search("pizza");
		settle().await;
		assert_eq!(search.suggestions().len(), 1);

		search.search("  pi  ");
		let state = search.state();
		assert!(state.suggestions.is_empty());
		assert!(state.error.is_none());
		assert!(!state.loading);

		settle().await;
		assert_eq!(controller.call_count(Operation::Autocomplete), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn short_prefixes_never_reach_the_backend() {
		let (search, controller) = coordinator();

		search.search("a");
		search.search("ab");
		search.search("abc");
		settle().await;

		let calls = controller.calls_for(Operation::Autocomplete);
		assert_eq!(calls.len(), 1);
		assert_eq!(calls[0].body["q"], "abc");
	}

	#[tokio::test(start_paused = true)]
	async fn rapid_typing_makes_one_call_after_quiet_period() {
		let (search, controller) = coordinator();

		for query in ["piz", "pizz", "pizza"] {
			search.search(query);
			tokio::time::sleep(Duration::from_millis(100)).await;
		}
		let last_keystroke = Instant::now() - Duration::from_millis(100);
		settle().await;

		let calls = controller.calls_for(Operation::Autocomplete);
		assert_eq!(calls.len(), 1);
		assert_eq!(calls[0].body["q"], "pizza");
		assert!(calls[0].at - last_keystroke >= DEBOUNCE);
	}

	#[tokio::test(start_paused = true)]
	async fn newer_query_wins_over_slow_older_one() {
		let (search, controller) = coordinator();
		let (slow, gate) = Reply::json(200, json!([suggestion("old")])).held();
		controller.push_for_query("cafe", slow);
		controller.push_for_query("cafes", Reply::json(200, json!([suggestion("new")])));

		search.search("cafe");
		settle().await;
		assert!(search.state().loading);

		search.search("cafes");
		settle().await;
		gate.release();
		settle().await;

		let state = search.state();
		assert_eq!(state.suggestions.len(), 1);
		assert_eq!(state.suggestions[0].place_id, "new");
		assert!(!state.loading);
		assert_eq!(controller.abandoned(Operation::Autocomplete), 1);
	}

	#[tokio::test(start_paused = true)]
	async fn rate_limit_is_distinct_and_clears_suggestions() {
		let (search, controller) = coordinator();
		controller.push_for_query("pizza", Reply::json(200, json!([suggestion("p1")])));
		controller.push_for_query(
			"pizzas",
			Reply::response(ApiResponse::new(429, json!({ "message": "Too many" })).with_retry_after(Duration::from_secs(60))),
		);

		search.search("pizza");
		settle().await;
		assert_eq!(search.suggestions().len(), 1);

		search.search("pizzas");
		settle().await;

		let state = search.state();
		assert!(state.suggestions.is_empty());
		assert!(!state.loading);
		assert_eq!(
			state.error,
			Some(SearchError::RateLimited {
				retry_after: Some(Duration::from_secs(60))
			})
		);
		settle().await;
		assert_eq!(controller.call_count(Operation::Autocomplete), 2);
	}

	#[tokio::test(start_paused = true)]
	async fn backend_and_network_failures_clear_suggestions() {
		let (search, controller) = coordinator();
		controller.push(Operation::Autocomplete, Reply::json(200, json!([suggestion("p1")])));
		controller.push(Operation::Autocomplete, Reply::json(500, json!({ "message": "Places API down" })));
		controller.push(Operation::Autocomplete, Reply::network_error("connection reset"));

		search.search("pizza");
		settle().await;
		search.search("pizzas");
		settle().await;
		assert!(search.suggestions().is_empty());
		assert_eq!(search.state().error.map(|e| e.to_string()), Some("Places API down".into()));

		search.search("pizzeria");
		settle().await;
		assert_eq!(search.state().error, Some(SearchError::Network("connection reset".into())));
	}

	#[tokio::test(start_paused = true)]
	async fn session_and_location_are_read_when_timer_fires() {
		let (backend, controller) = FakeBackend::new();
		let (session_tx, session_rx) = watch::channel(SessionState::default());
		let (geo_tx, geo_rx) = watch::channel(GeoState::default());
		let search = AutocompleteCoordinator::new(backend, AutocompleteConfig::default())
			.with_session(session_rx)
			.with_location(geo_rx);

		search.search("pizza");
		session_tx.send_modify(|s| s.session_token = Some(SessionToken::new("tok-9")));
		geo_tx.send_modify(|g| {
			g.lat = Some(12.97);
			g.lng = Some(77.59);
			g.permission = Permission::Granted;
		});
		settle().await;

		let body = &controller.calls_for(Operation::Autocomplete)[0].body;
		assert_eq!(body["session_token"], "tok-9");
		assert_eq!(body["lat"], 12.97);
		assert_eq!(body["radius"], 50_000);
	}

	#[tokio::test(start_paused = true)]
	async fn close_mid_debounce_prevents_request() {
		let (search, controller) = coordinator();
		let mut rx = search.subscribe();

		search.search("pizza");
		tokio::time::sleep(Duration::from_millis(200)).await;
		search.close();
		rx.borrow_and_update();
		settle().await;

		assert_eq!(controller.call_count(Operation::Autocomplete), 0);
		assert!(!rx.has_changed().unwrap());
	}

	#[tokio::test(start_paused = true)]
	async fn close_mid_request_discards_response() {
		let (search, controller) = coordinator();
		let (slow, gate) = Reply::json(200, json!([suggestion("late")])).held();
		controller.push(Operation::Autocomplete, slow);
		let mut rx = search.subscribe();

		search.search("pizza");
		settle().await;
		search.close();
		rx.borrow_and_update();
		gate.release();
		settle().await;

		assert!(search.suggestions().is_empty());
		assert!(!rx.has_changed().unwrap());
		assert_eq!(controller.abandoned(Operation::Autocomplete), 1);

		search.search("pizzas");
		settle().await;
		assert_eq!(controller.call_count(Operation::Autocomplete), 1);
	}
}
