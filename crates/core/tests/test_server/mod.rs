//! In-process stand-in for the lead search backend.
//!
//! Routes live under `/api/v1` like the real service. A few inputs trigger
//! failure replies:
//!
//! * autocomplete `q=busy` answers 429 with `Retry-After: 60`
//! * autocomplete `q=boom` answers 500
//! * report `place_id=taken` answers 200 with `success: false`
//! * report `email=bad` answers 400 with a field error list
//!
//! Anything under `/plain` answers 503 with a text body.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

#[derive(Default)]
pub struct ServerState {
	sessions: AtomicUsize,
	queries: Mutex<Vec<HashMap<String, String>>>,
	reports: Mutex<Vec<Value>>,
}

pub struct TestServer {
	addr: SocketAddr,
	state: Arc<ServerState>,
	handle: JoinHandle<()>,
}

impl TestServer {
	pub async fn start() -> Self {
		let state = Arc::new(ServerState::default());
		let app = Router::new()
			.route("/api/v1/places/session", post(create_session))
			.route("/api/v1/places/autocomplete", get(autocomplete))
			.route("/api/v1/leads/report", post(submit_report))
			.route("/plain/places/session", post(plain_failure))
			.route("/plain/places/autocomplete", get(plain_failure))
			.route("/plain/leads/report", post(plain_failure))
			.with_state(Arc::clone(&state));

		let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test server");
		let addr = listener.local_addr().expect("test server address");
		let handle = tokio::spawn(async move {
			let _ = axum::serve(listener, app).await;
		});

		Self { addr, state, handle }
	}

	pub fn base_url(&self) -> String {
		format!("http://{}/api/v1", self.addr)
	}

	pub fn plain_url(&self) -> String {
		format!("http://{}/plain", self.addr)
	}

	pub fn sessions_issued(&self) -> usize {
		self.state.sessions.load(Ordering::SeqCst)
	}

	/// Query parameters of every autocomplete request received.
	pub fn queries(&self) -> Vec<HashMap<String, String>> {
		self.state.queries.lock().clone()
	}

	pub fn reports(&self) -> Vec<Value> {
		self.state.reports.lock().clone()
	}
}

impl Drop for TestServer {
	fn drop(&mut self) {
		self.handle.abort();
	}
}

async fn create_session(State(state): State<Arc<ServerState>>) -> Response {
	let n = state.sessions.fetch_add(1, Ordering::SeqCst) + 1;
	(StatusCode::CREATED, Json(json!({ "session_token": format!("srv-token-{n}") }))).into_response()
}

async fn autocomplete(State(state): State<Arc<ServerState>>, Query(params): Query<HashMap<String, String>>) -> Response {
	state.queries.lock().push(params.clone());
	let q = params.get("q").cloned().unwrap_or_default();

	match q.as_str() {
		"busy" => (
			StatusCode::TOO_MANY_REQUESTS,
			[(header::RETRY_AFTER, "60")],
			Json(json!({ "message": "Too many requests" })),
		)
			.into_response(),
		"boom" => (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "message": "Places API down" }))).into_response(),
		_ => Json(json!({
			"data": [{
				"place_id": format!("p-{q}"),
				"description": format!("{q}, MG Road, Bengaluru"),
				"main_text": q,
				"secondary_text": "MG Road, Bengaluru",
				"types": ["establishment"]
			}]
		}))
		.into_response(),
	}
}

async fn submit_report(State(state): State<Arc<ServerState>>, Json(body): Json<Value>) -> Response {
	state.reports.lock().push(body.clone());

	if body["place_id"] == "taken" {
		return Json(json!({ "success": false, "message": "taken" })).into_response();
	}
	if body["email"] == "bad" {
		return (
			StatusCode::BAD_REQUEST,
			Json(json!({ "message": "Validation failed", "error": [{ "field": "email", "message": "Invalid email" }] })),
		)
			.into_response();
	}

	let place_id = body["place_id"].as_str().unwrap_or_default();
	(
		StatusCode::CREATED,
		Json(json!({ "message": "Lead created", "data": { "lead_id": format!("L-{place_id}") } })),
	)
		.into_response()
}

async fn plain_failure() -> Response {
	(StatusCode::SERVICE_UNAVAILABLE, "upstream unavailable").into_response()
}
