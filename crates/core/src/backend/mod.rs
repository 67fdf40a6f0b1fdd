//! Request contracts the pipeline consumes.
//!
//! The backend is opaque: every data-bearing decision (is this lead a
//! duplicate, which places match) is made remotely. Implementations only move
//! requests and report what came back. `Err` from any operation means no
//! response was received at all; every HTTP status, including failures,
//! comes back as an [`ApiResponse`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lead_protocol::{AutocompleteQuery, ErrorBody, ReportPayload};
use serde_json::Value;

use crate::error::Result;

pub mod fake;
pub mod http;

pub use fake::{FakeBackend, FakeBackendController, Operation, RecordedCall, Reply, ReplyGate};
pub use http::HttpBackend;

pub const SESSION_PATH: &str = "/places/session";
pub const AUTOCOMPLETE_PATH: &str = "/places/autocomplete";
pub const REPORT_PATH: &str = "/leads/report";

pub const STATUS_OK: u16 = 200;
pub const STATUS_CREATED: u16 = 201;
pub const STATUS_TOO_MANY_REQUESTS: u16 = 429;

/// A response as received: status, decoded JSON body (or `Null`) and the
/// transport's retry hint, if any.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
	pub status: u16,
	pub body: Value,
	/// Parsed `Retry-After` header. Informational only; nothing retries on it.
	pub retry_after: Option<Duration>,
}

impl ApiResponse {
	pub fn new(status: u16, body: Value) -> Self {
		Self {
			status,
			body,
			retry_after: None,
		}
	}

	pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
		self.retry_after = Some(retry_after);
		self
	}

	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	pub fn is_rate_limited(&self) -> bool {
		self.status == STATUS_TOO_MANY_REQUESTS
	}

	pub fn error_body(&self) -> ErrorBody {
		ErrorBody::from_value(&self.body)
	}
}

#[async_trait]
pub trait LeadBackend: Send + Sync {
	async fn create_session(&self) -> Result<ApiResponse>;

	async fn autocomplete(&self, query: &AutocompleteQuery) -> Result<ApiResponse>;

	async fn submit_report(&self, payload: &ReportPayload) -> Result<ApiResponse>;
}

pub type SharedBackend = Arc<dyn LeadBackend>;

/// Parses a `Retry-After` value given in delta-seconds.
///
/// HTTP-date values are not interpreted.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
	value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn status_predicates() {
		assert!(ApiResponse::new(201, Value::Null).is_success());
		assert!(!ApiResponse::new(429, Value::Null).is_success());
		assert!(ApiResponse::new(429, Value::Null).is_rate_limited());
		assert!(!ApiResponse::new(500, Value::Null).is_rate_limited());
	}

	#[test]
	fn retry_after_accepts_delta_seconds_only() {
		assert_eq!(parse_retry_after(" 60 "), Some(Duration::from_secs(60)));
		assert_eq!(parse_retry_after("Wed, 21 Oct 2026 07:28:00 GMT"), None);
	}

	#[test]
	fn error_body_reads_message() {
		let response = ApiResponse::new(503, json!({ "message": "Upstream unavailable" }));
		assert_eq!(response.error_body().top_level_message(), Some("Upstream unavailable"));
	}
}
