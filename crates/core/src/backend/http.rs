//! HTTP implementation of [`LeadBackend`] over reqwest.

use async_trait::async_trait;
use lead_protocol::{AutocompleteQuery, ReportPayload};
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, RequestBuilder, Url};
use serde_json::Value;
use tracing::{debug, warn};

use super::{AUTOCOMPLETE_PATH, ApiResponse, LeadBackend, REPORT_PATH, SESSION_PATH, parse_retry_after};
use crate::config::ClientConfig;
use crate::error::{Error, Result};

#[derive(Debug, Clone)]
pub struct HttpBackend {
	client: Client,
	base_url: String,
}

impl HttpBackend {
	/// Creates a backend rooted at `base_url` (for example
	/// `https://api.example.com/api/v1`).
	pub fn new(base_url: impl Into<String>) -> Result<Self> {
		Self::with_client(base_url, Client::builder().build()?)
	}

	pub fn from_config(config: &ClientConfig) -> Result<Self> {
		let mut builder = Client::builder();
		if let Some(timeout) = config.request_timeout() {
			builder = builder.timeout(timeout);
		}
		Self::with_client(config.api_base_url.clone(), builder.build()?)
	}

	pub fn with_client(base_url: impl Into<String>, client: Client) -> Result<Self> {
		let base_url = base_url.into();
		let parsed = Url::parse(&base_url).map_err(|e| Error::InvalidUrl(format!("{base_url}: {e}")))?;
		if !matches!(parsed.scheme(), "http" | "https") {
			return Err(Error::InvalidUrl(format!("{base_url}: scheme must be http or https")));
		}
		Ok(Self {
			client,
			base_url: base_url.trim_end_matches('/').to_string(),
		})
	}

	pub fn base_url(&self) -> &str {
		&self.base_url
	}

	fn url(&self, path: &str) -> String {
		format!("{}{}", self.base_url, path)
	}

	async fn execute(&self, operation: &'static str, request: RequestBuilder) -> Result<ApiResponse> {
		let response = request.send().await.map_err(|e| {
			debug!(target = "leads.http", %operation, error = %e, "request failed without a response");
			Error::Transport(e.to_string())
		})?;

		let status = response.status().as_u16();
		let retry_after = response
			.headers()
			.get(RETRY_AFTER)
			.and_then(|value| value.to_str().ok())
			.and_then(parse_retry_after);

		let body = match response.bytes().await {
			Ok(bytes) if bytes.is_empty() => Value::Null,
			Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
				debug!(target = "leads.http", %operation, %status, error = %e, "non-JSON response body");
				Value::Null
			}),
			Err(e) => {
				warn!(target = "leads.http", %operation, %status, error = %e, "failed to read response body");
				Value::Null
			}
		};

		debug!(target = "leads.http", %operation, %status, "response received");
		Ok(ApiResponse {
			status,
			body,
			retry_after,
		})
	}
}

#[async_trait]
impl LeadBackend for HttpBackend {
	async fn create_session(&self) -> Result<ApiResponse> {
		self.execute("create_session", self.client.post(self.url(SESSION_PATH))).await
	}

	async fn autocomplete(&self, query: &AutocompleteQuery) -> Result<ApiResponse> {
		self.execute("autocomplete", self.client.get(self.url(AUTOCOMPLETE_PATH)).query(query))
			.await
	}

	async fn submit_report(&self, payload: &ReportPayload) -> Result<ApiResponse> {
		self.execute("submit_report", self.client.post(self.url(REPORT_PATH)).json(payload)).await
	}
}
