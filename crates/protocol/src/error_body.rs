//! Error bodies returned alongside non-success statuses.

use serde::Deserialize;
use serde_json::Value;

/// Union of the error shapes the backend emits.
///
/// Validation failures arrive as `{"error": [{"message": ...}, ...]}`, other
/// failures as `{"message": ...}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
	#[serde(default)]
	pub message: Option<String>,
	/// Kept loose: some routes send a string here instead of a list.
	#[serde(default)]
	pub error: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ErrorDetail {
	#[serde(default)]
	pub message: Option<String>,
	#[serde(default)]
	pub field: Option<String>,
}

impl ErrorBody {
	/// Decodes an error body, treating any unrecognised shape as empty.
	pub fn from_value(body: &Value) -> Self {
		Self::deserialize(body).unwrap_or_default()
	}

	/// Top-level `message` only.
	pub fn top_level_message(&self) -> Option<&str> {
		self.message.as_deref().filter(|m| !m.trim().is_empty())
	}

	/// Structured error details, if `error` is a list of objects.
	pub fn details(&self) -> Vec<ErrorDetail> {
		self.error
			.as_ref()
			.and_then(Value::as_array)
			.map(|items| items.iter().filter_map(|item| ErrorDetail::deserialize(item).ok()).collect())
			.unwrap_or_default()
	}

	/// First structured error message, then the top-level message.
	pub fn best_message(&self) -> Option<String> {
		self.details()
			.into_iter()
			.next()
			.and_then(|detail| detail.message)
			.filter(|m| !m.trim().is_empty())
			.or_else(|| self.top_level_message().map(str::to_string))
	}
}
