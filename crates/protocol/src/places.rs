//! Places autocomplete request and response shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single autocomplete prediction returned by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
	pub place_id: String,
	#[serde(default)]
	pub description: String,
	#[serde(default)]
	pub main_text: String,
	#[serde(default)]
	pub secondary_text: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub types: Option<Vec<String>>,
}

/// Query string parameters for `GET /places/autocomplete`.
///
/// Optional parameters are omitted from the query string entirely rather
/// than sent empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutocompleteQuery {
	pub q: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub session_token: Option<String>,
	pub country: String,
	pub language: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub lat: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub lng: Option<f64>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub radius: Option<u32>,
}

/// Accepted success payloads for autocomplete.
///
/// The backend sometimes wraps predictions in `{"data": [...]}` and sometimes
/// returns the bare array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SuggestionsPayload {
	Wrapped { data: Vec<Suggestion> },
	Bare(Vec<Suggestion>),
}

impl SuggestionsPayload {
	pub fn into_vec(self) -> Vec<Suggestion> {
		match self {
			Self::Wrapped { data } => data,
			Self::Bare(list) => list,
		}
	}
}

/// Extracts predictions from a success body, defaulting to an empty list
/// when the body matches neither accepted shape.
pub fn parse_suggestions(body: &Value) -> Vec<Suggestion> {
	SuggestionsPayload::deserialize(body).map(SuggestionsPayload::into_vec).unwrap_or_default()
}
