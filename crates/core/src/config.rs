//! Client configuration.
//!
//! Every field has a default, so an empty JSON object (or a missing file) is a
//! valid configuration. Environment variables override file values:
//!
//! | Variable | Field |
//! |---|---|
//! | `LEADS_API_BASE_URL` | `apiBaseUrl` |
//! | `LEADS_DEBOUNCE_MS` | `autocomplete.debounceMs` |
//! | `LEADS_MIN_QUERY_LENGTH` | `autocomplete.minQueryLength` |
//! | `LEADS_COUNTRY` | `autocomplete.country` |
//! | `LEADS_LANGUAGE` | `autocomplete.language` |
//! | `LEADS_RADIUS_METERS` | `autocomplete.radiusMeters` |

use std::fmt::Display;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api/v1";
pub const DEFAULT_MIN_QUERY_LENGTH: usize = 3;
pub const DEFAULT_DEBOUNCE_MS: u64 = 400;
pub const DEFAULT_COUNTRY: &str = "in";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const DEFAULT_RADIUS_METERS: u32 = 50_000;
pub const DEFAULT_GEO_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_GEO_MAXIMUM_AGE_MS: u64 = 60_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
	pub api_base_url: String,
	/// Whole-request timeout for the HTTP client. Unset by default:
	/// autocomplete relies on being superseded, not on elapsed time.
	pub request_timeout_ms: Option<u64>,
	pub autocomplete: AutocompleteConfig,
	pub geolocation: GeolocationConfig,
	pub report: ReportConfig,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			api_base_url: DEFAULT_API_BASE_URL.to_string(),
			request_timeout_ms: None,
			autocomplete: AutocompleteConfig::default(),
			geolocation: GeolocationConfig::default(),
			report: ReportConfig::default(),
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AutocompleteConfig {
	pub min_query_length: usize,
	pub debounce_ms: u64,
	pub country: String,
	pub language: String,
	pub radius_meters: u32,
}

impl Default for AutocompleteConfig {
	fn default() -> Self {
		Self {
			min_query_length: DEFAULT_MIN_QUERY_LENGTH,
			debounce_ms: DEFAULT_DEBOUNCE_MS,
			country: DEFAULT_COUNTRY.to_string(),
			language: DEFAULT_LANGUAGE.to_string(),
			radius_meters: DEFAULT_RADIUS_METERS,
		}
	}
}

impl AutocompleteConfig {
	pub fn debounce(&self) -> Duration {
		Duration::from_millis(self.debounce_ms)
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GeolocationConfig {
	pub timeout_ms: u64,
	/// How old a cached fix may be and still be reused.
	pub maximum_age_ms: u64,
	pub enable_high_accuracy: bool,
}

impl Default for GeolocationConfig {
	fn default() -> Self {
		Self {
			timeout_ms: DEFAULT_GEO_TIMEOUT_MS,
			maximum_age_ms: DEFAULT_GEO_MAXIMUM_AGE_MS,
			enable_high_accuracy: false,
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReportConfig {
	/// Refuse a second submission while one is pending instead of leaving
	/// serialization to the caller.
	pub reject_concurrent: bool,
}

impl ClientConfig {
	/// Loads configuration from a JSON file. A missing file yields defaults.
	pub fn load(path: &Path) -> Result<Self> {
		if !path.exists() {
			debug!(target = "leads.config", path = %path.display(), "config file not found; using defaults");
			return Ok(Self::default());
		}

		let content = fs::read_to_string(path)?;
		let config: Self =
			serde_json::from_str(&content).map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
		info!(target = "leads.config", path = %path.display(), "loaded client config");
		Ok(config)
	}

	/// Defaults overridden by the process environment.
	pub fn from_env() -> Self {
		Self::default().apply_env()
	}

	pub fn apply_env(self) -> Self {
		self.apply_overrides(|key| std::env::var(key).ok())
	}

	/// Applies overrides from `lookup`, keeping the current value whenever a
	/// variable is absent or does not parse.
	pub fn apply_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
		if let Some(url) = lookup("LEADS_API_BASE_URL").filter(|v| !v.trim().is_empty()) {
			self.api_base_url = url.trim().to_string();
		}
		override_parsed(&lookup, "LEADS_DEBOUNCE_MS", &mut self.autocomplete.debounce_ms);
		override_parsed(&lookup, "LEADS_MIN_QUERY_LENGTH", &mut self.autocomplete.min_query_length);
		override_parsed(&lookup, "LEADS_RADIUS_METERS", &mut self.autocomplete.radius_meters);
		if let Some(country) = lookup("LEADS_COUNTRY").filter(|v| !v.trim().is_empty()) {
			self.autocomplete.country = country.trim().to_lowercase();
		}
		if let Some(language) = lookup("LEADS_LANGUAGE").filter(|v| !v.trim().is_empty()) {
			self.autocomplete.language = language.trim().to_lowercase();
		}
		self
	}

	pub fn request_timeout(&self) -> Option<Duration> {
		self.request_timeout_ms.map(Duration::from_millis)
	}
}

fn override_parsed<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T)
where
	T: FromStr + Display,
	T::Err: Display,
{
	let Some(raw) = lookup(key) else {
		return;
	};
	match raw.trim().parse() {
		Ok(value) => *slot = value,
		Err(e) => warn!(target = "leads.config", %key, error = %e, kept = %slot, "invalid override; keeping current value"),
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use tempfile::TempDir;

	use super::*;

	fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
		move |key| map.get(key).cloned()
	}

	#[test]
	fn defaults_match_search_contract() {
		let config = ClientConfig::default();
		assert_eq!(config.autocomplete.min_query_length, 3);
		assert_eq!(config.autocomplete.debounce(), Duration::from_millis(400));
		assert_eq!(config.autocomplete.country, "in");
		assert_eq!(config.autocomplete.language, "en");
		assert_eq!(config.autocomplete.radius_meters, 50_000);
		assert_eq!(config.geolocation.timeout_ms, 10_000);
		assert_eq!(config.geolocation.maximum_age_ms, 60_000);
		assert!(!config.report.reject_concurrent);
		assert!(config.request_timeout().is_none());
	}

	#[test]
	fn missing_file_yields_defaults() {
		let tmp = TempDir::new().expect("temp dir should be created");
		let config = ClientConfig::load(&tmp.path().join("leads.json")).unwrap();
		assert_eq!(config, ClientConfig::default());
	}

	#[test]
	fn partial_file_keeps_remaining_defaults() {
		let tmp = TempDir::new().expect("temp dir should be created");
		let path = tmp.path().join("leads.json");
		fs::write(
			&path,
			r#"{"apiBaseUrl":"https://api.example.test/v1","autocomplete":{"debounceMs":250},"report":{"rejectConcurrent":true}}"#,
		)
		.unwrap();

		let config = ClientConfig::load(&path).unwrap();
		assert_eq!(config.api_base_url, "https://api.example.test/v1");
		assert_eq!(config.autocomplete.debounce_ms, 250);
		assert_eq!(config.autocomplete.min_query_length, 3);
		assert!(config.report.reject_concurrent);
	}

	#[test]
	fn malformed_file_is_a_config_error() {
		let tmp = TempDir::new().expect("temp dir should be created");
		let path = tmp.path().join("leads.json");
		fs::write(&path, "{ not json").unwrap();
		assert!(matches!(ClientConfig::load(&path), Err(Error::Config(_))));
	}

	#[test]
	fn overrides_apply_and_bad_values_are_ignored() {
		let config = ClientConfig::default().apply_overrides(lookup_from(&[
			("LEADS_API_BASE_URL", " https://leads.example.test "),
			("LEADS_DEBOUNCE_MS", "250"),
			("LEADS_MIN_QUERY_LENGTH", "three"),
			("LEADS_COUNTRY", "US"),
		]));
		assert_eq!(config.api_base_url, "https://leads.example.test");
		assert_eq!(config.autocomplete.debounce_ms, 250);
		assert_eq!(config.autocomplete.min_query_length, 3);
		assert_eq!(config.autocomplete.country, "us");
		assert_eq!(config.autocomplete.language, "en");
	}
}
