use thiserror::Error;

/// Infrastructure failures.
///
/// Component outcomes (rate limits, duplicate leads, denied permissions) are
/// not errors at this level; they surface as component state or as a
/// [`ReportOutcome`](crate::report::ReportOutcome).
#[derive(Error, Debug)]
pub enum Error {
	/// The request failed before any response arrived.
	#[error("Transport error: {0}")]
	Transport(String),

	#[error("HTTP client error: {0}")]
	Http(#[from] reqwest::Error),

	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	#[error("Configuration error: {0}")]
	Config(String),

	#[error("Invalid URL: {0}")]
	InvalidUrl(String),

	#[error("Init logging error: {0}")]
	InitLogging(#[from] tracing_subscriber::filter::ParseError),
}

impl Error {
	/// The underlying failure message, without the variant prefix for
	/// transport failures.
	pub fn detail(&self) -> String {
		match self {
			Self::Transport(message) => message.clone(),
			other => other.to_string(),
		}
	}
}

pub type Result<T> = std::result::Result<T, Error>;
