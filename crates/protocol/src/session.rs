//! Search session creation payloads.

use serde::{Deserialize, Serialize};

/// Success body of `POST /places/session`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCreated {
	pub session_token: String,
}

/// Some deployments wrap the token in a `data` envelope.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SessionPayload {
	Wrapped { data: SessionCreated },
	Bare(SessionCreated),
}

impl SessionPayload {
	pub fn into_token(self) -> String {
		match self {
			Self::Wrapped { data } => data.session_token,
			Self::Bare(created) => created.session_token,
		}
	}
}
