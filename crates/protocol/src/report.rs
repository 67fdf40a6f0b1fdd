//! Lead report submission payloads.

use serde::{Deserialize, Serialize};

/// Body of `POST /leads/report`.
///
/// Fields are already trimmed; empty contact fields are omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPayload {
	pub place_id: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub phone: Option<String>,
}

/// Body returned with `201 Created` for a new lead.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadCreated {
	#[serde(default)]
	pub message: Option<String>,
	#[serde(default)]
	pub data: Option<LeadData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadData {
	#[serde(default)]
	pub lead_id: Option<String>,
}

/// Body returned with `200 OK`; `success: false` marks an existing claim.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeadAcknowledged {
	#[serde(default)]
	pub success: Option<bool>,
	#[serde(default)]
	pub message: Option<String>,
}
