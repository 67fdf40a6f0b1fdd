//! Lead report submission.
//!
//! [`ReportSubmitter::submit_report`] never fails: validation problems,
//! duplicate claims and transport errors all come back as a
//! [`ReportOutcome`] for the caller to match on.

use lead_protocol::{LeadAcknowledged, LeadCreated, ReportPayload};
use lead_runtime::Observable;
use parking_lot::Mutex;
use serde::Deserialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::backend::{ApiResponse, STATUS_CREATED, STATUS_OK, SharedBackend};
use crate::error::Result;

pub const NEW_LEAD_MESSAGE: &str = "Thanks! Your request has been registered.";
pub const ALREADY_CLAIMED_MESSAGE: &str = "This contact is already registered for this business.";
pub const ACKNOWLEDGED_MESSAGE: &str = "Your request has been received.";
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong. Please try again.";
pub const MISSING_PLACE_MESSAGE: &str = "Please select a business first.";
pub const MISSING_CONTACT_MESSAGE: &str = "Please provide an email address or phone number.";
pub const SUBMISSION_PENDING_MESSAGE: &str = "A report is already being submitted.";

/// A claim for a place, with at least one way to reach the claimant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportRequest {
	pub place_id: String,
	pub email: Option<String>,
	pub phone: Option<String>,
}

impl ReportRequest {
	pub fn new(place_id: impl Into<String>) -> Self {
		Self {
			place_id: place_id.into(),
			..Self::default()
		}
	}

	pub fn with_email(mut self, email: impl Into<String>) -> Self {
		self.email = Some(email.into());
		self
	}

	pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
		self.phone = Some(phone.into());
		self
	}

	/// Trims every field and drops blank contact fields, or returns the
	/// message explaining what is missing.
	pub fn validate(&self) -> std::result::Result<ReportPayload, String> {
		let place_id = self.place_id.trim();
		if place_id.is_empty() {
			return Err(MISSING_PLACE_MESSAGE.to_string());
		}

		let email = non_blank(self.email.as_deref());
		let phone = non_blank(self.phone.as_deref());
		if email.is_none() && phone.is_none() {
			return Err(MISSING_CONTACT_MESSAGE.to_string());
		}

		Ok(ReportPayload {
			place_id: place_id.to_string(),
			email,
			phone,
		})
	}
}

fn non_blank(value: Option<&str>) -> Option<String> {
	value.map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
	/// `201 Created`: a new lead was registered.
	NewLead { lead_id: Option<String>, message: String },
	/// `200` with `success: false`: someone already claimed this contact.
	AlreadyClaimed { message: String },
	/// Any other `2xx`: accepted, but not reported as a new lead.
	Acknowledged { message: String },
	ValidationError { message: String },
	TransientError { message: String },
}

impl ReportOutcome {
	pub fn message(&self) -> &str {
		match self {
			Self::NewLead { message, .. }
			| Self::AlreadyClaimed { message }
			| Self::Acknowledged { message }
			| Self::ValidationError { message }
			| Self::TransientError { message } => message,
		}
	}

	pub fn is_failure(&self) -> bool {
		matches!(self, Self::ValidationError { .. } | Self::TransientError { .. })
	}

	pub fn kind(&self) -> &'static str {
		match self {
			Self::NewLead { .. } => "new_lead",
			Self::AlreadyClaimed { .. } => "already_claimed",
			Self::Acknowledged { .. } => "acknowledged",
			Self::ValidationError { .. } => "validation_error",
			Self::TransientError { .. } => "transient_error",
		}
	}

	fn failure_message(&self) -> Option<String> {
		self.is_failure().then(|| self.message().to_string())
	}
}

/// Classifies a submission reply.
///
/// `201` is a new lead and `200` with `success: false` an existing claim.
/// Other `2xx` replies are acknowledgments. Client errors other than `429`
/// are validation failures; everything else, including no response at all,
/// is transient.
pub fn classify_report(response: Result<ApiResponse>) -> ReportOutcome {
	let response = match response {
		Ok(response) => response,
		Err(e) => {
			let detail = e.detail();
			let message = if detail.trim().is_empty() {
				GENERIC_FAILURE_MESSAGE.to_string()
			} else {
				detail
			};
			return ReportOutcome::TransientError { message };
		}
	};

	if response.status == STATUS_CREATED {
		let created = LeadCreated::deserialize(&response.body).unwrap_or_default();
		return ReportOutcome::NewLead {
			lead_id: created.data.and_then(|data| data.lead_id),
			message: created.message.unwrap_or_else(|| NEW_LEAD_MESSAGE.to_string()),
		};
	}

	if response.is_success() {
		let ack = LeadAcknowledged::deserialize(&response.body).unwrap_or_default();
		if response.status == STATUS_OK && ack.success == Some(false) {
			return ReportOutcome::AlreadyClaimed {
				message: ack.message.unwrap_or_else(|| ALREADY_CLAIMED_MESSAGE.to_string()),
			};
		}
		return ReportOutcome::Acknowledged {
			message: ack.message.unwrap_or_else(|| ACKNOWLEDGED_MESSAGE.to_string()),
		};
	}

	let message = response
		.error_body()
		.best_message()
		.unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string());
	if (400..500).contains(&response.status) && !response.is_rate_limited() {
		ReportOutcome::ValidationError { message }
	} else {
		ReportOutcome::TransientError { message }
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportState {
	pub loading: bool,
	/// Message of the last failed outcome, cleared when a submission starts.
	pub error: Option<String>,
}

/// Submits lead reports and tracks their progress.
///
/// Callers serialize submissions themselves unless
/// [`with_reject_concurrent`](Self::with_reject_concurrent) is set.
pub struct ReportSubmitter {
	backend: SharedBackend,
	reject_concurrent: bool,
	pending: Mutex<usize>,
	state: Observable<ReportState>,
}

/// Keeps `loading` set while at least one submission is pending, including
/// submissions whose future is dropped part way.
struct InFlight<'a> {
	submitter: &'a ReportSubmitter,
	error: Option<Option<String>>,
}

impl Drop for InFlight<'_> {
	fn drop(&mut self) {
		let mut pending = self.submitter.pending.lock();
		*pending = pending.saturating_sub(1);
		let loading = *pending > 0;
		let error = self.error.take();
		self.submitter.state.update(|state| {
			state.loading = loading;
			if let Some(error) = error {
				state.error = error;
			}
		});
	}
}

impl ReportSubmitter {
	pub fn new(backend: SharedBackend) -> Self {
		Self {
			backend,
			reject_concurrent: false,
			pending: Mutex::new(0),
			state: Observable::default(),
		}
	}

	/// Refuses a submission while another is still pending.
	pub fn with_reject_concurrent(mut self, reject: bool) -> Self {
		self.reject_concurrent = reject;
		self
	}

	pub fn state(&self) -> ReportState {
		self.state.get()
	}

	pub fn subscribe(&self) -> watch::Receiver<ReportState> {
		self.state.subscribe()
	}

	pub fn is_loading(&self) -> bool {
		self.state.borrow().loading
	}

	pub async fn submit_report(&self, request: &ReportRequest) -> ReportOutcome {
		let payload = match request.validate() {
			Ok(payload) => payload,
			Err(message) => {
				debug!(target = "leads.report", %message, "report rejected before submission");
				self.state.update(|state| state.error = Some(message.clone()));
				return ReportOutcome::ValidationError { message };
			}
		};

		let Some(mut flight) = self.begin() else {
			warn!(target = "leads.report", place_id = %payload.place_id, "submission already pending; rejected");
			return ReportOutcome::TransientError {
				message: SUBMISSION_PENDING_MESSAGE.to_string(),
			};
		};

		debug!(
			target = "leads.report",
			place_id = %payload.place_id,
			has_email = payload.email.is_some(),
			has_phone = payload.phone.is_some(),
			"submitting report"
		);
		let outcome = classify_report(self.backend.submit_report(&payload).await);

		if outcome.is_failure() {
			warn!(target = "leads.report", place_id = %payload.place_id, outcome = outcome.kind(), message = outcome.message(), "report failed");
		} else {
			info!(target = "leads.report", place_id = %payload.place_id, outcome = outcome.kind(), "report submitted");
		}

		flight.error = Some(outcome.failure_message());
		outcome
	}

	fn begin(&self) -> Option<InFlight<'_>> {
		let mut pending = self.pending.lock();
		if self.reject_concurrent && *pending > 0 {
			return None;
		}
		*pending += 1;
		self.state.update(|state| {
			state.loading = true;
			state.error = None;
		});
		Some(InFlight {
			submitter: self,
			error: None,
		})
	}
}
