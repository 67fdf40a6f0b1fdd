//! A mounted search context: one session, one location gate, one
//! autocomplete coordinator and one report submitter sharing a backend.

use std::sync::Arc;

use tracing::{debug, info};

use crate::autocomplete::AutocompleteCoordinator;
use crate::backend::{HttpBackend, SharedBackend};
use crate::config::ClientConfig;
use crate::error::Result;
use crate::geo::{GeolocationGate, PositionOptions, PositionProvider};
use crate::report::{ReportOutcome, ReportRequest, ReportSubmitter};
use crate::session::SessionManager;

pub struct LeadSearch {
	search: AutocompleteCoordinator,
	session: SessionManager,
	geo: GeolocationGate,
	reports: ReportSubmitter,
}

impl LeadSearch {
	/// Mounts a search context and starts session creation.
	///
	/// Location is not requested until [`request_location`](Self::request_location)
	/// is called. Must be called from within a Tokio runtime.
	pub fn open(backend: SharedBackend, provider: Arc<dyn PositionProvider>, config: &ClientConfig) -> Self {
		let session = SessionManager::start(Arc::clone(&backend));
		let geo = GeolocationGate::new(provider, PositionOptions::from(&config.geolocation));
		let search = AutocompleteCoordinator::new(Arc::clone(&backend), config.autocomplete.clone())
			.with_session(session.subscribe())
			.with_location(geo.subscribe());
		let reports = ReportSubmitter::new(backend).with_reject_concurrent(config.report.reject_concurrent);

		info!(target = "leads.session", "search context opened");
		Self {
			search,
			session,
			geo,
			reports,
		}
	}

	/// Opens a context backed by [`HttpBackend`] at `config.api_base_url`.
	pub fn connect(config: &ClientConfig, provider: Arc<dyn PositionProvider>) -> Result<Self> {
		let backend = HttpBackend::from_config(config)?;
		debug!(target = "leads.http", base_url = backend.base_url(), "using HTTP backend");
		Ok(Self::open(Arc::new(backend), provider, config))
	}

	pub fn session(&self) -> &SessionManager {
		&self.session
	}

	pub fn geolocation(&self) -> &GeolocationGate {
		&self.geo
	}

	pub fn autocomplete(&self) -> &AutocompleteCoordinator {
		&self.search
	}

	pub fn reports(&self) -> &ReportSubmitter {
		&self.reports
	}

	pub async fn request_location(&self) {
		self.geo.request_permission().await;
	}

	pub fn search(&self, query: &str) {
		self.search.search(query);
	}

	pub async fn submit_report(&self, request: &ReportRequest) -> ReportOutcome {
		self.reports.submit_report(request).await
	}

	/// Tears the context down. Pending searches, session creation and
	/// location requests are abandoned without touching state.
	pub fn close(&self) {
		let was_open = !self.search.is_closed();
		self.search.close();
		self.session.close();
		self.geo.close();
		if was_open {
			info!(target = "leads.session", "search context closed");
		}
	}
}

impl Drop for LeadSearch {
	fn drop(&mut self) {
		self.close();
	}
}
