// lead-search: client-side lead search pipeline
//
// Geolocation, search sessions, debounced place autocomplete and lead report
// submission against an opaque backend. Every data-bearing decision is made
// by the backend; this crate only orchestrates request lifecycles and the
// state they publish.

pub mod autocomplete;
pub mod backend;
pub mod config;
pub mod error;
pub mod geo;
pub mod logging;
pub mod pipeline;
pub mod report;
pub mod session;

pub use autocomplete::{AutocompleteCoordinator, SearchError, SearchState, build_query};
pub use backend::{ApiResponse, FakeBackend, FakeBackendController, HttpBackend, LeadBackend, SharedBackend};
pub use config::{AutocompleteConfig, ClientConfig, GeolocationConfig, ReportConfig};
pub use error::{Error, Result};
pub use geo::{
	GeoError, GeoPosition, GeoState, GeolocationGate, Permission, PositionError, PositionErrorCode, PositionOptions,
	PositionProvider, StaticPositionProvider, UnsupportedProvider,
};
pub use lead_protocol::Suggestion;
pub use logging::init_logging;
pub use pipeline::LeadSearch;
pub use report::{ReportOutcome, ReportRequest, ReportState, ReportSubmitter, classify_report};
pub use session::{SessionError, SessionManager, SessionState, SessionToken};
