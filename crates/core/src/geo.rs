//! Geolocation gate.
//!
//! Obtains optional user coordinates with explicit permission semantics. The
//! platform capability sits behind [`PositionProvider`]; the gate owns the
//! observable [`GeoState`] and the rules for turning provider results into
//! permission states.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lead_runtime::{Observable, SupersedeSlot};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::GeolocationConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPosition {
	pub lat: f64,
	pub lng: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Permission {
	#[default]
	Unknown,
	Granted,
	Denied,
}

/// Failure codes as reported by platform geolocation APIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionErrorCode {
	PermissionDenied,
	PositionUnavailable,
	Timeout,
	/// A platform code outside the standard three.
	Other(u16),
}

impl PositionErrorCode {
	pub fn from_code(code: u16) -> Self {
		match code {
			1 => Self::PermissionDenied,
			2 => Self::PositionUnavailable,
			3 => Self::Timeout,
			other => Self::Other(other),
		}
	}

	pub fn code(self) -> u16 {
		match self {
			Self::PermissionDenied => 1,
			Self::PositionUnavailable => 2,
			Self::Timeout => 3,
			Self::Other(code) => code,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct PositionError {
	pub code: PositionErrorCode,
	pub message: String,
}

impl PositionError {
	pub fn new(code: PositionErrorCode, message: impl Into<String>) -> Self {
		Self {
			code,
			message: message.into(),
		}
	}
}

/// Options handed to the provider for a single position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
	/// Upper bound on the wait for a fix.
	pub timeout: Duration,
	/// A cached fix at most this old may be returned instead of a new one.
	pub maximum_age: Duration,
	pub enable_high_accuracy: bool,
}

impl Default for PositionOptions {
	fn default() -> Self {
		Self::from(&GeolocationConfig::default())
	}
}

impl From<&GeolocationConfig> for PositionOptions {
	fn from(config: &GeolocationConfig) -> Self {
		Self {
			timeout: Duration::from_millis(config.timeout_ms),
			maximum_age: Duration::from_millis(config.maximum_age_ms),
			enable_high_accuracy: config.enable_high_accuracy,
		}
	}
}

/// Platform geolocation capability.
#[async_trait]
pub trait PositionProvider: Send + Sync {
	/// Whether the platform offers geolocation at all.
	fn is_supported(&self) -> bool {
		true
	}

	/// Requests a single position fix. Prompting the user, if the platform
	/// does so, happens inside this call.
	async fn current_position(&self, options: &PositionOptions) -> Result<GeoPosition, PositionError>;
}

/// Provider for hosts without any geolocation capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsupportedProvider;

#[async_trait]
impl PositionProvider for UnsupportedProvider {
	fn is_supported(&self) -> bool {
		false
	}

	async fn current_position(&self, _options: &PositionOptions) -> Result<GeoPosition, PositionError> {
		Err(PositionError::new(PositionErrorCode::PositionUnavailable, "geolocation is not supported"))
	}
}

/// Provider that answers every request with the same result, optionally
/// after a delay. Useful for hosts with a fixed location and in tests.
#[derive(Debug, Clone)]
pub struct StaticPositionProvider {
	result: Result<GeoPosition, PositionError>,
	delay: Duration,
}

impl StaticPositionProvider {
	pub fn at(lat: f64, lng: f64) -> Self {
		Self {
			result: Ok(GeoPosition { lat, lng }),
			delay: Duration::ZERO,
		}
	}

	pub fn failing(error: PositionError) -> Self {
		Self {
			result: Err(error),
			delay: Duration::ZERO,
		}
	}

	pub fn after(mut self, delay: Duration) -> Self {
		self.delay = delay;
		self
	}
}

#[async_trait]
impl PositionProvider for StaticPositionProvider {
	async fn current_position(&self, _options: &PositionOptions) -> Result<GeoPosition, PositionError> {
		if !self.delay.is_zero() {
			tokio::time::sleep(self.delay).await;
		}
		self.result.clone()
	}
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeoError {
	#[error("Geolocation is not supported on this device")]
	Unsupported,

	#[error("Location permission was denied")]
	PermissionDenied,

	#[error("Your location could not be determined: {0}")]
	Unavailable(String),

	#[error("Timed out while getting your location")]
	Timeout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeoState {
	pub lat: Option<f64>,
	pub lng: Option<f64>,
	pub supported: bool,
	pub permission: Permission,
	pub loading: bool,
	pub error: Option<GeoError>,
}

impl Default for GeoState {
	fn default() -> Self {
		Self {
			lat: None,
			lng: None,
			supported: true,
			permission: Permission::Unknown,
			loading: false,
			error: None,
		}
	}
}

impl GeoState {
	/// Coordinates, only while permission is granted and both are known.
	pub fn position(&self) -> Option<GeoPosition> {
		match (self.permission, self.lat, self.lng) {
			(Permission::Granted, Some(lat), Some(lng)) => Some(GeoPosition { lat, lng }),
			_ => None,
		}
	}

	fn granted(position: GeoPosition) -> Self {
		Self {
			lat: Some(position.lat),
			lng: Some(position.lng),
			permission: Permission::Granted,
			..Self::default()
		}
	}

	fn failed(permission: Permission, error: GeoError) -> Self {
		Self {
			permission,
			error: Some(error),
			..Self::default()
		}
	}
}

pub struct GeolocationGate {
	provider: Arc<dyn PositionProvider>,
	options: PositionOptions,
	state: Observable<GeoState>,
	slot: SupersedeSlot,
}

impl GeolocationGate {
	pub fn new(provider: Arc<dyn PositionProvider>, options: PositionOptions) -> Self {
		let state = GeoState {
			supported: provider.is_supported(),
			..GeoState::default()
		};
		Self {
			provider,
			options,
			state: Observable::new(state),
			slot: SupersedeSlot::new(),
		}
	}

	pub fn options(&self) -> PositionOptions {
		self.options
	}

	pub fn state(&self) -> GeoState {
		self.state.get()
	}

	pub fn subscribe(&self) -> watch::Receiver<GeoState> {
		self.state.subscribe()
	}

	pub fn position(&self) -> Option<GeoPosition> {
		self.state.borrow().position()
	}

	/// Requests the current position, replacing the previous state.
	///
	/// A later call supersedes an earlier one still waiting on the provider;
	/// only the latest call commits its result.
	pub async fn request_permission(&self) {
		if !self.provider.is_supported() {
			warn!(target = "leads.geo", "geolocation unsupported; skipping request");
			let token = self.slot.begin();
			self.state.commit(&token, |state| {
				*state = GeoState {
					supported: false,
					..GeoState::failed(Permission::Denied, GeoError::Unsupported)
				};
			});
			return;
		}

		let token = self.slot.begin();
		if !self.state.commit(&token, |state| {
			state.loading = true;
			state.error = None;
		}) {
			return;
		}
		let pending = self.state.pending(&token, |state| state.loading = false);

		debug!(target = "leads.geo", timeout_ms = self.options.timeout.as_millis() as u64, "requesting position");
		let result = tokio::select! {
			biased;
			_ = token.cancelled() => {
				debug!(target = "leads.geo", "position request superseded");
				return;
			}
			result = tokio::time::timeout(self.options.timeout, self.provider.current_position(&self.options)) => result,
		};

		let next = match result {
			Ok(Ok(position)) => {
				info!(target = "leads.geo", "location permission granted");
				GeoState::granted(position)
			}
			Ok(Err(error)) => {
				debug!(target = "leads.geo", code = error.code.code(), error = %error, "position request failed");
				match error.code {
					PositionErrorCode::PermissionDenied => GeoState::failed(Permission::Denied, GeoError::PermissionDenied),
					PositionErrorCode::Timeout => GeoState::failed(Permission::Unknown, GeoError::Timeout),
					PositionErrorCode::PositionUnavailable | PositionErrorCode::Other(_) => {
						GeoState::failed(Permission::Unknown, GeoError::Unavailable(error.message))
					}
				}
			}
			Err(_) => {
				debug!(target = "leads.geo", "position request timed out");
				GeoState::failed(Permission::Unknown, GeoError::Timeout)
			}
		};

		self.state.commit(&token, |state| *state = next);
		pending.complete();
	}

	/// Stops any pending request; its result will not be committed.
	pub fn close(&self) {
		self.state.fence(|| self.slot.shutdown());
	}

	pub fn is_closed(&self) -> bool {
		self.slot.is_shutdown()
	}
}

impl Drop for GeolocationGate {
	fn drop(&mut self) {
		self.close();
	}
}
