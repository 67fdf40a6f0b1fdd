//! One authoritative operation at a time.

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;

/// Hands out per-operation cancellation tokens where each new operation
/// supersedes the previous one.
///
/// All tokens are children of a root token, so [`shutdown`](Self::shutdown)
/// cancels every operation ever issued and prevents new ones from starting
/// live.
#[derive(Debug, Default)]
pub struct SupersedeSlot {
	root: CancellationToken,
	current: Mutex<Option<CancellationToken>>,
}

impl SupersedeSlot {
	pub fn new() -> Self {
		Self::default()
	}

	/// Cancels the current operation and returns the token for a new one.
	///
	/// After shutdown the returned token is already cancelled.
	pub fn begin(&self) -> CancellationToken {
		let mut current = self.current.lock();
		if let Some(previous) = current.take() {
			previous.cancel();
		}
		let token = self.root.child_token();
		*current = Some(token.clone());
		token
	}

	/// Cancels the current operation, if any, without starting another.
	pub fn cancel_current(&self) -> bool {
		match self.current.lock().take() {
			Some(previous) => {
				let was_live = !previous.is_cancelled();
				previous.cancel();
				was_live
			}
			None => false,
		}
	}

	pub fn shutdown(&self) {
		self.root.cancel();
		self.current.lock().take();
	}

	pub fn is_shutdown(&self) -> bool {
		self.root.is_cancelled()
	}
}
