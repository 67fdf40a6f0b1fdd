//! Debounced, cancellable task queue of depth 1.
//!
//! Scheduling a task cancels whatever came before it: a predecessor still
//! waiting out its quiet period never runs, and one already running is
//! dropped at its next await point. Dropping an in-flight HTTP future aborts
//! the request, which is how superseded searches stop consuming the network.
//!
//! ```ignore
//! let debouncer = Debouncer::new(Duration::from_millis(400));
//! debouncer.schedule(|token| async move {
//!     let result = backend.autocomplete(&query).await;
//!     state.commit(&token, |s| s.apply(result));
//! });
//! ```

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::supersede::SupersedeSlot;

#[derive(Debug)]
pub struct Debouncer {
	delay: Duration,
	slot: SupersedeSlot,
}

impl Debouncer {
	pub fn new(delay: Duration) -> Self {
		Self {
			delay,
			slot: SupersedeSlot::new(),
		}
	}

	pub fn delay(&self) -> Duration {
		self.delay
	}

	/// Supersedes any queued or running task and queues `task` to run once
	/// the quiet period elapses.
	///
	/// `task` receives its own token; it should check it (or commit through
	/// [`Observable::commit`](crate::Observable::commit)) before publishing
	/// results. Returns `None` after [`shutdown`](Self::shutdown).
	///
	/// Must be called from within a Tokio runtime.
	pub fn schedule<F, Fut>(&self, task: F) -> Option<CancellationToken>
	where
		F: FnOnce(CancellationToken) -> Fut + Send + 'static,
		Fut: Future<Output = ()> + Send + 'static,
	{
		let token = self.slot.begin();
		if token.is_cancelled() {
			trace!(target = "leads.runtime", "debouncer shut down; task dropped");
			return None;
		}

		let delay = self.delay;
		let guard = token.clone();
		let run_token = token.clone();
		tokio::spawn(async move {
			tokio::select! {
				biased;
				_ = guard.cancelled() => {
					trace!(target = "leads.runtime", "debounced task superseded");
				}
				_ = async move {
					tokio::time::sleep(delay).await;
					task(run_token).await;
				} => {}
			}
		});

		Some(token)
	}

	/// Cancels the queued or running task, if any.
	pub fn cancel(&self) -> bool {
		self.slot.cancel_current()
	}

	/// Cancels everything and refuses future tasks.
	pub fn shutdown(&self) {
		self.slot.shutdown();
	}

	pub fn is_shutdown(&self) -> bool {
		self.slot.is_shutdown()
	}
}

impl Drop for Debouncer {
	fn drop(&mut self) {
		self.slot.shutdown();
	}
}
