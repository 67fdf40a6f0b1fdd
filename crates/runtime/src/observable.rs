//! Observable state cells.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

/// A state cell that publishes every change to its subscribers.
///
/// Every write replaces or mutates the value under the channel's write lock,
/// so readers never see a partially applied update.
#[derive(Debug)]
pub struct Observable<T> {
	tx: watch::Sender<T>,
}

impl<T> Observable<T> {
	pub fn new(initial: T) -> Self {
		Self {
			tx: watch::Sender::new(initial),
		}
	}

	/// Returns a receiver that observes every subsequent change.
	pub fn subscribe(&self) -> watch::Receiver<T> {
		self.tx.subscribe()
	}

	/// Borrows the current value. Holding the guard blocks writers.
	pub fn borrow(&self) -> watch::Ref<'_, T> {
		self.tx.borrow()
	}

	/// Replaces the whole value, returning the previous one.
	pub fn replace(&self, value: T) -> T {
		self.tx.send_replace(value)
	}

	pub fn update(&self, f: impl FnOnce(&mut T)) {
		self.tx.send_modify(f);
	}

	/// Applies `f` only while `token` is still live.
	///
	/// The liveness check and the write happen under the same lock, so a
	/// concurrent [`fence`](Self::fence) that cancels `token` is ordered
	/// strictly before or after this commit. Returns whether `f` ran.
	pub fn commit(&self, token: &CancellationToken, f: impl FnOnce(&mut T)) -> bool {
		let mut applied = false;
		self.tx.send_if_modified(|state| {
			if token.is_cancelled() {
				return false;
			}
			f(state);
			applied = true;
			true
		});
		applied
	}

	/// Runs `f` while holding the write lock without publishing a change.
	///
	/// Used to cancel tokens such that no commit guarded by them can land once
	/// the fence returns.
	pub fn fence(&self, f: impl FnOnce()) {
		self.tx.send_if_modified(|_| {
			f();
			false
		});
	}

	/// Arms a guard that, if dropped before [`PendingGuard::complete`],
	/// cancels `token` and applies `fallback` under it.
	///
	/// Used to settle flags such as `loading` when the future driving an
	/// operation is dropped part way.
	pub fn pending(&self, token: &CancellationToken, fallback: fn(&mut T)) -> PendingGuard<'_, T> {
		PendingGuard {
			cell: self,
			token: token.clone(),
			fallback: Some(fallback),
		}
	}
}

/// See [`Observable::pending`].
#[must_use = "dropping the guard immediately applies the fallback"]
pub struct PendingGuard<'a, T> {
	cell: &'a Observable<T>,
	token: CancellationToken,
	fallback: Option<fn(&mut T)>,
}

impl<T> PendingGuard<'_, T> {
	/// The operation settled on its own; nothing is applied on drop.
	pub fn complete(mut self) {
		self.fallback = None;
	}
}

impl<T> Drop for PendingGuard<'_, T> {
	fn drop(&mut self) {
		if let Some(fallback) = self.fallback.take() {
			self.cell.commit(&self.token, fallback);
			self.token.cancel();
		}
	}
}

impl<T: Clone> Observable<T> {
	/// Snapshot of the current value.
	pub fn get(&self) -> T {
		self.tx.borrow().clone()
	}
}

impl<T: Default> Default for Observable<T> {
	fn default() -> Self {
		Self::new(T::default())
	}
}
