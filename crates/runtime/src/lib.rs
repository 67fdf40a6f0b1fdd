//! Runtime primitives shared by the lead search components.
//!
//! Nothing here knows about places, sessions or leads. The crate provides:
//!
//! * [`Observable`]: a watch-channel backed state cell whose writes can be
//!   guarded by a [`CancellationToken`] so a superseded operation never lands
//!   a stale update.
//! * [`SupersedeSlot`]: hands out one authoritative token at a time.
//! * [`Debouncer`]: a debounced, cancellable task queue of depth 1.

pub mod debounce;
pub mod observable;
pub mod supersede;

pub use debounce::Debouncer;
pub use observable::{Observable, PendingGuard};
pub use supersede::SupersedeSlot;
pub use tokio_util::sync::CancellationToken;
