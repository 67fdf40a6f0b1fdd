//! Wire types for the lead search backend API.
//!
//! Request bodies, query strings and the response shapes the backend is
//! known to send. Decoding is lenient where the backend is inconsistent:
//! success payloads may or may not be wrapped in `{"data": ...}`, and error
//! bodies carry either a top-level `message` or a list of field errors.
//!
//! Lifecycle and state handling live in `lead-search`.

pub mod error_body;
pub mod places;
pub mod report;
pub mod session;

pub use error_body::*;
pub use places::*;
pub use report::*;
pub use session::*;
