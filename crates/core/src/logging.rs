//! Tracing subscriber setup for hosts embedding the pipeline.

use tracing_subscriber::EnvFilter;

use crate::error::Result;

/// Installs a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `leads=debug` when `verbose` and `leads=info` otherwise.
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place.
pub fn init_logging(verbose: bool) -> Result<()> {
	let fallback = if verbose { "leads=debug" } else { "leads=info" };
	let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(fallback))?;

	let _ = tracing_subscriber::fmt().with_env_filter(filter).with_target(true).try_init();
	Ok(())
}
