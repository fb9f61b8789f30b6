//! Contracts the caches delegate fetching and login to.

// std
use std::future::Future;
// self
use crate::_prelude::*;

/// Fetches one collection of records for a [`SnapshotCache`](crate::cache::snapshot::SnapshotCache).
///
/// Implementations are invoked from detached background tasks and must tolerate concurrent
/// calls. An error means "no update"; the cache keeps serving what it already holds.
pub trait Refresher: Send + Sync + 'static {
	/// Record type produced by a fetch.
	type Item: Send + Sync + 'static;

	/// Minimum age after which the held snapshot is considered stale.
	fn interval(&self) -> Duration;

	/// Perform one fetch attempt.
	fn refresh(&self) -> impl Future<Output = Result<Vec<Self::Item>>> + Send;
}

/// Performs the login exchange behind a [`TokenCache`](crate::cache::token::TokenCache).
pub trait TokenSource: Send + Sync + 'static {
	/// Issue one login and return the credential it produced.
	fn login(&self) -> impl Future<Output = Result<Credential>> + Send;
}

/// Outcome of a successful login exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
	/// Opaque secret presented on upstream requests.
	pub secret: String,
	/// How long the secret stays usable, counted from receipt.
	pub valid_for: Duration,
}
impl std::fmt::Debug for Credential {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("Credential")
			.field("secret", &"<redacted>")
			.field("valid_for", &self.valid_for)
			.finish()
	}
}
