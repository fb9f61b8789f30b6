//! Session token cache that serialises renewal behind a single lock.

// crates.io
use tokio::sync::Mutex;
// self
use crate::{
	_prelude::*,
	cache::refresher::{Credential, TokenSource},
	metrics,
};

/// Renewable secret with an absolute expiry.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken {
	secret: Arc<str>,
	expires_at: Instant,
}
impl SessionToken {
	/// Build a token that stops being valid at `expires_at`.
	pub fn new(secret: impl Into<Arc<str>>, expires_at: Instant) -> Self {
		Self { secret: secret.into(), expires_at }
	}

	/// Opaque secret presented upstream.
	pub fn secret(&self) -> &str {
		&self.secret
	}

	/// Instant after which the token must not be used.
	pub fn expires_at(&self) -> Instant {
		self.expires_at
	}

	/// Whether the token is still usable; validity ends at `expires_at` exclusive.
	pub fn is_valid_at(&self, now: Instant) -> bool {
		now < self.expires_at
	}
}
impl std::fmt::Debug for SessionToken {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SessionToken")
			.field("secret", &"<redacted>")
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

/// Hands out a valid [`SessionToken`], logging in through a [`TokenSource`] when needed.
///
/// The validity check and any renewal happen under one mutex, so callers arriving during a
/// login wait for it and then reuse its token instead of logging in again. Login errors are
/// returned to the caller that triggered them and nothing is cached.
#[derive(Debug)]
pub struct TokenCache<S> {
	source: S,
	token: Mutex<Option<SessionToken>>,
}
impl<S> TokenCache<S>
where
	S: TokenSource,
{
	/// Create an empty cache over the given login source.
	pub fn new(source: S) -> Self {
		Self { source, token: Mutex::new(None) }
	}

	/// Login source backing this cache.
	pub fn source(&self) -> &S {
		&self.source
	}

	/// Return the held token when valid, otherwise log in and hold the new one.
	#[tracing::instrument(skip(self))]
	pub async fn token(&self) -> Result<SessionToken> {
		let mut held = self.token.lock().await;

		if let Some(token) = held.as_ref().filter(|token| token.is_valid_at(Instant::now())) {
			return Ok(token.clone());
		}

		*held = None;

		tracing::debug!("session token missing or expired; logging in");

		match self.source.login().await {
			Ok(Credential { secret, valid_for }) => {
				let token = SessionToken::new(secret, Instant::now() + valid_for);

				*held = Some(token.clone());
				metrics::record_login(true);

				tracing::debug!(valid_for = ?valid_for, "logged in");

				Ok(token)
			},
			Err(err) => {
				metrics::record_login(false);

				Err(err)
			},
		}
	}

	/// Held token if it is still valid; never logs in.
	pub async fn current(&self) -> Option<SessionToken> {
		let held = self.token.lock().await;

		held.as_ref().filter(|token| token.is_valid_at(Instant::now())).cloned()
	}

	/// Drop `token` if it is the one currently held; returns whether anything was dropped.
	///
	/// Callers that saw the upstream reject a token pass it back here. A token renewed by
	/// another caller in the meantime is left alone.
	pub async fn invalidate(&self, token: &SessionToken) -> bool {
		let mut held = self.token.lock().await;

		if held.as_ref() == Some(token) {
			*held = None;

			true
		} else {
			false
		}
	}
}
