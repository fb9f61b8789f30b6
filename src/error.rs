//! Error type shared by the client, caches and HTTP surface.

/// Exporter result type.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Everything that can go wrong between the management API and a scrape.
#[allow(missing_docs)]
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Io(#[from] std::io::Error),
	#[error(transparent)]
	Reqwest(#[from] reqwest::Error),
	#[error(transparent)]
	Serde(#[from] serde_json::Error),
	#[error(transparent)]
	Url(#[from] url::ParseError),

	#[error("Management API answered {status} for {url}: {body:?}.")]
	HttpStatus { status: http::StatusCode, url: url::Url, body: Option<String> },
	#[error("Login rejected: {0}")]
	Login(String),
	#[error("Prometheus recorder unavailable: {0}")]
	Metrics(String),
	#[error("{endpoint} failed with fail code {fail_code}: {message:?}.")]
	Upstream { endpoint: &'static str, fail_code: i64, message: Option<String> },
	#[error("Invalid {field}: {reason}")]
	Validation { field: &'static str, reason: String },
}
impl Error {
	/// Upstream fail code, when the management API answered with an unsuccessful envelope.
	pub fn fail_code(&self) -> Option<i64> {
		match self {
			Self::Upstream { fail_code, .. } => Some(*fail_code),
			_ => None,
		}
	}
}
