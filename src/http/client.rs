//! Authenticated client for the management API.

// std
use std::fmt::{Debug, Formatter, Result as FmtResult};
// crates.io
use http::{HeaderMap, HeaderName};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use url::Url;
// self
use crate::{
	_prelude::*,
	cache::{
		refresher::{Credential, TokenSource},
		token::{SessionToken, TokenCache},
	},
	config::UpstreamConfig,
};

/// Header carrying the session token in both directions.
pub const TOKEN_HEADER: HeaderName = HeaderName::from_static("xsrf-token");
/// How long a session token stays usable after login.
pub const TOKEN_VALIDITY: Duration = Duration::from_secs(30 * 60 - 15);
/// Fail code returned when the upstream session is no longer accepted.
pub const SESSION_EXPIRED_FAIL_CODE: i64 = 305;

const LOGIN_PATH: &str = "/thirdData/login";
const LOGOUT_PATH: &str = "/thirdData/logout";

/// Response envelope shared by every endpoint.
#[derive(Clone, Debug, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "D: Deserialize<'de> + Default"))]
pub struct Envelope<D> {
	/// Whether the call succeeded.
	pub success: bool,
	/// Upstream failure code; zero on success, missing or `null`.
	#[serde(default, deserialize_with = "null_as_default")]
	pub fail_code: i64,
	/// Optional human readable message.
	#[serde(default)]
	pub message: Option<String>,
	/// Payload; missing or `null` decodes to the default value.
	#[serde(default = "Default::default", deserialize_with = "null_as_default")]
	pub data: D,
}
impl<D> Envelope<D> {
	/// Turn an unsuccessful envelope into [`Error::Upstream`].
	pub fn into_result(self, endpoint: &'static str) -> Result<D> {
		if self.success {
			Ok(self.data)
		} else {
			Err(Error::Upstream { endpoint, fail_code: self.fail_code, message: self.message })
		}
	}
}

/// Client for the management API; cheap to clone, all clones share one session token.
#[derive(Clone, Debug)]
pub struct Client {
	http: reqwest::Client,
	base_url: Url,
	tokens: Arc<TokenCache<AccountLogin>>,
}
impl Client {
	/// Build a client with a reqwest client configured from `config`.
	pub fn new(config: &UpstreamConfig) -> Result<Self> {
		let http = reqwest::Client::builder()
			.user_agent(format!("smartpvms-exporter/{}", env!("CARGO_PKG_VERSION")))
			.connect_timeout(Duration::from_secs(5).min(config.timeout))
			.timeout(config.timeout)
			.build()?;

		Ok(Self::with_http(config, http))
	}

	/// Build a client around the supplied reqwest client (primarily for tests).
	pub fn with_http(config: &UpstreamConfig, http: reqwest::Client) -> Self {
		let login = AccountLogin {
			http: http.clone(),
			base_url: config.base_url.clone(),
			username: config.username.clone(),
			password: config.password.clone(),
		};

		Self { http, base_url: config.base_url.clone(), tokens: Arc::new(TokenCache::new(login)) }
	}

	/// Session token cache shared by every clone of this client.
	pub fn tokens(&self) -> &TokenCache<AccountLogin> {
		&self.tokens
	}

	/// Issue an authenticated call and unwrap its envelope.
	///
	/// A `failCode` of [`SESSION_EXPIRED_FAIL_CODE`] drops the token that was used so the next
	/// call logs in again.
	#[tracing::instrument(skip(self, body))]
	pub async fn call<B, D>(&self, endpoint: &'static str, body: &B) -> Result<D>
	where
		B: Serialize + ?Sized,
		D: DeserializeOwned + Default,
	{
		let token = self.tokens.token().await?;
		let envelope: Envelope<D> = self.post(endpoint, body, Some(&token)).await?.1;
		let result = envelope.into_result(endpoint);

		if let Err(err) = &result
			&& err.fail_code() == Some(SESSION_EXPIRED_FAIL_CODE)
		{
			let dropped = self.tokens.invalidate(&token).await;

			tracing::debug!(dropped, "upstream rejected session token");
		}

		result
	}

	/// End the held session, if any. Never logs in just to log out.
	pub async fn logout(&self) -> Result<()> {
		let Some(token) = self.tokens.current().await else {
			return Ok(());
		};
		let body = LogoutBody { xsrf_token: token.secret() };
		let envelope: Envelope<serde_json::Value> =
			self.post(LOGOUT_PATH, &body, Some(&token)).await?.1;

		self.tokens.invalidate(&token).await;

		envelope.into_result(LOGOUT_PATH).map(|_| ())
	}

	async fn post<B, D>(
		&self,
		endpoint: &'static str,
		body: &B,
		token: Option<&SessionToken>,
	) -> Result<(HeaderMap, Envelope<D>)>
	where
		B: Serialize + ?Sized,
		D: DeserializeOwned + Default,
	{
		post_envelope(&self.http, &self.base_url, endpoint, body, token).await
	}
}

/// Login exchange for one account; the [`TokenSource`] behind [`Client`].
#[derive(Clone)]
pub struct AccountLogin {
	http: reqwest::Client,
	base_url: Url,
	username: String,
	password: String,
}
impl TokenSource for AccountLogin {
	#[tracing::instrument(skip(self), fields(username = %self.username))]
	async fn login(&self) -> Result<Credential> {
		let body = LoginBody { user_name: &self.username, system_code: &self.password };
		let (headers, envelope): (_, Envelope<serde_json::Value>) =
			post_envelope(&self.http, &self.base_url, LOGIN_PATH, &body, None).await?;

		envelope.into_result(LOGIN_PATH)?;

		let secret = headers
			.get(&TOKEN_HEADER)
			.and_then(|value| value.to_str().ok())
			.filter(|value| !value.is_empty())
			.ok_or_else(|| Error::Login(format!("Response is missing the {TOKEN_HEADER} header.")))?;

		Ok(Credential { secret: secret.to_owned(), valid_for: TOKEN_VALIDITY })
	}
}
impl Debug for AccountLogin {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("AccountLogin")
			.field("base_url", &self.base_url.as_str())
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.finish()
	}
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoginBody<'a> {
	user_name: &'a str,
	system_code: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LogoutBody<'a> {
	xsrf_token: &'a str,
}

/// Join an endpoint path onto the base URL, keeping any path prefix of the base.
pub fn endpoint_url(base_url: &Url, endpoint: &str) -> Result<Url> {
	let base = base_url.as_str().trim_end_matches('/');

	Ok(Url::parse(&format!("{base}{endpoint}"))?)
}

async fn post_envelope<B, D>(
	client: &reqwest::Client,
	base_url: &Url,
	endpoint: &'static str,
	body: &B,
	token: Option<&SessionToken>,
) -> Result<(HeaderMap, Envelope<D>)>
where
	B: Serialize + ?Sized,
	D: DeserializeOwned + Default,
{
	let url = endpoint_url(base_url, endpoint)?;
	let mut builder = client.post(url.clone()).json(body);

	if let Some(token) = token {
		builder = builder.header(TOKEN_HEADER, token.secret());
	}

	let start = Instant::now();
	let response = builder.send().await?;
	let elapsed = start.elapsed();
	let status = response.status();

	if !status.is_success() {
		let body = response.text().await.ok();

		return Err(Error::HttpStatus { status, url, body });
	}

	let headers = response.headers().clone();
	let bytes = response.bytes().await?;
	let envelope: Envelope<D> = serde_json::from_slice(&bytes)?;

	tracing::debug!(
		endpoint,
		status = %status,
		elapsed = ?elapsed,
		success = envelope.success,
		fail_code = envelope.fail_code,
		"management api call complete"
	);

	Ok((headers, envelope))
}

fn null_as_default<'de, De, T>(deserializer: De) -> std::result::Result<T, De::Error>
where
	De: serde::Deserializer<'de>,
	T: Deserialize<'de> + Default,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
