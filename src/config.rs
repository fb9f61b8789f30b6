//! Command-line and environment configuration.
//!
//! Every flag can also be supplied through an environment variable prefixed with
//! `SMARTPVMS_EXPORTER_`, with `.` and `-` replaced by `_`.

// std
use std::{
	fmt,
	net::SocketAddr,
	path::{Path, PathBuf},
};
// crates.io
use clap::Parser;
use tracing_subscriber::EnvFilter;
use url::Url;
// self
use crate::_prelude::*;

/// Default management system endpoint.
pub const DEFAULT_BASE_URL: &str = "https://eu5.fusionsolar.huawei.com";

/// Raw command-line arguments.
#[derive(Clone, Parser)]
#[command(name = "smartpvms_exporter", version, about = "SmartPVMS Exporter")]
pub struct Cli {
	/// Address on which to expose metrics and web interface.
	#[arg(
		long = "web.listen-address",
		env = "SMARTPVMS_EXPORTER_WEB_LISTEN_ADDRESS",
		default_value = "0.0.0.0:9867"
	)]
	pub listen_address: SocketAddr,
	/// Path under which to expose metrics.
	#[arg(
		long = "web.telemetry-path",
		env = "SMARTPVMS_EXPORTER_WEB_TELEMETRY_PATH",
		default_value = "/metrics"
	)]
	pub telemetry_path: String,
	/// Base URL of the management system.
	#[arg(
		long = "smartpvms.base-url",
		env = "SMARTPVMS_EXPORTER_SMARTPVMS_BASE_URL",
		default_value = DEFAULT_BASE_URL
	)]
	pub base_url: Url,
	/// Username to authenticate against the management system.
	#[arg(long = "smartpvms.username", env = "SMARTPVMS_EXPORTER_SMARTPVMS_USERNAME")]
	pub username: Option<String>,
	/// Password to authenticate against the management system.
	#[arg(
		long = "smartpvms.password",
		env = "SMARTPVMS_EXPORTER_SMARTPVMS_PASSWORD",
		hide_env_values = true
	)]
	pub password: Option<String>,
	/// Path to the password to authenticate against the management system.
	#[arg(long = "smartpvms.password-file", env = "SMARTPVMS_EXPORTER_SMARTPVMS_PASSWORD_FILE")]
	pub password_file: Option<PathBuf>,
	/// Interval at which to query the management system.
	#[arg(
		long = "smartpvms.refresh-interval",
		env = "SMARTPVMS_EXPORTER_SMARTPVMS_REFRESH_INTERVAL",
		default_value = "5s",
		value_parser = parse_duration
	)]
	pub refresh_interval: Duration,
	/// Timeout applied to each request against the management system.
	#[arg(
		long = "smartpvms.timeout",
		env = "SMARTPVMS_EXPORTER_SMARTPVMS_TIMEOUT",
		default_value = "10s",
		value_parser = parse_duration
	)]
	pub timeout: Duration,
	/// Accepted for compatibility with existing invocations; has no effect.
	#[arg(
		long = "web.read-header-timeout",
		env = "SMARTPVMS_EXPORTER_WEB_READ_HEADER_TIMEOUT",
		value_parser = parse_duration
	)]
	pub read_header_timeout: Option<Duration>,
	/// Log filter, e.g. `info` or `smartpvms_exporter=debug`; `RUST_LOG` takes precedence.
	#[arg(long = "log.level", env = "SMARTPVMS_EXPORTER_LOG_LEVEL", default_value = "info")]
	pub log_level: String,
}
impl Cli {
	/// Install the global tracing subscriber.
	pub fn init_tracing(&self) -> Result<()> {
		let filter = match EnvFilter::try_from_default_env() {
			Ok(filter) => filter,
			Err(_) => EnvFilter::try_new(&self.log_level).map_err(|err| Error::Validation {
				field: "log.level",
				reason: format!("Invalid filter: {err}."),
			})?,
		};

		tracing_subscriber::fmt()
			.with_env_filter(filter)
			.try_init()
			.map_err(|err| Error::Validation { field: "log.level", reason: err.to_string() })
	}

	/// Resolve secrets and validate the arguments.
	pub fn resolve(self) -> Result<Config> {
		if let Some(timeout) = self.read_header_timeout {
			tracing::warn!(?timeout, "web.read-header-timeout has no effect and is ignored");
		}

		let password = match &self.password_file {
			Some(path) => read_password_file(path)?,
			None => self.password.unwrap_or_default(),
		};
		let config = Config {
			listen_address: self.listen_address,
			telemetry_path: self.telemetry_path,
			refresh_interval: self.refresh_interval,
			upstream: UpstreamConfig {
				base_url: self.base_url,
				username: self.username.unwrap_or_default(),
				password,
				timeout: self.timeout,
			},
		};

		config.validate()?;

		Ok(config)
	}
}
impl fmt::Debug for Cli {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Cli")
			.field("listen_address", &self.listen_address)
			.field("telemetry_path", &self.telemetry_path)
			.field("base_url", &self.base_url.as_str())
			.field("username", &self.username)
			.field("password", &self.password.as_ref().map(|_| "<redacted>"))
			.field("password_file", &self.password_file)
			.field("refresh_interval", &self.refresh_interval)
			.field("timeout", &self.timeout)
			.field("read_header_timeout", &self.read_header_timeout)
			.field("log_level", &self.log_level)
			.finish()
	}
}

/// Validated exporter configuration.
#[derive(Clone, Debug)]
pub struct Config {
	/// Listener for the HTTP surface.
	pub listen_address: SocketAddr,
	/// Path serving the Prometheus exposition.
	pub telemetry_path: String,
	/// Staleness interval for every snapshot cache.
	pub refresh_interval: Duration,
	/// Management system connection settings.
	pub upstream: UpstreamConfig,
}
impl Config {
	/// Validate the configuration against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		if !self.telemetry_path.starts_with('/') || self.telemetry_path == "/" {
			return Err(Error::Validation {
				field: "web.telemetry-path",
				reason: "Must start with '/' and must not be the root path.".into(),
			});
		}
		if self.refresh_interval.is_zero() {
			return Err(Error::Validation {
				field: "smartpvms.refresh-interval",
				reason: "Must be greater than zero.".into(),
			});
		}

		self.upstream.validate()
	}
}

/// Connection settings for the management system.
#[derive(Clone)]
pub struct UpstreamConfig {
	/// Base URL every endpoint path is appended to.
	pub base_url: Url,
	/// Login user name.
	pub username: String,
	/// Login system code.
	pub password: String,
	/// Per-request timeout.
	pub timeout: Duration,
}
impl UpstreamConfig {
	/// Build settings with the default timeout.
	pub fn new(
		base_url: impl AsRef<str>,
		username: impl Into<String>,
		password: impl Into<String>,
	) -> Result<Self> {
		Ok(Self {
			base_url: Url::parse(base_url.as_ref())?,
			username: username.into(),
			password: password.into(),
			timeout: Duration::from_secs(10),
		})
	}

	/// Validate the connection settings.
	pub fn validate(&self) -> Result<()> {
		if !matches!(self.base_url.scheme(), "http" | "https") {
			return Err(Error::Validation {
				field: "smartpvms.base-url",
				reason: "Scheme must be http or https.".into(),
			});
		}
		if self.base_url.host_str().is_none() {
			return Err(Error::Validation {
				field: "smartpvms.base-url",
				reason: "Must include a host component.".into(),
			});
		}
		if self.username.is_empty() {
			return Err(Error::Validation {
				field: "smartpvms.username",
				reason: "Management system username not set.".into(),
			});
		}
		if self.password.is_empty() {
			return Err(Error::Validation {
				field: "smartpvms.password",
				reason: "Management system password not set.".into(),
			});
		}
		if self.timeout.is_zero() {
			return Err(Error::Validation {
				field: "smartpvms.timeout",
				reason: "Must be greater than zero.".into(),
			});
		}

		Ok(())
	}
}
impl fmt::Debug for UpstreamConfig {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("UpstreamConfig")
			.field("base_url", &self.base_url.as_str())
			.field("username", &self.username)
			.field("password", &"<redacted>")
			.field("timeout", &self.timeout)
			.finish()
	}
}

/// Parse durations such as `500ms`, `5s`, `1m30s` or `1.5h`.
///
/// A value is one or more `<number><unit>` parts with units `ns`, `us`/`µs`, `ms`, `s`, `m` and
/// `h`. A bare number means seconds.
pub fn parse_duration(raw: &str) -> std::result::Result<Duration, String> {
	let raw = raw.trim();
	let is_number = |c: char| c.is_ascii_digit() || c == '.';
	let mut rest = raw;
	let mut seconds = 0.;

	if raw.is_empty() {
		return Err("empty duration".into());
	}

	while !rest.is_empty() {
		let value_end = rest.find(|c: char| !is_number(c)).unwrap_or(rest.len());
		let (value, tail) = rest.split_at(value_end);
		let (unit, tail) = tail.split_at(tail.find(is_number).unwrap_or(tail.len()));
		let value: f64 = value.parse().map_err(|_| format!("invalid duration '{raw}'"))?;
		let scale = match unit {
			"ns" => 1e-9,
			"us" | "µs" => 1e-6,
			"ms" => 1e-3,
			"" | "s" => 1.,
			"m" => 60.,
			"h" => 3600.,
			other => return Err(format!("unknown duration unit '{other}' in '{raw}'")),
		};

		seconds += value * scale;
		rest = tail;
	}

	Duration::try_from_secs_f64(seconds).map_err(|err| format!("invalid duration '{raw}': {err}"))
}

fn read_password_file(path: &Path) -> Result<String> {
	let raw = std::fs::read_to_string(path)?;

	Ok(raw.trim_end_matches(['\r', '\n']).to_owned())
}
