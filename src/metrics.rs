//! Prometheus recorder wiring and cache/login telemetry.

// std
use std::sync::OnceLock;
// crates.io
use metrics::Label;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use smallvec::SmallVec;
// self
use crate::_prelude::*;

/// Label list used by exporter series; sized for the widest series (info gauges).
pub type LabelSet = SmallVec<[Label; 10]>;

const METRIC_REFRESH_TOTAL: &str = "smartpvms_exporter_cache_refresh_total";
const METRIC_REFRESH_ERRORS: &str = "smartpvms_exporter_cache_refresh_errors_total";
const METRIC_REFRESH_DURATION: &str = "smartpvms_exporter_cache_refresh_duration_seconds";
const METRIC_LOGIN_TOTAL: &str = "smartpvms_exporter_login_total";

/// Shared Prometheus handle installed by [`install_default_exporter`].
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder backed by `metrics` and return its handle.
///
/// Multiple invocations are safe; later calls return the handle installed first.
pub fn install_default_exporter() -> Result<PrometheusHandle> {
	if let Some(handle) = PROMETHEUS_HANDLE.get() {
		return Ok(handle.clone());
	}

	let handle = PrometheusBuilder::new()
		.install_recorder()
		.map_err(|err| Error::Metrics(err.to_string()))?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	PROMETHEUS_HANDLE
		.get()
		.cloned()
		.ok_or_else(|| Error::Metrics("Prometheus handle was not retained.".into()))
}

/// Render the series written by `record` into a recorder that only lives for this call.
///
/// Nothing carries over between calls: a series `record` no longer writes is gone from the next
/// render.
pub fn render_local(record: impl FnOnce()) -> String {
	let recorder = PrometheusBuilder::new().build_recorder();

	metrics::with_local_recorder(&recorder, record);

	recorder.handle().render()
}

/// Record a committed snapshot refresh along with its latency.
pub fn record_refresh_success(cache: &str, duration: Duration) {
	metrics::counter!(METRIC_REFRESH_TOTAL, status_labels(cache, "success").iter()).increment(1);
	metrics::histogram!(METRIC_REFRESH_DURATION, cache_labels(cache).iter())
		.record(duration.as_secs_f64());
}

/// Record a refresh attempt that left the snapshot untouched.
pub fn record_refresh_error(cache: &str) {
	metrics::counter!(METRIC_REFRESH_TOTAL, status_labels(cache, "error").iter()).increment(1);
	metrics::counter!(METRIC_REFRESH_ERRORS, cache_labels(cache).iter()).increment(1);
}

/// Record the outcome of a login exchange.
pub fn record_login(success: bool) {
	let status = if success { "success" } else { "error" };

	metrics::counter!(METRIC_LOGIN_TOTAL, "status" => status).increment(1);
}

fn cache_labels(cache: &str) -> LabelSet {
	let mut labels = LabelSet::new();

	labels.push(Label::new("cache", cache.to_owned()));

	labels
}

fn status_labels(cache: &str, status: &'static str) -> LabelSet {
	let mut labels = cache_labels(cache);

	labels.push(Label::new("status", status));

	labels
}
