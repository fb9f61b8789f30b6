//! Scrape-time collectors that turn cached snapshots into Prometheus gauges.
//!
//! Collectors only read their [`SnapshotCache`](crate::cache::snapshot::SnapshotCache); upstream
//! I/O happens in the background refresh the read may launch. Gauges are written into whatever
//! recorder is current when [`Collected::record`] runs, so a scrape renders exactly the series of
//! the snapshot it read.

pub mod inverters;
pub mod plants;

// crates.io
use metrics::Label;
// self
use crate::{_prelude::*, cache::snapshot::Snapshot, metrics::LabelSet};

/// One scrape's read of a snapshot cache.
#[derive(Clone, Debug)]
pub struct Collected<T> {
	/// Whether the snapshot was within its refresh interval when read.
	pub up: bool,
	/// Snapshot the series are built from.
	pub snapshot: Arc<Snapshot<T>>,
}

fn set(name: &'static str, labels: &LabelSet, value: f64) {
	metrics::gauge!(name, labels.iter()).set(value);
}

/// Set a gauge when the measurement is present; absent measurements export no sample.
fn set_some(name: &'static str, labels: &LabelSet, value: Option<f64>) {
	if let Some(value) = value {
		set(name, labels, value);
	}
}

/// Set one gauge per `(label value, measurement)` pair, adding `key` to the identity labels.
fn set_each<const N: usize>(
	name: &'static str,
	labels: &LabelSet,
	key: &'static str,
	values: [(&'static str, Option<f64>); N],
	scale: f64,
) {
	for (value_label, value) in values {
		let Some(value) = value else {
			continue;
		};
		let mut labels = labels.clone();

		labels.push(Label::new(key, value_label));
		set(name, &labels, value * scale);
	}
}

/// Export the cache health gauges of one subsystem.
fn set_status(
	up: &'static str,
	last_refresh: &'static str,
	valid: bool,
	at: Option<DateTime<Utc>>,
) {
	metrics::gauge!(up).set(if valid { 1. } else { 0. });

	if let Some(at) = at {
		metrics::gauge!(last_refresh).set(at.timestamp_millis() as f64 / 1000.);
	}
}

fn format_float(value: Option<f64>) -> String {
	value.map(|value| value.to_string()).unwrap_or_default()
}
