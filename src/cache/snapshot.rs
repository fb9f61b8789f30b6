//! Stale-tolerant snapshot cache that never blocks readers on upstream I/O.

// crates.io
use tokio::sync::{Mutex, RwLock};
// self
use crate::{_prelude::*, cache::refresher::Refresher, metrics};

/// Last successfully fetched collection together with the time it was fetched.
///
/// A snapshot is replaced as a whole, so `data` and both timestamps always describe the same
/// fetch.
#[derive(Debug)]
pub struct Snapshot<T> {
	/// Monotonic instant of the fetch; `None` until the first successful refresh.
	pub fetched_at: Option<Instant>,
	/// Wall-clock time of the fetch; `None` until the first successful refresh.
	pub refreshed_at: Option<DateTime<Utc>>,
	/// Records returned by the fetch.
	pub data: Arc<[T]>,
}
impl<T> Snapshot<T> {
	/// Snapshot held before any fetch succeeded.
	pub fn empty() -> Self {
		Self { fetched_at: None, refreshed_at: None, data: Arc::from(Vec::new()) }
	}

	/// Whether less than `interval` has elapsed since the fetch.
	pub fn is_fresh(&self, now: Instant, interval: Duration) -> bool {
		self.fetched_at.is_some_and(|at| now.saturating_duration_since(at) < interval)
	}
}
impl<T> Default for Snapshot<T> {
	fn default() -> Self {
		Self::empty()
	}
}

/// Serves the latest snapshot produced by a [`Refresher`], refreshing in the background.
///
/// Reads take the read lock only long enough to clone an `Arc`. When the held snapshot is
/// stale a read launches a detached refresh and returns the stale snapshot right away. Only
/// one refresh runs per cache at a time; fetch failures are logged and leave the snapshot
/// untouched.
pub struct SnapshotCache<R>
where
	R: Refresher,
{
	name: Arc<str>,
	refresher: Arc<R>,
	snapshot: Arc<RwLock<Arc<Snapshot<R::Item>>>>,
	single_flight: Arc<Mutex<()>>,
}
impl<R> SnapshotCache<R>
where
	R: Refresher,
{
	/// Create an empty cache; `name` labels logs and telemetry.
	pub fn new(name: impl Into<Arc<str>>, refresher: R) -> Self {
		Self {
			name: name.into(),
			refresher: Arc::new(refresher),
			snapshot: Arc::new(RwLock::new(Arc::new(Snapshot::empty()))),
			single_flight: Arc::new(Mutex::new(())),
		}
	}

	/// Cache name used in logs and telemetry.
	pub fn name(&self) -> &str {
		&self.name
	}

	/// Refresh interval reported by the refresher.
	pub fn interval(&self) -> Duration {
		self.refresher.interval()
	}

	/// Whether the held snapshot is younger than the refresh interval.
	pub async fn is_valid(&self) -> bool {
		let snapshot = self.snapshot.read().await;

		snapshot.is_fresh(Instant::now(), self.refresher.interval())
	}

	/// Records of the held snapshot, launching a background refresh when stale.
	pub async fn data(&self) -> Arc<[R::Item]> {
		self.snapshot().await.data.clone()
	}

	/// Wall-clock time of the held snapshot, launching a background refresh when stale.
	pub async fn timestamp(&self) -> Option<DateTime<Utc>> {
		self.snapshot().await.refreshed_at
	}

	/// The held snapshot as one unit, launching a background refresh when stale.
	pub async fn snapshot(&self) -> Arc<Snapshot<R::Item>> {
		let current = { self.snapshot.read().await.clone() };

		if !current.is_fresh(Instant::now(), self.refresher.interval()) {
			self.schedule_background_refresh();
		}

		current
	}

	#[tracing::instrument(skip(self), fields(cache = %self.name))]
	fn schedule_background_refresh(&self) {
		let Ok(guard) = self.single_flight.clone().try_lock_owned() else {
			tracing::trace!("refresh already in flight");

			return;
		};
		let cache = self.clone();

		tokio::spawn(async move {
			let _guard = guard;

			// A refresh may have committed between the staleness check and taking the guard.
			if cache.is_valid().await {
				return;
			}
			if let Err(err) = cache.refresh().await {
				tracing::debug!(cache = %cache.name, error = %err, "background refresh failed");
			}
		});
	}

	async fn refresh(&self) -> Result<()> {
		let started = Instant::now();

		match self.refresher.refresh().await {
			Ok(data) => {
				let len = data.len();

				self.commit(data).await;
				metrics::record_refresh_success(&self.name, started.elapsed());

				tracing::debug!(cache = %self.name, records = len, "snapshot refreshed");

				Ok(())
			},
			Err(err) => {
				metrics::record_refresh_error(&self.name);

				Err(err)
			},
		}
	}

	async fn commit(&self, data: Vec<R::Item>) {
		let mut snapshot = self.snapshot.write().await;

		// Taken under the write lock so committed timestamps never go backwards.
		*snapshot = Arc::new(Snapshot {
			fetched_at: Some(Instant::now()),
			refreshed_at: Some(Utc::now()),
			data: data.into(),
		});
	}
}
impl<R> Clone for SnapshotCache<R>
where
	R: Refresher,
{
	fn clone(&self) -> Self {
		Self {
			name: self.name.clone(),
			refresher: self.refresher.clone(),
			snapshot: self.snapshot.clone(),
			single_flight: self.single_flight.clone(),
		}
	}
}
impl<R> std::fmt::Debug for SnapshotCache<R>
where
	R: Refresher,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("SnapshotCache")
			.field("name", &self.name)
			.field("interval", &self.refresher.interval())
			.finish_non_exhaustive()
	}
}
