//! Plant-level yields and income.

// std
use std::collections::HashMap;
// crates.io
use metrics::Label;
// self
use crate::{
	_prelude::*,
	cache::{
		refresher::Refresher,
		snapshot::{Snapshot, SnapshotCache},
	},
	collector::{self, Collected},
	http::client::Client,
	metrics::LabelSet,
	model::{Plant, PlantData, PlantKpi},
};

const CACHE_NAME: &str = "plants";

const UP: &str = "smartpvms_plant_up";
const LAST_REFRESH: &str = "smartpvms_plant_last_refresh_timestamp_seconds";
const INFO: &str = "smartpvms_plant_info";
const DAY_YIELD: &str = "smartpvms_plant_day_yield";
const MONTH_YIELD: &str = "smartpvms_plant_month_yield";
const TOTAL_YIELD: &str = "smartpvms_plant_total_yield";
const DAY_INCOME: &str = "smartpvms_plant_day_income";
const TOTAL_INCOME: &str = "smartpvms_plant_total_income";

/// A plant joined with its realtime KPIs.
#[derive(Clone, Debug, PartialEq)]
pub struct PlantReading {
	/// Plant as listed by the management system.
	pub plant: Plant,
	/// Realtime KPIs; `None` when the upstream returned none for this plant.
	pub data: Option<PlantData>,
}

/// Fetches every plant and its realtime KPIs.
#[derive(Clone, Debug)]
pub struct PlantsRefresher {
	client: Client,
	interval: Duration,
}
impl PlantsRefresher {
	/// Create a refresher over `client` that goes stale after `interval`.
	pub fn new(client: Client, interval: Duration) -> Self {
		Self { client, interval }
	}
}
impl Refresher for PlantsRefresher {
	type Item = PlantReading;

	fn interval(&self) -> Duration {
		self.interval
	}

	async fn refresh(&self) -> Result<Vec<PlantReading>> {
		let plants = self.client.plant_list().await?;
		let codes = plants.iter().map(|plant| plant.station_code.clone()).collect::<Vec<_>>();
		let kpis = self.client.realtime_plant_data(&codes).await?;

		Ok(join(plants, kpis))
	}
}

/// Exports `smartpvms_plant_*` from a snapshot cache.
#[derive(Clone, Debug)]
pub struct PlantsCollector {
	cache: SnapshotCache<PlantsRefresher>,
}
impl PlantsCollector {
	/// Create a collector with an empty cache.
	pub fn new(client: Client, interval: Duration) -> Self {
		Self { cache: SnapshotCache::new(CACHE_NAME, PlantsRefresher::new(client, interval)) }
	}

	/// Cache backing this collector.
	pub fn cache(&self) -> &SnapshotCache<PlantsRefresher> {
		&self.cache
	}

	/// Read the cache; a stale read launches a background refresh.
	pub async fn collect(&self) -> Collected<PlantReading> {
		let up = self.cache.is_valid().await;
		let snapshot = self.cache.snapshot().await;

		Collected { up, snapshot }
	}
}
impl Collected<PlantReading> {
	/// Write this read's gauges to the current recorder.
	pub fn record(&self) {
		record(self.up, &self.snapshot);
	}
}

fn join(plants: Vec<Plant>, kpis: Vec<PlantKpi>) -> Vec<PlantReading> {
	let mut kpis =
		kpis.into_iter().map(|kpi| (kpi.station_code, kpi.data)).collect::<HashMap<_, _>>();

	plants
		.into_iter()
		.map(|plant| {
			let data = kpis.remove(&plant.station_code);

			PlantReading { plant, data }
		})
		.collect()
}

fn record(up: bool, snapshot: &Snapshot<PlantReading>) {
	collector::set_status(UP, LAST_REFRESH, up, snapshot.refreshed_at);

	for PlantReading { plant, data } in snapshot.data.iter() {
		let mut labels = LabelSet::new();

		labels.push(Label::new("station_code", plant.station_code.clone()));

		let mut info = labels.clone();
		let status = data.as_ref().and_then(|data| data.real_health_state);

		info.push(Label::new("name", plant.name.clone().unwrap_or_default()));
		info.push(Label::new("address", plant.address.clone().unwrap_or_default()));
		// Capacity is reported in MW.
		info.push(Label::new(
			"capacity",
			collector::format_float(plant.capacity.map(|capacity| capacity * 1_000_000.)),
		));
		info.push(Label::new("status", status.map_or("unknown", |status| status.as_str())));
		collector::set(INFO, &info, 1.);

		let Some(data) = data else {
			continue;
		};

		collector::set_some(DAY_YIELD, &labels, data.day_power.map(kwh_to_wh));
		collector::set_some(MONTH_YIELD, &labels, data.month_power.map(kwh_to_wh));
		collector::set_some(TOTAL_YIELD, &labels, data.total_power.map(kwh_to_wh));
		collector::set_some(DAY_INCOME, &labels, data.day_income);
		collector::set_some(TOTAL_INCOME, &labels, data.total_income);
	}
}

fn kwh_to_wh(value: f64) -> f64 {
	value * 1000.
}
