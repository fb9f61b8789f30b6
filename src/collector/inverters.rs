//! Residential inverter electrical readings.

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
	model::{Device, DeviceKpi, DeviceType, ResidentialInverterData},
};

const CACHE_NAME: &str = "residential_inverters";

const UP: &str = "smartpvms_residential_inverter_up";
const LAST_REFRESH: &str = "smartpvms_residential_inverter_last_refresh_timestamp_seconds";
const INFO: &str = "smartpvms_residential_inverter_info";
const TEMPERATURE: &str = "smartpvms_residential_inverter_temperature";
const EFFICIENCY: &str = "smartpvms_residential_inverter_efficiency";
const POWER_FACTOR: &str = "smartpvms_residential_inverter_power_factor";
const ACTIVE_POWER: &str = "smartpvms_residential_inverter_active_power";
const REACTIVE_POWER: &str = "smartpvms_residential_inverter_reactive_power";
const PV_POWER: &str = "smartpvms_residential_inverter_pv_power";
const VOLTAGE: &str = "smartpvms_residential_inverter_voltage";
const CURRENT: &str = "smartpvms_residential_inverter_current";
const PV_VOLTAGE: &str = "smartpvms_residential_inverter_pv_voltage";
const PV_CURRENT: &str = "smartpvms_residential_inverter_pv_current";
const DAY_YIELD: &str = "smartpvms_residential_inverter_day_yield";
const TOTAL_YIELD: &str = "smartpvms_residential_inverter_total_yield";
const MPPT_TOTAL_YIELD: &str = "smartpvms_residential_inverter_mppt_total_yield";
const GRID_VOLTAGE: &str = "smartpvms_residential_inverter_grid_voltage";
const GRID_FREQUENCY: &str = "smartpvms_residential_inverter_grid_frequency";

/// kW and kWh to W and Wh.
const KILO: f64 = 1000.;

/// A residential inverter joined with its realtime KPIs.
#[derive(Clone, Debug, PartialEq)]
pub struct InverterReading {
	/// Device as listed by the management system.
	pub device: Device,
	/// Realtime KPIs; `None` when the upstream returned none for this device.
	pub data: Option<ResidentialInverterData>,
}

/// Fetches every residential inverter across all plants and its realtime KPIs.
#[derive(Clone, Debug)]
pub struct ResidentialInvertersRefresher {
	client: Client,
	interval: Duration,
}
impl ResidentialInvertersRefresher {
	/// Create a refresher over `client` that goes stale after `interval`.
	pub fn new(client: Client, interval: Duration) -> Self {
		Self { client, interval }
	}
}
impl Refresher for ResidentialInvertersRefresher {
	type Item = InverterReading;

	fn interval(&self) -> Duration {
		self.interval
	}

	async fn refresh(&self) -> Result<Vec<InverterReading>> {
		let codes = self
			.client
			.plant_list()
			.await?
			.into_iter()
			.map(|plant| plant.station_code)
			.collect::<Vec<_>>();
		let devices = self
			.client
			.device_list(&codes)
			.await?
			.into_iter()
			.filter(|device| device.device_type == DeviceType::ResidentialInverter)
			.collect::<Vec<_>>();
		let ids = devices.iter().map(|device| device.id).collect::<Vec<_>>();
		let kpis = self
			.client
			.realtime_device_data::<ResidentialInverterData>(DeviceType::ResidentialInverter, &ids)
			.await?;

		Ok(join(devices, kpis))
	}
}

/// Exports `smartpvms_residential_inverter_*` from a snapshot cache.
#[derive(Clone, Debug)]
pub struct ResidentialInvertersCollector {
	cache: SnapshotCache<ResidentialInvertersRefresher>,
}
impl ResidentialInvertersCollector {
	/// Create a collector with an empty cache.
	pub fn new(client: Client, interval: Duration) -> Self {
		Self {
			cache: SnapshotCache::new(
				CACHE_NAME,
				ResidentialInvertersRefresher::new(client, interval),
			),
		}
	}

	/// Cache backing this collector.
	pub fn cache(&self) -> &SnapshotCache<ResidentialInvertersRefresher> {
		&self.cache
	}

	/// Read the cache; a stale read launches a background refresh.
	pub async fn collect(&self) -> Collected<InverterReading> {
		let up = self.cache.is_valid().await;
		let snapshot = self.cache.snapshot().await;

		Collected { up, snapshot }
	}
}
impl Collected<InverterReading> {
	/// Write this read's gauges to the current recorder.
	pub fn record(&self) {
		record(self.up, &self.snapshot);
	}
}

fn join(
	devices: Vec<Device>,
	kpis: Vec<DeviceKpi<ResidentialInverterData>>,
) -> Vec<InverterReading> {
	let mut kpis =
		kpis.into_iter().map(|kpi| (kpi.device_id, kpi.data)).collect::<HashMap<_, _>>();

	devices
		.into_iter()
		.map(|device| {
			let data = kpis.remove(&device.id);

			InverterReading { device, data }
		})
		.collect()
}

fn record(up: bool, snapshot: &Snapshot<InverterReading>) {
	collector::set_status(UP, LAST_REFRESH, up, snapshot.refreshed_at);

	for InverterReading { device, data } in snapshot.data.iter() {
		let labels = identity(device);

		collector::set(INFO, &info_labels(&labels, device, data.as_ref()), 1.);

		let Some(data) = data else {
			continue;
		};

		collector::set_some(TEMPERATURE, &labels, data.temperature);
		collector::set_some(EFFICIENCY, &labels, data.efficiency.map(|percent| percent / 100.));
		collector::set_some(POWER_FACTOR, &labels, data.power_factor);
		collector::set_some(ACTIVE_POWER, &labels, data.active_power.map(|kw| kw * KILO));
		collector::set_some(REACTIVE_POWER, &labels, data.reactive_power.map(|kvar| kvar * KILO));
		collector::set_some(PV_POWER, &labels, data.mppt_power.map(|kw| kw * KILO));
		collector::set_each(VOLTAGE, &labels, "phase", data.phase_voltages(), 1.);
		collector::set_each(CURRENT, &labels, "phase", data.phase_currents(), 1.);
		collector::set_each(PV_VOLTAGE, &labels, "string", data.string_voltages(), 1.);
		collector::set_each(PV_CURRENT, &labels, "string", data.string_currents(), 1.);
		collector::set_some(DAY_YIELD, &labels, data.day_cap.map(|kwh| kwh * KILO));
		collector::set_some(TOTAL_YIELD, &labels, data.total_cap.map(|kwh| kwh * KILO));
		collector::set_each(MPPT_TOTAL_YIELD, &labels, "tracker", data.tracker_yields(), KILO);
		collector::set_each(GRID_VOLTAGE, &labels, "phase", data.grid_voltages(), 1.);
		collector::set_some(GRID_FREQUENCY, &labels, data.elec_freq);
	}
}

/// `station_code` and `serial`; devices without a serial number fall back to their id.
fn identity(device: &Device) -> LabelSet {
	let serial = device.serial.clone().unwrap_or_else(|| device.id.to_string());
	let mut labels = LabelSet::new();

	labels.push(Label::new("station_code", device.station_code.clone()));
	labels.push(Label::new("serial", serial));

	labels
}

fn info_labels(
	identity: &LabelSet,
	device: &Device,
	data: Option<&ResidentialInverterData>,
) -> LabelSet {
	let run_status = data.and_then(|data| data.run_state).map_or("unknown", |s| s.as_str());
	let status = data.and_then(|data| data.inverter_state).map_or("unknown", |s| s.as_str());
	let time = |at: Option<DateTime<Utc>>| at.map(|at| at.to_rfc3339()).unwrap_or_default();
	let mut labels = identity.clone();

	labels.push(Label::new("model", device.model.clone().unwrap_or_default()));
	labels.push(Label::new(
		"software_version",
		device.software_version.clone().unwrap_or_default(),
	));
	labels.push(Label::new("latitude", collector::format_float(device.latitude)));
	labels.push(Label::new("longitude", collector::format_float(device.longitude)));
	labels.push(Label::new("run_status", run_status));
	labels.push(Label::new("status", status));
	labels.push(Label::new("startup_time", time(data.and_then(|data| data.open_time))));
	labels.push(Label::new("shutdown_time", time(data.and_then(|data| data.close_time))));

	labels
}
